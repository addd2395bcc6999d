//! Session state store
//!
//! The remote side has no memory between invocations, so the store
//! fabricates one: it caches the working directory and environment
//! reported by each invocation's footer, diffs them against the previous
//! report, and replays the accumulated differences as the next
//! invocation's preamble. The environment only grows or overwrites;
//! unset variables are not detected.

use std::collections::{BTreeMap, HashMap};

use remsh_protocol::{shell_quote, ParsedFooter};

/// One remote adjustment derived from a state diff
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Adjustment {
    /// The working directory moved
    Chdir(String),
    /// An environment variable was added or changed
    SetEnv(String, String),
}

/// Last known remote working directory and environment
#[derive(Debug, Default)]
pub struct StateStore {
    /// Working directory as of the last parsed footer
    cwd: Option<String>,
    /// Full environment dump from the last parsed footer.
    ///
    /// Comparison floor for the next diff; not replayed itself.
    last_dump: HashMap<String, String>,
    /// Variables that diverged from the floor since connect.
    ///
    /// Replayed as exports on every subsequent invocation. Ordered map
    /// so the preamble is deterministic.
    overrides: BTreeMap<String, String>,
}

impl StateStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with configured overrides (e.g. `PAGER=cat`)
    pub fn with_overrides<I>(overrides: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Self {
            cwd: None,
            last_dump: HashMap::new(),
            overrides: overrides.into_iter().collect(),
        }
    }

    /// Capture the connect-time probe's state as the comparison floor.
    ///
    /// Nothing is promoted to an override: the remote's own login
    /// environment must not be replayed back at it on every invocation.
    pub fn baseline(&mut self, footer: &ParsedFooter) {
        self.cwd = footer.pwd.clone();
        self.last_dump = footer.env.clone();
        tracing::debug!(cwd = ?self.cwd, vars = self.last_dump.len(), "baseline captured");
    }

    /// Diff a parsed footer against the cache and absorb the changes.
    ///
    /// Returns the adjustments applied: a `Chdir` only if the directory
    /// actually moved, and a `SetEnv` for every variable that is new or
    /// changed relative to the previous dump. Both are folded into the
    /// preamble of every subsequent invocation.
    pub fn diff_and_apply(&mut self, footer: &ParsedFooter) -> Vec<Adjustment> {
        let mut adjustments = Vec::new();

        if let Some(newdir) = &footer.pwd {
            if self.cwd.as_deref() != Some(newdir.as_str()) {
                tracing::debug!(cwd = %newdir, "working directory moved");
                self.cwd = Some(newdir.clone());
                adjustments.push(Adjustment::Chdir(newdir.clone()));
            }
        }

        for (key, value) in &footer.env {
            if self.last_dump.get(key) != Some(value) {
                self.overrides.insert(key.clone(), value.clone());
                adjustments.push(Adjustment::SetEnv(key.clone(), value.clone()));
            }
        }

        if !footer.env.is_empty() {
            self.last_dump = footer.env.clone();
        }

        adjustments
    }

    /// Shell statements replaying the accumulated state.
    ///
    /// Injected as the header of the next invocation envelope: one
    /// export per override, then a single `cd` to the cached directory.
    pub fn preamble(&self) -> Vec<String> {
        let mut statements: Vec<String> = self
            .overrides
            .iter()
            .map(|(k, v)| format!("export {}={}", k, shell_quote(v)))
            .collect();
        if let Some(cwd) = &self.cwd {
            statements.push(format!("cd {}", shell_quote(cwd)));
        }
        statements
    }

    /// Last known working directory, if any footer reported one
    pub fn cwd(&self) -> Option<&str> {
        self.cwd.as_deref()
    }
}
