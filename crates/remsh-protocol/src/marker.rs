//! Invocation markers and state-line classification
//!
//! Every invocation gets a fresh marker. The footer appended to the user
//! command echoes three marker-prefixed lines (exit code, working
//! directory, environment dump); everything else on the stream is the
//! user's own output and is forwarded verbatim.

use std::collections::HashMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::ProtocolError;

/// Delimiter between entries in the environment dump.
///
/// `env -0` separates entries with NUL; piping through `cat -v` renders
/// NUL as the two-character sequence `^@`, which survives the `$(...)`
/// word joining that flattens newlines. See [`crate::envelope`].
pub const ENV_DELIMITER: &str = "^@";

/// Unique token prefixing bookkeeping lines for one invocation.
///
/// Derived from the current time plus 64 bits of random entropy so that
/// two invocations in the same nanosecond still get distinct markers.
/// Collision with user output remains possible in principle (a command
/// that prints its own envelope, for instance) and is a documented risk
/// of the merged-stream design, not something the codec can detect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker(String);

impl Marker {
    /// Generate a fresh marker for one invocation
    pub fn generate() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let salt: u64 = rand::random();
        Self(format!("__remsh_{nanos:x}_{salt:016x}__"))
    }

    /// Build a marker from a fixed token.
    ///
    /// Intended for tests and for fakes that need a deterministic marker.
    pub fn from_raw(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The marker text as it appears on the wire
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// State fields carried by marker-prefixed footer lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateField {
    /// Exit code of the user command (`<marker>code: N`)
    Code,
    /// Working directory after the command (`<marker>pwd: /path`)
    Pwd,
    /// Environment dump after the command (`<marker>env: K=V^@K=V...`)
    Env,
}

/// Classification of one line from the merged output stream
#[derive(Debug, PartialEq, Eq)]
pub enum LineClass<'a> {
    /// Ordinary user output, forwarded to the caller as-is
    Output(&'a str),
    /// A marker-prefixed state line with its payload
    State(StateField, &'a str),
}

/// Classify one line of output against the invocation's marker.
///
/// Lines that carry the marker but an unrecognized field are treated as
/// ordinary output rather than rejected.
pub fn classify<'a>(line: &'a str, marker: &Marker) -> LineClass<'a> {
    let Some(rest) = line.strip_prefix(marker.as_str()) else {
        return LineClass::Output(line);
    };

    if let Some(payload) = rest.strip_prefix("code: ") {
        LineClass::State(StateField::Code, payload)
    } else if let Some(payload) = rest.strip_prefix("pwd: ") {
        LineClass::State(StateField::Pwd, payload)
    } else if let Some(payload) = rest.strip_prefix("env: ") {
        LineClass::State(StateField::Env, payload)
    } else {
        LineClass::Output(line)
    }
}

/// Decode the delimiter-joined `K=V` environment dump into a map.
///
/// Splits on [`ENV_DELIMITER`], skips empty entries, and splits each
/// entry on the first `=` so values containing `=` survive intact.
pub fn decode_env_dump(raw: &str) -> Result<HashMap<String, String>, ProtocolError> {
    raw.split(ENV_DELIMITER)
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry
                .split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .ok_or_else(|| ProtocolError::MalformedEnvEntry(entry.to_string()))
        })
        .collect()
}

/// Accumulates the state fields observed while consuming one stream
#[derive(Debug, Default)]
pub struct FooterBlock {
    code: Option<String>,
    pwd: Option<String>,
    env: Option<String>,
}

/// State parsed out of a completed invocation's footer.
///
/// `exit_code` is `None` when the footer arrived without a `code:` line;
/// the session layer reports that as a failure with a diagnostic rather
/// than guessing a success code.
#[derive(Debug, Clone)]
pub struct ParsedFooter {
    /// Exit code of the user command, if the footer carried one
    pub exit_code: Option<i32>,
    /// Working directory at the end of the invocation
    pub pwd: Option<String>,
    /// Full environment at the end of the invocation
    pub env: HashMap<String, String>,
}

impl FooterBlock {
    /// Create an empty block
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one observed state field.
    ///
    /// A repeated field overwrites the earlier value; the last footer on
    /// the stream wins, matching what a shell that ran the footer twice
    /// would leave behind.
    pub fn record(&mut self, field: StateField, payload: &str) {
        let slot = match field {
            StateField::Code => &mut self.code,
            StateField::Pwd => &mut self.pwd,
            StateField::Env => &mut self.env,
        };
        *slot = Some(payload.to_string());
    }

    /// Whether no state field was observed at all.
    ///
    /// This is the protocol-violation signal for a stream that ended
    /// early (dropped connection, crashed remote shell).
    pub fn is_empty(&self) -> bool {
        self.code.is_none() && self.pwd.is_none() && self.env.is_none()
    }

    /// Parse the accumulated fields into a [`ParsedFooter`]
    pub fn finish(self) -> Result<ParsedFooter, ProtocolError> {
        let exit_code = match self.code {
            Some(raw) => Some(
                raw.trim()
                    .parse::<i32>()
                    .map_err(|_| ProtocolError::InvalidExitCode(raw.clone()))?,
            ),
            None => None,
        };

        let env = match &self.env {
            Some(raw) => decode_env_dump(raw)?,
            None => HashMap::new(),
        };

        Ok(ParsedFooter {
            exit_code,
            pwd: self.pwd,
            env,
        })
    }
}
