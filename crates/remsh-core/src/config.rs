//! Session configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Configuration for a remote session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Username for SSH authentication (defaults to the local user);
    /// a `user@host` target overrides this
    pub username: String,

    /// Default SSH port when the target does not carry one
    pub port: u16,

    /// Private key paths to try, in order
    pub private_key_paths: Vec<PathBuf>,

    /// Connection timeout
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,

    /// Environment overrides applied to every session.
    ///
    /// `PAGER=cat` keeps command output from being gated on an
    /// interactive pager prompt.
    pub env_overrides: Vec<(String, String)>,

    /// Shell used to run invocation envelopes on the remote side.
    ///
    /// Must understand process substitution; the default is bash.
    pub shell: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let ssh_dir = dirs::home_dir().unwrap_or_default().join(".ssh");
        Self {
            username: whoami::username(),
            port: 22,
            private_key_paths: vec![ssh_dir.join("id_ed25519"), ssh_dir.join("id_rsa")],
            connect_timeout: Duration::from_secs(30),
            env_overrides: vec![("PAGER".to_string(), "cat".to_string())],
            shell: "bash".to_string(),
        }
    }
}

impl SessionConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }
}

/// Helper module for Duration serialization as seconds
pub mod duration_secs {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// Serialize a Duration as seconds (u64)
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    /// Deserialize a Duration from seconds (u64)
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.port, 22);
        assert_eq!(config.shell, "bash");
        assert!(config
            .env_overrides
            .iter()
            .any(|(k, v)| k == "PAGER" && v == "cat"));
    }

    #[test]
    fn test_load_partial_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = 2222\nconnect_timeout = 5").unwrap();

        let config = SessionConfig::load(file.path()).unwrap();
        assert_eq!(config.port, 2222);
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        // Unspecified fields keep their defaults
        assert_eq!(config.shell, "bash");
    }

    #[test]
    fn test_load_missing_file() {
        let err = SessionConfig::load(Path::new("/nonexistent/remsh.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_duration_secs_roundtrip() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Probe {
            #[serde(with = "duration_secs")]
            timeout: Duration,
        }

        let original = Probe {
            timeout: Duration::from_secs(45),
        };
        let json = serde_json::to_string(&original).unwrap();
        assert_eq!(json, r#"{"timeout":45}"#);
        let parsed: Probe = serde_json::from_str(&json).unwrap();
        assert_eq!(original, parsed);
    }
}
