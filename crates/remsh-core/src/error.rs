//! Core error types for remsh

use remsh_protocol::ProtocolError;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the remsh ecosystem
#[derive(Error, Debug)]
pub enum RemshError {
    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Transport error
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Session error
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Transport-level errors (connect, auth, mid-invocation faults)
#[derive(Error, Debug)]
pub enum TransportError {
    /// Remote endpoint unreachable or refused the connection
    #[error("Connection refused: {0}")]
    ConnectionRefused(String),

    /// Authentication failed
    #[error("Authentication failed")]
    AuthenticationFailed,

    /// Private key file not found or unreadable
    #[error("Private key not found at {path}")]
    KeyNotFound {
        /// Path that was tried
        path: PathBuf,
    },

    /// Connection establishment timed out
    #[error("Connection timed out")]
    Timeout,

    /// Connection dropped mid-session
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Failed to open or drive an execution channel
    #[error("Channel failure: {0}")]
    ChannelFailure(String),
}

/// Session-level errors surfaced by the orchestration
#[derive(Error, Debug)]
pub enum SessionError {
    /// An operation requiring a live connection was called while disconnected
    #[error("Session is not connected")]
    NotConnected,

    /// Transport failure that survived the single reconnect retry
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Protocol failure during the connect-time baseline probe
    #[error("Protocol error during connect: {0}")]
    Protocol(#[from] ProtocolError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// I/O error reading the config file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_fold_into_umbrella() {
        let err: RemshError = TransportError::AuthenticationFailed.into();
        assert!(matches!(err, RemshError::Transport(_)));

        let err: RemshError = SessionError::NotConnected.into();
        assert_eq!(format!("{err}"), "Session error: Session is not connected");
    }

    #[test]
    fn test_transport_error_folds_into_session_error() {
        let err: SessionError = TransportError::Timeout.into();
        assert!(matches!(err, SessionError::Transport(TransportError::Timeout)));
    }
}
