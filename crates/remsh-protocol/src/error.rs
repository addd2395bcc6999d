//! Protocol error types

use thiserror::Error;

/// Errors that can occur while decoding the marker protocol
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The stream ended without producing any marker-prefixed state lines
    #[error("Remote stream ended without a state block")]
    MissingStateBlock,

    /// An entry in the environment dump had no `=` separator
    #[error("Malformed environment entry: {0:?}")]
    MalformedEnvEntry(String),

    /// The exit-code payload was not a base-10 integer
    #[error("Invalid exit code payload: {0:?}")]
    InvalidExitCode(String),
}
