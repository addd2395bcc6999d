//! remsh-protocol: Marker protocol for stateful command execution over
//! one-shot remote invocations
//!
//! This crate defines the text protocol that lets a single remote `exec`
//! carry a user command plus the bookkeeping needed to recover its exit
//! code, working directory and environment from the same shell process.

pub mod envelope;
pub mod error;
pub mod lines;
pub mod marker;

pub use envelope::{build_envelope, shell_quote, wire_command};
pub use error::ProtocolError;
pub use lines::LineAssembler;
pub use marker::{
    classify, decode_env_dump, FooterBlock, LineClass, Marker, ParsedFooter, StateField,
    ENV_DELIMITER,
};
