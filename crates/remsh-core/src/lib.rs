//! remsh-core: Core abstractions and configuration for remsh
//!
//! This crate provides the transport seam, the session state store and
//! the error and configuration types shared by the session orchestration
//! and the CLI.

pub mod config;
pub mod error;
pub mod state;
pub mod transport;

pub use config::SessionConfig;
pub use error::{ConfigError, RemshError, SessionError, TransportError};
pub use state::{Adjustment, StateStore};
pub use transport::{Connector, ExecStream, StreamEvent, Transport};
