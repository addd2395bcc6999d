//! remsh-session: Stateful remote shell sessions over one-shot SSH exec
//!
//! SSH `exec` runs each command in a fresh shell with no memory of the
//! last one. [`RemoteSession`] fabricates the missing continuity: it
//! wraps every command in a marker envelope that reports exit code,
//! working directory and environment from the same shell invocation,
//! streams the user's output line by line as it arrives, and replays
//! accumulated directory/environment changes ahead of the next command.

pub mod session;
pub mod ssh;

pub use session::{RemoteSession, SessionPhase, SshSession};
pub use ssh::{SshConnector, SshTransport};
