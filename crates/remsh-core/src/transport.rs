//! Transport traits
//!
//! The transport is the one-shot remote execution primitive the session
//! wrapper is built on: each `run` is an independent invocation with no
//! shared shell state. Everything stateful lives above this seam, which
//! also makes the orchestration testable against scripted fakes.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::TransportError;

/// Events produced by one remote invocation
#[derive(Debug)]
pub enum StreamEvent {
    /// A chunk of output (stdout or stderr, arrival order, untagged)
    Output(Bytes),
    /// Wire-level exit status of the invocation itself.
    ///
    /// This is the status of the envelope, not the user command; the
    /// session layer logs it and recovers the real code from the footer.
    Exit(u32),
    /// The transport faulted mid-invocation
    Fault(TransportError),
}

/// The event stream of one in-flight invocation.
///
/// The stream ends (yields `None`) when the remote side closes the
/// channel. A transport that can observe a mid-invocation failure
/// emits `Fault` before ending; one that only sees the channel close
/// (the SSH exec backend among them) simply ends the stream, and the
/// session tells a truncated invocation from a dropped connection by
/// consulting [`Transport::is_alive`] after a footerless end.
#[derive(Debug)]
pub struct ExecStream {
    rx: mpsc::Receiver<StreamEvent>,
}

impl ExecStream {
    /// Wrap a receiver fed by a transport's reader task
    pub fn from_receiver(rx: mpsc::Receiver<StreamEvent>) -> Self {
        Self { rx }
    }

    /// Next event, or `None` once the invocation has fully completed
    pub async fn next(&mut self) -> Option<StreamEvent> {
        self.rx.recv().await
    }
}

/// Abstraction over one established remote endpoint
#[async_trait]
pub trait Transport: Send {
    /// Start one remote invocation and return its event stream.
    ///
    /// The transport runs at most one invocation at a time; callers
    /// drain the returned stream before issuing the next `run`.
    async fn run(&mut self, command: &str) -> Result<ExecStream, TransportError>;

    /// Best-effort interrupt of the in-flight invocation.
    ///
    /// Backends without a hard interrupt primitive return Ok without
    /// any effect; check [`Transport::supports_hard_interrupt`].
    async fn interrupt(&mut self) -> Result<(), TransportError>;

    /// Whether `interrupt` can actually stop a running command
    fn supports_hard_interrupt(&self) -> bool {
        false
    }

    /// Whether the underlying connection is still usable
    fn is_alive(&self) -> bool;

    /// Close the connection gracefully; idempotent
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Factory for establishing transports to a target host
#[async_trait]
pub trait Connector: Send {
    /// The transport type produced by this connector
    type Transport: Transport;

    /// Establish a connection to `host` (`[user@]host[:port]`)
    async fn connect(&self, host: &str) -> Result<Self::Transport, TransportError>;
}
