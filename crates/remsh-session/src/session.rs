//! Remote session orchestration
//!
//! Drives the marker protocol over a [`Transport`]: wraps each command
//! in an envelope, streams ordinary output to the caller as lines
//! arrive, extracts the trailing state block, and folds directory and
//! environment changes into the next invocation's preamble.

use remsh_core::{
    Connector, SessionConfig, SessionError, StateStore, StreamEvent, Transport, TransportError,
};
use remsh_protocol::{
    build_envelope, classify, wire_command, FooterBlock, LineAssembler, LineClass, Marker,
    ParsedFooter, ProtocolError,
};

use crate::ssh::SshConnector;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No connection established
    Disconnected,
    /// Connection being established
    Connecting,
    /// Connected and idle
    Connected,
    /// One command in flight
    Executing,
    /// Torn down by `close`
    Closed,
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionPhase::Disconnected => write!(f, "disconnected"),
            SessionPhase::Connecting => write!(f, "connecting"),
            SessionPhase::Connected => write!(f, "connected"),
            SessionPhase::Executing => write!(f, "executing"),
            SessionPhase::Closed => write!(f, "closed"),
        }
    }
}

/// Outcome of one invocation attempt.
///
/// Explicit enum rather than exception-style control flow so the
/// reconnect retry is a visible loop over `TransportFailure`.
enum ExecOutcome {
    /// Stream completed and a state block was parsed
    Completed(ParsedFooter),
    /// Stream completed but the state block was missing or malformed
    ProtocolViolation(ProtocolError),
    /// The transport faulted before the stream completed
    TransportFailure(TransportError),
}

/// A stateful shell session over a one-shot execution transport.
///
/// Strictly sequential: `execute` takes `&mut self`, so at most one
/// command is in flight per session and state is never mutated
/// concurrently.
pub struct RemoteSession<C: Connector> {
    connector: C,
    config: SessionConfig,
    transport: Option<C::Transport>,
    phase: SessionPhase,
    host: Option<String>,
    store: StateStore,
}

/// A remote session over the russh-backed transport
pub type SshSession = RemoteSession<SshConnector>;

impl SshSession {
    /// Create a disconnected session using the SSH transport
    pub fn over_ssh(config: SessionConfig) -> Self {
        let connector = SshConnector::new(config.clone());
        Self::new(connector, config)
    }
}

impl<C: Connector> RemoteSession<C> {
    /// Create a disconnected session over the given connector
    pub fn new(connector: C, config: SessionConfig) -> Self {
        Self {
            connector,
            config,
            transport: None,
            phase: SessionPhase::Disconnected,
            host: None,
            store: StateStore::new(),
        }
    }

    /// Establish a connection to `host`.
    ///
    /// An already-connected session is torn down first, so calling
    /// `connect` repeatedly never leaks a prior connection. After the
    /// transport is up, a silent probe invocation captures the remote's
    /// initial working directory and environment as the comparison
    /// floor for later diffs.
    pub async fn connect(&mut self, host: &str) -> Result<(), SessionError> {
        if self.transport.is_some() {
            self.close().await?;
        }

        self.phase = SessionPhase::Connecting;
        let transport = match self.connector.connect(host).await {
            Ok(t) => t,
            Err(e) => {
                self.phase = SessionPhase::Disconnected;
                return Err(e.into());
            }
        };
        self.transport = Some(transport);
        self.host = Some(host.to_string());
        self.store = StateStore::with_overrides(self.config.env_overrides.iter().cloned());

        match self.run_invocation(":", &mut |_line: &str| {}).await {
            ExecOutcome::Completed(footer) => {
                self.store.baseline(&footer);
                self.phase = SessionPhase::Connected;
                tracing::info!(host = %host, cwd = ?self.store.cwd(), "session connected");
                Ok(())
            }
            ExecOutcome::ProtocolViolation(err) => {
                self.close().await?;
                self.phase = SessionPhase::Disconnected;
                Err(err.into())
            }
            ExecOutcome::TransportFailure(err) => {
                self.close().await?;
                self.phase = SessionPhase::Disconnected;
                Err(err.into())
            }
        }
    }

    /// Run one command, streaming its output through `emit`.
    ///
    /// Each ordinary output line is delivered as soon as it arrives;
    /// bookkeeping lines are filtered out. Returns the command's own
    /// exit code. A missing or malformed state block reports exit code
    /// 1 with a diagnostic line rather than guessing success; a
    /// transport failure triggers one reconnect-and-retry before it is
    /// fatal for the call.
    pub async fn execute<F>(&mut self, command: &str, mut emit: F) -> Result<i32, SessionError>
    where
        F: FnMut(&str),
    {
        if self.phase != SessionPhase::Connected {
            return Err(SessionError::NotConnected);
        }

        self.phase = SessionPhase::Executing;
        let result = self.execute_inner(command, &mut emit).await;
        self.phase = match &result {
            Err(_) => SessionPhase::Disconnected,
            Ok(_) => SessionPhase::Connected,
        };
        result
    }

    async fn execute_inner<F>(&mut self, command: &str, emit: &mut F) -> Result<i32, SessionError>
    where
        F: FnMut(&str),
    {
        let mut attempt = 0;
        loop {
            match self.run_invocation(command, emit).await {
                ExecOutcome::Completed(footer) => {
                    let code = match footer.exit_code {
                        Some(code) => code,
                        None => {
                            tracing::warn!("state block carried no exit code");
                            emit("[ERROR] cannot parse exit code; reporting exit code 1");
                            1
                        }
                    };
                    // State is still absorbed when only the code line
                    // was lost; the directory and environment echoes
                    // remain trustworthy.
                    let adjustments = self.store.diff_and_apply(&footer);
                    tracing::debug!(code, adjustments = adjustments.len(), "command completed");
                    return Ok(code);
                }
                ExecOutcome::ProtocolViolation(err) => {
                    let alive = self
                        .transport
                        .as_ref()
                        .map(|t| t.is_alive())
                        .unwrap_or(false);
                    if alive || attempt > 0 {
                        tracing::warn!(error = %err, "protocol violation; reporting exit code 1");
                        emit(&format!("[ERROR] {err}; reporting exit code 1"));
                        return Ok(1);
                    }
                    // A dead transport explains the missing state block;
                    // treat it as a transport failure and retry once.
                    emit("[INFO] connection lost; reconnecting");
                    self.reconnect().await?;
                }
                ExecOutcome::TransportFailure(err) => {
                    if attempt > 0 {
                        return Err(err.into());
                    }
                    tracing::warn!(error = %err, "transport failure; reconnecting");
                    emit("[INFO] connection lost; reconnecting");
                    self.reconnect().await?;
                }
            }
            attempt += 1;
        }
    }

    /// Run one envelope over the transport and consume its stream
    async fn run_invocation<F>(&mut self, command: &str, emit: &mut F) -> ExecOutcome
    where
        F: FnMut(&str),
    {
        let Some(transport) = self.transport.as_mut() else {
            return ExecOutcome::TransportFailure(TransportError::ConnectionLost(
                "no transport".to_string(),
            ));
        };

        let marker = Marker::generate();
        let envelope = build_envelope(&self.store.preamble(), command, &marker);
        let wire = wire_command(&self.config.shell, &envelope);

        let mut stream = match transport.run(&wire).await {
            Ok(stream) => stream,
            Err(e) => return ExecOutcome::TransportFailure(e),
        };

        let mut assembler = LineAssembler::new();
        let mut block = FooterBlock::new();

        while let Some(event) = stream.next().await {
            match event {
                StreamEvent::Output(chunk) => {
                    for line in assembler.push(&chunk) {
                        match classify(&line, &marker) {
                            LineClass::Output(text) => emit(text),
                            LineClass::State(field, payload) => block.record(field, payload),
                        }
                    }
                }
                StreamEvent::Exit(status) => {
                    // Status of the envelope, not the user command
                    tracing::debug!(wire_status = status, "invocation channel finished");
                }
                StreamEvent::Fault(err) => return ExecOutcome::TransportFailure(err),
            }
        }

        if let Some(line) = assembler.finish() {
            match classify(&line, &marker) {
                LineClass::Output(text) => emit(text),
                LineClass::State(field, payload) => block.record(field, payload),
            }
        }

        if block.is_empty() {
            return ExecOutcome::ProtocolViolation(ProtocolError::MissingStateBlock);
        }
        match block.finish() {
            Ok(footer) => ExecOutcome::Completed(footer),
            Err(err) => ExecOutcome::ProtocolViolation(err),
        }
    }

    /// Re-establish the transport after a mid-session failure.
    ///
    /// The state store is kept, so the accumulated cd/export preamble
    /// restores the session's directory and environment on the fresh
    /// connection.
    async fn reconnect(&mut self) -> Result<(), SessionError> {
        let host = self.host.clone().ok_or(SessionError::NotConnected)?;
        if let Some(mut old) = self.transport.take() {
            if let Err(e) = old.close().await {
                tracing::debug!(error = %e, "old transport close reported an error");
            }
        }
        tracing::info!(host = %host, "reconnecting");
        let transport = self.connector.connect(&host).await?;
        self.transport = Some(transport);
        Ok(())
    }

    /// Best-effort interrupt of the in-flight command.
    ///
    /// Check [`RemoteSession::supports_hard_interrupt`] first: on
    /// backends without a real cancellation primitive this signals
    /// nothing and the command runs to completion.
    pub async fn interrupt(&mut self) -> Result<(), SessionError> {
        match self.transport.as_mut() {
            Some(transport) => Ok(transport.interrupt().await?),
            None => Err(SessionError::NotConnected),
        }
    }

    /// Whether `interrupt` can actually stop a running command
    pub fn supports_hard_interrupt(&self) -> bool {
        self.transport
            .as_ref()
            .map(|t| t.supports_hard_interrupt())
            .unwrap_or(false)
    }

    /// Tear down the connection; idempotent
    pub async fn close(&mut self) -> Result<(), SessionError> {
        if let Some(mut transport) = self.transport.take() {
            if let Err(e) = transport.close().await {
                tracing::debug!(error = %e, "transport close reported an error");
            }
        }
        self.phase = SessionPhase::Closed;
        Ok(())
    }

    /// Whether the session is currently usable
    pub fn is_connected(&self) -> bool {
        matches!(
            self.phase,
            SessionPhase::Connected | SessionPhase::Executing
        )
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Target host of the current connection, if any
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Last known remote working directory
    pub fn cwd(&self) -> Option<&str> {
        self.store.cwd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_display() {
        assert_eq!(format!("{}", SessionPhase::Connected), "connected");
        assert_eq!(format!("{}", SessionPhase::Executing), "executing");
        assert_eq!(format!("{}", SessionPhase::Closed), "closed");
    }
}
