//! russh-backed transport
//!
//! Each `run` opens a fresh exec channel on the authenticated SSH
//! connection, which is exactly the one-shot primitive the session
//! wrapper is built to compensate for: no working directory, no
//! environment, no shell state survives between channels.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use russh::client::{self, Config, Handle};
use russh::{ChannelMsg, Disconnect};
use russh_keys::key::PublicKey;
use tokio::sync::mpsc;

use remsh_core::{Connector, ExecStream, SessionConfig, StreamEvent, Transport, TransportError};

/// Channel capacity for events from one invocation.
///
/// Holds output chunks between the channel reader task and the session
/// loop while a line is being assembled and classified.
const EXEC_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Parsed `[user@]host[:port]` target
#[derive(Debug, Clone, PartialEq, Eq)]
struct Target {
    username: String,
    host: String,
    port: u16,
}

impl Target {
    fn parse(raw: &str, config: &SessionConfig) -> Self {
        let (username, rest) = match raw.split_once('@') {
            Some((user, rest)) if !user.is_empty() => (user.to_string(), rest),
            _ => (config.username.clone(), raw),
        };
        let (host, port) = match rest.rsplit_once(':') {
            Some((host, port)) => match port.parse() {
                Ok(port) => (host.to_string(), port),
                Err(_) => (rest.to_string(), config.port),
            },
            None => (rest.to_string(), config.port),
        };
        Self {
            username,
            host,
            port,
        }
    }
}

/// SSH client handler.
///
/// Host-key *policy* is out of scope here: the key is accepted and its
/// fingerprint logged, the same stance the transport takes on pty and
/// agent forwarding. Callers needing verification pin it a layer up.
struct ClientHandler;

#[async_trait]
impl client::Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        tracing::debug!("Server host key: {}", server_public_key.fingerprint());
        Ok(true)
    }
}

/// Establishes authenticated SSH connections for remote sessions
pub struct SshConnector {
    config: SessionConfig,
}

impl SshConnector {
    /// Create a connector from session configuration
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for SshConnector {
    type Transport = SshTransport;

    async fn connect(&self, host: &str) -> Result<SshTransport, TransportError> {
        let target = Target::parse(host, &self.config);
        let address = format!("{}:{}", target.host, target.port);

        tracing::debug!(address = %address, user = %target.username, "connecting");
        let ssh_config = Arc::new(Config::default());
        let mut handle = tokio::time::timeout(
            self.config.connect_timeout,
            client::connect(ssh_config, address.as_str(), ClientHandler),
        )
        .await
        .map_err(|_| TransportError::Timeout)?
        .map_err(|e| TransportError::ConnectionRefused(e.to_string()))?;

        let mut tried_any_key = false;
        for path in &self.config.private_key_paths {
            if !path.exists() {
                continue;
            }
            let key = match russh_keys::load_secret_key(path, None) {
                Ok(key) => Arc::new(key),
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "skipping unusable key");
                    continue;
                }
            };
            tried_any_key = true;

            let authenticated = handle
                .authenticate_publickey(&target.username, key)
                .await
                .map_err(|e| TransportError::ConnectionRefused(e.to_string()))?;
            if authenticated {
                tracing::info!(address = %address, user = %target.username, "authenticated");
                return Ok(SshTransport { handle });
            }
            tracing::debug!(path = %path.display(), "key rejected");
        }

        if !tried_any_key {
            return Err(TransportError::KeyNotFound {
                path: self
                    .config
                    .private_key_paths
                    .first()
                    .cloned()
                    .unwrap_or_default(),
            });
        }
        Err(TransportError::AuthenticationFailed)
    }
}

/// One authenticated SSH connection
pub struct SshTransport {
    handle: Handle<ClientHandler>,
}

#[async_trait]
impl Transport for SshTransport {
    async fn run(&mut self, command: &str) -> Result<ExecStream, TransportError> {
        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| TransportError::ChannelFailure(e.to_string()))?;
        channel
            .exec(true, command)
            .await
            .map_err(|e| TransportError::ChannelFailure(e.to_string()))?;

        let (tx, rx) = mpsc::channel(EXEC_EVENT_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            while let Some(msg) = channel.wait().await {
                let event = match msg {
                    // stdout and stderr are merged in arrival order
                    ChannelMsg::Data { ref data } => StreamEvent::Output(Bytes::copy_from_slice(data)),
                    ChannelMsg::ExtendedData { ref data, .. } => {
                        StreamEvent::Output(Bytes::copy_from_slice(data))
                    }
                    ChannelMsg::ExitStatus { exit_status } => StreamEvent::Exit(exit_status),
                    _ => continue,
                };
                if tx.send(event).await.is_err() {
                    // Receiver dropped; stop reading
                    break;
                }
            }
            // wait() yields None on close without distinguishing a
            // finished command from a dropped connection; the session
            // checks is_alive() when the footer is missing. Dropping tx
            // ends the stream.
        });

        Ok(ExecStream::from_receiver(rx))
    }

    async fn interrupt(&mut self) -> Result<(), TransportError> {
        // An exec channel has no reliable signal delivery; most servers
        // ignore SSH_MSG_CHANNEL_SIGNAL for non-pty channels. Callers see
        // this limitation through supports_hard_interrupt().
        tracing::warn!("interrupt requested, but the exec transport cannot stop a running command");
        Ok(())
    }

    fn supports_hard_interrupt(&self) -> bool {
        false
    }

    fn is_alive(&self) -> bool {
        !self.handle.is_closed()
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
            .map_err(|e| TransportError::ConnectionLost(e.to_string()))
    }
}
