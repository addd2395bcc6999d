//! Scripted transport fake for session tests
//!
//! Plays back canned replies for each invocation. The fake extracts the
//! marker out of the envelope it receives and formats the footer with
//! it, so the session under test sees exactly what a remote bash
//! running the real envelope would produce.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{mpsc, Notify};

use remsh_core::{Connector, ExecStream, StreamEvent, Transport, TransportError};
use remsh_protocol::ENV_DELIMITER;

/// Scripted reply for one invocation
pub struct CannedReply {
    /// Raw user-output chunks, possibly splitting lines
    pub chunks: Vec<Vec<u8>>,
    pub exit_code: i32,
    pub pwd: String,
    /// Full environment dump reported by the footer
    pub env: Vec<(String, String)>,
    /// When false, the stream ends before any footer line (truncation)
    pub emit_footer: bool,
    /// When true, the footer drops its `code:` line
    pub omit_code: bool,
    /// When set, `run` fails with this error instead of streaming
    pub fault: Option<TransportError>,
    /// When set, the stream emits this fault after the output chunks
    /// instead of a footer
    pub midstream_fault: Option<TransportError>,
    /// When set, each output chunk after the first is withheld until
    /// the gate is notified (the test notifies from inside `emit`)
    pub gate: Option<Arc<Notify>>,
}

impl CannedReply {
    pub fn ok(pwd: &str, env: &[(&str, &str)]) -> Self {
        Self {
            chunks: Vec::new(),
            exit_code: 0,
            pwd: pwd.to_string(),
            env: env
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            emit_footer: true,
            omit_code: false,
            fault: None,
            midstream_fault: None,
            gate: None,
        }
    }

    /// The connect-time baseline probe's reply
    pub fn probe() -> Self {
        Self::ok("/home/test", &[("HOME", "/home/test"), ("TERM", "xterm")])
    }

    pub fn with_line(mut self, text: &str) -> Self {
        self.chunks.push(format!("{text}\n").into_bytes());
        self
    }

    pub fn with_chunk(mut self, raw: &[u8]) -> Self {
        self.chunks.push(raw.to_vec());
        self
    }

    pub fn exit(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }

    pub fn truncated(mut self) -> Self {
        self.emit_footer = false;
        self
    }

    pub fn without_code(mut self) -> Self {
        self.omit_code = true;
        self
    }

    pub fn fault(err: TransportError) -> Self {
        Self {
            fault: Some(err),
            ..Self::ok("/", &[])
        }
    }

    pub fn fault_after_output(mut self, err: TransportError) -> Self {
        self.midstream_fault = Some(err);
        self
    }

    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    fn footer(&self, marker: &str) -> String {
        let dump = self
            .env
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(ENV_DELIMITER);

        let mut footer = String::new();
        if !self.omit_code {
            footer.push_str(&format!("{marker}code: {}\n", self.exit_code));
        }
        footer.push_str(&format!("{marker}pwd: {}\n", self.pwd));
        footer.push_str(&format!("{marker}env: {dump}\n"));
        footer
    }
}

#[derive(Default)]
struct Shared {
    replies: Mutex<VecDeque<CannedReply>>,
    commands: Mutex<Vec<String>>,
    connects: AtomicUsize,
}

/// Connector handing out transports that replay the shared script
#[derive(Clone, Default)]
pub struct FakeConnector {
    shared: Arc<Shared>,
}

impl FakeConnector {
    pub fn scripted(replies: Vec<CannedReply>) -> Self {
        let connector = Self::default();
        *connector.shared.replies.lock().unwrap() = replies.into();
        connector
    }

    /// Number of times `connect` was called
    pub fn connect_count(&self) -> usize {
        self.shared.connects.load(Ordering::SeqCst)
    }

    /// Every wire command any transport received, in order
    pub fn commands(&self) -> Vec<String> {
        self.shared.commands.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for FakeConnector {
    type Transport = FakeTransport;

    async fn connect(&self, _host: &str) -> Result<FakeTransport, TransportError> {
        self.shared.connects.fetch_add(1, Ordering::SeqCst);
        Ok(FakeTransport {
            shared: Arc::clone(&self.shared),
            alive: AtomicBool::new(true),
        })
    }
}

pub struct FakeTransport {
    shared: Arc<Shared>,
    alive: AtomicBool,
}

/// Pull the marker back out of a received envelope
fn extract_marker(command: &str) -> String {
    command
        .split("code: $EXIT_CODE")
        .next()
        .and_then(|before| before.rsplit("echo ").next())
        .expect("command is not a marker envelope")
        .to_string()
}

#[async_trait]
impl Transport for FakeTransport {
    async fn run(&mut self, command: &str) -> Result<ExecStream, TransportError> {
        self.shared
            .commands
            .lock()
            .unwrap()
            .push(command.to_string());

        let mut reply = self
            .shared
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .expect("script exhausted: unexpected invocation");

        if let Some(fault) = reply.fault {
            self.alive.store(false, Ordering::SeqCst);
            return Err(fault);
        }

        let marker = extract_marker(command);
        let mut events: Vec<StreamEvent> = reply
            .chunks
            .iter()
            .map(|chunk| StreamEvent::Output(Bytes::copy_from_slice(chunk)))
            .collect();
        if let Some(fault) = reply.midstream_fault.take() {
            self.alive.store(false, Ordering::SeqCst);
            events.push(StreamEvent::Fault(fault));
        } else {
            if reply.emit_footer {
                events.push(StreamEvent::Output(Bytes::from(reply.footer(&marker))));
            }
            events.push(StreamEvent::Exit(0));
        }

        if let Some(gate) = reply.gate.take() {
            // Withhold each output chunk after the first until the gate
            // fires; a session that buffered lines until stream end
            // would never fire it and the invocation would never finish.
            let (tx, rx) = mpsc::channel(1);
            tokio::spawn(async move {
                let mut sent_output = false;
                for event in events {
                    let is_output = matches!(event, StreamEvent::Output(_));
                    if is_output && sent_output {
                        gate.notified().await;
                    }
                    if tx.send(event).await.is_err() {
                        return;
                    }
                    sent_output |= is_output;
                }
            });
            return Ok(ExecStream::from_receiver(rx));
        }

        let (tx, rx) = mpsc::channel(events.len() + 1);
        for event in events {
            tx.try_send(event).expect("scripted stream overflow");
        }
        // Dropping tx ends the stream
        Ok(ExecStream::from_receiver(rx))
    }

    async fn interrupt(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.alive.store(false, Ordering::SeqCst);
        Ok(())
    }
}
