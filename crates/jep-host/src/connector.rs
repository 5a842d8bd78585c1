//! Frontend connector state machine (spec §4.H).
//!
//! Grounded in `examples/original_source/jep_py/frontend.py`'s
//! `BackendConnection`: a single cooperative per-peer loop that spawns the
//! backend process, discovers its announced port, maintains a TCP socket,
//! and ticks itself forward one state at a time. The only other thread
//! involved is the [`crate::output_reader::OutputReader`] feeding backend
//! stdout/stderr lines; everything else — including every listener
//! invocation — runs on the thread that owns the connector (spec §5).

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use jep_config::Config;
use jep_protocol::{Decoder, Message, MessageListener};
use regex::Regex;
use uuid::Uuid;

use crate::error::ConnectorError;
use crate::output_reader::OutputReader;
use crate::state::ConnectionState;

const CONNECTOR_TARGET: &str = "jep_host::connector";
const TICK_INTERVAL: Duration = Duration::from_millis(20);
const RECV_CHUNK: usize = 4096;

fn port_announcement_pattern() -> Regex {
    #[expect(
        clippy::unwrap_used,
        reason = "pattern is a fixed literal verified by the accompanying unit tests"
    )]
    Regex::new(r"JEP service, listening on port (\d+)").unwrap()
}

fn message_token(message: &Message) -> Option<&str> {
    match message {
        Message::CompletionRequest(inner) => inner.token.as_deref(),
        Message::CompletionResponse(inner) => inner.token.as_deref(),
        _ => None,
    }
}

fn set_token(message: &mut Message, token: String) -> Option<&'static str> {
    match message {
        Message::CompletionRequest(inner) => {
            inner.token = Some(token);
            None
        }
        Message::CompletionResponse(inner) => {
            inner.token = Some(token);
            None
        }
        _ => Some("message variant has no token field"),
    }
}

/// Spawns the backend child process for a connector. The default
/// [`SystemProcessLauncher`] is swapped for a test double in unit tests.
pub trait ProcessLauncher: Send {
    /// Spawns `command` (already a whole command line) with `cwd` as its
    /// working directory, with stdout/stderr piped and stdin closed.
    fn spawn(&self, command: &str, cwd: &Path) -> io::Result<Child>;
}

/// Spawns a real OS process, tokenizing `command` on whitespace.
///
/// The corpus carries no shell-quoting tokenizer crate (no `shlex` or
/// `shell-words` anywhere in the retrieved examples), so quoting inside the
/// command string is not honoured — a documented simplification of spec
/// §4.H's "tokenized respecting platform quoting".
pub struct SystemProcessLauncher;

impl ProcessLauncher for SystemProcessLauncher {
    fn spawn(&self, command: &str, cwd: &Path) -> io::Result<Child> {
        let mut parts = command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty backend command"))?;

        let mut builder = Command::new(program);
        builder
            .args(parts)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            builder.creation_flags(CREATE_NO_WINDOW);
        }

        builder.spawn()
    }
}

/// A resolved backend launch target: the command line and the directory it
/// should run in (normally the `.jep` file's directory).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceTarget {
    /// Command line to launch the backend with.
    pub command: String,
    /// Working directory for the spawned process.
    pub cwd: std::path::PathBuf,
}

/// State shared with listeners during dispatch (spec §4.H "state change
/// notifications" and per-message `invoke`).
///
/// Deliberately narrower than the whole [`Connector`]: it excludes the
/// listener list itself, so a dispatch loop can hold `&mut self.listeners`
/// and `&mut self.core` at once without the borrow checker rejecting it.
pub struct ConnectorCore {
    target: ServiceTarget,
    state: ConnectionState,
    state_entered_at: Instant,
    reconnect_expected: bool,
    process: Option<Child>,
    output_reader: Option<OutputReader>,
    socket: Option<TcpStream>,
    decoder: Decoder,
    port: Option<u16>,
    current_request_token: Option<String>,
    current_request_response: Option<Message>,
    startup_timeout: Duration,
    shutdown_timeout: Duration,
    idle_timeout: Duration,
}

impl ConnectorCore {
    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Sends `message` to the backend if connected; logs and drops on
    /// serialization or I/O failure, per spec §4.H `sendMessage`.
    pub fn send_message(&mut self, message: &Message) {
        if self.state != ConnectionState::Connected {
            tracing::warn!(target: CONNECTOR_TARGET, "sendMessage called while not connected");
            return;
        }
        let Some(socket) = self.socket.as_mut() else {
            return;
        };
        let bytes = jep_protocol::encode(message);
        if let Err(error) = socket.write_all(&bytes) {
            tracing::warn!(target: CONNECTOR_TARGET, %error, "failed to send message, dropping");
        }
    }
}

/// Visitor hook for connection-state transitions, mirroring
/// `jep_py.frontend.BackendListener.on_connection_state_changed`.
#[allow(unused_variables, reason = "default methods intentionally ignore their arguments")]
pub trait ConnectorListener: MessageListener<ConnectorCore> {
    /// Called after every state transition, including the initial
    /// `Disconnected -> Connecting` on `connect()`.
    fn on_connection_state_changed(
        &mut self,
        previous: ConnectionState,
        current: ConnectionState,
        core: &mut ConnectorCore,
    ) {
    }
}

struct NoOpFrontendHandler;
impl MessageListener<ConnectorCore> for NoOpFrontendHandler {}
impl ConnectorListener for NoOpFrontendHandler {}

/// Drives one backend connection's lifecycle (spec §4.H).
pub struct Connector {
    core: ConnectorCore,
    listeners: Vec<Box<dyn ConnectorListener>>,
    launcher: Box<dyn ProcessLauncher>,
    pending_target: Option<ServiceTarget>,
}

impl Connector {
    /// Builds a connector for `target`, idle until [`Connector::connect`]
    /// is called.
    #[must_use]
    pub fn new(target: ServiceTarget, config: &Config) -> Self {
        Self::with_launcher(target, config, Box::new(SystemProcessLauncher))
    }

    /// As [`Connector::new`], but with an injectable process launcher —
    /// the seam unit tests use to avoid spawning real subprocesses.
    #[must_use]
    pub fn with_launcher(
        target: ServiceTarget,
        config: &Config,
        launcher: Box<dyn ProcessLauncher>,
    ) -> Self {
        Self {
            core: ConnectorCore {
                target,
                state: ConnectionState::Disconnected,
                state_entered_at: Instant::now(),
                reconnect_expected: false,
                process: None,
                output_reader: None,
                socket: None,
                decoder: Decoder::default(),
                port: None,
                current_request_token: None,
                current_request_response: None,
                startup_timeout: config.backend_startup_timeout(),
                shutdown_timeout: config.backend_shutdown_timeout(),
                idle_timeout: config.last_message_timeout(),
            },
            listeners: Vec::new(),
            launcher,
            pending_target: None,
        }
    }

    /// Registers a listener, invoked in registration order after the
    /// built-in frontend-level handler (spec §5 "Ordering").
    pub fn add_listener(&mut self, listener: Box<dyn ConnectorListener>) {
        self.listeners.push(listener);
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.core.state
    }

    /// No-op unless `Disconnected`.
    pub fn connect(&mut self) {
        if self.core.state != ConnectionState::Disconnected {
            return;
        }
        self.transition(ConnectionState::Connecting);
    }

    /// Clears "reconnect expected", sends `Shutdown` best-effort, and
    /// transitions to `Disconnecting`. No-op when already `Disconnected`.
    pub fn disconnect(&mut self) {
        if self.core.state == ConnectionState::Disconnected {
            return;
        }
        self.core.reconnect_expected = false;
        self.send_shutdown_best_effort();
        self.transition(ConnectionState::Disconnecting);
    }

    /// Like [`Connector::disconnect`], but sets "reconnect expected" and
    /// optionally replaces the launch target for the next `connect()`.
    pub fn reconnect(&mut self, new_target: Option<ServiceTarget>) {
        if let Some(target) = new_target {
            self.pending_target = Some(target);
        }
        self.core.reconnect_expected = true;
        if self.core.state == ConnectionState::Disconnected {
            self.connect();
            return;
        }
        self.send_shutdown_best_effort();
        self.transition(ConnectionState::Disconnecting);
    }

    /// Sends `message`; legal only in `Connected` (see
    /// [`ConnectorCore::send_message`]).
    pub fn send_message(&mut self, message: &Message) {
        self.core.send_message(message);
    }

    /// Issues a correlated request and blocks (ticking the state machine)
    /// until a response with a matching token arrives or `duration`
    /// elapses. Only one request may be in flight at a time; a second call
    /// while one is pending logs a warning and returns `None` immediately.
    pub fn request_message(&mut self, mut message: Message, duration: Duration) -> Option<Message> {
        if self.core.state != ConnectionState::Connected {
            tracing::warn!(target: CONNECTOR_TARGET, "requestMessage called while not connected");
            return None;
        }
        if self.core.current_request_token.is_some() {
            tracing::warn!(
                target: CONNECTOR_TARGET,
                "requestMessage called while another request is in flight; skipping"
            );
            return None;
        }

        let token = message_token(&message)
            .map(str::to_owned)
            .unwrap_or_else(|| Uuid::new_v4().simple().to_string());
        if let Some(reason) = set_token(&mut message, token.clone()) {
            tracing::warn!(target: CONNECTOR_TARGET, reason, "requestMessage called with an untokenable message");
            return None;
        }

        self.core.current_request_token = Some(token);
        self.send_message(&message);
        let response = self.run(duration);
        self.core.current_request_token = None;
        response
    }

    /// Ticks the state machine in small steps until either `duration`
    /// elapses or an in-flight request's response arrives.
    pub fn run(&mut self, duration: Duration) -> Option<Message> {
        let deadline = Instant::now() + duration;
        loop {
            self.tick();
            if let Some(response) = self.core.current_request_response.take() {
                return Some(response);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            thread::sleep(TICK_INTERVAL.min(deadline.saturating_duration_since(now)));
        }
    }

    fn tick(&mut self) {
        match self.core.state {
            ConnectionState::Disconnected => {}
            ConnectionState::Connecting => self.tick_connecting(),
            ConnectionState::Connected => self.tick_connected(),
            ConnectionState::Disconnecting => self.tick_disconnecting(),
        }
    }

    fn tick_connecting(&mut self) {
        if self.core.process.is_none() {
            match self.spawn_backend() {
                Ok(()) => {}
                Err(error) => {
                    tracing::warn!(
                        target: CONNECTOR_TARGET,
                        error = %ConnectorError::Spawn(error),
                        "backend spawn failed"
                    );
                    self.core.reconnect_expected = false;
                    self.cleanup();
                    return;
                }
            }
        }

        if let Some(reader) = &self.core.output_reader {
            let pattern = port_announcement_pattern();
            while let Some(line) = reader.try_pop() {
                if let Some(captures) = pattern.captures(&line)
                    && let Some(port) = captures.get(1).and_then(|m| m.as_str().parse().ok())
                {
                    self.core.port = Some(port);
                    break;
                }
            }
        }

        if let Some(port) = self.core.port {
            match connect_socket(port, self.core.startup_timeout) {
                Ok(socket) => {
                    self.core.socket = Some(socket);
                    self.core.reconnect_expected = true;
                    self.transition(ConnectionState::Connected);
                }
                Err(source) => {
                    tracing::warn!(
                        target: CONNECTOR_TARGET,
                        error = %ConnectorError::Connect { port, source },
                        "connect failed"
                    );
                    self.cleanup();
                }
            }
            return;
        }

        if self.core.state_entered_at.elapsed() >= self.core.startup_timeout {
            tracing::warn!(target: CONNECTOR_TARGET, "backend startup timed out waiting for port announcement");
            self.cleanup();
        }
    }

    fn spawn_backend(&mut self) -> io::Result<()> {
        let mut child = self
            .launcher
            .spawn(&self.core.target.command, &self.core.target.cwd)?;
        if let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) {
            self.core.output_reader = Some(OutputReader::spawn(stdout, stderr));
        }
        self.core.process = Some(child);
        Ok(())
    }

    fn tick_connected(&mut self) {
        self.drain_output_to_debug();

        let Some(mut socket) = self.core.socket.take() else {
            self.cleanup();
            return;
        };

        let mut buffer = [0_u8; RECV_CHUNK];
        let mut received_any = false;
        let mut peer_gone = false;
        loop {
            match socket.read(&mut buffer) {
                Ok(0) => {
                    tracing::debug!(target: CONNECTOR_TARGET, "peer closed the connection");
                    peer_gone = true;
                    break;
                }
                Ok(n) => {
                    received_any = true;
                    self.core.decoder.push(&buffer[..n]);
                }
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => break,
                Err(error) => {
                    tracing::warn!(target: CONNECTOR_TARGET, %error, "connection read failed");
                    peer_gone = true;
                    break;
                }
            }
        }
        self.core.socket = Some(socket);

        if peer_gone {
            self.cleanup();
            return;
        }

        if received_any {
            self.core.state_entered_at = Instant::now();
        }

        let messages = match self.core.decoder.drain() {
            Ok(messages) => messages,
            Err(error) => {
                tracing::warn!(target: CONNECTOR_TARGET, %error, "discarding malformed frame");
                Vec::new()
            }
        };

        for message in &messages {
            self.dispatch(message);
        }

        if self.core.state_entered_at.elapsed() >= self.core.idle_timeout {
            tracing::warn!(target: CONNECTOR_TARGET, "idle timeout exceeded, reconnecting");
            self.reconnect(None);
        }
    }

    fn tick_disconnecting(&mut self) {
        self.drain_output_to_debug();

        let exited = match self.core.process.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(Some(_))),
            None => true,
        };

        if exited {
            self.cleanup();
            return;
        }

        if self.core.state_entered_at.elapsed() >= self.core.shutdown_timeout {
            tracing::warn!(target: CONNECTOR_TARGET, "graceful shutdown timed out, killing backend");
            if let Some(child) = self.core.process.as_mut() {
                let _ignored = child.kill();
            }
            self.cleanup();
        }
    }

    fn dispatch(&mut self, message: &Message) {
        message.invoke(&mut NoOpFrontendHandler, &mut self.core);
        for listener in &mut self.listeners {
            message.invoke(listener.as_mut(), &mut self.core);
        }
        if self.core.current_request_token.is_some()
            && message_token(message) == self.core.current_request_token.as_deref()
        {
            self.core.current_request_response = Some(message.clone());
        }
    }

    fn drain_output_to_debug(&self) {
        let Some(reader) = &self.core.output_reader else {
            return;
        };
        while let Some(line) = reader.try_pop() {
            tracing::debug!(target: CONNECTOR_TARGET, line = line.trim_end(), "backend output");
        }
    }

    fn send_shutdown_best_effort(&mut self) {
        if self.core.state == ConnectionState::Connected {
            self.core
                .send_message(&Message::Shutdown(jep_protocol::messages::Shutdown));
        }
    }

    fn transition(&mut self, next: ConnectionState) {
        let previous = self.core.state;
        self.core.state = next;
        self.core.state_entered_at = Instant::now();
        for listener in &mut self.listeners {
            listener.on_connection_state_changed(previous, next, &mut self.core);
        }
    }

    fn cleanup(&mut self) {
        if let Some(mut socket) = self.core.socket.take() {
            let _ignored = socket.shutdown(std::net::Shutdown::Both);
        }
        if let Some(mut process) = self.core.process.take() {
            let _ignored = process.kill();
            let _ignored = process.wait();
        }
        if let Some(reader) = self.core.output_reader.take()
            && !reader.join(Duration::from_millis(200))
        {
            tracing::warn!(target: CONNECTOR_TARGET, "output reader did not stop in time");
        }
        self.core.port = None;
        self.core.current_request_token = None;
        self.core.current_request_response = None;
        if let Some(target) = self.pending_target.take() {
            self.core.target = target;
        }
        self.transition(ConnectionState::Disconnected);
        if self.core.reconnect_expected {
            self.connect();
        }
    }
}

fn connect_socket(port: u16, timeout: Duration) -> io::Result<TcpStream> {
    let address = std::net::SocketAddr::from(([127, 0, 0, 1], port));
    let socket = TcpStream::connect_timeout(&address, timeout)?;
    socket.set_nonblocking(true)?;
    Ok(socket)
}

#[cfg(test)]
mod tests {
    #![expect(clippy::unwrap_used, reason = "tests use unwrap for clarity")]

    use super::*;

    #[test]
    fn extracts_port_from_announcement_among_other_lines() {
        let pattern = port_announcement_pattern();
        let lines = ["Nothing special to say.", "JEP service, listening on port 4711"];
        let port: u16 = lines
            .iter()
            .find_map(|line| pattern.captures(line))
            .and_then(|captures| captures.get(1))
            .and_then(|m| m.as_str().parse().ok())
            .unwrap();
        assert_eq!(port, 4711);
    }

    #[test]
    fn token_is_assigned_when_absent() {
        let mut request = Message::CompletionRequest(jep_protocol::messages::CompletionRequest {
            file: "f".to_string(),
            pos: 0,
            limit: None,
            token: None,
        });
        assert!(set_token(&mut request, "abc".to_string()).is_none());
        assert_eq!(message_token(&request), Some("abc"));
    }

    #[test]
    fn unit_variants_have_no_token() {
        let shutdown = Message::Shutdown(jep_protocol::messages::Shutdown);
        assert_eq!(message_token(&shutdown), None);
        let mut shutdown = shutdown;
        assert!(set_token(&mut shutdown, "abc".to_string()).is_some());
    }
}
