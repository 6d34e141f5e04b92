use crate::config::LinkConfig;
use crate::error::LinkError;
use crate::lines::LineAssembler;
use crate::protocol::{InboundMessage, ProtocolCommand, ProtocolTokens, log_diagnostic};
use crate::state_machine::{LinkEvent, LinkState, StateContext};
use crate::transport::{Transport, is_idle};
use common::{JoinOutcome, join_with_timeout};
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Invoked on the listener thread for every detection signal. Must return quickly.
pub type DetectionCallback = Box<dyn FnMut() + Send>;

/// Connection to the conveyor controller.
///
/// Implementations are shared between the listener, the inspection worker
/// and the CLI, so every method takes `&self`.
pub trait HardwareLink: Send + Sync {
    fn connect(&self) -> Result<(), LinkError>;

    /// Start the reader loop. Requires a connected link.
    fn start_listening(&self, on_detection: DetectionCallback) -> Result<(), LinkError>;

    fn stop_listening(&self);

    /// Write one command and flush. Never waits for a reply.
    fn send(&self, command: ProtocolCommand) -> Result<(), LinkError>;

    /// Stop listening, then close. Safe to call repeatedly.
    fn disconnect(&self);

    fn state(&self) -> LinkState;

    fn describe(&self) -> String;
}

type SharedReader = Arc<Mutex<Box<dyn Read + Send>>>;

const READ_CHUNK: usize = 256;
const MAX_DRAIN_READS: usize = 64;

struct Listener {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Inner {
    state: StateContext,
    reader: Option<SharedReader>,
    writer: Option<Box<dyn Write + Send>>,
    listener: Option<Listener>,
}

/// Line protocol over a real transport.
pub struct SerialLink {
    transport: Box<dyn Transport>,
    tokens: ProtocolTokens,
    settle: Duration,
    poll_interval: Duration,
    stop_timeout: Duration,
    inner: Mutex<Inner>,
}

impl SerialLink {
    pub fn new(transport: Box<dyn Transport>, config: &LinkConfig) -> Self {
        Self {
            transport,
            tokens: config.tokens.clone(),
            settle: config.settle(),
            poll_interval: config.poll_interval(),
            stop_timeout: config.stop_timeout(),
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl HardwareLink for SerialLink {
    fn connect(&self) -> Result<(), LinkError> {
        {
            let mut inner = self.lock();
            if inner.state.update(LinkEvent::ConnectStarted).is_none() {
                tracing::debug!(state = ?inner.state.current_state(), "Connect ignored");
                return Ok(());
            }
        }

        // Open, settle and drain without the lock so `state` and `send` stay
        // responsive; `Connecting` keeps other connect calls out.
        let target = self.transport.describe();
        tracing::info!(target = %target, "Connecting to controller");

        let connection = match self.transport.open() {
            Ok(c) => c,
            Err(source) => {
                self.lock().state.update(LinkEvent::ConnectFailed);
                tracing::error!(target = %target, error = %source, "Failed to open link");
                return Err(LinkError::Open { target, source });
            }
        };

        // The controller resets when the port opens; give it time to boot.
        thread::sleep(self.settle);

        let mut reader = connection.reader;
        let drained = drain(&mut reader);
        if drained > 0 {
            tracing::debug!(bytes = drained, "Discarded stale input");
        }

        let mut inner = self.lock();
        inner.reader = Some(Arc::new(Mutex::new(reader)));
        inner.writer = Some(connection.writer);
        inner.state.update(LinkEvent::ConnectSucceeded);

        tracing::info!(target = %target, "Link connected");
        Ok(())
    }

    fn start_listening(&self, on_detection: DetectionCallback) -> Result<(), LinkError> {
        let mut inner = self.lock();
        match inner.state.current_state() {
            LinkState::Listening => return Err(LinkError::AlreadyListening),
            LinkState::Connected => {}
            _ => return Err(LinkError::NotConnected),
        }
        let reader = inner.reader.clone().ok_or(LinkError::NotConnected)?;

        let stop = Arc::new(AtomicBool::new(false));
        let handle = thread::Builder::new()
            .name("link-listener".into())
            .spawn({
                let stop = Arc::clone(&stop);
                let tokens = self.tokens.clone();
                let poll = self.poll_interval;
                move || listen_loop(reader, stop, tokens, poll, on_detection)
            })
            .map_err(LinkError::Spawn)?;

        inner.listener = Some(Listener { stop, handle });
        inner.state.update(LinkEvent::ListenStarted);
        tracing::info!("Listening for detection signals");
        Ok(())
    }

    fn stop_listening(&self) {
        let Some(listener) = self.lock().listener.take() else {
            return;
        };

        listener.stop.store(true, Ordering::Release);
        let outcome = join_with_timeout(listener.handle, self.stop_timeout, "link-listener");

        let mut inner = self.lock();
        if outcome == JoinOutcome::TimedOut {
            // The detached thread still holds the reader; a new one cannot share it.
            inner.reader = None;
        }
        inner.state.update(LinkEvent::ListenStopped);
        tracing::info!(?outcome, "Listener stopped");
    }

    fn send(&self, command: ProtocolCommand) -> Result<(), LinkError> {
        let frame = self.tokens.frame(command);
        let mut inner = self.lock();
        if !inner.state.is_open() {
            return Err(LinkError::NotConnected);
        }
        let writer = inner.writer.as_mut().ok_or(LinkError::NotConnected)?;

        writer
            .write_all(&frame)
            .and_then(|_| writer.flush())
            .map_err(LinkError::Write)?;

        tracing::debug!(%command, token = self.tokens.outbound(command), "Command sent");
        Ok(())
    }

    fn disconnect(&self) {
        self.stop_listening();

        let mut inner = self.lock();
        inner.reader = None;
        inner.writer = None;
        if inner.state.update(LinkEvent::Closed).is_some() {
            tracing::info!("Link disconnected");
        }
    }

    fn state(&self) -> LinkState {
        self.lock().state.current_state()
    }

    fn describe(&self) -> String {
        self.transport.describe()
    }
}

impl Drop for SerialLink {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Read and discard whatever is already buffered.
fn drain(reader: &mut Box<dyn Read + Send>) -> usize {
    let mut buf = [0u8; READ_CHUNK];
    let mut total = 0;
    for _ in 0..MAX_DRAIN_READS {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(_) => break,
        }
    }
    total
}

fn listen_loop(
    reader: SharedReader,
    stop: Arc<AtomicBool>,
    tokens: ProtocolTokens,
    poll: Duration,
    mut on_detection: DetectionCallback,
) {
    let mut assembler = LineAssembler::new();
    let mut buf = [0u8; READ_CHUNK];
    let mut eof_reported = false;

    while !stop.load(Ordering::Acquire) {
        let result = {
            let mut reader = reader.lock().unwrap_or_else(|p| p.into_inner());
            reader.read(&mut buf)
        };

        match result {
            Ok(0) => {
                if !eof_reported {
                    tracing::warn!("Controller closed the stream");
                    eof_reported = true;
                }
                thread::sleep(poll);
            }
            Ok(n) => {
                eof_reported = false;
                for line in assembler.push(&buf[..n]) {
                    match tokens.parse(&line) {
                        InboundMessage::DetectionSignal => {
                            tracing::debug!("Detection signal received");
                            on_detection();
                        }
                        InboundMessage::Status(text) => {
                            tracing::info!(status = text, "Controller status");
                        }
                        InboundMessage::Diagnostic { prefix, text } => log_diagnostic(prefix, text),
                        InboundMessage::Unrecognized => {
                            tracing::trace!(line = %line, "Ignoring unrecognized line");
                        }
                    }
                }
            }
            Err(e) if is_idle(&e) => thread::sleep(poll),
            Err(e) => {
                tracing::warn!(error = %e, "Link read failed");
                thread::sleep(poll);
            }
        }
    }
}
