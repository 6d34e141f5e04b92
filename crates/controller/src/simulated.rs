use crate::error::LinkError;
use crate::link::{DetectionCallback, HardwareLink};
use crate::protocol::ProtocolCommand;
use crate::state_machine::{LinkEvent, LinkState, StateContext};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct Inner {
    state: StateContext,
    sent: Vec<ProtocolCommand>,
    callback: Option<DetectionCallback>,
}

/// Stand-in for the controller when no hardware is attached.
///
/// Accepts every command without I/O and records it. Detection signals can be
/// injected with [`SimulatedLink::trigger`].
#[derive(Default)]
pub struct SimulatedLink {
    inner: Mutex<Inner>,
}

impl SimulatedLink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Deliver a detection signal as if it arrived on the wire.
    ///
    /// Returns false when the link is not listening.
    pub fn trigger(&self) -> bool {
        let Some(mut callback) = self.lock().callback.take() else {
            return false;
        };

        callback();

        let mut inner = self.lock();
        if inner.state.current_state() == LinkState::Listening && inner.callback.is_none() {
            inner.callback = Some(callback);
        }
        true
    }

    pub fn sent_commands(&self) -> Vec<ProtocolCommand> {
        self.lock().sent.clone()
    }
}

impl HardwareLink for SimulatedLink {
    fn connect(&self) -> Result<(), LinkError> {
        let mut inner = self.lock();
        if inner.state.update(LinkEvent::ConnectStarted).is_some() {
            inner.state.update(LinkEvent::ConnectSucceeded);
            tracing::info!("Simulated link connected");
        }
        Ok(())
    }

    fn start_listening(&self, on_detection: DetectionCallback) -> Result<(), LinkError> {
        let mut inner = self.lock();
        match inner.state.current_state() {
            LinkState::Listening => Err(LinkError::AlreadyListening),
            LinkState::Connected => {
                inner.callback = Some(on_detection);
                inner.state.update(LinkEvent::ListenStarted);
                Ok(())
            }
            _ => Err(LinkError::NotConnected),
        }
    }

    fn stop_listening(&self) {
        let mut inner = self.lock();
        inner.callback = None;
        inner.state.update(LinkEvent::ListenStopped);
    }

    fn send(&self, command: ProtocolCommand) -> Result<(), LinkError> {
        let mut inner = self.lock();
        if !inner.state.is_open() {
            return Err(LinkError::NotConnected);
        }
        inner.sent.push(command);
        tracing::info!(%command, "Simulated command");
        Ok(())
    }

    fn disconnect(&self) {
        self.stop_listening();
        self.lock().state.update(LinkEvent::Closed);
    }

    fn state(&self) -> LinkState {
        self.lock().state.current_state()
    }

    fn describe(&self) -> String {
        "simulated".to_string()
    }
}
