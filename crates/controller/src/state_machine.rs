#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
    Listening,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    ConnectStarted,
    ConnectSucceeded,
    ConnectFailed,
    ListenStarted,
    ListenStopped,
    Closed,
}

pub struct StateContext {
    current_state: LinkState,
}

impl StateContext {
    pub fn new() -> Self {
        Self {
            current_state: LinkState::Disconnected,
        }
    }

    /// Apply an event. Returns the new state when it changed; events that are
    /// not valid from the current state are ignored.
    pub fn update(&mut self, event: LinkEvent) -> Option<LinkState> {
        let old_state = self.current_state;

        self.current_state = match (self.current_state, event) {
            (LinkState::Disconnected, LinkEvent::ConnectStarted) => LinkState::Connecting,
            (LinkState::Connecting, LinkEvent::ConnectSucceeded) => LinkState::Connected,
            (LinkState::Connecting, LinkEvent::ConnectFailed) => LinkState::Disconnected,
            (LinkState::Connected, LinkEvent::ListenStarted) => LinkState::Listening,
            (LinkState::Listening, LinkEvent::ListenStopped) => LinkState::Connected,
            (LinkState::Connected, LinkEvent::Closed) => LinkState::Disconnected,
            (state, _) => state,
        };

        if old_state != self.current_state {
            tracing::debug!(from = ?old_state, to = ?self.current_state, ?event, "Link state transition");
            Some(self.current_state)
        } else {
            None
        }
    }

    pub fn current_state(&self) -> LinkState {
        self.current_state
    }

    /// Connected or listening: the transport is open and commands can be sent.
    pub fn is_open(&self) -> bool {
        matches!(
            self.current_state,
            LinkState::Connected | LinkState::Listening
        )
    }
}

impl Default for StateContext {
    fn default() -> Self {
        Self::new()
    }
}
