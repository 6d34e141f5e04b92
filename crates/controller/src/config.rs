use crate::protocol::ProtocolTokens;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Serial character device.
    #[default]
    Device,
    /// Serial-over-TCP bridge.
    Tcp,
    /// No hardware; commands are only logged.
    Simulated,
}

/// Controller link settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    pub transport: TransportKind,
    /// Default `/dev/ttyUSB0`.
    pub device: PathBuf,
    /// `host:port` of the TCP bridge. Default `127.0.0.1:7000`.
    pub address: String,
    /// Wait after opening for the controller to boot. Default 2000 ms.
    pub settle_ms: u64,
    /// Listener sleep when no bytes are available. Default 10 ms.
    pub poll_interval_ms: u64,
    /// Bound on joining the listener thread. Default 1500 ms.
    pub stop_timeout_ms: u64,
    /// Use the simulated link when the real one fails to connect. Default true.
    pub fallback_to_simulated: bool,
    /// Send start-conveyor once the inspection loop is running. Default false.
    pub start_conveyor_on_run: bool,
    pub tokens: ProtocolTokens,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Device,
            device: PathBuf::from("/dev/ttyUSB0"),
            address: "127.0.0.1:7000".to_string(),
            settle_ms: 2000,
            poll_interval_ms: 10,
            stop_timeout_ms: 1500,
            fallback_to_simulated: true,
            start_conveyor_on_run: false,
            tokens: ProtocolTokens::default(),
        }
    }
}

impl LinkConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}
