pub mod config;
pub mod error;
pub mod lines;
pub mod link;
pub mod protocol;
pub mod simulated;
pub mod state_machine;
pub mod transport;

pub use config::{LinkConfig, TransportKind};
pub use error::{LinkError, ProtocolError};
pub use link::{DetectionCallback, HardwareLink, SerialLink};
pub use protocol::{InboundMessage, ProtocolCommand, ProtocolTokens};
pub use simulated::SimulatedLink;
pub use state_machine::LinkState;
pub use transport::{Connection, DeviceTransport, TcpTransport, Transport};

use std::sync::Arc;

/// Build and connect the configured link.
///
/// A failed connection falls back to [`SimulatedLink`] when
/// `fallback_to_simulated` is set, otherwise the error is returned.
pub fn establish(config: &LinkConfig) -> Result<Arc<dyn HardwareLink>, LinkError> {
    let transport: Box<dyn Transport> = match config.transport {
        TransportKind::Simulated => {
            let link = SimulatedLink::new();
            link.connect()?;
            return Ok(Arc::new(link));
        }
        TransportKind::Device => Box::new(DeviceTransport::new(config.device.clone())),
        TransportKind::Tcp => Box::new(TcpTransport::new(
            config.address.clone(),
            config.poll_interval(),
        )),
    };

    let link = SerialLink::new(transport, config);
    match link.connect() {
        Ok(()) => Ok(Arc::new(link)),
        Err(e) if config.fallback_to_simulated => {
            tracing::warn!(error = %e, "Controller unavailable, using simulated link");
            let fallback = SimulatedLink::new();
            fallback.connect()?;
            Ok(Arc::new(fallback))
        }
        Err(e) => Err(e),
    }
}

/// Connect to the real controller only. An unreachable controller is an
/// error even when `fallback_to_simulated` is set.
pub fn establish_hardware(config: &LinkConfig) -> Result<Arc<dyn HardwareLink>, LinkError> {
    establish(&LinkConfig {
        fallback_to_simulated: false,
        ..config.clone()
    })
}
