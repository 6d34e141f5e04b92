use controller::ProtocolError;
use inference::CatalogError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("{name} must be within [0, 1], got {value}")]
    OutOfRange { name: &'static str, value: f32 },

    #[error("invalid setting {name}: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("invalid protocol tokens: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("invalid class catalog: {0}")]
    Catalog(#[from] CatalogError),
}
