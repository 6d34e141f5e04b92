pub mod artifact;
pub mod backend;
pub mod catalog;
pub mod config;
pub mod decoder;
pub mod detection;
pub mod detector;
pub mod error;
pub mod nms;

pub use artifact::{ModelArtifact, RuntimeKind};
pub use backend::{InferenceBackend, InferenceOutput, LoadStatus, ModelRuntime};
pub use catalog::{ClassCatalog, Component};
pub use config::{ExecutionProvider, InferenceConfig};
pub use decoder::{DecoderSettings, OutputDecoder, ScoreActivation};
pub use detection::{BoundingBox, RawDetection};
pub use detector::Detector;
pub use error::{ArtifactError, CatalogError, DecodeError};
pub use nms::SuppressionFilter;
