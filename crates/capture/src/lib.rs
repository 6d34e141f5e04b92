pub mod camera;
pub mod config;
pub mod decoder;
pub mod device;
pub mod error;
pub mod frame;
pub mod source;
pub mod synthetic;

pub use camera::CameraSource;
pub use config::{CaptureConfig, SourceKind, SyntheticConfig};
pub use decoder::{FrameDecoder, MjpegDecoder, YuyvDecoder};
pub use device::{CameraDevice, CaptureFormat};
pub use error::CaptureError;
pub use frame::{ColorOrder, Frame};
pub use source::{FrameSource, LatestFrame};
pub use synthetic::SyntheticSource;
