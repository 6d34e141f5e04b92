pub mod native;
pub mod square;

use capture::Frame;
use ndarray::{ArrayD, IxDyn};
use serde::Deserialize;

pub use native::NativePreProcessor;
pub use square::SquarePreProcessor;

/// Memory layout of the batched image tensor fed to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TensorLayout {
    /// `[1, 3, H, W]`
    #[default]
    Nchw,
    /// `[1, H, W, 3]`
    Nhwc,
}

impl TensorLayout {
    pub fn shape(self, width: usize, height: usize) -> IxDyn {
        match self {
            TensorLayout::Nchw => IxDyn(&[1, 3, height, width]),
            TensorLayout::Nhwc => IxDyn(&[1, height, width, 3]),
        }
    }
}

/// Model input produced by a preprocessor.
#[derive(Debug)]
pub enum InputTensor {
    /// Scaled floating point pixels.
    F32(ArrayD<f32>),
    /// Raw 8-bit pixels, for graphs that embed their own preprocessing.
    U8(ArrayD<u8>),
}

/// Result of preprocessing: the tensor plus the pixel space its coordinates live in.
#[derive(Debug)]
pub struct PreprocessResult {
    pub tensor: InputTensor,
    /// Width and height of the image the model actually sees.
    pub input_size: (u32, u32),
}

/// Trait for image preprocessing implementations
pub trait Preprocess: Send {
    fn preprocess(&mut self, frame: &Frame) -> anyhow::Result<PreprocessResult>;
}
