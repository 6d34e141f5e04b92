use crate::{InputTensor, Preprocess, PreprocessResult, TensorLayout};
use capture::Frame;
use common::span;
use ndarray::Array;

/// Pass-through preprocessing for dense graphs that accept any image size and
/// embed their own scaling. Produces raw RGB bytes at the frame's native size.
pub struct NativePreProcessor {
    layout: TensorLayout,
}

impl NativePreProcessor {
    pub fn new(layout: TensorLayout) -> Self {
        Self { layout }
    }
}

impl Preprocess for NativePreProcessor {
    fn preprocess(&mut self, frame: &Frame) -> anyhow::Result<PreprocessResult> {
        let _s = span!("preprocess_native");

        let (width, height) = (frame.width() as usize, frame.height() as usize);
        let rgb = frame.to_rgb();

        let data = match self.layout {
            TensorLayout::Nhwc => rgb,
            TensorLayout::Nchw => {
                let spatial = width * height;
                let mut planar = vec![0u8; 3 * spatial];
                for (i, px) in rgb.chunks_exact(3).enumerate() {
                    planar[i] = px[0];
                    planar[i + spatial] = px[1];
                    planar[i + 2 * spatial] = px[2];
                }
                planar
            }
        };

        Ok(PreprocessResult {
            tensor: InputTensor::U8(Array::from_shape_vec(
                self.layout.shape(width, height),
                data,
            )?),
            input_size: (frame.width(), frame.height()),
        })
    }
}
