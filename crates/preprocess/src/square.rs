use crate::{InputTensor, Preprocess, PreprocessResult, TensorLayout};
use capture::Frame;
use common::span;
use fast_image_resize::{
    FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer,
    images::{Image, ImageRef},
};
use ndarray::Array;

/// Fixed square-input preprocessing for the mobile runtime.
///
/// Stretches the frame to `size x size` (aspect ratio is not preserved), reorders
/// channels to RGB and scales to [0, 1]. No mean subtraction.
pub struct SquarePreProcessor {
    size: u32,
    layout: TensorLayout,
    resizer: Resizer,
}

impl SquarePreProcessor {
    pub fn new(size: u32, layout: TensorLayout) -> Self {
        Self {
            size,
            layout,
            resizer: Resizer::new(),
        }
    }

    fn resize(&mut self, rgb: &[u8], width: u32, height: u32) -> anyhow::Result<Image<'static>> {
        let _s = span!("resize_square");

        let src = ImageRef::new(width, height, rgb, PixelType::U8x3)?;
        let mut resized = Image::new(self.size, self.size, PixelType::U8x3);

        self.resizer.resize(
            &src,
            &mut resized,
            &ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear)),
        )?;

        Ok(resized)
    }

    fn normalize(&self, image: &Image) -> anyhow::Result<Array<f32, ndarray::IxDyn>> {
        let _s = span!("normalize");

        let side = self.size as usize;
        let spatial = side * side;
        let buf = image.buffer();
        let mut output = vec![0.0f32; 3 * spatial];

        match self.layout {
            TensorLayout::Nchw => {
                for (i, px) in buf.chunks_exact(3).enumerate() {
                    output[i] = px[0] as f32 / 255.0;
                    output[i + spatial] = px[1] as f32 / 255.0;
                    output[i + 2 * spatial] = px[2] as f32 / 255.0;
                }
            }
            TensorLayout::Nhwc => {
                for (out, value) in output.iter_mut().zip(buf) {
                    *out = *value as f32 / 255.0;
                }
            }
        }

        Ok(Array::from_shape_vec(self.layout.shape(side, side), output)?)
    }
}

impl Preprocess for SquarePreProcessor {
    fn preprocess(&mut self, frame: &Frame) -> anyhow::Result<PreprocessResult> {
        let _s = span!("preprocess_square");

        tracing::trace!(
            width = frame.width(),
            height = frame.height(),
            target = self.size,
            "Preprocessing frame"
        );

        let rgb = frame.to_rgb();
        let resized = self.resize(&rgb, frame.width(), frame.height())?;
        let input = self.normalize(&resized)?;

        Ok(PreprocessResult {
            tensor: InputTensor::F32(input),
            input_size: (self.size, self.size),
        })
    }
}
