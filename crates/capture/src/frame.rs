use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

pub const CHANNELS: usize = 3;

/// Byte order of the three colour channels in a packed pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorOrder {
    Rgb,
    Bgr,
}

/// A packed 8-bit, 3-channel image captured at a point in time.
///
/// Pixel data is immutable and shared: cloning a `Frame` hands out another
/// view of the same buffer, never a mutable alias.
#[derive(Debug, Clone)]
pub struct Frame {
    pixels: Arc<[u8]>,
    width: u32,
    height: u32,
    order: ColorOrder,
    index: u64,
    timestamp_ns: u64,
}

impl Frame {
    /// Build a frame, checking that the buffer holds exactly `width * height * 3` bytes.
    pub fn new(
        pixels: Vec<u8>,
        width: u32,
        height: u32,
        order: ColorOrder,
        index: u64,
    ) -> Result<Self, crate::CaptureError> {
        let expected = width as usize * height as usize * CHANNELS;
        if width == 0 || height == 0 || pixels.len() != expected {
            return Err(crate::CaptureError::InvalidFrame {
                width,
                height,
                expected,
                actual: pixels.len(),
            });
        }

        Ok(Self {
            pixels: pixels.into(),
            width,
            height,
            order,
            index,
            timestamp_ns: now_ns(),
        })
    }

    /// A uniformly coloured frame, mostly useful for warm-up runs.
    pub fn blank(width: u32, height: u32, value: u8) -> Self {
        Self {
            pixels: vec![value; width as usize * height as usize * CHANNELS].into(),
            width,
            height,
            order: ColorOrder::Rgb,
            index: 0,
            timestamp_ns: now_ns(),
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn timestamp_ns(&self) -> u64 {
        self.timestamp_ns
    }

    /// Pixel data in RGB order, converting from BGR if needed.
    pub fn to_rgb(&self) -> Vec<u8> {
        match self.order {
            ColorOrder::Rgb => self.pixels.to_vec(),
            ColorOrder::Bgr => self
                .pixels
                .chunks_exact(CHANNELS)
                .flat_map(|px| [px[2], px[1], px[0]])
                .collect(),
        }
    }
}

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}
