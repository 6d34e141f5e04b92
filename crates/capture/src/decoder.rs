use anyhow::{Result, bail};
use common::span;

/// Trait for decoding raw camera buffers to packed RGB (3 bytes per pixel).
pub trait FrameDecoder: Send {
    /// Returns the decoded pixels together with the actual image size.
    fn decode(&mut self, raw: &[u8], width: u32, height: u32) -> Result<(Vec<u8>, u32, u32)>;
}

/// YUYV (YUV 4:2:2) decoder.
///
/// YUYV packs 2 pixels in 4 bytes: [Y0, U, Y1, V]
#[derive(Default)]
pub struct YuyvDecoder;

impl FrameDecoder for YuyvDecoder {
    fn decode(&mut self, raw: &[u8], width: u32, height: u32) -> Result<(Vec<u8>, u32, u32)> {
        let _s = span!("decode_yuyv");

        let bytes_per_row = (width * 2) as usize;
        if height == 0 || width % 2 != 0 || raw.len() < bytes_per_row * height as usize {
            bail!(
                "YUYV buffer too small for {}x{}: {} bytes",
                width,
                height,
                raw.len()
            );
        }

        // Drivers may pad rows, so derive the stride from the buffer.
        let stride = raw.len() / height as usize;
        let mut rgb = Vec::with_capacity((width * height * 3) as usize);

        for row in raw.chunks_exact(stride).take(height as usize) {
            for chunk in row[..bytes_per_row].chunks_exact(4) {
                let y0 = chunk[0] as i32;
                let u = chunk[1] as i32 - 128;
                let y1 = chunk[2] as i32;
                let v = chunk[3] as i32 - 128;

                // BT.601 fixed-point coefficients (8-bit fraction)
                let rv = (359 * v) >> 8;
                let gu = (88 * u + 183 * v) >> 8;
                let bu = (454 * u) >> 8;

                for y in [y0, y1] {
                    rgb.push((y + rv).clamp(0, 255) as u8);
                    rgb.push((y - gu).clamp(0, 255) as u8);
                    rgb.push((y + bu).clamp(0, 255) as u8);
                }
            }
        }

        Ok((rgb, width, height))
    }
}

/// MJPEG decoder using turbojpeg (libjpeg-turbo)
pub struct MjpegDecoder {
    decompressor: turbojpeg::Decompressor,
}

impl MjpegDecoder {
    pub fn new() -> Result<Self> {
        Ok(Self {
            decompressor: turbojpeg::Decompressor::new()?,
        })
    }
}

impl FrameDecoder for MjpegDecoder {
    fn decode(&mut self, raw: &[u8], _width: u32, _height: u32) -> Result<(Vec<u8>, u32, u32)> {
        let _s = span!("decode_mjpeg");

        // The JPEG header is authoritative; the negotiated format can be stale.
        let header = self.decompressor.read_header(raw)?;
        let mut rgb = vec![0u8; header.width * header.height * 3];

        let output = turbojpeg::Image {
            pixels: rgb.as_mut_slice(),
            width: header.width,
            pitch: header.width * 3,
            height: header.height,
            format: turbojpeg::PixelFormat::RGB,
        };
        self.decompressor.decompress(raw, output)?;

        Ok((rgb, header.width as u32, header.height as u32))
    }
}
