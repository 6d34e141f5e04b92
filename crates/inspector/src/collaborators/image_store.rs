use anyhow::Context;
use capture::Frame;
use chrono::{DateTime, Utc};
use image::{Rgb, RgbImage, codecs::jpeg::JpegEncoder};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use inference::{ClassCatalog, RawDetection};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;

const DEFECT_COLOR: Rgb<u8> = Rgb([220, 30, 30]);
const COMPONENT_COLOR: Rgb<u8> = Rgb([30, 200, 60]);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageCategory {
    Pass,
    Reject,
}

impl ImageCategory {
    pub fn dir_name(&self) -> &'static str {
        match self {
            ImageCategory::Pass => "pass",
            ImageCategory::Reject => "reject",
        }
    }
}

pub trait ImageStore: Send + Sync {
    /// Persist an annotated frame and return where it was written.
    fn save(
        &self,
        frame: &Frame,
        detections: &[RawDetection],
        category: ImageCategory,
    ) -> anyhow::Result<PathBuf>;
}

/// Writes `<root>/<pass|reject>/<capture time>_<frame index>.jpg`.
pub struct DirectoryImageStore {
    root: PathBuf,
    quality: u8,
    catalog: ClassCatalog,
}

impl DirectoryImageStore {
    pub fn new(root: impl Into<PathBuf>, quality: u8, catalog: ClassCatalog) -> Self {
        Self {
            root: root.into(),
            quality: quality.clamp(1, 100),
            catalog,
        }
    }

    fn annotate(&self, frame: &Frame, detections: &[RawDetection]) -> anyhow::Result<RgbImage> {
        let mut image = RgbImage::from_raw(frame.width(), frame.height(), frame.to_rgb())
            .context("frame buffer does not match its dimensions")?;

        for detection in detections {
            let color = if self.catalog.is_defect(detection.class_id) {
                DEFECT_COLOR
            } else {
                COMPONENT_COLOR
            };
            let b = detection.bbox;
            let (w, h) = (b.width() as u32, b.height() as u32);
            if w == 0 || h == 0 {
                continue;
            }
            draw_hollow_rect_mut(&mut image, Rect::at(b.x1 as i32, b.y1 as i32).of_size(w, h), color);
        }

        Ok(image)
    }
}

impl ImageStore for DirectoryImageStore {
    fn save(
        &self,
        frame: &Frame,
        detections: &[RawDetection],
        category: ImageCategory,
    ) -> anyhow::Result<PathBuf> {
        let dir = self.root.join(category.dir_name());
        fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;

        let path = dir.join(file_name(frame));

        let image = self.annotate(frame, detections)?;
        let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
        let mut encoder = JpegEncoder::new_with_quality(BufWriter::new(file), self.quality);
        encoder
            .encode_image(&image)
            .with_context(|| format!("encoding {}", path.display()))?;

        tracing::debug!(path = %path.display(), "Inspection image saved");
        Ok(path)
    }
}

/// Capture time of `frame` in UTC, down to the microsecond, then its index.
fn file_name(frame: &Frame) -> String {
    let captured = DateTime::<Utc>::from_timestamp_nanos(frame.timestamp_ns() as i64);
    format!(
        "{}_{:06}.jpg",
        captured.format("%Y%m%d-%H%M%S%.6f"),
        frame.index()
    )
}
