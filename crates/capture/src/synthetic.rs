use crate::config::{CaptureConfig, SyntheticConfig};
use crate::source::{AcquisitionWorker, FrameSource, LatestFrame};
use crate::{CaptureError, ColorOrder, Frame};
use std::sync::atomic::Ordering;
use std::time::Duration;

/// Frame source that generates deterministic frames instead of opening hardware.
///
/// Frame `n` is always the same image for a given size, so pipelines built on
/// top of it behave reproducibly without a camera attached.
pub struct SyntheticSource {
    config: SyntheticConfig,
    stop_timeout: Duration,
    latest: LatestFrame,
    worker: Option<AcquisitionWorker>,
}

impl SyntheticSource {
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            config: config.synthetic,
            stop_timeout: config.stop_timeout(),
            latest: LatestFrame::new(),
            worker: None,
        }
    }

    /// The `index`-th synthetic frame: diagonal gradients that drift with the index.
    pub fn generate(index: u64, width: u32, height: u32) -> Frame {
        let shift = (index % 256) as u32;
        let mut pixels = Vec::with_capacity(width as usize * height as usize * 3);

        for y in 0..height {
            for x in 0..width {
                pixels.push(((x + shift) % 256) as u8);
                pixels.push(((y + shift) % 256) as u8);
                pixels.push(((x + y) % 256) as u8);
            }
        }

        // Sized exactly above, so construction cannot fail for non-zero dimensions.
        Frame::new(pixels, width.max(1), height.max(1), ColorOrder::Bgr, index)
            .unwrap_or_else(|_| Frame::blank(width.max(1), height.max(1), 0))
    }
}

impl FrameSource for SyntheticSource {
    fn start(&mut self) -> Result<(), CaptureError> {
        if self.is_running() {
            return Err(CaptureError::AlreadyRunning);
        }

        let SyntheticConfig { width, height, .. } = self.config;
        if width == 0 || height == 0 {
            return Err(CaptureError::DeviceOpen(format!(
                "synthetic frame size {}x{} is empty",
                width, height
            )));
        }

        self.latest.publish(Self::generate(0, width, height));

        let latest = self.latest.clone();
        let interval = self.config.frame_interval();
        self.worker = Some(AcquisitionWorker::spawn(
            "synthetic-acquisition",
            self.stop_timeout,
            move |stop| {
                let mut index = 1u64;
                while !stop.load(Ordering::Acquire) {
                    std::thread::sleep(interval);
                    latest.publish(Self::generate(index, width, height));
                    index += 1;
                }
            },
        )?);

        tracing::info!(width, height, "Synthetic frame source started");
        Ok(())
    }

    fn read(&self) -> Option<Frame> {
        self.latest.snapshot()
    }

    fn stop(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            worker.shutdown();
            tracing::info!("Synthetic frame source stopped");
        }
        self.latest.clear();
    }

    fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(AcquisitionWorker::is_alive)
    }

    fn describe(&self) -> String {
        format!(
            "synthetic {}x{} @ {} fps",
            self.config.width, self.config.height, self.config.fps
        )
    }
}

impl Drop for SyntheticSource {
    fn drop(&mut self) {
        self.stop();
    }
}
