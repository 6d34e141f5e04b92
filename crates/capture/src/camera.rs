use crate::config::CaptureConfig;
use crate::device::CameraDevice;
use crate::source::{AcquisitionWorker, FrameSource, LatestFrame};
use crate::{CaptureError, ColorOrder, Frame};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, SyncSender};
use v4l::{
    buffer::Type,
    io::{mmap::Stream, traits::CaptureStream},
};

const BUFFER_COUNT: u32 = 4;

/// V4L2 camera behind a background acquisition loop.
pub struct CameraSource {
    config: CaptureConfig,
    latest: LatestFrame,
    worker: Option<AcquisitionWorker>,
}

impl CameraSource {
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            config: config.clone(),
            latest: LatestFrame::new(),
            worker: None,
        }
    }
}

impl FrameSource for CameraSource {
    fn start(&mut self) -> Result<(), CaptureError> {
        if self.is_running() {
            return Err(CaptureError::AlreadyRunning);
        }

        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let config = self.config.clone();
        let latest = self.latest.clone();

        let mut worker = AcquisitionWorker::spawn(
            "camera-acquisition",
            self.config.stop_timeout(),
            move |stop| acquisition_loop(config, latest, stop, ready_tx),
        )?;

        // The device lives on the acquisition thread; it reports back once the
        // first frame is in (or the open failed).
        match ready_rx.recv_timeout(self.config.first_frame_timeout()) {
            Ok(Ok(())) => {
                tracing::info!(device_id = self.config.device_id, "Camera started");
                self.worker = Some(worker);
                Ok(())
            }
            Ok(Err(e)) => {
                worker.shutdown();
                Err(e)
            }
            Err(RecvTimeoutError::Timeout) => {
                worker.shutdown();
                Err(CaptureError::FirstFrameTimeout(
                    self.config.first_frame_timeout_ms,
                ))
            }
            Err(RecvTimeoutError::Disconnected) => {
                worker.shutdown();
                Err(CaptureError::FirstFrame(
                    "acquisition thread exited before reporting".to_string(),
                ))
            }
        }
    }

    fn read(&self) -> Option<Frame> {
        self.latest.snapshot()
    }

    fn stop(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            let outcome = worker.shutdown();
            tracing::info!(outcome = ?outcome, "Camera stopped");
        }
        self.latest.clear();
    }

    fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(AcquisitionWorker::is_alive)
    }

    fn describe(&self) -> String {
        format!("camera /dev/video{}", self.config.device_id)
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        self.stop();
    }
}

fn acquisition_loop(
    config: CaptureConfig,
    latest: LatestFrame,
    stop: Arc<AtomicBool>,
    ready: SyncSender<Result<(), CaptureError>>,
) {
    let camera = match CameraDevice::open(&config) {
        Ok(camera) => camera,
        Err(e) => {
            let _ = ready.send(Err(CaptureError::DeviceOpen(format!("{:#}", e))));
            return;
        }
    };

    let mut decoder = match camera.decoder() {
        Ok(decoder) => decoder,
        Err(e) => {
            let _ = ready.send(Err(CaptureError::DeviceOpen(format!("{:#}", e))));
            return;
        }
    };

    let mut stream = match Stream::with_buffers(&camera.device, Type::VideoCapture, BUFFER_COUNT)
        .context("Failed to create capture stream")
    {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready.send(Err(CaptureError::DeviceOpen(format!("{:#}", e))));
            return;
        }
    };

    let mut frame_count = 0u64;
    let mut read_failures = 0u64;

    let mut grab = |stream: &mut Stream, index: u64| -> Result<Frame> {
        let (buf, _meta) = stream.next()?;
        let (rgb, width, height) = decoder.decode(buf, camera.width, camera.height)?;
        Ok(Frame::new(rgb, width, height, ColorOrder::Rgb, index)?)
    };

    match grab(&mut stream, frame_count) {
        Ok(frame) => {
            latest.publish(frame);
            frame_count += 1;
            let _ = ready.send(Ok(()));
        }
        Err(e) => {
            let _ = ready.send(Err(CaptureError::FirstFrame(format!("{:#}", e))));
            return;
        }
    }

    while !stop.load(Ordering::Acquire) {
        match grab(&mut stream, frame_count) {
            Ok(frame) => {
                latest.publish(frame);
                frame_count += 1;

                if frame_count.is_multiple_of(300) {
                    tracing::debug!(frame_count, read_failures, "Camera status");
                }
            }
            Err(e) => {
                read_failures += 1;
                tracing::warn!(
                    error = %e,
                    frame_count,
                    read_failures,
                    "Frame read failed, backing off"
                );
                std::thread::sleep(config.read_backoff());
            }
        }
    }

    tracing::info!(
        "Acquisition stopped: {} frames captured, {} failed reads.",
        frame_count,
        read_failures
    );
}
