use crate::{CaptureError, Frame};
use common::{JoinOutcome, join_with_timeout};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

/// Anything that continuously acquires frames and hands out the latest one.
///
/// Implementations own their acquisition loop. `read` never waits on that loop:
/// it copies the most recent frame out of a shared slot or returns `None`.
pub trait FrameSource: Send + Sync {
    /// Open the underlying device, confirm one frame is readable, then start acquiring.
    fn start(&mut self) -> Result<(), CaptureError>;

    /// Most recent frame, or `None` if nothing has been captured yet.
    fn read(&self) -> Option<Frame>;

    /// Stop acquiring and release the device. Safe to call more than once.
    fn stop(&mut self);

    fn is_running(&self) -> bool;

    fn describe(&self) -> String;
}

/// Single-slot mailbox holding the most recent frame.
///
/// The lock only guards an `Arc` swap; pixel data is never copied under it.
#[derive(Clone, Default)]
pub struct LatestFrame {
    slot: Arc<Mutex<Option<Frame>>>,
}

impl LatestFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, frame: Frame) {
        match self.slot.lock() {
            Ok(mut guard) => *guard = Some(frame),
            Err(poisoned) => *poisoned.into_inner() = Some(frame),
        }
    }

    pub fn snapshot(&self) -> Option<Frame> {
        match self.slot.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn clear(&self) {
        match self.slot.lock() {
            Ok(mut guard) => *guard = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }
}

/// A running acquisition thread plus its cooperative stop flag.
pub struct AcquisitionWorker {
    name: &'static str,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    stop_timeout: Duration,
}

impl AcquisitionWorker {
    pub fn spawn<F>(
        name: &'static str,
        stop_timeout: Duration,
        body: F,
    ) -> Result<Self, CaptureError>
    where
        F: FnOnce(Arc<AtomicBool>) + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || body(flag))?;

        Ok(Self {
            name,
            stop,
            handle: Some(handle),
            stop_timeout,
        })
    }

    pub fn is_alive(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Signal the loop and join it, detaching if it overruns the timeout.
    pub fn shutdown(&mut self) -> Option<JoinOutcome> {
        self.stop.store(true, Ordering::Release);
        self.handle
            .take()
            .map(|handle| join_with_timeout(handle, self.stop_timeout, self.name))
    }
}

impl Drop for AcquisitionWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ColorOrder;

    #[test]
    fn snapshot_is_empty_until_published() {
        let latest = LatestFrame::new();
        assert!(latest.snapshot().is_none());

        latest.publish(Frame::new(vec![0; 3], 1, 1, ColorOrder::Rgb, 1).unwrap());
        assert_eq!(latest.snapshot().map(|f| f.index()), Some(1));
    }

    #[test]
    fn publish_overwrites_previous_frame() {
        let latest = LatestFrame::new();
        latest.publish(Frame::new(vec![0; 3], 1, 1, ColorOrder::Rgb, 1).unwrap());
        latest.publish(Frame::new(vec![0; 3], 1, 1, ColorOrder::Rgb, 2).unwrap());
        assert_eq!(latest.snapshot().map(|f| f.index()), Some(2));

        latest.clear();
        assert!(latest.snapshot().is_none());
    }

    #[test]
    fn worker_stops_on_shutdown() {
        let mut worker = AcquisitionWorker::spawn("test-loop", Duration::from_secs(1), |stop| {
            while !stop.load(Ordering::Acquire) {
                std::thread::sleep(Duration::from_millis(1));
            }
        })
        .unwrap();

        assert!(worker.is_alive());
        assert_eq!(worker.shutdown(), Some(JoinOutcome::Joined));
        assert!(!worker.is_alive());
        assert_eq!(worker.shutdown(), None, "second shutdown is a no-op");
    }
}
