use common::retry::RetryPolicy;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// V4L2 camera.
    #[default]
    Camera,
    /// Deterministic generated frames, no hardware.
    Synthetic,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Which source the composition root should build. Default: `camera`.
    pub source: SourceKind,
    /// V4L2 device index (`/dev/video<N>`). Default: 0.
    pub device_id: u32,
    /// Requested capture resolution; the driver may pick the nearest supported one.
    /// Default: keep the device's current format.
    pub resolution: Option<(u32, u32)>,
    /// How long `start` waits for the first frame. Default: 3000 ms.
    pub first_frame_timeout_ms: u64,
    /// Pause after a failed read before retrying. Default: 100 ms.
    pub read_backoff_ms: u64,
    /// Bound on joining the acquisition thread in `stop`. Default: 1500 ms.
    pub stop_timeout_ms: u64,
    /// Retries for opening the device. Default: 3 attempts, 200 ms base delay.
    pub open_retry: RetryPolicy,
    /// Substitute the synthetic source if the camera cannot start. Default: true.
    pub fallback_to_synthetic: bool,
    /// Synthetic source geometry and rate.
    pub synthetic: SyntheticConfig,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    /// Default: 640.
    pub width: u32,
    /// Default: 480.
    pub height: u32,
    /// Default: 30.
    pub fps: f64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::default(),
            device_id: 0,
            resolution: None,
            first_frame_timeout_ms: 3_000,
            read_backoff_ms: 100,
            stop_timeout_ms: 1_500,
            open_retry: RetryPolicy::default(),
            fallback_to_synthetic: true,
            synthetic: SyntheticConfig::default(),
        }
    }
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            fps: 30.0,
        }
    }
}

impl CaptureConfig {
    pub fn first_frame_timeout(&self) -> Duration {
        Duration::from_millis(self.first_frame_timeout_ms)
    }

    pub fn read_backoff(&self) -> Duration {
        Duration::from_millis(self.read_backoff_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

impl SyntheticConfig {
    pub fn frame_interval(&self) -> Duration {
        if self.fps > 0.0 {
            Duration::from_secs_f64(1.0 / self.fps)
        } else {
            Duration::from_millis(100)
        }
    }
}
