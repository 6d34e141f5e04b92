use crate::config::CaptureConfig;
use crate::decoder::{FrameDecoder, MjpegDecoder, YuyvDecoder};
use anyhow::{Context, Result, anyhow};
use common::retry::retry_with_backoff;
use v4l::{
    Device, FourCC,
    control::{Control, Value},
    video::Capture,
};

const FOURCC_YUYV: FourCC = FourCC { repr: *b"YUYV" };
const FOURCC_MJPG: FourCC = FourCC { repr: *b"MJPG" };

// V4L2 control IDs (from videodev2.h)
const V4L2_CID_EXPOSURE_AUTO: u32 = 0x009a0901;
const V4L2_CID_EXPOSURE_ABSOLUTE: u32 = 0x009a0902;

// Exposure auto mode: aperture priority allows auto-exposure with an upper limit
const V4L2_EXPOSURE_APERTURE_PRIORITY: i64 = 3;

/// Upper exposure bound in 100 µs units; bottles move, blur costs detections.
const MAX_EXPOSURE_UNITS: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureFormat {
    Yuyv,
    Mjpeg,
}

impl CaptureFormat {
    fn fourcc(self) -> FourCC {
        match self {
            CaptureFormat::Yuyv => FOURCC_YUYV,
            CaptureFormat::Mjpeg => FOURCC_MJPG,
        }
    }
}

fn open_device(index: u32) -> Result<Device> {
    let device = Device::new(index as usize)
        .with_context(|| format!("Failed to open /dev/video{}", index))?;
    let caps = device.query_caps()?;

    if !caps
        .capabilities
        .contains(v4l::capability::Flags::VIDEO_CAPTURE)
    {
        return Err(anyhow!("/dev/video{} is not a capture device", index));
    }

    Ok(device)
}

/// Select best pixel format: prefer YUYV (cheaper decode), fallback to MJPEG
fn select_format(device: &Device) -> Result<CaptureFormat> {
    let formats = device.enum_formats()?;

    for fmt in &formats {
        tracing::debug!("Available format {:?}: {}", fmt.fourcc, fmt.description);
    }

    if formats.iter().any(|f| f.fourcc == FOURCC_YUYV) {
        return Ok(CaptureFormat::Yuyv);
    }

    if formats.iter().any(|f| f.fourcc == FOURCC_MJPG) {
        return Ok(CaptureFormat::Mjpeg);
    }

    Err(anyhow!(
        "Camera supports neither YUYV nor MJPEG - available: {:?}",
        formats.iter().map(|f| f.fourcc).collect::<Vec<_>>()
    ))
}

/// Cap exposure time so conveyor motion stays sharp. Best effort: unsupported
/// controls are logged and skipped.
fn limit_exposure(device: &Device) {
    let controls = match device.query_controls() {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!("Failed to query camera controls: {}", e);
            return;
        }
    };

    if controls.iter().any(|c| c.id == V4L2_CID_EXPOSURE_AUTO) {
        if let Err(e) = device.set_control(Control {
            id: V4L2_CID_EXPOSURE_AUTO,
            value: Value::Integer(V4L2_EXPOSURE_APERTURE_PRIORITY),
        }) {
            tracing::debug!("Aperture priority mode not supported: {}", e);
        }
    }

    // In aperture priority, exposure_absolute acts as the upper limit
    if let Some(ctrl) = controls.iter().find(|c| c.id == V4L2_CID_EXPOSURE_ABSOLUTE) {
        let exposure = MAX_EXPOSURE_UNITS.min(ctrl.maximum);
        match device.set_control(Control {
            id: V4L2_CID_EXPOSURE_ABSOLUTE,
            value: Value::Integer(exposure),
        }) {
            Ok(()) => tracing::info!(
                "Exposure limit: {} ({}ms max)",
                exposure,
                exposure as f64 / 10.0
            ),
            Err(e) => tracing::debug!("Failed to set exposure limit: {}", e),
        }
    }
}

/// An opened and configured V4L2 capture device.
pub struct CameraDevice {
    pub device: Device,
    pub width: u32,
    pub height: u32,
    pub format: CaptureFormat,
}

impl CameraDevice {
    pub fn open(config: &CaptureConfig) -> Result<Self> {
        let device = retry_with_backoff(
            || open_device(config.device_id),
            config.open_retry,
            "Camera open",
        )?;

        let caps = device.query_caps()?;
        tracing::info!("Camera opened: {} ({})", caps.card, caps.driver);

        let capture_format = select_format(&device)?;

        let mut format = device.format()?;
        format.fourcc = capture_format.fourcc();
        if let Some((width, height)) = config.resolution {
            format.width = width;
            format.height = height;
        }
        let format = device.set_format(&format)?;

        tracing::info!(
            "Capture format: {}x{} {:?} ({:?})",
            format.width,
            format.height,
            format.fourcc,
            capture_format
        );

        limit_exposure(&device);

        Ok(Self {
            device,
            width: format.width,
            height: format.height,
            format: capture_format,
        })
    }

    pub fn decoder(&self) -> Result<Box<dyn FrameDecoder>> {
        Ok(match self.format {
            CaptureFormat::Yuyv => Box::new(YuyvDecoder),
            CaptureFormat::Mjpeg => Box::new(MjpegDecoder::new()?),
        })
    }
}
