use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Failed to open capture device: {0}")]
    DeviceOpen(String),

    #[error("First frame could not be read: {0}")]
    FirstFrame(String),

    #[error("No frame arrived within {0} ms of starting")]
    FirstFrameTimeout(u64),

    #[error("Frame source is already running")]
    AlreadyRunning,

    #[error("Invalid frame {width}x{height}: expected {expected} bytes, got {actual}")]
    InvalidFrame {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("Failed to spawn acquisition thread: {0}")]
    Spawn(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_formatting() {
        let err = CaptureError::FirstFrameTimeout(3000);
        assert_eq!(err.to_string(), "No frame arrived within 3000 ms of starting");

        let err = CaptureError::InvalidFrame {
            width: 2,
            height: 2,
            expected: 12,
            actual: 10,
        };
        assert_eq!(
            err.to_string(),
            "Invalid frame 2x2: expected 12 bytes, got 10"
        );
    }
}
