//! Screen capture of the primary display.
//!
//! This module provides:
//! - The `Frame` pixel buffer handed to the detection pipeline
//! - Primary monitor discovery (`primary_monitor`)
//! - Screenshot capture (`ScreenSource`)

pub mod frame;
pub mod monitor;
pub mod screenshot;

use anyhow::Result;
use thiserror::Error;

pub use frame::Frame;
pub use screenshot::ScreenSource;

/// Capture failures that cannot be fixed by retrying.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no display monitor could be enumerated")]
    NoMonitor,
    #[error("screen capture is not supported on this platform")]
    Unsupported,
}

/// Produces one frame per scan iteration.
pub trait FrameSource {
    fn capture(&mut self) -> Result<Frame>;
}

/// Returns true if `err` means no frame can ever be captured.
pub fn is_fatal(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<CaptureError>(),
        Some(CaptureError::NoMonitor) | Some(CaptureError::Unsupported)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_fatal() {
        assert!(is_fatal(&anyhow::Error::new(CaptureError::NoMonitor)));
        assert!(is_fatal(
            &anyhow::Error::new(CaptureError::Unsupported).context("capturing primary monitor")
        ));
        assert!(!is_fatal(&anyhow::anyhow!("BitBlt failed")));
    }
}
