//! Frame sources.

use crate::frame::{Frame, FrameError};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptureError {
    /// Nothing to capture from: the camera is not running or the still is missing.
    #[error("capture unavailable: {0}")]
    Unavailable(String),
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Something that can produce a still frame on demand.
///
/// Capture blocks the caller; it must complete before the frame is handed
/// to an asynchronous client.
pub trait FrameSource {
    fn capture(&mut self) -> Result<Frame, CaptureError>;
}

/// Reads the current still from an image file written by a camera tool
/// (or picked by the user).
pub struct ImageFileSource {
    path: PathBuf,
}

impl ImageFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl FrameSource for ImageFileSource {
    fn capture(&mut self) -> Result<Frame, CaptureError> {
        if !self.path.exists() {
            return Err(CaptureError::Unavailable(format!(
                "no frame at {}; start the camera first",
                self.path.display()
            )));
        }

        let bytes = std::fs::read(&self.path).map_err(|e| {
            CaptureError::CaptureFailed(format!("failed to read {}: {e}", self.path.display()))
        })?;
        let image = image::load_from_memory(&bytes).map_err(FrameError::from)?;
        let frame = Frame::new(image.to_rgb8());

        tracing::info!(
            path = %self.path.display(),
            width = frame.width(),
            height = frame.height(),
            "frame captured"
        );
        if frame.is_dark {
            tracing::warn!(
                brightness = frame.avg_brightness(),
                "captured frame is very dark; recognition will likely fail"
            );
        }
        Ok(frame)
    }
}
