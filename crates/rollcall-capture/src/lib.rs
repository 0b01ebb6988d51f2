//! rollcall-capture: Still-frame capture for verification and registration.
//!
//! A capture is synchronous: the frame is taken and encoded before any
//! network call starts, so what is sent is what was in front of the camera
//! when the user acted.

pub mod frame;
pub mod source;

pub use frame::{EncodedImage, Frame, FrameError};
pub use source::{CaptureError, FrameSource, ImageFileSource};
