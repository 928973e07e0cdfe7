mod webcam;

pub use webcam::WebcamCapture;

use anyhow::Result;

use crate::frame::Frame;

/// Trait for camera capture sources
///
/// Lifecycle: closed until [`open`](CaptureSource::open) succeeds, closed
/// again after [`release`](CaptureSource::release).
pub trait CaptureSource: Send {
    /// Bind to a device. On failure the source stays closed.
    fn open(&mut self, device_index: u32) -> Result<()>;

    fn is_open(&self) -> bool;

    /// Fetch the next frame, blocking until one is available.
    ///
    /// `Ok(None)` means the device produced nothing this time; callers skip it.
    fn read(&mut self) -> Result<Option<Frame>>;

    /// Free the device. Safe to call when already closed.
    fn release(&mut self);
}
