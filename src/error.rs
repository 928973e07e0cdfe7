use std::time::Duration;

use thiserror::Error;

use crate::frame::ColorSpace;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The capture device could not be opened. The scheduler stays stopped.
    #[error("capture device {index} is unavailable")]
    DeviceUnavailable {
        index: u32,
        #[source]
        source: anyhow::Error,
    },

    /// Histogram requested over a channel with no pixels.
    #[error("cannot analyse a zero-extent channel ({height}x{width})")]
    AnalysisDomain { height: usize, width: usize },

    #[error("expected a {expected:?} frame, got {found:?} with {channels} channel(s)")]
    ColorSpace {
        expected: ColorSpace,
        found: ColorSpace,
        channels: usize,
    },

    /// Pixel data whose channel count does not fit the requested tag.
    #[error("a {color:?} frame needs {expected} channel(s), got {found}")]
    ChannelCount {
        color: ColorSpace,
        expected: usize,
        found: usize,
    },

    #[error("frame extents differ: {left:?} vs {right:?}")]
    ShapeMismatch {
        left: (usize, usize),
        right: (usize, usize),
    },

    #[error("failed to encode frame")]
    Encode(#[from] image::ImageError),

    #[error("acquisition did not stop within {0:?}")]
    ShutdownTimeout(Duration),

    #[error("acquisition is already running")]
    AlreadyRunning,

    #[error("failed to spawn the acquisition thread")]
    Spawn(#[source] std::io::Error),
}
