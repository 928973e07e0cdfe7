mod channel;
pub mod encoder;

pub use channel::{ChannelSink, DEFAULT_CLEAR_WAIT};
pub use encoder::{decode, encode, EncodedImage};

use anyhow::Result;

/// What the display collaborator is asked to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayUpdate {
    Frame(EncodedImage),
    /// Drop the last shown image.
    Clear,
}

/// Trait for output destinations
///
/// Delivery is fire-and-forget: the sink decides when (or whether) to render.
pub trait OutputSink: Send + Sync {
    /// Hand over one encoded frame
    fn write_frame(&self, image: EncodedImage) -> Result<()>;

    /// Remove whatever was last shown
    fn clear(&self) -> Result<()>;
}
