use std::io::Cursor;

use image::{DynamicImage, ImageFormat};

use crate::error::{Error, Result};
use crate::frame::{ColorSpace, Frame};

/// A frame serialized for the display collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Serialize a BGR, gray or mask frame to PNG.
///
/// BGR frames are written as RGB PNGs; single-channel frames as 8-bit gray.
pub fn encode(frame: &Frame) -> Result<EncodedImage> {
    let _span = tracing::debug_span!("encode").entered();

    let image = match frame.color() {
        ColorSpace::Bgr => DynamicImage::ImageRgb8(frame.to_rgb_image()?),
        ColorSpace::Gray | ColorSpace::Mask => DynamicImage::ImageLuma8(frame.to_gray_image()?),
        ColorSpace::Hsv => {
            return Err(Error::ColorSpace {
                expected: ColorSpace::Bgr,
                found: ColorSpace::Hsv,
                channels: frame.channels(),
            })
        }
    };

    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(EncodedImage {
        bytes,
        width: image.width(),
        height: image.height(),
    })
}

/// Decode a PNG back into a frame: color images become BGR, gray images `Gray`.
pub fn decode(bytes: &[u8]) -> Result<Frame> {
    let image = image::load_from_memory_with_format(bytes, ImageFormat::Png)?;
    match image {
        DynamicImage::ImageLuma8(gray) => Frame::from_gray_image(&gray, ColorSpace::Gray),
        other => Ok(Frame::from_rgb_image(&other.to_rgb8())),
    }
}
