use image::{GrayImage, Luma, Rgb, RgbImage};
use ndarray::{Array3, ArrayView2, Axis};

use crate::error::{Error, Result};

/// Pixel layout carried alongside every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    /// 3 channels, blue/green/red order, as produced by the capture source.
    Bgr,
    /// 3 channels: hue in [0, 180), saturation and value in [0, 255].
    Hsv,
    /// 1 channel intensity or a single plane split out of a color frame.
    Gray,
    /// 1 channel binary (or blurred binary) mask.
    Mask,
}

impl ColorSpace {
    pub fn channels(self) -> usize {
        match self {
            ColorSpace::Bgr | ColorSpace::Hsv => 3,
            ColorSpace::Gray | ColorSpace::Mask => 1,
        }
    }
}

/// Dense `height x width x channels` grid of 8-bit pixels with its color tag.
///
/// The channel count always matches the tag; conversions build a new frame
/// instead of retagging one in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pixels: Array3<u8>,
    color: ColorSpace,
}

impl Frame {
    pub fn new(pixels: Array3<u8>, color: ColorSpace) -> Result<Self> {
        let channels = pixels.len_of(Axis(2));
        if channels != color.channels() {
            return Err(Error::ChannelCount {
                color,
                expected: color.channels(),
                found: channels,
            });
        }
        Ok(Self { pixels, color })
    }

    /// A frame with every sample set to `value`.
    pub fn filled(height: usize, width: usize, color: ColorSpace, value: u8) -> Self {
        Self {
            pixels: Array3::from_elem((height, width, color.channels()), value),
            color,
        }
    }

    /// Build a frame from a per-sample function `(y, x, channel) -> value`.
    pub fn from_fn<F>(height: usize, width: usize, color: ColorSpace, mut f: F) -> Self
    where
        F: FnMut(usize, usize, usize) -> u8,
    {
        Self {
            pixels: Array3::from_shape_fn((height, width, color.channels()), |(y, x, c)| {
                f(y, x, c)
            }),
            color,
        }
    }

    /// The "no data this tick" sentinel.
    pub fn empty() -> Self {
        Self::filled(0, 0, ColorSpace::Bgr, 0)
    }

    pub fn from_rgb_image(image: &RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self::from_fn(height as usize, width as usize, ColorSpace::Bgr, |y, x, c| {
            image.get_pixel(x as u32, y as u32)[2 - c]
        })
    }

    /// Packed row-major RGB bytes to a BGR frame.
    pub fn from_rgb_bytes(width: usize, height: usize, bytes: &[u8]) -> Result<Self> {
        let expected = width * height * 3;
        if bytes.len() != expected {
            return Err(Error::ShapeMismatch {
                left: (height, width),
                right: (bytes.len() / 3, 1),
            });
        }
        Ok(Self::from_fn(height, width, ColorSpace::Bgr, |y, x, c| {
            bytes[(y * width + x) * 3 + (2 - c)]
        }))
    }

    pub fn from_gray_image(image: &GrayImage, color: ColorSpace) -> Result<Self> {
        let (width, height) = image.dimensions();
        let pixels = Array3::from_shape_fn((height as usize, width as usize, 1), |(y, x, _)| {
            image.get_pixel(x as u32, y as u32)[0]
        });
        Self::new(pixels, color)
    }

    pub fn to_rgb_image(&self) -> Result<RgbImage> {
        self.require(ColorSpace::Bgr)?;
        let (height, width) = self.extent();
        Ok(RgbImage::from_fn(width as u32, height as u32, |x, y| {
            let (x, y) = (x as usize, y as usize);
            Rgb([
                self.pixels[[y, x, 2]],
                self.pixels[[y, x, 1]],
                self.pixels[[y, x, 0]],
            ])
        }))
    }

    pub fn to_gray_image(&self) -> Result<GrayImage> {
        self.require_single_channel()?;
        let (height, width) = self.extent();
        Ok(GrayImage::from_fn(width as u32, height as u32, |x, y| {
            Luma([self.pixels[[y as usize, x as usize, 0]]])
        }))
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn height(&self) -> usize {
        self.pixels.len_of(Axis(0))
    }

    pub fn width(&self) -> usize {
        self.pixels.len_of(Axis(1))
    }

    pub fn channels(&self) -> usize {
        self.pixels.len_of(Axis(2))
    }

    /// `(height, width)`
    pub fn extent(&self) -> (usize, usize) {
        (self.height(), self.width())
    }

    pub fn color(&self) -> ColorSpace {
        self.color
    }

    pub fn pixels(&self) -> &Array3<u8> {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut Array3<u8> {
        &mut self.pixels
    }

    pub fn pixel(&self, y: usize, x: usize) -> Vec<u8> {
        (0..self.channels()).map(|c| self.pixels[[y, x, c]]).collect()
    }

    /// View of a single-channel frame as a 2-D plane.
    pub fn plane(&self) -> Result<ArrayView2<'_, u8>> {
        self.require_single_channel()?;
        Ok(self.pixels.index_axis(Axis(2), 0))
    }

    pub fn require(&self, color: ColorSpace) -> Result<()> {
        if self.color != color || self.channels() != color.channels() {
            return Err(Error::ColorSpace {
                expected: color,
                found: self.color,
                channels: self.channels(),
            });
        }
        Ok(())
    }

    pub fn require_single_channel(&self) -> Result<()> {
        if self.channels() != 1 {
            return Err(Error::ColorSpace {
                expected: ColorSpace::Gray,
                found: self.color,
                channels: self.channels(),
            });
        }
        Ok(())
    }

    pub fn require_same_extent(&self, other: &Frame) -> Result<()> {
        if self.extent() != other.extent() {
            return Err(Error::ShapeMismatch {
                left: self.extent(),
                right: other.extent(),
            });
        }
        Ok(())
    }

    /// Split a multi-channel frame into one `Gray` plane per channel.
    pub fn split(&self) -> Vec<Frame> {
        self.pixels
            .axis_iter(Axis(2))
            .map(|plane| Frame {
                pixels: plane.to_owned().insert_axis(Axis(2)),
                color: ColorSpace::Gray,
            })
            .collect()
    }
}
