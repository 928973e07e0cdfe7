use crate::error::Result;
use crate::frame::{ColorSpace, Frame};

use super::color::bgr_to_gray;
use super::ops::{box_blur, copy_masked};

/// Upper to lower threshold ratio handed to the edge operator.
pub const EDGE_THRESHOLD_RATIO: f64 = 3.0;

/// Hysteresis edge operator over a grayscale frame.
///
/// Returns a `Mask` frame, non-zero on edge pixels.
pub trait EdgeOperator: Send {
    fn detect(&self, gray: &Frame, low: f64, high: f64) -> Result<Frame>;
}

/// Canny detector backed by `imageproc`.
///
/// `imageproc::edges::canny` smooths its input with a Gaussian (sigma 1.4)
/// before taking gradients, so frames from [`EdgeDetection`] are blurred
/// twice: once by the 3 x 3 box filter and once here.
#[derive(Debug, Default, Clone, Copy)]
pub struct Canny;

impl EdgeOperator for Canny {
    fn detect(&self, gray: &Frame, low: f64, high: f64) -> Result<Frame> {
        let image = gray.to_gray_image()?;
        let edges = imageproc::edges::canny(&image, low as f32, high as f32);
        Frame::from_gray_image(&edges, ColorSpace::Mask)
    }
}

/// Shows only edge pixels, in their original color, over black.
pub struct EdgeDetection {
    operator: Box<dyn EdgeOperator>,
}

impl EdgeDetection {
    pub fn new() -> Self {
        Self::with_operator(Box::new(Canny))
    }

    pub fn with_operator(operator: Box<dyn EdgeOperator>) -> Self {
        Self { operator }
    }

    pub fn process(&self, frame: &Frame, threshold: f64) -> Result<Frame> {
        let _span = tracing::debug_span!("edge_detection", threshold).entered();

        let gray = bgr_to_gray(frame)?;
        let smoothed = box_blur(&gray, 3)?;
        let edges = self
            .operator
            .detect(&smoothed, threshold, threshold * EDGE_THRESHOLD_RATIO)?;

        let (height, width) = frame.extent();
        let mut output = Frame::filled(height, width, ColorSpace::Bgr, 0);
        copy_masked(frame, &edges, &mut output)?;
        Ok(output)
    }
}

impl Default for EdgeDetection {
    fn default() -> Self {
        Self::new()
    }
}
