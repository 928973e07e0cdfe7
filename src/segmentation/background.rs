use crate::error::Result;
use crate::frame::{ColorSpace, Frame};

use super::color::bgr_to_hsv;
use super::histogram::weighted_mean_hue;
use super::ops::{box_blur, copy_masked, dilate, erode, threshold, ThresholdRule};

/// Mask value for the hue-domain threshold stages.
const HUE_MAX: u8 = 179;
/// Fill color where no foreground is found.
const BACKGROUND_FILL: u8 = 255;

const SPECKLE_BLUR: usize = 5;
const DILATE_ITERATIONS: usize = 1;
const ERODE_ITERATIONS: usize = 3;

/// Removes a roughly uniform background using the image's average hue.
///
/// Steps:
/// 1. BGR to HSV, keep the hue plane
/// 2. Threshold the hue at its weighted mean (polarity selects which side is background)
/// 3. 5x5 blur, dilate once, erode three times
/// 4. Re-threshold at the same mean to get a clean mask
/// 5. Copy the original pixels over a white canvas where the mask is set
#[derive(Debug, Default, Clone, Copy)]
pub struct BackgroundRemoval;

impl BackgroundRemoval {
    pub fn new() -> Self {
        Self
    }

    /// Foreground mask for `frame`, values 0 or 179.
    pub fn mask(&self, frame: &Frame, inverse_polarity: bool) -> Result<Frame> {
        let hsv = bgr_to_hsv(frame)?;
        let hue = hsv.split().swap_remove(0);
        let mean = weighted_mean_hue(&hue, frame.extent())?;
        tracing::trace!(mean, inverse_polarity, "hue threshold");

        // Non-inverse keeps hue >= mean as foreground and inverse keeps
        // hue < mean. This is the opposite of a binary-inverse threshold,
        // which would keep hue <= mean in the non-inverse case.
        let rule = if inverse_polarity {
            ThresholdRule::Below
        } else {
            ThresholdRule::AtOrAbove
        };
        let mask = threshold(&hue, mean, HUE_MAX, rule)?;

        let mask = box_blur(&mask, SPECKLE_BLUR)?;
        let mask = dilate(&mask, DILATE_ITERATIONS)?;
        let mask = erode(&mask, ERODE_ITERATIONS)?;

        // Reuses the pre-cleanup mean on purpose.
        threshold(&mask, mean, HUE_MAX, ThresholdRule::Binary)
    }

    pub fn process(&self, frame: &Frame, inverse_polarity: bool) -> Result<Frame> {
        let _span = tracing::debug_span!("background_removal", inverse_polarity).entered();

        let mask = self.mask(frame, inverse_polarity)?;
        let (height, width) = frame.extent();
        let mut foreground = Frame::filled(height, width, ColorSpace::Bgr, BACKGROUND_FILL);
        copy_masked(frame, &mask, &mut foreground)?;
        Ok(foreground)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    const ORANGE: [u8; 3] = [0, 85, 255]; // hue 10
    const MAGENTA: [u8; 3] = [255, 0, 255]; // hue 150
    const WHITE: [u8; 3] = [255, 255, 255];

    /// Left half hue 10, right half hue 150.
    fn two_region() -> Frame {
        Frame::from_fn(20, 40, ColorSpace::Bgr, |_, x, c| {
            if x < 20 {
                ORANGE[c]
            } else {
                MAGENTA[c]
            }
        })
    }

    #[test]
    fn below_mean_is_background_by_default() {
        let out = BackgroundRemoval::new().process(&two_region(), false).unwrap();
        assert_eq!(out.color(), ColorSpace::Bgr);
        assert_eq!(out.pixel(10, 30), MAGENTA.to_vec());
        assert_eq!(out.pixel(10, 8), WHITE.to_vec());
    }

    #[test]
    fn inverse_polarity_flips_the_foreground() {
        let out = BackgroundRemoval::new().process(&two_region(), true).unwrap();
        assert_eq!(out.pixel(10, 8), ORANGE.to_vec());
        assert_eq!(out.pixel(10, 30), WHITE.to_vec());
    }

    #[test]
    fn mask_is_binary_and_eroded_at_the_border() {
        let mask = BackgroundRemoval::new().mask(&two_region(), false).unwrap();
        assert_eq!(mask.color(), ColorSpace::Mask);
        assert!(mask.pixels().iter().all(|&v| v == 0 || v == HUE_MAX));
        assert_eq!(mask.pixel(10, 30), vec![HUE_MAX]);
        // Zero-padded erosion pulls the foreground off the frame edge.
        assert_eq!(mask.pixel(0, 30), vec![0]);
        assert_eq!(mask.pixel(10, 39), vec![0]);
    }

    #[test]
    fn empty_frame_is_a_domain_error() {
        assert!(matches!(
            BackgroundRemoval::new().process(&Frame::empty(), false),
            Err(Error::AnalysisDomain { .. })
        ));
    }
}
