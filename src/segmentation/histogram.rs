use crate::error::{Error, Result};
use crate::frame::Frame;

/// Number of hue bins, one per integer hue in the 8-bit convention.
pub const HUE_BINS: usize = 180;

/// Upper (exclusive) edge of the histogram range.
const HUE_RANGE_END: f64 = 179.0;

/// Hue histogram plus the extent of the channel it was built from.
#[derive(Debug, Clone)]
pub struct Histogram {
    bins: [u32; HUE_BINS],
    extent: (usize, usize),
}

impl Histogram {
    /// Build a 180-bin histogram over `[0, 179)` from a single-channel frame.
    ///
    /// Samples outside the range are not counted but still contribute to
    /// the extent.
    pub fn of_hue(channel: &Frame) -> Result<Self> {
        let plane = channel.plane()?;
        let mut bins = [0u32; HUE_BINS];
        let scale = HUE_BINS as f64 / HUE_RANGE_END;
        for &v in plane.iter() {
            let v = v as f64;
            if v < HUE_RANGE_END {
                let bin = ((v * scale) as usize).min(HUE_BINS - 1);
                bins[bin] += 1;
            }
        }
        Ok(Self {
            bins,
            extent: channel.extent(),
        })
    }

    pub fn bins(&self) -> &[u32; HUE_BINS] {
        &self.bins
    }

    /// `sum(bin[h] * h) / (height * width)`
    pub fn weighted_mean(&self, extent: (usize, usize)) -> Result<f64> {
        let (height, width) = extent;
        if height == 0 || width == 0 {
            return Err(Error::AnalysisDomain { height, width });
        }
        let weighted: f64 = self
            .bins
            .iter()
            .enumerate()
            .map(|(h, &count)| count as f64 * h as f64)
            .sum();
        Ok(weighted / height as f64 / width as f64)
    }
}

/// Average hue of a hue channel, used as a self-calibrating threshold.
///
/// `extent` is the `(height, width)` of the frame the channel came from.
pub fn weighted_mean_hue(channel: &Frame, extent: (usize, usize)) -> Result<f64> {
    let _span = tracing::debug_span!("weighted_mean_hue").entered();
    if channel.is_empty() {
        let (height, width) = channel.extent();
        return Err(Error::AnalysisDomain { height, width });
    }
    Histogram::of_hue(channel)?.weighted_mean(extent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::ColorSpace;

    fn two_region(height: usize, width: usize, left: u8, right: u8) -> Frame {
        Frame::from_fn(height, width, ColorSpace::Gray, |_, x, _| {
            if x < width / 2 {
                left
            } else {
                right
            }
        })
    }

    #[test]
    fn integer_hues_land_in_their_own_bin() {
        let channel = Frame::from_fn(1, 179, ColorSpace::Gray, |_, x, _| x as u8);
        let hist = Histogram::of_hue(&channel).unwrap();
        assert!(hist.bins()[..179].iter().all(|&c| c == 1));
        assert_eq!(hist.bins()[179], 0);
    }

    #[test]
    fn hue_179_is_outside_the_range() {
        let channel = Frame::filled(2, 2, ColorSpace::Gray, 179);
        let hist = Histogram::of_hue(&channel).unwrap();
        assert_eq!(hist.bins().iter().sum::<u32>(), 0);
        assert_eq!(weighted_mean_hue(&channel, (2, 2)).unwrap(), 0.0);
    }

    #[test]
    fn mean_of_two_equal_regions() {
        let channel = two_region(10, 20, 10, 150);
        let mean = weighted_mean_hue(&channel, channel.extent()).unwrap();
        assert!((mean - 80.0).abs() < 1e-9);
    }

    #[test]
    fn pure_and_bounded() {
        let channel = Frame::from_fn(13, 17, ColorSpace::Gray, |y, x, _| {
            ((y * 31 + x * 7) % 256) as u8
        });
        let first = weighted_mean_hue(&channel, channel.extent()).unwrap();
        let second = weighted_mean_hue(&channel, channel.extent()).unwrap();
        assert_eq!(first, second);
        assert!((0.0..=179.0).contains(&first));
    }

    #[test]
    fn zero_extent_is_a_domain_error() {
        let channel = Frame::filled(0, 0, ColorSpace::Gray, 0);
        assert!(matches!(
            weighted_mean_hue(&channel, (0, 0)),
            Err(Error::AnalysisDomain { .. })
        ));
        let channel = Frame::filled(2, 2, ColorSpace::Gray, 5);
        assert!(matches!(
            weighted_mean_hue(&channel, (0, 2)),
            Err(Error::AnalysisDomain { height: 0, width: 2 })
        ));
    }

    #[test]
    fn rejects_multi_channel_input() {
        let frame = Frame::filled(2, 2, ColorSpace::Hsv, 5);
        assert!(weighted_mean_hue(&frame, (2, 2)).is_err());
    }
}
