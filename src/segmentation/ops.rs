//! Single-channel neighbourhood operators and mask compositing.
//!
//! - `box_blur`: normalised k x k mean, reflect-101 borders, rounded.
//! - `dilate` / `erode`: 3 x 3 square element, samples outside the frame read as 0.
//! - `threshold`: per-sample binarisation against a fractional threshold.
//! - `copy_masked`: copy color pixels wherever a mask sample is non-zero.
use ndarray::Array3;

use crate::error::Result;
use crate::frame::{ColorSpace, Frame};

/// Binarisation rule used by [`threshold`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdRule {
    /// `max_value` where `v > t`, else 0.
    Binary,
    /// `max_value` where `v >= t`, else 0.
    AtOrAbove,
    /// `max_value` where `v < t`, else 0.
    Below,
}

impl ThresholdRule {
    #[inline]
    fn passes(self, value: u8, t: f64) -> bool {
        let v = value as f64;
        match self {
            ThresholdRule::Binary => v > t,
            ThresholdRule::AtOrAbove => v >= t,
            ThresholdRule::Below => v < t,
        }
    }
}

/// Threshold a single-channel frame into a `Mask` of `0` / `max_value`.
pub fn threshold(frame: &Frame, t: f64, max_value: u8, rule: ThresholdRule) -> Result<Frame> {
    frame.require_single_channel()?;
    let pixels = frame
        .pixels()
        .mapv(|v| if rule.passes(v, t) { max_value } else { 0 });
    Frame::new(pixels, ColorSpace::Mask)
}

#[inline]
fn reflect_101(i: isize, len: usize) -> usize {
    let len = len as isize;
    if len == 1 {
        return 0;
    }
    let mut i = i;
    while i < 0 || i >= len {
        i = if i < 0 { -i } else { 2 * len - 2 - i };
    }
    i as usize
}

/// Normalised `k x k` box filter. Keeps the input's color tag.
pub fn box_blur(frame: &Frame, k: usize) -> Result<Frame> {
    frame.require_single_channel()?;
    let (h, w) = frame.extent();
    if h == 0 || w == 0 || k <= 1 {
        return Ok(frame.clone());
    }
    let src = frame.plane()?;
    let r = (k / 2) as isize;
    let area = (k * k) as u32;

    // Separable: horizontal sums, then vertical sums of those.
    let mut rows = vec![0u32; h * w];
    for y in 0..h {
        for x in 0..w {
            let mut sum = 0u32;
            for dx in -r..=r {
                sum += src[[y, reflect_101(x as isize + dx, w)]] as u32;
            }
            rows[y * w + x] = sum;
        }
    }

    let mut out = Array3::<u8>::zeros((h, w, 1));
    for y in 0..h {
        for x in 0..w {
            let mut sum = 0u32;
            for dy in -r..=r {
                sum += rows[reflect_101(y as isize + dy, h) * w + x];
            }
            out[[y, x, 0]] = ((sum + area / 2) / area) as u8;
        }
    }
    Frame::new(out, frame.color())
}

fn morph(frame: &Frame, iterations: usize, pick: fn(u8, u8) -> u8, seed: u8) -> Result<Frame> {
    frame.require_single_channel()?;
    let (h, w) = frame.extent();
    let mut current = frame.pixels().clone();
    let mut next = current.clone();
    for _ in 0..iterations {
        for y in 0..h {
            for x in 0..w {
                let mut acc = seed;
                for dy in -1isize..=1 {
                    for dx in -1isize..=1 {
                        let (yy, xx) = (y as isize + dy, x as isize + dx);
                        let sample = if yy < 0 || xx < 0 || yy >= h as isize || xx >= w as isize {
                            0
                        } else {
                            current[[yy as usize, xx as usize, 0]]
                        };
                        acc = pick(acc, sample);
                    }
                }
                next[[y, x, 0]] = acc;
            }
        }
        std::mem::swap(&mut current, &mut next);
    }
    Frame::new(current, frame.color())
}

/// 3 x 3 maximum filter applied `iterations` times.
pub fn dilate(frame: &Frame, iterations: usize) -> Result<Frame> {
    morph(frame, iterations, u8::max, u8::MIN)
}

/// 3 x 3 minimum filter applied `iterations` times; the border erodes inwards.
pub fn erode(frame: &Frame, iterations: usize) -> Result<Frame> {
    morph(frame, iterations, u8::min, u8::MAX)
}

/// Copy `src` pixels into `dst` wherever `mask` is non-zero.
pub fn copy_masked(src: &Frame, mask: &Frame, dst: &mut Frame) -> Result<()> {
    mask.require_single_channel()?;
    src.require_same_extent(mask)?;
    src.require_same_extent(dst)?;
    dst.require(src.color())?;

    let mask = mask.plane()?;
    let channels = src.channels();
    let from = src.pixels();
    let to = dst.pixels_mut();
    for ((y, x), &m) in mask.indexed_iter() {
        if m != 0 {
            for c in 0..channels {
                to[[y, x, c]] = from[[y, x, c]];
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_from(rows: &[&[u8]]) -> Frame {
        Frame::from_fn(rows.len(), rows[0].len(), ColorSpace::Mask, |y, x, _| rows[y][x])
    }

    #[test]
    fn reflect_101_indices() {
        assert_eq!(reflect_101(-1, 5), 1);
        assert_eq!(reflect_101(-2, 5), 2);
        assert_eq!(reflect_101(5, 5), 3);
        assert_eq!(reflect_101(6, 5), 2);
        assert_eq!(reflect_101(3, 1), 0);
    }

    #[test]
    fn blur_of_constant_is_constant() {
        let frame = Frame::filled(6, 7, ColorSpace::Gray, 42);
        let blurred = box_blur(&frame, 5).unwrap();
        assert!(blurred.pixels().iter().all(|&v| v == 42));
        assert_eq!(blurred.color(), ColorSpace::Gray);
    }

    #[test]
    fn blur_spreads_an_impulse() {
        let mut frame = Frame::filled(5, 5, ColorSpace::Gray, 0);
        frame.pixels_mut()[[2, 2, 0]] = 90;
        let blurred = box_blur(&frame, 3).unwrap();
        assert_eq!(blurred.pixel(2, 2), vec![10]);
        assert_eq!(blurred.pixel(1, 1), vec![10]);
        assert_eq!(blurred.pixel(0, 0), vec![0]);
    }

    fn samples(frame: &Frame) -> Vec<u8> {
        frame.plane().unwrap().iter().copied().collect()
    }

    #[test]
    fn threshold_rules() {
        let frame = Frame::from_fn(1, 4, ColorSpace::Gray, |_, x, _| [10, 80, 81, 150][x]);
        let binary = threshold(&frame, 80.0, 179, ThresholdRule::Binary).unwrap();
        assert_eq!(samples(&binary), vec![0, 0, 179, 179]);
        let at_or_above = threshold(&frame, 80.0, 1, ThresholdRule::AtOrAbove).unwrap();
        assert_eq!(samples(&at_or_above), vec![0, 1, 1, 1]);
        let below = threshold(&frame, 80.0, 1, ThresholdRule::Below).unwrap();
        assert_eq!(samples(&below), vec![1, 0, 0, 0]);
        assert_eq!(binary.color(), ColorSpace::Mask);
    }

    #[test]
    fn fractional_threshold_splits_between_integers() {
        let frame = Frame::from_fn(1, 3, ColorSpace::Gray, |_, x, _| [79, 80, 81][x]);
        let at_or_above = threshold(&frame, 79.5, 1, ThresholdRule::AtOrAbove).unwrap();
        let below = threshold(&frame, 79.5, 1, ThresholdRule::Below).unwrap();
        assert_eq!(samples(&at_or_above), vec![0, 1, 1]);
        assert_eq!(samples(&below), vec![1, 0, 0]);
    }

    #[test]
    fn erode_eats_from_the_zero_border() {
        let full = Frame::filled(5, 5, ColorSpace::Mask, 255);
        let eroded = erode(&full, 1).unwrap();
        let expected = mask_from(&[
            &[0, 0, 0, 0, 0],
            &[0, 255, 255, 255, 0],
            &[0, 255, 255, 255, 0],
            &[0, 255, 255, 255, 0],
            &[0, 0, 0, 0, 0],
        ]);
        assert_eq!(eroded, expected);
        let twice = erode(&full, 2).unwrap();
        assert_eq!(twice.pixel(2, 2), vec![255]);
        assert_eq!(twice.pixel(1, 2), vec![0]);
    }

    #[test]
    fn dilate_fills_single_pixel_gap() {
        let mask = mask_from(&[
            &[0, 0, 0, 0, 0],
            &[0, 0, 0, 0, 0],
            &[0, 0, 7, 0, 0],
            &[0, 0, 0, 0, 0],
            &[0, 0, 0, 0, 0],
        ]);
        let grown = dilate(&mask, 1).unwrap();
        let lit: usize = grown.pixels().iter().filter(|&&v| v == 7).count();
        assert_eq!(lit, 9);
        assert_eq!(grown.pixel(0, 0), vec![0]);
    }

    #[test]
    fn copy_masked_selects_pixels() {
        let src = Frame::filled(2, 2, ColorSpace::Bgr, 200);
        let mask = mask_from(&[&[1, 0], &[0, 1]]);
        let mut dst = Frame::filled(2, 2, ColorSpace::Bgr, 0);
        copy_masked(&src, &mask, &mut dst).unwrap();
        assert_eq!(dst.pixel(0, 0), vec![200, 200, 200]);
        assert_eq!(dst.pixel(0, 1), vec![0, 0, 0]);
        assert_eq!(dst.pixel(1, 1), vec![200, 200, 200]);
    }

    #[test]
    fn copy_masked_rejects_mismatched_extent() {
        let src = Frame::filled(2, 2, ColorSpace::Bgr, 200);
        let mask = Frame::filled(3, 2, ColorSpace::Mask, 1);
        let mut dst = Frame::filled(2, 2, ColorSpace::Bgr, 0);
        assert!(copy_masked(&src, &mask, &mut dst).is_err());
    }
}
