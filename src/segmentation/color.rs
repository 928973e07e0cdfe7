use crate::error::Result;
use crate::frame::{ColorSpace, Frame};

/// BGR to single-channel luminance, `Y = 0.299 R + 0.587 G + 0.114 B`.
pub fn bgr_to_gray(frame: &Frame) -> Result<Frame> {
    frame.require(ColorSpace::Bgr)?;
    let (height, width) = frame.extent();
    let px = frame.pixels();
    Ok(Frame::from_fn(height, width, ColorSpace::Gray, |y, x, _| {
        let b = px[[y, x, 0]] as f32;
        let g = px[[y, x, 1]] as f32;
        let r = px[[y, x, 2]] as f32;
        (0.299 * r + 0.587 * g + 0.114 * b).round().clamp(0.0, 255.0) as u8
    }))
}

/// BGR to 8-bit HSV with hue halved into [0, 180).
pub fn bgr_to_hsv(frame: &Frame) -> Result<Frame> {
    frame.require(ColorSpace::Bgr)?;
    let (height, width) = frame.extent();
    let mut hsv = Frame::filled(height, width, ColorSpace::Hsv, 0);
    let src = frame.pixels();
    let dst = hsv.pixels_mut();
    for y in 0..height {
        for x in 0..width {
            let (h, s, v) = hsv_pixel(src[[y, x, 0]], src[[y, x, 1]], src[[y, x, 2]]);
            dst[[y, x, 0]] = h;
            dst[[y, x, 1]] = s;
            dst[[y, x, 2]] = v;
        }
    }
    Ok(hsv)
}

fn hsv_pixel(b: u8, g: u8, r: u8) -> (u8, u8, u8) {
    let v = r.max(g).max(b);
    let min = r.min(g).min(b);
    let diff = (v - min) as f32;

    if v == 0 || diff == 0.0 {
        return (0, 0, v);
    }

    let s = (diff * 255.0 / v as f32).round() as u8;
    let (r, g, b) = (r as f32, g as f32, b as f32);
    let mut degrees = if v as f32 == r {
        60.0 * (g - b) / diff
    } else if v as f32 == g {
        120.0 + 60.0 * (b - r) / diff
    } else {
        240.0 + 60.0 * (r - g) / diff
    };
    if degrees < 0.0 {
        degrees += 360.0;
    }

    let mut h = (degrees / 2.0).round() as u16;
    if h >= 180 {
        h -= 180;
    }
    (h as u8, s, v)
}
