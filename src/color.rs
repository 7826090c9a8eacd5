//! Color-space helpers shared by both engines
//!
//! HSV conversion, circular hue distance and the neutral-saturation test
//! that decides when hue is too unreliable to match on.

use serde::{Deserialize, Serialize};

/// Saturation at or below which a color counts as neutral (grey/white/black)
pub const NEUTRAL_SATURATION: f32 = 0.12;

/// Hue in degrees `[0, 360)`, saturation and value in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Hsv {
    pub h: f32,
    pub s: f32,
    pub v: f32,
}

/// Convert 8-bit RGB to HSV; hue is 0 when the color is achromatic
#[must_use]
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> Hsv {
    let r = f32::from(r) / 255.0;
    let g = f32::from(g) / 255.0;
    let b = f32::from(b) / 255.0;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let d = max - min;
    let s = if max == 0.0 { 0.0 } else { d / max };

    let mut h = 0.0;
    if d != 0.0 {
        h = if max == r {
            (g - b) / d + if g < b { 6.0 } else { 0.0 }
        } else if max == g {
            (b - r) / d + 2.0
        } else {
            (r - g) / d + 4.0
        };
        h /= 6.0;
    }

    Hsv {
        h: (h * 360.0).rem_euclid(360.0),
        s,
        v: max,
    }
}

/// Circular distance between two hues, in `[0, 180]`
#[must_use]
pub fn hue_delta(h1: f32, h2: f32) -> f32 {
    let d = (h1 - h2).abs().rem_euclid(360.0);
    if d > 180.0 {
        360.0 - d
    } else {
        d
    }
}

/// Below this saturation hue is unreliable and matching falls back to RGB distance
#[must_use]
pub fn is_neutral(s: f32) -> bool {
    s <= NEUTRAL_SATURATION
}

/// Euclidean distance in RGB space, `[0, ~441.7]`
#[must_use]
pub fn rgb_distance(a: [u8; 3], b: [u8; 3]) -> f32 {
    let dr = f32::from(a[0]) - f32::from(b[0]);
    let dg = f32::from(a[1]) - f32::from(b[1]);
    let db = f32::from(a[2]) - f32::from(b[2]);
    (dr * dr + dg * dg + db * db).sqrt()
}

/// Rec. 709 luminance normalized to `[0, 1]`
#[must_use]
pub fn luminance(r: u8, g: u8, b: u8) -> f32 {
    (0.2126 * f32::from(r) + 0.7152 * f32::from(g) + 0.0722 * f32::from(b)) / 255.0
}

/// `(max - min) / max` of the channels, 0 for black
#[must_use]
pub fn saturation(r: u8, g: u8, b: u8) -> f32 {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    if max == 0 {
        0.0
    } else {
        f32::from(max - min) / f32::from(max)
    }
}

/// Largest channel normalized to `[0, 1]`
#[must_use]
pub fn value(r: u8, g: u8, b: u8) -> f32 {
    f32::from(r.max(g).max(b)) / 255.0
}
