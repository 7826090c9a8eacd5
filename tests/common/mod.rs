//! Synthetic rasters shared by the integration tests

#![allow(dead_code)]

use chromashade::Raster;

pub const GREEN: [u8; 4] = [0, 255, 0, 255];
pub const RED: [u8; 4] = [255, 0, 0, 255];
pub const BLUE: [u8; 4] = [0, 0, 255, 255];

/// Neutral gray with luminance `lum`
pub fn gray(lum: f32) -> [u8; 4] {
    let v = (lum.clamp(0.0, 1.0) * 255.0).round() as u8;
    [v, v, v, 255]
}

/// Left half `left`, right half `right`
pub fn split(width: u32, height: u32, left: [u8; 4], right: [u8; 4]) -> Raster {
    Raster::from_fn(width, height, |x, _| if x < width / 2 { left } else { right })
        .expect("valid dimensions")
}

/// Soft circular shadow: luminance 0.3 at the center ramping to 0.9 at `radius`, 0.9 outside
pub fn soft_shadow(size: u32, radius: f32) -> Raster {
    let c = (size as f32 - 1.0) / 2.0;
    Raster::from_fn(size, size, |x, y| {
        let d = ((x as f32 - c).powi(2) + (y as f32 - c).powi(2)).sqrt();
        let t = (d / radius).min(1.0);
        gray(0.3 + 0.6 * t)
    })
    .expect("valid dimensions")
}

/// Green ramp from dark to mid value, with no near-white pixels
pub fn green_ramp(width: u32, height: u32) -> Raster {
    Raster::from_fn(width, height, |x, y| {
        let g = 60 + ((x + y) * 140 / (width + height - 2).max(1)) as u8;
        let r = (x * 40 / width.max(1)) as u8;
        [r, g, 20, 255]
    })
    .expect("valid dimensions")
}

/// Red field behind a light gray left margin: seven columns at 235, one at 220
pub fn white_margin(size: u32) -> Raster {
    Raster::from_fn(size, size, |x, _| match x {
        0..=6 => [235, 235, 235, 255],
        7 => [220, 220, 220, 255],
        _ => [200, 20, 20, 255],
    })
    .expect("valid dimensions")
}

/// Textured scene with a dark blob, used for bound and determinism checks
pub fn busy_scene(size: u32) -> Raster {
    Raster::from_fn(size, size, |x, y| {
        let stripe = ((x / 5 + y / 7) % 3) as u8;
        let base = [180 - stripe * 30, 160 + stripe * 20, 120 + stripe * 10];
        let dx = x as f32 - size as f32 * 0.6;
        let dy = y as f32 - size as f32 * 0.4;
        if dx * dx + dy * dy < (size as f32 * 0.2).powi(2) {
            [base[0] / 3, base[1] / 3, base[2] / 3, 255]
        } else {
            [base[0], base[1], base[2], 255]
        }
    })
    .expect("valid dimensions")
}

pub fn luminance_at(raster: &Raster, x: u32, y: u32) -> f32 {
    let [r, g, b, _] = raster.pixel(x, y);
    chromashade::color::luminance(r, g, b)
}

/// Every channel except alpha is untouched
pub fn rgb_unchanged(a: &Raster, b: &Raster) -> bool {
    a.as_bytes()
        .chunks_exact(4)
        .zip(b.as_bytes().chunks_exact(4))
        .all(|(p, q)| p[..3] == q[..3])
}
