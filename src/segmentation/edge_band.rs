//! Cleanup passes that run after global seeds
//!
//! Anti-aliased borders and halo pixels are often a blend of the seed color
//! and the canvas white, so the main matching pass under-clears them. The
//! edge band clears near-white runs along the four raster sides; boundary
//! tightening clears opaque pixels mostly surrounded by cleared neighbours
//! whose color is close to a global seed.

use super::matching::BoundaryMatcher;
use super::tolerance::*;
use crate::color::Hsv;
use crate::types::{Raster, CHANNELS};

#[inline]
fn alpha_at(data: &[u8], idx: usize) -> u8 {
    data[idx * CHANNELS + 3]
}

/// Clear near-white, low-saturation runs inside the outer border strips
///
/// Each scan line starts at the raster edge and walks inward for the strip
/// width, stopping once more than [`BAND_MAX_MISSES`] consecutive pixels fail
/// to clear. Already transparent pixels are skipped and do not count as
/// misses, so earlier clearing never shortens a scan. Returns the number of
/// pixels cleared.
pub(crate) fn clear_edge_band(out: &mut Raster, hsv: &[Hsv]) -> usize {
    let (w, h) = out.dimensions();
    let band_x = band_width(w);
    let band_y = band_width(h);
    let width = w as usize;
    let data = out.as_bytes_mut();
    let mut cleared = 0usize;

    let mut scan = |indices: &mut dyn Iterator<Item = usize>| {
        let mut misses = 0u32;
        for idx in indices {
            let off = idx * CHANNELS;
            if data[off + 3] <= ALPHA_FLOOR {
                continue;
            }
            let pv = hsv[idx];
            if pv.s <= BAND_MAX_SATURATION && pv.v >= BAND_MIN_VALUE {
                data[off + 3] = 0;
                cleared += 1;
                misses = 0;
            } else {
                misses += 1;
                if misses > BAND_MAX_MISSES {
                    break;
                }
            }
        }
    };

    for y in 0..h as usize {
        let row = y * width;
        scan(&mut (0..band_x as usize).map(|x| row + x));
        scan(&mut (0..band_x as usize).map(|x| row + width - 1 - x));
    }
    let height = h as usize;
    for x in 0..width {
        scan(&mut (0..band_y as usize).map(|y| y * width + x));
        scan(&mut (0..band_y as usize).map(|y| (height - 1 - y) * width + x));
    }
    cleared
}

/// Clear interior opaque pixels with two or more cleared 4-neighbours that match a global seed
///
/// Candidates are collected against the alpha state before the pass and
/// applied together, so the order of the scan does not matter. Returns the
/// number of pixels cleared.
pub(crate) fn tighten_boundary(out: &mut Raster, hsv: &[Hsv], matchers: &[BoundaryMatcher]) -> usize {
    let (w, h) = out.dimensions();
    if w < 3 || h < 3 || matchers.is_empty() {
        return 0;
    }
    let width = w as usize;
    let mut candidates = Vec::new();
    {
        let data = out.as_bytes();
        for y in 1..h as usize - 1 {
            for x in 1..width - 1 {
                let idx = y * width + x;
                if alpha_at(data, idx) == 0 {
                    continue;
                }
                let open = [idx - 1, idx + 1, idx - width, idx + width]
                    .iter()
                    .filter(|&&n| alpha_at(data, n) == 0)
                    .count();
                if open < 2 {
                    continue;
                }
                let off = idx * CHANNELS;
                let rgb = [data[off], data[off + 1], data[off + 2]];
                if matchers.iter().any(|m| m.matches(rgb, hsv[idx])) {
                    candidates.push(idx);
                }
            }
        }
    }
    let data = out.as_bytes_mut();
    for &idx in &candidates {
        data[idx * CHANNELS + 3] = 0;
    }
    candidates.len()
}
