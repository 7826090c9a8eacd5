//! Binary morphology and separable box blur
//!
//! These are the only routines that sweep every pixel in tight loops; the
//! engines build everything else (local means, variances, guided filtering,
//! mask feathering) on top of them. All three run in O(w·h) regardless of
//! radius: morphology through sliding window counts, the blur through a
//! sliding window sum. Rows are processed in parallel with `rayon`; the
//! vertical pass walks rows in order so results are identical to a
//! sequential run.

use crate::types::{BitMask, ScalarField};
use rayon::prelude::*;

#[derive(Clone, Copy)]
enum MorphOp {
    Dilate,
    Erode,
}

impl MorphOp {
    /// Decide the output bit from the number of set pixels in the in-bounds window
    #[inline]
    fn resolve(self, set: u32, window: u32) -> u8 {
        match self {
            Self::Dilate => u8::from(set > 0),
            Self::Erode => u8::from(set == window),
        }
    }
}

/// Binary dilation with a `(2r+1)²` square kernel
///
/// Out-of-bounds neighbours contribute nothing, so a set pixel never grows
/// past the raster edge.
#[must_use]
pub fn dilate(mask: &BitMask, radius: u32) -> BitMask {
    morph(mask, radius, MorphOp::Dilate)
}

/// Binary erosion with a `(2r+1)²` square kernel
///
/// Out-of-bounds neighbours are ignored rather than treated as clear, so a
/// region touching the border is not eaten away from outside the raster.
#[must_use]
pub fn erode(mask: &BitMask, radius: u32) -> BitMask {
    morph(mask, radius, MorphOp::Erode)
}

fn morph(mask: &BitMask, radius: u32, op: MorphOp) -> BitMask {
    let (width, height) = mask.dimensions();
    if radius == 0 || width == 0 || height == 0 {
        return mask.clone();
    }
    let w = width as usize;
    let h = height as usize;
    let r = radius as usize;

    // Horizontal pass: prefix sums per row
    let mut horizontal = vec![0u8; w * h];
    horizontal
        .par_chunks_mut(w)
        .zip(mask.data().par_chunks(w))
        .for_each(|(out, row)| {
            let mut prefix = vec![0u32; w + 1];
            for (x, &v) in row.iter().enumerate() {
                prefix[x + 1] = prefix[x] + u32::from(v != 0);
            }
            for (x, o) in out.iter_mut().enumerate() {
                let lo = x.saturating_sub(r);
                let hi = (x + r).min(w - 1);
                let set = prefix[hi + 1] - prefix[lo];
                *o = op.resolve(set, (hi - lo + 1) as u32);
            }
        });

    // Vertical pass: running per-column counts over the row window
    let mut out = vec![0u8; w * h];
    let mut counts = vec![0u32; w];
    for row in horizontal.chunks_exact(w).take(r.min(h - 1) + 1) {
        for (c, &v) in counts.iter_mut().zip(row) {
            *c += u32::from(v);
        }
    }
    for y in 0..h {
        let lo = y.saturating_sub(r);
        let hi = (y + r).min(h - 1);
        let window = (hi - lo + 1) as u32;
        let dst = &mut out[y * w..(y + 1) * w];
        for (o, &c) in dst.iter_mut().zip(counts.iter()) {
            *o = op.resolve(c, window);
        }
        let enter = y + r + 1;
        if enter < h {
            let row = &horizontal[enter * w..(enter + 1) * w];
            for (c, &v) in counts.iter_mut().zip(row) {
                *c += u32::from(v);
            }
        }
        if y >= r {
            let row = &horizontal[lo * w..(lo + 1) * w];
            for (c, &v) in counts.iter_mut().zip(row) {
                *c -= u32::from(v);
            }
        }
    }

    BitMask::from_vec(width, height, out).unwrap_or_else(|_| mask.clone())
}

#[inline]
fn clamp_index(i: isize, len: usize) -> usize {
    i.clamp(0, len as isize - 1) as usize
}

/// Separable sliding-window mean with clamped border sampling
///
/// Horizontal pass first, then vertical. Every output is the mean of exactly
/// `(2r+1)²` samples, where samples outside the raster repeat the nearest
/// edge pixel. A constant field is returned unchanged.
#[must_use]
pub fn box_blur(field: &ScalarField, radius: u32) -> ScalarField {
    let (width, height) = (field.width(), field.height());
    if radius == 0 || field.is_empty() {
        return field.clone();
    }
    let w = width as usize;
    let h = height as usize;
    let r = radius as isize;
    let k = f64::from(2 * radius + 1);

    let mut tmp = vec![0f32; w * h];
    tmp.par_chunks_mut(w)
        .zip(field.data().par_chunks(w))
        .for_each(|(out, row)| {
            // Window centred on x = -1 so the first step lands on x = 0
            let mut sum: f64 = (-r - 1..r)
                .map(|i| f64::from(row[clamp_index(i, w)]))
                .sum();
            for (x, o) in out.iter_mut().enumerate() {
                let x = x as isize;
                sum += f64::from(row[clamp_index(x + r, w)]);
                sum -= f64::from(row[clamp_index(x - r - 1, w)]);
                *o = (sum / k) as f32;
            }
        });

    let mut dst = vec![0f32; w * h];
    let mut sums = vec![0f64; w];
    for i in -r - 1..r {
        let row = &tmp[clamp_index(i, h) * w..][..w];
        for (s, &v) in sums.iter_mut().zip(row) {
            *s += f64::from(v);
        }
    }
    for y in 0..h {
        let yi = y as isize;
        let enter = &tmp[clamp_index(yi + r, h) * w..][..w];
        let leave = &tmp[clamp_index(yi - r - 1, h) * w..][..w];
        let out = &mut dst[y * w..(y + 1) * w];
        for x in 0..w {
            sums[x] += f64::from(enter[x]) - f64::from(leave[x]);
            out[x] = (sums[x] / k) as f32;
        }
    }

    ScalarField::from_vec(width, height, dst).unwrap_or_else(|_| field.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disk(size: u32, cx: i32, cy: i32, radius: i32) -> BitMask {
        BitMask::from_fn(size, size, |x, y| {
            let dx = x as i32 - cx;
            let dy = y as i32 - cy;
            dx * dx + dy * dy <= radius * radius
        })
    }

    /// Brute-force reference with the same border semantics
    fn naive(mask: &BitMask, r: i32, dilate: bool) -> BitMask {
        let (w, h) = mask.dimensions();
        BitMask::from_fn(w, h, |x, y| {
            let mut any = false;
            let mut all = true;
            for dy in -r..=r {
                for dx in -r..=r {
                    let xx = x as i32 + dx;
                    let yy = y as i32 + dy;
                    if xx < 0 || yy < 0 || xx >= w as i32 || yy >= h as i32 {
                        continue;
                    }
                    let v = mask.get(xx as u32, yy as u32);
                    any |= v;
                    all &= v;
                }
            }
            if dilate {
                any
            } else {
                all
            }
        })
    }

    #[test]
    fn test_matches_brute_force() {
        let mask = BitMask::from_fn(13, 9, |x, y| (x * 7 + y * 3) % 5 == 0 || x == 12);
        for r in 1..4 {
            assert_eq!(dilate(&mask, r), naive(&mask, r as i32, true), "dilate r={r}");
            assert_eq!(erode(&mask, r), naive(&mask, r as i32, false), "erode r={r}");
        }
    }

    #[test]
    fn test_single_speck_is_eroded_away() {
        let mut mask = BitMask::new(9, 9);
        mask.set(4, 4, true);
        assert_eq!(erode(&mask, 1).count(), 0);
        assert_eq!(dilate(&mask, 1).count(), 9);
    }

    #[test]
    fn test_erode_keeps_full_mask_at_border() {
        let mask = BitMask::from_fn(5, 5, |_, _| true);
        assert_eq!(erode(&mask, 2).count(), 25);
    }

    #[test]
    fn test_closing_then_opening_restores_interior_disk() {
        let r = 2;
        let original = disk(32, 16, 16, 6);
        let closed = erode(&dilate(&original, r), r);
        let restored = dilate(&erode(&closed, r), r);
        let diff = restored
            .data()
            .iter()
            .zip(original.data())
            .filter(|(a, b)| a != b)
            .count();
        // Square kernels may square off a few boundary pixels of a digital disk
        assert!(diff <= 8, "{diff} pixels differ");
        assert!(restored.get(16, 16));
        assert!(!restored.get(2, 2));
    }

    #[test]
    fn test_box_blur_constant_field_is_unchanged() {
        let field = ScalarField::filled(7, 5, 1.0);
        let blurred = box_blur(&field, 3);
        assert!(blurred.data().iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_box_blur_matches_clamped_mean() {
        let field = ScalarField::from_fn(6, 4, |x, y| (x * 3 + y) as f32);
        let r = 2i32;
        let blurred = box_blur(&field, r as u32);
        for y in 0..4i32 {
            for x in 0..6i32 {
                let mut sum = 0.0;
                for dy in -r..=r {
                    for dx in -r..=r {
                        let xx = (x + dx).clamp(0, 5) as u32;
                        let yy = (y + dy).clamp(0, 3) as u32;
                        sum += field.get(xx, yy);
                    }
                }
                let expected = sum / 25.0;
                assert!((blurred.get(x as u32, y as u32) - expected).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn test_box_blur_preserves_mass_of_spike_in_interior() {
        let mut field = ScalarField::filled(11, 11, 0.0);
        field.data_mut()[5 * 11 + 5] = 9.0;
        let blurred = box_blur(&field, 1);
        assert!((blurred.get(5, 5) - 1.0).abs() < 1e-6);
        assert!((blurred.get(4, 6) - 1.0).abs() < 1e-6);
        assert_eq!(blurred.get(0, 0), 0.0);
    }
}
