//! Per-pixel feature fields the shadow mask is built from

use crate::cancel::{checkpoint, CancellationToken};
use crate::color::{luminance, saturation, value};
use crate::error::Result;
use crate::guided_filter::guided_filter;
use crate::morphology::box_blur;
use crate::types::{Raster, ScalarField, CHANNELS};
use rayon::prelude::*;

/// Regularizer of the illumination estimate
const ILLUMINATION_EPS: f32 = 1e-3;
/// Variance maxima below this are treated as a flat image
const MIN_VARIANCE_MAX: f32 = 1e-6;

/// Filter radii scaled to the raster size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Radii {
    /// `round(clamp(max(w, h) / 480 * 14, 10, 32))`
    pub base: u32,
    /// Local mean and variance window
    pub variance: u32,
    /// Smoothing of gradient, background likelihood and the mask
    pub small: u32,
    /// Wide window separating cast shadows from local detail
    pub large: u32,
    /// Retinex scales, fine to coarse
    pub retinex: [u32; 3],
}

impl Radii {
    #[must_use]
    pub fn for_dimensions(width: u32, height: u32) -> Self {
        let longest = width.max(height) as f32;
        let base = (longest / 480.0 * 14.0).clamp(10.0, 32.0).round() as u32;
        let half = (base as f32 / 2.0).round() as u32;
        let double = base * 2;
        Self {
            base,
            variance: base.max(8),
            small: half.max(2),
            large: double.max(12),
            retinex: [half.max(3), base.max(4), double.max(6)],
        }
    }
}

/// Feature fields derived from one raster
pub(crate) struct FeatureFields {
    pub lum: ScalarField,
    pub sat: ScalarField,
    /// Edge-preserving illumination estimate
    pub lum_gf: ScalarField,
    /// Local mean luminance over the variance window
    pub mean_lum: ScalarField,
    /// Local luminance variance normalized by its maximum, `[0, 1]`
    pub var_n: ScalarField,
    /// Smoothed gradient magnitude, `[0, 1]`
    pub grad_sm: ScalarField,
    /// Mean luminance over the large window
    pub mean_large: ScalarField,
    /// Smoothed background likelihood, `[0, 1]`
    pub bkg_sm: ScalarField,
}

fn channel_field(raster: &Raster, f: impl Fn(&[u8]) -> f32 + Sync + Send) -> ScalarField {
    let data: Vec<f32> = raster
        .as_bytes()
        .par_chunks_exact(CHANNELS)
        .map(|p| f(p))
        .collect();
    ScalarField::from_index_fn(raster.width(), raster.height(), |k| data[k])
}

/// Central-difference gradient magnitude with clamped borders, capped at 1
fn gradient_magnitude(lum: &ScalarField) -> ScalarField {
    let w = lum.width() as usize;
    let h = lum.height() as usize;
    let d = lum.data();
    let rows: Vec<f32> = (0..h)
        .into_par_iter()
        .flat_map_iter(|y| {
            let up = y.saturating_sub(1);
            let down = (y + 1).min(h - 1);
            (0..w).map(move |x| {
                let left = x.saturating_sub(1);
                let right = (x + 1).min(w - 1);
                let gx = d[y * w + right] - d[y * w + left];
                let gy = d[down * w + x] - d[up * w + x];
                gx.hypot(gy).min(1.0)
            })
        })
        .collect();
    ScalarField::from_index_fn(lum.width(), lum.height(), |k| rows[k])
}

impl FeatureFields {
    pub(crate) fn compute(
        raster: &Raster,
        radii: &Radii,
        cancel: Option<&CancellationToken>,
    ) -> Result<Self> {
        let lum = channel_field(raster, |p| luminance(p[0], p[1], p[2]));
        let sat = channel_field(raster, |p| saturation(p[0], p[1], p[2]));
        let val = channel_field(raster, |p| value(p[0], p[1], p[2]));
        checkpoint(cancel)?;

        let lum_gf = guided_filter(&lum, &lum, radii.base, ILLUMINATION_EPS);
        checkpoint(cancel)?;

        let mean_lum = box_blur(&lum, radii.variance);
        let mean_lum2 = box_blur(&lum.map(|l| l * l), radii.variance);
        let variance = mean_lum2.zip_map(&mean_lum, |m2, m| (m2 - m * m).max(0.0));
        let inv_max = 1.0 / variance.max_value().max(MIN_VARIANCE_MAX);
        let var_n = variance.map(|v| (v * inv_max).clamp(0.0, 1.0));
        checkpoint(cancel)?;

        let mut grad_sm = box_blur(&gradient_magnitude(&lum), radii.small);
        grad_sm.clamp_in_place(0.0, 1.0);
        let mean_large = box_blur(&lum, radii.large);
        checkpoint(cancel)?;

        // Dark, desaturated, flat pixels look like background in shadow
        let bkg = ScalarField::from_index_fn(raster.width(), raster.height(), |k| {
            let darkness = 1.0 - val.data()[k];
            let low_sat = 1.0 - sat.data()[k];
            let score = 0.5 * low_sat + 0.5 * darkness;
            let flatness = 0.7 + 0.3 * (1.0 - var_n.data()[k]);
            (score * flatness).clamp(0.0, 1.0)
        });
        let mut bkg_sm = box_blur(&bkg, radii.small);
        bkg_sm.clamp_in_place(0.0, 1.0);
        checkpoint(cancel)?;

        Ok(Self {
            lum,
            sat,
            lum_gf,
            mean_lum,
            var_n,
            grad_sm,
            mean_large,
            bkg_sm,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_radii_scale_with_size() {
        let small = Radii::for_dimensions(100, 80);
        assert_eq!(small.base, 10);
        assert_eq!(small.variance, 10);
        assert_eq!(small.small, 5);
        assert_eq!(small.large, 20);
        assert_eq!(small.retinex, [5, 10, 20]);

        let big = Radii::for_dimensions(4000, 3000);
        assert_eq!(big.base, 32);
        assert_eq!(big.large, 64);

        let mid = Radii::for_dimensions(960, 400);
        assert_eq!(mid.base, 28);
    }

    #[test]
    fn test_gradient_of_flat_field_is_zero() {
        let flat = ScalarField::filled(6, 6, 0.4);
        assert!(gradient_magnitude(&flat).data().iter().all(|&g| g == 0.0));
    }

    #[test]
    fn test_gradient_detects_step() {
        let step = ScalarField::from_fn(6, 3, |x, _| if x < 3 { 0.0 } else { 1.0 });
        let g = gradient_magnitude(&step);
        assert_eq!(g.get(2, 1), 1.0);
        assert_eq!(g.get(0, 1), 0.0);
    }

    #[test]
    fn test_fields_stay_in_unit_range() {
        let raster = Raster::from_fn(40, 30, |x, y| {
            let v = ((x * 37 + y * 91) % 256) as u8;
            [v, 255 - v, v / 2, 255]
        })
        .unwrap();
        let radii = Radii::for_dimensions(40, 30);
        let fields = FeatureFields::compute(&raster, &radii, None).unwrap();
        for field in [&fields.var_n, &fields.grad_sm, &fields.bkg_sm] {
            assert!(field.data().iter().all(|v| (0.0..=1.0).contains(v)));
        }
    }
}
