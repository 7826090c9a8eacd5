//! Shadow probability mask, Retinex field and reference brightness

use super::fields::{FeatureFields, Radii};
use crate::config::ShadowConfig;
use crate::guided_filter::guided_filter;
use crate::morphology::box_blur;
use crate::types::{BitMask, ScalarField};

/// Regularizer of the mask's guided filter
const MASK_EPS: f32 = 1e-2;
/// Offset inside the logarithms of the Retinex field
const LOG_EPS: f32 = 1e-4;
/// Upper bound of the Retinex field
pub(crate) const RETINEX_MAX: f32 = 2.0;
const RETINEX_WEIGHTS: [f32; 3] = [0.4, 0.35, 0.25];
/// Pixels with combined shadow weight below this count as lit
const LIT_THRESHOLD: f32 = 0.15;
const REFERENCE_MIN: f32 = 0.55;
const REFERENCE_MAX: f32 = 0.95;
const DIV_EPS: f32 = 1e-3;

#[inline]
fn clamp01(v: f32) -> f32 {
    v.clamp(0.0, 1.0)
}

/// `0.6 + 0.4 * (1 - var_n)`: flat regions count more
#[inline]
pub(crate) fn flatness_gain(var_n: f32) -> f32 {
    0.6 + 0.4 * (1.0 - var_n)
}

/// Combined `0.6 * mask + 0.4 * retinex / max`, the shadow confidence used for the reference level
#[inline]
pub(crate) fn shadow_confidence(mask: f32, retinex: f32) -> f32 {
    clamp01(0.6 * mask + 0.4 * (retinex / RETINEX_MAX))
}

/// Everything the gain stage needs besides the feature fields
pub(crate) struct ShadowMask {
    /// Smoothed shadow probability, `[0, 1]`
    pub weight: ScalarField,
    /// Cast-shadow likelihood, `[0, 1]`
    pub cast: ScalarField,
    /// Multi-scale log-domain darkness, `[0, RETINEX_MAX]`
    pub retinex: ScalarField,
    /// Luminance lit regions hold, clamped to `[0.55, 0.95]`
    pub reference: f32,
}

/// Relative deficit against the wide local mean, damped at edges and favoured on background
fn cast_shadow_field(f: &FeatureFields) -> ScalarField {
    ScalarField::from_index_fn(f.lum.width(), f.lum.height(), |k| {
        let l = f.lum.data()[k];
        let wide = f.mean_large.data()[k];
        let deficit = clamp01((wide - l) / wide.max(DIV_EPS));
        let edge = clamp01(f.grad_sm.data()[k]).powf(0.75);
        let bkg = clamp01(f.bkg_sm.data()[k]);
        clamp01(deficit * (0.35 + 0.65 * bkg) * (1.0 - edge))
    })
}

fn retinex_field(f: &FeatureFields, radii: &Radii) -> ScalarField {
    let blurs: Vec<ScalarField> = radii.retinex.iter().map(|&r| box_blur(&f.lum, r)).collect();
    ScalarField::from_index_fn(f.lum.width(), f.lum.height(), |k| {
        let log_l = (f.lum.data()[k] + LOG_EPS).ln();
        let m: f32 = blurs
            .iter()
            .zip(RETINEX_WEIGHTS)
            .map(|(b, w)| w * ((b.data()[k] + LOG_EPS).ln() - log_l).max(0.0))
            .sum();
        let low_sat = 1.0 - f.sat.data()[k];
        (m * flatness_gain(f.var_n.data()[k]) * low_sat).clamp(0.0, RETINEX_MAX)
    })
}

fn force_user_mask(field: &mut ScalarField, user_mask: Option<&BitMask>) {
    if let Some(mask) = user_mask {
        for (v, &m) in field.data_mut().iter_mut().zip(mask.data()) {
            if m != 0 {
                *v = 1.0;
            }
        }
    }
}

impl ShadowMask {
    /// Combine the feature fields into the final mask
    ///
    /// `user_mask` must match the raster dimensions; its set pixels are forced
    /// to full confidence before and after smoothing.
    pub(crate) fn build(
        f: &FeatureFields,
        radii: &Radii,
        config: &ShadowConfig,
        user_mask: Option<&BitMask>,
    ) -> Self {
        let dark_gain = if config.aggressive { 2.2 } else { 1.4 };
        let cast_weight = if config.aggressive { 0.9 } else { 0.7 };
        let cast = cast_shadow_field(f);

        let mut combined = ScalarField::from_index_fn(f.lum.width(), f.lum.height(), |k| {
            let l = f.lum.data()[k];
            let lift = (f.lum_gf.data()[k] - l).max(0.0);
            let w_edge = 0.25 + 0.75 * clamp01(f.grad_sm.data()[k]).powf(0.75);
            let w_bkg = 0.25 + 0.75 * clamp01(f.bkg_sm.data()[k]);
            let dark_boost = clamp01((f.mean_lum.data()[k] - l) * dark_gain);
            let base = clamp01(lift * w_edge * w_bkg);
            let local = base.max(base * (0.5 + 0.5 * dark_boost));
            local.max(cast_weight * cast.data()[k])
        });
        force_user_mask(&mut combined, user_mask);

        let mut weight = guided_filter(&f.lum, &combined, radii.small, MASK_EPS);
        weight.clamp_in_place(0.0, 1.0);
        let mut weight = box_blur(&weight, (radii.small / 4).max(1));
        force_user_mask(&mut weight, user_mask);
        weight.clamp_in_place(0.0, 1.0);

        let retinex = retinex_field(f, radii);
        let reference = reference_brightness(&f.lum, &weight, &retinex);

        Self {
            weight,
            cast,
            retinex,
            reference,
        }
    }
}

/// Mean luminance of pixels with low shadow confidence, or the global mean when there are none
fn reference_brightness(lum: &ScalarField, weight: &ScalarField, retinex: &ScalarField) -> f32 {
    let mut sum = 0f64;
    let mut count = 0usize;
    for ((&l, &w), &r) in lum.data().iter().zip(weight.data()).zip(retinex.data()) {
        if shadow_confidence(w, r) < LIT_THRESHOLD {
            sum += f64::from(l);
            count += 1;
        }
    }
    let mean = if count > 0 {
        (sum / count as f64) as f32
    } else {
        lum.mean()
    };
    mean.clamp(REFERENCE_MIN, REFERENCE_MAX)
}
