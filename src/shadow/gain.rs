//! Per-pixel brightening gain
//!
//! Several independent estimates of how much a shadowed pixel should be
//! brightened compete; the largest wins. Each is clamped to its own cap, so
//! one runaway estimate cannot dominate on pathological input.

use super::mask::{flatness_gain, shadow_confidence};
use crate::color::luminance;
use crate::config::ShadowConfig;

const DIV_EPS: f32 = 1e-3;
const MASK_EXPONENT: f32 = 0.9;
const RETINEX_GAIN: f32 = 2.2;
const RETINEX_GAIN_MAX: f32 = 1.2;
const LOCAL_SHADING_FACTOR: f32 = 0.8;

#[inline]
fn clamp01(v: f32) -> f32 {
    v.clamp(0.0, 1.0)
}

/// Rec. 709 luminance of a 0-255 float triple, unnormalized
#[inline]
fn luma(c: [f32; 3]) -> f32 {
    0.2126 * c[0] + 0.7152 * c[1] + 0.0722 * c[2]
}

/// Field values sampled at one pixel
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct PixelInputs {
    pub lum: f32,
    pub lum_gf: f32,
    pub mean_lum: f32,
    pub mean_large: f32,
    pub var_n: f32,
    pub sat: f32,
    pub retinex: f32,
    pub mask: f32,
    pub cast: f32,
}

/// Upper bounds of the individual gain candidates
#[derive(Debug, Clone, Copy, PartialEq)]
struct GainCaps {
    guided: f32,
    retinex: f32,
    reference: f32,
    local: f32,
    cast: f32,
}

impl GainCaps {
    fn new(aggressive: bool, extreme: bool) -> Self {
        let reference = if aggressive { 2.8 } else { 2.3 };
        if extreme {
            Self {
                guided: 2.0,
                retinex: 2.8,
                reference: reference + 0.4,
                local: 2.4,
                cast: 3.2,
            }
        } else {
            Self {
                guided: 1.7,
                retinex: 2.4,
                reference,
                local: 2.0,
                cast: 2.6,
            }
        }
    }
}

/// Gain model for one correction call
#[derive(Debug, Clone, Copy)]
pub(crate) struct GainModel {
    strength: f32,
    bias: f32,
    target: Option<f32>,
    reference: f32,
    gamma: f32,
    blend: f32,
    caps: GainCaps,
}

impl GainModel {
    /// `config` must already be sanitized
    pub(crate) fn new(config: &ShadowConfig, reference: f32) -> Self {
        Self {
            strength: config.strength / 100.0,
            bias: config.bias / 100.0,
            target: config.target_brightness,
            reference,
            gamma: if config.extreme { 0.72 } else { 0.78 },
            blend: if config.aggressive { 0.08 } else { 0.07 },
            caps: GainCaps::new(config.aggressive, config.extreme),
        }
    }

    /// Final per-pixel correction weight in `[0, 1]`; zero means the pixel is left alone
    #[inline]
    pub(crate) fn weight(&self, p: &PixelInputs) -> f32 {
        let bias_gain = 0.25 + 0.75 * self.bias;
        let dark = clamp01(
            clamp01(p.mean_large - p.lum) * flatness_gain(p.var_n) * (1.0 - p.sat) * bias_gain,
        );
        clamp01(clamp01(p.mask).max(dark).powf(MASK_EXPONENT) * self.strength)
    }

    /// Largest of the competing gain candidates, always `>= 1`
    #[inline]
    pub(crate) fn gain(&self, p: &PixelInputs, w: f32) -> f32 {
        let s = self.strength;
        let l = p.lum.max(DIV_EPS);
        let caps = &self.caps;

        let target_lum = p.lum + w * (p.lum_gf - p.lum);
        let guided = (target_lum / l).clamp(1.0, caps.guided);

        let retinex_lift = (p.retinex * RETINEX_GAIN * s).clamp(0.0, RETINEX_GAIN_MAX);
        let retinex = (1.0 + retinex_lift * w).clamp(1.0, caps.retinex);

        let pull = s * shadow_confidence(clamp01(p.mask), p.retinex) * (0.6 + 0.4 * self.bias);
        let reference = (1.0 + pull * (self.reference / l - 1.0).max(0.0)).clamp(1.0, caps.reference);

        let local = (1.0 + w * (p.mean_lum / l - 1.0).max(0.0) * LOCAL_SHADING_FACTOR)
            .clamp(1.0, caps.local);

        let cast = (1.0 + s * p.cast * (p.mean_large / l - 1.0).max(0.0)).clamp(1.0, caps.cast);

        let target = self.target.map_or(1.0, |t| {
            (1.0 + w * (t / l - 1.0).max(0.0)).clamp(1.0, caps.reference)
        });

        guided.max(retinex).max(reference).max(local).max(cast).max(target)
    }

    /// Brighten one RGBA pixel in place; `smooth` is the guided-filtered color at that pixel
    #[inline]
    pub(crate) fn apply(&self, px: &mut [u8], p: &PixelInputs, smooth: [f32; 3]) {
        let w = self.weight(p);
        if w <= 0.0 {
            return;
        }
        let factor = self.gain(p, w).powf(self.gamma);
        let blend = self.blend * w;
        let lifted: [f32; 3] =
            std::array::from_fn(|c| (f32::from(px[c]) * factor).round().clamp(0.0, 255.0));
        let mixed: [f32; 3] =
            std::array::from_fn(|c| lifted[c] * (1.0 - blend) + smooth[c] * blend);

        // The blend only smooths chroma; luminance stays that of the lifted pixel
        let mixed_luma = luma(mixed);
        let k = if mixed_luma > DIV_EPS { luma(lifted) / mixed_luma } else { 1.0 };
        let mut rgb = [0u8; 3];
        for c in 0..3 {
            rgb[c] = (mixed[c] * k).round().clamp(0.0, 255.0) as u8;
        }

        if let Some(t) = self.target {
            let cap = p.lum.max(t);
            let out_lum = luminance(rgb[0], rgb[1], rgb[2]);
            if out_lum > cap {
                // Flooring keeps the scaled luminance at or below the cap
                let k = cap / out_lum;
                for c in &mut rgb {
                    *c = (f32::from(*c) * k).floor() as u8;
                }
            }
        }
        px[..3].copy_from_slice(&rgb);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shadow_pixel() -> PixelInputs {
        PixelInputs {
            lum: 0.3,
            lum_gf: 0.5,
            mean_lum: 0.6,
            mean_large: 0.8,
            var_n: 0.1,
            sat: 0.0,
            retinex: 0.6,
            mask: 0.8,
            cast: 0.5,
        }
    }

    #[test]
    fn test_zero_strength_has_zero_weight() {
        let config = ShadowConfig {
            strength: 0.0,
            ..ShadowConfig::default()
        };
        let model = GainModel::new(&config, 0.8);
        assert_eq!(model.weight(&shadow_pixel()), 0.0);
        let mut px = [70, 70, 70, 255];
        model.apply(&mut px, &shadow_pixel(), [200.0; 3]);
        assert_eq!(px, [70, 70, 70, 255]);
    }

    #[test]
    fn test_gain_is_at_least_one_and_capped() {
        let model = GainModel::new(&ShadowConfig::default(), 0.8);
        let p = shadow_pixel();
        let w = model.weight(&p);
        let g = model.gain(&p, w);
        assert!(g > 1.0);
        assert!(g <= 2.8);

        let lit = PixelInputs {
            lum: 0.9,
            lum_gf: 0.9,
            mean_lum: 0.9,
            mean_large: 0.9,
            mask: 0.0,
            retinex: 0.0,
            cast: 0.0,
            ..p
        };
        assert_eq!(model.gain(&lit, 0.0), 1.0);
    }

    #[test]
    fn test_black_pixel_gain_stays_finite() {
        let model = GainModel::new(&ShadowConfig::default(), 0.9);
        let p = PixelInputs {
            lum: 0.0,
            ..shadow_pixel()
        };
        let g = model.gain(&p, 1.0);
        assert!(g.is_finite() && g >= 1.0);
    }

    #[test]
    fn test_extreme_raises_caps() {
        let normal = GainCaps::new(true, false);
        let extreme = GainCaps::new(true, true);
        assert!(extreme.guided > normal.guided);
        assert!(extreme.retinex > normal.retinex);
        assert!(extreme.reference > normal.reference);
        assert!(extreme.cast > normal.cast);
    }

    #[test]
    fn test_output_never_darkens_as_strength_grows() {
        let p = shadow_pixel();
        let mut previous = 0.0;
        for strength in [10.0, 30.0, 50.0, 80.0, 100.0] {
            let config = ShadowConfig {
                strength,
                ..ShadowConfig::default()
            };
            let model = GainModel::new(&config, 0.9);
            // Smoothed color darker than the lifted pixel pulls chroma, not brightness
            let mut px = [77, 77, 77, 255];
            model.apply(&mut px, &p, [70.0; 3]);
            let lum = luminance(px[0], px[1], px[2]);
            assert!(lum >= previous, "strength {} gave {} < {}", strength, lum, previous);
            previous = lum;
        }
        assert!(previous > 77.0 / 255.0);
    }

    #[test]
    fn test_color_blend_keeps_lifted_luminance() {
        let model = GainModel::new(&ShadowConfig::default(), 0.9);
        let p = shadow_pixel();
        let w = model.weight(&p);
        let factor = model.gain(&p, w).powf(model.gamma);
        let mut px = [90, 60, 40, 255];
        let lifted = [90.0, 60.0, 40.0].map(|v: f32| (v * factor).round().min(255.0));
        model.apply(&mut px, &p, [60.0, 60.0, 60.0]);
        let out = luma([f32::from(px[0]), f32::from(px[1]), f32::from(px[2])]);
        assert!((out - luma(lifted)).abs() <= 1.0);
    }

    #[test]
    fn test_target_caps_output_luminance() {
        let config = ShadowConfig {
            strength: 100.0,
            extreme: true,
            target_brightness: Some(0.4),
            ..ShadowConfig::default()
        };
        let model = GainModel::new(&config, 0.95);
        let p = shadow_pixel();
        let mut px = [77, 77, 77, 255];
        model.apply(&mut px, &p, [230.0; 3]);
        assert!(luminance(px[0], px[1], px[2]) <= 0.4 + 1e-6);
        assert!(px[0] >= 77);
        assert_eq!(px[3], 255);
    }
}
