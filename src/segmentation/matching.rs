//! Per-seed color predicates
//!
//! A [`Matcher`] is built once per seed (or seed group) from its tolerance
//! and then evaluated against every candidate pixel. Every variant falls back
//! to RGB distance for low-saturation pixels, where hue is meaningless.

use super::seed::{AutoRegion, ColorSeed, SvRange};
use super::tolerance::*;
use crate::color::{hue_delta, rgb_distance, rgb_to_hsv, Hsv};
use crate::types::{Raster, CHANNELS};
use rayon::prelude::*;

/// Precomputed HSV of every pixel, shared by all passes of one call
pub(crate) fn hsv_field(raster: &Raster) -> Vec<Hsv> {
    raster
        .as_bytes()
        .par_chunks_exact(CHANNELS)
        .map(|p| rgb_to_hsv(p[0], p[1], p[2]))
        .collect()
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Matcher {
    /// Grey seeds: low saturation and similar value
    Neutral { s_limit: f32, v: f32, v_tol: f32 },
    /// Hue/saturation/value windows around the seed
    Window {
        seed: Hsv,
        rgb: [u8; 3],
        hue_tol: f32,
        s_tol: f32,
        v_tol: f32,
        rgb_radius: f32,
    },
    /// Hue window plus absolute S/V bounds
    Range {
        hue: f32,
        rgb: [u8; 3],
        hue_tol: f32,
        bounds: SvRange,
    },
}

impl Matcher {
    fn neutral(seed: &ColorSeed, tolerance: f32, value_base: f32) -> Self {
        let hsv = seed.hsv();
        Self::Neutral {
            s_limit: NEUTRAL_SAT_CAP.min(hsv.s + scale(tolerance) * NEUTRAL_SAT_SLOPE),
            v: hsv.v,
            v_tol: scale(tolerance) * NEUTRAL_VALUE_SLOPE + value_base,
        }
    }

    /// Test used by global seeds and manual local flood fills
    pub(crate) fn for_seed(seed: &ColorSeed, tolerance: f32) -> Self {
        if seed.is_neutral() {
            return Self::neutral(seed, tolerance, NEUTRAL_VALUE_BASE);
        }
        let f = scale(tolerance);
        Self::Window {
            seed: seed.hsv(),
            rgb: seed.rgb(),
            hue_tol: hue_window(tolerance, HUE_MIN, HUE_SLOPE),
            s_tol: f * SV_SLOPE,
            v_tol: f * SV_SLOPE,
            rgb_radius: rgb_fallback_radius(tolerance),
        }
    }

    /// Looser test for auto-detected background seeds
    pub(crate) fn for_auto(seed: &ColorSeed, tolerance: f32, region: &AutoRegion) -> Self {
        let hue_tol = region
            .hue_tolerance
            .unwrap_or_else(|| hue_window(tolerance, AUTO_HUE_MIN, AUTO_HUE_SLOPE));
        if let Some(range) = region.range {
            return Self::Range {
                hue: seed.hsv().h,
                rgb: seed.rgb(),
                hue_tol,
                bounds: range.widened(RANGE_WIDEN, RANGE_WIDEN),
            };
        }
        if seed.is_neutral() {
            return Self::neutral(seed, tolerance, AUTO_NEUTRAL_VALUE_BASE);
        }
        let f = scale(tolerance);
        Self::Window {
            seed: seed.hsv(),
            rgb: seed.rgb(),
            hue_tol,
            s_tol: f * AUTO_SAT_SLOPE,
            v_tol: f * AUTO_VALUE_SLOPE,
            rgb_radius: rgb_fallback_radius(tolerance),
        }
    }

    /// Whole-field test for a manual seed on a simple background
    pub(crate) fn for_simple_background(seed: &ColorSeed, tolerance: f32) -> Self {
        let hsv = seed.hsv();
        let pad = scale(tolerance) * SV_SLOPE + SIMPLE_SV_PAD;
        Self::Range {
            hue: hsv.h,
            rgb: seed.rgb(),
            hue_tol: hue_window(tolerance, HUE_MIN, HUE_SLOPE),
            bounds: SvRange {
                s_min: hsv.s,
                s_max: hsv.s,
                v_min: hsv.v,
                v_max: hsv.v,
            }
            .widened(pad, pad),
        }
    }

    #[inline]
    pub(crate) fn matches(&self, rgb: [u8; 3], pv: Hsv) -> bool {
        match *self {
            Self::Neutral { s_limit, v, v_tol } => pv.s <= s_limit && (pv.v - v).abs() <= v_tol,
            Self::Window {
                seed,
                rgb: seed_rgb,
                hue_tol,
                s_tol,
                v_tol,
                rgb_radius,
            } => {
                if pv.s >= MIN_MATCH_SATURATION {
                    hue_delta(pv.h, seed.h) <= hue_tol
                        && (pv.s - seed.s).abs() <= s_tol
                        && (pv.v - seed.v).abs() <= v_tol
                } else {
                    rgb_distance(rgb, seed_rgb) <= rgb_radius
                        && (pv.v - seed.v).abs() <= v_tol + FALLBACK_VALUE_SLACK
                }
            }
            Self::Range {
                hue,
                rgb: seed_rgb,
                hue_tol,
                bounds,
            } => {
                if pv.s >= MIN_MATCH_SATURATION {
                    hue_delta(pv.h, hue) <= hue_tol && bounds.contains(pv.s, pv.v)
                } else {
                    rgb_distance(rgb, seed_rgb) <= RANGE_RGB_RADIUS
                }
            }
        }
    }
}

/// Relaxed test for an opaque pixel enclosed by cleared neighbours
pub(crate) struct BoundaryMatcher {
    seed: Hsv,
    rgb: [u8; 3],
    neutral: bool,
    hue_tol: f32,
    s_tol: f32,
    v_tol: f32,
    rgb_radius: f32,
}

impl BoundaryMatcher {
    /// `base_tolerance` sizes the RGB radius; the seed's own tolerance sizes the HSV windows
    pub(crate) fn new(seed: &ColorSeed, tolerance: f32, base_tolerance: f32) -> Self {
        let f = scale(tolerance);
        Self {
            seed: seed.hsv(),
            rgb: seed.rgb(),
            neutral: seed.is_neutral(),
            hue_tol: hue_window(tolerance, HUE_MIN, HUE_SLOPE),
            s_tol: f * SV_SLOPE,
            v_tol: f * SV_SLOPE,
            rgb_radius: BOUNDARY_RGB_BASE + scale(base_tolerance) * BOUNDARY_RGB_SLOPE,
        }
    }

    #[inline]
    pub(crate) fn matches(&self, rgb: [u8; 3], pv: Hsv) -> bool {
        if self.neutral || pv.s < BOUNDARY_LOW_SATURATION {
            rgb_distance(rgb, self.rgb) <= self.rgb_radius
                && (pv.v - self.seed.v).abs() <= self.v_tol + BOUNDARY_VALUE_SLACK
        } else {
            pv.s >= BOUNDARY_MIN_SATURATION
                && hue_delta(pv.h, self.seed.h) <= self.hue_tol
                && (pv.s - self.seed.s).abs() <= self.s_tol + BOUNDARY_HSV_SLACK
                && (pv.v - self.seed.v).abs() <= self.v_tol + BOUNDARY_HSV_SLACK
        }
    }
}
