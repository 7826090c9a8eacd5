//! Tuned constants mapping the 0-442 tolerance knob onto HSV and RGB windows
//!
//! All windows scale linearly with `tolerance / 150`. The coefficients are
//! empirical and are kept here, in one place, so they can be calibrated
//! against a reference corpus without touching the matching code.

/// Tolerance value at which the linear window coefficients reach their nominal size
pub const TOLERANCE_SCALE: f32 = 150.0;

/// Pixels below this saturation match on RGB distance instead of hue
pub const MIN_MATCH_SATURATION: f32 = 0.08;

/// Pixels with alpha at or below this are treated as already transparent when sampling
pub const ALPHA_FLOOR: u8 = 8;

// Neutral (grey) seeds
pub const NEUTRAL_SAT_CAP: f32 = 0.25;
pub const NEUTRAL_SAT_SLOPE: f32 = 0.20;
pub const NEUTRAL_VALUE_SLOPE: f32 = 0.25;
pub const NEUTRAL_VALUE_BASE: f32 = 0.04;
pub const AUTO_NEUTRAL_VALUE_BASE: f32 = 0.05;

// Chromatic seeds, global and manual local
pub const HUE_MIN: f32 = 4.0;
pub const HUE_SLOPE: f32 = 40.0;
pub const SV_SLOPE: f32 = 0.35;

// Low-saturation RGB fallback
pub const RGB_FALLBACK_BASE: f32 = 18.0;
pub const RGB_FALLBACK_SLOPE: f32 = 28.0;
pub const FALLBACK_VALUE_SLACK: f32 = 0.08;

// Auto seeds
pub const AUTO_HUE_MIN: f32 = 12.0;
pub const AUTO_HUE_SLOPE: f32 = 30.0;
pub const AUTO_SAT_SLOPE: f32 = 0.45;
pub const AUTO_VALUE_SLOPE: f32 = 0.50;
pub const RANGE_WIDEN: f32 = 0.02;
/// RGB radius for low-saturation pixels under range matching and simple-background clears
pub const RANGE_RGB_RADIUS: f32 = 60.0;

// Simple-background check for manual local seeds
pub const SIMPLE_BACKGROUND_RATIO: f32 = 0.10;
pub const GRID_MIN_STEP: u32 = 8;
pub const GRID_DIVISOR: u32 = 80;
pub const CHECK_HUE_MIN: f32 = 20.0;
pub const CHECK_HUE_SLOPE: f32 = 36.0;
pub const CHECK_MIN_SATURATION: f32 = 0.05;
pub const SIMPLE_SV_PAD: f32 = 0.05;

// Edge band cleanup
pub const BAND_FRACTION: f32 = 0.03;
pub const BAND_MIN: u32 = 2;
pub const BAND_MAX_SATURATION: f32 = 0.12;
pub const BAND_MIN_VALUE: f32 = 0.85;
pub const BAND_MAX_MISSES: u32 = 6;

// Boundary tightening
pub const BOUNDARY_RGB_BASE: f32 = 22.0;
pub const BOUNDARY_RGB_SLOPE: f32 = 28.0;
pub const BOUNDARY_LOW_SATURATION: f32 = 0.10;
pub const BOUNDARY_MIN_SATURATION: f32 = 0.06;
pub const BOUNDARY_VALUE_SLACK: f32 = 0.10;
pub const BOUNDARY_HSV_SLACK: f32 = 0.08;

/// Effective refinement strength never drops below this
pub const MIN_REFINE_STRENGTH: f32 = 40.0;

/// `tolerance / 150`
#[inline]
#[must_use]
pub fn scale(tolerance: f32) -> f32 {
    tolerance / TOLERANCE_SCALE
}

/// `max(min, round(tolerance / 150 * slope))`, the hue window shape shared by every path
#[inline]
#[must_use]
pub fn hue_window(tolerance: f32, min: f32, slope: f32) -> f32 {
    min.max((scale(tolerance) * slope).round())
}

/// RGB radius of the low-saturation fallback
#[inline]
#[must_use]
pub fn rgb_fallback_radius(tolerance: f32) -> f32 {
    RGB_FALLBACK_BASE + scale(tolerance) * RGB_FALLBACK_SLOPE
}

/// Grid stride giving roughly 80 samples along the shorter side
#[inline]
#[must_use]
pub fn grid_step(width: u32, height: u32) -> u32 {
    GRID_MIN_STEP.max(width.min(height) / GRID_DIVISOR)
}

/// Border strip thickness for a side of length `len`, never wider than the side itself
#[inline]
#[must_use]
pub fn band_width(len: u32) -> u32 {
    BAND_MIN.max((len as f32 * BAND_FRACTION).floor() as u32).min(len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hue_window_floors() {
        assert_eq!(hue_window(0.0, HUE_MIN, HUE_SLOPE), 4.0);
        assert_eq!(hue_window(150.0, HUE_MIN, HUE_SLOPE), 40.0);
        assert_eq!(hue_window(50.0, AUTO_HUE_MIN, AUTO_HUE_SLOPE), 12.0);
    }

    #[test]
    fn test_rgb_fallback_spans_expected_range() {
        assert_eq!(rgb_fallback_radius(0.0), 18.0);
        assert!((rgb_fallback_radius(150.0) - 46.0).abs() < 1e-4);
    }

    #[test]
    fn test_grid_and_band_sizes() {
        assert_eq!(grid_step(100, 100), 8);
        assert_eq!(grid_step(4000, 3000), 37);
        assert_eq!(band_width(10), 2);
        assert_eq!(band_width(1000), 30);
        assert_eq!(band_width(1), 1);
    }
}
