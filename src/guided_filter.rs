//! Edge-preserving smoothing guided by a reference field
//!
//! Fits `q = a·I + b` in every `(2r+1)²` window from local means, variance
//! and covariance, averages the coefficients, and reconstructs the output.
//! All local statistics come from [`box_blur`].

use crate::morphology::box_blur;
use crate::types::ScalarField;

/// Smallest regularizer ever used, so a flat guide never divides by zero
const MIN_EPS: f32 = 1e-8;

/// Guided filter of `input` steered by `guide`
///
/// `eps` trades edge preservation for smoothing; it is floored at a tiny
/// positive value so a constant guide (zero variance) degrades to a plain
/// box blur of `input` instead of dividing by zero.
#[must_use]
pub fn guided_filter(guide: &ScalarField, input: &ScalarField, radius: u32, eps: f32) -> ScalarField {
    debug_assert_eq!(guide.len(), input.len());
    let eps = if eps.is_finite() { eps.max(MIN_EPS) } else { MIN_EPS };

    let mean_i = box_blur(guide, radius);
    let mean_p = box_blur(input, radius);
    let mean_ip = box_blur(&guide.zip_map(input, |i, p| i * p), radius);
    let mean_ii = box_blur(&guide.map(|i| i * i), radius);

    let n = guide.len();
    let mut a = Vec::with_capacity(n);
    let mut b = Vec::with_capacity(n);
    for k in 0..n {
        let mi = mean_i.data()[k];
        let mp = mean_p.data()[k];
        let cov_ip = mean_ip.data()[k] - mi * mp;
        let var_i = (mean_ii.data()[k] - mi * mi).max(0.0);
        let ak = cov_ip / (var_i + eps);
        a.push(ak);
        b.push(mp - ak * mi);
    }
    let a = ScalarField::from_index_fn(guide.width(), guide.height(), |k| a[k]);
    let b = ScalarField::from_index_fn(guide.width(), guide.height(), |k| b[k]);

    let mean_a = box_blur(&a, radius);
    let mean_b = box_blur(&b, radius);
    ScalarField::from_index_fn(guide.width(), guide.height(), |k| {
        mean_a.data()[k] * guide.data()[k] + mean_b.data()[k]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_input_is_preserved() {
        let guide = ScalarField::from_fn(16, 16, |x, _| if x < 8 { 0.2 } else { 0.9 });
        let input = ScalarField::filled(16, 16, 0.5);
        let out = guided_filter(&guide, &input, 3, 1e-3);
        assert!(out.data().iter().all(|v| (v - 0.5).abs() < 1e-4));
    }

    #[test]
    fn test_flat_guide_does_not_divide_by_zero() {
        let guide = ScalarField::filled(8, 8, 0.4);
        let input = ScalarField::from_fn(8, 8, |x, y| (x + y) as f32 / 14.0);
        let out = guided_filter(&guide, &input, 2, 0.0);
        assert!(out.data().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_self_guided_filter_preserves_step_edge() {
        let step = ScalarField::from_fn(32, 8, |x, _| if x < 16 { 0.1 } else { 0.9 });
        let out = guided_filter(&step, &step, 4, 1e-4);
        // Strong edges have variance far above eps, so a ≈ 1 and the step survives
        assert!((out.get(10, 4) - 0.1).abs() < 0.05);
        assert!((out.get(21, 4) - 0.9).abs() < 0.05);
        assert!(out.get(16, 4) - out.get(15, 4) > 0.5);
    }

    #[test]
    fn test_large_eps_smooths_like_box_blur() {
        let step = ScalarField::from_fn(32, 8, |x, _| if x < 16 { 0.1 } else { 0.9 });
        let out = guided_filter(&step, &step, 4, 100.0);
        let blurred = box_blur(&box_blur(&step, 4), 4);
        // Huge eps drives a → 0, b → local mean
        assert!((out.get(16, 4) - blurred.get(16, 4)).abs() < 0.05);
    }
}
