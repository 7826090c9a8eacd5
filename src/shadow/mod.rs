//! Shadow attenuation
//!
//! [`ShadowCorrector::correct`] estimates where the raster is darkened by
//! cast or ambient shadow and brightens those pixels toward the level of the
//! lit surroundings:
//!
//! 1. feature fields: luminance, saturation, guided illumination estimate,
//!    local variance, gradient, background likelihood
//! 2. shadow mask: local lift, cast-shadow field and the optional painted
//!    mask, guided-filtered and blurred
//! 3. reference brightness from the pixels the mask deems lit
//! 4. per pixel, the largest of several gain candidates, applied with a
//!    gamma and a small blend toward smoothed color
//!
//! Pixels whose final weight is zero are copied through unchanged.

mod fields;
mod gain;
mod mask;

pub use fields::Radii;

use crate::cancel::{checkpoint, CancellationToken, ROW_BLOCK};
use crate::config::ShadowConfig;
use crate::error::{ChromaShadeError, Result};
use crate::guided_filter::guided_filter;
use crate::types::{BitMask, Raster, ScalarField, CHANNELS};
use fields::FeatureFields;
use gain::{GainModel, PixelInputs};
use instant::Instant;
use mask::ShadowMask;
use rayon::prelude::*;
use tracing::{debug, info, instrument, span, Level};

/// Regularizer for smoothing color channels (0-255 scale)
const COLOR_EPS: f32 = 16.0;

/// Intermediate state of one correction call
struct Analysis {
    fields: FeatureFields,
    mask: ShadowMask,
    model: GainModel,
}

impl Analysis {
    #[inline]
    fn inputs(&self, k: usize) -> PixelInputs {
        let f = &self.fields;
        PixelInputs {
            lum: f.lum.data()[k],
            lum_gf: f.lum_gf.data()[k],
            mean_lum: f.mean_lum.data()[k],
            mean_large: f.mean_large.data()[k],
            var_n: f.var_n.data()[k],
            sat: f.sat.data()[k],
            retinex: self.mask.retinex.data()[k],
            mask: self.mask.weight.data()[k],
            cast: self.mask.cast.data()[k],
        }
    }
}

/// Shadow correction engine
#[derive(Debug, Clone, Default)]
pub struct ShadowCorrector {
    config: ShadowConfig,
    cancel: Option<CancellationToken>,
}

impl ShadowCorrector {
    /// Create an engine; parameters are clamped into range
    #[must_use]
    pub fn new(config: ShadowConfig) -> Self {
        Self {
            config: config.sanitized(),
            cancel: None,
        }
    }

    /// Abort with [`Cancelled`](ChromaShadeError::Cancelled) once `token` fires
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    #[must_use]
    pub fn config(&self) -> &ShadowConfig {
        &self.config
    }

    fn check_mask(raster: &Raster, user_mask: Option<&BitMask>) -> Result<()> {
        match user_mask {
            Some(m) if m.dimensions() != raster.dimensions() => {
                Err(ChromaShadeError::invalid_dimensions(format!(
                    "mask is {}x{} but raster is {}x{}",
                    m.width(),
                    m.height(),
                    raster.width(),
                    raster.height()
                )))
            }
            _ => Ok(()),
        }
    }

    fn analyze(&self, raster: &Raster, user_mask: Option<&BitMask>) -> Result<Analysis> {
        let cancel = self.cancel.as_ref();
        let radii = Radii::for_dimensions(raster.width(), raster.height());
        debug!(?radii, "Shadow filter radii");

        let fields = {
            let _span = span!(Level::DEBUG, "feature_fields", base_radius = radii.base).entered();
            FeatureFields::compute(raster, &radii, cancel)?
        };
        let mask = {
            let _span = span!(Level::DEBUG, "shadow_mask", painted = user_mask.is_some()).entered();
            ShadowMask::build(&fields, &radii, &self.config, user_mask)
        };
        checkpoint(cancel)?;
        debug!(reference = mask.reference, "Reference brightness");

        let model = GainModel::new(&self.config, mask.reference);
        Ok(Analysis {
            fields,
            mask,
            model,
        })
    }

    /// Per-pixel correction weight in `[0, 1]`; pixels at zero are left untouched by [`correct`](Self::correct)
    ///
    /// # Errors
    /// - `user_mask` dimensions differ from the raster
    /// - [`Cancelled`](ChromaShadeError::Cancelled) when the attached token fires
    pub fn shadow_weights(&self, raster: &Raster, user_mask: Option<&BitMask>) -> Result<ScalarField> {
        Self::check_mask(raster, user_mask)?;
        if self.config.strength <= 0.0 {
            return Ok(ScalarField::filled(raster.width(), raster.height(), 0.0));
        }
        let analysis = self.analyze(raster, user_mask)?;
        Ok(ScalarField::from_index_fn(
            raster.width(),
            raster.height(),
            |k| analysis.model.weight(&analysis.inputs(k)),
        ))
    }

    /// Brighten shadowed regions of a copy of `raster`
    ///
    /// `user_mask` marks pixels the caller has painted as shadow; it must
    /// have the raster's dimensions. Zero strength returns an identical copy.
    /// The alpha channel is never modified.
    ///
    /// # Errors
    /// - `user_mask` dimensions differ from the raster
    /// - [`Cancelled`](ChromaShadeError::Cancelled) when the attached token fires
    #[instrument(
        skip_all,
        fields(
            width = raster.width(),
            height = raster.height(),
            strength = self.config.strength,
            aggressive = self.config.aggressive,
            extreme = self.config.extreme
        )
    )]
    pub fn correct(&self, raster: &Raster, user_mask: Option<&BitMask>) -> Result<Raster> {
        Self::check_mask(raster, user_mask)?;
        if self.config.strength <= 0.0 {
            debug!("Zero strength, returning input unchanged");
            return Ok(raster.clone());
        }
        let start = Instant::now();
        let cancel = self.cancel.as_ref();
        let analysis = self.analyze(raster, user_mask)?;

        let smooth = {
            let _span = span!(Level::DEBUG, "color_smoothing").entered();
            let radius = Radii::for_dimensions(raster.width(), raster.height()).small;
            let lum = &analysis.fields.lum;
            let channel = |c: usize| {
                let field = ScalarField::from_index_fn(raster.width(), raster.height(), |k| {
                    f32::from(raster.as_bytes()[k * CHANNELS + c])
                });
                guided_filter(lum, &field, radius, COLOR_EPS)
            };
            [channel(0), channel(1), channel(2)]
        };
        checkpoint(cancel)?;

        let mut out = raster.clone();
        let row_px = raster.width() as usize;
        let row_bytes = row_px * CHANNELS;
        let _span = span!(Level::DEBUG, "apply_gain").entered();
        for (b, block) in out.as_bytes_mut().chunks_mut(row_bytes * ROW_BLOCK).enumerate() {
            checkpoint(cancel)?;
            let first_row = b * ROW_BLOCK;
            block
                .par_chunks_mut(row_bytes)
                .enumerate()
                .for_each(|(r, row)| {
                    let base = (first_row + r) * row_px;
                    for (x, px) in row.chunks_exact_mut(CHANNELS).enumerate() {
                        let k = base + x;
                        let color = [smooth[0].data()[k], smooth[1].data()[k], smooth[2].data()[k]];
                        analysis.model.apply(px, &analysis.inputs(k), color);
                    }
                });
        }

        info!(
            changed = out.differing_pixels(raster),
            reference = analysis.mask.reference,
            duration_ms = start.elapsed().as_millis() as u64,
            "Shadow correction complete"
        );
        Ok(out)
    }
}

/// Run shadow correction with `config` on a copy of `raster`
pub fn correct_shadows(
    raster: &Raster,
    config: &ShadowConfig,
    user_mask: Option<&BitMask>,
) -> Result<Raster> {
    ShadowCorrector::new(*config).correct(raster, user_mask)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shaded(size: u32) -> Raster {
        let c = size as f32 / 2.0;
        Raster::from_fn(size, size, |x, y| {
            let d = ((x as f32 - c).powi(2) + (y as f32 - c).powi(2)).sqrt();
            let v = if d < size as f32 / 4.0 { 90 } else { 225 };
            [v, v, v, 255]
        })
        .unwrap()
    }

    #[test]
    fn test_zero_strength_is_identity() {
        let raster = shaded(48);
        let config = ShadowConfig {
            strength: 0.0,
            ..ShadowConfig::default()
        };
        assert_eq!(correct_shadows(&raster, &config, None).unwrap(), raster);
    }

    #[test]
    fn test_alpha_is_preserved() {
        let raster = Raster::from_fn(32, 32, |x, _| [60, 60, 60, (x * 8) as u8]).unwrap();
        let out = ShadowCorrector::default().correct(&raster, None).unwrap();
        for (a, b) in raster.as_bytes().chunks_exact(4).zip(out.as_bytes().chunks_exact(4)) {
            assert_eq!(a[3], b[3]);
        }
    }

    #[test]
    fn test_mask_dimension_mismatch_is_rejected() {
        let raster = shaded(16);
        let mask = BitMask::new(8, 8);
        let err = ShadowCorrector::default().correct(&raster, Some(&mask)).unwrap_err();
        assert!(matches!(err, ChromaShadeError::InvalidDimensions(_)));
    }

    #[test]
    fn test_shadow_center_is_brightened() {
        let raster = shaded(64);
        let out = ShadowCorrector::default().correct(&raster, None).unwrap();
        assert!(out.pixel(32, 32)[0] > raster.pixel(32, 32)[0]);
    }

    #[test]
    fn test_weights_are_bounded() {
        let raster = shaded(40);
        let weights = ShadowCorrector::default().shadow_weights(&raster, None).unwrap();
        assert!(weights.data().iter().all(|w| (0.0..=1.0).contains(w)));
    }

    #[test]
    fn test_cancelled_token_aborts() {
        let token = CancellationToken::new();
        token.cancel();
        let engine = ShadowCorrector::default().with_cancellation(token);
        assert!(matches!(
            engine.correct(&shaded(16), None),
            Err(ChromaShadeError::Cancelled)
        ));
    }
}
