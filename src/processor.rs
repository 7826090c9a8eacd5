//! Edit session over one pristine image
//!
//! [`EditSession`] owns the decoded original, the ordered seed list and the
//! current parameters. Every render starts again from the pristine original,
//! so undo and reset never depend on a previously mutated buffer.

use crate::{
    cancel::CancellationToken,
    config::{ColorRemovalConfig, ShadowConfig},
    error::{ChromaShadeError, Result},
    segmentation::{detect_background_seed, ColorSeed, ColorSegmenter, SeedList},
    shadow::ShadowCorrector,
    types::{BitMask, Operation, ProcessingMetadata, Raster, RenderResult},
};
use image::DynamicImage;
use instant::Instant;
use log::{debug, info};
use tracing::instrument;

/// Editing state for one image
#[derive(Debug, Clone)]
pub struct EditSession {
    /// Decoded input as first loaded; `restore_original` returns to it
    initial: Raster,
    /// Base every render starts from; replaced by `adopt`
    original: Raster,
    seeds: SeedList,
    color_config: ColorRemovalConfig,
    shadow_config: ShadowConfig,
    shadow_mask: Option<BitMask>,
    cancel: Option<CancellationToken>,
}

impl EditSession {
    /// Start a session on a decoded raster with default parameters
    #[must_use]
    pub fn new(original: Raster) -> Self {
        Self {
            initial: original.clone(),
            original,
            seeds: SeedList::new(),
            color_config: ColorRemovalConfig::default(),
            shadow_config: ShadowConfig::default(),
            shadow_mask: None,
            cancel: None,
        }
    }

    /// Start a session from any decoded image
    pub fn from_dynamic(image: &DynamicImage) -> Result<Self> {
        Ok(Self::new(Raster::from_dynamic(image)?))
    }

    #[must_use]
    pub fn with_color_config(mut self, config: ColorRemovalConfig) -> Self {
        self.set_color_config(config);
        self
    }

    #[must_use]
    pub fn with_shadow_config(mut self, config: ShadowConfig) -> Self {
        self.set_shadow_config(config);
        self
    }

    pub fn set_color_config(&mut self, config: ColorRemovalConfig) {
        self.color_config = config.sanitized();
    }

    pub fn set_shadow_config(&mut self, config: ShadowConfig) {
        self.shadow_config = config.sanitized();
    }

    /// Attach a token checked by every subsequent render
    pub fn set_cancellation(&mut self, token: Option<CancellationToken>) {
        self.cancel = token;
    }

    #[must_use]
    pub fn original(&self) -> &Raster {
        &self.original
    }

    #[must_use]
    pub fn seeds(&self) -> &SeedList {
        &self.seeds
    }

    #[must_use]
    pub fn color_config(&self) -> &ColorRemovalConfig {
        &self.color_config
    }

    #[must_use]
    pub fn shadow_config(&self) -> &ShadowConfig {
        &self.shadow_config
    }

    #[must_use]
    pub fn shadow_mask(&self) -> Option<&BitMask> {
        self.shadow_mask.as_ref()
    }

    pub fn push_seed(&mut self, seed: ColorSeed) {
        debug!("Adding seed {:?} ({} total)", seed.rgb(), self.seeds.len() + 1);
        self.seeds.push(seed);
    }

    /// Sample a global seed at `(x, y)` carrying the current tolerance
    pub fn pick_global(&mut self, x: i64, y: i64) -> ColorSeed {
        let seed =
            ColorSeed::sample_global(&self.original, x, y).with_tolerance(self.color_config.tolerance);
        self.push_seed(seed);
        seed
    }

    /// Sample a local seed at `(x, y)` carrying the current tolerance
    pub fn pick_local(&mut self, x: i64, y: i64) -> ColorSeed {
        let seed =
            ColorSeed::sample_local(&self.original, x, y).with_tolerance(self.color_config.tolerance);
        self.push_seed(seed);
        seed
    }

    /// Replace the seed list with a detected background seed, if one is found
    pub fn auto_detect(&mut self) -> Option<ColorSeed> {
        let seed = detect_background_seed(&self.original, self.color_config.tolerance)?;
        info!("Auto-detected background color {:?}", seed.rgb());
        self.seeds.replace([seed]);
        Some(seed)
    }

    /// Drop the most recent seed
    pub fn undo(&mut self) -> Option<ColorSeed> {
        self.seeds.undo()
    }

    /// Drop every seed
    pub fn reset(&mut self) {
        self.seeds.reset();
    }

    /// Set or clear the painted shadow mask; it must match the current image
    pub fn set_shadow_mask(&mut self, mask: Option<BitMask>) -> Result<()> {
        if let Some(m) = &mask {
            if m.dimensions() != self.original.dimensions() {
                return Err(ChromaShadeError::invalid_dimensions(format!(
                    "mask is {}x{} but image is {}x{}",
                    m.width(),
                    m.height(),
                    self.original.width(),
                    self.original.height()
                )));
            }
        }
        self.shadow_mask = mask;
        Ok(())
    }

    /// Make `replacement` the new base image, e.g. the output of remote refinement
    ///
    /// Seeds are kept. A painted mask that no longer fits is dropped.
    pub fn adopt(&mut self, replacement: Raster) {
        info!(
            "Adopting replacement image {}x{}",
            replacement.width(),
            replacement.height()
        );
        self.original = replacement;
        self.drop_stale_mask();
    }

    /// Return to the image the session started with
    pub fn restore_original(&mut self) {
        self.original = self.initial.clone();
        self.drop_stale_mask();
    }

    fn drop_stale_mask(&mut self) {
        if self
            .shadow_mask
            .as_ref()
            .is_some_and(|m| m.dimensions() != self.original.dimensions())
        {
            debug!("Dropping painted mask with stale dimensions");
            self.shadow_mask = None;
        }
    }

    fn metadata(&self, operation: Operation, start: Instant, output: &Raster) -> ProcessingMetadata {
        ProcessingMetadata {
            operation,
            duration_ms: start.elapsed().as_millis() as u64,
            affected_pixels: output.differing_pixels(&self.original),
            total_pixels: self.original.pixel_count(),
        }
    }

    /// Render color removal of the current seeds from the pristine base
    ///
    /// # Errors
    /// - [`Cancelled`](ChromaShadeError::Cancelled) when the session token fires
    #[instrument(skip(self), fields(seeds = self.seeds.len()))]
    pub fn render_color_removal(&self) -> Result<RenderResult> {
        let start = Instant::now();
        let operation = if self.seeds.is_empty() {
            Operation::Passthrough
        } else {
            Operation::ColorRemoval
        };
        let mut engine = ColorSegmenter::new(self.color_config);
        if let Some(token) = &self.cancel {
            engine = engine.with_cancellation(token.clone());
        }
        let raster = engine.segment(&self.original, self.seeds.as_slice())?;
        let metadata = self.metadata(operation, start, &raster);
        Ok(RenderResult { raster, metadata })
    }

    /// Render shadow correction of the pristine base with the current mask
    ///
    /// # Errors
    /// - [`Cancelled`](ChromaShadeError::Cancelled) when the session token fires
    #[instrument(skip(self), fields(strength = self.shadow_config.strength))]
    pub fn render_shadow_correction(&self) -> Result<RenderResult> {
        let start = Instant::now();
        let operation = if self.shadow_config.strength <= 0.0 {
            Operation::Passthrough
        } else {
            Operation::ShadowCorrection
        };
        let mut engine = ShadowCorrector::new(self.shadow_config);
        if let Some(token) = &self.cancel {
            engine = engine.with_cancellation(token.clone());
        }
        let raster = engine.correct(&self.original, self.shadow_mask.as_ref())?;
        let metadata = self.metadata(operation, start, &raster);
        Ok(RenderResult { raster, metadata })
    }
}
