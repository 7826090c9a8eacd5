#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

//! # chromashade
//!
//! Two raster engines for cleaning up product and portrait photos:
//!
//! - **Color removal** makes pixels matching user-picked seed colors
//!   transparent, either everywhere (global seeds) or in the connected region
//!   around a click (local seeds), then feathers the cut edge.
//! - **Shadow correction** estimates where an image is darkened by cast or
//!   ambient shadow and brightens those pixels toward the surrounding lit level.
//!
//! Both engines take an RGBA [`Raster`] and return a new one of the same size.
//! They never fail on pixel data; only mismatched mask sizes and
//! cancellation produce errors.
//!
//! ## Quick Start
//!
//! ```rust
//! use chromashade::{remove_color, remove_shadow, ColorRemovalConfig, ColorSeed, Raster, ShadowConfig};
//!
//! // Red square on a green screen
//! let raster = Raster::from_fn(64, 64, |x, y| {
//!     if (16..48).contains(&x) && (16..48).contains(&y) {
//!         [200, 30, 30, 255]
//!     } else {
//!         [0, 255, 0, 255]
//!     }
//! })?;
//!
//! let cut = remove_color(&raster, &[ColorSeed::global([0, 255, 0])], &ColorRemovalConfig::default())?;
//! assert_eq!(cut.pixel(0, 0)[3], 0);
//! assert_eq!(cut.pixel(32, 32)[3], 255);
//!
//! let brightened = remove_shadow(&raster, &ShadowConfig::default())?;
//! assert_eq!(brightened.dimensions(), raster.dimensions());
//! # Ok::<(), chromashade::ChromaShadeError>(())
//! ```
//!
//! ## Editing sessions
//!
//! [`EditSession`] keeps the pristine image and an ordered seed list, so every
//! render starts from the original and undo is just dropping the last seed.
//!
//! ## Feature Flags
//!
//! - `cli` (default): the `chromashade` binary and subscriber setup
//! - `webp-support` (default): WebP decoding and encoding
//! - `tracing-json`: JSON log output for the CLI

pub mod cancel;
#[cfg(feature = "cli")]
pub mod cli;
pub mod color;
pub mod config;
pub mod error;
pub mod guided_filter;
pub mod morphology;
pub mod processor;
pub mod refine;
pub mod segmentation;
pub mod services;
pub mod shadow;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;

pub use cancel::CancellationToken;
pub use config::{
    ColorRemovalConfig, ColorRemovalConfigBuilder, EncodeOptions, OutputFormat, Preset,
    ShadowConfig, ShadowConfigBuilder,
};
pub use error::{ChromaShadeError, Result};
pub use processor::EditSession;
pub use refine::{
    apply_refinement, refine_shadows, RefineBackend, RefineOutput, RefineRequest, RefineResponse, Scene,
};
pub use segmentation::{detect_background_seed, ColorSeed, ColorSegmenter, SeedKind, SeedList};
pub use services::{ImageIOService, OutputFormatHandler};
pub use shadow::ShadowCorrector;
pub use types::{BitMask, Operation, ProcessingMetadata, Raster, RenderResult, ScalarField};

#[cfg(feature = "cli")]
pub use tracing_config::{events, init_cli_tracing, init_library_tracing, spans, TracingConfig, TracingFormat};

/// Make pixels matching `seeds` transparent on a copy of `raster`
///
/// With no seeds the copy equals the input.
pub fn remove_color(raster: &Raster, seeds: &[ColorSeed], config: &ColorRemovalConfig) -> Result<Raster> {
    segmentation::segment(raster, seeds, config)
}

/// Brighten shadowed regions of a copy of `raster`
pub fn remove_shadow(raster: &Raster, config: &ShadowConfig) -> Result<Raster> {
    shadow::correct_shadows(raster, config, None)
}

/// Load an image file and remove `seeds` from it
///
/// # Examples
/// ```rust,no_run
/// use chromashade::{remove_color_from_file, ColorRemovalConfig, ColorSeed};
///
/// let cut = remove_color_from_file("product.jpg", &[ColorSeed::global([255, 255, 255])], &ColorRemovalConfig::default())?;
/// chromashade::ImageIOService::save_raster(&cut, "product.png", &Default::default())?;
/// # Ok::<(), chromashade::ChromaShadeError>(())
/// ```
pub fn remove_color_from_file<P: AsRef<std::path::Path>>(
    path: P,
    seeds: &[ColorSeed],
    config: &ColorRemovalConfig,
) -> Result<Raster> {
    let raster = ImageIOService::load_raster(path)?;
    remove_color(&raster, seeds, config)
}

/// Load an image file and correct its shadows
pub fn remove_shadow_from_file<P: AsRef<std::path::Path>>(path: P, config: &ShadowConfig) -> Result<Raster> {
    let raster = ImageIOService::load_raster(path)?;
    remove_shadow(&raster, config)
}
