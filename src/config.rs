//! Parameter types for color removal and shadow correction
//!
//! Parameters are plain values passed into each engine call. Builders clamp
//! out-of-range values silently; `build()` only rejects values that cannot
//! be clamped (NaN, infinities). The engines themselves always work on
//! [`ColorRemovalConfig::sanitized`] / [`ShadowConfig::sanitized`] copies, so a
//! hand-assembled struct with wild values still produces a defined result.

use crate::error::{ChromaShadeError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Upper bound of the tolerance knob (RGB cube diagonal, `sqrt(3·255²)`)
pub const MAX_TOLERANCE: f32 = 442.0;

fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

fn require_finite(parameter: &str, value: f32, valid_range: &str) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ChromaShadeError::config_value_error(
            parameter,
            value,
            valid_range,
            None,
        ))
    }
}

/// Parameters for color-based region removal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorRemovalConfig {
    /// Fallback tolerance for seeds without their own (0-442)
    pub tolerance: f32,

    /// Feather the cutout edge after removal
    pub auto_refine: bool,

    /// Feathering strength (0-100); effective strength never drops below 40
    pub refine_strength: f32,
}

impl Default for ColorRemovalConfig {
    fn default() -> Self {
        Self {
            tolerance: 50.0,
            auto_refine: true,
            refine_strength: 40.0,
        }
    }
}

impl ColorRemovalConfig {
    /// Create a new configuration builder
    ///
    /// ```rust
    /// use chromashade::ColorRemovalConfig;
    ///
    /// let config = ColorRemovalConfig::builder()
    ///     .tolerance(80.0)
    ///     .auto_refine(false)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.tolerance, 80.0);
    /// ```
    #[must_use]
    pub fn builder() -> ColorRemovalConfigBuilder {
        ColorRemovalConfigBuilder::default()
    }

    /// Validate parameter ranges
    ///
    /// # Errors
    /// - Tolerance outside 0-442 or not finite
    /// - Refine strength outside 0-100 or not finite
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=MAX_TOLERANCE).contains(&self.tolerance) {
            return Err(ChromaShadeError::config_value_error(
                "tolerance",
                self.tolerance,
                "0-442",
                Some(50.0),
            ));
        }
        if !(0.0..=100.0).contains(&self.refine_strength) {
            return Err(ChromaShadeError::config_value_error(
                "refine strength",
                self.refine_strength,
                "0-100",
                Some(40.0),
            ));
        }
        Ok(())
    }

    /// Copy with every value clamped into range and non-finite values reset to defaults
    #[must_use]
    pub fn sanitized(&self) -> Self {
        let defaults = Self::default();
        Self {
            tolerance: finite_or(self.tolerance, defaults.tolerance).clamp(0.0, MAX_TOLERANCE),
            auto_refine: self.auto_refine,
            refine_strength: finite_or(self.refine_strength, defaults.refine_strength)
                .clamp(0.0, 100.0),
        }
    }

    /// Parse a JSON preset; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config.sanitized())
    }

    /// Load a JSON preset file holding only these parameters
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ChromaShadeError::file_io_error("read preset", path, &e))?;
        Self::from_json_str(&content)
    }
}

/// Builder for [`ColorRemovalConfig`]
#[derive(Debug, Default)]
pub struct ColorRemovalConfigBuilder {
    config: ColorRemovalConfig,
}

impl ColorRemovalConfigBuilder {
    /// Set the fallback tolerance (clamped to 0-442)
    #[must_use]
    pub fn tolerance(mut self, tolerance: f32) -> Self {
        self.config.tolerance = tolerance.clamp(0.0, MAX_TOLERANCE);
        self
    }

    /// Enable or disable edge feathering
    #[must_use]
    pub fn auto_refine(mut self, enabled: bool) -> Self {
        self.config.auto_refine = enabled;
        self
    }

    /// Set the feathering strength (clamped to 0-100)
    #[must_use]
    pub fn refine_strength(mut self, strength: f32) -> Self {
        self.config.refine_strength = strength.clamp(0.0, 100.0);
        self
    }

    /// Build the configuration
    ///
    /// # Errors
    /// - Non-finite tolerance or refine strength
    pub fn build(self) -> Result<ColorRemovalConfig> {
        require_finite("tolerance", self.config.tolerance, "0-442")?;
        require_finite("refine strength", self.config.refine_strength, "0-100")?;
        Ok(self.config)
    }
}

/// Parameters for shadow attenuation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowConfig {
    /// Overall correction strength (0-100); 0 leaves the raster untouched
    pub strength: f32,

    /// How strongly dark, flat, desaturated regions count as shadow (0-100)
    pub bias: f32,

    /// Stronger cast-shadow detection and higher gain caps
    pub aggressive: bool,

    /// Lower output gamma with the highest gain caps, for deep shadows
    pub extreme: bool,

    /// Luminance (0-1) corrected pixels are pulled toward and never pushed beyond
    pub target_brightness: Option<f32>,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            strength: 65.0,
            bias: 60.0,
            aggressive: true,
            extreme: false,
            target_brightness: None,
        }
    }
}

impl ShadowConfig {
    /// Create a new configuration builder
    ///
    /// ```rust
    /// use chromashade::ShadowConfig;
    ///
    /// let config = ShadowConfig::builder()
    ///     .strength(100.0)
    ///     .target_brightness(Some(0.85))
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.target_brightness, Some(0.85));
    /// ```
    #[must_use]
    pub fn builder() -> ShadowConfigBuilder {
        ShadowConfigBuilder::default()
    }

    /// Validate parameter ranges
    ///
    /// # Errors
    /// - Strength or bias outside 0-100 or not finite
    /// - Target brightness outside 0-1 or not finite
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=100.0).contains(&self.strength) {
            return Err(ChromaShadeError::config_value_error(
                "strength",
                self.strength,
                "0-100",
                Some(65.0),
            ));
        }
        if !(0.0..=100.0).contains(&self.bias) {
            return Err(ChromaShadeError::config_value_error(
                "bias",
                self.bias,
                "0-100",
                Some(60.0),
            ));
        }
        if let Some(target) = self.target_brightness {
            if !(0.0..=1.0).contains(&target) {
                return Err(ChromaShadeError::config_value_error(
                    "target brightness",
                    target,
                    "0-1",
                    None,
                ));
            }
        }
        Ok(())
    }

    /// Copy with every value clamped into range and non-finite values reset to defaults
    #[must_use]
    pub fn sanitized(&self) -> Self {
        let defaults = Self::default();
        Self {
            strength: finite_or(self.strength, defaults.strength).clamp(0.0, 100.0),
            bias: finite_or(self.bias, defaults.bias).clamp(0.0, 100.0),
            aggressive: self.aggressive,
            extreme: self.extreme,
            target_brightness: self
                .target_brightness
                .filter(|t| t.is_finite())
                .map(|t| t.clamp(0.0, 1.0)),
        }
    }

    /// Parse a JSON preset; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config.sanitized())
    }

    /// Load a JSON preset file holding only these parameters
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ChromaShadeError::file_io_error("read preset", path, &e))?;
        Self::from_json_str(&content)
    }
}

/// Builder for [`ShadowConfig`]
#[derive(Debug, Default)]
pub struct ShadowConfigBuilder {
    config: ShadowConfig,
}

impl ShadowConfigBuilder {
    /// Set correction strength (clamped to 0-100)
    #[must_use]
    pub fn strength(mut self, strength: f32) -> Self {
        self.config.strength = strength.clamp(0.0, 100.0);
        self
    }

    /// Set shadow bias (clamped to 0-100)
    #[must_use]
    pub fn bias(mut self, bias: f32) -> Self {
        self.config.bias = bias.clamp(0.0, 100.0);
        self
    }

    #[must_use]
    pub fn aggressive(mut self, aggressive: bool) -> Self {
        self.config.aggressive = aggressive;
        self
    }

    #[must_use]
    pub fn extreme(mut self, extreme: bool) -> Self {
        self.config.extreme = extreme;
        self
    }

    /// Set the target luminance (clamped to 0-1), or `None` for no target
    #[must_use]
    pub fn target_brightness(mut self, target: Option<f32>) -> Self {
        self.config.target_brightness = target.map(|t| t.clamp(0.0, 1.0));
        self
    }

    /// Build the configuration
    ///
    /// # Errors
    /// - Non-finite strength, bias or target brightness
    pub fn build(self) -> Result<ShadowConfig> {
        require_finite("strength", self.config.strength, "0-100")?;
        require_finite("bias", self.config.bias, "0-100")?;
        if let Some(target) = self.config.target_brightness {
            require_finite("target brightness", target, "0-1")?;
        }
        Ok(self.config)
    }
}

/// Output image format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// PNG with alpha channel transparency
    #[default]
    Png,
    /// JPEG, transparent pixels flattened onto white
    Jpeg,
    /// Lossless WebP with alpha channel transparency
    WebP,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Png => write!(f, "png"),
            Self::Jpeg => write!(f, "jpeg"),
            Self::WebP => write!(f, "webp"),
        }
    }
}

/// Encoding settings for saved rasters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeOptions {
    pub format: OutputFormat,
    /// JPEG quality (0-100, only used for JPEG output)
    pub jpeg_quality: u8,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            format: OutputFormat::Png,
            jpeg_quality: 92,
        }
    }
}

/// On-disk preset bundling parameters for both engines
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preset {
    pub color: ColorRemovalConfig,
    pub shadow: ShadowConfig,
    pub output: EncodeOptions,
}

impl Preset {
    /// Load a JSON preset file; every value is sanitized after parsing
    ///
    /// # Errors
    /// - File cannot be read
    /// - File is not valid JSON for this schema
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ChromaShadeError::file_io_error("read preset", path, &e))?;
        Self::from_json_str(&content)
    }

    /// Parse a JSON preset
    ///
    /// # Errors
    /// - Invalid JSON for this schema
    pub fn from_json_str(json: &str) -> Result<Self> {
        let preset: Self = serde_json::from_str(json)?;
        Ok(Self {
            color: preset.color.sanitized(),
            shadow: preset.shadow.sanitized(),
            output: EncodeOptions {
                jpeg_quality: preset.output.jpeg_quality.min(100),
                ..preset.output
            },
        })
    }
}
