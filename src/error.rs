//! Error types for color removal and shadow correction

use thiserror::Error;

/// Result type alias for chromashade operations
pub type Result<T> = std::result::Result<T, ChromaShadeError>;

/// Error types surfaced by the engines and their I/O services
///
/// The engines never fail for data-dependent reasons: degenerate numerics are
/// absorbed by epsilon guards and clamps. Only API-boundary preconditions,
/// cancellation and the excluded collaborators (file I/O, codecs, the remote
/// refinement service) produce errors.
#[derive(Error, Debug)]
pub enum ChromaShadeError {
    /// Zero-sized raster or buffer length that does not match the dimensions
    #[error("Invalid dimensions: {0}")]
    InvalidDimensions(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding or encoding errors
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Preset or response payload (de)serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The remote refinement service could not deliver a usable raster
    #[error("Refinement unavailable: {0}")]
    RefinementUnavailable(String),

    /// A cancellation token was triggered while an engine was running
    #[error("Operation cancelled")]
    Cancelled,

    /// Generic processing failure outside the engines
    #[error("Processing error: {0}")]
    Processing(String),
}

impl ChromaShadeError {
    /// Create a new invalid dimensions error
    pub fn invalid_dimensions<S: Into<String>>(msg: S) -> Self {
        Self::InvalidDimensions(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new processing error
    pub fn processing<S: Into<String>>(msg: S) -> Self {
        Self::Processing(msg.into())
    }

    /// Create a new refinement-unavailable error
    pub fn refinement_unavailable<S: Into<String>>(reason: S) -> Self {
        Self::RefinementUnavailable(reason.into())
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {} '{}': {}", operation, path_display, error),
        ))
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
        recommended: Option<T>,
    ) -> Self {
        let recommendation = match recommended {
            Some(rec) => format!(" Recommended: {}", rec),
            None => String::new(),
        };

        Self::InvalidConfig(format!(
            "Invalid {}: {} (valid range: {}).{}",
            parameter, value, valid_range, recommendation
        ))
    }

    /// Create dimension error for a buffer that does not match `width * height * channels`
    pub fn buffer_length_error(width: u32, height: u32, channels: usize, actual: usize) -> Self {
        Self::InvalidDimensions(format!(
            "buffer holds {} bytes but {}x{} with {} channel(s) needs {}",
            actual,
            width,
            height,
            channels,
            width as usize * height as usize * channels
        ))
    }

    /// Whether this error is the distinct "refinement unavailable" outcome
    #[must_use]
    pub fn is_refinement_unavailable(&self) -> bool {
        matches!(self, Self::RefinementUnavailable(_))
    }
}
