//! Tracing subscriber setup for the CLI
//!
//! The library only emits events; binaries decide where they go.

use crate::types::ProcessingMetadata;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Output format of the subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TracingFormat {
    /// Colored compact lines (default for interactive use)
    #[default]
    Console,
    /// Plain compact lines for CI logs
    Compact,
    /// One JSON object per event
    #[cfg(feature = "tracing-json")]
    Json,
}

/// Tracing configuration builder
#[derive(Debug, Default)]
pub struct TracingConfig {
    /// 0 = info, 1 = debug, 2+ = trace
    pub verbosity: u8,
    pub format: TracingFormat,
    /// Overrides `verbosity` when set, e.g. `chromashade::shadow=trace`
    pub env_filter: Option<String>,
    /// Correlates every event of one CLI run
    pub session_id: Option<String>,
}

impl TracingConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_env_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    #[must_use]
    pub fn with_session_id<S: Into<String>>(mut self, session_id: S) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    #[must_use]
    pub fn verbosity_to_filter(&self) -> &'static str {
        match self.verbosity {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    /// Install the global subscriber
    ///
    /// # Errors
    /// - The filter expression is invalid
    /// - A global subscriber is already installed
    pub fn init(self) -> anyhow::Result<()> {
        let filter = match &self.env_filter {
            Some(expr) => EnvFilter::try_new(expr)?,
            None => EnvFilter::try_new(self.verbosity_to_filter())?,
        };
        let registry = Registry::default().with(filter);

        match self.format {
            TracingFormat::Console => registry
                .with(fmt::layer().with_ansi(true).with_target(false).compact())
                .try_init()?,
            TracingFormat::Compact => registry
                .with(fmt::layer().with_ansi(false).with_target(false).compact())
                .try_init()?,
            #[cfg(feature = "tracing-json")]
            TracingFormat::Json => registry
                .with(fmt::layer().json().with_current_span(true).with_span_list(true))
                .try_init()?,
        }

        if let Some(session_id) = &self.session_id {
            tracing::debug!(session_id = %session_id, "Session started");
        }
        Ok(())
    }
}

/// Console tracing with a fresh session id
///
/// # Errors
/// - A global subscriber is already installed
pub fn init_cli_tracing(verbosity: u8) -> anyhow::Result<String> {
    let session_id = uuid::Uuid::new_v4().to_string();
    TracingConfig::new()
        .with_verbosity(verbosity)
        .with_session_id(session_id.clone())
        .init()?;
    Ok(session_id)
}

/// Install an `RUST_LOG`-driven subscriber unless one is already set
pub fn init_library_tracing() {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_ok() {
        tracing::debug!("Library tracing initialized");
    }
}

/// Span creation helpers for common operations
pub mod spans {
    use tracing::{Level, Span};

    /// Whole CLI invocation
    pub fn session(session_id: &str, operation: &str) -> Span {
        tracing::span!(Level::INFO, "session", session_id = %session_id, operation = %operation)
    }

    pub fn batch_processing(file_count: usize) -> Span {
        tracing::span!(Level::INFO, "batch_processing", file_count)
    }

    pub fn file_processing(file_path: &std::path::Path, operation: &str) -> Span {
        tracing::span!(
            Level::INFO,
            "file_processing",
            file_path = %file_path.display(),
            operation = %operation
        )
    }
}

/// Event helpers for common logging patterns
pub mod events {
    use super::ProcessingMetadata;
    use tracing::{error, info, warn};

    pub fn error_with_context(error: &dyn std::fmt::Display, context: &str) {
        error!(error = %error, context = %context, "Operation failed");
    }

    pub fn warning_with_recommendation(message: &str, recommendation: &str) {
        warn!(message = %message, recommendation = %recommendation, "Warning");
    }

    /// One summary line per rendered image
    pub fn render_summary(output: &std::path::Path, metadata: &ProcessingMetadata) {
        info!(
            output = %output.display(),
            operation = ?metadata.operation,
            affected = metadata.affected_pixels,
            total = metadata.total_pixels,
            ratio = %format!("{:.1}%", metadata.affected_ratio() * 100.0),
            duration_ms = metadata.duration_ms,
            "Rendered"
        );
    }
}
