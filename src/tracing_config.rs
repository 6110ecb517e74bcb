//! Tracing configuration for the binaries
//!
//! The library only emits `tracing` events and spans (and `log` records from
//! the inference backends, bridged by the subscriber). Subscribers are set up
//! here by the binaries.

#[cfg(feature = "cli")]
use std::io::IsTerminal;
#[cfg(feature = "cli")]
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Configuration for tracing output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracingFormat {
    /// Human-readable console output with colors
    Console,
    /// Compact console output without ANSI colors, for CI and log collectors
    Compact,
}

/// Stream the formatted events are written to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracingOutput {
    Stdout,
    /// Keeps stdout free for command output
    Stderr,
}

/// Tracing configuration builder
#[derive(Debug)]
pub struct TracingConfig {
    /// Verbosity level (maps to log levels)
    pub verbosity: u8,
    /// Output format
    pub format: TracingFormat,
    /// Output destination
    pub output: TracingOutput,
    /// Environment filter string (overrides verbosity if set)
    pub env_filter: Option<String>,
    /// Session ID for correlation
    pub session_id: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            verbosity: 0,
            format: TracingFormat::Console,
            output: TracingOutput::Stdout,
            env_filter: None,
            session_id: None,
        }
    }
}

impl TracingConfig {
    /// Create a new tracing configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set verbosity level (0-3+)
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set output format
    #[must_use]
    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    /// Set output destination
    #[must_use]
    pub fn with_output(mut self, output: TracingOutput) -> Self {
        self.output = output;
        self
    }

    /// Set custom environment filter
    #[must_use]
    pub fn with_env_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Set session ID for correlation
    #[must_use]
    pub fn with_session_id<S: Into<String>>(mut self, session_id: S) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Convert verbosity level to tracing filter string
    #[must_use]
    pub fn verbosity_to_filter(&self) -> &'static str {
        match self.verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }

    /// Initialize the global tracing subscriber
    ///
    /// # Errors
    /// - Invalid filter directive
    /// - A global subscriber is already installed
    #[cfg(feature = "cli")]
    pub fn init(self) -> anyhow::Result<()> {
        use tracing_subscriber::fmt;

        let filter = match &self.env_filter {
            Some(env_filter) => EnvFilter::try_new(env_filter)?,
            None => EnvFilter::try_new(self.verbosity_to_filter())?,
        };

        let ansi = self.format == TracingFormat::Console;
        let registry = Registry::default().with(filter);

        match self.output {
            TracingOutput::Stdout => {
                let fmt_layer = fmt::layer()
                    .with_ansi(ansi)
                    .with_target(false)
                    .with_level(true)
                    .compact();
                registry.with(fmt_layer).try_init()?;
            },
            TracingOutput::Stderr => {
                let fmt_layer = fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(ansi)
                    .with_target(false)
                    .with_level(true)
                    .compact();
                registry.with(fmt_layer).try_init()?;
            },
        }

        if let Some(session_id) = &self.session_id {
            tracing::debug!(session_id = %session_id, "Session started");
        }

        Ok(())
    }
}

/// Initialize tracing for the command-line tool
///
/// Logs go to stderr; `-v` raises the level to info. `RUST_LOG` wins when set.
///
/// # Errors
/// - Invalid `RUST_LOG` directive
/// - A global subscriber is already installed
#[cfg(feature = "cli")]
pub fn init_cli_tracing(verbosity: u8) -> anyhow::Result<()> {
    let mut config = TracingConfig::new()
        .with_verbosity(verbosity)
        .with_output(TracingOutput::Stderr)
        .with_session_id(uuid::Uuid::new_v4().to_string());
    if let Some(filter) = rust_log() {
        config = config.with_env_filter(filter);
    }
    config.init()
}

/// Initialize tracing for the HTTP service
///
/// Defaults to `info`; `RUST_LOG` overrides. Colored output on a terminal,
/// compact plain lines otherwise.
///
/// # Errors
/// - Invalid `RUST_LOG` directive
/// - A global subscriber is already installed
#[cfg(feature = "cli")]
pub fn init_server_tracing() -> anyhow::Result<()> {
    TracingConfig::new()
        .with_format(server_format(std::io::stdout().is_terminal()))
        .with_env_filter(rust_log().unwrap_or_else(|| "info".to_string()))
        .init()
}

#[cfg(feature = "cli")]
fn server_format(stdout_is_terminal: bool) -> TracingFormat {
    if stdout_is_terminal {
        TracingFormat::Console
    } else {
        TracingFormat::Compact
    }
}

#[cfg(feature = "cli")]
fn rust_log() -> Option<String> {
    std::env::var(EnvFilter::DEFAULT_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

/// Span creation helpers for common operations
pub mod spans {
    use tracing::{Level, Span};

    /// Create a span for model loading operations
    pub fn model_loading(model_name: &str, backend: &str) -> Span {
        tracing::span!(
            Level::INFO,
            "model_loading",
            model_name = %model_name,
            backend = %backend
        )
    }

    /// Create a span for a single background removal
    pub fn removal(model_name: &str, decoded_bytes: usize) -> Span {
        tracing::span!(
            Level::INFO,
            "removal",
            model_name = %model_name,
            decoded_bytes = %decoded_bytes
        )
    }

    /// Create a span for preprocessing operations
    pub fn preprocessing(original_size: (u32, u32), target_size: [u32; 2]) -> Span {
        tracing::span!(
            Level::DEBUG,
            "preprocessing",
            original_width = %original_size.0,
            original_height = %original_size.1,
            target_width = %target_size[0],
            target_height = %target_size[1]
        )
    }

    /// Create a span for inference operations
    pub fn inference(backend: &str) -> Span {
        tracing::span!(Level::DEBUG, "inference", backend = %backend)
    }

    /// Create a span for postprocessing operations
    pub fn postprocessing(operation: &str) -> Span {
        tracing::span!(Level::DEBUG, "postprocessing", operation = %operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_mapping() {
        assert_eq!(TracingConfig::new().with_verbosity(0).verbosity_to_filter(), "warn");
        assert_eq!(TracingConfig::new().with_verbosity(1).verbosity_to_filter(), "info");
        assert_eq!(TracingConfig::new().with_verbosity(2).verbosity_to_filter(), "debug");
        assert_eq!(TracingConfig::new().with_verbosity(7).verbosity_to_filter(), "trace");
    }

    #[test]
    fn test_config_builder() {
        let config = TracingConfig::new()
            .with_verbosity(2)
            .with_format(TracingFormat::Compact)
            .with_output(TracingOutput::Stderr)
            .with_session_id("test-session");

        assert_eq!(config.verbosity, 2);
        assert_eq!(config.format, TracingFormat::Compact);
        assert_eq!(config.output, TracingOutput::Stderr);
        assert_eq!(config.session_id.as_deref(), Some("test-session"));
    }

    #[test]
    fn test_default_config() {
        let config = TracingConfig::default();
        assert_eq!(config.verbosity, 0);
        assert_eq!(config.format, TracingFormat::Console);
        assert_eq!(config.output, TracingOutput::Stdout);
        assert!(config.env_filter.is_none());
    }

    #[cfg(feature = "cli")]
    #[test]
    fn test_server_format_is_compact_off_terminal() {
        assert_eq!(server_format(true), TracingFormat::Console);
        assert_eq!(server_format(false), TracingFormat::Compact);
    }
}
