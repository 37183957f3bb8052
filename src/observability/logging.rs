//! Structured logging configuration.

use crate::config::LoggingSettings;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Default filter when neither `RUST_LOG` nor the config sets one.
const DEFAULT_FILTER: &str = "glimpse=info";

/// Filter used for `--verbose`.
const VERBOSE_FILTER: &str = "glimpse=debug";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Parses a format name; unknown names fall back to `Pretty`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Resolved logging configuration.
#[derive(Debug)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// Event filter.
    pub filter: EnvFilter,
    /// Optional log file; stderr when absent.
    pub file: Option<PathBuf>,
}

impl LoggingConfig {
    /// Builds logging configuration from config settings with env overrides.
    ///
    /// Precedence for the filter: `--verbose`, then `RUST_LOG`, then the
    /// configured level, then the default.
    #[must_use]
    pub fn from_settings(settings: &LoggingSettings, verbose: bool) -> Self {
        let format = std::env::var("GLIMPSE_LOG_FORMAT")
            .ok()
            .or_else(|| settings.format.clone())
            .map_or_else(LogFormat::default, |f| LogFormat::parse(&f));

        let file = std::env::var("GLIMPSE_LOG_FILE")
            .ok()
            .filter(|f| !f.trim().is_empty())
            .map(PathBuf::from)
            .or_else(|| settings.file.clone());

        let filter = if verbose {
            EnvFilter::new(VERBOSE_FILTER)
        } else {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new(settings.level.as_deref().unwrap_or(DEFAULT_FILTER))
            })
        };

        Self {
            format,
            filter,
            file,
        }
    }
}
