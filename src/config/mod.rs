//! Configuration management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::descriptor::{DEFAULT_MAX_RESULTS, DEFAULT_THRESHOLD, ExtractorConfig};
use crate::{Error, Result};

/// File name of the catalog database inside the data directory.
pub const DATABASE_FILE: &str = "catalog.db";

/// Main configuration for glimpse.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GlimpseConfig {
    /// Path to the data directory.
    pub data_dir: PathBuf,
    /// Extraction and ranking settings.
    pub search: SearchSettings,
    /// Logging settings.
    pub logging: LoggingSettings,
    /// Metrics settings.
    pub metrics: MetricsSettings,
}

/// Extraction and ranking settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SearchSettings {
    /// Descriptor length.
    pub feature_size: usize,
    /// Side of the square downsampling grid.
    pub grid_size: u32,
    /// Number of intensity histogram bins.
    pub histogram_bins: usize,
    /// Minimum similarity (exclusive) for a match.
    pub threshold: f32,
    /// Maximum number of results per query.
    pub max_results: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        let extractor = ExtractorConfig::default();
        Self {
            feature_size: extractor.feature_size,
            grid_size: extractor.grid_size,
            histogram_bins: extractor.histogram_bins,
            threshold: DEFAULT_THRESHOLD,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct LoggingSettings {
    /// Output format: `pretty` or `json`.
    pub format: Option<String>,
    /// Default filter directive, e.g. `glimpse=debug`.
    pub level: Option<String>,
    /// Optional log file path.
    pub file: Option<PathBuf>,
}

/// Metrics settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct MetricsSettings {
    /// Whether to install the Prometheus recorder.
    pub enabled: bool,
    /// Port for the Prometheus scrape listener.
    pub port: Option<u16>,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Data directory.
    pub data_dir: Option<String>,
    /// Search section.
    pub search: Option<ConfigFileSearch>,
    /// Logging section.
    pub logging: Option<ConfigFileLogging>,
    /// Metrics section.
    pub metrics: Option<ConfigFileMetrics>,
}

/// Search section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileSearch {
    /// Descriptor length.
    pub feature_size: Option<usize>,
    /// Downsampling grid side.
    pub grid_size: Option<u32>,
    /// Histogram bins.
    pub histogram_bins: Option<usize>,
    /// Match threshold.
    pub threshold: Option<f32>,
    /// Result limit.
    pub max_results: Option<usize>,
}

/// Logging section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileLogging {
    /// Output format.
    pub format: Option<String>,
    /// Filter directive.
    pub level: Option<String>,
    /// Log file path.
    pub file: Option<String>,
}

/// Metrics section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileMetrics {
    /// Enable flag.
    pub enabled: Option<bool>,
    /// Listener port.
    pub port: Option<u16>,
}

impl Default for GlimpseConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".glimpse"),
            search: SearchSettings::default(),
            logging: LoggingSettings::default(),
            metrics: MetricsSettings::default(),
        }
    }
}

impl GlimpseConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::operation("read_config_file", e))?;
        Self::parse(&contents)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML for [`ConfigFile`].
    pub fn parse(contents: &str) -> Result<Self> {
        let file: ConfigFile =
            toml::from_str(contents).map_err(|e| Error::operation("parse_config_file", e))?;
        Ok(Self::from_config_file(file))
    }

    /// Loads configuration from the default location.
    ///
    /// Checks the following paths in order:
    /// 1. Platform-specific config dir (`~/Library/Application Support/glimpse/` on macOS)
    /// 2. XDG config dir (`~/.config/glimpse/` for Unix compatibility)
    ///
    /// Returns default configuration if no config file is found. Files that
    /// exist but cannot be loaded are skipped and reported in the returned
    /// warnings.
    #[must_use]
    pub fn load_default() -> (Self, Vec<String>) {
        let mut warnings = Vec::new();
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return (Self::default(), warnings);
        };

        let candidates = [
            base_dirs.config_dir().join("glimpse").join("config.toml"),
            base_dirs
                .home_dir()
                .join(".config")
                .join("glimpse")
                .join("config.toml"),
        ];

        for path in candidates.iter().filter(|p| p.exists()) {
            match Self::load_from_file(path) {
                Ok(config) => return (config, warnings),
                Err(e) => warnings.push(format!(
                    "ignoring unreadable config file {}: {e}",
                    path.display()
                )),
            }
        }

        (Self::default(), warnings)
    }

    /// Loads from `path` if given, else from the default location, then
    /// applies environment overrides and validates.
    ///
    /// Loading runs before logging is set up, so skipped inputs come back as
    /// warnings for the caller to report.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit file cannot be loaded or the result
    /// fails validation.
    pub fn load(path: Option<&Path>) -> Result<(Self, Vec<String>)> {
        let (mut config, mut warnings) = match path {
            Some(path) => (Self::load_from_file(path)?, Vec::new()),
            None => Self::load_default(),
        };
        warnings.extend(config.apply_env_overrides());
        config.validate()?;
        Ok((config, warnings))
    }

    /// Converts a `ConfigFile` to `GlimpseConfig`.
    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(data_dir) = file.data_dir {
            config.data_dir = PathBuf::from(data_dir);
        }
        if let Some(search) = file.search {
            if let Some(v) = search.feature_size {
                config.search.feature_size = v;
            }
            if let Some(v) = search.grid_size {
                config.search.grid_size = v;
            }
            if let Some(v) = search.histogram_bins {
                config.search.histogram_bins = v;
            }
            if let Some(v) = search.threshold {
                config.search.threshold = v;
            }
            if let Some(v) = search.max_results {
                config.search.max_results = v;
            }
        }
        if let Some(logging) = file.logging {
            config.logging.format = logging.format;
            config.logging.level = logging.level;
            config.logging.file = logging.file.map(PathBuf::from);
        }
        if let Some(metrics) = file.metrics {
            config.metrics.enabled = metrics.enabled.unwrap_or(false);
            config.metrics.port = metrics.port;
        }

        config
    }

    /// Applies `GLIMPSE_*` environment variable overrides.
    ///
    /// Unparseable values are ignored; one warning per ignored variable is
    /// returned.
    pub fn apply_env_overrides(&mut self) -> Vec<String> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Vec<String> {
        let mut warnings = Vec::new();
        if let Some(dir) = lookup("GLIMPSE_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(v) = parse_override(&lookup, "GLIMPSE_FEATURE_SIZE", &mut warnings) {
            self.search.feature_size = v;
        }
        if let Some(v) = parse_override(&lookup, "GLIMPSE_THRESHOLD", &mut warnings) {
            self.search.threshold = v;
        }
        if let Some(v) = parse_override(&lookup, "GLIMPSE_MAX_RESULTS", &mut warnings) {
            self.search.max_results = v;
        }
        if let Some(format) = lookup("GLIMPSE_LOG_FORMAT") {
            self.logging.format = Some(format);
        }
        if let Some(file) = lookup("GLIMPSE_LOG_FILE") {
            self.logging.file = Some(PathBuf::from(file));
        }
        if let Some(v) = parse_override(&lookup, "GLIMPSE_METRICS_ENABLED", &mut warnings) {
            self.metrics.enabled = v;
        }
        if let Some(v) = parse_override(&lookup, "GLIMPSE_METRICS_PORT", &mut warnings) {
            self.metrics.port = Some(v);
        }
        warnings
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a zero feature size, a zero result
    /// limit, a threshold outside `[-1, 1]`, or invalid extractor settings.
    pub fn validate(&self) -> Result<()> {
        if self.search.max_results == 0 {
            return Err(Error::InvalidInput(
                "max_results must be greater than zero".to_string(),
            ));
        }
        if !(-1.0..=1.0).contains(&self.search.threshold) {
            return Err(Error::InvalidInput(format!(
                "threshold must be within [-1, 1], got {}",
                self.search.threshold
            )));
        }
        self.extractor_config().validate()
    }

    /// Extractor settings derived from the search section.
    #[must_use]
    pub const fn extractor_config(&self) -> ExtractorConfig {
        ExtractorConfig::new()
            .with_feature_size(self.search.feature_size)
            .with_grid_size(self.search.grid_size)
            .with_histogram_bins(self.search.histogram_bins)
    }

    /// Path of the catalog database.
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }

    /// Sets the data directory.
    #[must_use]
    pub fn with_data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_dir = path.into();
        self
    }

    /// Replaces the search settings.
    #[must_use]
    pub const fn with_search(mut self, search: SearchSettings) -> Self {
        self.search = search;
        self
    }
}

fn parse_override<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    warnings: &mut Vec<String>,
) -> Option<T> {
    let raw = lookup(key)?;
    raw.trim().parse().map_or_else(
        |_| {
            warnings.push(format!("ignoring unparseable {key}={raw:?}"));
            None
        },
        Some,
    )
}
