//! Configuration loading and typed config structures for a Cadence run.
//!
//! The canonical configuration lives in `cadence-config.yaml` at the project
//! root. It has three sections:
//!
//! - `clock` -- the [`SimClock`](crate::clock::SimClock) settings.
//! - `logging` -- the default log level.
//! - `functions` -- one [`Dictionary`] per function object, keyed by name.
//!   Each dictionary carries the object's `type` plus its `evaluate*` and
//!   `output*` control keys.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use crate::dictionary::Dictionary;

/// Environment variable overriding `clock.end_time`.
pub const END_TIME_ENV: &str = "CADENCE_END_TIME";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level run configuration.
///
/// Mirrors the structure of `cadence-config.yaml`. Every section is
/// optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RunConfig {
    /// Simulation clock settings.
    #[serde(default)]
    pub clock: ClockConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Function object dictionaries, keyed by object name.
    #[serde(default)]
    pub functions: BTreeMap<String, Dictionary>,
}

impl RunConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// `CADENCE_END_TIME` overrides `clock.end_time` when it parses as a
    /// number.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, applying environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config
            .clock
            .apply_end_time_override(std::env::var(END_TIME_ENV).ok().as_deref());
        Ok(config)
    }
}

/// Simulation clock configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClockConfig {
    /// Simulation time at step 0.
    #[serde(default)]
    pub start_time: f64,

    /// Simulation time at which the run stops.
    #[serde(default = "default_end_time")]
    pub end_time: f64,

    /// Nominal time step.
    #[serde(default = "default_delta_t")]
    pub delta_t: f64,

    /// Largest step a request may grant. Defaults to `delta_t`.
    #[serde(default)]
    pub max_delta_t: Option<f64>,

    /// Whether output controls may shorten steps.
    #[serde(default)]
    pub adjustable: bool,

    /// Clock's own output cadence in steps, consumed by `outputTime`
    /// controls.
    #[serde(default)]
    pub write_interval: Option<u64>,
}

impl ClockConfig {
    /// Replace `end_time` with `value` if it parses as a finite number.
    pub fn apply_end_time_override(&mut self, value: Option<&str>) {
        let Some(raw) = value else {
            return;
        };
        match raw.trim().parse::<f64>() {
            Ok(end_time) if end_time.is_finite() => self.end_time = end_time,
            _ => warn!(variable = END_TIME_ENV, value = raw, "Ignoring non-numeric override"),
        }
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            start_time: 0.0,
            end_time: default_end_time(),
            delta_t: default_delta_t(),
            max_delta_t: None,
            adjustable: false,
            write_interval: None,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

const fn default_end_time() -> f64 {
    1.0
}

const fn default_delta_t() -> f64 {
    0.1
}

fn default_log_level() -> String {
    "info".to_owned()
}
