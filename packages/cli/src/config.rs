//! TOML run configuration.
//!
//! ```toml
//! [forecast]
//! horizon = 3
//! failure_policy = "skip"        # or "abort"
//! threshold_keying = "auto"      # "division-month" | "lead-time"
//! parallel = true
//!
//! [inputs]
//! suitability = "data/suitability.csv"
//! thresholds = "data/thresholds.csv"
//! demographics = "data/demographics.csv"
//! bias_corrections = "data/bias_corrections.csv"   # optional
//!
//! [output]
//! predictions = "out/predictions.csv"
//! summary = "out/summary.json"                     # optional
//!
//! [suitability]
//! meteorology = "data/meteorology.csv"
//! temperature_curve = "data/temperature_suitability.csv"
//! output = "data/suitability.csv"
//! rainfall_saturation_mm = 300.0
//!
//! [suitability.day_temperature_offsets]
//! PH133900000 = -4.0
//! ```
//!
//! Command-line flags override file values.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use vector_risk_forecast_models::ForecastOptions;
use vector_risk_suitability::derive::DerivationOptions;

/// Environment variable naming the config file when `--config` is absent.
pub const CONFIG_ENV_VAR: &str = "VECTOR_RISK_CONFIG";

/// Errors that can occur while loading the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read config {path}: {source}")]
    Read {
        /// Path of the config file.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The config file is not valid TOML or has the wrong shape.
    #[error("Failed to parse config {path}: {source}")]
    Parse {
        /// Path of the config file.
        path: String,
        /// Underlying TOML error.
        source: toml::de::Error,
    },

    /// A required path was set neither in the file nor on the command line.
    #[error("No {key} path configured (set it in the config file or pass --{flag})")]
    MissingPath {
        /// Dotted config key, e.g. `inputs.suitability`.
        key: &'static str,
        /// Equivalent command-line flag.
        flag: &'static str,
    },
}

/// Root of the config file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub forecast: ForecastOptions,
    pub inputs: InputPaths,
    pub output: OutputPaths,
    pub suitability: SuitabilityConfig,
}

/// `[inputs]`: tables read by the `forecast` command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InputPaths {
    pub suitability: Option<PathBuf>,
    pub thresholds: Option<PathBuf>,
    pub demographics: Option<PathBuf>,
    /// Bias correction is disabled when unset.
    pub bias_corrections: Option<PathBuf>,
}

/// `[output]`: files written by the `forecast` command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputPaths {
    /// Predictions go to stdout when unset.
    pub predictions: Option<PathBuf>,
    pub summary: Option<PathBuf>,
}

/// `[suitability]`: inputs, output and tunables of the `suitability`
/// command.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SuitabilityConfig {
    pub meteorology: Option<PathBuf>,
    pub temperature_curve: Option<PathBuf>,
    pub output: Option<PathBuf>,
    #[serde(flatten)]
    pub derivation: DerivationOptions,
}

impl Config {
    /// Parses a config from TOML text. `path` labels errors.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the text is not a valid config.
    pub fn parse(toml_str: &str, path: &str) -> Result<Self, ConfigError> {
        toml::de::from_str(toml_str).map_err(|e| ConfigError::Parse {
            path: path.to_owned(),
            source: e,
        })
    }

    /// Reads and parses the config at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file cannot be read and
    /// [`ConfigError::Parse`] if it is not a valid config.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let label = path.display().to_string();
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: label.clone(),
            source: e,
        })?;
        let config = Self::parse(&contents, &label)?;
        log::info!("Loaded config from {label}");
        Ok(config)
    }

    /// Loads the config from `explicit`, else from [`CONFIG_ENV_VAR`], else
    /// falls back to defaults.
    ///
    /// # Errors
    ///
    /// See [`Config::from_file`].
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) if !path.is_empty() => Self::from_file(Path::new(&path)),
            _ => {
                log::debug!("No config file given; using defaults");
                Ok(Self::default())
            }
        }
    }
}

/// Picks the command-line value over the configured one, failing if neither
/// is set.
///
/// # Errors
///
/// Returns [`ConfigError::MissingPath`] if both are `None`.
pub fn require_path(
    flag_value: Option<PathBuf>,
    configured: Option<&PathBuf>,
    key: &'static str,
    flag: &'static str,
) -> Result<PathBuf, ConfigError> {
    flag_value
        .or_else(|| configured.cloned())
        .ok_or(ConfigError::MissingPath { key, flag })
}
