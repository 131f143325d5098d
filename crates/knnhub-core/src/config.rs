//! `knnhub` configuration.
//!
//! Provides configuration file support via `knnhub.toml` and environment
//! variables.
//!
//! # Priority (highest to lowest)
//!
//! 1. Environment variables (`KNNHUB_<SECTION>__<KEY>`, e.g. `KNNHUB_SHARED__K_SNN=20`)
//! 2. Configuration file (`knnhub.toml`)
//! 3. Default values

use crate::approx::ApproximateConfig;
use crate::knn::WeightParams;
use crate::snn::InstanceWeighting;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to parse configuration.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Invalid configuration value.
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue {
        /// Configuration key that failed validation.
        key: String,
        /// Validation error message.
        message: String,
    },
}

/// Exact engine section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExactConfig {
    /// Neighborhood size.
    pub k: usize,
    /// Worker threads for the partitioned paths (0 = available parallelism).
    pub threads: usize,
}

impl Default for ExactConfig {
    fn default() -> Self {
        Self { k: 10, threads: 0 }
    }
}

/// Shared-neighbor section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SharedConfig {
    /// Secondary neighborhood size.
    pub k_snn: usize,
    /// Worker threads for the pairwise counts (0 = available parallelism).
    pub threads: usize,
    /// Per-neighbor weighting of the counts.
    pub weighting: InstanceWeighting,
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            k_snn: 10,
            threads: 0,
            weighting: InstanceWeighting::Unweighted,
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace.
    pub level: String,
    /// Log format: text or json.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct KnnHubConfig {
    /// Exact engine configuration.
    pub exact: ExactConfig,
    /// Approximate builder configuration.
    pub approximate: ApproximateConfig,
    /// Shared-neighbor configuration.
    pub shared: SharedConfig,
    /// Weighting scheme parameters.
    pub weights: WeightParams,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl KnnHubConfig {
    /// Loads configuration from default sources.
    ///
    /// Priority: defaults < `knnhub.toml` < environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration parsing fails.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("knnhub.toml")
    }

    /// Loads configuration from a specific file path.
    ///
    /// A missing file is not an error; defaults and the environment apply.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration parsing fails.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("KNNHUB_").split("__"));

        figment
            .extract()
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Creates a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::string(toml_str));

        figment
            .extract()
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the first invalid key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.exact.k == 0 {
            return Err(invalid("exact.k", "must be at least 1"));
        }
        if self.shared.k_snn == 0 {
            return Err(invalid("shared.k_snn", "must be at least 1"));
        }

        self.approximate
            .validate()
            .map_err(|e| invalid("approximate", e.to_string()))?;

        let w = &self.weights;
        if !w.lower_bound.is_finite() || !w.upper_bound.is_finite() || w.lower_bound > w.upper_bound {
            return Err(invalid(
                "weights.lower_bound",
                format!("bounds [{}, {}] are empty", w.lower_bound, w.upper_bound),
            ));
        }
        if !w.theta.is_finite() || w.theta < 0.0 {
            return Err(invalid(
                "weights.theta",
                format!("value {} must be finite and non-negative", w.theta),
            ));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(invalid(
                "logging.level",
                format!(
                    "value '{}' is invalid, expected one of: {:?}",
                    self.logging.level, valid_levels
                ),
            ));
        }
        let valid_formats = ["text", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(invalid(
                "logging.format",
                format!(
                    "value '{}' is invalid, expected one of: {:?}",
                    self.logging.format, valid_formats
                ),
            ));
        }

        Ok(())
    }

    /// Serializes the configuration to TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.into(),
    }
}
