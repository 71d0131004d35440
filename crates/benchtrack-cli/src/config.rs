//! Tracker configuration
//!
//! Loaded from YAML (`.yaml`, `.yml`), TOML (`.toml`) or JSON (`.json`),
//! then overridden by `BENCHTRACK_`-prefixed environment variables, then by
//! command-line flags.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use benchtrack_history::StoreOptions;
use benchtrack_regression::{parse_factor, BaselineStatistic, RegressionConfig, RegressionError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix of environment variables that override configuration
pub const ENV_PREFIX: &str = "BENCHTRACK_";

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path} as {format}: {message}")]
    Parse {
        path: PathBuf,
        format: String,
        message: String,
    },

    #[error("Invalid configuration value for {field}: {message}")]
    Invalid { field: String, message: String },
}

impl From<RegressionError> for ConfigError {
    fn from(err: RegressionError) -> Self {
        match err {
            RegressionError::InvalidConfig { field, message } => ConfigError::Invalid {
                field: format!("regression.{}", field),
                message,
            },
        }
    }
}

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
    Json,
}

impl ConfigFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Some(ConfigFormat::Yaml),
            "toml" => Some(ConfigFormat::Toml),
            "json" => Some(ConfigFormat::Json),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ConfigFormat::Yaml => "YAML",
            ConfigFormat::Toml => "TOML",
            ConfigFormat::Json => "JSON",
        }
    }
}

/// Retry and locking settings of the history store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub lock_wait_ms: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        let defaults = StoreOptions::default();
        Self {
            max_retries: defaults.max_retries,
            retry_backoff_ms: defaults.retry_backoff.as_millis() as u64,
            lock_wait_ms: defaults.lock_wait.as_millis() as u64,
        }
    }
}

impl StoreSettings {
    pub fn to_options(&self) -> StoreOptions {
        StoreOptions {
            max_retries: self.max_retries,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
            lock_wait: Duration::from_millis(self.lock_wait_ms),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Recorded in newly created snapshots
    pub repo_url: String,
    /// Exit non-zero when any measurement is classified `ALERT`
    pub fail_on_alert: bool,
    pub regression: RegressionConfig,
    pub store: StoreSettings,
}

impl TrackerConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        self.regression.validate()?;
        Ok(())
    }
}

/// Configuration loader for multiple formats
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file, detecting the format by extension
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<TrackerConfig> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");
        let format = ConfigFormat::from_extension(extension).ok_or_else(|| ConfigError::Parse {
            path: path.to_path_buf(),
            format: "unknown".to_string(),
            message: format!("Unsupported file format: '{}'", extension),
        })?;

        Self::load_from_string(&content, format, path)
    }

    /// Load configuration from a string with the given format
    pub fn load_from_string<P: AsRef<Path>>(
        content: &str,
        format: ConfigFormat,
        path: P,
    ) -> ConfigResult<TrackerConfig> {
        let parsed: Result<TrackerConfig, String> = match format {
            ConfigFormat::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
            ConfigFormat::Toml => toml::from_str(content).map_err(|e| e.to_string()),
            ConfigFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        };

        parsed.map_err(|message| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            format: format.name().to_string(),
            message,
        })
    }
}

/// Environment variable overrides
pub struct EnvOverrides;

impl EnvOverrides {
    /// Collect `BENCHTRACK_*` variables, keyed without the prefix
    pub fn parse() -> HashMap<String, String> {
        std::env::vars()
            .filter_map(|(key, value)| {
                key.strip_prefix(ENV_PREFIX)
                    .map(|name| (name.to_string(), value))
            })
            .collect()
    }

    /// Apply overrides from the process environment
    pub fn apply(config: &mut TrackerConfig) -> ConfigResult<()> {
        Self::apply_overrides(config, &Self::parse())
    }

    /// Apply specific overrides. Unknown keys are ignored; malformed values are errors.
    pub fn apply_overrides(
        config: &mut TrackerConfig,
        overrides: &HashMap<String, String>,
    ) -> ConfigResult<()> {
        for (key, value) in overrides {
            let value = value.trim();
            match key.as_str() {
                "REPO_URL" => config.repo_url = value.to_string(),
                "FAIL_ON_ALERT" => config.fail_on_alert = parse_bool(key, value)?,
                "WARN_FACTOR" => config.regression.warn_factor = factor(key, value)?,
                "ALERT_FACTOR" => config.regression.alert_factor = factor(key, value)?,
                "WINDOW" => {
                    config.regression.window = match value {
                        "" | "all" => None,
                        n => Some(number(key, n)?),
                    }
                }
                "BASELINE" => {
                    config.regression.baseline = match value.to_ascii_lowercase().as_str() {
                        "mean" => BaselineStatistic::Mean,
                        "median" => BaselineStatistic::Median,
                        _ => return Err(invalid(key, format!("expected mean or median, got '{}'", value))),
                    }
                }
                "MAX_RETRIES" => config.store.max_retries = number(key, value)?,
                _ => {}
            }
        }
        Ok(())
    }
}

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field: format!("{}{}", ENV_PREFIX, key),
        message: message.into(),
    }
}

fn factor(key: &str, value: &str) -> ConfigResult<f64> {
    parse_factor(value).map_err(|message| invalid(key, message))
}

fn number<T: std::str::FromStr>(key: &str, value: &str) -> ConfigResult<T> {
    value
        .parse()
        .map_err(|_| invalid(key, format!("'{}' is not a valid number", value)))
}

fn parse_bool(key: &str, value: &str) -> ConfigResult<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, format!("'{}' is not a boolean", value))),
    }
}
