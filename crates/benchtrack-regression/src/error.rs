//! Regression detection error types

use serde::Serialize;
use thiserror::Error;

/// Result type for detector setup
pub type RegressionResult<T> = Result<T, RegressionError>;

/// Detector configuration errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegressionError {
    #[error("Invalid regression setting {field}: {message}")]
    InvalidConfig { field: String, message: String },
}

impl RegressionError {
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        RegressionError::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// A single measurement that could not be classified
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[error("Cannot classify '{measurement_name}': {reason}")]
#[serde(rename_all = "camelCase")]
pub struct UnclassifiableError {
    pub measurement_name: String,
    pub reason: UnclassifiableReason,
}

/// Why a measurement could not be classified
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnclassifiableReason {
    /// No direction declared for the measurement, its unit, or its tool
    UnknownDirection { tool: String, unit: String },
    /// Ratio undefined for non-positive values
    NonPositive { baseline: f64, new_value: f64 },
}

impl std::fmt::Display for UnclassifiableReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnclassifiableReason::UnknownDirection { tool, unit } => write!(
                f,
                "no improvement direction declared for tool '{}' or unit '{}'",
                tool, unit
            ),
            UnclassifiableReason::NonPositive {
                baseline,
                new_value,
            } => write!(
                f,
                "ratio undefined for baseline {} and value {}",
                baseline, new_value
            ),
        }
    }
}
