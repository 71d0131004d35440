//! Canonical measurement record shared by every tool grammar

use serde::{Deserialize, Serialize, Serializer};

/// Largest integer an IEEE double represents exactly (2^53 - 1)
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// One named quantity from one benchmark run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Unique within its entry, conventionally `<group>/<case>`
    pub name: String,
    /// Measured value in `unit`
    #[serde(serialize_with = "serialize_value")]
    pub value: f64,
    /// Stated uncertainty, e.g. `± 397557034`. Advisory only.
    pub range: String,
    /// Unit tag, e.g. `ns/iter` or `ops/sec`
    pub unit: String,
    /// Free-form tool details (iteration counts, sample sizes)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<String>,
}

impl Measurement {
    pub fn new(
        name: impl Into<String>,
        value: f64,
        range: impl Into<String>,
        unit: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value,
            range: range.into(),
            unit: unit.into(),
            extra: None,
        }
    }

    pub fn with_extra(mut self, extra: impl Into<String>) -> Self {
        self.extra = Some(extra.into());
        self
    }
}

/// Improvement direction of a measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Larger values are regressions (time per iteration, bytes allocated)
    SmallerIsBetter,
    /// Larger values are improvements (throughput)
    BiggerIsBetter,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::SmallerIsBetter => "smaller_is_better",
            Direction::BiggerIsBetter => "bigger_is_better",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// Integral values are written without a fractional part so that dashboards
// reading the snapshot see the same numbers the harness printed.
fn serialize_value<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_finite() && value.fract() == 0.0 && value.abs() <= MAX_SAFE_INTEGER {
        serializer.serialize_i64(*value as i64)
    } else {
        serializer.serialize_f64(*value)
    }
}
