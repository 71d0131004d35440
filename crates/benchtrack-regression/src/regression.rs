//! Regression classification of a freshly appended entry

use std::collections::HashMap;

use benchtrack_history::{Entry, Snapshot};
use benchtrack_parsers::{Direction, Measurement, Tool};
use rayon::prelude::*;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, warn};

use crate::baseline::{historical_window, BaselineStatistic};
use crate::error::{RegressionError, RegressionResult, UnclassifiableError, UnclassifiableReason};
use crate::report::RegressionReport;

/// Fewest historical points that allow a classification
pub const MIN_HISTORY: usize = 2;

/// Outcome class of one measurement, ordered by severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Classification {
    /// Not enough history to compare against
    InsufficientData,
    Ok,
    Warn,
    Alert,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::InsufficientData => "INSUFFICIENT_DATA",
            Classification::Ok => "OK",
            Classification::Warn => "WARN",
            Classification::Alert => "ALERT",
        }
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of one measurement of an entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationRecord {
    pub measurement_name: String,
    pub new_value: f64,
    /// Absent when there was not enough history
    pub baseline: Option<f64>,
    /// Regression ratio, above 1.0 means worse than baseline
    pub ratio: Option<f64>,
    pub classification: Classification,
    pub unit: String,
    /// Number of historical points the baseline was computed from
    pub history_len: usize,
}

/// Regression detection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegressionConfig {
    /// Ratios above this are `WARN`. Accepts `1.5` or `"150%"`.
    #[serde(deserialize_with = "deserialize_factor")]
    pub warn_factor: f64,
    /// Ratios above this are `ALERT`. Accepts `2.0` or `"200%"`.
    #[serde(deserialize_with = "deserialize_factor")]
    pub alert_factor: f64,
    /// Trailing number of prior points to compare against; `None` uses all
    pub window: Option<usize>,
    pub baseline: BaselineStatistic,
    /// Direction overrides keyed by measurement name
    pub directions: HashMap<String, Direction>,
    /// Direction overrides keyed by unit
    pub unit_directions: HashMap<String, Direction>,
}

impl Default for RegressionConfig {
    fn default() -> Self {
        Self {
            warn_factor: 1.5,
            alert_factor: 2.0,
            window: Some(20),
            baseline: BaselineStatistic::Mean,
            directions: HashMap::new(),
            unit_directions: HashMap::new(),
        }
    }
}

impl RegressionConfig {
    pub fn validate(&self) -> RegressionResult<()> {
        if !(self.warn_factor.is_finite() && self.warn_factor > 0.0) {
            return Err(RegressionError::invalid_config(
                "warn_factor",
                format!("must be a positive number, got {}", self.warn_factor),
            ));
        }
        if !(self.alert_factor.is_finite() && self.alert_factor > self.warn_factor) {
            return Err(RegressionError::invalid_config(
                "alert_factor",
                format!(
                    "must be greater than warn_factor {}, got {}",
                    self.warn_factor, self.alert_factor
                ),
            ));
        }
        if self.window == Some(0) {
            return Err(RegressionError::invalid_config(
                "window",
                "must be at least 1 when set",
            ));
        }
        Ok(())
    }

    /// Direction for a measurement of an entry recorded by `tool`
    pub fn direction_for(&self, tool: &str, measurement: &Measurement) -> Option<Direction> {
        self.directions
            .get(&measurement.name)
            .or_else(|| self.unit_directions.get(&measurement.unit))
            .copied()
            .or_else(|| tool.parse::<Tool>().ok().map(|t| t.direction()))
    }
}

/// Parse a threshold given as a multiplier (`1.5`) or a percentage (`"150%"`)
pub fn parse_factor(raw: &str) -> Result<f64, String> {
    let raw = raw.trim();
    let (number, scale) = match raw.strip_suffix('%') {
        Some(pct) => (pct.trim(), 100.0),
        None => (raw, 1.0),
    };
    number
        .parse::<f64>()
        .map(|n| n / scale)
        .map_err(|_| format!("'{}' is not a multiplier or percentage", raw))
}

fn deserialize_factor<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Factor {
        Number(f64),
        Text(String),
    }

    match Factor::deserialize(deserializer)? {
        Factor::Number(n) => Ok(n),
        Factor::Text(s) => parse_factor(&s).map_err(serde::de::Error::custom),
    }
}

/// Map a ratio onto a class. Boundary ratios fall into the lower class.
pub fn classify_ratio(ratio: f64, warn_factor: f64, alert_factor: f64) -> Classification {
    if ratio <= warn_factor {
        Classification::Ok
    } else if ratio <= alert_factor {
        Classification::Warn
    } else {
        Classification::Alert
    }
}

/// Regression ratio oriented so that larger always means worse
pub fn regression_ratio(new_value: f64, baseline: f64, direction: Direction) -> Option<f64> {
    if !(new_value > 0.0 && baseline > 0.0) {
        return None;
    }
    let ratio = match direction {
        Direction::SmallerIsBetter => new_value / baseline,
        Direction::BiggerIsBetter => baseline / new_value,
    };
    ratio.is_finite().then_some(ratio)
}

/// Classifies entries against their suite's history
#[derive(Debug, Clone)]
pub struct RegressionDetector {
    config: RegressionConfig,
}

impl RegressionDetector {
    pub fn new(config: RegressionConfig) -> RegressionResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RegressionConfig {
        &self.config
    }

    /// Classify every measurement of `entry`, which must already be in `snapshot`.
    ///
    /// Results keep the entry's measurement order. A measurement that cannot
    /// be classified yields an error in its slot without affecting the others.
    pub fn classify_entry(
        &self,
        snapshot: &Snapshot,
        suite: &str,
        entry: &Entry,
    ) -> Vec<Result<ClassificationRecord, UnclassifiableError>> {
        entry
            .benches
            .par_iter()
            .map(|m| self.classify_measurement(snapshot, suite, entry, m))
            .collect()
    }

    /// Classify an entry and aggregate the results
    pub fn report(&self, snapshot: &Snapshot, suite: &str, entry: &Entry) -> RegressionReport {
        let results = self.classify_entry(snapshot, suite, entry);
        RegressionReport::new(suite, entry, results)
    }

    /// Report for the most recent entry of a suite
    pub fn report_latest(&self, snapshot: &Snapshot, suite: &str) -> Option<RegressionReport> {
        snapshot
            .latest(suite)
            .map(|entry| self.report(snapshot, suite, entry))
    }

    fn classify_measurement(
        &self,
        snapshot: &Snapshot,
        suite: &str,
        entry: &Entry,
        measurement: &Measurement,
    ) -> Result<ClassificationRecord, UnclassifiableError> {
        let series = snapshot.query(suite, &measurement.name);
        let window = historical_window(&series, &entry.commit.id, self.config.window);

        let mut record = ClassificationRecord {
            measurement_name: measurement.name.clone(),
            new_value: measurement.value,
            baseline: None,
            ratio: None,
            classification: Classification::InsufficientData,
            unit: measurement.unit.clone(),
            history_len: window.len(),
        };

        if window.len() < MIN_HISTORY {
            debug!(
                suite,
                measurement = %measurement.name,
                points = window.len(),
                "Not enough history to classify"
            );
            return Ok(record);
        }

        let direction = self
            .config
            .direction_for(&entry.tool, measurement)
            .ok_or_else(|| UnclassifiableError {
                measurement_name: measurement.name.clone(),
                reason: UnclassifiableReason::UnknownDirection {
                    tool: entry.tool.clone(),
                    unit: measurement.unit.clone(),
                },
            })?;

        // Non-empty window, so the statistic is defined
        let baseline = self.config.baseline.compute(&window).unwrap_or(f64::NAN);
        let ratio = regression_ratio(measurement.value, baseline, direction).ok_or_else(|| {
            UnclassifiableError {
                measurement_name: measurement.name.clone(),
                reason: UnclassifiableReason::NonPositive {
                    baseline,
                    new_value: measurement.value,
                },
            }
        })?;

        let classification = classify_ratio(ratio, self.config.warn_factor, self.config.alert_factor);
        if classification > Classification::Ok {
            warn!(
                suite,
                measurement = %measurement.name,
                ratio,
                baseline,
                value = measurement.value,
                %classification,
                "Benchmark regression detected"
            );
        }

        record.baseline = Some(baseline);
        record.ratio = Some(ratio);
        record.classification = classification;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use benchtrack_history::{CommitRef, Person};

    const NAME: &str = "Block import/Block import ERC20 transfers";

    fn entry(id: &str, date: i64, tool: &str, benches: Vec<Measurement>) -> Entry {
        let person = Person {
            email: "dev@example.com".to_string(),
            name: "Dev".to_string(),
            username: None,
        };
        Entry::new(
            CommitRef {
                author: person.clone(),
                committer: person,
                distinct: true,
                id: id.to_string(),
                message: String::new(),
                timestamp: String::new(),
                tree_id: String::new(),
                url: String::new(),
            },
            date,
            tool,
            benches,
        )
    }

    fn ns(value: f64) -> Vec<Measurement> {
        vec![Measurement::new(NAME, value, "± 1", "ns/iter")]
    }

    fn history_with(new_value: f64) -> (Snapshot, Entry) {
        let mut snapshot = Snapshot::default();
        snapshot.append("Benchmark", entry("a", 1, "cargo", ns(209986143901.0))).unwrap();
        snapshot.append("Benchmark", entry("b", 2, "cargo", ns(160481725035.0))).unwrap();
        let new = entry("c", 3, "cargo", ns(new_value));
        snapshot.append("Benchmark", new.clone()).unwrap();
        (snapshot, new)
    }

    fn detector() -> RegressionDetector {
        RegressionDetector::new(RegressionConfig::default()).unwrap()
    }

    #[test]
    fn test_improvement_is_ok() {
        let (snapshot, new) = history_with(164365992478.0);
        let results = detector().classify_entry(&snapshot, "Benchmark", &new);
        let record = results[0].as_ref().unwrap();

        assert_eq!(record.classification, Classification::Ok);
        assert_eq!(record.baseline, Some(185233934468.0));
        let ratio = record.ratio.unwrap();
        assert!((ratio - 0.887).abs() < 0.001, "ratio {ratio}");
        assert_eq!(record.history_len, 2);
    }

    #[test]
    fn test_large_slowdown_alerts() {
        let (snapshot, new) = history_with(400000000000.0);
        let results = detector().classify_entry(&snapshot, "Benchmark", &new);
        let record = results[0].as_ref().unwrap();

        assert_eq!(record.classification, Classification::Alert);
        assert!((record.ratio.unwrap() - 2.16).abs() < 0.01);
    }

    #[test]
    fn test_first_measurement_has_insufficient_data() {
        let mut snapshot = Snapshot::default();
        let new = entry("a", 1, "cargo", ns(1.0e15));
        snapshot.append("Benchmark", new.clone()).unwrap();

        let results = detector().classify_entry(&snapshot, "Benchmark", &new);
        let record = results[0].as_ref().unwrap();
        assert_eq!(record.classification, Classification::InsufficientData);
        assert_eq!(record.baseline, None);
        assert_eq!(record.ratio, None);
    }

    #[test]
    fn test_single_prior_point_is_insufficient() {
        let mut snapshot = Snapshot::default();
        snapshot.append("s", entry("a", 1, "cargo", ns(10.0))).unwrap();
        let new = entry("b", 2, "cargo", ns(100.0));
        snapshot.append("s", new.clone()).unwrap();

        let record = detector().classify_entry(&snapshot, "s", &new).remove(0).unwrap();
        assert_eq!(record.classification, Classification::InsufficientData);
        assert_eq!(record.history_len, 1);
    }

    #[test]
    fn test_threshold_boundaries_resolve_low() {
        assert_eq!(classify_ratio(1.5, 1.5, 2.0), Classification::Ok);
        assert_eq!(classify_ratio(1.5000001, 1.5, 2.0), Classification::Warn);
        assert_eq!(classify_ratio(2.0, 1.5, 2.0), Classification::Warn);
        assert_eq!(classify_ratio(2.0000001, 1.5, 2.0), Classification::Alert);
    }

    #[test]
    fn test_bigger_is_better_inverts_ratio() {
        assert_eq!(regression_ratio(50.0, 100.0, Direction::BiggerIsBetter), Some(2.0));
        assert_eq!(regression_ratio(200.0, 100.0, Direction::SmallerIsBetter), Some(2.0));
        assert_eq!(regression_ratio(0.0, 100.0, Direction::BiggerIsBetter), None);
        assert_eq!(regression_ratio(10.0, 0.0, Direction::SmallerIsBetter), None);
    }

    #[test]
    fn test_unknown_direction_only_fails_that_measurement() {
        let mut snapshot = Snapshot::default();
        let benches = |v: f64| {
            vec![
                Measurement::new("known", v, "", "ns/iter"),
                Measurement::new("mystery", v, "", "widgets"),
            ]
        };
        snapshot.append("s", entry("a", 1, "mytool", benches(10.0))).unwrap();
        snapshot.append("s", entry("b", 2, "mytool", benches(10.0))).unwrap();
        let new = entry("c", 3, "mytool", benches(30.0));
        snapshot.append("s", new.clone()).unwrap();

        let mut config = RegressionConfig::default();
        config
            .unit_directions
            .insert("ns/iter".to_string(), Direction::SmallerIsBetter);
        let detector = RegressionDetector::new(config).unwrap();

        let results = detector.classify_entry(&snapshot, "s", &new);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap().classification, Classification::Alert);
        let err = results[1].as_ref().unwrap_err();
        assert_eq!(err.measurement_name, "mystery");
        assert!(matches!(err.reason, UnclassifiableReason::UnknownDirection { .. }));
    }

    #[test]
    fn test_measurement_override_beats_tool_default() {
        let mut config = RegressionConfig::default();
        config
            .directions
            .insert("throughput".to_string(), Direction::BiggerIsBetter);
        let m = Measurement::new("throughput", 1.0, "", "ns/iter");
        assert_eq!(config.direction_for("cargo", &m), Some(Direction::BiggerIsBetter));
        let m = Measurement::new("latency", 1.0, "", "ns/iter");
        assert_eq!(config.direction_for("cargo", &m), Some(Direction::SmallerIsBetter));
        assert_eq!(config.direction_for("unknown", &m), None);
    }

    #[test]
    fn test_window_limits_history() {
        let mut snapshot = Snapshot::default();
        // Old slow history that a short window should ignore
        snapshot.append("s", entry("a", 1, "cargo", ns(1000.0))).unwrap();
        snapshot.append("s", entry("b", 2, "cargo", ns(1000.0))).unwrap();
        snapshot.append("s", entry("c", 3, "cargo", ns(10.0))).unwrap();
        snapshot.append("s", entry("d", 4, "cargo", ns(10.0))).unwrap();
        let new = entry("e", 5, "cargo", ns(25.0));
        snapshot.append("s", new.clone()).unwrap();

        let detector = RegressionDetector::new(RegressionConfig {
            window: Some(2),
            ..RegressionConfig::default()
        })
        .unwrap();
        let record = detector.classify_entry(&snapshot, "s", &new).remove(0).unwrap();
        assert_eq!(record.baseline, Some(10.0));
        assert_eq!(record.classification, Classification::Alert);

        let all = RegressionDetector::new(RegressionConfig {
            window: None,
            ..RegressionConfig::default()
        })
        .unwrap();
        let record = all.classify_entry(&snapshot, "s", &new).remove(0).unwrap();
        assert_eq!(record.baseline, Some(505.0));
        assert_eq!(record.classification, Classification::Ok);
    }

    #[test]
    fn test_median_baseline_ignores_outlier() {
        let mut snapshot = Snapshot::default();
        snapshot.append("s", entry("a", 1, "cargo", ns(10.0))).unwrap();
        snapshot.append("s", entry("b", 2, "cargo", ns(1000.0))).unwrap();
        snapshot.append("s", entry("c", 3, "cargo", ns(10.0))).unwrap();
        let new = entry("d", 4, "cargo", ns(12.0));
        snapshot.append("s", new.clone()).unwrap();

        let detector = RegressionDetector::new(RegressionConfig {
            baseline: BaselineStatistic::Median,
            ..RegressionConfig::default()
        })
        .unwrap();
        let record = detector.classify_entry(&snapshot, "s", &new).remove(0).unwrap();
        assert_eq!(record.baseline, Some(10.0));
        assert_eq!(record.classification, Classification::Ok);
    }

    #[test]
    fn test_config_validation() {
        let inverted = RegressionConfig {
            warn_factor: 2.0,
            alert_factor: 1.5,
            ..RegressionConfig::default()
        };
        assert!(RegressionDetector::new(inverted).is_err());

        let zero_window = RegressionConfig {
            window: Some(0),
            ..RegressionConfig::default()
        };
        assert!(zero_window.validate().is_err());
    }

    #[test]
    fn test_percentage_factors_deserialize() {
        let config: RegressionConfig = serde_yaml::from_str(
            "warn_factor: \"150%\"\nalert_factor: 3\nbaseline: median\nwindow: 10\n",
        )
        .unwrap();
        assert_eq!(config.warn_factor, 1.5);
        assert_eq!(config.alert_factor, 3.0);
        assert_eq!(config.baseline, BaselineStatistic::Median);
        assert_eq!(config.window, Some(10));
        assert!(parse_factor("abc").is_err());
    }

    #[test]
    fn test_classification_serializes_screaming_case() {
        let json = serde_json::to_string(&Classification::InsufficientData).unwrap();
        assert_eq!(json, "\"INSUFFICIENT_DATA\"");
        assert!(Classification::Alert > Classification::Warn);
    }
}
