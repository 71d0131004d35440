//! Benchmark regression detection for benchtrack
//!
//! Compares each measurement of a newly appended entry with a baseline
//! computed over the trailing window of its history:
//! - fewer than two prior points: `INSUFFICIENT_DATA`
//! - ratio at or below `warn_factor`: `OK`
//! - ratio at or below `alert_factor`: `WARN`
//! - otherwise: `ALERT`
//!
//! The ratio is oriented by the measurement's improvement direction so that
//! values above 1.0 always mean slower (or less throughput) than baseline.

pub mod baseline;
pub mod error;
pub mod regression;
pub mod report;

pub use baseline::{historical_window, BaselineStatistic};
pub use error::{RegressionError, RegressionResult, UnclassifiableError, UnclassifiableReason};
pub use regression::{
    classify_ratio, parse_factor, regression_ratio, Classification, ClassificationRecord,
    RegressionConfig, RegressionDetector, MIN_HISTORY,
};
pub use report::{ClassCounts, RegressionReport};
