//! Baseline statistics over a historical window

use benchtrack_history::Series;
use serde::{Deserialize, Serialize};

/// Statistic used as the comparison point for a new value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaselineStatistic {
    /// Arithmetic mean of the window
    #[default]
    Mean,
    /// Median of the window, robust against single outliers
    Median,
}

impl BaselineStatistic {
    /// Compute the statistic; `None` for an empty window
    pub fn compute(&self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        match self {
            BaselineStatistic::Mean => Some(values.iter().sum::<f64>() / values.len() as f64),
            BaselineStatistic::Median => {
                let mut sorted = values.to_vec();
                sorted.sort_by(|a, b| a.total_cmp(b));
                let mid = sorted.len() / 2;
                if sorted.len() % 2 == 0 {
                    Some((sorted[mid - 1] + sorted[mid]) / 2.0)
                } else {
                    Some(sorted[mid])
                }
            }
        }
    }
}

impl std::fmt::Display for BaselineStatistic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BaselineStatistic::Mean => write!(f, "mean"),
            BaselineStatistic::Median => write!(f, "median"),
        }
    }
}

/// Most recent historical values of a series, oldest first.
///
/// Points recorded for `exclude_commit` are skipped, and at most `window`
/// points are kept (`None` keeps every prior point).
pub fn historical_window(series: &Series<'_>, exclude_commit: &str, window: Option<usize>) -> Vec<f64> {
    let limit = window.unwrap_or(usize::MAX);
    let mut values: Vec<f64> = series
        .iter()
        .rev()
        .filter(|p| p.commit_id != exclude_commit)
        .take(limit)
        .map(|p| p.value)
        .collect();
    values.reverse();
    values
}
