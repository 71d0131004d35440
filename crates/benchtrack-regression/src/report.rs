//! Per-entry aggregation of classification results

use std::fmt::Write as _;

use benchtrack_history::Entry;
use serde::Serialize;

use crate::error::UnclassifiableError;
use crate::regression::{Classification, ClassificationRecord};

/// Classification results for one entry, handed to alert emitters
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegressionReport {
    pub suite: String,
    pub commit_id: String,
    pub commit_url: String,
    pub date: i64,
    pub records: Vec<ClassificationRecord>,
    pub unclassified: Vec<UnclassifiableError>,
}

/// Number of records per class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassCounts {
    pub ok: usize,
    pub warn: usize,
    pub alert: usize,
    pub insufficient_data: usize,
    pub unclassified: usize,
}

impl RegressionReport {
    pub fn new(
        suite: &str,
        entry: &Entry,
        results: Vec<Result<ClassificationRecord, UnclassifiableError>>,
    ) -> Self {
        let mut records = Vec::with_capacity(results.len());
        let mut unclassified = Vec::new();
        for result in results {
            match result {
                Ok(record) => records.push(record),
                Err(e) => unclassified.push(e),
            }
        }

        Self {
            suite: suite.to_string(),
            commit_id: entry.commit.id.clone(),
            commit_url: entry.commit.url.clone(),
            date: entry.date,
            records,
            unclassified,
        }
    }

    pub fn has_alerts(&self) -> bool {
        self.records
            .iter()
            .any(|r| r.classification == Classification::Alert)
    }

    /// Most severe class among the records
    pub fn worst(&self) -> Option<Classification> {
        self.records.iter().map(|r| r.classification).max()
    }

    pub fn counts(&self) -> ClassCounts {
        let mut counts = ClassCounts {
            unclassified: self.unclassified.len(),
            ..ClassCounts::default()
        };
        for record in &self.records {
            match record.classification {
                Classification::Ok => counts.ok += 1,
                Classification::Warn => counts.warn += 1,
                Classification::Alert => counts.alert += 1,
                Classification::InsufficientData => counts.insufficient_data += 1,
            }
        }
        counts
    }

    /// Records at or above `min` severity
    pub fn at_least(&self, min: Classification) -> impl Iterator<Item = &ClassificationRecord> {
        self.records.iter().filter(move |r| r.classification >= min)
    }

    /// Markdown table of every record, suitable for a PR or commit comment
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        let short_id: String = self.commit_id.chars().take(7).collect();
        let _ = writeln!(out, "## Benchmark results for `{}` ({})", self.suite, short_id);
        let _ = writeln!(out);
        let _ = writeln!(out, "| Benchmark | Current | Baseline | Ratio | Status |");
        let _ = writeln!(out, "|-----------|---------|----------|-------|--------|");

        for r in &self.records {
            let baseline = r
                .baseline
                .map(|b| format!("{} {}", format_value(b), r.unit))
                .unwrap_or_else(|| "-".to_string());
            let ratio = r
                .ratio
                .map(|ratio| format!("{:.3}", ratio))
                .unwrap_or_else(|| "-".to_string());
            let _ = writeln!(
                out,
                "| `{}` | {} {} | {} | {} | {} |",
                r.measurement_name,
                format_value(r.new_value),
                r.unit,
                baseline,
                ratio,
                r.classification
            );
        }

        for e in &self.unclassified {
            let _ = writeln!(out, "| `{}` | - | - | - | UNCLASSIFIABLE: {} |", e.measurement_name, e.reason);
        }

        out
    }
}

fn format_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{:.3}", value)
    }
}
