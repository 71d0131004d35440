//! Ingestion pipeline: parse → append → classify

use benchtrack_history::{CommitRef, Entry, HistoryError, HistoryStore};
use benchtrack_parsers::{ParseError, Tool};
use benchtrack_regression::{RegressionDetector, RegressionReport};
use thiserror::Error;
use tracing::{info, warn};

/// What to do when a commit is already recorded for the suite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Fail with [`HistoryError::DuplicateCommit`]
    #[default]
    Reject,
    /// Leave the history untouched and report the skip
    Skip,
}

/// One CI run to record
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub suite: String,
    pub tool: String,
    pub raw_output: String,
    pub commit: CommitRef,
    /// Ingestion time in epoch milliseconds; `None` stamps the time of commit
    pub date: Option<i64>,
}

/// Result of a successful ingestion
#[derive(Debug, Clone)]
pub enum IngestOutcome {
    Appended {
        report: RegressionReport,
        /// Read-append-swap cycles needed
        attempts: u32,
    },
    /// The commit was already recorded and [`DuplicatePolicy::Skip`] was set
    SkippedDuplicate { commit_id: String },
}

/// Ingestion errors
#[derive(Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    History(#[from] HistoryError),
}

/// Runs CI results through parser, store and detector
#[derive(Debug, Clone)]
pub struct Ingestor {
    store: HistoryStore,
    detector: RegressionDetector,
    duplicates: DuplicatePolicy,
}

impl Ingestor {
    pub fn new(store: HistoryStore, detector: RegressionDetector) -> Self {
        Self {
            store,
            detector,
            duplicates: DuplicatePolicy::default(),
        }
    }

    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicates = policy;
        self
    }

    pub fn store(&self) -> &HistoryStore {
        &self.store
    }

    pub fn detector(&self) -> &RegressionDetector {
        &self.detector
    }

    /// Parse, durably append and classify one run.
    ///
    /// Parse failures abort before the store is touched.
    pub fn ingest(&self, request: IngestRequest) -> Result<IngestOutcome, IngestError> {
        let tool: Tool = request.tool.parse()?;
        let benches = tool.parse(&request.raw_output)?;
        let entry = Entry::new(
            request.commit,
            request.date.unwrap_or_default(),
            tool.as_str(),
            benches,
        );

        let appended = match request.date {
            Some(_) => self.store.append(&request.suite, entry),
            None => self.store.append_at(&request.suite, entry, || {
                chrono::Utc::now().timestamp_millis()
            }),
        };
        let committed = match appended {
            Ok(committed) => committed,
            Err(HistoryError::DuplicateCommit { suite, commit_id })
                if self.duplicates == DuplicatePolicy::Skip =>
            {
                warn!(suite = %suite, commit = %commit_id, "Commit already recorded, skipping");
                return Ok(IngestOutcome::SkippedDuplicate { commit_id });
            }
            Err(e) => return Err(e.into()),
        };

        // Date may have been lifted past a concurrently committed entry
        let entry = &committed.value;
        let report = self.detector.report(&committed.snapshot, &request.suite, entry);
        let counts = report.counts();
        info!(
            suite = %request.suite,
            commit = %entry.commit.id,
            ok = counts.ok,
            warn = counts.warn,
            alert = counts.alert,
            insufficient = counts.insufficient_data,
            unclassified = counts.unclassified,
            "Classified benchmark entry"
        );

        Ok(IngestOutcome::Appended {
            report,
            attempts: committed.attempts,
        })
    }
}
