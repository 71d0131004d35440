//! History store error types

use std::path::PathBuf;
use thiserror::Error;

/// Result type for history operations
pub type HistoryResult<T> = Result<T, HistoryError>;

/// History store error types
#[derive(Error, Debug)]
pub enum HistoryError {
    /// The commit has already been recorded for this suite
    #[error("Commit {commit_id} is already recorded in suite '{suite}'")]
    DuplicateCommit { suite: String, commit_id: String },

    /// The entry violates an ordering or uniqueness rule
    #[error("Invalid entry for suite '{suite}': {message}")]
    Validation { suite: String, message: String },

    /// Snapshot read/write/swap failed
    #[error("IO error on {path} ({operation}): {source}")]
    Io {
        path: PathBuf,
        operation: IoOperation,
        source: std::io::Error,
    },

    /// Snapshot document could not be decoded or encoded
    #[error("Malformed snapshot {path}: {message}")]
    Format { path: PathBuf, message: String },

    /// The snapshot changed underneath the writer
    #[error("Snapshot {path} changed concurrently (attempt {attempts})")]
    Conflict { path: PathBuf, attempts: u32 },
}

/// IO operation type for error context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoOperation {
    Read,
    Write,
    Swap,
    Lock,
}

impl std::fmt::Display for IoOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IoOperation::Read => write!(f, "read"),
            IoOperation::Write => write!(f, "write"),
            IoOperation::Swap => write!(f, "swap"),
            IoOperation::Lock => write!(f, "lock"),
        }
    }
}

impl HistoryError {
    pub fn validation(suite: impl Into<String>, message: impl Into<String>) -> Self {
        HistoryError::Validation {
            suite: suite.into(),
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, operation: IoOperation, source: std::io::Error) -> Self {
        HistoryError::Io {
            path: path.into(),
            operation,
            source,
        }
    }

    pub fn format(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        HistoryError::Format {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Whether the failure concerns durable storage rather than the entry itself
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            HistoryError::Io { .. } | HistoryError::Format { .. } | HistoryError::Conflict { .. }
        )
    }
}
