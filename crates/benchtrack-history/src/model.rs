//! Commit and entry records

use std::collections::HashSet;

use benchtrack_parsers::Measurement;
use serde::{Deserialize, Serialize};

/// Author or committer identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub email: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// Identity of the code state under test, as resolved by the CI/VCS side
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRef {
    pub author: Person,
    pub committer: Person,
    /// Whether the commit was uniquely associated with this CI trigger
    #[serde(default)]
    pub distinct: bool,
    /// Content hash
    pub id: String,
    pub message: String,
    /// Source-control timestamp, as produced by the VCS
    pub timestamp: String,
    #[serde(default)]
    pub tree_id: String,
    pub url: String,
}

/// One ingestion event for one suite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub commit: CommitRef,
    /// Ingestion time in epoch milliseconds
    pub date: i64,
    /// Identifier of the measurement harness
    pub tool: String,
    pub benches: Vec<Measurement>,
}

impl Entry {
    pub fn new(commit: CommitRef, date: i64, tool: impl Into<String>, benches: Vec<Measurement>) -> Self {
        Self {
            commit,
            date,
            tool: tool.into(),
            benches,
        }
    }

    /// Measurement with the given name, if present
    pub fn measurement(&self, name: &str) -> Option<&Measurement> {
        self.benches.iter().find(|m| m.name == name)
    }

    /// First measurement name that is empty or repeated
    pub(crate) fn invalid_name(&self) -> Option<&str> {
        let mut seen = HashSet::with_capacity(self.benches.len());
        self.benches
            .iter()
            .map(|m| m.name.as_str())
            .find(|name| name.trim().is_empty() || !seen.insert(*name))
    }
}
