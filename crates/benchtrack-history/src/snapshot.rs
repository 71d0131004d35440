//! In-memory snapshot of every suite's history
//!
//! A [`Snapshot`] is the logical document persisted by the store:
//!
//! ```text
//! { "lastUpdate": 1753033099579,
//!   "repoUrl": "https://github.com/org/repo",
//!   "entries": { "<suite>": [ <Entry>, ... ], ... } }
//! ```
//!
//! Suites keep the order they had in the loaded document; new suites are
//! appended at the end. Entries inside a suite are in non-decreasing `date`
//! order and are never reordered or edited.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;

use crate::error::{HistoryError, HistoryResult};
use crate::model::Entry;

/// Full durable representation of all suites' histories
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Largest entry `date` ever appended
    pub last_update: i64,
    /// Informational repository URL
    #[serde(default)]
    pub repo_url: String,
    /// Suite histories keyed by suite name
    #[serde(default)]
    pub entries: Suites,
}

impl Snapshot {
    pub fn new(repo_url: impl Into<String>) -> Self {
        Self {
            last_update: 0,
            repo_url: repo_url.into(),
            entries: Suites::default(),
        }
    }

    /// Append an entry to a suite, creating the suite on first use.
    ///
    /// Rejects a commit id already present in the suite, an entry older than
    /// the suite's latest entry, and entries with empty or repeated
    /// measurement names. A rejected entry leaves the snapshot untouched.
    pub fn append(&mut self, suite: &str, entry: Entry) -> HistoryResult<()> {
        if suite.trim().is_empty() {
            return Err(HistoryError::validation(suite, "suite name is empty"));
        }
        if let Some(name) = entry.invalid_name() {
            return Err(HistoryError::validation(
                suite,
                format!("measurement name '{}' is empty or repeated", name),
            ));
        }

        if let Some(history) = self.entries.get(suite) {
            if history.iter().any(|e| e.commit.id == entry.commit.id) {
                return Err(HistoryError::DuplicateCommit {
                    suite: suite.to_string(),
                    commit_id: entry.commit.id,
                });
            }
            if let Some(latest) = history.last() {
                if entry.date < latest.date {
                    return Err(HistoryError::validation(
                        suite,
                        format!(
                            "entry date {} is older than latest entry date {}",
                            entry.date, latest.date
                        ),
                    ));
                }
            }
        }

        debug!(suite, commit = %entry.commit.id, date = entry.date, "Appending entry");
        self.last_update = self.last_update.max(entry.date);
        self.entries.get_or_insert(suite).push(entry);
        Ok(())
    }

    /// Points of one measurement across a suite, oldest first.
    ///
    /// Unknown suites or measurement names yield an empty series.
    pub fn query<'a>(&'a self, suite: &str, measurement: &'a str) -> Series<'a> {
        Series {
            entries: self.entries.get(suite).unwrap_or(&[]),
            measurement,
        }
    }

    /// Suite names in document order
    pub fn suites(&self) -> impl Iterator<Item = &str> {
        self.entries.0.iter().map(|s| s.name.as_str())
    }

    /// Entries of a suite, oldest first
    pub fn entries(&self, suite: &str) -> &[Entry] {
        self.entries.get(suite).unwrap_or(&[])
    }

    /// Most recent entry of a suite
    pub fn latest(&self, suite: &str) -> Option<&Entry> {
        self.entries(suite).last()
    }

    /// Distinct measurement names of a suite in first-seen order
    pub fn measurement_names(&self, suite: &str) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for entry in self.entries(suite) {
            for m in &entry.benches {
                if !names.contains(&m.name.as_str()) {
                    names.push(&m.name);
                }
            }
        }
        names
    }

    /// Total number of entries across all suites
    pub fn entry_count(&self) -> usize {
        self.entries.0.iter().map(|s| s.entries.len()).sum()
    }

    /// Check the ordering invariant of a decoded document
    pub(crate) fn check_order(&self) -> Result<(), String> {
        for suite in &self.entries.0 {
            if let Some(pair) = suite.entries.windows(2).find(|w| w[1].date < w[0].date) {
                return Err(format!(
                    "suite '{}' has entry {} dated {} after an entry dated {}",
                    suite.name, pair[1].commit.id, pair[1].date, pair[0].date
                ));
            }
        }
        Ok(())
    }
}

/// One suite's ordered entries
#[derive(Debug, Clone, PartialEq)]
struct SuiteHistory {
    name: String,
    entries: Vec<Entry>,
}

/// Suite histories in document order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Suites(Vec<SuiteHistory>);

impl Suites {
    pub fn get(&self, suite: &str) -> Option<&[Entry]> {
        self.0
            .iter()
            .find(|s| s.name == suite)
            .map(|s| s.entries.as_slice())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn get_or_insert(&mut self, suite: &str) -> &mut Vec<Entry> {
        let index = match self.0.iter().position(|s| s.name == suite) {
            Some(index) => index,
            None => {
                self.0.push(SuiteHistory {
                    name: suite.to_string(),
                    entries: Vec::new(),
                });
                self.0.len() - 1
            }
        };
        &mut self.0[index].entries
    }
}

impl Serialize for Suites {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for suite in &self.0 {
            map.serialize_entry(&suite.name, &suite.entries)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Suites {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SuitesVisitor;

        impl<'de> Visitor<'de> for SuitesVisitor {
            type Value = Suites;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map from suite name to an array of entries")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Suites, A::Error> {
                let mut suites = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, entries)) = access.next_entry::<String, Vec<Entry>>()? {
                    if suites.iter().any(|s: &SuiteHistory| s.name == name) {
                        return Err(serde::de::Error::custom(format!(
                            "duplicate suite '{}'",
                            name
                        )));
                    }
                    suites.push(SuiteHistory { name, entries });
                }
                Ok(Suites(suites))
            }
        }

        deserializer.deserialize_map(SuitesVisitor)
    }
}

/// One point of a measurement's time series
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint<'a> {
    /// Ingestion time of the entry holding the point
    pub date: i64,
    pub value: f64,
    pub range: &'a str,
    pub unit: &'a str,
    /// Commit the point was recorded for
    pub commit_id: &'a str,
}

/// Lazy, restartable view over one measurement of one suite
#[derive(Debug, Clone, Copy)]
pub struct Series<'a> {
    entries: &'a [Entry],
    measurement: &'a str,
}

impl<'a> Series<'a> {
    /// Start a fresh pass over the series
    pub fn iter(&self) -> SeriesIter<'a> {
        SeriesIter {
            entries: self.entries.iter(),
            measurement: self.measurement,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Values of the series, oldest first
    pub fn values(&self) -> impl Iterator<Item = f64> + 'a {
        self.iter().map(|p| p.value)
    }
}

impl<'a> IntoIterator for Series<'a> {
    type Item = SeriesPoint<'a>;
    type IntoIter = SeriesIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a> IntoIterator for &Series<'a> {
    type Item = SeriesPoint<'a>;
    type IntoIter = SeriesIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over a [`Series`]
#[derive(Debug, Clone)]
pub struct SeriesIter<'a> {
    entries: std::slice::Iter<'a, Entry>,
    measurement: &'a str,
}

impl<'a> SeriesIter<'a> {
    fn point(entry: &'a Entry, measurement: &str) -> Option<SeriesPoint<'a>> {
        entry.measurement(measurement).map(|m| SeriesPoint {
            date: entry.date,
            value: m.value,
            range: &m.range,
            unit: &m.unit,
            commit_id: &entry.commit.id,
        })
    }
}

impl<'a> Iterator for SeriesIter<'a> {
    type Item = SeriesPoint<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let measurement = self.measurement;
        self.entries.find_map(|e| Self::point(e, measurement))
    }
}

impl<'a> DoubleEndedIterator for SeriesIter<'a> {
    fn next_back(&mut self) -> Option<Self::Item> {
        let measurement = self.measurement;
        self.entries
            .by_ref()
            .rev()
            .find_map(|e| Self::point(e, measurement))
    }
}

impl std::iter::FusedIterator for SeriesIter<'_> {}
