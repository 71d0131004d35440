//! Durable snapshot store with atomic swaps and optimistic concurrency
//!
//! Writers follow a read-modify-write cycle: [`HistoryStore::load`] returns
//! the snapshot together with the [`Version`] it was read at, and
//! [`HistoryStore::save`] swaps the new snapshot in only if the file still has
//! that version. Swaps write the whole document to a temporary file in the
//! same directory and rename it over the canonical path, so readers always
//! see either the previous or the new snapshot.

use std::fmt;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::codec::SnapshotFormat;
use crate::error::{HistoryError, HistoryResult, IoOperation};
use crate::lock::SnapshotLock;
use crate::model::Entry;
use crate::snapshot::Snapshot;

/// Tuning for the retry protocol
#[derive(Debug, Clone, PartialEq)]
pub struct StoreOptions {
    /// Extra read-append-swap cycles after a conflict
    pub max_retries: u32,
    /// Base sleep between cycles, multiplied by the attempt number
    pub retry_backoff: Duration,
    /// How long to wait for another writer's lock
    pub lock_wait: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            max_retries: 8,
            retry_backoff: Duration::from_millis(25),
            lock_wait: Duration::from_secs(2),
        }
    }
}

/// Identity of the on-disk snapshot a writer read from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version(Option<String>);

impl Version {
    /// No snapshot file exists yet
    pub fn absent() -> Self {
        Version(None)
    }

    /// SHA-256 fingerprint of the snapshot bytes
    pub fn of(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Version(Some(format!("{:x}", hasher.finalize())))
    }

    pub fn is_absent(&self) -> bool {
        self.0.is_none()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(hash) => f.write_str(&hash[..12.min(hash.len())]),
            None => f.write_str("absent"),
        }
    }
}

/// A snapshot together with the version it was read at
#[derive(Debug, Clone)]
pub struct Loaded {
    pub snapshot: Snapshot,
    pub version: Version,
}

/// Outcome of a committed read-modify-write cycle
#[derive(Debug, Clone)]
pub struct Committed<T> {
    /// Value returned by the mutation
    pub value: T,
    /// Snapshot as swapped in
    pub snapshot: Snapshot,
    /// Version of the swapped-in file
    pub version: Version,
    /// Number of cycles it took, starting at 1
    pub attempts: u32,
}

/// Snapshot file plus its encoding and retry policy
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
    format: SnapshotFormat,
    repo_url: String,
    options: StoreOptions,
}

impl HistoryStore {
    /// Store backed by `path`; the encoding follows the file extension
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            format: SnapshotFormat::from_path(&path),
            path,
            repo_url: String::new(),
            options: StoreOptions::default(),
        }
    }

    pub fn with_options(mut self, options: StoreOptions) -> Self {
        self.options = options;
        self
    }

    /// Repository URL recorded in a snapshot created by this store
    pub fn with_repo_url(mut self, repo_url: impl Into<String>) -> Self {
        self.repo_url = repo_url.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> SnapshotFormat {
        self.format
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".lock");
        self.path.with_file_name(name)
    }

    /// Read the current snapshot.
    ///
    /// A missing file yields an empty snapshot at [`Version::absent`]. A file
    /// that cannot be fully decoded is an error; nothing partial is returned.
    pub fn load(&self) -> HistoryResult<Loaded> {
        match self.read_bytes()? {
            Some(bytes) => {
                let snapshot = self.format.decode(&bytes, &self.path)?;
                let version = Version::of(&bytes);
                debug!(path = %self.path.display(), %version, "Loaded snapshot");
                Ok(Loaded { snapshot, version })
            }
            None => Ok(Loaded {
                snapshot: Snapshot::new(self.repo_url.clone()),
                version: Version::absent(),
            }),
        }
    }

    /// Version of the file currently on disk
    pub fn version(&self) -> HistoryResult<Version> {
        Ok(self
            .read_bytes()?
            .map_or_else(Version::absent, |bytes| Version::of(&bytes)))
    }

    /// Swap `loaded.snapshot` in if the file is still at `loaded.version`.
    ///
    /// Returns [`HistoryError::Conflict`] when another writer got there
    /// first or holds the lock; the file is left untouched in that case.
    pub fn save(&self, loaded: &Loaded) -> HistoryResult<Version> {
        let bytes = self.format.encode(&loaded.snapshot, &self.path)?;

        let dir = self.parent_dir();
        fs::create_dir_all(&dir).map_err(|e| HistoryError::io(&dir, IoOperation::Write, e))?;

        let lock_path = self.lock_path();
        let _lock = match SnapshotLock::acquire(&lock_path, self.options.lock_wait)? {
            Some(lock) => lock,
            None => {
                return Err(HistoryError::Conflict {
                    path: self.path.clone(),
                    attempts: 1,
                })
            }
        };

        let current = self.version()?;
        if current != loaded.version {
            debug!(
                path = %self.path.display(),
                expected = %loaded.version,
                found = %current,
                "Snapshot changed since load"
            );
            return Err(HistoryError::Conflict {
                path: self.path.clone(),
                attempts: 1,
            });
        }

        self.write_atomic(&bytes)?;
        let version = Version::of(&bytes);
        debug!(path = %self.path.display(), %version, "Swapped in snapshot");
        Ok(version)
    }

    /// Run a read-modify-write cycle, retrying on conflict.
    ///
    /// `mutate` may run several times, each time against a freshly loaded
    /// snapshot. An error from `mutate` aborts without writing.
    pub fn update<T, F>(&self, mut mutate: F) -> HistoryResult<Committed<T>>
    where
        F: FnMut(&mut Snapshot) -> HistoryResult<T>,
    {
        let max_attempts = self.options.max_retries + 1;

        for attempt in 1..=max_attempts {
            let mut loaded = self.load()?;
            let value = mutate(&mut loaded.snapshot)?;

            match self.save(&loaded) {
                Ok(version) => {
                    return Ok(Committed {
                        value,
                        snapshot: loaded.snapshot,
                        version,
                        attempts: attempt,
                    })
                }
                Err(HistoryError::Conflict { .. }) if attempt < max_attempts => {
                    warn!(
                        path = %self.path.display(),
                        attempt,
                        "Concurrent snapshot update, retrying"
                    );
                    std::thread::sleep(self.options.retry_backoff * attempt);
                }
                Err(HistoryError::Conflict { path, .. }) => {
                    return Err(HistoryError::Conflict {
                        path,
                        attempts: attempt,
                    })
                }
                Err(e) => return Err(e),
            }
        }

        Err(HistoryError::Conflict {
            path: self.path.clone(),
            attempts: max_attempts,
        })
    }

    /// Durably append one entry to a suite, returning the entry as stored.
    ///
    /// The first cycle validates the entry as given. An entry that passed
    /// against the snapshot it was first read with is never dropped because a
    /// racing writer committed a newer one: on a retry its `date` is raised to
    /// the suite's latest `date` so the suite stays ordered.
    pub fn append(&self, suite: &str, entry: Entry) -> HistoryResult<Committed<Entry>> {
        let mut cycle = 0u32;
        self.commit_entry(suite, |snapshot| {
            cycle += 1;
            stage_append(snapshot, suite, &entry, cycle > 1)
        })
    }

    /// Durably append one entry, stamping its `date` from `clock` at commit time.
    ///
    /// The stamp is taken on every cycle and never falls behind the suite's
    /// latest `date`, so concurrent ingestions all land in commit order.
    pub fn append_at<C>(
        &self,
        suite: &str,
        entry: Entry,
        mut clock: C,
    ) -> HistoryResult<Committed<Entry>>
    where
        C: FnMut() -> i64,
    {
        self.commit_entry(suite, |snapshot| {
            let mut stored = entry.clone();
            stored.date = clock();
            lift_date(snapshot, suite, &mut stored);
            snapshot.append(suite, stored.clone())?;
            Ok(stored)
        })
    }

    fn commit_entry<F>(&self, suite: &str, stage: F) -> HistoryResult<Committed<Entry>>
    where
        F: FnMut(&mut Snapshot) -> HistoryResult<Entry>,
    {
        let committed = self.update(stage)?;
        info!(
            suite,
            commit = %committed.value.commit.id,
            date = committed.value.date,
            attempts = committed.attempts,
            last_update = committed.snapshot.last_update,
            "Appended benchmark entry"
        );
        Ok(committed)
    }

    fn read_bytes(&self) -> HistoryResult<Option<Vec<u8>>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(HistoryError::io(&self.path, IoOperation::Read, e)),
        }
    }

    fn parent_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    fn write_atomic(&self, bytes: &[u8]) -> HistoryResult<()> {
        let dir = self.parent_dir();

        // Dropped (and deleted) on any early return below
        let mut temp =
            NamedTempFile::new_in(&dir).map_err(|e| HistoryError::io(&dir, IoOperation::Write, e))?;
        temp.write_all(bytes)
            .and_then(|_| temp.as_file().sync_all())
            .map_err(|e| HistoryError::io(temp.path(), IoOperation::Write, e))?;

        temp.persist(&self.path)
            .map_err(|e| HistoryError::io(&self.path, IoOperation::Swap, e.error))?;

        #[cfg(unix)]
        fs::File::open(&dir)
            .and_then(|d| d.sync_all())
            .map_err(|e| HistoryError::io(&dir, IoOperation::Swap, e))?;

        Ok(())
    }
}

/// Append a copy of `entry`; on a retry, lift its date to the suite's latest
fn stage_append(
    snapshot: &mut Snapshot,
    suite: &str,
    entry: &Entry,
    retry: bool,
) -> HistoryResult<Entry> {
    let mut stored = entry.clone();
    if retry {
        lift_date(snapshot, suite, &mut stored);
    }
    snapshot.append(suite, stored.clone())?;
    Ok(stored)
}

fn lift_date(snapshot: &Snapshot, suite: &str, entry: &mut Entry) {
    if let Some(latest) = snapshot.latest(suite) {
        if entry.date < latest.date {
            debug!(
                suite,
                commit = %entry.commit.id,
                from = entry.date,
                to = latest.date,
                "Raising entry date past newer committed entry"
            );
            entry.date = latest.date;
        }
    }
}
