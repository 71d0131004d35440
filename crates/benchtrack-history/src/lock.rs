//! Exclusive writer lock guarding the compare-and-swap step
//!
//! An OS-level lock on a persistent `<snapshot>.lock` file. The file itself is
//! never removed; the operating system drops the lock when the holder exits,
//! so a crashed writer cannot leave the store locked.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;
use tracing::{debug, warn};

use crate::error::{HistoryError, HistoryResult, IoOperation};

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Exclusive lock held for the duration of one swap; unlocked on drop
#[derive(Debug)]
pub(crate) struct SnapshotLock {
    path: PathBuf,
    file: File,
}

impl SnapshotLock {
    /// Acquire the lock, waiting up to `wait`.
    ///
    /// Returns `Ok(None)` when another writer still holds it after `wait`.
    pub(crate) fn acquire(path: &Path, wait: Duration) -> HistoryResult<Option<Self>> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)
            .map_err(|e| HistoryError::io(path, IoOperation::Lock, e))?;

        let contended = fs2::lock_contended_error().raw_os_error();
        let deadline = Instant::now() + wait;

        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    debug!(lock = %path.display(), "Acquired snapshot lock");
                    return Ok(Some(Self {
                        path: path.to_path_buf(),
                        file,
                    }));
                }
                Err(e) if e.raw_os_error() == contended => {
                    if Instant::now() >= deadline {
                        return Ok(None);
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(e) => return Err(HistoryError::io(path, IoOperation::Lock, e)),
            }
        }
    }
}

impl Drop for SnapshotLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            warn!(lock = %self.path.display(), error = %e, "Failed to release snapshot lock");
        }
    }
}
