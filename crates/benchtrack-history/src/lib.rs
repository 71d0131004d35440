//! Append-only benchmark history for benchtrack
//!
//! Holds one ordered list of entries per benchmark suite and persists it as a
//! single snapshot document that dashboards can read directly. Every write
//! replaces the snapshot atomically, and concurrent writers are serialised
//! with a versioned compare-and-swap.

pub mod codec;
pub mod error;
mod lock;
pub mod model;
pub mod snapshot;
pub mod store;

pub use codec::{SnapshotFormat, SCRIPT_PREFIX};
pub use error::{HistoryError, HistoryResult, IoOperation};
pub use model::{CommitRef, Entry, Person};
pub use snapshot::{Series, SeriesIter, SeriesPoint, Snapshot, Suites};
pub use store::{Committed, HistoryStore, Loaded, StoreOptions, Version};

pub use benchtrack_parsers::Measurement;
