//! Command-line surface of benchtrack
//!
//! Wires the parsers, the history store and the regression detector into a
//! single ingestion pipeline driven by [`config::TrackerConfig`].

pub mod config;
pub mod ingest;

pub use config::{ConfigError, ConfigFormat, ConfigLoader, EnvOverrides, StoreSettings, TrackerConfig};
pub use ingest::{DuplicatePolicy, IngestError, IngestOutcome, IngestRequest, Ingestor};
