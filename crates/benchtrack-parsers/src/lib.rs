//! Benchmark output parsers for benchtrack
//!
//! Converts one CI run's raw benchmark tool output into an ordered list of
//! canonical [`Measurement`] records. Supported grammars:
//! - `cargo`: libtest `bench:` lines
//! - `go`: `go test -bench` result lines
//! - `benchmarkjs`: Benchmark.js `ops/sec` lines
//! - `customSmallerIsBetter` / `customBiggerIsBetter`: JSON arrays
//!
//! Parsing is a pure function of its input.

mod benchmarkjs;
mod cargo;
mod custom;
pub mod error;
mod go;
pub mod measurement;
pub mod tool;

pub use error::{ParseError, ParseResult};
pub use measurement::{Direction, Measurement};
pub use tool::{parse_output, Tool};
