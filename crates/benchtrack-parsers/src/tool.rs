//! Tool identifiers and grammar dispatch

use std::collections::HashSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{clip, ParseError, ParseResult};
use crate::measurement::{Direction, Measurement};
use crate::{benchmarkjs, cargo, custom, go};

/// Benchmark harness whose output format is understood
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tool {
    #[serde(rename = "cargo")]
    Cargo,
    #[serde(rename = "go")]
    Go,
    #[serde(rename = "benchmarkjs")]
    BenchmarkJs,
    #[serde(rename = "customSmallerIsBetter")]
    CustomSmallerIsBetter,
    #[serde(rename = "customBiggerIsBetter")]
    CustomBiggerIsBetter,
}

impl Tool {
    /// All known tools
    pub fn all() -> &'static [Tool] {
        &[
            Tool::Cargo,
            Tool::Go,
            Tool::BenchmarkJs,
            Tool::CustomSmallerIsBetter,
            Tool::CustomBiggerIsBetter,
        ]
    }

    /// Identifier as stored in the `tool` field of an entry
    pub fn as_str(&self) -> &'static str {
        match self {
            Tool::Cargo => "cargo",
            Tool::Go => "go",
            Tool::BenchmarkJs => "benchmarkjs",
            Tool::CustomSmallerIsBetter => "customSmallerIsBetter",
            Tool::CustomBiggerIsBetter => "customBiggerIsBetter",
        }
    }

    /// Default improvement direction for every measurement this tool emits
    pub fn direction(&self) -> Direction {
        match self {
            Tool::Cargo | Tool::Go | Tool::CustomSmallerIsBetter => Direction::SmallerIsBetter,
            Tool::BenchmarkJs | Tool::CustomBiggerIsBetter => Direction::BiggerIsBetter,
        }
    }

    /// Parse raw output with this tool's grammar.
    ///
    /// The result is non-empty, names are non-empty and unique, and every
    /// value is finite.
    pub fn parse(&self, raw: &str) -> ParseResult<Vec<Measurement>> {
        let measurements = match self {
            Tool::Cargo => cargo::parse(raw)?,
            Tool::Go => go::parse(raw)?,
            Tool::BenchmarkJs => benchmarkjs::parse(raw)?,
            Tool::CustomSmallerIsBetter | Tool::CustomBiggerIsBetter => {
                custom::parse(self.as_str(), raw)?
            }
        };

        if measurements.is_empty() {
            return Err(ParseError::no_measurements(self.as_str(), raw));
        }
        validate(&measurements)?;

        debug!(
            tool = self.as_str(),
            count = measurements.len(),
            "Parsed benchmark output"
        );
        Ok(measurements)
    }
}

impl FromStr for Tool {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tool::all()
            .iter()
            .copied()
            .find(|tool| tool.as_str() == s)
            .ok_or_else(|| ParseError::UnknownTool {
                tool: s.to_string(),
            })
    }
}

impl std::fmt::Display for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse raw output for a tool given by identifier
pub fn parse_output(tool: &str, raw: &str) -> ParseResult<Vec<Measurement>> {
    tool.parse::<Tool>()?.parse(raw)
}

fn validate(measurements: &[Measurement]) -> ParseResult<()> {
    let mut seen = HashSet::with_capacity(measurements.len());
    for m in measurements {
        if m.name.trim().is_empty() {
            return Err(ParseError::EmptyName {
                fragment: clip(&format!("{} {}", m.value, m.unit)),
            });
        }
        if !m.value.is_finite() {
            return Err(ParseError::invalid_value(&m.name, &m.value.to_string()));
        }
        if !seen.insert(m.name.as_str()) {
            return Err(ParseError::DuplicateName {
                name: m.name.clone(),
                fragment: clip(&m.name),
            });
        }
    }
    Ok(())
}

/// Parse a number that may carry `,` thousands separators
pub(crate) fn parse_number(name: &str, raw: &str) -> ParseResult<f64> {
    let cleaned: String = raw.chars().filter(|c| *c != ',').collect();
    match cleaned.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(ParseError::invalid_value(name, raw)),
    }
}
