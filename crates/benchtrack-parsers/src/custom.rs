//! JSON arrays of pre-computed results (`customSmallerIsBetter`, `customBiggerIsBetter`)

use serde::Deserialize;

use crate::error::{ParseError, ParseResult};
use crate::measurement::Measurement;

#[derive(Debug, Deserialize)]
struct CustomResult {
    name: String,
    value: f64,
    unit: String,
    #[serde(default)]
    range: Option<String>,
    #[serde(default)]
    extra: Option<String>,
}

pub(crate) fn parse(tool: &str, raw: &str) -> ParseResult<Vec<Measurement>> {
    let results: Vec<CustomResult> =
        serde_json::from_str(raw).map_err(|_| ParseError::malformed(tool, raw))?;

    Ok(results
        .into_iter()
        .map(|r| Measurement {
            name: r.name.trim().to_string(),
            value: r.value,
            range: r.range.unwrap_or_default(),
            unit: r.unit,
            extra: r.extra,
        })
        .collect())
}
