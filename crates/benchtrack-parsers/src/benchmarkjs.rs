//! Benchmark.js console output

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{ParseError, ParseResult};
use crate::measurement::Measurement;
use crate::tool::parse_number;

static BENCH_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<name>.+?) x (?P<value>[0-9][0-9,.]*) (?P<unit>\S+) ±(?P<pct>[0-9.]+)% \((?P<runs>\d+) runs? sampled\)\s*$",
    )
    .expect("benchmark.js pattern is valid")
});

pub(crate) fn parse(raw: &str) -> ParseResult<Vec<Measurement>> {
    let mut measurements = Vec::new();

    for line in raw.lines() {
        let line = line.trim();
        if !line.contains(" sampled)") {
            continue;
        }
        let caps = BENCH_LINE
            .captures(line)
            .ok_or_else(|| ParseError::malformed("benchmarkjs", line))?;

        let name = caps["name"].trim();
        let value = parse_number(name, &caps["value"])?;
        measurements.push(
            Measurement::new(name, value, format!("±{}%", &caps["pct"]), &caps["unit"])
                .with_extra(format!("{} samples", &caps["runs"])),
        );
    }

    Ok(measurements)
}
