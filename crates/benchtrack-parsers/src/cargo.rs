//! libtest / bencher-format output (`cargo bench`)

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{ParseError, ParseResult};
use crate::measurement::Measurement;
use crate::tool::parse_number;

static BENCH_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^test\s+(?P<name>.+?)\s+\.\.\.\s+bench:\s+(?P<value>[0-9][0-9,.]*)\s+(?P<unit>\S+)\s+\(\+/-\s+(?P<dev>[0-9][0-9,.]*)\)\s*$",
    )
    .expect("cargo bench pattern is valid")
});

pub(crate) fn parse(raw: &str) -> ParseResult<Vec<Measurement>> {
    let mut measurements = Vec::new();

    for line in raw.lines() {
        let line = line.trim_end();
        if !line.starts_with("test ") || !line.contains(" bench:") {
            continue;
        }
        let caps = BENCH_LINE
            .captures(line)
            .ok_or_else(|| ParseError::malformed("cargo", line))?;

        let name = caps["name"].trim();
        let value = parse_number(name, &caps["value"])?;
        let deviation: String = caps["dev"].chars().filter(|c| *c != ',').collect();

        measurements.push(Measurement::new(
            name,
            value,
            format!("± {}", deviation),
            &caps["unit"],
        ));
    }

    Ok(measurements)
}
