//! `go test -bench` output

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{ParseError, ParseResult};
use crate::measurement::Measurement;
use crate::tool::parse_number;

static BENCH_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<name>Benchmark\S+?)(?:-(?P<procs>\d+))?\s+(?P<times>\d+)\s+(?P<rest>.+)$")
        .expect("go bench pattern is valid")
});

pub(crate) fn parse(raw: &str) -> ParseResult<Vec<Measurement>> {
    let mut measurements = Vec::new();

    for line in raw.lines() {
        let line = line.trim();
        if !line.starts_with("Benchmark") {
            continue;
        }
        let caps = BENCH_LINE
            .captures(line)
            .ok_or_else(|| ParseError::malformed("go", line))?;

        let name = &caps["name"];
        let procs = caps.name("procs").map_or("1", |m| m.as_str());
        let extra = format!("{} times\n{} procs", &caps["times"], procs);

        let fields: Vec<&str> = caps["rest"].split_whitespace().collect();
        if fields.is_empty() || fields.len() % 2 != 0 {
            return Err(ParseError::malformed("go", line));
        }

        let pairs: Vec<(&str, &str)> = fields.chunks(2).map(|c| (c[0], c[1])).collect();
        let single = pairs.len() == 1;
        for (value, unit) in pairs {
            let measurement_name = if single {
                name.to_string()
            } else {
                format!("{} - {}", name, unit)
            };
            let value = parse_number(&measurement_name, value)?;
            measurements.push(
                Measurement::new(measurement_name, value, "", unit).with_extra(extra.clone()),
            );
        }
    }

    Ok(measurements)
}
