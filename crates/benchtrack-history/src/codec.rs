//! On-disk encodings of a snapshot

use std::path::Path;

use crate::error::{HistoryError, HistoryResult};
use crate::snapshot::Snapshot;

/// Assignment prefix of the dashboard script encoding
pub const SCRIPT_PREFIX: &str = "window.BENCHMARK_DATA = ";

/// Snapshot file encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotFormat {
    /// Plain JSON document
    Json,
    /// JSON document assigned to `window.BENCHMARK_DATA`, loadable by a static page
    Script,
}

impl SnapshotFormat {
    /// Pick the encoding from the file extension (`.js` → script, otherwise JSON)
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("js") => SnapshotFormat::Script,
            _ => SnapshotFormat::Json,
        }
    }

    pub fn encode(&self, snapshot: &Snapshot, path: &Path) -> HistoryResult<Vec<u8>> {
        let json = serde_json::to_string_pretty(snapshot)
            .map_err(|e| HistoryError::format(path, format!("failed to encode: {}", e)))?;
        Ok(match self {
            SnapshotFormat::Json => {
                let mut bytes = json.into_bytes();
                bytes.push(b'\n');
                bytes
            }
            SnapshotFormat::Script => format!("{}{}", SCRIPT_PREFIX, json).into_bytes(),
        })
    }

    /// Decode a document and check its ordering invariant
    pub fn decode(&self, bytes: &[u8], path: &Path) -> HistoryResult<Snapshot> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| HistoryError::format(path, format!("not UTF-8: {}", e)))?;

        let body = match self {
            SnapshotFormat::Json => text,
            SnapshotFormat::Script => text
                .trim_start()
                .strip_prefix(SCRIPT_PREFIX.trim_end())
                .ok_or_else(|| {
                    HistoryError::format(path, format!("missing '{}' prefix", SCRIPT_PREFIX.trim_end()))
                })?
                .trim()
                .trim_end_matches(';'),
        };

        let snapshot: Snapshot = serde_json::from_str(body)
            .map_err(|e| HistoryError::format(path, e.to_string()))?;
        snapshot
            .check_order()
            .map_err(|message| HistoryError::format(path, message))?;
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATA_JS: &str = r#"window.BENCHMARK_DATA = {
  "lastUpdate": 1753033099579,
  "repoUrl": "https://github.com/julienbrs/ethrex",
  "entries": {
    "Benchmark": [
      {
        "commit": {
          "author": {"email": "a@example.com", "name": "A", "username": "a"},
          "committer": {"email": "noreply@github.com", "name": "GitHub", "username": "web-flow"},
          "distinct": true,
          "id": "ce5c47df70fa92c91814f36df65c01a090b19de1",
          "message": "fix(l2): estimate gas",
          "timestamp": "2025-07-18T22:01:22Z",
          "tree_id": "77ef3295f487c841398d311894bdbbe16ec60cc8",
          "url": "https://github.com/julienbrs/ethrex/commit/ce5c47df70fa92c91814f36df65c01a090b19de1"
        },
        "date": 1753033097899,
        "tool": "cargo",
        "benches": [
          {
            "name": "Block import/Block import ERC20 transfers",
            "value": 209986143901,
            "range": "± 397557034",
            "unit": "ns/iter"
          }
        ]
      }
    ]
  }
}"#;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(SnapshotFormat::from_path(Path::new("data.js")), SnapshotFormat::Script);
        assert_eq!(SnapshotFormat::from_path(Path::new("data.json")), SnapshotFormat::Json);
        assert_eq!(SnapshotFormat::from_path(Path::new("data")), SnapshotFormat::Json);
    }

    #[test]
    fn test_decode_dashboard_script() {
        let path = Path::new("data.js");
        let snapshot = SnapshotFormat::Script.decode(DATA_JS.as_bytes(), path).unwrap();
        assert_eq!(snapshot.last_update, 1753033099579);
        assert_eq!(snapshot.repo_url, "https://github.com/julienbrs/ethrex");
        let latest = snapshot.latest("Benchmark").unwrap();
        assert_eq!(latest.benches[0].value, 209986143901.0);
    }

    #[test]
    fn test_script_round_trip_is_byte_stable() {
        let path = Path::new("data.js");
        let snapshot = SnapshotFormat::Script.decode(DATA_JS.as_bytes(), path).unwrap();
        let encoded = SnapshotFormat::Script.encode(&snapshot, path).unwrap();
        let again = SnapshotFormat::Script.decode(&encoded, path).unwrap();
        assert_eq!(again, snapshot);
        let reencoded = SnapshotFormat::Script.encode(&again, path).unwrap();
        assert_eq!(encoded, reencoded);
        assert!(String::from_utf8(encoded).unwrap().contains("\"value\": 209986143901,"));
    }

    #[test]
    fn test_script_without_prefix_is_format_error() {
        let err = SnapshotFormat::Script
            .decode(b"{\"lastUpdate\": 0}", Path::new("data.js"))
            .unwrap_err();
        assert!(matches!(err, HistoryError::Format { .. }));
    }

    #[test]
    fn test_truncated_document_is_format_error() {
        let truncated = &DATA_JS.as_bytes()[..DATA_JS.len() / 2];
        let err = SnapshotFormat::Script
            .decode(truncated, Path::new("data.js"))
            .unwrap_err();
        assert!(matches!(err, HistoryError::Format { .. }));
    }
}
