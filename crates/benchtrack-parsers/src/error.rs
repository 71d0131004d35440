//! Parse error types for benchmark tool output

use thiserror::Error;

/// Result type for parse operations
pub type ParseResult<T> = Result<T, ParseError>;

/// Longest raw fragment carried by an error
const MAX_FRAGMENT_LEN: usize = 240;

/// Errors produced while turning raw tool output into measurements
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// The tool identifier does not select any known grammar
    #[error("Unknown benchmark tool '{tool}'")]
    UnknownTool { tool: String },

    /// A line looked like a benchmark result but did not match the grammar
    #[error("Malformed {tool} output: {fragment}")]
    Malformed { tool: String, fragment: String },

    /// The grammar found nothing to extract
    #[error("No {tool} measurements found in output: {fragment}")]
    NoMeasurements { tool: String, fragment: String },

    /// A value parsed to NaN or an infinity, or did not parse as a number
    #[error("Invalid value for '{name}': {fragment}")]
    InvalidValue { name: String, fragment: String },

    /// A measurement name was empty after trimming
    #[error("Empty measurement name in: {fragment}")]
    EmptyName { fragment: String },

    /// Two measurements in one run share a name
    #[error("Duplicate measurement name '{name}'")]
    DuplicateName { name: String, fragment: String },
}

impl ParseError {
    pub fn malformed(tool: &str, fragment: &str) -> Self {
        ParseError::Malformed {
            tool: tool.to_string(),
            fragment: clip(fragment),
        }
    }

    pub fn no_measurements(tool: &str, fragment: &str) -> Self {
        ParseError::NoMeasurements {
            tool: tool.to_string(),
            fragment: clip(fragment),
        }
    }

    pub fn invalid_value(name: &str, fragment: &str) -> Self {
        ParseError::InvalidValue {
            name: name.to_string(),
            fragment: clip(fragment),
        }
    }

    /// The raw input fragment the error concerns, if any
    pub fn fragment(&self) -> Option<&str> {
        match self {
            ParseError::UnknownTool { .. } => None,
            ParseError::Malformed { fragment, .. }
            | ParseError::NoMeasurements { fragment, .. }
            | ParseError::InvalidValue { fragment, .. }
            | ParseError::EmptyName { fragment }
            | ParseError::DuplicateName { fragment, .. } => Some(fragment),
        }
    }
}

/// Trim a raw fragment to something printable in one log line
pub(crate) fn clip(fragment: &str) -> String {
    let trimmed = fragment.trim();
    if trimmed.len() <= MAX_FRAGMENT_LEN {
        return trimmed.to_string();
    }
    let mut end = MAX_FRAGMENT_LEN;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &trimmed[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_keeps_short_fragments() {
        assert_eq!(clip("  test a ... bench: x  "), "test a ... bench: x");
    }

    #[test]
    fn test_clip_truncates_on_char_boundary() {
        let long = "±".repeat(200);
        let clipped = clip(&long);
        assert!(clipped.ends_with("..."));
        assert!(clipped.len() <= MAX_FRAGMENT_LEN + 3);
    }

    #[test]
    fn test_fragment_accessor() {
        let err = ParseError::malformed("cargo", "test x ... bench: ???");
        assert_eq!(err.fragment(), Some("test x ... bench: ???"));
        let err = ParseError::UnknownTool {
            tool: "jmh".to_string(),
        };
        assert_eq!(err.fragment(), None);
    }
}
