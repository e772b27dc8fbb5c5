//! Count update parsing.
//!
//! # Format
//!
//! ```json
//! { "count": 1234, "anything": "else" }
//! ```
//!
//! Extra fields are ignored. A missing or non-numeric `count` is not an
//! error; the message is simply not a count update.

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;
use serde_json::{Value, from_str};

use crate::error::{Error, Result};

// ============================================================================
// CountUpdate
// ============================================================================

/// A pushed message that may carry a counter value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CountUpdate {
    /// Raw `count` field, if present.
    #[serde(default)]
    pub count: Option<Value>,
}

impl CountUpdate {
    /// Returns the count if it is a JSON number.
    #[inline]
    #[must_use]
    pub fn value(&self) -> Option<f64> {
        self.count.as_ref().and_then(Value::as_f64)
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Parses a text frame into a count value.
///
/// Returns `Ok(None)` for well-formed objects without a numeric `count`.
///
/// # Errors
///
/// - [`Error::Json`] if the text is not JSON
/// - [`Error::Protocol`] if the JSON is not an object
pub fn parse_count(text: &str) -> Result<Option<f64>> {
    let value: Value = from_str(text)?;

    if !value.is_object() {
        return Err(Error::protocol(format!(
            "expected a JSON object, got {}",
            json_kind(&value)
        )));
    }

    let update = CountUpdate::deserialize(value)?;
    Ok(update.value())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_count() {
        assert_eq!(parse_count(r#"{"count": 42}"#).unwrap(), Some(42.0));
    }

    #[test]
    fn test_fractional_count() {
        assert_eq!(parse_count(r#"{"count": 1.5}"#).unwrap(), Some(1.5));
    }

    #[test]
    fn test_extra_fields_ignored() {
        let text = r#"{"type": "update", "count": 7, "ts": 1700000000}"#;
        assert_eq!(parse_count(text).unwrap(), Some(7.0));
    }

    #[test]
    fn test_missing_count_is_not_an_error() {
        assert_eq!(parse_count(r#"{"status": "ok"}"#).unwrap(), None);
        assert_eq!(parse_count("{}").unwrap(), None);
    }

    #[test]
    fn test_non_numeric_count_ignored() {
        assert_eq!(parse_count(r#"{"count": "12"}"#).unwrap(), None);
        assert_eq!(parse_count(r#"{"count": null}"#).unwrap(), None);
    }

    #[test]
    fn test_not_json() {
        let err = parse_count("hello").unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_not_an_object() {
        let err = parse_count("[1, 2]").unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
        assert!(err.to_string().contains("an array"));
    }
}
