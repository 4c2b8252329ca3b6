//! Command implementations for the exthost CLI.
//!
//! Each submodule implements the logic for a command group.

pub mod config;
pub mod install;
pub mod keys;
pub mod settings;
pub mod state;

use serde_json::Value;

/// Parse a CLI value as JSON, treating anything unparsable as a plain string
pub(crate) fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Render a value for terminal output; strings print without quotes
pub(crate) fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("42"), json!(42));
        assert_eq!(parse_value("true"), json!(true));
        assert_eq!(parse_value(r#"{"a":1}"#), json!({"a": 1}));
        assert_eq!(parse_value("dark"), json!("dark"));
        assert_eq!(parse_value(r#""quoted""#), json!("quoted"));
    }

    #[test]
    fn test_display_value() {
        assert_eq!(display_value(&json!("dark")), "dark");
        assert_eq!(display_value(&json!([1, 2])), "[1,2]");
    }
}
