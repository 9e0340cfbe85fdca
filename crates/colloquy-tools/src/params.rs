//! Shared argument extraction helpers.
//!
//! Tools validate their own arguments; these helpers keep the error messages
//! uniform ("missing required ... field `x`") across the built-in set.

use serde_json::Value;

use colloquy_engine::ToolError;

/// Extract a required string field.
pub fn require_str<'a>(
    arguments: &'a Value,
    field: &str,
    tool_name: &str,
) -> Result<&'a str, ToolError> {
    arguments
        .get(field)
        .and_then(|v| v.as_str())
        .ok_or_else(|| ToolError::InvalidParams {
            tool_name: tool_name.into(),
            reason: format!("missing required string field `{field}`"),
        })
}

/// Extract a required numeric field.
pub fn require_f64(arguments: &Value, field: &str, tool_name: &str) -> Result<f64, ToolError> {
    arguments
        .get(field)
        .and_then(|v| v.as_f64())
        .ok_or_else(|| ToolError::InvalidParams {
            tool_name: tool_name.into(),
            reason: format!("missing required number field `{field}`"),
        })
}

/// Extract an optional positive integer field with a default.
pub fn optional_usize(arguments: &Value, field: &str, default: usize) -> usize {
    arguments
        .get(field)
        .and_then(|v| v.as_u64())
        .map(|v| v as usize)
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn require_str_reports_the_field_name() {
        let err = require_str(&json!({}), "query", "web_search").unwrap_err();
        assert!(err.to_string().contains("`query`"));
    }

    #[test]
    fn require_f64_accepts_integers() {
        assert_eq!(require_f64(&json!({"a": 3}), "a", "calculator").unwrap(), 3.0);
    }

    #[test]
    fn optional_usize_falls_back_on_zero_or_missing() {
        assert_eq!(optional_usize(&json!({}), "k", 3), 3);
        assert_eq!(optional_usize(&json!({"k": 0}), "k", 3), 3);
        assert_eq!(optional_usize(&json!({"k": 7}), "k", 3), 7);
    }
}
