//! Argument extraction helpers shared by the built-in tools.
//!
//! Tool arguments arrive as an open-ended JSON bag produced by the LLM;
//! every accessor returns a model-actionable message on failure so the tool
//! can surface it via `ToolResult::fail`.

use std::path::PathBuf;

use serde_json::Value;

pub fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, String> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("missing required argument '{key}'"))
}

pub fn required_path(args: &Value, key: &str) -> Result<PathBuf, String> {
    required_str(args, key).map(PathBuf::from)
}

pub fn optional_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

pub fn optional_u64(args: &Value, key: &str) -> Option<u64> {
    args.get(key).and_then(Value::as_u64)
}

pub fn optional_bool(args: &Value, key: &str) -> Option<bool> {
    args.get(key).and_then(Value::as_bool)
}

pub fn optional_f64(args: &Value, key: &str) -> Option<f64> {
    args.get(key).and_then(Value::as_f64)
}

pub fn string_array(args: &Value, key: &str) -> Result<Vec<String>, String> {
    match args.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| format!("'{key}' must be an array of strings"))
            })
            .collect(),
        Some(_) => Err(format!("'{key}' must be an array of strings")),
        None => Err(format!("missing required argument '{key}'")),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn required_str_reports_key() {
        let err = required_str(&json!({}), "path").unwrap_err();
        assert!(err.contains("'path'"));
        assert_eq!(required_str(&json!({"path": "/x"}), "path").unwrap(), "/x");
    }

    #[test]
    fn string_array_rejects_mixed_types() {
        assert!(string_array(&json!({"xs": ["a", 1]}), "xs").is_err());
        assert_eq!(
            string_array(&json!({"xs": ["a", "b"]}), "xs").unwrap(),
            vec!["a", "b"]
        );
    }
}
