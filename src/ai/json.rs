//! Parsing helpers for free-form model output
//!
//! Models prepend prose, wrap answers in code fences, or emit a reasoning
//! block before the answer. These helpers recover the part we need.

use crate::error::{DocsortError, Result};
use serde_json::{Map, Value};

/// Opening marker of a reasoning block
pub const THINK_OPEN: &str = "<think>";

/// Closing marker of a reasoning block
pub const THINK_CLOSE: &str = "</think>";

/// Drop a leading `<think>...</think>` block and trim the rest
pub fn filter_thinking(text: &str) -> String {
    if let Some(close) = text.find(THINK_CLOSE) {
        if text[..close].contains(THINK_OPEN) {
            return text[close + THINK_CLOSE.len()..].trim().to_string();
        }
    }
    text.trim().to_string()
}

/// Byte range of the balanced `{...}` region starting at `start`
///
/// Braces inside JSON string literals are not counted.
fn balanced_object_end(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(start + offset);
                }
            }
            _ => {}
        }
    }
    None
}

/// Extract the first balanced `{...}` region that parses as a JSON object
///
/// Candidates are tried in order of their opening brace, so prose such as
/// "use {braces} carefully" before the real answer does not hide it.
pub fn extract_json_object(text: &str) -> Result<Map<String, Value>> {
    for (start, _) in text.match_indices('{') {
        let Some(end) = balanced_object_end(text, start) else {
            continue;
        };
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&text[start..=end]) {
            return Ok(map);
        }
    }
    Err(DocsortError::MalformedOutput(
        "No JSON object found in response".to_string(),
    ))
}

/// Read a non-empty string field from a parsed object
pub fn string_field(object: &Map<String, Value>, field: &str) -> Option<String> {
    object
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_object_after_prose() {
        let text = r#"Sure! Here is my answer: {"filename": "2024-03-01 Invoice.pdf"} Hope it helps."#;
        let obj = extract_json_object(text).unwrap();
        assert_eq!(obj["filename"], "2024-03-01 Invoice.pdf");
    }

    #[test]
    fn test_extract_json_object_from_code_block() {
        let text = "Result:\n```json\n{\"path\": \"Finance/Invoices\", \"nested\": {\"a\": 1}}\n```\nDone.";
        let obj = extract_json_object(text).unwrap();
        assert_eq!(obj["path"], "Finance/Invoices");
        assert_eq!(obj["nested"]["a"], 1);
    }

    #[test]
    fn test_braces_inside_strings() {
        let text = r#"{"filename": "odd } name {.pdf"}"#;
        let obj = extract_json_object(text).unwrap();
        assert_eq!(obj["filename"], "odd } name {.pdf");
    }

    #[test]
    fn test_skips_non_json_braces() {
        let text = r#"Fill in {placeholder} then {"path": "Health"}"#;
        let obj = extract_json_object(text).unwrap();
        assert_eq!(obj["path"], "Health");
    }

    #[test]
    fn test_no_json_returns_error() {
        assert!(extract_json_object("No JSON here!").is_err());
        assert!(extract_json_object("{ unbalanced").is_err());
    }

    #[test]
    fn test_filter_thinking() {
        let text = "<think>\nThe user wants a summary...\n</think>\n\nAn invoice from Acme.";
        assert_eq!(filter_thinking(text), "An invoice from Acme.");
        assert_eq!(filter_thinking("  plain answer \n"), "plain answer");
        // A stray closing marker without an opening one is kept
        assert_eq!(filter_thinking("a </think> b"), "a </think> b");
    }

    #[test]
    fn test_string_field_rejects_blank() {
        let obj = extract_json_object(r#"{"filename": "  ", "path": 3, "ok": "x"}"#).unwrap();
        assert_eq!(string_field(&obj, "filename"), None);
        assert_eq!(string_field(&obj, "path"), None);
        assert_eq!(string_field(&obj, "missing"), None);
        assert_eq!(string_field(&obj, "ok"), Some("x".to_string()));
    }
}
