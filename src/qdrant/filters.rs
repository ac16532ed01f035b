//! Filter and payload helpers for reference-document queries.

use serde_json::{Map, Value, json};

/// Payload field holding the reference document category.
pub const DOCUMENT_TYPE_FIELD: &str = "document_type";

/// Restrict a query to points whose `document_type` is one of `document_types`.
pub fn build_document_type_filter(document_types: &[String]) -> Option<Value> {
    let cleaned: Vec<&str> = document_types
        .iter()
        .filter_map(|value| non_empty(value))
        .collect();

    if cleaned.is_empty() {
        None
    } else {
        Some(json!({
            "must": [
                {
                    "key": DOCUMENT_TYPE_FIELD,
                    "match": { "any": cleaned }
                }
            ]
        }))
    }
}

/// Read a non-blank string field from a payload.
pub fn payload_text<'a>(payload: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    match payload.get(key) {
        Some(Value::String(value)) => non_empty(value),
        _ => None,
    }
}

fn non_empty(input: &str) -> Option<&str> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}
