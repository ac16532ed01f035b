//! Lenient decoding of completion text into [`PartialAnalysis`].

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::types::PartialAnalysis;
use crate::completion::CompletionError;

const REPORT_FIELDS: &[&str] = &[
    "contractType",
    "overallScore",
    "summary",
    "risks",
    "suggestions",
    "compliance",
    "keyPoints",
    "urgentActions",
];

/// Decode the first JSON object carrying report fields from free-form completion text.
///
/// Each `{` is tried in turn and decoding stops at the end of the first value, so prose before
/// or after the object (braces included) is ignored. Objects without any report field, such as
/// a list item nested in an otherwise malformed report, are skipped.
fn first_report_object(raw: &str) -> Result<Map<String, Value>, CompletionError> {
    let mut first_error = None;
    for (start, _) in raw.match_indices('{') {
        let mut values = serde_json::Deserializer::from_str(&raw[start..]).into_iter::<Value>();
        match values.next() {
            Some(Ok(Value::Object(object)))
                if REPORT_FIELDS.iter().any(|field| object.contains_key(*field)) =>
            {
                return Ok(object);
            }
            Some(Ok(_)) | None => {}
            Some(Err(error)) => {
                first_error.get_or_insert_with(|| error.to_string());
            }
        }
    }
    Err(CompletionError::MalformedJson(
        first_error.unwrap_or_else(|| "no JSON object in completion".into()),
    ))
}

/// Decode a completion into structured findings.
///
/// Code fences and surrounding prose are tolerated. Non-array list fields become empty,
/// malformed list items are dropped one by one, and scores are rounded and clamped to 1–10.
pub fn parse_partial_analysis(raw: &str) -> Result<PartialAnalysis, CompletionError> {
    let object = first_report_object(raw)?;

    Ok(PartialAnalysis {
        contract_type: text_field(&object, "contractType"),
        overall_score: object.get("overallScore").and_then(score),
        summary: text_field(&object, "summary"),
        risks: item_list(&object, "risks"),
        suggestions: item_list(&object, "suggestions"),
        compliance: item_list(&object, "compliance"),
        key_points: string_list(&object, "keyPoints"),
        urgent_actions: string_list(&object, "urgentActions"),
    })
}

fn text_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    match object.get(key) {
        Some(Value::String(value)) if !value.trim().is_empty() => Some(value.trim().to_string()),
        _ => None,
    }
}

fn score(value: &Value) -> Option<u8> {
    let number = match value {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !number.is_finite() || number < 0.5 {
        return None;
    }
    Some(number.round().clamp(1.0, 10.0) as u8)
}

fn item_list<T: DeserializeOwned>(object: &Map<String, Value>, key: &str) -> Vec<T> {
    match object.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter(|item| item.is_object())
            .filter_map(|item| serde_json::from_value(item.clone()).ok())
            .collect(),
        _ => Vec::new(),
    }
}

fn string_list(object: &Map<String, Value>, key: &str) -> Vec<String> {
    match object.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::types::{ComplianceStatus, Priority, RiskLevel};

    #[test]
    fn parses_fenced_completion() {
        let raw = r#"Here is the analysis:
```json
{
  "contractType": "Contrat de bail",
  "overallScore": 6.6,
  "risks": [{"level": "élevé", "title": "Deposit", "description": "No cap", "recommendation": "Cap it", "legalReference": "Loi 67-12"}],
  "suggestions": [{"priority": "basse", "title": "Clarify"}],
  "compliance": [{"status": "non-conforme", "article": "Art. 230 DOC", "description": "Missing"}],
  "summary": "Balanced overall.",
  "keyPoints": ["Term of 3 years", ""],
  "urgentActions": []
}
```"#;
        let partial = parse_partial_analysis(raw).expect("parsed");
        assert_eq!(partial.contract_type.as_deref(), Some("Contrat de bail"));
        assert_eq!(partial.overall_score, Some(7));
        assert_eq!(partial.risks[0].level, RiskLevel::High);
        assert_eq!(partial.suggestions[0].priority, Priority::Low);
        assert_eq!(partial.compliance[0].status, ComplianceStatus::NonCompliant);
        assert_eq!(partial.key_points, vec!["Term of 3 years"]);
        assert!(partial.urgent_actions.is_empty());
    }

    #[test]
    fn trailing_braced_prose_is_ignored() {
        let raw = "```json\n{\"contractType\": \"Bail\", \"overallScore\": 8, \"risks\": [{\"title\": \"Deposit\"}]}\n```\nNote: fields like {title} are optional.";
        let partial = parse_partial_analysis(raw).expect("parsed");
        assert_eq!(partial.contract_type.as_deref(), Some("Bail"));
        assert_eq!(partial.overall_score, Some(8));
        assert_eq!(partial.risks[0].title, "Deposit");
    }

    #[test]
    fn leading_braced_prose_is_skipped() {
        let raw = r#"Fields such as {summary} are filled below. {"summary": "Short lease."}"#;
        let partial = parse_partial_analysis(raw).expect("parsed");
        assert_eq!(partial.summary.as_deref(), Some("Short lease."));
    }

    #[test]
    fn malformed_items_and_fields_are_dropped() {
        let raw = r#"{"overallScore": "n/a", "risks": ["bad", {"title": "Kept"}, 3], "keyPoints": "oops", "compliance": {}}"#;
        let partial = parse_partial_analysis(raw).expect("parsed");
        assert_eq!(partial.overall_score, None);
        assert_eq!(partial.risks.len(), 1);
        assert_eq!(partial.risks[0].title, "Kept");
        assert!(partial.key_points.is_empty());
        assert!(partial.compliance.is_empty());
    }

    #[test]
    fn scores_are_clamped() {
        assert_eq!(score(&Value::from(42)), Some(10));
        assert_eq!(score(&Value::from(0.7)), Some(1));
        assert_eq!(score(&Value::from(0)), None);
        assert_eq!(score(&Value::from("8")), Some(8));
    }

    #[test]
    fn text_without_json_is_malformed() {
        let error = parse_partial_analysis("I cannot help with that.").unwrap_err();
        assert!(matches!(error, CompletionError::MalformedJson(_)));
        let error = parse_partial_analysis("} nope {").unwrap_err();
        assert!(matches!(error, CompletionError::MalformedJson(_)));
        let error =
            parse_partial_analysis(r#"{"summary": oops, "risks": [{"title": "Deposit"}]}"#)
                .unwrap_err();
        assert!(matches!(error, CompletionError::MalformedJson(_)));
    }
}
