//! Report data model, pipeline settings, and error definitions for contract analysis.

use crate::completion::CompletionError;
use crate::embedding::EmbeddingClientError;
use crate::extraction::ExtractionError;
use crate::prompt::PromptStoreError;
use crate::qdrant::QdrantError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Contract type applied when no segment identified one.
pub const DEFAULT_CONTRACT_TYPE: &str = "General contract";
/// Neutral score applied when no segment produced one.
pub const DEFAULT_OVERALL_SCORE: u8 = 5;
/// Summary applied when no segment produced one.
pub const DEFAULT_SUMMARY: &str = "Analysis completed with the configured prompt.";
/// Title of the degraded risk synthesized for a failed segment.
pub const INCOMPLETE_ANALYSIS_TITLE: &str = "Incomplete analysis";
/// Key point synthesized for a failed segment.
pub const MANUAL_REVIEW_KEY_POINT: &str = "Manual review recommended";

/// Errors produced while splitting text into segments.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Segments cannot be bounded by a zero size.
    #[error("segment size must be greater than zero")]
    InvalidSegmentSize,
}

/// Errors that abort a document analysis.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Upload could not be turned into text.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    /// Segmentation rejected the configured bounds.
    #[error("Failed to segment document: {0}")]
    Chunking(#[from] ChunkingError),
    /// Every segment failed and escalation is enabled.
    #[error("Analysis failed for all {attempted} segment(s)")]
    AllSegmentsFailed {
        /// Number of segments sent to the completion service.
        attempted: usize,
    },
}

/// Errors raised while wiring the service from configuration.
#[derive(Debug, Error)]
pub enum ServiceInitError {
    /// Completion client could not be constructed.
    #[error("Failed to initialize completion client: {0}")]
    Completion(#[from] CompletionError),
    /// Embedding client could not be constructed.
    #[error("Failed to initialize embedding client: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Qdrant client could not be constructed.
    #[error("Failed to initialize Qdrant client: {0}")]
    Qdrant(#[from] QdrantError),
    /// Prompt log could not be opened.
    #[error("Failed to open prompt store: {0}")]
    Prompt(#[from] PromptStoreError),
}

/// Processing strategy chosen from the token estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// One call with the full text.
    Direct,
    /// Sequential calls over bounded segments.
    Chunked,
    /// One call with a condensed excerpt.
    Reduced,
}

/// States a single document analysis moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "strategy", rename_all = "snake_case")]
pub enum AnalysisState {
    /// Run created, nothing decided yet.
    Init,
    /// Strategy picked from the token estimate.
    StrategySelected(Strategy),
    /// Segments are being sent to the completion service.
    SegmentsProcessing,
    /// Checklists, defaults, de-duplication, and caps are being applied.
    Finalizing,
    /// Report returned.
    Done,
    /// Run aborted.
    Failed,
}

/// Maximum number of items kept per report list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListCaps {
    /// Cap for `risks`.
    pub risks: usize,
    /// Cap for `suggestions`.
    pub suggestions: usize,
    /// Cap for `compliance`.
    pub compliance: usize,
    /// Cap for `keyPoints`.
    pub key_points: usize,
    /// Cap for `urgentActions`.
    pub urgent_actions: usize,
}

impl Default for ListCaps {
    fn default() -> Self {
        Self {
            risks: 8,
            suggestions: 6,
            compliance: 10,
            key_points: 5,
            urgent_actions: 3,
        }
    }
}

/// Tunables for strategy selection, segmentation, and failure policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSettings {
    /// Maximum characters per segment in the chunked strategy.
    pub max_segment_chars: usize,
    /// Hard cap on the number of segments sent to the completion service.
    pub max_segments: usize,
    /// Divisor turning a character count into a token estimate.
    pub chars_per_token: usize,
    /// Estimates above this pick the chunked strategy.
    pub chunked_threshold_tokens: usize,
    /// Estimates above this pick the reduced strategy.
    pub reduced_threshold_tokens: usize,
    /// Target size of the condensed excerpt.
    pub reduced_max_chars: usize,
    /// Minimum cleaned characters for a document to be analyzable.
    pub min_content_chars: usize,
    /// Return an error instead of a degraded report when no segment succeeds.
    pub fail_on_total_failure: bool,
    /// Per-list caps applied at finalization.
    #[serde(default)]
    pub caps: ListCaps,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            max_segment_chars: 3500,
            max_segments: 3,
            chars_per_token: 4,
            chunked_threshold_tokens: 2000,
            reduced_threshold_tokens: 6000,
            reduced_max_chars: 12_000,
            min_content_chars: 50,
            fail_on_total_failure: false,
            caps: ListCaps::default(),
        }
    }
}

/// Severity of a risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum RiskLevel {
    /// Needs attention before signing.
    High,
    /// Worth negotiating.
    #[default]
    Medium,
    /// Minor.
    Low,
}

impl From<String> for RiskLevel {
    fn from(label: String) -> Self {
        match normalize_label(&label).as_str() {
            "high" | "eleve" | "elevee" | "haute" | "haut" | "critical" | "critique" => Self::High,
            "low" | "faible" | "basse" | "bas" => Self::Low,
            _ => Self::Medium,
        }
    }
}

/// Priority of a suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Priority {
    /// Do first.
    High,
    /// Do soon.
    #[default]
    Medium,
    /// Nice to have.
    Low,
}

impl From<String> for Priority {
    fn from(label: String) -> Self {
        match normalize_label(&label).as_str() {
            "high" | "haute" | "haut" | "eleve" | "elevee" => Self::High,
            "low" | "basse" | "bas" | "faible" => Self::Low,
            _ => Self::Medium,
        }
    }
}

/// Compliance verdict for one legal requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum ComplianceStatus {
    /// Requirement satisfied.
    Compliant,
    /// Requirement violated.
    NonCompliant,
    /// Could not be decided from the text.
    #[default]
    ToVerify,
}

impl From<String> for ComplianceStatus {
    fn from(label: String) -> Self {
        let normalized = normalize_label(&label).replace(['-', '_'], " ");
        match normalized.as_str() {
            "compliant" | "conforme" => Self::Compliant,
            "non compliant" | "noncompliant" | "non conforme" => Self::NonCompliant,
            _ => Self::ToVerify,
        }
    }
}

/// Lowercase a label and fold the French accents the default prompt produces.
fn normalize_label(label: &str) -> String {
    label
        .trim()
        .to_lowercase()
        .chars()
        .map(|ch| match ch {
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'à' | 'â' => 'a',
            'î' | 'ï' => 'i',
            'ô' => 'o',
            'ù' | 'û' => 'u',
            'ç' => 'c',
            other => other,
        })
        .collect()
}

/// Accept strings, numbers, booleans, or null where the model was asked for a string.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Risk identified in the contract.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Risk {
    /// Severity.
    #[serde(default)]
    pub level: RiskLevel,
    /// Short title.
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: String,
    /// Detailed description, ideally citing the law.
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: String,
    /// Recommended action.
    #[serde(default, deserialize_with = "lenient_string")]
    pub recommendation: String,
    /// Article or statute the risk relates to.
    #[serde(default, deserialize_with = "lenient_string")]
    pub legal_reference: String,
}

/// Improvement proposed for the contract.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    /// Priority.
    #[serde(default)]
    pub priority: Priority,
    /// Short title.
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: String,
    /// Detailed explanation.
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: String,
    /// Expected benefit.
    #[serde(default, deserialize_with = "lenient_string")]
    pub impact: String,
    /// How to implement it (the recommended action).
    #[serde(default, deserialize_with = "lenient_string")]
    pub implementation: String,
}

/// Compliance check against one legal requirement.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceItem {
    /// Verdict.
    #[serde(default)]
    pub status: ComplianceStatus,
    /// Legal reference, e.g. `Art. 230 DOC`.
    #[serde(default, deserialize_with = "lenient_string")]
    pub article: String,
    /// Explanation of the verdict.
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: String,
    /// Action required when not compliant.
    #[serde(default, deserialize_with = "lenient_string")]
    pub action: String,
}

/// Structured findings returned by the completion service for one segment.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PartialAnalysis {
    /// Contract type, when the segment identified one.
    pub contract_type: Option<String>,
    /// Score on a 1–10 scale, when present.
    pub overall_score: Option<u8>,
    /// Executive summary, when present.
    pub summary: Option<String>,
    /// Risks found in the segment.
    pub risks: Vec<Risk>,
    /// Suggestions found in the segment.
    pub suggestions: Vec<Suggestion>,
    /// Compliance checks found in the segment.
    pub compliance: Vec<ComplianceItem>,
    /// Key points, in model order.
    pub key_points: Vec<String>,
    /// Urgent actions, in model order.
    pub urgent_actions: Vec<String>,
}

impl PartialAnalysis {
    /// Degraded result standing in for a segment whose completion failed.
    pub fn incomplete() -> Self {
        Self {
            risks: vec![Risk {
                level: RiskLevel::Medium,
                title: INCOMPLETE_ANALYSIS_TITLE.to_string(),
                description: "The automatic analysis could not be completed for this part of the contract. A manual review is recommended.".to_string(),
                recommendation: "Consult a lawyer specialized in contract law".to_string(),
                legal_reference: "Manual verification required".to_string(),
            }],
            key_points: vec![MANUAL_REVIEW_KEY_POINT.to_string()],
            ..Self::default()
        }
    }
}

/// Report being built across segments; scalars stay optional until finalization.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReportAccumulator {
    /// Contract type seeded by the first segment.
    pub contract_type: Option<String>,
    /// Score seeded by the first segment.
    pub overall_score: Option<u8>,
    /// Summary seeded by the first segment.
    pub summary: Option<String>,
    /// Merged risks in first-seen order.
    pub risks: Vec<Risk>,
    /// Merged suggestions in first-seen order.
    pub suggestions: Vec<Suggestion>,
    /// Merged compliance checks in first-seen order.
    pub compliance: Vec<ComplianceItem>,
    /// Merged key points in first-seen order.
    pub key_points: Vec<String>,
    /// Merged urgent actions in first-seen order.
    pub urgent_actions: Vec<String>,
    /// Set once the first segment has been merged.
    pub seeded: bool,
}

impl ReportAccumulator {
    /// Short context carried into the next segment's prompt.
    pub fn carried_context(&self) -> String {
        if self.contract_type.is_none() && self.overall_score.is_none() {
            return String::new();
        }
        let contract_type = self.contract_type.as_deref().unwrap_or("unknown");
        match self.overall_score {
            Some(score) => format!("Type: {contract_type}, Score: {score}/10"),
            None => format!("Type: {contract_type}, Score: n/a"),
        }
    }
}

/// Final structured report; immutable once returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    /// Identified contract type.
    pub contract_type: String,
    /// Overall legal quality score, 1–10.
    pub overall_score: u8,
    /// Risks, de-duplicated and capped.
    pub risks: Vec<Risk>,
    /// Suggestions, de-duplicated and capped.
    pub suggestions: Vec<Suggestion>,
    /// Compliance checks, de-duplicated and capped.
    pub compliance: Vec<ComplianceItem>,
    /// Executive summary.
    pub summary: String,
    /// Key points, de-duplicated and capped.
    pub key_points: Vec<String>,
    /// Urgent actions, de-duplicated and capped.
    pub urgent_actions: Vec<String>,
}

/// Orchestrator result for one text.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRun {
    /// Finalized report.
    pub report: AnalysisReport,
    /// Strategy used.
    pub strategy: Strategy,
    /// Token estimate that drove the strategy.
    pub estimated_tokens: usize,
    /// Segments sent to the completion service.
    pub segments_attempted: usize,
    /// Segments replaced by a degraded result.
    pub segments_failed: usize,
    /// States visited, in order.
    pub states: Vec<AnalysisState>,
}

/// Service result for one uploaded document.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOutcome {
    /// Orchestrator result.
    #[serde(flatten)]
    pub run: AnalysisRun,
    /// SHA-256 of the uploaded bytes, hex encoded.
    pub document_sha256: String,
    /// Prompt configuration version used.
    pub prompt_version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enum_labels_accept_french_and_english() {
        assert_eq!(RiskLevel::from("élevé".to_string()), RiskLevel::High);
        assert_eq!(RiskLevel::from("Low".to_string()), RiskLevel::Low);
        assert_eq!(RiskLevel::from("???".to_string()), RiskLevel::Medium);
        assert_eq!(Priority::from("haute".to_string()), Priority::High);
        assert_eq!(
            ComplianceStatus::from("non-conforme".to_string()),
            ComplianceStatus::NonCompliant
        );
        assert_eq!(
            ComplianceStatus::from("à vérifier".to_string()),
            ComplianceStatus::ToVerify
        );
        assert_eq!(
            ComplianceStatus::from("Compliant".to_string()),
            ComplianceStatus::Compliant
        );
    }

    #[test]
    fn risk_deserialization_is_lenient() {
        let risk: Risk = serde_json::from_value(serde_json::json!({
            "level": "moyen",
            "title": null,
            "description": 42,
            "legalReference": "Art. 77 DOC"
        }))
        .expect("lenient risk");
        assert_eq!(risk.level, RiskLevel::Medium);
        assert_eq!(risk.title, "");
        assert_eq!(risk.description, "42");
        assert_eq!(risk.legal_reference, "Art. 77 DOC");
    }

    #[test]
    fn report_serializes_with_camel_case_and_english_labels() {
        let report = AnalysisReport {
            contract_type: "Lease".into(),
            overall_score: 7,
            risks: vec![Risk {
                level: RiskLevel::High,
                ..Risk::default()
            }],
            suggestions: vec![],
            compliance: vec![ComplianceItem {
                status: ComplianceStatus::NonCompliant,
                ..ComplianceItem::default()
            }],
            summary: "ok".into(),
            key_points: vec![],
            urgent_actions: vec![],
        };
        let value = serde_json::to_value(&report).expect("json");
        assert_eq!(value["contractType"], "Lease");
        assert_eq!(value["overallScore"], 7);
        assert_eq!(value["risks"][0]["level"], "high");
        assert_eq!(value["compliance"][0]["status"], "non_compliant");
        assert!(value.get("keyPoints").is_some());
    }

    #[test]
    fn carried_context_mentions_type_and_score() {
        let accumulator = ReportAccumulator {
            contract_type: Some("Employment contract".into()),
            overall_score: Some(6),
            seeded: true,
            ..ReportAccumulator::default()
        };
        assert_eq!(
            accumulator.carried_context(),
            "Type: Employment contract, Score: 6/10"
        );
        assert_eq!(ReportAccumulator::default().carried_context(), "");
    }
}
