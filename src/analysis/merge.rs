//! Folding per-segment findings into one report.
//!
//! Scalars (contract type, score, summary) are seeded by the first merged segment and never
//! overwritten afterwards. Lists are appended in order and de-duplicated on an identity key,
//! keeping the first occurrence.

use std::collections::HashSet;

use serde::Serialize;

use super::types::{
    AnalysisReport, ComplianceItem, DEFAULT_CONTRACT_TYPE, DEFAULT_OVERALL_SCORE,
    DEFAULT_SUMMARY, ListCaps, PartialAnalysis, Priority, ReportAccumulator, Risk, Suggestion,
};
use crate::prompt::ContractTypeChecklist;

/// Borrowed view over anything that can appear in a report list.
#[derive(Debug, Clone, Copy)]
pub enum Finding<'a> {
    /// Risk entry.
    Risk(&'a Risk),
    /// Suggestion entry.
    Suggestion(&'a Suggestion),
    /// Compliance entry.
    Compliance(&'a ComplianceItem),
    /// Free-text entry (key point or urgent action).
    Text(&'a str),
}

/// Items that can be de-duplicated within a report list.
pub trait Keyed {
    /// Borrow the item as a [`Finding`].
    fn finding(&self) -> Finding<'_>;
}

impl Keyed for Risk {
    fn finding(&self) -> Finding<'_> {
        Finding::Risk(self)
    }
}

impl Keyed for Suggestion {
    fn finding(&self) -> Finding<'_> {
        Finding::Suggestion(self)
    }
}

impl Keyed for ComplianceItem {
    fn finding(&self) -> Finding<'_> {
        Finding::Compliance(self)
    }
}

impl Keyed for String {
    fn finding(&self) -> Finding<'_> {
        Finding::Text(self)
    }
}

/// Identity used for de-duplication: the title when present, else the description, else the
/// serialized item. Matching is exact and case-sensitive.
pub fn identity_key(finding: Finding<'_>) -> String {
    match finding {
        Finding::Risk(risk) => first_present(&[&risk.title, &risk.description])
            .unwrap_or_else(|| serialized(risk)),
        Finding::Suggestion(suggestion) => {
            first_present(&[&suggestion.title, &suggestion.description])
                .unwrap_or_else(|| serialized(suggestion))
        }
        Finding::Compliance(item) => {
            first_present(&[&item.description]).unwrap_or_else(|| serialized(item))
        }
        Finding::Text(text) => text.to_string(),
    }
}

fn first_present(candidates: &[&String]) -> Option<String> {
    candidates
        .iter()
        .find(|value| !value.trim().is_empty())
        .map(|value| value.to_string())
}

fn serialized<T: Serialize>(item: &T) -> String {
    serde_json::to_string(item).unwrap_or_default()
}

/// Append `incoming` to `target`, skipping items whose identity is already present.
pub fn extend_unique<T: Keyed>(target: &mut Vec<T>, incoming: Vec<T>) {
    let mut seen: HashSet<String> = target
        .iter()
        .map(|item| identity_key(item.finding()))
        .collect();
    for item in incoming {
        if seen.insert(identity_key(item.finding())) {
            target.push(item);
        }
    }
}

fn dedupe<T: Keyed>(items: Vec<T>) -> Vec<T> {
    let mut unique = Vec::with_capacity(items.len());
    extend_unique(&mut unique, items);
    unique
}

/// Fold one segment's findings into the accumulator.
///
/// Merging a partial with no content into a seeded accumulator leaves it unchanged.
pub fn merge(mut accumulated: ReportAccumulator, partial: PartialAnalysis) -> ReportAccumulator {
    let PartialAnalysis {
        contract_type,
        overall_score,
        summary,
        risks,
        suggestions,
        compliance,
        key_points,
        urgent_actions,
    } = partial;

    if !accumulated.seeded {
        accumulated.contract_type = contract_type;
        accumulated.overall_score = overall_score;
        accumulated.summary = summary;
        accumulated.seeded = true;
    }

    extend_unique(&mut accumulated.risks, risks);
    extend_unique(&mut accumulated.suggestions, suggestions);
    extend_unique(&mut accumulated.compliance, compliance);
    extend_unique(&mut accumulated.key_points, key_points);
    extend_unique(&mut accumulated.urgent_actions, urgent_actions);
    accumulated
}

/// Append the checklist's control points as medium-priority suggestions.
pub fn apply_checklist(
    mut accumulated: ReportAccumulator,
    checklist: &ContractTypeChecklist,
) -> ReportAccumulator {
    let checks = checklist
        .checks
        .iter()
        .map(|check| Suggestion {
            priority: Priority::Medium,
            title: format!("Specialized check: {check}"),
            description: "Control point specific to this contract type under Moroccan law."
                .to_string(),
            impact: "Stronger legal compliance".to_string(),
            implementation: "Verify that this clause is present and compliant".to_string(),
        })
        .collect();
    extend_unique(&mut accumulated.suggestions, checks);
    accumulated
}

/// Apply defaults for missing scalars, de-duplicate, and cap every list.
pub fn finalize(accumulated: ReportAccumulator, caps: &ListCaps) -> AnalysisReport {
    let ReportAccumulator {
        contract_type,
        overall_score,
        summary,
        risks,
        suggestions,
        compliance,
        key_points,
        urgent_actions,
        seeded: _,
    } = accumulated;

    AnalysisReport {
        contract_type: contract_type
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CONTRACT_TYPE.to_string()),
        overall_score: overall_score.unwrap_or(DEFAULT_OVERALL_SCORE),
        summary: summary
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SUMMARY.to_string()),
        risks: capped(dedupe(risks), caps.risks),
        suggestions: capped(dedupe(suggestions), caps.suggestions),
        compliance: capped(dedupe(compliance), caps.compliance),
        key_points: capped(dedupe(key_points), caps.key_points),
        urgent_actions: capped(dedupe(urgent_actions), caps.urgent_actions),
    }
}

fn capped<T>(mut items: Vec<T>, cap: usize) -> Vec<T> {
    items.truncate(cap);
    items
}
