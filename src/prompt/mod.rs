//! Prompt configuration: system prompt, user template, model parameters, and checklists.
//!
//! A [`PromptConfig`] is an immutable value. Edits go through [`PromptStore`], which appends a
//! new versioned snapshot to its log instead of mutating anything in place.

mod defaults;
mod store;
mod template;

pub use store::{PromptHistoryEntry, PromptSnapshot, PromptStats, PromptStore, PromptStoreError};
pub use template::UserPromptTemplate;

use serde::{Deserialize, Serialize};

/// Model identifier and sampling parameters sent with every completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelParameters {
    /// Model identifier.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Completion token budget.
    pub max_tokens: u32,
    /// Nucleus sampling mass.
    pub top_p: f64,
    /// Frequency penalty.
    pub frequency_penalty: f64,
    /// Presence penalty.
    pub presence_penalty: f64,
}

impl Default for ModelParameters {
    fn default() -> Self {
        Self {
            model: "gpt-4".to_string(),
            temperature: 0.2,
            max_tokens: 2500,
            top_p: 0.9,
            frequency_penalty: 0.1,
            presence_penalty: 0.1,
        }
    }
}

/// Extra control points for one family of contracts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractTypeChecklist {
    /// Stable identifier, e.g. `contrat_bail`.
    pub key: String,
    /// Fragments matched against the normalized contract type.
    pub keywords: Vec<String>,
    /// Control points appended as suggestions.
    pub checks: Vec<String>,
}

impl ContractTypeChecklist {
    /// Whether the contract type reported by the model belongs to this family.
    pub fn matches(&self, contract_type: &str) -> bool {
        let normalized = normalize_contract_type(contract_type);
        !normalized.is_empty()
            && self
                .keywords
                .iter()
                .map(|keyword| normalize_contract_type(keyword))
                .any(|keyword| !keyword.is_empty() && normalized.contains(&keyword))
    }
}

fn normalize_contract_type(value: &str) -> String {
    value
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// Complete prompt configuration used for one analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptConfig {
    /// Semantic version, bumped on every update.
    pub version: String,
    /// RFC 3339 timestamp (or date) of the last change.
    pub last_modified: String,
    /// System message.
    pub system_prompt: String,
    /// User message template.
    pub user_prompt_template: UserPromptTemplate,
    /// Model parameters.
    pub model: ModelParameters,
    /// Line of the system prompt before which reference context is injected.
    pub rules_anchor: String,
    /// Contract-type checklists.
    #[serde(default)]
    pub contract_types: Vec<ContractTypeChecklist>,
}

impl Default for PromptConfig {
    fn default() -> Self {
        defaults::default_prompt()
    }
}

impl PromptConfig {
    /// First checklist whose keywords match the contract type.
    pub fn checklist_for(&self, contract_type: &str) -> Option<&ContractTypeChecklist> {
        self.contract_types
            .iter()
            .find(|checklist| checklist.matches(contract_type))
    }

    /// Names of required fields that are blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.system_prompt.trim().is_empty() {
            missing.push("systemPrompt");
        }
        if self.user_prompt_template.body.trim().is_empty()
            || !self.user_prompt_template.body.contains(template::TEXT_PLACEHOLDER)
        {
            missing.push("userPromptTemplate");
        }
        if self.model.model.trim().is_empty() {
            missing.push("model");
        }
        missing
    }
}

/// Partial edit applied on top of the current configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptUpdate {
    /// Replacement system message.
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Replacement user template.
    #[serde(default)]
    pub user_prompt_template: Option<UserPromptTemplate>,
    /// Replacement model parameters.
    #[serde(default)]
    pub model: Option<ModelParameters>,
    /// Replacement injection anchor.
    #[serde(default)]
    pub rules_anchor: Option<String>,
    /// Replacement checklists.
    #[serde(default)]
    pub contract_types: Option<Vec<ContractTypeChecklist>>,
}

impl PromptUpdate {
    /// Produce the edited configuration; version and timestamp are left to the caller.
    pub fn apply_to(self, current: &PromptConfig) -> PromptConfig {
        let base = current.clone();
        PromptConfig {
            system_prompt: self.system_prompt.unwrap_or(base.system_prompt),
            user_prompt_template: self
                .user_prompt_template
                .unwrap_or(base.user_prompt_template),
            model: self.model.unwrap_or(base.model),
            rules_anchor: self.rules_anchor.unwrap_or(base.rules_anchor),
            contract_types: self.contract_types.unwrap_or(base.contract_types),
            ..base
        }
    }
}
