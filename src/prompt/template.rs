use serde::{Deserialize, Serialize};

pub(super) const HEADER_PLACEHOLDER: &str = "{{header}}";
pub(super) const CONTEXT_PLACEHOLDER: &str = "{{context}}";
pub(super) const INSTRUCTIONS_PLACEHOLDER: &str = "{{instructions}}";
pub(super) const TEXT_PLACEHOLDER: &str = "{{text}}";

/// User message template with first-segment and continuation variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPromptTemplate {
    /// Message body containing the `{{header}}`, `{{context}}`, `{{text}}`, and
    /// `{{instructions}}` placeholders.
    pub body: String,
    /// Header used for the first segment.
    pub first_segment_header: String,
    /// Header used for every later segment.
    pub continuation_header: String,
    /// Prefix of the carried-context line.
    pub context_label: String,
    /// Instructions for the first segment.
    pub first_segment_instructions: String,
    /// Instructions for every later segment.
    pub continuation_instructions: String,
}

impl UserPromptTemplate {
    /// Render the user message for one segment.
    ///
    /// The context line is omitted when `carried_context` is blank. The segment text is
    /// substituted last so placeholders appearing inside the contract are left alone.
    pub fn render(&self, text: &str, is_first_segment: bool, carried_context: &str) -> String {
        let (header, instructions) = if is_first_segment {
            (&self.first_segment_header, &self.first_segment_instructions)
        } else {
            (&self.continuation_header, &self.continuation_instructions)
        };
        let context = carried_context.trim();
        let context_line = if context.is_empty() {
            String::new()
        } else {
            format!("{}{context}", self.context_label)
        };

        self.body
            .replace(HEADER_PLACEHOLDER, header)
            .replace(CONTEXT_PLACEHOLDER, &context_line)
            .replace(INSTRUCTIONS_PLACEHOLDER, instructions)
            .replace(TEXT_PLACEHOLDER, text)
    }
}
