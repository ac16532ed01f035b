//! Abstractions for the chat-completion service that produces structured findings.
//!
//! The pipeline only depends on [`CompletionClient`]; the OpenAI-compatible adapter lives in
//! the `openai` module and tests substitute their own stubs.

mod openai;

pub use openai::OpenAiCompletionClient;

use crate::prompt::ModelParameters;
use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced while requesting or interpreting a completion.
///
/// Every variant is recoverable at segment level: the orchestrator substitutes a degraded
/// result and keeps going.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// Provider could not be reached or the client could not be built.
    #[error("Completion provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider rejected the call for rate or quota reasons.
    #[error("Completion provider rate limited the request: {0}")]
    RateLimited(String),
    /// Provider answered with an unexpected status.
    #[error("Completion provider returned {status}: {body}")]
    UnexpectedStatus {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },
    /// Provider answered without any completion text.
    #[error("Completion provider returned an empty completion")]
    EmptyCompletion,
    /// Provider response envelope could not be decoded.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
    /// Completion text did not contain the expected JSON object.
    #[error("Completion is not valid analysis JSON: {0}")]
    MalformedJson(String),
}

/// One chat-completion call.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// System message, possibly enriched with reference context.
    pub system_prompt: String,
    /// User message rendered from the prompt template.
    pub user_prompt: String,
    /// Model identifier and sampling parameters.
    pub parameters: ModelParameters,
}

/// Interface implemented by chat-completion providers.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Return the raw completion text for the request.
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError>;
}
