use super::{CompletionClient, CompletionError, CompletionRequest};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;

/// Chat-completion client for OpenAI-compatible `/chat/completions` endpoints.
pub struct OpenAiCompletionClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl OpenAiCompletionClient {
    /// Build a client for `base_url` (e.g. `https://api.openai.com/v1`).
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, CompletionError> {
        let http = Client::builder()
            .user_agent("clausewise/completion")
            .build()
            .map_err(|error| {
                CompletionError::ProviderUnavailable(format!(
                    "failed to construct HTTP client: {error}"
                ))
            })?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl CompletionClient for OpenAiCompletionClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError> {
        let parameters = &request.parameters;
        let payload = json!({
            "model": parameters.model,
            "messages": [
                { "role": "system", "content": request.system_prompt },
                { "role": "user", "content": request.user_prompt },
            ],
            "temperature": parameters.temperature,
            "max_tokens": parameters.max_tokens,
            "top_p": parameters.top_p,
            "frequency_penalty": parameters.frequency_penalty,
            "presence_penalty": parameters.presence_penalty,
        });

        tracing::debug!(
            model = %parameters.model,
            system_chars = request.system_prompt.len(),
            user_chars = request.user_prompt.len(),
            "Requesting completion"
        );

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                CompletionError::ProviderUnavailable(format!(
                    "failed to reach completion endpoint at {}: {error}",
                    self.base_url
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status == StatusCode::TOO_MANY_REQUESTS || body.contains("insufficient_quota") {
                return Err(CompletionError::RateLimited(format!("{status}: {body}")));
            }
            return Err(CompletionError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        let body: ChatCompletionResponse = response.json().await.map_err(|error| {
            CompletionError::InvalidResponse(format!(
                "failed to decode chat completion response: {error}"
            ))
        })?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or(CompletionError::EmptyCompletion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::ModelParameters;
    use httpmock::{Method::POST, MockServer};

    fn request() -> CompletionRequest {
        CompletionRequest {
            system_prompt: "You are a lawyer.".into(),
            user_prompt: "Analyze this.".into(),
            parameters: ModelParameters::default(),
        }
    }

    fn client(server: &MockServer) -> OpenAiCompletionClient {
        OpenAiCompletionClient::new(server.base_url(), "test-key").expect("client")
    }

    #[tokio::test]
    async fn returns_first_choice_content() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/chat/completions")
                    .json_body_partial(r#"{"model":"gpt-4"}"#);
                then.status(200).json_body(json!({
                    "choices": [{ "message": { "role": "assistant", "content": "  {\"summary\":\"ok\"} " } }]
                }));
            })
            .await;

        let content = client(&server).complete(request()).await.expect("completion");

        mock.assert_async().await;
        assert_eq!(content, "{\"summary\":\"ok\"}");
    }

    #[tokio::test]
    async fn maps_429_to_rate_limited() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(429).body("slow down");
            })
            .await;

        let error = client(&server).complete(request()).await.unwrap_err();
        assert!(matches!(error, CompletionError::RateLimited(message) if message.contains("slow down")));
    }

    #[tokio::test]
    async fn maps_server_errors_to_unexpected_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(500).body("boom");
            })
            .await;

        let error = client(&server).complete(request()).await.unwrap_err();
        assert!(matches!(
            error,
            CompletionError::UnexpectedStatus { status: 500, ref body } if body == "boom"
        ));
    }

    #[tokio::test]
    async fn empty_choices_are_an_empty_completion() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(200).json_body(json!({ "choices": [] }));
            })
            .await;

        let error = client(&server).complete(request()).await.unwrap_err();
        assert!(matches!(error, CompletionError::EmptyCompletion));
    }
}
