//! HTTP surface for Clausewise.
//!
//! This module exposes a compact Axum router with a handful of endpoints:
//!
//! - `POST /analyze` – Analyze one uploaded contract. The raw file is the request body, its
//!   media type the `Content-Type` header, and an optional `X-File-Name` header names it.
//!   Uploads are limited to 10 MiB.
//! - `GET /prompt` / `PUT /prompt` – Read or edit the prompt configuration used for analyses.
//! - `GET /prompt/history` – List recorded prompt versions.
//! - `POST /prompt/restore` – Make a historical prompt version current again.
//! - `GET /metrics` – Observe analysis counters.
//! - `GET /commands` – Machine-readable command catalog for quick discovery by tools/hosts.
//!
//! Successful responses are wrapped as `{ "success": true, "data": ... }`, failures as
//! `{ "success": false, "error": "..." }`.

use crate::analysis::{AnalysisApi, AnalysisError, AnalysisReport, AnalysisState, Strategy};
use crate::extraction::{ExtractionError, RawDocument};
use crate::metrics::MetricsSnapshot;
use crate::prompt::{
    PromptConfig, PromptHistoryEntry, PromptSnapshot, PromptStats, PromptStoreError, PromptUpdate,
};
use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Largest accepted upload, in bytes.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

const FILE_NAME_HEADER: &str = "x-file-name";

/// Build the HTTP router exposing the analysis API surface.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: AnalysisApi + 'static,
{
    Router::new()
        .route(
            "/analyze",
            post(analyze_document::<S>).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/prompt", get(get_prompt::<S>).put(update_prompt::<S>))
        .route("/prompt/history", get(prompt_history::<S>))
        .route("/prompt/restore", post(restore_prompt::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .route("/commands", get(get_commands))
        .with_state(service)
}

/// Envelope shared by every successful response.
#[derive(Serialize)]
struct ApiResponse<T, M = ()> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    meta: Option<M>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
            meta: None,
        })
    }
}

/// Run details returned next to the report by `POST /analyze`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeMeta {
    file_name: String,
    strategy: Strategy,
    estimated_tokens: usize,
    segments_attempted: usize,
    segments_failed: usize,
    states: Vec<AnalysisState>,
    document_sha256: String,
    prompt_version: String,
}

/// Analyze an uploaded contract.
///
/// The media type is taken from `Content-Type`; when it is missing or
/// `application/octet-stream`, the `X-File-Name` extension decides.
async fn analyze_document<S>(
    State(service): State<Arc<S>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ApiResponse<AnalysisReport, AnalyzeMeta>>, AppError>
where
    S: AnalysisApi,
{
    if body.is_empty() {
        return Err(AppError::BadRequest("request body is empty; upload a PDF or DOCX file".into()));
    }
    let media_type = header_text(&headers, CONTENT_TYPE.as_str()).unwrap_or_default();
    let file_name = header_text(&headers, FILE_NAME_HEADER).unwrap_or_else(|| "upload".to_string());
    tracing::info!(
        file_name = %file_name,
        media_type = %media_type,
        size = body.len(),
        "Analyze request received"
    );

    let document = RawDocument::new(body.to_vec(), media_type, file_name.clone());
    let outcome = service.analyze_document(document).await?;
    let run = outcome.run;
    Ok(Json(ApiResponse {
        success: true,
        data: run.report,
        meta: Some(AnalyzeMeta {
            file_name,
            strategy: run.strategy,
            estimated_tokens: run.estimated_tokens,
            segments_attempted: run.segments_attempted,
            segments_failed: run.segments_failed,
            states: run.states,
            document_sha256: outcome.document_sha256,
            prompt_version: outcome.prompt_version,
        }),
    }))
}

fn header_text(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Response body for `GET /prompt`.
#[derive(Serialize)]
struct PromptResponse {
    config: PromptConfig,
    stats: PromptStats,
}

/// Return the prompt configuration in effect with a short summary.
async fn get_prompt<S>(State(service): State<Arc<S>>) -> Json<ApiResponse<PromptResponse>>
where
    S: AnalysisApi,
{
    ApiResponse::ok(PromptResponse {
        config: service.prompt_current(),
        stats: service.prompt_stats(),
    })
}

/// Apply a partial prompt edit; the result is recorded as a new patch version.
///
/// The prompt log is appended synchronously, so the edit runs on the blocking pool.
async fn update_prompt<S>(
    State(service): State<Arc<S>>,
    Json(update): Json<PromptUpdate>,
) -> Result<Json<ApiResponse<PromptSnapshot>>, AppError>
where
    S: AnalysisApi + 'static,
{
    let snapshot = run_prompt_edit(move || service.update_prompt(update)).await?;
    Ok(ApiResponse::ok(snapshot))
}

async fn run_prompt_edit<F>(edit: F) -> Result<PromptSnapshot, AppError>
where
    F: FnOnce() -> Result<PromptSnapshot, PromptStoreError> + Send + 'static,
{
    tokio::task::spawn_blocking(edit)
        .await
        .map_err(|error| AppError::Internal(format!("prompt edit aborted: {error}")))?
        .map_err(AppError::from)
}

/// List recorded prompt versions, oldest first.
async fn prompt_history<S>(
    State(service): State<Arc<S>>,
) -> Json<ApiResponse<Vec<PromptHistoryEntry>>>
where
    S: AnalysisApi,
{
    ApiResponse::ok(service.prompt_history())
}

/// Request body for `POST /prompt/restore`.
#[derive(Deserialize)]
struct RestoreRequest {
    /// Version to make current again.
    version: String,
}

/// Restore a historical prompt version.
async fn restore_prompt<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<RestoreRequest>,
) -> Result<Json<ApiResponse<PromptSnapshot>>, AppError>
where
    S: AnalysisApi + 'static,
{
    let version = request.version.trim().to_string();
    let snapshot = run_prompt_edit(move || service.restore_prompt(&version)).await?;
    Ok(ApiResponse::ok(snapshot))
}

/// Return the analysis counters.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<ApiResponse<MetricsSnapshot>>
where
    S: AnalysisApi,
{
    ApiResponse::ok(service.metrics_snapshot())
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<serde_json::Value>,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands for discovery/UX in hosts and tools.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "analyze",
                method: "POST",
                path: "/analyze",
                description: "Analyze a PDF or DOCX contract sent as the raw request body. Set Content-Type to the file's media type and optionally X-File-Name. Returns the structured report in data and run details in meta.",
                request_example: None,
            },
            CommandDescriptor {
                name: "get_prompt",
                method: "GET",
                path: "/prompt",
                description: "Return the prompt configuration used for analyses and a summary of its history.",
                request_example: None,
            },
            CommandDescriptor {
                name: "update_prompt",
                method: "PUT",
                path: "/prompt",
                description: "Edit the prompt configuration. Omitted fields are kept; the result is recorded as a new version.",
                request_example: Some(json!({
                    "systemPrompt": "You are a legal expert in Moroccan contract law...",
                    "model": {
                        "model": "gpt-4",
                        "temperature": 0.2,
                        "maxTokens": 2500,
                        "topP": 0.9,
                        "frequencyPenalty": 0.1,
                        "presencePenalty": 0.1
                    }
                })),
            },
            CommandDescriptor {
                name: "prompt_history",
                method: "GET",
                path: "/prompt/history",
                description: "List recorded prompt versions, oldest first.",
                request_example: None,
            },
            CommandDescriptor {
                name: "restore_prompt",
                method: "POST",
                path: "/prompt/restore",
                description: "Make a historical prompt version current again by recording it as a new version.",
                request_example: Some(json!({ "version": "1.0.0" })),
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Return analysis counters useful for observability dashboards.",
                request_example: None,
            },
        ],
    })
}

enum AppError {
    Analysis(AnalysisError),
    Prompt(PromptStoreError),
    BadRequest(String),
    Internal(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Analysis(AnalysisError::Extraction(ExtractionError::UnsupportedFormat(_))) => {
                StatusCode::UNSUPPORTED_MEDIA_TYPE
            }
            Self::Analysis(AnalysisError::Extraction(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Analysis(AnalysisError::AllSegmentsFailed { .. }) => StatusCode::BAD_GATEWAY,
            Self::Analysis(AnalysisError::Chunking(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Prompt(PromptStoreError::InvalidPrompt(_)) => StatusCode::BAD_REQUEST,
            Self::Prompt(PromptStoreError::UnknownVersion(_)) => StatusCode::NOT_FOUND,
            Self::Prompt(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Analysis(error) => error.to_string(),
            Self::Prompt(error) => error.to_string(),
            Self::BadRequest(message) | Self::Internal(message) => message.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.message();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %message, "Request failed");
        } else {
            tracing::warn!(status = status.as_u16(), error = %message, "Request rejected");
        }
        (status, Json(json!({ "success": false, "error": message }))).into_response()
    }
}

impl From<AnalysisError> for AppError {
    fn from(inner: AnalysisError) -> Self {
        Self::Analysis(inner)
    }
}

impl From<PromptStoreError> for AppError {
    fn from(inner: PromptStoreError) -> Self {
        Self::Prompt(inner)
    }
}
