use crate::analysis::AnalysisSettings;
use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

const DEFAULT_COMPLETION_API_URL: &str = "https://api.openai.com/v1";
const DEFAULT_QDRANT_COLLECTION: &str = "legal_documents";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
const DEFAULT_PROMPT_STORE_PATH: &str = "data/prompt-history.jsonl";
const MIN_REDUCED_MAX_CHARS: usize = 1_000;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the Clausewise server.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Base URL of the OpenAI-compatible API serving completions and embeddings.
    pub completion_api_url: String,
    /// Bearer token sent to the completion and embedding endpoints.
    pub completion_api_key: String,
    /// Optional Qdrant base URL; retrieval enrichment is disabled when absent.
    pub qdrant_url: Option<String>,
    /// Collection holding reference laws, regulations, and contract templates.
    pub qdrant_collection_name: String,
    /// Optional API key required to access Qdrant.
    pub qdrant_api_key: Option<String>,
    /// Embedding model used to vectorize retrieval queries.
    pub embedding_model: String,
    /// Minimum similarity accepted from the vector store.
    pub retrieval_match_threshold: f32,
    /// Maximum number of reference documents injected into the prompt.
    pub retrieval_match_count: usize,
    /// Path of the append-only prompt configuration log.
    pub prompt_store_path: String,
    /// Pipeline tunables handed to the orchestrator.
    pub analysis: AnalysisSettings,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = AnalysisSettings::default();
        let analysis = AnalysisSettings {
            max_segment_chars: parse_optional("ANALYSIS_MAX_SEGMENT_CHARS")?
                .unwrap_or(defaults.max_segment_chars)
                .max(1),
            max_segments: parse_optional("ANALYSIS_MAX_SEGMENTS")?
                .unwrap_or(defaults.max_segments)
                .max(1),
            chars_per_token: parse_optional("ANALYSIS_CHARS_PER_TOKEN")?
                .unwrap_or(defaults.chars_per_token)
                .max(1),
            chunked_threshold_tokens: parse_optional("ANALYSIS_CHUNKED_THRESHOLD_TOKENS")?
                .unwrap_or(defaults.chunked_threshold_tokens),
            reduced_threshold_tokens: parse_optional("ANALYSIS_REDUCED_THRESHOLD_TOKENS")?
                .unwrap_or(defaults.reduced_threshold_tokens),
            reduced_max_chars: parse_optional("ANALYSIS_REDUCED_MAX_CHARS")?
                .unwrap_or(defaults.reduced_max_chars),
            min_content_chars: parse_optional("ANALYSIS_MIN_CONTENT_CHARS")?
                .unwrap_or(defaults.min_content_chars),
            fail_on_total_failure: parse_optional("ANALYSIS_FAIL_ON_TOTAL_FAILURE")?
                .unwrap_or(defaults.fail_on_total_failure),
            caps: defaults.caps,
        };

        validate_analysis(&analysis)?;

        Ok(Self {
            completion_api_url: load_env_optional("COMPLETION_API_URL")
                .unwrap_or_else(|| DEFAULT_COMPLETION_API_URL.to_string()),
            completion_api_key: load_env("COMPLETION_API_KEY")?,
            qdrant_url: load_env_optional("QDRANT_URL"),
            qdrant_collection_name: load_env_optional("QDRANT_COLLECTION_NAME")
                .unwrap_or_else(|| DEFAULT_QDRANT_COLLECTION.to_string()),
            qdrant_api_key: load_env_optional("QDRANT_API_KEY"),
            embedding_model: load_env_optional("EMBEDDING_MODEL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            retrieval_match_threshold: parse_optional::<f32>("RETRIEVAL_MATCH_THRESHOLD")?
                .unwrap_or(0.6)
                .clamp(0.0, 1.0),
            retrieval_match_count: parse_optional("RETRIEVAL_MATCH_COUNT")?.unwrap_or(3),
            prompt_store_path: load_env_optional("PROMPT_STORE_PATH")
                .unwrap_or_else(|| DEFAULT_PROMPT_STORE_PATH.to_string()),
            analysis,
            server_port: parse_optional("SERVER_PORT")?,
        })
    }

    /// Whether the retrieval collaborator should be wired into the pipeline.
    pub fn retrieval_enabled(&self) -> bool {
        self.qdrant_url.is_some()
    }
}

fn validate_analysis(analysis: &AnalysisSettings) -> Result<(), ConfigError> {
    if analysis.reduced_threshold_tokens < analysis.chunked_threshold_tokens {
        return Err(ConfigError::InvalidValue(
            "ANALYSIS_REDUCED_THRESHOLD_TOKENS must not be below ANALYSIS_CHUNKED_THRESHOLD_TOKENS"
                .to_string(),
        ));
    }
    if analysis.reduced_max_chars < MIN_REDUCED_MAX_CHARS {
        return Err(ConfigError::InvalidValue(format!(
            "ANALYSIS_REDUCED_MAX_CHARS must be at least {MIN_REDUCED_MAX_CHARS}"
        )));
    }
    Ok(())
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_optional<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        completion_api_url = %config.completion_api_url,
        retrieval_enabled = config.retrieval_enabled(),
        collection = %config.qdrant_collection_name,
        prompt_store = %config.prompt_store_path,
        server_port = ?config.server_port,
        max_segments = config.analysis.max_segments,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}
