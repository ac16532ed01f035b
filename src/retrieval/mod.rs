//! Optional retrieval of reference laws, regulations, and contract templates.
//!
//! The orchestrator asks a [`RetrievalClient`] for documents similar to the contract and
//! injects them into the system prompt. Retrieval never fails an analysis: any error leaves
//! the prompt unenriched.

mod context;

pub use context::{build_context, document_type_label, inject_context};

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::embedding::{EmbeddingClient, EmbeddingClientError};
use crate::qdrant::filters::DOCUMENT_TYPE_FIELD;
use crate::qdrant::{QdrantError, QdrantService, build_document_type_filter, payload_text};

/// Characters of the contract used as the similarity query.
pub const QUERY_CHARS: usize = 8000;

/// Errors raised while looking up reference documents.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// Query could not be embedded.
    #[error(transparent)]
    Embedding(#[from] EmbeddingClientError),
    /// Vector store query failed.
    #[error(transparent)]
    Qdrant(#[from] QdrantError),
}

/// Reference document returned by a similarity query.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedDocument {
    /// Point identifier.
    pub id: String,
    /// Document title, when recorded.
    pub title: Option<String>,
    /// Source file name, when recorded.
    pub filename: Option<String>,
    /// Document content.
    pub content: String,
    /// Category (`contract_template`, `law`, `regulation`, ...).
    pub document_type: String,
    /// Similarity in `[0, 1]`.
    pub similarity: f32,
}

/// Query tuning for reference lookups.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalOptions {
    /// Collection holding the reference documents.
    pub collection: String,
    /// Minimum similarity accepted.
    pub match_threshold: f32,
    /// Maximum number of documents returned.
    pub match_count: usize,
    /// Accepted document categories.
    pub document_types: Vec<String>,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self {
            collection: "legal_documents".to_string(),
            match_threshold: 0.6,
            match_count: 3,
            document_types: vec![
                "contract_template".to_string(),
                "law".to_string(),
                "regulation".to_string(),
            ],
        }
    }
}

/// Interface implemented by reference-document sources.
#[async_trait]
pub trait RetrievalClient: Send + Sync {
    /// Documents similar to `text`, most similar first.
    async fn find_similar(&self, text: &str) -> Result<Vec<RetrievedDocument>, RetrievalError>;
}

/// Retrieval backed by an embedding model and a Qdrant collection.
pub struct QdrantRetrievalClient {
    embeddings: Arc<dyn EmbeddingClient>,
    qdrant: QdrantService,
    options: RetrievalOptions,
}

impl QdrantRetrievalClient {
    /// Combine an embedding client and a Qdrant client.
    pub fn new(
        embeddings: Arc<dyn EmbeddingClient>,
        qdrant: QdrantService,
        options: RetrievalOptions,
    ) -> Self {
        Self {
            embeddings,
            qdrant,
            options,
        }
    }
}

#[async_trait]
impl RetrievalClient for QdrantRetrievalClient {
    async fn find_similar(&self, text: &str) -> Result<Vec<RetrievedDocument>, RetrievalError> {
        let query: String = text.chars().take(QUERY_CHARS).collect();
        let vector = self
            .embeddings
            .generate_embeddings(vec![query])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                EmbeddingClientError::InvalidResponse("no embedding returned for query".into())
            })?;

        let points = self
            .qdrant
            .search_points(
                &self.options.collection,
                vector,
                build_document_type_filter(&self.options.document_types),
                self.options.match_count,
                Some(self.options.match_threshold),
            )
            .await?;

        let documents: Vec<RetrievedDocument> = points
            .into_iter()
            .filter_map(|point| {
                let payload = point.payload?;
                let document_type = payload_text(&payload, DOCUMENT_TYPE_FIELD)?.to_string();
                if !self.options.document_types.contains(&document_type) {
                    return None;
                }
                Some(RetrievedDocument {
                    id: point.id,
                    title: payload_text(&payload, "title").map(str::to_string),
                    filename: payload_text(&payload, "filename").map(str::to_string),
                    content: payload_text(&payload, "content")
                        .or_else(|| payload_text(&payload, "text"))
                        .unwrap_or_default()
                        .to_string(),
                    document_type,
                    similarity: point.score,
                })
            })
            .collect();

        tracing::debug!(
            collection = %self.options.collection,
            documents = documents.len(),
            "Reference documents retrieved"
        );
        Ok(documents)
    }
}
