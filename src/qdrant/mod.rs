//! Qdrant vector store integration for reference-document retrieval.

pub mod client;
pub mod filters;
pub mod types;

pub use client::QdrantService;
pub use filters::{build_document_type_filter, payload_text};
pub use types::{QdrantError, ScoredPoint};
