#![deny(missing_docs)]

//! Core library for the Clausewise contract analysis server.

/// Contract analysis pipeline and document-level service.
pub mod analysis;
/// HTTP routing and REST handlers.
pub mod api;
/// Completion service client abstraction and adapters.
pub mod completion;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Upload decoding and text cleaning.
pub mod extraction;
/// Structured logging and tracing setup.
pub mod logging;
/// Analysis metrics helpers.
pub mod metrics;
/// Prompt configuration and its version log.
pub mod prompt;
/// Qdrant vector store integration.
pub mod qdrant;
/// Reference-document retrieval for prompt enrichment.
pub mod retrieval;
