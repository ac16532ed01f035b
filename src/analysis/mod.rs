//! Contract analysis pipeline: strategy selection, segmentation, reduction, merging, and the
//! document-level service.

pub mod chunking;
pub mod merge;
mod orchestrator;
mod parse;
pub mod reducer;
mod service;
pub mod strategy;
pub mod types;

pub use orchestrator::ContractAnalyzer;
pub use parse::parse_partial_analysis;
pub use service::{AnalysisApi, AnalysisService};
pub use types::{
    AnalysisError, AnalysisOutcome, AnalysisReport, AnalysisRun, AnalysisSettings, AnalysisState,
    ChunkingError, ComplianceItem, ComplianceStatus, ListCaps, PartialAnalysis, Priority, Risk,
    RiskLevel, ServiceInitError, Strategy, Suggestion,
};
