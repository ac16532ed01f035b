//! Document-level analysis service shared by the HTTP router and the CLI.

use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::Instrument;
use uuid::Uuid;

use super::orchestrator::ContractAnalyzer;
use super::types::{AnalysisError, AnalysisOutcome, ServiceInitError};
use crate::completion::OpenAiCompletionClient;
use crate::config::Config;
use crate::embedding::OpenAiEmbeddingClient;
use crate::extraction::{ExtractionError, RawDocument, TextExtractor};
use crate::metrics::{AnalysisMetrics, MetricsSnapshot};
use crate::prompt::{
    PromptConfig, PromptHistoryEntry, PromptSnapshot, PromptStats, PromptStore, PromptStoreError,
    PromptUpdate,
};
use crate::qdrant::QdrantService;
use crate::retrieval::{QdrantRetrievalClient, RetrievalOptions};

/// Abstraction over the analysis pipeline used by external surfaces (HTTP, CLI).
#[async_trait]
pub trait AnalysisApi: Send + Sync {
    /// Extract, analyze, and report on one uploaded document.
    async fn analyze_document(
        &self,
        document: RawDocument,
    ) -> Result<AnalysisOutcome, AnalysisError>;

    /// Prompt configuration currently in effect.
    fn prompt_current(&self) -> PromptConfig;

    /// Summary of the prompt log.
    fn prompt_stats(&self) -> PromptStats;

    /// Versions recorded in the prompt log, oldest first.
    fn prompt_history(&self) -> Vec<PromptHistoryEntry>;

    /// Apply a partial edit and record it as a new version.
    fn update_prompt(&self, update: PromptUpdate) -> Result<PromptSnapshot, PromptStoreError>;

    /// Make a historical version current again.
    fn restore_prompt(&self, version: &str) -> Result<PromptSnapshot, PromptStoreError>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

/// Coordinates extraction, analysis, prompt versioning, and metrics.
///
/// Construct the service once near process start and share it through an `Arc`.
pub struct AnalysisService {
    extractor: Arc<TextExtractor>,
    analyzer: ContractAnalyzer,
    prompts: Arc<PromptStore>,
    metrics: Arc<AnalysisMetrics>,
}

impl AnalysisService {
    /// Assemble a service from already-built collaborators.
    pub fn new(extractor: TextExtractor, analyzer: ContractAnalyzer, prompts: PromptStore) -> Self {
        Self {
            extractor: Arc::new(extractor),
            analyzer,
            prompts: Arc::new(prompts),
            metrics: Arc::new(AnalysisMetrics::new()),
        }
    }

    /// Wire the completion client, optional retrieval, and prompt log from configuration.
    pub fn from_config(config: &Config) -> Result<Self, ServiceInitError> {
        let settings = config.analysis.clone();
        let completion = OpenAiCompletionClient::new(
            config.completion_api_url.clone(),
            config.completion_api_key.clone(),
        )?;
        let mut analyzer = ContractAnalyzer::new(Arc::new(completion), settings.clone());

        if let Some(qdrant_url) = config.qdrant_url.as_deref() {
            let embeddings = OpenAiEmbeddingClient::new(
                config.completion_api_url.clone(),
                config.completion_api_key.clone(),
                config.embedding_model.clone(),
            )?;
            let qdrant = QdrantService::new(qdrant_url, config.qdrant_api_key.clone())?;
            let options = RetrievalOptions {
                collection: config.qdrant_collection_name.clone(),
                match_threshold: config.retrieval_match_threshold,
                match_count: config.retrieval_match_count,
                ..RetrievalOptions::default()
            };
            tracing::info!(
                collection = %options.collection,
                match_count = options.match_count,
                "Retrieval enrichment enabled"
            );
            analyzer = analyzer.with_retrieval(Arc::new(QdrantRetrievalClient::new(
                Arc::new(embeddings),
                qdrant,
                options,
            )));
        } else {
            tracing::info!("QDRANT_URL not set; retrieval enrichment disabled");
        }

        let prompts = PromptStore::open(&config.prompt_store_path)?;
        tracing::info!(
            version = %prompts.current().version,
            path = %config.prompt_store_path,
            "Prompt log loaded"
        );

        Ok(Self::new(
            TextExtractor::new(settings.min_content_chars),
            analyzer,
            prompts,
        ))
    }

    /// Extract and analyze one document.
    pub async fn analyze_document(
        &self,
        document: RawDocument,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        let analysis_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "analysis",
            %analysis_id,
            name = %document.original_name,
            size = document.size
        );
        self.run(document).instrument(span).await
    }

    async fn run(&self, document: RawDocument) -> Result<AnalysisOutcome, AnalysisError> {
        let document_sha256 = hex::encode(Sha256::digest(&document.bytes));
        tracing::info!(sha256 = %document_sha256, "Document received");

        let extractor = Arc::clone(&self.extractor);
        let extracted = tokio::task::spawn_blocking(move || extractor.extract(&document))
            .await
            .map_err(|error| {
                ExtractionError::CorruptDocument(format!("document decoder aborted: {error}"))
            })
            .and_then(|result| result);
        let text = match extracted {
            Ok(text) => text,
            Err(error) => {
                self.metrics.record_extraction_failure();
                tracing::warn!(%error, "Text extraction failed");
                return Err(error.into());
            }
        };

        let prompt = self.prompts.current();
        let run = match self.analyzer.analyze(&text, &prompt).await {
            Ok(run) => run,
            Err(error) => {
                self.metrics.record_analysis_failure();
                tracing::warn!(%error, "Analysis failed");
                return Err(error);
            }
        };

        self.metrics.record_analysis(
            run.strategy,
            run.segments_attempted as u64,
            run.segments_failed as u64,
        );
        tracing::info!(
            strategy = ?run.strategy,
            segments = run.segments_attempted,
            failed = run.segments_failed,
            score = run.report.overall_score,
            prompt_version = %prompt.version,
            "Analysis completed"
        );

        Ok(AnalysisOutcome {
            run,
            document_sha256,
            prompt_version: prompt.version,
        })
    }
}

#[async_trait]
impl AnalysisApi for AnalysisService {
    async fn analyze_document(
        &self,
        document: RawDocument,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        AnalysisService::analyze_document(self, document).await
    }

    fn prompt_current(&self) -> PromptConfig {
        self.prompts.current()
    }

    fn prompt_stats(&self) -> PromptStats {
        self.prompts.stats()
    }

    fn prompt_history(&self) -> Vec<PromptHistoryEntry> {
        self.prompts.history()
    }

    fn update_prompt(&self, update: PromptUpdate) -> Result<PromptSnapshot, PromptStoreError> {
        self.prompts.update(update)
    }

    fn restore_prompt(&self, version: &str) -> Result<PromptSnapshot, PromptStoreError> {
        self.prompts.restore(version)
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::types::{AnalysisSettings, Strategy};
    use crate::completion::{CompletionClient, CompletionError, CompletionRequest};
    use crate::extraction::{DocumentDecoder, MediaType};

    struct Utf8Decoder;

    impl DocumentDecoder for Utf8Decoder {
        fn media_type(&self) -> MediaType {
            MediaType::Pdf
        }

        fn decode(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
            String::from_utf8(bytes.to_vec())
                .map_err(|error| ExtractionError::CorruptDocument(error.to_string()))
        }
    }

    struct PanickingDecoder;

    impl DocumentDecoder for PanickingDecoder {
        fn media_type(&self) -> MediaType {
            MediaType::Docx
        }

        fn decode(&self, _bytes: &[u8]) -> Result<String, ExtractionError> {
            panic!("decoder blew up");
        }
    }

    struct FixedCompletion(Result<String, ()>);

    #[async_trait]
    impl CompletionClient for FixedCompletion {
        async fn complete(&self, _request: CompletionRequest) -> Result<String, CompletionError> {
            self.0
                .clone()
                .map_err(|_| CompletionError::ProviderUnavailable("offline".into()))
        }
    }

    fn service(completion: FixedCompletion) -> AnalysisService {
        let settings = AnalysisSettings::default();
        AnalysisService::new(
            TextExtractor::with_decoders(
                vec![Box::new(Utf8Decoder), Box::new(PanickingDecoder)],
                settings.min_content_chars,
            ),
            ContractAnalyzer::new(Arc::new(completion), settings),
            PromptStore::in_memory(PromptConfig::default()),
        )
    }

    fn contract_bytes() -> Vec<u8> {
        "Article 1. The lessor rents the premises to the lessee for three years.\n\nArticle 2. Rent is payable monthly."
            .as_bytes()
            .to_vec()
    }

    #[tokio::test]
    async fn analyzes_document_and_records_metrics() {
        let service = service(FixedCompletion(Ok(
            r#"{"contractType": "Bail", "overallScore": 8, "summary": "Sound lease."}"#.into(),
        )));
        let outcome = service
            .analyze_document(RawDocument::new(contract_bytes(), "application/pdf", "bail.pdf"))
            .await
            .expect("outcome");

        assert_eq!(outcome.run.strategy, Strategy::Direct);
        assert_eq!(outcome.run.report.overall_score, 8);
        assert_eq!(outcome.prompt_version, "1.0.0");
        assert_eq!(outcome.document_sha256, hex::encode(Sha256::digest(contract_bytes())));

        let metrics = service.metrics_snapshot();
        assert_eq!(metrics.documents_analyzed, 1);
        assert_eq!(metrics.direct_runs, 1);
        assert_eq!(metrics.segments_processed, 1);
    }

    #[tokio::test]
    async fn unsupported_upload_counts_as_extraction_failure() {
        let service = service(FixedCompletion(Err(())));
        let error = service
            .analyze_document(RawDocument::new(b"plain".to_vec(), "text/plain", "notes.txt"))
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            AnalysisError::Extraction(ExtractionError::UnsupportedFormat(_))
        ));
        assert_eq!(service.metrics_snapshot().extraction_failures, 1);
        assert_eq!(service.metrics_snapshot().documents_analyzed, 0);
    }

    #[tokio::test]
    async fn decoder_panic_surfaces_as_corrupt_document() {
        let service = service(FixedCompletion(Err(())));
        let error = service
            .analyze_document(RawDocument::new(b"PK".to_vec(), "", "contract.docx"))
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            AnalysisError::Extraction(ExtractionError::CorruptDocument(_))
        ));
    }

    #[tokio::test]
    async fn completion_outage_still_yields_degraded_report() {
        let service = service(FixedCompletion(Err(())));
        let outcome = service
            .analyze_document(RawDocument::new(contract_bytes(), "application/pdf", "bail.pdf"))
            .await
            .expect("degraded outcome");

        assert_eq!(outcome.run.segments_failed, 1);
        assert_eq!(service.metrics_snapshot().segments_failed, 1);
    }

    #[test]
    fn prompt_updates_flow_through_the_store() {
        let service = service(FixedCompletion(Err(())));
        let snapshot = service
            .update_prompt(PromptUpdate {
                rules_anchor: Some("RULES:".into()),
                ..PromptUpdate::default()
            })
            .expect("updated");

        assert_eq!(snapshot.config.version, "1.0.1");
        assert_eq!(service.prompt_current().rules_anchor, "RULES:");
        assert_eq!(service.prompt_history().len(), 2);

        let restored = service.restore_prompt("1.0.0").expect("restored");
        assert_eq!(restored.restored_from.as_deref(), Some("1.0.0"));
        assert_eq!(service.prompt_stats().current_version, restored.config.version);
    }
}
