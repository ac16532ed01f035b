//! Strategy selection, segment folding, and finalization for one extracted text.

use std::sync::Arc;

use futures_util::{StreamExt, stream};

use super::chunking::chunk_text;
use super::merge::{apply_checklist, finalize, merge};
use super::parse::parse_partial_analysis;
use super::reducer::reduce;
use super::strategy::{estimate_tokens, select_strategy};
use super::types::{
    AnalysisError, AnalysisRun, AnalysisSettings, AnalysisState, PartialAnalysis,
    ReportAccumulator, Strategy,
};
use crate::completion::{CompletionClient, CompletionRequest};
use crate::extraction::ExtractedText;
use crate::prompt::PromptConfig;
use crate::retrieval::{RetrievalClient, build_context, inject_context};

/// Drives a contract text through strategy selection, completion calls, and merging.
///
/// Segments are processed strictly in order because each prompt carries context from the
/// segments already merged.
pub struct ContractAnalyzer {
    completion: Arc<dyn CompletionClient>,
    retrieval: Option<Arc<dyn RetrievalClient>>,
    settings: AnalysisSettings,
}

#[derive(Default)]
struct SegmentFold {
    report: ReportAccumulator,
    attempted: usize,
    failed: usize,
}

impl ContractAnalyzer {
    /// Analyzer without retrieval enrichment.
    pub fn new(completion: Arc<dyn CompletionClient>, settings: AnalysisSettings) -> Self {
        Self {
            completion,
            retrieval: None,
            settings,
        }
    }

    /// Enrich system prompts with reference documents from `retrieval`.
    pub fn with_retrieval(mut self, retrieval: Arc<dyn RetrievalClient>) -> Self {
        self.retrieval = Some(retrieval);
        self
    }

    /// Analyze an extracted contract with the given prompt configuration.
    ///
    /// Segment failures degrade the report instead of aborting it. Only when every segment
    /// fails and `fail_on_total_failure` is set does this return
    /// [`AnalysisError::AllSegmentsFailed`].
    pub async fn analyze(
        &self,
        text: &ExtractedText,
        prompt: &PromptConfig,
    ) -> Result<AnalysisRun, AnalysisError> {
        let mut states = vec![AnalysisState::Init];
        let estimated_tokens = estimate_tokens(text.as_str(), self.settings.chars_per_token);
        let strategy = select_strategy(estimated_tokens, &self.settings);
        states.push(AnalysisState::StrategySelected(strategy));
        tracing::info!(
            chars = text.char_len(),
            estimated_tokens,
            strategy = ?strategy,
            "Selected analysis strategy"
        );

        let segments = match strategy {
            Strategy::Direct => vec![text.as_str().to_string()],
            Strategy::Reduced => {
                vec![reduce(text.as_str(), self.settings.reduced_max_chars).into_string()]
            }
            Strategy::Chunked => chunk_text(
                text.as_str(),
                self.settings.max_segment_chars,
                self.settings.max_segments,
            )?,
        };

        let system_prompt = self.system_prompt(text, prompt).await;
        let system_prompt = system_prompt.as_str();

        states.push(AnalysisState::SegmentsProcessing);
        let fold = stream::iter(segments.into_iter().enumerate())
            .fold(SegmentFold::default(), move |fold, (index, segment)| {
                self.fold_segment(fold, index, segment, system_prompt, prompt)
            })
            .await;

        states.push(AnalysisState::Finalizing);
        let succeeded = fold.attempted - fold.failed;
        if succeeded == 0 && self.settings.fail_on_total_failure {
            states.push(AnalysisState::Failed);
            tracing::warn!(
                attempted = fold.attempted,
                "Every segment failed; aborting analysis"
            );
            return Err(AnalysisError::AllSegmentsFailed {
                attempted: fold.attempted,
            });
        }

        let mut accumulated = fold.report;
        let checklist = accumulated
            .contract_type
            .as_deref()
            .and_then(|contract_type| prompt.checklist_for(contract_type));
        if let Some(checklist) = checklist {
            tracing::debug!(checklist = %checklist.key, "Applying contract-type checklist");
            accumulated = apply_checklist(accumulated, checklist);
        }
        let report = finalize(accumulated, &self.settings.caps);
        states.push(AnalysisState::Done);

        tracing::info!(
            strategy = ?strategy,
            segments_attempted = fold.attempted,
            segments_failed = fold.failed,
            risks = report.risks.len(),
            "Analysis finished"
        );

        Ok(AnalysisRun {
            report,
            strategy,
            estimated_tokens,
            segments_attempted: fold.attempted,
            segments_failed: fold.failed,
            states,
        })
    }

    async fn system_prompt(&self, text: &ExtractedText, prompt: &PromptConfig) -> String {
        let Some(retrieval) = &self.retrieval else {
            return prompt.system_prompt.clone();
        };

        match retrieval.find_similar(text.as_str()).await {
            Ok(documents) if documents.is_empty() => {
                tracing::debug!("No reference documents found; using the configured prompt");
                prompt.system_prompt.clone()
            }
            Ok(documents) => {
                tracing::info!(documents = documents.len(), "Enriching prompt with references");
                inject_context(
                    &prompt.system_prompt,
                    &build_context(&documents),
                    &prompt.rules_anchor,
                )
            }
            Err(error) => {
                tracing::warn!(error = %error, "Reference retrieval failed; using the configured prompt");
                prompt.system_prompt.clone()
            }
        }
    }

    async fn fold_segment(
        &self,
        mut fold: SegmentFold,
        index: usize,
        segment: String,
        system_prompt: &str,
        prompt: &PromptConfig,
    ) -> SegmentFold {
        let user_prompt = prompt.user_prompt_template.render(
            &segment,
            index == 0,
            &fold.report.carried_context(),
        );
        let request = CompletionRequest {
            system_prompt: system_prompt.to_string(),
            user_prompt,
            parameters: prompt.model.clone(),
        };

        fold.attempted += 1;
        let partial = match self.completion.complete(request).await {
            Ok(raw) => parse_partial_analysis(&raw),
            Err(error) => Err(error),
        };
        let partial = match partial {
            Ok(partial) => partial,
            Err(error) => {
                fold.failed += 1;
                tracing::warn!(segment = index, error = %error, "Segment analysis failed; substituting a degraded result");
                PartialAnalysis::incomplete()
            }
        };

        fold.report = merge(fold.report, partial);
        fold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::types::{
        AnalysisReport, DEFAULT_CONTRACT_TYPE, INCOMPLETE_ANALYSIS_TITLE, MANUAL_REVIEW_KEY_POINT,
    };
    use crate::completion::CompletionError;
    use crate::retrieval::{RetrievalError, RetrievedDocument};
    use async_trait::async_trait;
    use std::sync::Mutex;

    const FIXED_COMPLETION: &str = r#"{
        "contractType": "Software license",
        "overallScore": 8,
        "risks": [{"level": "low", "title": "Audit rights", "description": "Broad audits", "recommendation": "Limit", "legalReference": "Art. 230 DOC"}],
        "suggestions": [{"priority": "medium", "title": "Add SLA", "description": "No SLA", "impact": "Clarity", "implementation": "Annex"}],
        "compliance": [{"status": "compliant", "article": "Loi 09-08", "description": "Data protection clause present", "action": ""}],
        "summary": "Solid license.",
        "keyPoints": ["Perpetual license"],
        "urgentActions": []
    }"#;

    /// Returns queued completions in order and records every request.
    struct ScriptedCompletion {
        responses: Mutex<Vec<Result<String, CompletionError>>>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedCompletion {
        fn new(responses: Vec<Result<String, CompletionError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into_iter().rev().collect()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<CompletionRequest> {
            self.requests.lock().expect("lock").clone()
        }
    }

    #[async_trait]
    impl CompletionClient for ScriptedCompletion {
        async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError> {
            self.requests.lock().expect("lock").push(request);
            self.responses
                .lock()
                .expect("lock")
                .pop()
                .unwrap_or_else(|| Err(CompletionError::ProviderUnavailable("script exhausted".into())))
        }
    }

    struct StaticRetrieval(Result<Vec<RetrievedDocument>, ()>);

    #[async_trait]
    impl RetrievalClient for StaticRetrieval {
        async fn find_similar(&self, _text: &str) -> Result<Vec<RetrievedDocument>, RetrievalError> {
            self.0.clone().map_err(|_| {
                RetrievalError::Embedding(crate::embedding::EmbeddingClientError::ProviderUnavailable(
                    "offline".into(),
                ))
            })
        }
    }

    fn text_of(chars: usize) -> ExtractedText {
        let sentence = "The lessee shall pay the rent monthly. ";
        let mut paragraphs = Vec::new();
        let mut total = 0;
        while total < chars {
            let paragraph = sentence.repeat(8);
            total += paragraph.len() + 2;
            paragraphs.push(paragraph.trim().to_string());
        }
        ExtractedText::from_raw(&paragraphs.join("\n\n"), 1).expect("text")
    }

    fn contract(chars: usize) -> ExtractedText {
        let body: String = "Clause text. ".repeat(chars / 13 + 1);
        ExtractedText::from_raw(&body[..chars], 1).expect("text")
    }

    #[tokio::test]
    async fn short_contract_is_analyzed_directly_and_returned_unchanged() {
        let completion = ScriptedCompletion::new(vec![Ok(FIXED_COMPLETION.to_string())]);
        let analyzer = ContractAnalyzer::new(completion.clone(), AnalysisSettings::default());

        let run = analyzer
            .analyze(&contract(300), &PromptConfig::default())
            .await
            .expect("analysis");

        assert_eq!(run.strategy, Strategy::Direct);
        assert_eq!(run.segments_attempted, 1);
        assert_eq!(run.segments_failed, 0);
        let expected: AnalysisReport =
            serde_json::from_str(FIXED_COMPLETION).expect("fixed completion is a report");
        assert_eq!(run.report, expected);
        assert_eq!(
            run.states,
            vec![
                AnalysisState::Init,
                AnalysisState::StrategySelected(Strategy::Direct),
                AnalysisState::SegmentsProcessing,
                AnalysisState::Finalizing,
                AnalysisState::Done,
            ]
        );

        let requests = completion.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].user_prompt.contains("NEW CONTRACT TO ANALYZE"));
        assert!(!requests[0].user_prompt.contains("PREVIOUS CONTEXT"));
    }

    #[tokio::test]
    async fn failing_completion_yields_degraded_report() {
        let completion = ScriptedCompletion::new(vec![Err(CompletionError::RateLimited(
            "quota".into(),
        ))]);
        let analyzer = ContractAnalyzer::new(completion, AnalysisSettings::default());

        let run = analyzer
            .analyze(&contract(300), &PromptConfig::default())
            .await
            .expect("degraded analysis");

        assert_eq!(run.segments_failed, 1);
        assert_eq!(run.report.risks.len(), 1);
        assert_eq!(run.report.risks[0].title, INCOMPLETE_ANALYSIS_TITLE);
        assert_eq!(run.report.contract_type, DEFAULT_CONTRACT_TYPE);
        assert_eq!(run.report.key_points, vec![MANUAL_REVIEW_KEY_POINT]);
    }

    #[tokio::test]
    async fn unparsable_completion_is_a_segment_failure() {
        let completion = ScriptedCompletion::new(vec![Ok("Sorry, no JSON today.".into())]);
        let analyzer = ContractAnalyzer::new(completion, AnalysisSettings::default());

        let run = analyzer
            .analyze(&contract(300), &PromptConfig::default())
            .await
            .expect("degraded analysis");

        assert_eq!(run.segments_failed, 1);
        assert_eq!(run.report.risks[0].title, INCOMPLETE_ANALYSIS_TITLE);
    }

    #[tokio::test]
    async fn total_failure_escalates_when_configured() {
        let completion = ScriptedCompletion::new(vec![Err(CompletionError::EmptyCompletion)]);
        let settings = AnalysisSettings {
            fail_on_total_failure: true,
            ..AnalysisSettings::default()
        };
        let analyzer = ContractAnalyzer::new(completion, settings);

        let error = analyzer
            .analyze(&contract(300), &PromptConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(error, AnalysisError::AllSegmentsFailed { attempted: 1 }));
    }

    #[tokio::test]
    async fn long_contract_is_chunked_and_capped() {
        let completion = ScriptedCompletion::new(vec![
            Ok(r#"{"contractType":"Residential lease","overallScore":6,"risks":[{"title":"Deposit","description":"first"}]}"#.into()),
            Ok(r#"{"contractType":"Other","overallScore":2,"risks":[{"title":"Deposit","description":"second"},{"title":"Repairs"}]}"#.into()),
            Ok(r#"{"risks":[{"title":"Renewal"}]}"#.into()),
        ]);
        let analyzer = ContractAnalyzer::new(completion.clone(), AnalysisSettings::default());

        let run = analyzer
            .analyze(&text_of(20_000), &PromptConfig::default())
            .await
            .expect("analysis");

        assert_eq!(run.strategy, Strategy::Chunked);
        assert_eq!(run.segments_attempted, 3);
        assert_eq!(run.report.contract_type, "Residential lease");
        assert_eq!(run.report.overall_score, 6);
        let titles: Vec<&str> = run.report.risks.iter().map(|risk| risk.title.as_str()).collect();
        assert_eq!(titles, vec!["Deposit", "Repairs", "Renewal"]);
        assert_eq!(run.report.risks[0].description, "first");
        assert!(
            run.report
                .suggestions
                .iter()
                .any(|suggestion| suggestion.title.starts_with("Specialized check:"))
        );

        let requests = completion.requests();
        assert_eq!(requests.len(), 3);
        assert!(requests[1].user_prompt.contains("CONTINUATION OF THE CONTRACT"));
        assert!(
            requests[1]
                .user_prompt
                .contains("PREVIOUS CONTEXT: Type: Residential lease, Score: 6/10")
        );
    }

    #[tokio::test]
    async fn very_long_contract_is_reduced_to_one_call() {
        let completion = ScriptedCompletion::new(vec![Ok(FIXED_COMPLETION.to_string())]);
        let analyzer = ContractAnalyzer::new(completion.clone(), AnalysisSettings::default());

        let run = analyzer
            .analyze(&text_of(40_000), &PromptConfig::default())
            .await
            .expect("analysis");

        assert_eq!(run.strategy, Strategy::Reduced);
        assert_eq!(run.segments_attempted, 1);
        let requests = completion.requests();
        assert!(requests[0].user_prompt.chars().count() < 40_000);
    }

    #[tokio::test]
    async fn retrieval_context_is_injected_before_rules() {
        let completion = ScriptedCompletion::new(vec![Ok(FIXED_COMPLETION.to_string())]);
        let retrieval = Arc::new(StaticRetrieval(Ok(vec![RetrievedDocument {
            id: "1".into(),
            title: Some("Loi 31-08".into()),
            filename: None,
            content: "Consumer protection.".into(),
            document_type: "law".into(),
            similarity: 0.9,
        }])));
        let analyzer = ContractAnalyzer::new(completion.clone(), AnalysisSettings::default())
            .with_retrieval(retrieval);

        analyzer
            .analyze(&contract(300), &PromptConfig::default())
            .await
            .expect("analysis");

        let system_prompt = &completion.requests()[0].system_prompt;
        let context_at = system_prompt.find("Loi 31-08").expect("context injected");
        let rules_at = system_prompt.find("STRICT RULES:").expect("rules kept");
        assert!(context_at < rules_at);
    }

    #[tokio::test]
    async fn retrieval_failure_keeps_configured_prompt() {
        let completion = ScriptedCompletion::new(vec![Ok(FIXED_COMPLETION.to_string())]);
        let analyzer = ContractAnalyzer::new(completion.clone(), AnalysisSettings::default())
            .with_retrieval(Arc::new(StaticRetrieval(Err(()))));

        let run = analyzer
            .analyze(&contract(300), &PromptConfig::default())
            .await
            .expect("analysis");

        assert_eq!(run.segments_failed, 0);
        assert_eq!(
            completion.requests()[0].system_prompt,
            PromptConfig::default().system_prompt
        );
    }
}
