use std::sync::atomic::{AtomicU64, Ordering};

use crate::analysis::Strategy;

/// Thread-safe counters describing analysis activity.
#[derive(Default)]
pub struct AnalysisMetrics {
    documents_analyzed: AtomicU64,
    extraction_failures: AtomicU64,
    analyses_failed: AtomicU64,
    segments_processed: AtomicU64,
    segments_failed: AtomicU64,
    direct_runs: AtomicU64,
    chunked_runs: AtomicU64,
    reduced_runs: AtomicU64,
}

impl AnalysisMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed analysis and its segment counts.
    pub fn record_analysis(&self, strategy: Strategy, attempted: u64, failed: u64) {
        self.documents_analyzed.fetch_add(1, Ordering::Relaxed);
        self.segments_processed
            .fetch_add(attempted, Ordering::Relaxed);
        self.segments_failed.fetch_add(failed, Ordering::Relaxed);
        let counter = match strategy {
            Strategy::Direct => &self.direct_runs,
            Strategy::Chunked => &self.chunked_runs,
            Strategy::Reduced => &self.reduced_runs,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an upload rejected during text extraction.
    pub fn record_extraction_failure(&self) {
        self.extraction_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an analysis aborted after extraction.
    pub fn record_analysis_failure(&self) {
        self.analyses_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_analyzed: self.documents_analyzed.load(Ordering::Relaxed),
            extraction_failures: self.extraction_failures.load(Ordering::Relaxed),
            analyses_failed: self.analyses_failed.load(Ordering::Relaxed),
            segments_processed: self.segments_processed.load(Ordering::Relaxed),
            segments_failed: self.segments_failed.load(Ordering::Relaxed),
            direct_runs: self.direct_runs.load(Ordering::Relaxed),
            chunked_runs: self.chunked_runs.load(Ordering::Relaxed),
            reduced_runs: self.reduced_runs.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of analysis counters used for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    /// Documents that produced a report since startup.
    pub documents_analyzed: u64,
    /// Uploads rejected during text extraction.
    pub extraction_failures: u64,
    /// Analyses aborted after extraction.
    pub analyses_failed: u64,
    /// Segments sent to the completion service.
    pub segments_processed: u64,
    /// Segments replaced by a degraded result.
    pub segments_failed: u64,
    /// Analyses that used the direct strategy.
    pub direct_runs: u64,
    /// Analyses that used the chunked strategy.
    pub chunked_runs: u64,
    /// Analyses that used the reduced strategy.
    pub reduced_runs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_analyses_and_segments() {
        let metrics = AnalysisMetrics::new();
        metrics.record_analysis(Strategy::Direct, 1, 0);
        metrics.record_analysis(Strategy::Chunked, 3, 1);
        metrics.record_extraction_failure();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.documents_analyzed, 2);
        assert_eq!(snapshot.segments_processed, 4);
        assert_eq!(snapshot.segments_failed, 1);
        assert_eq!(snapshot.direct_runs, 1);
        assert_eq!(snapshot.chunked_runs, 1);
        assert_eq!(snapshot.reduced_runs, 0);
        assert_eq!(snapshot.extraction_failures, 1);
    }

    #[test]
    fn snapshot_starts_empty() {
        assert_eq!(AnalysisMetrics::new().snapshot(), MetricsSnapshot::default());
    }
}
