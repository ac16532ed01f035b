//! Token estimation and strategy selection.

use super::types::{AnalysisSettings, Strategy};

/// Estimate the token count of `text` from its character count.
pub fn estimate_tokens(text: &str, chars_per_token: usize) -> usize {
    text.chars().count().div_ceil(chars_per_token.max(1))
}

/// Pick the processing strategy for an estimated token count.
///
/// Estimates above the reduced threshold are condensed, estimates above the chunked threshold
/// are segmented, and everything else goes out in a single call. Thresholds are exclusive.
pub fn select_strategy(estimated_tokens: usize, settings: &AnalysisSettings) -> Strategy {
    if estimated_tokens > settings.reduced_threshold_tokens {
        Strategy::Reduced
    } else if estimated_tokens > settings.chunked_threshold_tokens {
        Strategy::Chunked
    } else {
        Strategy::Direct
    }
}
