//! Token estimation and context budget allocation.

pub mod allocation;

pub use allocation::{AllocationHints, ResponseWeight, TokenAllocation};

/// Converts text into an approximate token count.
///
/// Anything implementing `Fn(&str) -> usize` qualifies, so a tokenizer-backed
/// estimator can be dropped in without touching allocation or rendering.
pub trait TokenEstimator: Send + Sync {
    fn estimate(&self, text: &str) -> usize;
}

impl<F> TokenEstimator for F
where
    F: Fn(&str) -> usize + Send + Sync,
{
    fn estimate(&self, text: &str) -> usize {
        self(text)
    }
}

/// Character-ratio heuristic: one token per `chars_per_token` characters,
/// rounded up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharRatioEstimator {
    pub chars_per_token: usize,
}

impl Default for CharRatioEstimator {
    fn default() -> Self {
        Self { chars_per_token: 4 }
    }
}

impl TokenEstimator for CharRatioEstimator {
    fn estimate(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        text.chars().count().div_ceil(self.chars_per_token.max(1))
    }
}

/// Estimate with the default four-characters-per-token ratio.
pub fn estimate_text_tokens(text: &str) -> usize {
    CharRatioEstimator::default().estimate(text)
}
