//! Splitting a model's context window between response, files, and history.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::models::ModelCapabilities;

/// Context windows at or above this size use the large-model ratios.
pub const LARGE_CONTEXT_THRESHOLD: usize = 300_000;

/// How much room the expected answer needs.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResponseWeight {
    /// Conversational or analytical answers.
    #[default]
    Standard,
    /// Long-form output such as generated code or full documents.
    Extended,
}

/// Caller-supplied context for an allocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationHints {
    /// An existing conversation is being continued.
    pub continuing: bool,
    pub response_weight: ResponseWeight,
    /// Reserve exactly this many response tokens (clamped to the window).
    pub reserved_response_tokens: Option<usize>,
}

impl AllocationHints {
    pub fn continuing() -> Self {
        Self {
            continuing: true,
            ..Self::default()
        }
    }

    pub fn fresh() -> Self {
        Self::default()
    }

    pub fn with_response_weight(mut self, weight: ResponseWeight) -> Self {
        self.response_weight = weight;
        self
    }

    pub fn with_reserved_response_tokens(mut self, tokens: usize) -> Self {
        self.reserved_response_tokens = Some(tokens);
        self
    }
}

/// Partition of a context window.
///
/// `content_tokens + response_tokens == total_tokens` and
/// `file_tokens + history_tokens <= content_tokens` always hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAllocation {
    pub total_tokens: usize,
    pub content_tokens: usize,
    pub response_tokens: usize,
    pub file_tokens: usize,
    pub history_tokens: usize,
}

struct Ratios {
    response_pct: usize,
    file_pct: usize,
    history_pct: usize,
}

fn ratios_for(total_tokens: usize) -> Ratios {
    if total_tokens < LARGE_CONTEXT_THRESHOLD {
        Ratios {
            response_pct: 40,
            file_pct: 30,
            history_pct: 50,
        }
    } else {
        Ratios {
            response_pct: 20,
            file_pct: 35,
            history_pct: 45,
        }
    }
}

impl TokenAllocation {
    /// Allocate a raw context window.
    pub fn compute(total_tokens: usize, hints: &AllocationHints) -> Self {
        Self::compute_with_output_cap(total_tokens, None, hints)
    }

    /// Allocate a model's window, never reserving more response space than
    /// the model can emit.
    pub fn for_model(capabilities: &ModelCapabilities, hints: &AllocationHints) -> Self {
        Self::compute_with_output_cap(
            capabilities.context_length,
            capabilities.max_output_tokens,
            hints,
        )
    }

    fn compute_with_output_cap(
        total_tokens: usize,
        max_output_tokens: Option<usize>,
        hints: &AllocationHints,
    ) -> Self {
        let ratios = ratios_for(total_tokens);

        let response_tokens = match hints.reserved_response_tokens {
            Some(reserved) => reserved.min(total_tokens),
            None => {
                let mut pct = ratios.response_pct;
                if hints.response_weight == ResponseWeight::Extended {
                    pct += 10;
                }
                let by_ratio = total_tokens * pct / 100;
                max_output_tokens.map_or(by_ratio, |cap| by_ratio.min(cap))
            }
        };
        let content_tokens = total_tokens - response_tokens;

        let (file_pct, history_pct) = if hints.continuing {
            (ratios.file_pct, ratios.history_pct)
        } else {
            (ratios.file_pct + ratios.history_pct, 0)
        };

        Self {
            total_tokens,
            content_tokens,
            response_tokens,
            file_tokens: content_tokens * file_pct / 100,
            history_tokens: content_tokens * history_pct / 100,
        }
    }
}
