//! Model capacity descriptor.

use serde::{Deserialize, Serialize};

/// Describes how much a model can take in and emit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelCapabilities {
    pub context_length: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<usize>,
    #[serde(default)]
    pub supports_vision: bool,
    #[serde(default)]
    pub supports_extended_thinking: bool,
}

impl Default for ModelCapabilities {
    fn default() -> Self {
        Self::new(4096)
    }
}

impl ModelCapabilities {
    pub fn new(context_length: usize) -> Self {
        Self {
            context_length,
            max_output_tokens: None,
            supports_vision: false,
            supports_extended_thinking: false,
        }
    }

    pub fn with_max_output_tokens(mut self, tokens: usize) -> Self {
        self.max_output_tokens = Some(tokens);
        self
    }

    pub fn with_vision(mut self) -> Self {
        self.supports_vision = true;
        self
    }

    pub fn with_extended_thinking(mut self) -> Self {
        self.supports_extended_thinking = true;
        self
    }
}
