//! Registry resolving model names to capacity profiles.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::ModelCapabilities;
use crate::error::{Result, SkeinError};
use crate::tokens::{AllocationHints, TokenAllocation};

/// Context length assumed when a model cannot be resolved and the caller
/// prefers a conservative budget over an error.
pub const DEFAULT_FALLBACK_CONTEXT_LENGTH: usize = 32_768;

/// A named capacity profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelProfile {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(flatten)]
    pub capabilities: ModelCapabilities,
}

impl ModelProfile {
    pub fn new(name: impl Into<String>, capabilities: ModelCapabilities) -> Self {
        Self {
            name: name.into(),
            provider: None,
            aliases: Vec::new(),
            capabilities,
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }
}

// (name, provider, aliases, context, max output, vision, extended thinking)
type BuiltinProfile = (
    &'static str,
    &'static str,
    &'static [&'static str],
    usize,
    usize,
    bool,
    bool,
);

const BUILTIN_PROFILES: &[BuiltinProfile] = &[
    ("gemini-2.5-pro", "google", &["pro", "gemini-pro"], 1_048_576, 65_536, true, true),
    ("gemini-2.5-flash", "google", &["flash", "gemini-flash"], 1_048_576, 65_536, true, true),
    ("o3", "openai", &[], 200_000, 100_000, true, true),
    ("o4-mini", "openai", &["mini", "o4mini"], 200_000, 100_000, true, true),
    ("gpt-4.1", "openai", &["gpt4.1"], 1_047_576, 32_768, true, false),
    ("claude-sonnet-4", "anthropic", &["sonnet"], 200_000, 64_000, true, true),
    ("claude-opus-4", "anthropic", &["opus"], 200_000, 32_000, true, true),
    ("grok-4", "xai", &["grok"], 256_000, 32_768, true, true),
];

/// Explicitly constructed lookup table of capacity profiles.
///
/// Build one at the process entry point and pass it down; there is no global
/// instance.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    profiles: HashMap<String, Arc<ModelProfile>>,
    fallback_context_length: usize,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn lookup_key(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

impl ModelRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            profiles: HashMap::new(),
            fallback_context_length: DEFAULT_FALLBACK_CONTEXT_LENGTH,
        }
    }

    /// Registry pre-populated with the built-in profiles.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for &(name, provider, aliases, context, max_output, vision, thinking) in BUILTIN_PROFILES {
            let mut caps = ModelCapabilities::new(context).with_max_output_tokens(max_output);
            caps.supports_vision = vision;
            caps.supports_extended_thinking = thinking;
            registry.register(
                ModelProfile::new(name, caps)
                    .with_provider(provider)
                    .with_aliases(aliases.iter().copied()),
            );
        }
        registry
    }

    pub fn with_fallback_context_length(mut self, tokens: usize) -> Self {
        self.fallback_context_length = tokens;
        self
    }

    pub fn fallback_context_length(&self) -> usize {
        self.fallback_context_length
    }

    /// Register a profile under its name and every alias. Later
    /// registrations replace earlier ones for the same key.
    pub fn register(&mut self, profile: ModelProfile) {
        let profile = Arc::new(profile);
        self.profiles
            .insert(lookup_key(&profile.name), profile.clone());
        for alias in &profile.aliases {
            self.profiles.insert(lookup_key(alias), profile.clone());
        }
    }

    /// Resolve a model name, alias, or `provider:model` selector.
    pub fn resolve(&self, name: &str) -> Result<Arc<ModelProfile>> {
        if let Some(profile) = self.profiles.get(&lookup_key(name)) {
            return Ok(profile.clone());
        }

        if let Some((provider, model)) = name.split_once(':') {
            if let Some(profile) = self.profiles.get(&lookup_key(model)) {
                let provider_matches = profile
                    .provider
                    .as_deref()
                    .map_or(true, |p| p.eq_ignore_ascii_case(provider.trim()));
                if provider_matches {
                    return Ok(profile.clone());
                }
            }
        }

        Err(SkeinError::CapacityUnresolved(name.to_string()))
    }

    pub fn has_model(&self, name: &str) -> bool {
        self.resolve(name).is_ok()
    }

    /// Canonical names of registered profiles, sorted.
    pub fn model_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.profiles.values().map(|p| p.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    /// Allocation for a model that must resolve.
    pub fn allocation_for(&self, name: &str, hints: &AllocationHints) -> Result<TokenAllocation> {
        let profile = self.resolve(name)?;
        Ok(TokenAllocation::for_model(&profile.capabilities, hints))
    }

    /// Allocation that degrades to the conservative fallback budget when the
    /// model is unknown.
    pub fn allocation_or_fallback(&self, name: &str, hints: &AllocationHints) -> TokenAllocation {
        match self.allocation_for(name, hints) {
            Ok(allocation) => allocation,
            Err(err) => {
                tracing::warn!(
                    model = name,
                    fallback_context_length = self.fallback_context_length,
                    error = %err,
                    "Using conservative fallback token budget"
                );
                self.fallback_allocation(hints)
            }
        }
    }

    pub fn fallback_allocation(&self, hints: &AllocationHints) -> TokenAllocation {
        TokenAllocation::compute(self.fallback_context_length, hints)
    }
}
