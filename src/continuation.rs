//! Caller-facing entry point: resume a conversation from an optional
//! continuation id and record the exchange afterwards.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::config::SkeinConfig;
use crate::history::{HistoryBuilder, RenderedHistory};
use crate::models::ModelRegistry;
use crate::storage::StorageBackend;
use crate::thread::{AppendOutcome, Conversation, NewTurn, ThreadManager};
use crate::tokens::{AllocationHints, TokenAllocation};

/// Everything a tool needs to splice prior context into its prompt.
#[derive(Debug, Clone)]
pub struct ResolvedContext {
    /// The conversation the continuation id named, if it still exists.
    pub conversation: Option<Conversation>,
    /// Root-first chain ending at `conversation`.
    pub chain: Vec<Conversation>,
    pub history: RenderedHistory,
    pub allocation: TokenAllocation,
    /// Turns left in `conversation` before a child must be started.
    pub remaining_turns: usize,
}

impl ResolvedContext {
    pub fn has_history(&self) -> bool {
        !self.history.is_empty()
    }

    pub fn continuation_id(&self) -> Option<String> {
        self.conversation.as_ref().map(Conversation::id)
    }
}

/// Bundles thread management, history rendering, and capacity lookup.
#[derive(Debug, Clone)]
pub struct ContinuationService {
    threads: ThreadManager,
    history: HistoryBuilder,
    models: Arc<ModelRegistry>,
}

impl ContinuationService {
    pub fn new(threads: ThreadManager, history: HistoryBuilder, models: Arc<ModelRegistry>) -> Self {
        Self {
            threads,
            history,
            models,
        }
    }

    /// Wire every component from one configuration.
    pub fn from_config(config: &SkeinConfig) -> Self {
        Self::with_storage(config, config.build_storage())
    }

    pub fn with_storage(config: &SkeinConfig, storage: Arc<dyn StorageBackend>) -> Self {
        Self::new(
            ThreadManager::from_config(storage, config),
            HistoryBuilder::from_config(config),
            Arc::new(config.build_registry()),
        )
    }

    pub fn threads(&self) -> &ThreadManager {
        &self.threads
    }

    pub fn history(&self) -> &HistoryBuilder {
        &self.history
    }

    pub fn models(&self) -> &ModelRegistry {
        &self.models
    }

    /// Start a new logical conversation for `owning_tool`.
    pub async fn start(&self, owning_tool: &str, initial_context: Map<String, Value>) -> String {
        self.threads.create(owning_tool, initial_context, None).await
    }

    /// Load and render prior context for a tool call.
    ///
    /// An absent, malformed, or expired continuation id yields an empty
    /// context with a fresh-conversation budget; it is never an error.
    pub async fn resolve(
        &self,
        continuation_id: Option<&str>,
        model_name: &str,
        hints: AllocationHints,
    ) -> ResolvedContext {
        let chain = match continuation_id {
            Some(id) => {
                let chain = self.threads.read_chain(id).await;
                if chain.is_empty() {
                    tracing::info!(
                        thread_id = id,
                        "Continuation not found, starting without history"
                    );
                }
                chain
            }
            None => Vec::new(),
        };

        let Some(leaf) = chain.last().cloned() else {
            let hints = AllocationHints {
                continuing: false,
                ..hints
            };
            return ResolvedContext {
                conversation: None,
                chain,
                history: RenderedHistory::default(),
                allocation: self.models.allocation_or_fallback(model_name, &hints),
                remaining_turns: self.threads.max_turns(),
            };
        };

        let hints = AllocationHints {
            continuing: true,
            ..hints
        };
        let allocation = self.models.allocation_or_fallback(model_name, &hints);
        let history = self.history.render_chain(&chain, &allocation);
        tracing::debug!(
            thread_id = %leaf.id(),
            chain_len = chain.len(),
            history_tokens = history.estimated_tokens,
            "Resolved continuation"
        );

        ResolvedContext {
            remaining_turns: self.threads.remaining_turns(&leaf),
            conversation: Some(leaf),
            chain,
            history,
            allocation,
        }
    }

    /// Record a turn after the model responds. Failures are logged by the
    /// thread manager and only reported through the outcome.
    pub async fn record(&self, id: &str, turn: NewTurn) -> AppendOutcome {
        self.threads.append(id, turn).await
    }
}
