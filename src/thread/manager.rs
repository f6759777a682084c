//! Conversation lifecycle on top of a storage backend.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use uuid::Uuid;

use super::{Conversation, NewTurn};
use crate::config::SkeinConfig;
use crate::error::{Result, SkeinError};
use crate::storage::StorageBackend;

pub const DEFAULT_MAX_TURNS: usize = 50;
pub const DEFAULT_TTL: Duration = Duration::from_secs(3 * 60 * 60);
pub const DEFAULT_MAX_CHAIN_DEPTH: usize = 20;

fn thread_key(id: &Uuid) -> String {
    format!("thread:{id}")
}

/// Result of [`ThreadManager::append`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended,
    /// The conversation does not exist, expired, or could not be read.
    NotFound,
    /// The conversation is full; start a child conversation to continue.
    TurnLimitReached,
    /// The turn was built but could not be persisted.
    StorageFailed,
}

impl AppendOutcome {
    pub fn is_success(self) -> bool {
        self == Self::Appended
    }
}

impl From<&SkeinError> for AppendOutcome {
    fn from(err: &SkeinError) -> Self {
        match err {
            SkeinError::NotFound(_) => Self::NotFound,
            SkeinError::TurnLimitExceeded { .. } => Self::TurnLimitReached,
            _ => Self::StorageFailed,
        }
    }
}

/// Owns create/append/read/chain-walk on persisted conversations.
///
/// Persistence is best-effort: reads that fail look like missing
/// conversations and writes that fail are logged and reported, never raised
/// past this type. Concurrent appends to one id are last-write-wins.
#[derive(Clone)]
pub struct ThreadManager {
    storage: Arc<dyn StorageBackend>,
    max_turns: usize,
    ttl: Duration,
    max_chain_depth: usize,
}

impl std::fmt::Debug for ThreadManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadManager")
            .field("storage", &"..")
            .field("max_turns", &self.max_turns)
            .field("ttl", &self.ttl)
            .field("max_chain_depth", &self.max_chain_depth)
            .finish()
    }
}

impl ThreadManager {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            storage,
            max_turns: DEFAULT_MAX_TURNS,
            ttl: DEFAULT_TTL,
            max_chain_depth: DEFAULT_MAX_CHAIN_DEPTH,
        }
    }

    pub fn from_config(storage: Arc<dyn StorageBackend>, config: &SkeinConfig) -> Self {
        Self::new(storage)
            .with_max_turns(config.max_turns)
            .with_ttl(config.ttl)
            .with_max_chain_depth(config.max_chain_depth)
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_max_chain_depth(mut self, depth: usize) -> Self {
        self.max_chain_depth = depth.max(1);
        self
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn max_chain_depth(&self) -> usize {
        self.max_chain_depth
    }

    /// Start a conversation and return its id.
    ///
    /// The parent is recorded as given; a dangling parent only shortens later
    /// chain walks. The id is returned even if the initial write failed, in
    /// which case later reads report it as missing.
    pub async fn create(
        &self,
        owning_tool: &str,
        initial_context: Map<String, Value>,
        parent_id: Option<&str>,
    ) -> String {
        let conversation =
            Conversation::new(owning_tool, initial_context, parent_id.map(str::to_string));
        let id = conversation.id();

        match self.persist(&conversation).await {
            Ok(()) => tracing::debug!(
                thread_id = %id,
                tool = owning_tool,
                parent_id = parent_id.unwrap_or(""),
                "Created conversation"
            ),
            Err(err) => tracing::warn!(
                thread_id = %id,
                error = %err,
                "Failed to persist new conversation"
            ),
        }
        id
    }

    /// Start a conversation that continues `parent_id`, inheriting its owning
    /// tool and initial context. Returns `None` when the parent is not
    /// loadable.
    pub async fn create_child(&self, parent_id: &str) -> Option<String> {
        let parent = self.read(parent_id).await?;
        let parent_id = parent.id();
        let id = self
            .create(
                parent.owning_tool(),
                parent.initial_context().clone(),
                Some(parent_id.as_str()),
            )
            .await;
        Some(id)
    }

    /// Append a turn, refreshing the conversation's expiry.
    pub async fn append(&self, id: &str, turn: NewTurn) -> AppendOutcome {
        match self.try_append(id, turn).await {
            Ok(conversation) => {
                tracing::debug!(thread_id = id, turns = conversation.len(), "Appended turn");
                AppendOutcome::Appended
            }
            Err(err) => {
                tracing::warn!(thread_id = id, error = %err, "Turn not recorded");
                AppendOutcome::from(&err)
            }
        }
    }

    /// Append a turn and return the updated conversation, with the reason
    /// when nothing was recorded.
    pub async fn try_append(&self, id: &str, turn: NewTurn) -> Result<Conversation> {
        let mut conversation = self
            .read(id)
            .await
            .ok_or_else(|| SkeinError::NotFound(id.to_string()))?;

        if conversation.len() >= self.max_turns {
            return Err(SkeinError::TurnLimitExceeded {
                id: id.to_string(),
                max_turns: self.max_turns,
            });
        }

        conversation.push_turn(turn);
        self.persist(&conversation).await?;
        Ok(conversation)
    }

    /// Load a conversation. Malformed ids, expired entries, corrupt records,
    /// and backend failures all read as `None`.
    pub async fn read(&self, id: &str) -> Option<Conversation> {
        let uuid = match Uuid::parse_str(id.trim()) {
            Ok(uuid) => uuid,
            Err(_) => {
                tracing::debug!(thread_id = id, "Ignoring malformed conversation id");
                return None;
            }
        };

        let raw = match self.storage.get(&thread_key(&uuid)).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                tracing::warn!(thread_id = id, error = %err, "Storage read failed");
                return None;
            }
        };

        match serde_json::from_str::<Conversation>(&raw) {
            Ok(conversation) => Some(conversation),
            Err(err) => {
                tracing::warn!(thread_id = id, error = %err, "Discarding corrupt conversation record");
                None
            }
        }
    }

    /// Walk parent links from `id` and return the chain root-first.
    ///
    /// The walk ends quietly at a missing link. It also ends, with a warning,
    /// after `max_chain_depth` conversations or on a revisited id.
    pub async fn read_chain(&self, id: &str) -> Vec<Conversation> {
        let mut chain = Vec::new();
        let mut visited = HashSet::new();
        let mut next = Some(id.trim().to_ascii_lowercase());

        while let Some(current) = next.take() {
            if chain.len() >= self.max_chain_depth {
                tracing::warn!(
                    thread_id = id,
                    max_chain_depth = self.max_chain_depth,
                    "Conversation chain hit the hop bound, truncating"
                );
                break;
            }
            if !visited.insert(current.clone()) {
                tracing::warn!(thread_id = id, repeated = %current, "Cycle in conversation chain");
                break;
            }
            let Some(conversation) = self.read(&current).await else {
                break;
            };
            next = conversation
                .parent_id()
                .map(|parent| parent.trim().to_ascii_lowercase());
            chain.push(conversation);
        }

        chain.reverse();
        chain
    }

    /// Turns left before `conversation` hits the per-conversation cap.
    pub fn remaining_turns(&self, conversation: &Conversation) -> usize {
        self.max_turns.saturating_sub(conversation.len())
    }

    async fn persist(&self, conversation: &Conversation) -> Result<()> {
        let payload = serde_json::to_string(conversation)?;
        self.storage
            .put(&thread_key(&conversation.uuid()), payload, self.ttl)
            .await
    }
}
