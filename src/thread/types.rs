//! Conversation and turn records.

use std::collections::HashSet;
use std::path::Path;

use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString};
use uuid::Uuid;

use super::dedup;

/// Who produced a turn.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message within a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_metadata: Option<Map<String, Value>>,
}

/// Arguments for appending a turn.
///
/// ```
/// use skein::thread::{NewTurn, Role};
///
/// let turn = NewTurn::builder()
///     .role(Role::Assistant)
///     .content("Looks good.")
///     .files(vec!["/src/main.rs".to_string()])
///     .tool_name("codereview")
///     .model_name("gemini-2.5-pro")
///     .build();
/// assert_eq!(turn.files.len(), 1);
/// ```
#[derive(Debug, Clone, Builder, PartialEq)]
pub struct NewTurn {
    pub role: Role,
    #[builder(into)]
    pub content: String,
    #[builder(default)]
    pub files: Vec<String>,
    #[builder(default)]
    pub images: Vec<String>,
    #[builder(into)]
    pub tool_name: Option<String>,
    #[builder(into)]
    pub model_provider: Option<String>,
    #[builder(into)]
    pub model_name: Option<String>,
    pub model_metadata: Option<Map<String, Value>>,
}

impl NewTurn {
    /// A plain user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::builder().role(Role::User).content(content).build()
    }

    /// A plain assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::builder().role(Role::Assistant).content(content).build()
    }

    pub fn with_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.files = files.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_images<I, S>(mut self, images: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.images = images.into_iter().map(Into::into).collect();
        self
    }

    pub(crate) fn into_turn(self, timestamp: DateTime<Utc>) -> Turn {
        let files = unique_in_order(self.files.into_iter().filter(|path| {
            let absolute = Path::new(path).is_absolute();
            if !absolute {
                tracing::warn!(path = %path, "Dropping relative file path from turn");
            }
            absolute
        }));
        Turn {
            role: self.role,
            content: self.content,
            timestamp,
            files,
            images: unique_in_order(self.images.into_iter()),
            tool_name: self.tool_name,
            model_provider: self.model_provider,
            model_name: self.model_name,
            model_metadata: self.model_metadata,
        }
    }
}

fn unique_in_order(items: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items.filter(|item| seen.insert(item.clone())).collect()
}

/// Persisted state of one conversation.
///
/// Turns are append-only and the id never changes; the only mutation path is
/// [`ThreadManager::append`](super::ThreadManager::append).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Conversation {
    id: Uuid,
    created_at: DateTime<Utc>,
    last_updated_at: DateTime<Utc>,
    owning_tool: String,
    #[serde(default)]
    turns: Vec<Turn>,
    #[serde(default)]
    initial_context: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent_id: Option<String>,
}

impl Conversation {
    pub(crate) fn new(
        owning_tool: impl Into<String>,
        initial_context: Map<String, Value>,
        parent_id: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            last_updated_at: now,
            owning_tool: owning_tool.into(),
            turns: Vec::new(),
            initial_context,
            parent_id,
        }
    }

    pub(crate) fn push_turn(&mut self, turn: NewTurn) {
        let now = Utc::now();
        self.turns.push(turn.into_turn(now));
        self.last_updated_at = now;
    }

    pub fn id(&self) -> String {
        self.id.to_string()
    }

    pub fn uuid(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_updated_at(&self) -> DateTime<Utc> {
        self.last_updated_at
    }

    pub fn owning_tool(&self) -> &str {
        &self.owning_tool
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn initial_context(&self) -> &Map<String, Value> {
        &self.initial_context
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Files referenced anywhere in this conversation, newest reference first.
    pub fn file_list(&self) -> Vec<String> {
        dedup::conversation_files(&self.turns)
    }

    /// Images referenced anywhere in this conversation, newest reference first.
    pub fn image_list(&self) -> Vec<String> {
        dedup::conversation_images(&self.turns)
    }
}
