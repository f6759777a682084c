//! Error types for Skein.

use thiserror::Error;

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The conversation is gone (never existed, expired, or lost a write race).
    Missing,
    /// A conversation reached its turn cap.
    Capacity,
    /// The storage backend could not be reached.
    Storage,
    /// A referenced file could not be embedded.
    File,
    Configuration,
    Serialization,
    Unknown,
}

/// Primary error type for all Skein operations.
#[derive(Error, Debug)]
pub enum SkeinError {
    #[error("Conversation not found: {0}")]
    NotFound(String),

    #[error("Conversation {id} reached its limit of {max_turns} turns")]
    TurnLimitExceeded { id: String, max_turns: usize },

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("File unreadable: {path} ({reason})")]
    FileUnreadable { path: String, reason: String },

    #[error("No capacity profile for model '{0}'")]
    CapacityUnresolved(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

impl SkeinError {
    /// Create a storage error from anything displayable.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::StorageUnavailable(message.into())
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound(_) => ErrorCategory::Missing,
            Self::TurnLimitExceeded { .. } => ErrorCategory::Capacity,
            Self::StorageUnavailable(_) | Self::Io(_) => ErrorCategory::Storage,
            Self::FileUnreadable { .. } => ErrorCategory::File,
            Self::CapacityUnresolved(_) | Self::Configuration(_) | Self::TomlParse(_) => {
                ErrorCategory::Configuration
            }
            Self::Serialization(_) => ErrorCategory::Serialization,
        }
    }

    /// Whether callers can carry on with less context instead of failing.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Missing
                | ErrorCategory::Capacity
                | ErrorCategory::Storage
                | ErrorCategory::File
        )
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, SkeinError>;
