//! Convenience re-exports for common use.

pub use crate::config::SkeinConfig;
pub use crate::continuation::{ContinuationService, ResolvedContext};
pub use crate::error::{Result, SkeinError};
pub use crate::history::{HistoryBuilder, RenderedHistory};
pub use crate::models::{ModelCapabilities, ModelProfile, ModelRegistry};
pub use crate::storage::{FileStorage, InMemoryStorage, StorageBackend};
pub use crate::thread::{AppendOutcome, Conversation, NewTurn, Role, ThreadManager, Turn};
pub use crate::tokens::{AllocationHints, ResponseWeight, TokenAllocation, TokenEstimator};
