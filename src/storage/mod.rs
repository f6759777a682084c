//! Time-bounded key/value persistence for conversation state.
//!
//! Backends only move opaque strings. Serialization, key layout, and the
//! decision to treat failures as "no history" all live in the thread manager.

pub mod file;
pub mod memory;

pub use file::{FileStorage, FileStorageConfig};
pub use memory::InMemoryStorage;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// Storage abstraction for persisted conversation records.
///
/// `put` must (re)set the entry's expiry to `ttl` from now. `get` must report
/// an expired entry as absent. Errors mean the backend itself failed; callers
/// decide how to degrade.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<()>;
    async fn get(&self, key: &str) -> Result<Option<String>>;
}
