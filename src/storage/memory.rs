//! In-process storage with lazy TTL expiry and optional LRU eviction.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::StorageBackend;
use crate::error::{Result, SkeinError};

/// In-memory fallback backend.
///
/// Nothing sweeps in the background: expired entries are dropped when they are
/// looked up and whenever a write happens.
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    inner: Arc<RwLock<StoreInner>>,
}

#[derive(Default)]
struct StoreInner {
    entries: HashMap<String, StoreEntry>,
    max_entries: Option<usize>,
}

struct StoreEntry {
    value: String,
    expires_at: Instant,
    last_accessed: Instant,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound the number of live entries; the least recently used one is
    /// evicted when a new key would exceed the cap.
    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(StoreInner {
                entries: HashMap::new(),
                max_entries: Some(max_entries.max(1)),
            })),
        }
    }

    /// Number of entries currently held, expired or not.
    pub fn len(&self) -> usize {
        self.inner.read().map(|inner| inner.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> SkeinError {
    SkeinError::storage("in-memory store lock poisoned")
}

#[async_trait]
impl StorageBackend for InMemoryStorage {
    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        let now = Instant::now();
        let expires_at = now.checked_add(ttl).ok_or_else(|| {
            SkeinError::Configuration(format!("ttl of {}s is out of range", ttl.as_secs()))
        })?;
        let mut inner = self.inner.write().map_err(|_| poisoned())?;

        inner.entries.retain(|_, e| e.expires_at > now);

        if let Some(max) = inner.max_entries {
            if !inner.entries.contains_key(key) && inner.entries.len() >= max {
                if let Some(lru_key) = inner
                    .entries
                    .iter()
                    .min_by_key(|(_, e)| e.last_accessed)
                    .map(|(k, _)| k.clone())
                {
                    tracing::debug!(key = %lru_key, "Evicting least recently used entry");
                    inner.entries.remove(&lru_key);
                }
            }
        }

        inner.entries.insert(
            key.to_string(),
            StoreEntry {
                value,
                expires_at,
                last_accessed: now,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut inner = self.inner.write().map_err(|_| poisoned())?;
        let now = Instant::now();

        let expired = inner.entries.get(key).map(|e| e.expires_at <= now);
        match expired {
            Some(true) => {
                inner.entries.remove(key);
                Ok(None)
            }
            Some(false) => Ok(inner.entries.get_mut(key).map(|entry| {
                entry.last_accessed = now;
                entry.value.clone()
            })),
            None => Ok(None),
        }
    }
}
