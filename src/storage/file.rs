//! File-backed storage: one JSON envelope per key.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use super::StorageBackend;
use crate::error::{Result, SkeinError};

const ENVELOPE_VERSION: u32 = 1;

/// Configuration for file-backed storage.
#[derive(Debug, Clone)]
pub struct FileStorageConfig {
    pub base_dir: PathBuf,
}

impl FileStorageConfig {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn default_dir() -> PathBuf {
        default_skein_dir().join("threads")
    }
}

/// Durable backend that survives process restarts.
///
/// Expiry is stored inside each envelope and checked on read; an expired
/// envelope is deleted and reported as absent.
///
/// # Example
/// ```no_run
/// use std::time::Duration;
/// use skein::storage::{FileStorage, StorageBackend};
///
/// # async fn example() -> skein::error::Result<()> {
/// let store = FileStorage::new_default();
/// store.put("thread:demo", "{}".to_string(), Duration::from_secs(3600)).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FileStorage {
    base_dir: PathBuf,
}

impl FileStorage {
    pub fn new(config: FileStorageConfig) -> Self {
        Self {
            base_dir: config.base_dir,
        }
    }

    pub fn new_default() -> Self {
        Self::new(FileStorageConfig::new(FileStorageConfig::default_dir()))
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.base_dir.join(format!("{}.json", normalize_key(key)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Envelope {
    version: u32,
    key: String,
    expires_at: DateTime<Utc>,
    value: String,
}

#[async_trait]
impl StorageBackend for FileStorage {
    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        let path = self.entry_path(key);
        tokio::fs::create_dir_all(&self.base_dir)
            .await
            .map_err(|e| SkeinError::storage(format!("{}: {e}", self.base_dir.display())))?;

        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .ok_or_else(|| {
                SkeinError::Configuration(format!("ttl of {}s is out of range", ttl.as_secs()))
            })?;
        let envelope = Envelope {
            version: ENVELOPE_VERSION,
            key: key.to_string(),
            expires_at,
            value,
        };
        let serialized = serde_json::to_vec(&envelope)?;

        let tmp = temp_path(&path);
        if let Err(err) = write_private(&tmp, &serialized).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(SkeinError::storage(format!("{}: {err}", tmp.display())));
        }
        if let Err(err) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(SkeinError::storage(format!("{}: {err}", path.display())));
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.entry_path(key);
        let raw = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(SkeinError::storage(format!("{}: {err}", path.display()))),
        };
        let envelope: Envelope = serde_json::from_slice(&raw)?;
        if envelope.key != key {
            tracing::warn!(key, stored_key = %envelope.key, "Storage key collision, ignoring entry");
            return Ok(None);
        }
        if envelope.expires_at <= Utc::now() {
            tracing::debug!(key, "Dropping expired entry");
            if let Err(err) = tokio::fs::remove_file(&path).await {
                if err.kind() != std::io::ErrorKind::NotFound {
                    tracing::debug!(key, error = %err, "Could not remove expired entry");
                }
            }
            return Ok(None);
        }
        Ok(Some(envelope.value))
    }
}

/// Sibling of `path` that no other writer will pick.
fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.tmp-{}", Uuid::new_v4().simple()))
}

/// Write `data` to a new file that is owner-only from the moment it exists.
async fn write_private(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(data).await?;
    file.sync_all().await?;
    Ok(())
}

fn default_skein_dir() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".skein"))
        .unwrap_or_else(|| PathBuf::from(".skein"))
}

fn normalize_key(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return "default".to_string();
    }
    trimmed
        .chars()
        .map(|ch| {
            let lower = ch.to_ascii_lowercase();
            if lower.is_ascii_alphanumeric() || lower == '-' || lower == '_' {
                lower
            } else {
                '-'
            }
        })
        .collect()
}
