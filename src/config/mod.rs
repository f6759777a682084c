//! Configuration system (layered: code > env > config file > defaults).

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, SkeinError};
use crate::models::{ModelProfile, ModelRegistry, DEFAULT_FALLBACK_CONTEXT_LENGTH};
use crate::storage::{FileStorage, FileStorageConfig, InMemoryStorage, StorageBackend};
use crate::thread::{DEFAULT_MAX_CHAIN_DEPTH, DEFAULT_MAX_TURNS, DEFAULT_TTL};

pub const ENV_MAX_TURNS: &str = "MAX_CONVERSATION_TURNS";
pub const ENV_TIMEOUT_HOURS: &str = "CONVERSATION_TIMEOUT_HOURS";
pub const ENV_MAX_CHAIN_DEPTH: &str = "CONVERSATION_MAX_CHAIN_DEPTH";
pub const ENV_STORAGE_DIR: &str = "SKEIN_STORAGE_DIR";

pub const DEFAULT_USER_LABEL: &str = "Agent";

/// Longest accepted conversation expiry (one year).
pub const MAX_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Settings for the conversation subsystem.
///
/// Build one at startup and hand the pieces it builds to the layers that need
/// them; nothing reads configuration from global state.
#[derive(Debug, Clone, PartialEq)]
pub struct SkeinConfig {
    /// Turns allowed in a single conversation.
    pub max_turns: usize,
    /// Expiry applied on every write.
    pub ttl: Duration,
    /// Hop bound for parent-chain walks.
    pub max_chain_depth: usize,
    /// Context window assumed for unknown models on degradable paths.
    pub fallback_context_length: usize,
    /// Actor label for user turns in rendered history.
    pub user_label: String,
    /// Selects file-backed storage when set.
    pub storage_dir: Option<PathBuf>,
    /// Capacity profiles added on top of the built-in ones.
    pub models: Vec<ModelProfile>,
}

impl Default for SkeinConfig {
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
            ttl: DEFAULT_TTL,
            max_chain_depth: DEFAULT_MAX_CHAIN_DEPTH,
            fallback_context_length: DEFAULT_FALLBACK_CONTEXT_LENGTH,
            user_label: DEFAULT_USER_LABEL.to_string(),
            storage_dir: None,
            models: Vec::new(),
        }
    }
}

/// On-disk shape of the configuration file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    max_turns: Option<usize>,
    ttl_hours: Option<f64>,
    max_chain_depth: Option<usize>,
    fallback_context_length: Option<usize>,
    user_label: Option<String>,
    storage_dir: Option<PathBuf>,
    #[serde(default)]
    models: Vec<ModelProfile>,
}

impl SkeinConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by environment variables (and `.env` if present).
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply environment overrides on top of this configuration. Malformed or
    /// non-positive values are ignored with a warning.
    pub fn with_env_overrides(mut self) -> Self {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error

        if let Some(turns) = env_positive::<usize>(ENV_MAX_TURNS) {
            self.max_turns = turns;
        }
        if let Some(hours) = env_positive::<f64>(ENV_TIMEOUT_HOURS) {
            match hours_to_duration(hours) {
                Some(ttl) => self.ttl = ttl,
                None => tracing::warn!(var = ENV_TIMEOUT_HOURS, hours, "Ignoring unusable timeout"),
            }
        }
        if let Some(depth) = env_positive::<usize>(ENV_MAX_CHAIN_DEPTH) {
            self.max_chain_depth = depth;
        }
        if let Ok(dir) = std::env::var(ENV_STORAGE_DIR) {
            if !dir.trim().is_empty() {
                self.storage_dir = Some(PathBuf::from(dir.trim()));
            }
        }
        self
    }

    /// Parse a TOML configuration document over the defaults.
    ///
    /// ```
    /// let config = skein::config::SkeinConfig::from_toml_str(r#"
    ///     max_turns = 10
    ///     ttl_hours = 0.5
    ///
    ///     [[models]]
    ///     name = "local-llama"
    ///     context_length = 8192
    /// "#)?;
    /// assert_eq!(config.max_turns, 10);
    /// assert_eq!(config.ttl.as_secs(), 1800);
    /// # Ok::<(), skein::error::SkeinError>(())
    /// ```
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(raw)?;
        let mut config = Self::default();

        if let Some(turns) = file.max_turns {
            config.max_turns = turns;
        }
        if let Some(hours) = file.ttl_hours {
            config.ttl = hours_to_duration(hours).ok_or_else(|| {
                SkeinError::Configuration(format!(
                    "ttl_hours must be positive and at most {}, got {hours}",
                    MAX_TTL.as_secs() / 3600
                ))
            })?;
        }
        if let Some(depth) = file.max_chain_depth {
            config.max_chain_depth = depth;
        }
        if let Some(tokens) = file.fallback_context_length {
            config.fallback_context_length = tokens;
        }
        if let Some(label) = file.user_label {
            config.user_label = label;
        }
        config.storage_dir = file.storage_dir;
        config.models = file.models;

        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_turns == 0 {
            return Err(SkeinError::Configuration("max_turns must be at least 1".into()));
        }
        if self.max_chain_depth == 0 {
            return Err(SkeinError::Configuration(
                "max_chain_depth must be at least 1".into(),
            ));
        }
        if self.ttl.is_zero() {
            return Err(SkeinError::Configuration("ttl must be positive".into()));
        }
        if self.ttl > MAX_TTL {
            return Err(SkeinError::Configuration(format!(
                "ttl must be at most {}s, got {}s",
                MAX_TTL.as_secs(),
                self.ttl.as_secs()
            )));
        }
        if self.fallback_context_length == 0 {
            return Err(SkeinError::Configuration(
                "fallback_context_length must be positive".into(),
            ));
        }
        if let Some(model) = self.models.iter().find(|m| m.capabilities.context_length == 0) {
            return Err(SkeinError::Configuration(format!(
                "model '{}' has a zero context_length",
                model.name
            )));
        }
        Ok(())
    }

    /// File-backed storage when `storage_dir` is set, in-memory otherwise.
    pub fn build_storage(&self) -> Arc<dyn StorageBackend> {
        match &self.storage_dir {
            Some(dir) => Arc::new(FileStorage::new(FileStorageConfig::new(dir.clone()))),
            None => Arc::new(InMemoryStorage::new()),
        }
    }

    /// Built-in profiles plus the configured ones.
    pub fn build_registry(&self) -> ModelRegistry {
        let mut registry = ModelRegistry::with_defaults()
            .with_fallback_context_length(self.fallback_context_length);
        for profile in &self.models {
            registry.register(profile.clone());
        }
        registry
    }
}

fn hours_to_duration(hours: f64) -> Option<Duration> {
    if !hours.is_finite() || hours <= 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(hours * 3600.0)
        .ok()
        .filter(|ttl| *ttl <= MAX_TTL)
}

fn env_positive<T>(var: &str) -> Option<T>
where
    T: FromStr + PartialOrd + Default + std::fmt::Display,
{
    let raw = std::env::var(var).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) if value > T::default() => Some(value),
        Ok(value) => {
            tracing::warn!(var, %value, "Ignoring non-positive value");
            None
        }
        Err(_) => {
            tracing::warn!(var, raw = %raw, "Ignoring unparsable value");
            None
        }
    }
}
