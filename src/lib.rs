//! Skein: cross-tool conversation memory.
//!
//! Lets stateless tool calls share one logical conversation across tools and
//! model backends. Conversations are persisted with an expiry, linked into
//! chains when one fills up, and rendered back into prompt-ready text that
//! fits a model's token budget.
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use skein::prelude::*;
//!
//! # async fn example() {
//! let config = SkeinConfig::default();
//! let service = ContinuationService::with_storage(&config, Arc::new(InMemoryStorage::new()));
//!
//! let id = service.start("chat", Default::default()).await;
//! service.record(&id, NewTurn::user("Explain the retry logic")).await;
//!
//! let ctx = service
//!     .resolve(Some(&id), "gemini-2.5-pro", AllocationHints::default())
//!     .await;
//! assert!(ctx.history.text.contains("--- Turn 1 (Agent) ---"));
//! # }
//! ```

pub mod config;
pub mod continuation;
pub mod error;
pub mod history;
pub mod models;
pub mod prelude;
pub mod storage;
pub mod thread;
pub mod tokens;
