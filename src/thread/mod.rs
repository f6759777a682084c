//! Conversation threads: records, lifecycle, and reference deduplication.

pub mod dedup;
pub mod manager;
pub mod types;

pub use manager::{
    AppendOutcome, ThreadManager, DEFAULT_MAX_CHAIN_DEPTH, DEFAULT_MAX_TURNS, DEFAULT_TTL,
};
pub use types::{Conversation, NewTurn, Role, Turn};
