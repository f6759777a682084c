//! Shared test helpers.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use skein::storage::InMemoryStorage;
use skein::thread::ThreadManager;
use skein::tokens::{AllocationHints, TokenAllocation};

/// Thread manager over a fresh in-memory store.
pub fn memory_threads() -> ThreadManager {
    ThreadManager::new(Arc::new(InMemoryStorage::new()))
}

/// Write `content` to `name` inside `dir` and return the absolute path.
pub fn write_file(dir: &Path, name: &str, content: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path.to_str().unwrap().to_string()
}

/// Allocation large enough that nothing gets trimmed.
pub fn roomy_allocation() -> TokenAllocation {
    TokenAllocation::compute(1_000_000, &AllocationHints::continuing())
}

/// Allocation with an explicit file budget and plenty of history room.
pub fn allocation_with_file_budget(file_tokens: usize) -> TokenAllocation {
    TokenAllocation {
        file_tokens,
        ..roomy_allocation()
    }
}

pub fn count(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}
