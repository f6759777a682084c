//! Newest-first flattening of file and image references.
//!
//! Turns are walked newest to oldest; each turn contributes the references
//! not already emitted, in its own listed order. A resource referenced in
//! several turns therefore lands where its most recent reference puts it.

use std::collections::HashSet;

use super::{Conversation, Turn};

/// Flatten per-turn reference lists, oldest turn first in `turns`.
pub fn newest_first<'a, I, F>(turns: I, select: F) -> Vec<String>
where
    I: DoubleEndedIterator<Item = &'a Turn>,
    F: Fn(&'a Turn) -> &'a [String],
{
    let mut seen: HashSet<&'a str> = HashSet::new();
    let mut ordered = Vec::new();
    for turn in turns.rev() {
        for item in select(turn) {
            if seen.insert(item.as_str()) {
                ordered.push(item.clone());
            }
        }
    }
    ordered
}

pub fn conversation_files(turns: &[Turn]) -> Vec<String> {
    newest_first(turns.iter(), |turn| turn.files.as_slice())
}

pub fn conversation_images(turns: &[Turn]) -> Vec<String> {
    newest_first(turns.iter(), |turn| turn.images.as_slice())
}

/// Files across a root-first chain, treated as one continuous conversation.
pub fn chain_files(chain: &[Conversation]) -> Vec<String> {
    newest_first(chain.iter().flat_map(|c| c.turns().iter()), |turn| {
        turn.files.as_slice()
    })
}

/// Images across a root-first chain.
pub fn chain_images(chain: &[Conversation]) -> Vec<String> {
    newest_first(chain.iter().flat_map(|c| c.turns().iter()), |turn| {
        turn.images.as_slice()
    })
}
