//! Rendering conversation history into prompt-ready text.
//!
//! Output layout (a contract callers and tests rely on):
//!
//! ```text
//! === CONVERSATION HISTORY (CONTINUATION) ===
//! ...header...
//! === FILES REFERENCED IN THIS CONVERSATION ===
//! - /path/a.rs
//! --- BEGIN FILE: /path/a.rs ---
//! <raw content>
//! --- END FILE: /path/a.rs ---
//! === END REFERENCED FILES ===
//! Previous conversation turns:
//! --- Turn 1 (Agent) ---
//! <content>
//! Files used in this turn: /path/a.rs
//! --- Turn 2 (gemini-2.5-pro using chat) ---
//! <content>
//! === END CONVERSATION HISTORY ===
//! ```

pub mod files;

use std::sync::Arc;

use crate::config::{SkeinConfig, DEFAULT_USER_LABEL};
use crate::thread::{dedup, Conversation, Role, Turn, DEFAULT_MAX_TURNS};
use crate::tokens::{CharRatioEstimator, TokenAllocation, TokenEstimator};

/// Rendered history plus bookkeeping about what was trimmed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedHistory {
    pub text: String,
    pub estimated_tokens: usize,
    /// Files whose content was embedded, in embedding order.
    pub embedded_files: Vec<String>,
    /// Files listed by path only (over budget or unreadable).
    pub omitted_files: Vec<String>,
    pub rendered_turns: usize,
    pub omitted_turns: usize,
}

impl RenderedHistory {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Identity of the thread a history is rendered for, plus its deduplicated
/// references.
struct ThreadSummary<'a> {
    id: String,
    owning_tool: &'a str,
    leaf_turns: usize,
    chain_len: usize,
    files: Vec<String>,
    images: Vec<String>,
}

/// Turns a conversation (or chain) into text within a token allocation.
#[derive(Clone)]
pub struct HistoryBuilder {
    estimator: Arc<dyn TokenEstimator>,
    user_label: String,
    max_turns: usize,
}

impl std::fmt::Debug for HistoryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryBuilder")
            .field("estimator", &"..")
            .field("user_label", &self.user_label)
            .field("max_turns", &self.max_turns)
            .finish()
    }
}

impl Default for HistoryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryBuilder {
    pub fn new() -> Self {
        Self {
            estimator: Arc::new(CharRatioEstimator::default()),
            user_label: DEFAULT_USER_LABEL.to_string(),
            max_turns: DEFAULT_MAX_TURNS,
        }
    }

    pub fn from_config(config: &SkeinConfig) -> Self {
        Self::new()
            .with_user_label(config.user_label.clone())
            .with_max_turns(config.max_turns)
    }

    pub fn with_estimator(mut self, estimator: impl TokenEstimator + 'static) -> Self {
        self.estimator = Arc::new(estimator);
        self
    }

    pub fn with_user_label(mut self, label: impl Into<String>) -> Self {
        self.user_label = label.into();
        self
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn estimator(&self) -> &dyn TokenEstimator {
        self.estimator.as_ref()
    }

    /// Render a single conversation.
    pub fn render(
        &self,
        conversation: &Conversation,
        allocation: &TokenAllocation,
    ) -> RenderedHistory {
        let turns: Vec<&Turn> = conversation.turns().iter().collect();
        let summary = ThreadSummary {
            id: conversation.id(),
            owning_tool: conversation.owning_tool(),
            leaf_turns: conversation.len(),
            chain_len: 1,
            files: conversation.file_list(),
            images: conversation.image_list(),
        };
        self.render_turns(summary, &turns, allocation)
    }

    /// Render a root-first chain as one continuous conversation, numbering
    /// turns across the whole chain.
    pub fn render_chain(
        &self,
        chain: &[Conversation],
        allocation: &TokenAllocation,
    ) -> RenderedHistory {
        let Some(leaf) = chain.last() else {
            return RenderedHistory::default();
        };
        let turns: Vec<&Turn> = chain.iter().flat_map(|c| c.turns().iter()).collect();
        let summary = ThreadSummary {
            id: leaf.id(),
            owning_tool: leaf.owning_tool(),
            leaf_turns: leaf.len(),
            chain_len: chain.len(),
            files: dedup::chain_files(chain),
            images: dedup::chain_images(chain),
        };
        self.render_turns(summary, &turns, allocation)
    }

    fn render_turns(
        &self,
        thread: ThreadSummary<'_>,
        turns: &[&Turn],
        allocation: &TokenAllocation,
    ) -> RenderedHistory {
        if turns.is_empty() {
            return RenderedHistory::default();
        }

        let mut sections = vec![self.header(&thread, turns.len())];

        let mut embedded_files = Vec::new();
        let mut omitted_files = Vec::new();
        if !thread.files.is_empty() {
            let (section, embedded, omitted) =
                self.files_section(&thread.files, allocation.file_tokens);
            sections.push(section);
            embedded_files = embedded;
            omitted_files = omitted;
        }

        if !thread.images.is_empty() {
            let mut section = String::from("=== IMAGES REFERENCED IN THIS CONVERSATION ===\n");
            for image in &thread.images {
                section.push_str(&format!("- {}\n", files::image_label(image)));
            }
            section.push_str("=== END REFERENCED IMAGES ===\n");
            sections.push(section);
        }

        let mut blocks: Vec<String> = turns
            .iter()
            .enumerate()
            .map(|(idx, turn)| self.turn_block(idx + 1, turn))
            .collect();
        let mut kept = self.turns_within_budget(&blocks, allocation.history_tokens);
        if kept == 0 {
            let number = blocks.len();
            let newest = turns[number - 1];
            if let Some(block) = self.truncated_turn_block(number, newest, allocation.history_tokens)
            {
                tracing::debug!(
                    thread_id = %thread.id,
                    turn = number,
                    history_tokens = allocation.history_tokens,
                    "Truncating newest turn to fit the history budget"
                );
                blocks[number - 1] = block;
                kept = 1;
            }
        }
        let omitted_turns = blocks.len() - kept;

        let mut turn_section = String::from("Previous conversation turns:\n");
        if omitted_turns > 0 {
            tracing::debug!(
                thread_id = %thread.id,
                omitted_turns,
                history_tokens = allocation.history_tokens,
                "Trimming oldest turns from history"
            );
            turn_section.push_str(&format!(
                "[{omitted_turns} earlier turns omitted to fit the history budget]\n"
            ));
        }
        for block in &blocks[omitted_turns..] {
            turn_section.push('\n');
            turn_section.push_str(block);
        }
        sections.push(turn_section);
        sections.push("=== END CONVERSATION HISTORY ===\n".to_string());

        let text = sections.join("\n");
        let estimated_tokens = self.estimator.estimate(&text);

        RenderedHistory {
            text,
            estimated_tokens,
            embedded_files,
            omitted_files,
            rendered_turns: kept,
            omitted_turns,
        }
    }

    fn header(&self, thread: &ThreadSummary<'_>, total_turns: usize) -> String {
        let mut header = String::from("=== CONVERSATION HISTORY (CONTINUATION) ===\n");
        header.push_str(&format!("Thread: {}\n", thread.id));
        header.push_str(&format!("Tool: {}\n", thread.owning_tool));
        header.push_str(&format!("Turn {}/{}\n", thread.leaf_turns, self.max_turns));
        if thread.chain_len > 1 {
            header.push_str(&format!(
                "Chain: {} linked conversations, {total_turns} turns in total\n",
                thread.chain_len
            ));
        }
        header.push_str("You are continuing this conversation thread from where it left off.\n");
        header
    }

    /// Embed files in order while they fit; returns the section text and the
    /// embedded and omitted paths.
    fn files_section(
        &self,
        file_list: &[String],
        budget: usize,
    ) -> (String, Vec<String>, Vec<String>) {
        let mut embedded = Vec::new();
        let mut omitted = Vec::new();
        let mut blocks = Vec::new();
        let mut used = 0usize;

        for path in file_list {
            let content = match files::read_embeddable(path) {
                Ok(content) => content,
                Err(err) => {
                    tracing::debug!(path = %path, error = %err, "Listing file without content");
                    omitted.push(path.clone());
                    continue;
                }
            };
            let block = files::file_block(path, &content);
            let cost = self.estimator.estimate(&block);
            if used + cost > budget {
                tracing::debug!(path = %path, cost, used, budget, "File exceeds remaining budget");
                omitted.push(path.clone());
                continue;
            }
            used += cost;
            embedded.push(path.clone());
            blocks.push(block);
        }

        let mut section = String::from("=== FILES REFERENCED IN THIS CONVERSATION ===\n");
        section.push_str(
            "The following files have been shared during this conversation, most recently referenced first:\n",
        );
        for path in file_list {
            section.push_str(&format!("- {path}\n"));
        }
        for block in &blocks {
            section.push('\n');
            section.push_str(block);
        }
        if !omitted.is_empty() {
            section.push_str(&format!(
                "\n[Embedded {} of {} files; the rest are listed by path only]\n",
                embedded.len(),
                file_list.len()
            ));
        }
        section.push_str("=== END REFERENCED FILES ===\n");
        (section, embedded, omitted)
    }

    fn actor(&self, turn: &Turn) -> String {
        match turn.role {
            Role::User => self.user_label.clone(),
            Role::Assistant => match (&turn.model_name, &turn.model_provider) {
                (Some(model), Some(provider)) => format!("{model} via {provider}"),
                (Some(model), None) => model.clone(),
                (None, _) => "Assistant".to_string(),
            },
        }
    }

    fn turn_block(&self, number: usize, turn: &Turn) -> String {
        self.format_turn(number, turn, &turn.content, false)
    }

    fn format_turn(&self, number: usize, turn: &Turn, content: &str, truncated: bool) -> String {
        let tool = match (turn.role, turn.tool_name.as_deref()) {
            (Role::Assistant, Some(tool)) => format!(" using {tool}"),
            _ => String::new(),
        };
        let mut block = format!("--- Turn {number} ({}{tool}) ---\n", self.actor(turn));
        block.push_str(content);
        if !content.ends_with('\n') {
            block.push('\n');
        }
        if truncated {
            block.push_str(TRUNCATED_MARKER);
        }
        if !turn.files.is_empty() {
            block.push_str(&format!("Files used in this turn: {}\n", turn.files.join(", ")));
        }
        if !turn.images.is_empty() {
            let labels: Vec<String> = turn.images.iter().map(|i| files::image_label(i)).collect();
            block.push_str(&format!("Images used in this turn: {}\n", labels.join(", ")));
        }
        block
    }

    /// Number of trailing (newest) blocks that fit in `budget` together.
    fn turns_within_budget(&self, blocks: &[String], budget: usize) -> usize {
        let mut used = 0usize;
        let mut kept = 0usize;
        for block in blocks.iter().rev() {
            let cost = self.estimator.estimate(block);
            if used + cost > budget {
                break;
            }
            used += cost;
            kept += 1;
        }
        kept
    }

    /// The longest prefix of `turn`'s content whose block, marker included,
    /// fits in `budget`. `None` when not even the bare block fits.
    fn truncated_turn_block(&self, number: usize, turn: &Turn, budget: usize) -> Option<String> {
        let fits = |content: &str| {
            let block = self.format_turn(number, turn, content, true);
            (self.estimator.estimate(&block) <= budget).then_some(block)
        };
        let mut best = fits("")?;

        let (mut lo, mut hi) = (0usize, turn.content.chars().count());
        while lo < hi {
            let mid = lo + (hi - lo + 1) / 2;
            match fits(char_prefix(&turn.content, mid)) {
                Some(block) => {
                    best = block;
                    lo = mid;
                }
                None => hi = mid - 1,
            }
        }
        Some(best)
    }
}

const TRUNCATED_MARKER: &str = "[truncated to fit the history budget]\n";

fn char_prefix(text: &str, chars: usize) -> &str {
    match text.char_indices().nth(chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
