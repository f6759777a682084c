//! Tests for history rendering.

mod common;

use pretty_assertions::assert_eq;
use serde_json::Map;
use skein::history::HistoryBuilder;
use skein::thread::{NewTurn, Role};
use skein::tokens::{estimate_text_tokens, TokenAllocation};
use tempfile::TempDir;

use common::{allocation_with_file_budget, count, memory_threads, roomy_allocation, write_file};

fn assistant(content: &str, tool: &str, model: &str) -> NewTurn {
    NewTurn::builder()
        .role(Role::Assistant)
        .content(content)
        .tool_name(tool)
        .model_name(model)
        .build()
}

#[tokio::test]
async fn empty_conversation_renders_nothing() {
    let threads = memory_threads();
    let id = threads.create("chat", Map::new(), None).await;
    let conversation = threads.read(&id).await.unwrap();

    let rendered = HistoryBuilder::new().render(&conversation, &roomy_allocation());
    assert_eq!(rendered.text, "");
    assert_eq!(rendered.estimated_tokens, 0);
    assert!(rendered.is_empty());
}

#[tokio::test]
async fn single_turn_without_files_renders_one_block() {
    let threads = memory_threads();
    let id = threads.create("chat", Map::new(), None).await;
    threads
        .append(&id, NewTurn::user("How do I rotate the logs?"))
        .await;
    let conversation = threads.read(&id).await.unwrap();

    let rendered = HistoryBuilder::new().render(&conversation, &roomy_allocation());
    assert!(rendered.text.contains("How do I rotate the logs?"));
    assert_eq!(count(&rendered.text, "--- Turn "), 1);
    assert_eq!(count(&rendered.text, "--- BEGIN FILE:"), 0);
    assert_eq!(count(&rendered.text, "--- END FILE:"), 0);
    assert!(!rendered.text.contains("FILES REFERENCED"));
    assert_eq!(rendered.estimated_tokens, estimate_text_tokens(&rendered.text));
}

#[tokio::test]
async fn renders_the_documented_layout() {
    let threads = memory_threads();
    let id = threads.create("chat", Map::new(), None).await;
    threads.append(&id, NewTurn::user("What does this do?")).await;
    threads
        .append(&id, assistant("It parses config.", "chat", "o3"))
        .await;
    let conversation = threads.read(&id).await.unwrap();

    let rendered = HistoryBuilder::new().render(&conversation, &roomy_allocation());
    let expected = format!(
        "=== CONVERSATION HISTORY (CONTINUATION) ===\n\
         Thread: {id}\n\
         Tool: chat\n\
         Turn 2/50\n\
         You are continuing this conversation thread from where it left off.\n\
         \n\
         Previous conversation turns:\n\
         \n\
         --- Turn 1 (Agent) ---\n\
         What does this do?\n\
         \n\
         --- Turn 2 (o3 using chat) ---\n\
         It parses config.\n\
         \n\
         === END CONVERSATION HISTORY ===\n"
    );
    assert_eq!(rendered.text, expected);
    assert_eq!(rendered.rendered_turns, 2);
    assert_eq!(rendered.omitted_turns, 0);
}

#[tokio::test]
async fn embeds_files_and_lists_them_per_turn() {
    let dir = TempDir::new().unwrap();
    let a = write_file(dir.path(), "a.py", "print('a')\n");
    let b = write_file(dir.path(), "b.py", "print('b')\n");

    let threads = memory_threads();
    let id = threads.create("analyze", Map::new(), None).await;
    threads
        .append(
            &id,
            NewTurn::user("Review these").with_files([a.clone(), b.clone()]),
        )
        .await;
    let conversation = threads.read(&id).await.unwrap();

    let rendered = HistoryBuilder::new().render(&conversation, &roomy_allocation());
    assert_eq!(rendered.embedded_files, vec![a.clone(), b.clone()]);
    assert!(rendered.omitted_files.is_empty());
    assert!(rendered
        .text
        .contains(&format!("--- BEGIN FILE: {a} ---\nprint('a')\n--- END FILE: {a} ---")));
    assert!(rendered
        .text
        .contains(&format!("Files used in this turn: {a}, {b}")));
    assert_eq!(count(&rendered.text, "--- BEGIN FILE:"), 2);
}

#[tokio::test]
async fn files_over_budget_are_listed_but_not_embedded() {
    let dir = TempDir::new().unwrap();
    let body = "x".repeat(400);
    let one = write_file(dir.path(), "one.txt", &body);
    let two = write_file(dir.path(), "two.txt", &body);
    let three = write_file(dir.path(), "three.txt", &body);

    let threads = memory_threads();
    let id = threads.create("analyze", Map::new(), None).await;
    threads
        .append(&id, NewTurn::user("first").with_files([one.clone()]))
        .await;
    threads
        .append(
            &id,
            NewTurn::user("second").with_files([two.clone(), three.clone()]),
        )
        .await;
    let conversation = threads.read(&id).await.unwrap();

    let rendered =
        HistoryBuilder::new().render(&conversation, &allocation_with_file_budget(200));

    assert_eq!(rendered.embedded_files, vec![two.clone()]);
    assert_eq!(rendered.omitted_files, vec![three.clone(), one.clone()]);
    assert_eq!(count(&rendered.text, "--- BEGIN FILE:"), 1);
    assert!(rendered
        .text
        .contains(&format!("Files used in this turn: {one}")));
    assert!(rendered
        .text
        .contains(&format!("Files used in this turn: {two}, {three}")));
    assert!(rendered.text.contains("[Embedded 1 of 3 files"));
}

#[tokio::test]
async fn smaller_files_still_fit_after_a_large_one_is_skipped() {
    let dir = TempDir::new().unwrap();
    let big = write_file(dir.path(), "big.txt", &"y".repeat(4_000));
    let small = write_file(dir.path(), "s.txt", "ok");

    let threads = memory_threads();
    let id = threads.create("analyze", Map::new(), None).await;
    threads
        .append(
            &id,
            NewTurn::user("both").with_files([big.clone(), small.clone()]),
        )
        .await;
    let conversation = threads.read(&id).await.unwrap();

    let rendered =
        HistoryBuilder::new().render(&conversation, &allocation_with_file_budget(100));
    assert_eq!(rendered.embedded_files, vec![small]);
    assert_eq!(rendered.omitted_files, vec![big]);
}

#[tokio::test]
async fn unreadable_files_degrade_to_path_only() {
    let dir = TempDir::new().unwrap();
    let present = write_file(dir.path(), "present.rs", "fn main() {}\n");
    let missing = dir.path().join("gone.rs").to_str().unwrap().to_string();

    let threads = memory_threads();
    let id = threads.create("debug", Map::new(), None).await;
    threads
        .append(
            &id,
            NewTurn::user("why").with_files([missing.clone(), present.clone()]),
        )
        .await;
    let conversation = threads.read(&id).await.unwrap();

    let rendered = HistoryBuilder::new().render(&conversation, &roomy_allocation());
    assert_eq!(rendered.embedded_files, vec![present.clone()]);
    assert_eq!(rendered.omitted_files, vec![missing.clone()]);
    assert!(!rendered.text.contains(&format!("--- BEGIN FILE: {missing} ---")));
    assert!(rendered.text.contains(&format!("- {missing}")));
    assert!(rendered
        .text
        .contains(&format!("Files used in this turn: {missing}, {present}")));
}

#[tokio::test]
async fn old_turns_are_dropped_to_fit_the_history_budget() {
    let threads = memory_threads();
    let id = threads.create("chat", Map::new(), None).await;
    for i in 1..=5 {
        threads
            .append(&id, NewTurn::user(format!("turn {i}: {}", "z".repeat(200))))
            .await;
    }
    let conversation = threads.read(&id).await.unwrap();

    let allocation = TokenAllocation {
        history_tokens: 130,
        ..roomy_allocation()
    };
    let rendered = HistoryBuilder::new().render(&conversation, &allocation);

    assert_eq!(rendered.rendered_turns, 2);
    assert_eq!(rendered.omitted_turns, 3);
    assert!(rendered
        .text
        .contains("[3 earlier turns omitted to fit the history budget]"));
    assert!(!rendered.text.contains("--- Turn 3 "));
    assert!(rendered.text.contains("--- Turn 4 (Agent) ---"));
    assert!(rendered.text.contains("--- Turn 5 (Agent) ---"));
}

#[tokio::test]
async fn oversized_newest_turn_is_truncated_to_the_history_budget() {
    let threads = memory_threads();
    let id = threads.create("chat", Map::new(), None).await;
    threads.append(&id, NewTurn::user("short opener")).await;
    threads
        .append(&id, NewTurn::user(format!("BEGIN{}", "w".repeat(10_000))))
        .await;
    let conversation = threads.read(&id).await.unwrap();

    let allocation = TokenAllocation {
        history_tokens: 200,
        ..roomy_allocation()
    };
    let rendered = HistoryBuilder::new().render(&conversation, &allocation);

    assert_eq!(rendered.rendered_turns, 1);
    assert_eq!(rendered.omitted_turns, 1);
    assert!(rendered.text.contains("--- Turn 2 (Agent) ---\nBEGIN"));
    assert!(rendered.text.contains("[truncated to fit the history budget]"));
    assert!(!rendered.text.contains("short opener"));
    assert!(rendered.estimated_tokens < 400);
}

#[tokio::test]
async fn history_budget_too_small_for_any_turn_omits_them_all() {
    let threads = memory_threads();
    let id = threads.create("chat", Map::new(), None).await;
    threads.append(&id, NewTurn::user("hello")).await;
    let conversation = threads.read(&id).await.unwrap();

    let allocation = TokenAllocation {
        history_tokens: 2,
        ..roomy_allocation()
    };
    let rendered = HistoryBuilder::new().render(&conversation, &allocation);
    assert_eq!(rendered.rendered_turns, 0);
    assert_eq!(rendered.omitted_turns, 1);
    assert!(rendered
        .text
        .contains("[1 earlier turns omitted to fit the history budget]"));
    assert!(!rendered.text.contains("hello"));
}

#[tokio::test]
async fn estimator_is_injectable() {
    let threads = memory_threads();
    let id = threads.create("chat", Map::new(), None).await;
    threads.append(&id, NewTurn::user("hello there")).await;
    let conversation = threads.read(&id).await.unwrap();

    let builder = HistoryBuilder::new().with_estimator(|text: &str| text.len());
    let rendered = builder.render(&conversation, &roomy_allocation());
    assert_eq!(rendered.estimated_tokens, rendered.text.len());
}

#[tokio::test]
async fn chains_render_as_one_numbered_conversation() {
    let threads = memory_threads();
    let root = threads.create("chat", Map::new(), None).await;
    threads.append(&root, NewTurn::user("root question")).await;
    threads
        .append(&root, assistant("root answer", "chat", "flash"))
        .await;
    let child = threads.create_child(&root).await.unwrap();
    threads.append(&child, NewTurn::user("follow-up")).await;

    let chain = threads.read_chain(&child).await;
    let rendered = HistoryBuilder::new().render_chain(&chain, &roomy_allocation());

    assert!(rendered.text.contains(&format!("Thread: {child}")));
    assert!(rendered
        .text
        .contains("Chain: 2 linked conversations, 3 turns in total"));
    assert!(rendered.text.contains("--- Turn 2 (flash using chat) ---"));
    assert!(rendered.text.contains("--- Turn 3 (Agent) ---\nfollow-up"));
    assert!(HistoryBuilder::new()
        .render_chain(&[], &roomy_allocation())
        .is_empty());
}

#[tokio::test]
async fn inline_images_are_summarized() {
    let threads = memory_threads();
    let id = threads.create("chat", Map::new(), None).await;
    threads
        .append(
            &id,
            NewTurn::user("see screenshot")
                .with_images(["data:image/png;base64,aGVsbG8=", "/shots/ui.png"]),
        )
        .await;
    let conversation = threads.read(&id).await.unwrap();

    let rendered = HistoryBuilder::new().render(&conversation, &roomy_allocation());
    assert!(!rendered.text.contains("aGVsbG8="));
    assert!(rendered.text.contains("=== IMAGES REFERENCED IN THIS CONVERSATION ==="));
    assert!(rendered
        .text
        .contains("Images used in this turn: inline image (image/png, 5 bytes), /shots/ui.png"));
}
