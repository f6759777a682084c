//! Tests for conversation lifecycle and chain walking.

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map, Value};
use skein::storage::{InMemoryStorage, StorageBackend};
use skein::thread::{AppendOutcome, NewTurn, Role, ThreadManager};

use common::memory_threads;

fn context(pairs: &[(&str, &str)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
        .collect()
}

#[tokio::test]
async fn appends_are_strictly_additive_and_ordered() {
    let threads = memory_threads();
    let id = threads.create("chat", Map::new(), None).await;

    for i in 0..5 {
        let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
        let turn = NewTurn::builder()
            .role(role)
            .content(format!("message {i}"))
            .build();
        assert_eq!(threads.append(&id, turn).await, AppendOutcome::Appended);
    }

    let conversation = threads.read(&id).await.unwrap();
    let contents: Vec<&str> = conversation
        .turns()
        .iter()
        .map(|t| t.content.as_str())
        .collect();
    assert_eq!(
        contents,
        vec!["message 0", "message 1", "message 2", "message 3", "message 4"]
    );
    assert_eq!(conversation.turns()[1].role, Role::Assistant);
    assert!(conversation
        .turns()
        .windows(2)
        .all(|pair| pair[0].timestamp <= pair[1].timestamp));
}

#[tokio::test]
async fn read_is_idempotent() {
    let threads = memory_threads();
    let id = threads
        .create("analyze", context(&[("prompt", "look at this")]), None)
        .await;
    threads.append(&id, NewTurn::user("hello")).await;

    let first = threads.read(&id).await.unwrap();
    let second = threads.read(&id).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn append_at_turn_cap_fails_and_leaves_turns_unchanged() {
    let threads = memory_threads().with_max_turns(2);
    let id = threads.create("chat", Map::new(), None).await;
    assert!(threads.append(&id, NewTurn::user("one")).await.is_success());
    assert!(threads.append(&id, NewTurn::assistant("two")).await.is_success());

    let outcome = threads.append(&id, NewTurn::user("three")).await;
    assert_eq!(outcome, AppendOutcome::TurnLimitReached);
    assert!(!outcome.is_success());
    assert_eq!(threads.read(&id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn unknown_id_reads_as_absent() {
    let threads = memory_threads();
    assert!(threads
        .read("3b241101-e2bb-4255-8caf-4136c566a962")
        .await
        .is_none());
    assert_eq!(
        threads
            .append("3b241101-e2bb-4255-8caf-4136c566a962", NewTurn::user("hi"))
            .await,
        AppendOutcome::NotFound
    );
}

#[tokio::test]
async fn turn_attribution_is_persisted() {
    let threads = memory_threads();
    let id = threads.create("codereview", Map::new(), None).await;
    let mut metadata = Map::new();
    metadata.insert("temperature".into(), json!(0.2));

    let turn = NewTurn::builder()
        .role(Role::Assistant)
        .content("Found two issues.")
        .files(vec!["/repo/src/lib.rs".to_string()])
        .images(vec!["/repo/diagram.png".to_string()])
        .tool_name("codereview")
        .model_provider("google")
        .model_name("gemini-2.5-pro")
        .model_metadata(metadata.clone())
        .build();
    threads.append(&id, turn).await;

    let conversation = threads.read(&id).await.unwrap();
    let stored = &conversation.turns()[0];
    assert_eq!(stored.files, vec!["/repo/src/lib.rs"]);
    assert_eq!(stored.images, vec!["/repo/diagram.png"]);
    assert_eq!(stored.tool_name.as_deref(), Some("codereview"));
    assert_eq!(stored.model_provider.as_deref(), Some("google"));
    assert_eq!(stored.model_name.as_deref(), Some("gemini-2.5-pro"));
    assert_eq!(stored.model_metadata.as_ref(), Some(&metadata));
}

#[tokio::test]
async fn read_chain_returns_root_first() {
    let threads = memory_threads();
    let root = threads.create("chat", Map::new(), None).await;
    let middle = threads.create("chat", Map::new(), Some(&root)).await;
    let leaf = threads.create("chat", Map::new(), Some(&middle)).await;

    let ids: Vec<String> = threads
        .read_chain(&leaf)
        .await
        .iter()
        .map(|c| c.id())
        .collect();
    assert_eq!(ids, vec![root, middle, leaf]);
}

#[tokio::test]
async fn dangling_parent_ends_the_walk_quietly() {
    let threads = memory_threads();
    let id = threads
        .create(
            "chat",
            Map::new(),
            Some("00000000-0000-4000-8000-000000000000"),
        )
        .await;

    let chain = threads.read_chain(&id).await;
    assert_eq!(chain.len(), 1);
    assert_eq!(chain[0].id(), id);
}

#[tokio::test]
async fn long_chain_is_cut_at_the_hop_bound() {
    let threads = memory_threads().with_max_chain_depth(3);
    let mut parent: Option<String> = None;
    let mut ids = Vec::new();
    for _ in 0..5 {
        let id = threads.create("chat", Map::new(), parent.as_deref()).await;
        ids.push(id.clone());
        parent = Some(id);
    }

    let chain = threads.read_chain(&ids[4]).await;
    let chain_ids: Vec<String> = chain.iter().map(|c| c.id()).collect();
    assert_eq!(chain_ids, ids[2..].to_vec());
}

#[tokio::test]
async fn cyclic_parent_links_terminate() {
    let storage = Arc::new(InMemoryStorage::new());
    let threads = ThreadManager::new(storage.clone()).with_max_chain_depth(10);

    let a = threads.create("chat", Map::new(), None).await;
    let b = threads.create("chat", Map::new(), Some(&a)).await;

    // Point A back at B behind the manager's back.
    let key = format!("thread:{a}");
    let raw = storage.get(&key).await.unwrap().unwrap();
    let mut record: Value = serde_json::from_str(&raw).unwrap();
    record["parent_id"] = Value::String(b.clone());
    storage
        .put(&key, record.to_string(), Duration::from_secs(60))
        .await
        .unwrap();

    let chain = threads.read_chain(&b).await;
    assert!(!chain.is_empty());
    assert!(chain.len() <= threads.max_chain_depth());
    assert_eq!(chain.last().unwrap().id(), b);
}

#[tokio::test(start_paused = true)]
async fn append_refreshes_expiry_and_expiry_means_not_found() {
    let threads = memory_threads().with_ttl(Duration::from_secs(10));
    let id = threads.create("chat", Map::new(), None).await;

    tokio::time::advance(Duration::from_secs(8)).await;
    assert!(threads.append(&id, NewTurn::user("still here")).await.is_success());

    tokio::time::advance(Duration::from_secs(8)).await;
    assert_eq!(threads.read(&id).await.unwrap().len(), 1);

    tokio::time::advance(Duration::from_secs(11)).await;
    assert!(threads.read(&id).await.is_none());
    assert_eq!(
        threads.append(&id, NewTurn::user("too late")).await,
        AppendOutcome::NotFound
    );
}

#[tokio::test]
async fn distinct_conversations_proceed_independently() {
    let threads = memory_threads();
    let a = threads.create("chat", Map::new(), None).await;
    let b = threads.create("debug", Map::new(), None).await;

    let (ra, rb) = tokio::join!(
        threads.append(&a, NewTurn::user("for a")),
        threads.append(&b, NewTurn::user("for b")),
    );
    assert!(ra.is_success() && rb.is_success());
    assert_eq!(threads.read(&a).await.unwrap().turns()[0].content, "for a");
    assert_eq!(threads.read(&b).await.unwrap().turns()[0].content, "for b");
}

#[tokio::test]
async fn conversation_views_deduplicate_newest_first() {
    let threads = memory_threads();
    let id = threads.create("chat", Map::new(), None).await;
    threads
        .append(
            &id,
            NewTurn::user("first").with_files(["/a.py", "/shared.py"]),
        )
        .await;
    threads
        .append(
            &id,
            NewTurn::assistant("second").with_files(["/shared.py", "/b.py"]),
        )
        .await;

    let conversation = threads.read(&id).await.unwrap();
    assert_eq!(
        conversation.file_list(),
        vec!["/shared.py", "/b.py", "/a.py"]
    );
    assert!(conversation.image_list().is_empty());
}
