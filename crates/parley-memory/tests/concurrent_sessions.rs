//! Concurrent access to the memory manager from many request tasks.
//!
//! Each task appends to its own session while others do the same; the test
//! verifies that no entries are lost and none bleed across sessions.

use std::sync::Arc;

use futures_util::future::join_all;
use parley_memory::{MemoryConfig, MemoryManager};
use parley_types::{ChatMessage, Role};

const TASKS: usize = 16;
const TURNS: usize = 50;

fn manager() -> Arc<MemoryManager> {
    let config = MemoryConfig {
        max_sessions: TASKS * 2,
        max_history_length: TURNS * 2,
        ..MemoryConfig::default()
    };
    Arc::new(MemoryManager::without_mirror(config).unwrap())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_sessions_do_not_interfere() {
    let mgr = manager();

    let handles = (0..TASKS).map(|task| {
        let mgr = Arc::clone(&mgr);
        tokio::spawn(async move {
            let id = format!("session-{task}");
            for turn in 0..TURNS {
                mgr.add_user_message(&id, &format!("{task}:q{turn}"));
                mgr.add_ai_message(&id, &format!("{task}:a{turn}"));
                tokio::task::yield_now().await;
            }
            id
        })
    });

    let ids: Vec<String> = join_all(handles)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    assert_eq!(mgr.active_count(), TASKS);
    for (task, id) in ids.iter().enumerate() {
        let log = mgr.messages(id);
        assert_eq!(log.len(), TURNS * 2, "lost updates in {id}");
        for (turn, pair) in log.chunks(2).enumerate() {
            assert_eq!(pair[0], ChatMessage::user(format!("{task}:q{turn}")));
            assert_eq!(pair[1], ChatMessage::assistant(format!("{task}:a{turn}")));
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_writers_on_one_session_lose_nothing() {
    let mgr = manager();
    mgr.create_session(Some("shared"));

    let handles = (0..TASKS).map(|task| {
        let mgr = Arc::clone(&mgr);
        tokio::spawn(async move {
            for turn in 0..TURNS {
                mgr.add_user_message("shared", &format!("{task}-{turn}"));
            }
        })
    });
    for result in join_all(handles).await {
        result.unwrap();
    }

    let log = mgr.messages("shared");
    assert_eq!(log.len(), TASKS * TURNS);
    assert!(log.iter().all(|m| m.role == Role::User));

    // Per-writer order is preserved within the shared log.
    for task in 0..TASKS {
        let prefix = format!("{task}-");
        let turns: Vec<usize> = log
            .iter()
            .filter_map(|m| m.content.strip_prefix(&prefix))
            .map(|t| t.parse().unwrap())
            .collect();
        assert_eq!(turns, (0..TURNS).collect::<Vec<_>>());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn capacity_holds_under_concurrent_admission() {
    let config = MemoryConfig {
        max_sessions: 5,
        ..MemoryConfig::default()
    };
    let mgr = Arc::new(MemoryManager::without_mirror(config).unwrap());

    let handles = (0..40).map(|n| {
        let mgr = Arc::clone(&mgr);
        tokio::spawn(async move {
            mgr.add_user_message(&format!("user-{n}"), "hello");
            assert!(mgr.active_count() <= 5);
        })
    });
    for result in join_all(handles).await {
        result.unwrap();
    }

    assert_eq!(mgr.active_count(), 5);
}
