//! End-to-end chat turns through `ChatService` with a scripted answer generator.
//!
//! Covers history threading across turns, per-session isolation, history
//! trimming, failure propagation, and cancellation of an in-flight answer.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use parley_core::ChatService;
use parley_memory::{MemoryConfig, MemoryManager, MemorySaver, VersionedMirror};
use parley_types::{AnswerFuture, AnswerGenerator, AnswerRequest, ApiError, ParleyError};
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// MockAnswerer
// ---------------------------------------------------------------------------

/// Replies with scripted answers and records every request it sees.
struct MockAnswerer {
    replies: Mutex<Vec<Result<String, ApiError>>>,
    seen: Mutex<Vec<AnswerRequest>>,
    delay: Option<Duration>,
}

impl MockAnswerer {
    fn new(replies: Vec<Result<String, ApiError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().rev().collect()),
            seen: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new(vec![Ok("too late".into())])
        }
    }

    fn seen(&self) -> Vec<AnswerRequest> {
        self.seen.lock().unwrap().clone()
    }
}

impl AnswerGenerator for MockAnswerer {
    fn answer<'a>(&'a self, request: &'a AnswerRequest) -> AnswerFuture<'a> {
        Box::pin(async move {
            self.seen.lock().unwrap().push(request.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok("default answer".into()))
        })
    }

    fn name(&self) -> &str {
        "mock"
    }
}

fn memory(max_history_length: usize) -> Arc<MemoryManager> {
    Arc::new(
        MemoryManager::without_mirror(MemoryConfig {
            max_history_length,
            ..MemoryConfig::default()
        })
        .unwrap(),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn follow_up_sees_previous_turn() {
    let answerer = Arc::new(MockAnswerer::new(vec![
        Ok("Admissions open in June.".into()),
        Ok("The fee is listed on the portal.".into()),
    ]));
    let chat = ChatService::new(memory(20), answerer.clone());
    let cancel = CancellationToken::new();

    let first = chat
        .ask(None, "When do admissions open?", &cancel)
        .await
        .unwrap();
    let second = chat
        .ask(Some(first.session_id.as_str()), "What about the fee?", &cancel)
        .await
        .unwrap();

    assert_eq!(first.session_id, second.session_id);
    assert_eq!(second.answer, "The fee is listed on the portal.");

    let seen = answerer.seen();
    assert_eq!(seen[0].chat_history, "Human: When do admissions open?");
    assert_eq!(
        seen[1].chat_history,
        "Human: When do admissions open?\n\
         Assistant: Admissions open in June.\n\
         Human: What about the fee?"
    );
    assert_eq!(seen[1].query, "What about the fee?");
}

#[tokio::test]
async fn sessions_do_not_share_history() {
    let answerer = Arc::new(MockAnswerer::new(vec![]));
    let chat = ChatService::new(memory(20), answerer.clone());
    let cancel = CancellationToken::new();

    chat.ask(Some("alice"), "alice question", &cancel)
        .await
        .unwrap();
    chat.ask(Some("bob"), "bob question", &cancel).await.unwrap();

    let seen = answerer.seen();
    assert_eq!(seen[1].chat_history, "Human: bob question");
    assert_eq!(chat.memory().active_count(), 2);
}

#[tokio::test]
async fn history_handed_to_generator_is_trimmed() {
    let answerer = Arc::new(MockAnswerer::new(vec![]));
    let chat = ChatService::new(memory(2), answerer.clone());
    let cancel = CancellationToken::new();

    chat.ask(Some("s"), "one", &cancel).await.unwrap();
    chat.ask(Some("s"), "two", &cancel).await.unwrap();

    let seen = answerer.seen();
    assert_eq!(
        seen[1].chat_history,
        "Assistant: default answer\nHuman: two"
    );
    assert_eq!(chat.memory().messages("s").len(), 4);
}

#[tokio::test]
async fn generator_failure_propagates_unchanged() {
    let answerer = Arc::new(MockAnswerer::new(vec![Err(ApiError::RateLimited {
        retry_after_ms: Some(1000),
    })]));
    let chat = ChatService::new(memory(20), answerer);

    let err = chat
        .ask(Some("s"), "hello", &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ParleyError::Api(ApiError::RateLimited {
            retry_after_ms: Some(1000)
        })
    ));
    assert_eq!(chat.memory().history_as_text("s"), "Human: hello");
}

#[tokio::test]
async fn cancel_mid_answer_stops_the_turn() {
    let answerer = Arc::new(MockAnswerer::slow(Duration::from_secs(10)));
    let chat = Arc::new(ChatService::new(memory(20), answerer));
    let cancel = CancellationToken::new();

    let task = {
        let chat = chat.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { chat.ask(Some("s"), "slow question", &cancel).await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();

    let result = tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("turn did not stop after cancellation")
        .unwrap();
    assert!(matches!(result, Err(ParleyError::Cancelled)));
    assert_eq!(chat.memory().messages("s").len(), 1);
}

#[tokio::test]
async fn turns_are_mirrored_to_checkpoint_saver() {
    let mirror = Arc::new(VersionedMirror::new(MemorySaver::new()));
    let memory = Arc::new(MemoryManager::new(MemoryConfig::default(), mirror.clone()).unwrap());
    let chat = ChatService::new(memory, Arc::new(MockAnswerer::new(vec![])));

    let reply = chat
        .ask(None, "hello", &CancellationToken::new())
        .await
        .unwrap();

    let stored = mirror.saver().get(&reply.session_id).unwrap();
    assert_eq!(stored.messages.len(), 2);
    assert_eq!(stored.session_id.as_deref(), Some(reply.session_id.as_str()));
}
