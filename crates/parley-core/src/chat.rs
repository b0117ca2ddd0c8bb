//! One question/answer turn against session memory.

use parley_memory::MemoryManager;
use parley_types::{AnswerGenerator, AnswerRequest, ParleyError};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Result of a successful turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
    /// The session the turn was recorded in (may be newly created).
    pub session_id: String,
    pub answer: String,
}

/// Ties a [`MemoryManager`] to an [`AnswerGenerator`].
pub struct ChatService {
    memory: Arc<MemoryManager>,
    answerer: Arc<dyn AnswerGenerator>,
}

impl ChatService {
    pub fn new(memory: Arc<MemoryManager>, answerer: Arc<dyn AnswerGenerator>) -> Self {
        Self { memory, answerer }
    }

    pub fn memory(&self) -> &Arc<MemoryManager> {
        &self.memory
    }

    pub fn answerer_name(&self) -> &str {
        self.answerer.name()
    }

    /// Answer `query` in the context of `session_id`.
    ///
    /// Resolves or creates the session, records the user message, asks the
    /// generator with the rendered history (which already includes the new
    /// message), then records the answer. If generation fails or `cancel`
    /// fires first, the user message stays and no answer is recorded.
    pub async fn ask(
        &self,
        session_id: Option<&str>,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<ChatReply, ParleyError> {
        let session_id = self.memory.get_or_create(session_id);
        self.memory.add_user_message(&session_id, query);

        let request = AnswerRequest {
            query: query.to_string(),
            chat_history: self.memory.history_as_text(&session_id),
        };
        tracing::debug!(
            session_id = %session_id,
            generator = self.answerer.name(),
            history_bytes = request.chat_history.len(),
            "Requesting answer"
        );

        let answer = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(session_id = %session_id, "Answer cancelled");
                return Err(ParleyError::Cancelled);
            }
            result = self.answerer.answer(&request) => result?,
        };

        self.memory.add_ai_message(&session_id, &answer);
        Ok(ChatReply { session_id, answer })
    }
}
