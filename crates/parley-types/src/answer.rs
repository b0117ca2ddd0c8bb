//! Answer-generation collaborator trait.

use crate::ApiError;
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by [`AnswerGenerator::answer`].
pub type AnswerFuture<'a> = Pin<Box<dyn Future<Output = Result<String, ApiError>> + Send + 'a>>;

/// Input to one answer-generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerRequest {
    /// The user's question for this turn.
    pub query: String,
    /// Rendered conversation context (`Human: ...` / `Assistant: ...` lines).
    pub chat_history: String,
}

/// Produces an answer for a query given the rendered chat history.
///
/// How the answer is produced (retrieval, prompting, model choice) is opaque
/// to callers. Dyn-compatible so services can hold `Arc<dyn AnswerGenerator>`.
pub trait AnswerGenerator: Send + Sync {
    fn answer<'a>(&'a self, request: &'a AnswerRequest) -> AnswerFuture<'a>;

    /// Generator name for logging/display.
    fn name(&self) -> &str;
}
