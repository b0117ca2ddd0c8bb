//! Checkpoint mirror error types.

use thiserror::Error;

/// Errors raised by a checkpoint mirror or saver backend.
///
/// These never reach callers of [`crate::MemoryManager`]; they are logged and
/// dropped at the store boundary.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Checkpoint backend does not accept a {attempted} call (expects {expected})")]
    UnsupportedCall {
        attempted: &'static str,
        expected: &'static str,
    },

    #[error("Checkpoint rejected for thread {thread_id}: {reason}")]
    Rejected { thread_id: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
