//! Best-effort mirroring of session logs to an external checkpoint facility.
//!
//! The live [`crate::SessionStore`] is authoritative. Mirrors are told about
//! every append (`upsert`) and every removal (`delete`); their failures are
//! logged by the store and otherwise ignored.

mod file;
mod saver;

pub use file::{FileCheckpoint, FileMirror};
pub use saver::{
    ChannelVersions, Checkpoint, CheckpointMetadata, CheckpointSaver, DeleteCall, MemorySaver,
    PutCall, SaverSignature, StoredCheckpoint, ThreadConfig, VersionedMirror,
};

use crate::error::CheckpointError;
use parley_types::ChatMessage;

/// Narrow interface to a durable checkpoint facility.
pub trait CheckpointMirror: Send + Sync {
    /// Replace the mirrored log for `session_id` with `messages`.
    fn upsert(&self, session_id: &str, messages: &[ChatMessage]) -> Result<(), CheckpointError>;

    /// Drop the mirrored log for `session_id`. Absent sessions are not an error.
    fn delete(&self, session_id: &str) -> Result<(), CheckpointError>;

    /// Mirror name for logging.
    fn name(&self) -> &str;
}

/// Mirror that discards everything. Used when checkpointing is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMirror;

impl CheckpointMirror for NoopMirror {
    fn upsert(&self, _session_id: &str, _messages: &[ChatMessage]) -> Result<(), CheckpointError> {
        Ok(())
    }

    fn delete(&self, _session_id: &str) -> Result<(), CheckpointError> {
        Ok(())
    }

    fn name(&self) -> &str {
        "none"
    }
}
