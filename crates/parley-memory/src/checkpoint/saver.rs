//! Adapter over checkpoint savers whose call shape varies by version.
//!
//! Saver backends have shipped with several `put` signatures. The adapter
//! asks the backend which one it speaks exactly once, at construction, and
//! from then on translates `upsert`/`delete` into that shape. Nothing outside
//! this module sees the variation.

use super::CheckpointMirror;
use crate::error::CheckpointError;
use parley_types::ChatMessage;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Call shape a saver backend accepts for `put`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaverSignature {
    /// `put(config, checkpoint, metadata, versions)`
    Versioned,
    /// `put(config, checkpoint, metadata)`
    WithMetadata,
    /// Older two-argument forms keyed by thread id or bare config.
    Legacy,
}

impl SaverSignature {
    pub fn label(self) -> &'static str {
        match self {
            SaverSignature::Versioned => "versioned",
            SaverSignature::WithMetadata => "with-metadata",
            SaverSignature::Legacy => "legacy",
        }
    }
}

/// Addressing for a checkpoint thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadConfig {
    pub thread_id: String,
}

impl ThreadConfig {
    pub fn new(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
        }
    }
}

/// State captured in a checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Checkpoint {
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckpointMetadata {
    pub session_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChannelVersions {
    pub version: u64,
}

/// A `put` call in one of the shapes a backend may accept.
#[derive(Debug, Clone, Copy)]
pub enum PutCall<'a> {
    Versioned {
        config: &'a ThreadConfig,
        checkpoint: &'a Checkpoint,
        metadata: &'a CheckpointMetadata,
        versions: ChannelVersions,
    },
    WithMetadata {
        config: &'a ThreadConfig,
        checkpoint: &'a Checkpoint,
        metadata: &'a CheckpointMetadata,
    },
    ThreadKeyed {
        thread_id: &'a str,
        checkpoint: &'a Checkpoint,
    },
    ConfigKeyed {
        config: &'a ThreadConfig,
        checkpoint: &'a Checkpoint,
    },
}

impl PutCall<'_> {
    pub fn label(&self) -> &'static str {
        match self {
            PutCall::Versioned { .. } => "versioned put",
            PutCall::WithMetadata { .. } => "with-metadata put",
            PutCall::ThreadKeyed { .. } => "thread-keyed put",
            PutCall::ConfigKeyed { .. } => "config-keyed put",
        }
    }

    pub fn thread_id(&self) -> &str {
        match self {
            PutCall::Versioned { config, .. }
            | PutCall::WithMetadata { config, .. }
            | PutCall::ConfigKeyed { config, .. } => config.thread_id.as_str(),
            PutCall::ThreadKeyed { thread_id, .. } => *thread_id,
        }
    }

    fn checkpoint(&self) -> &Checkpoint {
        match self {
            PutCall::Versioned { checkpoint, .. }
            | PutCall::WithMetadata { checkpoint, .. }
            | PutCall::ThreadKeyed { checkpoint, .. }
            | PutCall::ConfigKeyed { checkpoint, .. } => *checkpoint,
        }
    }
}

/// A `delete` call keyed either by config or by bare thread id.
#[derive(Debug, Clone, Copy)]
pub enum DeleteCall<'a> {
    Config(&'a ThreadConfig),
    ThreadId(&'a str),
}

impl DeleteCall<'_> {
    pub fn label(&self) -> &'static str {
        match self {
            DeleteCall::Config(_) => "config-keyed delete",
            DeleteCall::ThreadId(_) => "thread-keyed delete",
        }
    }

    pub fn thread_id(&self) -> &str {
        match self {
            DeleteCall::Config(config) => config.thread_id.as_str(),
            DeleteCall::ThreadId(id) => *id,
        }
    }
}

/// A checkpoint facility with a version-dependent call surface.
pub trait CheckpointSaver: Send + Sync {
    /// Report the `put` shape this backend accepts.
    fn signature(&self) -> SaverSignature;

    fn put(&self, call: PutCall<'_>) -> Result<(), CheckpointError>;

    fn delete(&self, call: DeleteCall<'_>) -> Result<(), CheckpointError>;
}

/// [`CheckpointMirror`] that speaks whatever shape its saver reported at startup.
pub struct VersionedMirror<S> {
    saver: S,
    signature: SaverSignature,
}

impl<S: CheckpointSaver> VersionedMirror<S> {
    /// Detect the signature of `saver` once and bind to it.
    pub fn new(saver: S) -> Self {
        let signature = saver.signature();
        tracing::info!(
            signature = signature.label(),
            "Detected checkpoint saver signature"
        );
        Self { saver, signature }
    }

    pub fn signature(&self) -> SaverSignature {
        self.signature
    }

    pub fn saver(&self) -> &S {
        &self.saver
    }
}

impl<S: CheckpointSaver> CheckpointMirror for VersionedMirror<S> {
    fn upsert(&self, session_id: &str, messages: &[ChatMessage]) -> Result<(), CheckpointError> {
        let config = ThreadConfig::new(session_id);
        let checkpoint = Checkpoint {
            messages: messages.to_vec(),
        };
        let metadata = CheckpointMetadata {
            session_id: session_id.to_string(),
        };

        match self.signature {
            SaverSignature::Versioned => self.saver.put(PutCall::Versioned {
                config: &config,
                checkpoint: &checkpoint,
                metadata: &metadata,
                versions: ChannelVersions { version: 1 },
            }),
            SaverSignature::WithMetadata => self.saver.put(PutCall::WithMetadata {
                config: &config,
                checkpoint: &checkpoint,
                metadata: &metadata,
            }),
            SaverSignature::Legacy => {
                let first = PutCall::ThreadKeyed {
                    thread_id: session_id,
                    checkpoint: &checkpoint,
                };
                match self.saver.put(first) {
                    Ok(()) => Ok(()),
                    Err(e) => {
                        tracing::debug!(error = %e, "Thread-keyed put failed, retrying with config");
                        self.saver.put(PutCall::ConfigKeyed {
                            config: &config,
                            checkpoint: &checkpoint,
                        })
                    }
                }
            }
        }
    }

    fn delete(&self, session_id: &str) -> Result<(), CheckpointError> {
        let config = ThreadConfig::new(session_id);
        match self.signature {
            SaverSignature::Versioned | SaverSignature::WithMetadata => {
                self.saver.delete(DeleteCall::Config(&config))
            }
            SaverSignature::Legacy => match self.saver.delete(DeleteCall::ThreadId(session_id)) {
                Ok(()) => Ok(()),
                Err(e) => {
                    tracing::debug!(error = %e, "Thread-keyed delete failed, retrying with config");
                    self.saver.delete(DeleteCall::Config(&config))
                }
            },
        }
    }

    fn name(&self) -> &str {
        "checkpoint-saver"
    }
}

/// Latest checkpoint held for a thread by [`MemorySaver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCheckpoint {
    pub messages: Vec<ChatMessage>,
    pub session_id: Option<String>,
    pub version: u64,
}

/// In-process saver keeping the latest checkpoint per thread.
///
/// Accepts only the call shapes matching the signature it was built with, the
/// way a real backend of that version would.
pub struct MemorySaver {
    signature: SaverSignature,
    threads: Mutex<HashMap<String, StoredCheckpoint>>,
}

impl MemorySaver {
    pub fn new() -> Self {
        Self::with_signature(SaverSignature::Versioned)
    }

    pub fn with_signature(signature: SaverSignature) -> Self {
        Self {
            signature,
            threads: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, thread_id: &str) -> Option<StoredCheckpoint> {
        self.threads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(thread_id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.threads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn accepts_put(&self, call: &PutCall<'_>) -> bool {
        matches!(
            (self.signature, call),
            (SaverSignature::Versioned, PutCall::Versioned { .. })
                | (SaverSignature::WithMetadata, PutCall::WithMetadata { .. })
                | (SaverSignature::Legacy, PutCall::ThreadKeyed { .. })
                | (SaverSignature::Legacy, PutCall::ConfigKeyed { .. })
        )
    }
}

impl Default for MemorySaver {
    fn default() -> Self {
        Self::new()
    }
}

impl CheckpointSaver for MemorySaver {
    fn signature(&self) -> SaverSignature {
        self.signature
    }

    fn put(&self, call: PutCall<'_>) -> Result<(), CheckpointError> {
        if !self.accepts_put(&call) {
            return Err(CheckpointError::UnsupportedCall {
                attempted: call.label(),
                expected: self.signature.label(),
            });
        }

        let session_id = match &call {
            PutCall::Versioned { metadata, .. } | PutCall::WithMetadata { metadata, .. } => {
                Some(metadata.session_id.clone())
            }
            PutCall::ThreadKeyed { .. } | PutCall::ConfigKeyed { .. } => None,
        };

        let mut threads = self.threads.lock().unwrap_or_else(PoisonError::into_inner);
        let version = threads
            .get(call.thread_id())
            .map_or(1, |existing| existing.version + 1);
        threads.insert(
            call.thread_id().to_string(),
            StoredCheckpoint {
                messages: call.checkpoint().messages.clone(),
                session_id,
                version,
            },
        );
        Ok(())
    }

    fn delete(&self, call: DeleteCall<'_>) -> Result<(), CheckpointError> {
        if matches!(call, DeleteCall::ThreadId(_)) && self.signature != SaverSignature::Legacy {
            return Err(CheckpointError::UnsupportedCall {
                attempted: call.label(),
                expected: self.signature.label(),
            });
        }
        self.threads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(call.thread_id());
        Ok(())
    }
}
