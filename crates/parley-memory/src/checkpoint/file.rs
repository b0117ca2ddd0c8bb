//! Checkpoint mirror backed by one JSON file per session.

use super::CheckpointMirror;
use crate::error::CheckpointError;
use chrono::{DateTime, Utc};
use parley_types::ChatMessage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// On-disk checkpoint document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileCheckpoint {
    pub session_id: String,
    pub saved_at: DateTime<Utc>,
    pub messages: Vec<ChatMessage>,
}

/// Writes each session's log to `<dir>/<sanitized-id>.json`.
///
/// Files are never read back into the live store; they exist for inspection
/// and offline recovery.
pub struct FileMirror {
    dir: PathBuf,
}

impl FileMirror {
    /// Create a mirror, ensuring `dir` exists.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, CheckpointError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Read a checkpoint back (tests and tooling).
    pub fn load(&self, session_id: &str) -> Result<Option<FileCheckpoint>, CheckpointError> {
        let path = self.checkpoint_path(session_id);
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&data)?))
    }

    fn checkpoint_path(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_id(session_id)))
    }
}

impl CheckpointMirror for FileMirror {
    /// Atomic write: `.tmp` then rename.
    fn upsert(&self, session_id: &str, messages: &[ChatMessage]) -> Result<(), CheckpointError> {
        let path = self.checkpoint_path(session_id);
        let tmp_path = path.with_extension("tmp");
        let doc = FileCheckpoint {
            session_id: session_id.to_string(),
            saved_at: Utc::now(),
            messages: messages.to_vec(),
        };
        let json = serde_json::to_string_pretty(&doc)?;
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    fn delete(&self, session_id: &str) -> Result<(), CheckpointError> {
        match std::fs::remove_file(self.checkpoint_path(session_id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn name(&self) -> &str {
        "file"
    }
}

/// Replace anything outside `[A-Za-z0-9_-]` so ids are safe as filenames.
fn sanitize_id(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
