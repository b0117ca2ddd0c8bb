//! Session record and reporting types.

use chrono::{DateTime, Utc};
use parley_types::{ChatMessage, Role};
use serde::Serialize;

/// Maximum characters kept in a session preview.
const PREVIEW_CHARS: usize = 80;

/// One conversation: its full message log plus access bookkeeping.
///
/// The log is append-only and unbounded; only the view returned by
/// [`SessionRecord::history_view`] is trimmed to `max_history_length`.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    created_at: DateTime<Utc>,
    last_accessed_at: DateTime<Utc>,
    messages: Vec<ChatMessage>,
    max_history_length: usize,
}

impl SessionRecord {
    /// Create an empty record with both timestamps set to `now`.
    pub fn new(max_history_length: usize, now: DateTime<Utc>) -> Self {
        Self {
            created_at: now,
            last_accessed_at: now,
            messages: Vec::new(),
            max_history_length,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_accessed_at(&self) -> DateTime<Utc> {
        self.last_accessed_at
    }

    pub fn max_history_length(&self) -> usize {
        self.max_history_length
    }

    /// Record an access. Never moves the timestamp backwards.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.last_accessed_at {
            self.last_accessed_at = now;
        }
    }

    /// Append one entry to the log and record the access.
    pub fn append(&mut self, role: Role, content: impl Into<String>, now: DateTime<Utc>) {
        self.messages.push(ChatMessage {
            role,
            content: content.into(),
        });
        self.touch(now);
    }

    /// The full message log, oldest first.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// The trailing `max_history_length` entries, oldest first.
    pub fn history_view(&self) -> &[ChatMessage] {
        let start = self.messages.len().saturating_sub(self.max_history_length);
        &self.messages[start..]
    }

    /// The history view rendered as `Human:`/`Assistant:` lines.
    pub fn rendered_buffer(&self) -> String {
        self.history_view()
            .iter()
            .map(ChatMessage::render)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Short preview from the first user message.
    pub fn preview(&self) -> String {
        let Some(first) = self.messages.iter().find(|m| m.role == Role::User) else {
            return String::new();
        };
        let trimmed = first.content.trim();
        if trimmed.chars().count() > PREVIEW_CHARS {
            let head: String = trimmed.chars().take(PREVIEW_CHARS - 3).collect();
            format!("{head}...")
        } else {
            trimmed.to_string()
        }
    }

    /// Build a summary for listing.
    pub fn to_summary(&self, id: &str) -> SessionSummary {
        SessionSummary {
            id: id.to_string(),
            created_at: self.created_at,
            last_accessed_at: self.last_accessed_at,
            message_count: self.messages.len(),
            preview: self.preview(),
        }
    }
}

/// Lightweight per-session summary for observability.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub message_count: usize,
    pub preview: String,
}

impl SessionSummary {
    /// Short prefix of the session ID for display.
    pub fn short_id(&self) -> &str {
        match self.id.char_indices().nth(8) {
            Some((idx, _)) => &self.id[..idx],
            None => &self.id,
        }
    }

    /// Human-readable idle time (e.g. "2h ago", "3d ago").
    pub fn idle(&self) -> String {
        let minutes = (Utc::now() - self.last_accessed_at).num_minutes();
        if minutes < 1 {
            "just now".to_string()
        } else if minutes < 60 {
            format!("{minutes}m ago")
        } else if minutes < 1440 {
            format!("{}h ago", minutes / 60)
        } else {
            format!("{}d ago", minutes / 1440)
        }
    }
}

/// Snapshot of the live session set.
#[derive(Debug, Clone, Serialize)]
pub struct MemoryStats {
    pub active_sessions: usize,
    /// Most recently accessed first.
    pub sessions: Vec<SessionSummary>,
}
