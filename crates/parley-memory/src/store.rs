//! Capacity-bounded session map with least-recently-used eviction.

use crate::checkpoint::CheckpointMirror;
use crate::types::{SessionRecord, SessionSummary};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Mapping from session id to [`SessionRecord`].
///
/// Not synchronized on its own; [`crate::MemoryManager`] owns the only
/// instance behind a mutex. Every operation takes an explicit `now` so
/// eviction and expiry are deterministic.
pub struct SessionStore {
    sessions: HashMap<String, SessionRecord>,
    max_sessions: usize,
    max_history_length: usize,
    mirror: Arc<dyn CheckpointMirror>,
}

impl SessionStore {
    pub fn new(
        max_sessions: usize,
        max_history_length: usize,
        mirror: Arc<dyn CheckpointMirror>,
    ) -> Self {
        Self {
            sessions: HashMap::new(),
            max_sessions,
            max_history_length,
            mirror,
        }
    }

    /// Insert a fresh record and return its id.
    ///
    /// A missing or empty `id` gets a generated UUID. An existing id is
    /// overwritten with an empty record rather than merged. Admitting a new id
    /// at capacity first evicts the least recently accessed session.
    pub fn create(&mut self, id: Option<&str>, now: DateTime<Utc>) -> String {
        let id = match id {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => Uuid::new_v4().to_string(),
        };

        if self.sessions.contains_key(&id) {
            tracing::debug!(session_id = %id, "Overwriting existing session");
            self.remove(&id);
        } else if self.sessions.len() >= self.max_sessions {
            self.evict_oldest();
        }

        self.sessions
            .insert(id.clone(), SessionRecord::new(self.max_history_length, now));
        id
    }

    /// Look up a record, recording the access on hit. Misses mutate nothing.
    pub fn get(&mut self, id: &str, now: DateTime<Utc>) -> Option<&mut SessionRecord> {
        let record = self.sessions.get_mut(id)?;
        record.touch(now);
        Some(record)
    }

    /// Look up a record without recording an access.
    pub fn peek(&self, id: &str) -> Option<&SessionRecord> {
        self.sessions.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    /// Remove a record and its mirrored checkpoint. Returns whether it existed.
    ///
    /// Mirror failures are logged and dropped.
    pub fn remove(&mut self, id: &str) -> bool {
        let existed = self.sessions.remove(id).is_some();
        if let Err(e) = self.mirror.delete(id) {
            tracing::warn!(
                session_id = %id,
                mirror = self.mirror.name(),
                error = %e,
                "Failed to clear session checkpoint"
            );
        }
        existed
    }

    /// Push a record's full log to the mirror, logging any failure.
    pub fn mirror_upsert(&self, id: &str) {
        let Some(record) = self.sessions.get(id) else {
            return;
        };
        if let Err(e) = self.mirror.upsert(id, record.messages()) {
            tracing::warn!(
                session_id = %id,
                mirror = self.mirror.name(),
                error = %e,
                "Failed to update session checkpoint"
            );
        }
    }

    /// Evict the least recently accessed session. Ties are broken arbitrarily.
    pub fn evict_oldest(&mut self) -> Option<String> {
        let oldest = self
            .sessions
            .iter()
            .min_by_key(|(_, record)| record.last_accessed_at())
            .map(|(id, _)| id.clone())?;
        tracing::debug!(session_id = %oldest, "Evicting least recently used session");
        self.remove(&oldest);
        Some(oldest)
    }

    /// Ids of sessions idle for strictly longer than `expiry` at `now`.
    pub fn expired(&self, now: DateTime<Utc>, expiry: Duration) -> Vec<String> {
        self.sessions
            .iter()
            .filter(|(_, record)| {
                (now - record.last_accessed_at())
                    .to_std()
                    .is_ok_and(|idle| idle > expiry)
            })
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    /// Summaries of every live session, most recently accessed first.
    pub fn summaries(&self) -> Vec<SessionSummary> {
        let mut summaries: Vec<SessionSummary> = self
            .sessions
            .iter()
            .map(|(id, record)| record.to_summary(id))
            .collect();
        summaries.sort_by(|a, b| b.last_accessed_at.cmp(&a.last_accessed_at));
        summaries
    }
}
