//! Thread-safe facade over the session store.

use crate::checkpoint::{CheckpointMirror, NoopMirror};
use crate::config::MemoryConfig;
use crate::store::SessionStore;
use crate::types::MemoryStats;
use chrono::{DateTime, Utc};
use parley_types::{ChatMessage, ConfigError, Role};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Multi-session conversation memory.
///
/// All state lives in one [`SessionStore`] behind a single mutex, so every
/// structural change and every per-record mutation is serialized. No method
/// holds the guard across an `.await`.
pub struct MemoryManager {
    store: Mutex<SessionStore>,
    config: MemoryConfig,
}

impl MemoryManager {
    /// Create a manager. Fails if `config` has unusable limits.
    pub fn new(config: MemoryConfig, mirror: Arc<dyn CheckpointMirror>) -> Result<Self, ConfigError> {
        config.validate()?;
        tracing::debug!(
            max_sessions = config.max_sessions,
            max_history_length = config.max_history_length,
            expiry_secs = config.expiry.as_secs(),
            mirror = mirror.name(),
            "Memory manager initialized"
        );
        Ok(Self {
            store: Mutex::new(SessionStore::new(
                config.max_sessions,
                config.max_history_length,
                mirror,
            )),
            config,
        })
    }

    /// Create a manager with mirroring disabled.
    pub fn without_mirror(config: MemoryConfig) -> Result<Self, ConfigError> {
        Self::new(config, Arc::new(NoopMirror))
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Create a session, evicting the least recently used one if at capacity.
    pub fn create_session(&self, id: Option<&str>) -> String {
        self.lock().create(id, Utc::now())
    }

    /// Return `id` if it names a live session, otherwise create one
    /// (preferring `id` as the new identifier).
    pub fn get_or_create(&self, id: Option<&str>) -> String {
        let now = Utc::now();
        let mut store = self.lock();
        match id {
            Some(id) if store.get(id, now).is_some() => id.to_string(),
            _ => store.create(id, now),
        }
    }

    /// Append a user entry, creating the session if needed. Returns the session id.
    pub fn add_user_message(&self, id: &str, text: &str) -> String {
        self.append(id, Role::User, text)
    }

    /// Append an assistant entry, creating the session if needed. Returns the session id.
    pub fn add_ai_message(&self, id: &str, text: &str) -> String {
        self.append(id, Role::Assistant, text)
    }

    fn append(&self, id: &str, role: Role, text: &str) -> String {
        let now = Utc::now();
        let mut store = self.lock();
        let id = if store.get(id, now).is_some() {
            id.to_string()
        } else {
            store.create(Some(id), now)
        };
        if let Some(record) = store.get(&id, now) {
            record.append(role, text, now);
        }
        store.mirror_upsert(&id);
        id
    }

    /// The trailing history view for `id`; empty if the session is unknown.
    pub fn history(&self, id: &str) -> Vec<ChatMessage> {
        self.lock()
            .get(id, Utc::now())
            .map(|record| record.history_view().to_vec())
            .unwrap_or_default()
    }

    /// The full message log for `id`; empty if the session is unknown.
    pub fn messages(&self, id: &str) -> Vec<ChatMessage> {
        self.lock()
            .get(id, Utc::now())
            .map(|record| record.messages().to_vec())
            .unwrap_or_default()
    }

    /// The history view rendered as `Human:`/`Assistant:` lines; empty if unknown.
    pub fn history_as_text(&self, id: &str) -> String {
        self.lock()
            .get(id, Utc::now())
            .map(|record| record.rendered_buffer())
            .unwrap_or_default()
    }

    /// Remove a session and its checkpoint. Returns whether it existed.
    pub fn clear(&self, id: &str) -> bool {
        self.lock().remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains(id)
    }

    /// Number of live sessions.
    pub fn active_count(&self) -> usize {
        self.lock().len()
    }

    /// Snapshot of live sessions. Does not count as an access.
    pub fn stats(&self) -> MemoryStats {
        let store = self.lock();
        MemoryStats {
            active_sessions: store.len(),
            sessions: store.summaries(),
        }
    }

    /// Remove every session idle longer than the configured expiry.
    pub fn reclaim_expired(&self) -> usize {
        self.reclaim_expired_at(Utc::now())
    }

    /// [`Self::reclaim_expired`] evaluated at an explicit instant.
    pub fn reclaim_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut store = self.lock();
        let expired = store.expired(now, self.config.expiry);
        for id in &expired {
            store.remove(id);
        }
        expired.len()
    }

    fn lock(&self) -> MutexGuard<'_, SessionStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::{MemorySaver, VersionedMirror};
    use chrono::TimeDelta;
    use std::time::Duration;

    fn manager(max_sessions: usize, max_history_length: usize) -> MemoryManager {
        MemoryManager::without_mirror(MemoryConfig {
            max_sessions,
            max_history_length,
            ..MemoryConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn invalid_config_rejected_at_construction() {
        let config = MemoryConfig {
            max_sessions: 0,
            ..MemoryConfig::default()
        };
        assert!(matches!(
            MemoryManager::without_mirror(config),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn history_trims_to_last_entries() {
        let mgr = manager(10, 2);
        mgr.add_user_message("s", "A");
        mgr.add_ai_message("s", "B");
        mgr.add_user_message("s", "C");

        assert_eq!(
            mgr.history("s"),
            vec![ChatMessage::assistant("B"), ChatMessage::user("C")]
        );
        assert_eq!(mgr.history_as_text("s"), "Assistant: B\nHuman: C");
        assert_eq!(mgr.messages("s").len(), 3);
    }

    #[test]
    fn add_message_creates_session_with_supplied_id() {
        let mgr = manager(10, 20);
        let id = mgr.add_user_message("alice", "hi");
        assert_eq!(id, "alice");
        assert_eq!(mgr.active_count(), 1);
    }

    #[test]
    fn add_message_with_empty_id_generates_one() {
        let mgr = manager(10, 20);
        let id = mgr.add_user_message("", "hi");
        assert!(!id.is_empty());
        assert_eq!(mgr.messages(&id), vec![ChatMessage::user("hi")]);
    }

    #[test]
    fn get_or_create_returns_existing() {
        let mgr = manager(10, 20);
        let id = mgr.get_or_create(None);
        mgr.add_user_message(&id, "hello");
        assert_eq!(mgr.get_or_create(Some(&id)), id);
        assert_eq!(mgr.messages(&id).len(), 1);
    }

    #[test]
    fn get_or_create_prefers_supplied_id() {
        let mgr = manager(10, 20);
        assert_eq!(mgr.get_or_create(Some("bob")), "bob");
        assert!(mgr.contains("bob"));
    }

    #[test]
    fn unknown_session_history_is_empty_and_not_created() {
        let mgr = manager(10, 20);
        assert_eq!(mgr.history_as_text("ghost"), "");
        assert!(mgr.history("ghost").is_empty());
        assert_eq!(mgr.active_count(), 0);
    }

    #[test]
    fn clear_then_get_or_create_is_fresh() {
        let mgr = manager(10, 20);
        mgr.add_user_message("s", "hello");
        assert!(mgr.clear("s"));
        assert_eq!(mgr.get_or_create(Some("s")), "s");
        let stats = mgr.stats();
        assert_eq!(stats.active_sessions, 1);
        assert_eq!(stats.sessions[0].message_count, 0);
    }

    #[test]
    fn clear_unknown_is_noop() {
        let mgr = manager(10, 20);
        assert!(!mgr.clear("ghost"));
    }

    #[test]
    fn capacity_keeps_most_recently_accessed() {
        let mgr = manager(2, 20);
        mgr.create_session(Some("s1"));
        std::thread::sleep(Duration::from_millis(2));
        mgr.create_session(Some("s2"));
        std::thread::sleep(Duration::from_millis(2));
        mgr.history("s1");
        std::thread::sleep(Duration::from_millis(2));
        mgr.create_session(Some("s3"));

        assert_eq!(mgr.active_count(), 2);
        assert!(mgr.contains("s1"));
        assert!(!mgr.contains("s2"));
        assert!(mgr.contains("s3"));
    }

    #[test]
    fn reclaim_removes_idle_sessions_only() {
        let mgr = manager(10, 20);
        mgr.add_user_message("idle", "x");
        let later = Utc::now() + TimeDelta::minutes(31);
        assert_eq!(mgr.reclaim_expired_at(later), 1);
        assert!(!mgr.contains("idle"));
        assert!(mgr.stats().sessions.is_empty());
    }

    #[test]
    fn reclaim_keeps_recent_sessions() {
        let mgr = manager(10, 20);
        mgr.add_user_message("recent", "x");
        assert_eq!(mgr.reclaim_expired(), 0);
        assert!(mgr.contains("recent"));
    }

    #[test]
    fn stats_does_not_bump_access() {
        let mgr = manager(10, 20);
        mgr.create_session(Some("s"));
        let before = mgr.stats().sessions[0].last_accessed_at;
        std::thread::sleep(Duration::from_millis(2));
        let after = mgr.stats().sessions[0].last_accessed_at;
        assert_eq!(before, after);
    }

    #[test]
    fn every_append_is_mirrored_and_clear_deletes() {
        let mirror = Arc::new(VersionedMirror::new(MemorySaver::new()));
        let mgr = MemoryManager::new(MemoryConfig::default(), mirror.clone()).unwrap();

        mgr.add_user_message("s", "q");
        mgr.add_ai_message("s", "a");
        let stored = mirror.saver().get("s").unwrap();
        assert_eq!(stored.messages.len(), 2);
        assert_eq!(stored.version, 2);

        mgr.clear("s");
        assert!(mirror.saver().get("s").is_none());
    }
}
