use async_trait::async_trait;
use chrono::{Duration, Utc};
use dashmap::DashMap;
use studymate_core::ChatTurn;
use tracing::{debug, info};

use crate::session::store::{Session, SessionStore, SessionStoreError};

/// In-memory implementation of SessionStore with sliding expiry
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    /// Sessions keyed by ID; each entry is locked while it is mutated
    sessions: DashMap<String, Session>,
    /// Idle lifetime of a session; `None` keeps sessions forever
    ttl: Option<Duration>,
}

impl InMemorySessionStore {
    /// Create a store whose sessions never expire
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that forgets sessions idle for longer than `ttl`
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl: Some(ttl),
        }
    }

    fn validate_id(id: &str) -> Result<(), SessionStoreError> {
        if id.trim().is_empty() {
            return Err(SessionStoreError::InvalidId(id.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn append_all(&self, id: &str, turns: Vec<ChatTurn>) -> Result<(), SessionStoreError> {
        Self::validate_id(id)?;

        let mut entry = self
            .sessions
            .entry(id.to_string())
            .or_insert_with(|| Session::new(id.to_string()));

        if entry.is_expired() {
            debug!(session_id = id, "Replacing expired session");
            *entry = Session::new(id.to_string());
        }

        for turn in turns {
            entry.push(turn);
        }
        entry.refresh_expiry(self.ttl);
        Ok(())
    }

    async fn get_history(&self, id: &str) -> Result<Vec<ChatTurn>, SessionStoreError> {
        let history = match self.sessions.get(id) {
            Some(session) if !session.is_expired() => return Ok(session.turns.clone()),
            Some(_) => Vec::new(),
            None => return Ok(Vec::new()),
        };

        // Expired: drop it now rather than waiting for the cleanup pass
        self.sessions.remove_if(id, |_, session| session.is_expired());
        Ok(history)
    }

    async fn delete_session(&self, id: &str) -> Result<bool, SessionStoreError> {
        let existed = self.sessions.remove(id).is_some();
        if existed {
            debug!(session_id = id, "Deleted session");
        }
        Ok(existed)
    }

    async fn cleanup_expired_sessions(&self) -> Result<usize, SessionStoreError> {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, session| !session.is_expired_at(now));
        let count = before.saturating_sub(self.sessions.len());

        if count > 0 {
            info!(count, "Cleaned up expired sessions");
        }
        Ok(count)
    }

    async fn list_sessions(&self) -> Result<Vec<String>, SessionStoreError> {
        let now = Utc::now();
        let active: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| !entry.value().is_expired_at(now))
            .map(|entry| entry.key().clone())
            .collect();

        debug!("Listed {} active sessions", active.len());
        Ok(active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_unknown_session_is_empty() {
        let store = InMemorySessionStore::new();
        assert!(store.get_history("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_history_preserves_append_order() {
        let store = InMemorySessionStore::new();
        store.append("s1", ChatTurn::user("one")).await.unwrap();
        store.append("s1", ChatTurn::assistant("two")).await.unwrap();
        store
            .append_all("s1", vec![ChatTurn::user("three"), ChatTurn::assistant("four")])
            .await
            .unwrap();
        store.append("s2", ChatTurn::user("other")).await.unwrap();

        let history = store.get_history("s1").await.unwrap();
        let contents: Vec<&str> = history.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two", "three", "four"]);
        assert_eq!(store.get_history("s2").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_id_is_rejected() {
        let store = InMemorySessionStore::new();
        let result = store.append("  ", ChatTurn::user("x")).await;
        assert!(matches!(result, Err(SessionStoreError::InvalidId(_))));
    }

    #[tokio::test]
    async fn test_concurrent_exchanges_do_not_interleave() {
        let store = Arc::new(InMemorySessionStore::new());
        let mut handles = Vec::new();
        for task in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..10 {
                    store
                        .append_all(
                            "shared",
                            vec![
                                ChatTurn::user(format!("q{}-{}", task, i)),
                                ChatTurn::assistant(format!("a{}-{}", task, i)),
                            ],
                        )
                        .await
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let history = store.get_history("shared").await.unwrap();
        assert_eq!(history.len(), 16 * 10 * 2);
        for pair in history.chunks(2) {
            let question = pair[0].content.trim_start_matches('q');
            let answer = pair[1].content.trim_start_matches('a');
            assert_eq!(question, answer);
        }
    }

    #[tokio::test]
    async fn test_delete_session() {
        let store = InMemorySessionStore::new();
        store.append("s1", ChatTurn::user("hi")).await.unwrap();

        assert!(store.delete_session("s1").await.unwrap());
        assert!(!store.delete_session("s1").await.unwrap());
        assert!(store.get_history("s1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_expired_sessions_read_empty_and_are_cleaned() {
        let store = InMemorySessionStore::with_ttl(Duration::milliseconds(1));
        store.append("old", ChatTurn::user("hi")).await.unwrap();
        store.append("older", ChatTurn::user("hi")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        assert!(store.list_sessions().await.unwrap().is_empty());
        assert!(store.get_history("old").await.unwrap().is_empty());
        // "old" was dropped by the read, "older" is left for cleanup
        assert_eq!(store.cleanup_expired_sessions().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_append_after_expiry_starts_fresh() {
        let store = InMemorySessionStore::with_ttl(Duration::milliseconds(1));
        store.append("s1", ChatTurn::user("stale")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        store.append("s1", ChatTurn::user("fresh")).await.unwrap();
        let history = store.get_history("s1").await.unwrap();
        assert_eq!(history, vec![ChatTurn::user("fresh")]);
    }

    #[tokio::test]
    async fn test_activity_extends_lifetime() {
        let store = InMemorySessionStore::with_ttl(Duration::seconds(60));
        store.append("s1", ChatTurn::user("hi")).await.unwrap();
        assert_eq!(store.cleanup_expired_sessions().await.unwrap(), 0);
        assert_eq!(store.list_sessions().await.unwrap(), vec!["s1".to_string()]);
    }
}
