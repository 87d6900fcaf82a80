use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use studymate_core::ChatTurn;
use thiserror::Error;

/// Error type for session store operations
#[derive(Error, Debug)]
pub enum SessionStoreError {
    /// The caller supplied an unusable session identifier
    #[error("Invalid session id: {0:?}")]
    InvalidId(String),
    /// Error occurred inside the storage backend
    #[error("Storage error: {0}")]
    StorageError(String),
}

/// Conversation state for one caller-defined session
#[derive(Debug, Clone)]
pub struct Session {
    /// Caller-supplied session identifier
    pub id: String,
    /// When the session was created
    pub created_at: DateTime<Utc>,
    /// Last time a turn was appended
    pub updated_at: DateTime<Utc>,
    /// Time after which the session is treated as gone
    pub expires_at: Option<DateTime<Utc>>,
    /// Turns in the order they were appended
    pub turns: Vec<ChatTurn>,
}

impl Session {
    /// Create an empty session with the given ID
    pub fn new(id: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            created_at: now,
            updated_at: now,
            expires_at: None,
            turns: Vec::new(),
        }
    }

    /// Append a turn and mark the session as updated
    pub fn push(&mut self, turn: ChatTurn) {
        self.turns.push(turn);
        self.updated_at = Utc::now();
    }

    /// Check if the session has expired
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now > expires_at,
            None => false,
        }
    }

    #[cfg(test)]
    fn set_expiry(&mut self, expires_at: DateTime<Utc>) {
        self.expires_at = Some(expires_at);
    }

    /// Push the expiry `ttl` past the last update
    pub fn refresh_expiry(&mut self, ttl: Option<Duration>) {
        self.expires_at = ttl.map(|ttl| self.updated_at + ttl);
    }
}

/// Trait defining the interface for session stores
#[async_trait]
pub trait SessionStore: Send + Sync + Debug {
    /// Append one turn, creating the session on first use
    async fn append(&self, id: &str, turn: ChatTurn) -> Result<(), SessionStoreError> {
        self.append_all(id, vec![turn]).await
    }

    /// Append several turns as one step; no other append to the same
    /// session can land between them
    async fn append_all(&self, id: &str, turns: Vec<ChatTurn>) -> Result<(), SessionStoreError>;

    /// Turns of the session in append order; empty if unknown or expired
    async fn get_history(&self, id: &str) -> Result<Vec<ChatTurn>, SessionStoreError>;

    /// Delete a session by ID, returning whether it existed
    async fn delete_session(&self, id: &str) -> Result<bool, SessionStoreError>;

    /// Delete expired sessions
    async fn cleanup_expired_sessions(&self) -> Result<usize, SessionStoreError>;

    /// IDs of all active (non-expired) sessions
    async fn list_sessions(&self) -> Result<Vec<String>, SessionStoreError>;
}

/// Type alias for Arc-wrapped SessionStore trait objects
pub type SessionStoreRef = Arc<dyn SessionStore>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration as StdDuration;

    #[test]
    fn test_session_creation() {
        let session = Session::new("test_id".to_string());

        assert_eq!(session.id, "test_id");
        assert!(session.turns.is_empty());
        assert_eq!(session.expires_at, None);
        assert!(!session.is_expired());
    }

    #[test]
    fn test_push_keeps_order_and_updates_timestamp() {
        let mut session = Session::new("test_id".to_string());
        let initial_updated_at = session.updated_at;
        thread::sleep(StdDuration::from_millis(5));

        session.push(ChatTurn::user("first"));
        session.push(ChatTurn::assistant("second"));

        assert_eq!(session.turns[0].content, "first");
        assert_eq!(session.turns[1].content, "second");
        assert!(session.updated_at > initial_updated_at);
    }

    #[test]
    fn test_session_expiry() {
        let mut session = Session::new("test_id".to_string());

        let future = Utc::now() + Duration::seconds(60);
        session.set_expiry(future);
        assert!(!session.is_expired());

        let past = Utc::now() - Duration::seconds(1);
        session.set_expiry(past);
        assert!(session.is_expired());
    }

    #[test]
    fn test_refresh_expiry() {
        let mut session = Session::new("test_id".to_string());
        session.refresh_expiry(Some(Duration::minutes(5)));
        assert_eq!(session.expires_at, Some(session.updated_at + Duration::minutes(5)));

        session.refresh_expiry(None);
        assert_eq!(session.expires_at, None);
    }
}
