//! Session management
//!
//! Sessions group chat turns under a caller-supplied identifier. Storage is
//! behind the `SessionStore` trait so backends can be swapped; the in-memory
//! adapter is the one shipped. `SessionLocks` serializes whole chat
//! exchanges per session so turns from concurrent requests cannot interleave.

pub mod adapters;
pub mod locks;
pub mod store;

pub use adapters::InMemorySessionStore;
pub use locks::SessionLocks;
pub use store::{Session, SessionStore, SessionStoreError, SessionStoreRef};

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Periodically drops expired sessions and idle per-session locks
pub fn spawn_cleanup_task(
    sessions: SessionStoreRef,
    locks: Arc<SessionLocks>,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // The first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            match sessions.cleanup_expired_sessions().await {
                Ok(0) => {}
                Ok(removed) => info!(removed, "Removed expired sessions"),
                Err(e) => error!(error = %e, "Session cleanup failed"),
            }
            let pruned = locks.prune();
            debug!(pruned, remaining = locks.len(), "Pruned idle session locks");
        }
    })
}
