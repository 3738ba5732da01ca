//! Durable storage for session records.
//!
//! # Failure Policy
//!
//! A [`SessionStore`] never returns an error. I/O and deserialization failures
//! are logged and reported as "absent" (for point reads) or "empty" (for
//! listings). A broken persistence layer therefore makes the dashboard look
//! empty instead of taking it down.
//!
//! # Implementations
//!
//! - [`MemoryStore`] - process-local map, used by tests and `persist = false`
//! - [`FileStore`] - one JSON file per session under a profile directory
//!
//! Records carry no schema version, so there is no migration path when the
//! record shape changes.

mod file;
mod memory;

use async_trait::async_trait;

use crate::session::Session;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Key-value persistence for sessions, keyed by session id.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, id: &str) -> Option<Session>;

    /// Insert or replace. Writing the same record twice is a no-op.
    async fn set(&self, session: &Session);

    async fn delete(&self, id: &str);

    async fn has(&self, id: &str) -> bool {
        self.get(id).await.is_some()
    }

    async fn clear(&self);

    async fn get_all(&self) -> Vec<Session>;

    async fn get_by_owner(&self, owner: &str) -> Vec<Session> {
        self.get_all()
            .await
            .into_iter()
            .filter(|s| s.owner == owner)
            .collect()
    }
}
