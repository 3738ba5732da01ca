use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::SessionStore;
use crate::session::{Session, SessionId};

/// In-process store. Contents are lost when the process exits.
#[derive(Default)]
pub struct MemoryStore {
    sessions: Mutex<HashMap<SessionId, Session>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get(&self, id: &str) -> Option<Session> {
        self.sessions.lock().await.get(id).cloned()
    }

    async fn set(&self, session: &Session) {
        self.sessions
            .lock()
            .await
            .insert(session.id.clone(), session.clone());
    }

    async fn delete(&self, id: &str) {
        self.sessions.lock().await.remove(id);
    }

    async fn has(&self, id: &str) -> bool {
        self.sessions.lock().await.contains_key(id)
    }

    async fn clear(&self) {
        self.sessions.lock().await.clear();
    }

    async fn get_all(&self) -> Vec<Session> {
        self.sessions.lock().await.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionStatus;
    use chrono::Utc;

    fn make_session(id: &str, owner: &str) -> Session {
        Session::new(id, owner, SessionStatus::Active, Utc::now())
    }

    #[tokio::test]
    async fn set_then_get() {
        let store = MemoryStore::new();
        store.set(&make_session("s-1", "alice")).await;

        let loaded = store.get("s-1").await.unwrap();
        assert_eq!(loaded.owner, "alice");
        assert!(store.has("s-1").await);
        assert!(!store.has("s-2").await);
    }

    #[tokio::test]
    async fn upsert_is_idempotent_and_keeps_latest() {
        let store = MemoryStore::new();
        store.set(&make_session("s-1", "alice")).await;

        let mut updated = make_session("s-1", "alice");
        updated.status = SessionStatus::Inactive;
        store.set(&updated).await;
        store.set(&updated).await;

        assert_eq!(store.get_all().await.len(), 1);
        assert_eq!(store.get("s-1").await.unwrap().status, SessionStatus::Inactive);
    }

    #[tokio::test]
    async fn get_by_owner_filters() {
        let store = MemoryStore::new();
        store.set(&make_session("a", "alice")).await;
        store.set(&make_session("b", "bob")).await;
        store.set(&make_session("c", "alice")).await;

        let mut ids: Vec<_> = store
            .get_by_owner("alice")
            .await
            .into_iter()
            .map(|s| s.id.0)
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn delete_and_clear() {
        let store = MemoryStore::new();
        store.set(&make_session("a", "alice")).await;
        store.set(&make_session("b", "alice")).await;

        store.delete("a").await;
        assert!(store.get("a").await.is_none());
        // Deleting an unknown id is fine.
        store.delete("zzz").await;

        store.clear().await;
        assert!(store.get_all().await.is_empty());
    }
}
