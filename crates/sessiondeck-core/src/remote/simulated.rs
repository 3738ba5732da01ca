//! Built-in simulated backend.
//!
//! Keeps sessions in memory and answers every call locally, so the dashboard
//! stays usable (and demoable) with no live backend. Ids are `sim-<uuid>`.
//!
//! A fresh instance knows nothing, and reconciliation treats its page as the
//! whole remote set. Give it the local store with [`SimulatedRemote::with_store`]
//! so it starts from what was saved instead of wiping it on the first sync.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::OnceCell;
use uuid::Uuid;

use super::{RemoteClient, RemoteError, SearchParams, SearchResult};
use crate::clock::{Clock, SystemClock};
use crate::session::{CreateSessionRequest, Session, SessionMessage, SessionStatus};
use crate::store::SessionStore;

/// Page size used when a search doesn't specify one.
const DEFAULT_PAGE_SIZE: u32 = 20;

pub struct SimulatedRemote {
    sessions: Mutex<HashMap<String, Session>>,
    clock: Arc<dyn Clock>,
    seed: Option<Arc<dyn SessionStore>>,
    seeded: OnceCell<()>,
}

impl SimulatedRemote {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            clock,
            seed: None,
            seeded: OnceCell::new(),
        }
    }

    /// Load every session in `store` on first use. Sessions inserted before
    /// that keep their in-memory version.
    pub fn with_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.seed = Some(store);
        self
    }

    async fn ensure_seeded(&self) {
        let Some(store) = &self.seed else {
            return;
        };
        self.seeded
            .get_or_init(|| async {
                let saved = store.get_all().await;
                let count = saved.len();
                let mut sessions = self.sessions.lock().unwrap();
                for session in saved {
                    sessions
                        .entry(session.id.as_str().to_string())
                        .or_insert(session);
                }
                log::debug!("Simulated backend seeded with {} stored sessions", count);
            })
            .await;
    }

    /// Seed or overwrite a session as if another client had written it.
    pub fn insert(&self, session: Session) {
        self.sessions
            .lock()
            .unwrap()
            .insert(session.id.as_str().to_string(), session);
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SimulatedRemote {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteClient for SimulatedRemote {
    async fn create(&self, request: &CreateSessionRequest) -> Result<Session, RemoteError> {
        self.ensure_seeded().await;
        let id = format!("sim-{}", Uuid::new_v4());
        let mut session = Session::new(
            id.clone(),
            request.owner.clone(),
            SessionStatus::Active,
            self.clock.now(),
        );
        session.environment = request.environment.clone();
        session.metadata = request.metadata.clone();
        session.tags = request.tags.clone();
        session.scope = request.scope.clone();
        session.team_id = request.team_id.clone();

        self.sessions.lock().unwrap().insert(id, session.clone());
        Ok(session)
    }

    async fn search(&self, params: &SearchParams) -> Result<SearchResult, RemoteError> {
        self.ensure_seeded().await;
        let sessions = self.sessions.lock().unwrap();

        let mut matching: Vec<&Session> = sessions
            .values()
            .filter(|s| params.owner.as_ref().map_or(true, |o| &s.owner == o))
            .filter(|s| params.status.as_ref().map_or(true, |st| &s.status == st))
            .collect();
        matching.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        let total = matching.len() as u64;
        let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE) as usize;
        let page = params.page.unwrap_or(1).max(1) as usize;

        let page_sessions = matching
            .into_iter()
            .skip((page - 1).saturating_mul(limit))
            .take(limit)
            .cloned()
            .collect();

        Ok(SearchResult {
            sessions: page_sessions,
            total,
        })
    }

    async fn delete(&self, id: &str) -> Result<(), RemoteError> {
        self.ensure_seeded().await;
        self.sessions
            .lock()
            .unwrap()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))
    }

    async fn messages(&self, id: &str) -> Result<Vec<SessionMessage>, RemoteError> {
        self.ensure_seeded().await;
        let sessions = self.sessions.lock().unwrap();
        let session = sessions
            .get(id)
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))?;

        Ok(vec![SessionMessage {
            id: format!("{id}-msg-1"),
            role: "assistant".to_string(),
            content: format!(
                "Simulated session for {}. No live backend is connected.",
                session.owner
            ),
            created_at: session.created_at,
        }])
    }

    async fn health_check(&self) -> Result<bool, RemoteError> {
        Ok(true)
    }
}
