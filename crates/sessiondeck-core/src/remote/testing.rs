//! Scriptable backend double for unit tests.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::{RemoteClient, RemoteError, SearchParams, SearchResult, SimulatedRemote};
use crate::session::{CreateSessionRequest, Session, SessionMessage};

#[derive(Default)]
pub(crate) struct CallCounts {
    pub create: AtomicUsize,
    pub search: AtomicUsize,
    pub delete: AtomicUsize,
    pub messages: AtomicUsize,
    pub health: AtomicUsize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        self.create.load(Ordering::SeqCst)
            + self.search.load(Ordering::SeqCst)
            + self.delete.load(Ordering::SeqCst)
            + self.messages.load(Ordering::SeqCst)
            + self.health.load(Ordering::SeqCst)
    }
}

/// Wraps a [`SimulatedRemote`] and injects failures on demand.
#[derive(Default)]
pub(crate) struct ScriptedRemote {
    pub backend: SimulatedRemote,
    pub calls: CallCounts,
    /// Number of upcoming `create` calls that fail before one succeeds.
    pub failing_creates: AtomicU32,
    pub fail_everything: AtomicBool,
    pub fail_deletes: AtomicBool,
    pub unhealthy: AtomicBool,
    /// `health_check` never resolves.
    pub hang_health: AtomicBool,
    /// Milliseconds each `search` sleeps before answering.
    pub search_delay_ms: AtomicU64,
    /// Searches that have returned.
    pub searches_completed: AtomicUsize,
}

impl ScriptedRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_creates(self, n: u32) -> Self {
        self.failing_creates.store(n, Ordering::SeqCst);
        self
    }

    pub fn failing_everything(self) -> Self {
        self.fail_everything.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_deletes(self) -> Self {
        self.fail_deletes.store(true, Ordering::SeqCst);
        self
    }

    pub fn unhealthy(self) -> Self {
        self.unhealthy.store(true, Ordering::SeqCst);
        self
    }

    pub fn hanging_health(self) -> Self {
        self.hang_health.store(true, Ordering::SeqCst);
        self
    }

    pub fn slow_search(self, delay: Duration) -> Self {
        self.search_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
        self
    }

    pub fn seed(&self, session: Session) {
        self.backend.insert(session);
    }

    fn outage(&self, op: &str) -> Result<(), RemoteError> {
        if self.fail_everything.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable(format!("scripted outage during {op}")));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteClient for ScriptedRemote {
    async fn create(&self, request: &CreateSessionRequest) -> Result<Session, RemoteError> {
        let attempt = self.calls.create.fetch_add(1, Ordering::SeqCst) + 1;
        self.outage("create")?;

        let remaining = self.failing_creates.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_creates.store(remaining - 1, Ordering::SeqCst);
            return Err(RemoteError::Transport(format!("create attempt {attempt} failed")));
        }
        self.backend.create(request).await
    }

    async fn search(&self, params: &SearchParams) -> Result<SearchResult, RemoteError> {
        self.calls.search.fetch_add(1, Ordering::SeqCst);
        let delay = self.search_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.outage("search")?;
        let result = self.backend.search(params).await;
        self.searches_completed.fetch_add(1, Ordering::SeqCst);
        result
    }

    async fn delete(&self, id: &str) -> Result<(), RemoteError> {
        self.calls.delete.fetch_add(1, Ordering::SeqCst);
        self.outage("delete")?;
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(RemoteError::Status {
                status: 502,
                message: "bad gateway".to_string(),
            });
        }
        self.backend.delete(id).await
    }

    async fn messages(&self, id: &str) -> Result<Vec<SessionMessage>, RemoteError> {
        self.calls.messages.fetch_add(1, Ordering::SeqCst);
        self.outage("messages")?;
        self.backend.messages(id).await
    }

    async fn health_check(&self) -> Result<bool, RemoteError> {
        self.calls.health.fetch_add(1, Ordering::SeqCst);
        if self.hang_health.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.outage("health")?;
        Ok(!self.unhealthy.load(Ordering::SeqCst))
    }
}
