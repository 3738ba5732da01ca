//! SessionManager - keeps the local mirror of remote sessions usable.
//!
//! Reads go Cache → Store → Remote; writes go Remote → Store → Cache. Only
//! `create` reports failure to its caller. Every other remote problem is
//! logged and the operation degrades to whatever local state it has.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinHandle;

use super::reconcile::{self, SyncReport};
use super::state::{CreateSessionRequest, Session, SessionId, SessionStatus};
use crate::cache::SessionCache;
use crate::clock::{Clock, SystemClock};
use crate::event_bus::{EventBus, SessionEvent};
use crate::remote::{RemoteClient, RemoteError, SearchParams};
use crate::store::SessionStore;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_SYNC_PAGE_LIMIT: u32 = 100;

/// Longest wait between create attempts or sync passes, whatever the config says.
pub const MAX_DELAY: Duration = Duration::from_secs(365 * 24 * 60 * 60);

#[derive(Debug, Clone, PartialEq)]
pub struct ManagerConfig {
    /// Create attempts before giving up. Values below 1 still make one attempt.
    pub max_retries: u32,
    /// Base of the linear backoff: attempt `n` waits `retry_delay * n`.
    pub retry_delay: Duration,
    pub sync_interval: Duration,
    /// Page size for sync, owner listings and the lookup fallback.
    pub sync_page_limit: u32,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            sync_interval: DEFAULT_SYNC_INTERVAL,
            sync_page_limit: DEFAULT_SYNC_PAGE_LIMIT,
        }
    }
}

#[derive(Error, Debug)]
pub enum SessionError {
    /// The last error from the backend after all attempts were used.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("Invalid session request: {0}")]
    InvalidRequest(String),
}

/// Session counts by status.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub total: usize,
    pub by_status: BTreeMap<String, usize>,
}

impl SessionStats {
    pub fn count(&self, status: &SessionStatus) -> usize {
        self.by_status.get(status.as_str()).copied().unwrap_or(0)
    }
}

/// Orchestrates the store, the cache and the remote backend.
///
/// Build one per context and share it behind an `Arc`; the background sync
/// loop needs the `Arc` to schedule passes.
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    cache: Arc<SessionCache>,
    remote: Arc<dyn RemoteClient>,
    clock: Arc<dyn Clock>,
    event_bus: Arc<EventBus>,
    config: ManagerConfig,
    sync_task: Mutex<Option<JoinHandle<()>>>,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn SessionStore>,
        cache: Arc<SessionCache>,
        remote: Arc<dyn RemoteClient>,
        config: ManagerConfig,
    ) -> Self {
        Self {
            store,
            cache,
            remote,
            clock: Arc::new(SystemClock),
            event_bus: Arc::new(EventBus::new()),
            config,
            sync_task: Mutex::new(None),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = bus;
        self
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    // ========================================================================
    // Create
    // ========================================================================

    /// Create a session on the backend and mirror it locally.
    ///
    /// Attempts are strictly serial with linear backoff. Nothing is stored
    /// unless an attempt succeeds; after the last failure the backend's error
    /// is returned as is.
    pub async fn create(
        &self,
        request: impl Into<CreateSessionRequest>,
    ) -> Result<Session, SessionError> {
        let request = request.into();
        if request.owner.trim().is_empty() {
            return Err(SessionError::InvalidRequest(
                "owner must not be empty".to_string(),
            ));
        }

        let attempts = self.config.max_retries.max(1);
        let mut attempt = 1;

        loop {
            match self.remote.create(&request).await {
                Ok(session) => {
                    self.store.set(&session).await;
                    self.cache.set(session.clone());
                    log::info!(
                        "Created session {} for {} (attempt {})",
                        session.id,
                        session.owner,
                        attempt
                    );
                    self.event_bus.emit(SessionEvent::Created {
                        session: session.clone(),
                    });
                    return Ok(session);
                }
                Err(err) if attempt < attempts => {
                    let delay = self.config.retry_delay.saturating_mul(attempt).min(MAX_DELAY);
                    log::warn!(
                        "Create attempt {}/{} for {} failed: {}. Retrying in {:?}",
                        attempt,
                        attempts,
                        request.owner,
                        err,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    log::warn!(
                        "Create for {} failed after {} attempts: {}",
                        request.owner,
                        attempts,
                        err
                    );
                    return Err(err.into());
                }
            }
        }
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Three-tier lookup. `None` when the id is unknown everywhere.
    ///
    /// The remote has no point lookup, so the last tier scans the first
    /// `sync_page_limit` sessions; anything beyond that page is not found.
    pub async fn get(&self, id: &str) -> Option<Session> {
        if let Some(session) = self.cache.get(id) {
            return Some(session);
        }

        if let Some(session) = self.store.get(id).await {
            self.cache.set(session.clone());
            return Some(session);
        }

        let page = match self
            .remote
            .search(&SearchParams::first_page(self.config.sync_page_limit))
            .await
        {
            Ok(page) => page,
            Err(e) => {
                log::warn!("Remote lookup for session {} failed: {}", id, e);
                return None;
            }
        };

        let session = page.sessions.into_iter().find(|s| s.id.as_str() == id)?;
        self.store.set(&session).await;
        self.cache.set(session.clone());
        Some(session)
    }

    /// Local sessions for `owner` merged with one remote page, remote wins.
    ///
    /// When the remote can't be reached the local list is returned as is, so
    /// a successful return says nothing about remote reachability.
    pub async fn sessions_for_owner(&self, owner: &str) -> Vec<Session> {
        let local = self.store.get_by_owner(owner).await;

        let page = match self
            .remote
            .search(&SearchParams::for_owner(owner, self.config.sync_page_limit))
            .await
        {
            Ok(page) => page,
            Err(e) => {
                log::warn!("Remote listing for {} failed, serving local copy: {}", owner, e);
                return newest_first(local);
            }
        };

        let mut merged: HashMap<SessionId, Session> =
            local.into_iter().map(|s| (s.id.clone(), s)).collect();
        for session in page.sessions {
            merged.insert(session.id.clone(), session);
        }

        let merged: Vec<Session> = merged.into_values().collect();
        for session in &merged {
            self.store.set(session).await;
        }

        newest_first(merged)
    }

    /// Count stored sessions by status.
    pub async fn stats(&self) -> SessionStats {
        let sessions = self.store.get_all().await;
        let mut stats = SessionStats {
            total: sessions.len(),
            ..Default::default()
        };
        for session in sessions {
            *stats
                .by_status
                .entry(session.status.as_str().to_string())
                .or_insert(0) += 1;
        }
        stats
    }

    // ========================================================================
    // Local mutations
    // ========================================================================

    /// Change a session's status locally.
    ///
    /// This never reaches the backend: the new status lives only in the
    /// Store/Cache until a sync brings a newer remote version.
    pub async fn update_status(&self, id: &str, status: SessionStatus) -> Option<Session> {
        let mut session = self.get(id).await?;
        session.status = status;
        session.updated_at = self.clock.now();

        self.store.set(&session).await;
        self.cache.set(session.clone());
        self.event_bus.emit(SessionEvent::Updated {
            session: session.clone(),
        });
        Some(session)
    }

    /// Delete on the backend (best effort) and locally (always).
    ///
    /// If the remote delete failed the session may come back on the next
    /// sync.
    pub async fn delete(&self, id: &str) {
        if let Err(e) = self.remote.delete(id).await {
            log::warn!("Remote delete of session {} failed: {}", id, e);
        }

        self.store.delete(id).await;
        self.cache.delete(id);
        log::info!("Deleted session {}", id);
        self.event_bus.emit(SessionEvent::Deleted { id: id.into() });
    }

    // ========================================================================
    // Reconciliation
    // ========================================================================

    /// Reconcile the store with the first page of remote sessions.
    ///
    /// Remote records win when strictly newer; local records missing from
    /// the page are deleted. The page is taken as the whole remote set, so
    /// accounts with more than `sync_page_limit` sessions lose the overflow
    /// locally on every pass.
    pub async fn sync(&self) -> SyncReport {
        let page = match self
            .remote
            .search(&SearchParams::first_page(self.config.sync_page_limit))
            .await
        {
            Ok(page) => page,
            Err(e) => {
                log::warn!("Sync skipped, remote unreachable: {}", e);
                let report = SyncReport::unreachable();
                self.event_bus.emit(SessionEvent::Synced {
                    report: report.clone(),
                });
                return report;
            }
        };

        let local = self.store.get_all().await;
        let plan = reconcile::plan(&local, &page.sessions);

        for session in &plan.upserts {
            self.store.set(session).await;
            self.cache.set(session.clone());
        }
        for id in &plan.removals {
            self.store.delete(id.as_str()).await;
            self.cache.delete(id.as_str());
        }
        self.cache.cleanup();

        let report = SyncReport {
            remote_reachable: true,
            fetched: page.sessions.len(),
            remote_total: page.total,
            updated: plan.upserts.len(),
            removed: plan.removals.len(),
            unchanged: plan.unchanged,
        };

        if report.is_truncated() {
            log::warn!(
                "Remote holds {} sessions but sync only sees the first {}",
                report.remote_total,
                report.fetched
            );
        }
        log::info!(
            "Sync complete: {} updated, {} removed, {} unchanged",
            report.updated,
            report.removed,
            report.unchanged
        );
        self.event_bus.emit(SessionEvent::Synced {
            report: report.clone(),
        });
        report
    }

    /// Start firing `sync()` every `sync_interval`. No-op when already running.
    ///
    /// Each tick spawns its own pass and does not wait for the previous one,
    /// so slow passes can overlap. Must be called inside a tokio runtime.
    pub fn start_sync(self: &Arc<Self>) {
        let mut task = self.sync_task.lock().unwrap();
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let period = self
            .config
            .sync_interval
            .clamp(Duration::from_millis(1), MAX_DELAY);
        let manager = Arc::downgrade(self);

        *task = Some(tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                ticker.tick().await;
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                tokio::spawn(async move {
                    manager.sync().await;
                });
            }
        }));
        log::info!("Background sync started (every {:?})", period);
    }

    /// Stop scheduling new passes. A pass already running is left to finish.
    pub fn stop_sync(&self) {
        if let Some(handle) = self.sync_task.lock().unwrap().take() {
            handle.abort();
            log::info!("Background sync stopped");
        }
    }

    pub fn is_syncing(&self) -> bool {
        self.sync_task
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        if let Ok(mut task) = self.sync_task.lock() {
            if let Some(handle) = task.take() {
                handle.abort();
            }
        }
    }
}

fn newest_first(mut sessions: Vec<Session>) -> Vec<Session> {
    sessions.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
    sessions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::remote::testing::ScriptedRemote;
    use crate::store::MemoryStore;
    use chrono::{DateTime, TimeZone, Utc};
    use std::sync::atomic::Ordering;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap() + chrono::Duration::seconds(secs)
    }

    fn session(id: &str, owner: &str, updated: i64) -> Session {
        let mut s = Session::new(id, owner, SessionStatus::Active, at(0));
        s.updated_at = at(updated);
        s
    }

    struct Fixture {
        manager: Arc<SessionManager>,
        store: Arc<MemoryStore>,
        cache: Arc<SessionCache>,
        remote: Arc<ScriptedRemote>,
        clock: ManualClock,
    }

    fn fixture(remote: ScriptedRemote) -> Fixture {
        fixture_with(remote, ManagerConfig::default())
    }

    fn fixture_with(remote: ScriptedRemote, config: ManagerConfig) -> Fixture {
        let clock = ManualClock::new(at(1_000));
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(SessionCache::with_clock(
            Duration::from_secs(300),
            Arc::new(clock.clone()),
        ));
        let remote = Arc::new(remote);
        let manager = SessionManager::new(
            Arc::clone(&store) as Arc<dyn SessionStore>,
            Arc::clone(&cache),
            Arc::clone(&remote) as Arc<dyn RemoteClient>,
            config,
        )
        .with_clock(Arc::new(clock.clone()));

        Fixture {
            manager: Arc::new(manager),
            store,
            cache,
            remote,
            clock,
        }
    }

    async fn stored_ids(store: &MemoryStore) -> Vec<String> {
        let mut ids: Vec<String> = store.get_all().await.into_iter().map(|s| s.id.0).collect();
        ids.sort();
        ids
    }

    mod create {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn succeeds_on_third_attempt_and_persists_once() {
            let f = fixture(ScriptedRemote::new().failing_creates(2));

            let session = f.manager.create("alice").await.unwrap();

            assert_eq!(f.remote.calls.create.load(Ordering::SeqCst), 3);
            let all = f.store.get_all().await;
            assert_eq!(all.len(), 1);
            assert_eq!(all[0], session);
            assert_eq!(f.cache.get(session.id.as_str()), Some(session));
        }

        #[tokio::test(start_paused = true)]
        async fn backoff_is_linear() {
            let f = fixture(ScriptedRemote::new().failing_creates(2));

            let started = tokio::time::Instant::now();
            f.manager.create("alice").await.unwrap();
            let elapsed = started.elapsed();

            // 1000ms after attempt 1, 2000ms after attempt 2.
            assert!(elapsed >= Duration::from_millis(3000));
            assert!(elapsed < Duration::from_millis(4000));
        }

        #[tokio::test(start_paused = true)]
        async fn exhausting_retries_returns_last_error_and_stores_nothing() {
            let f = fixture(ScriptedRemote::new().failing_creates(5));

            let err = f.manager.create("alice").await.unwrap_err();

            assert_eq!(err.to_string(), "Transport error: create attempt 3 failed");
            assert!(matches!(err, SessionError::Remote(RemoteError::Transport(_))));
            assert_eq!(f.remote.calls.create.load(Ordering::SeqCst), 3);
            assert!(f.store.get_all().await.is_empty());
            assert!(f.cache.is_empty());
        }

        #[tokio::test(start_paused = true)]
        async fn zero_retries_still_attempts_once() {
            let config = ManagerConfig {
                max_retries: 0,
                ..Default::default()
            };
            let f = fixture_with(ScriptedRemote::new().failing_creates(1), config);

            assert!(f.manager.create("alice").await.is_err());
            assert_eq!(f.remote.calls.create.load(Ordering::SeqCst), 1);
        }

        #[tokio::test(start_paused = true)]
        async fn huge_retry_delay_is_capped() {
            let config = ManagerConfig {
                retry_delay: Duration::MAX,
                ..Default::default()
            };
            let f = fixture_with(ScriptedRemote::new().failing_creates(1), config);

            let started = tokio::time::Instant::now();
            f.manager.create("alice").await.unwrap();

            let elapsed = started.elapsed();
            assert!(elapsed >= MAX_DELAY);
            assert!(elapsed < MAX_DELAY + Duration::from_secs(1));
            assert_eq!(f.remote.calls.create.load(Ordering::SeqCst), 2);
        }

        #[tokio::test]
        async fn empty_owner_is_rejected_before_remote() {
            let f = fixture(ScriptedRemote::new());

            let err = f.manager.create("  ").await.unwrap_err();

            assert!(matches!(err, SessionError::InvalidRequest(_)));
            assert_eq!(f.remote.calls.create.load(Ordering::SeqCst), 0);
        }

        #[tokio::test]
        async fn accepts_full_request() {
            let f = fixture(ScriptedRemote::new());
            let mut request = CreateSessionRequest::from("bob");
            request
                .environment
                .insert("REGION".to_string(), "eu".to_string());

            let session = f.manager.create(request).await.unwrap();
            assert_eq!(session.environment.get("REGION").map(String::as_str), Some("eu"));
        }

        #[tokio::test]
        async fn publishes_created_event() {
            let f = fixture(ScriptedRemote::new());
            let mut rx = f.manager.event_bus().subscribe();

            let session = f.manager.create("alice").await.unwrap();

            assert_eq!(rx.recv().await.unwrap(), SessionEvent::Created { session });
        }
    }

    mod get {
        use super::*;

        #[tokio::test]
        async fn cache_hit_skips_store_and_remote() {
            let f = fixture(ScriptedRemote::new());
            f.cache.set(session("s-1", "alice", 1));

            assert!(f.manager.get("s-1").await.is_some());
            assert!(!f.store.has("s-1").await);
            assert_eq!(f.remote.calls.total(), 0);
        }

        #[tokio::test]
        async fn store_hit_populates_cache() {
            let f = fixture(ScriptedRemote::new());
            f.store.set(&session("s-1", "alice", 1)).await;

            assert!(f.manager.get("s-1").await.is_some());
            assert!(f.cache.get("s-1").is_some());
            assert_eq!(f.remote.calls.total(), 0);
        }

        #[tokio::test]
        async fn falls_back_to_remote_page_scan() {
            let f = fixture(ScriptedRemote::new());
            f.remote.seed(session("s-9", "alice", 5));

            let found = f.manager.get("s-9").await.unwrap();

            assert_eq!(found.id.as_str(), "s-9");
            assert_eq!(f.remote.calls.search.load(Ordering::SeqCst), 1);
            assert!(f.store.has("s-9").await);
            assert!(f.cache.get("s-9").is_some());
        }

        #[tokio::test]
        async fn session_beyond_first_page_is_not_found() {
            let config = ManagerConfig {
                sync_page_limit: 1,
                ..Default::default()
            };
            let f = fixture_with(ScriptedRemote::new(), config);
            f.remote.seed(session("old", "alice", 1));
            f.remote.seed(session("new", "alice", 2));

            assert!(f.manager.get("old").await.is_none());
            assert!(f.manager.get("new").await.is_some());
        }

        #[tokio::test]
        async fn unknown_or_unreachable_is_none() {
            let f = fixture(ScriptedRemote::new());
            assert!(f.manager.get("missing").await.is_none());

            let down = fixture(ScriptedRemote::new().failing_everything());
            assert!(down.manager.get("missing").await.is_none());
        }
    }

    mod update_status {
        use super::*;

        #[tokio::test]
        async fn mutates_locally_without_remote_call() {
            let f = fixture(ScriptedRemote::new());
            f.store.set(&session("s-1", "alice", 1)).await;

            let updated = f
                .manager
                .update_status("s-1", SessionStatus::Inactive)
                .await
                .unwrap();

            assert_eq!(updated.status, SessionStatus::Inactive);
            assert_eq!(updated.updated_at, at(1_000));
            assert_eq!(f.store.get("s-1").await.unwrap(), updated);
            assert_eq!(f.cache.get("s-1").unwrap(), updated);
            assert_eq!(f.remote.calls.total(), 0);
        }

        #[tokio::test]
        async fn unknown_id_returns_none() {
            let f = fixture(ScriptedRemote::new());
            assert!(f
                .manager
                .update_status("nope", SessionStatus::Error)
                .await
                .is_none());
        }

        #[tokio::test]
        async fn local_change_survives_sync_until_remote_is_newer() {
            let f = fixture(ScriptedRemote::new());
            f.remote.seed(session("s-1", "alice", 1));
            f.store.set(&session("s-1", "alice", 1)).await;

            f.manager
                .update_status("s-1", SessionStatus::Error)
                .await
                .unwrap();
            f.manager.sync().await;
            assert_eq!(f.store.get("s-1").await.unwrap().status, SessionStatus::Error);

            let mut newer = session("s-1", "alice", 2_000);
            newer.status = SessionStatus::Inactive;
            f.remote.seed(newer);
            f.manager.sync().await;
            assert_eq!(
                f.store.get("s-1").await.unwrap().status,
                SessionStatus::Inactive
            );
        }
    }

    mod delete {
        use super::*;

        #[tokio::test]
        async fn removes_everywhere() {
            let f = fixture(ScriptedRemote::new());
            let created = f.manager.create("alice").await.unwrap();

            f.manager.delete(created.id.as_str()).await;

            assert!(!f.store.has(created.id.as_str()).await);
            assert!(f.cache.get(created.id.as_str()).is_none());
            assert!(f.remote.backend.is_empty());
        }

        #[tokio::test]
        async fn converges_locally_when_remote_delete_fails() {
            let f = fixture(ScriptedRemote::new().failing_deletes());
            let s = session("s-1", "alice", 1);
            f.store.set(&s).await;
            f.cache.set(s);

            f.manager.delete("s-1").await;

            assert_eq!(f.remote.calls.delete.load(Ordering::SeqCst), 1);
            assert!(!f.store.has("s-1").await);
            assert!(f.cache.get("s-1").is_none());
        }

        #[tokio::test]
        async fn failed_remote_delete_is_resurrected_by_sync() {
            let f = fixture(ScriptedRemote::new().failing_deletes());
            f.remote.seed(session("s-1", "alice", 1));
            f.store.set(&session("s-1", "alice", 1)).await;

            f.manager.delete("s-1").await;
            assert!(!f.store.has("s-1").await);

            f.manager.sync().await;
            assert!(f.store.has("s-1").await);
        }
    }

    mod sessions_for_owner {
        use super::*;

        #[tokio::test]
        async fn remote_entries_overwrite_local_and_union_is_persisted() {
            let f = fixture(ScriptedRemote::new());
            let mut stale = session("A", "alice", 50);
            stale.status = SessionStatus::Error;
            f.store.set(&stale).await;
            f.store.set(&session("C", "alice", 10)).await;
            f.store.set(&session("Z", "zed", 10)).await;
            f.remote.seed(session("A", "alice", 10));
            f.remote.seed(session("B", "alice", 10));

            let sessions = f.manager.sessions_for_owner("alice").await;

            let mut ids: Vec<&str> = sessions.iter().map(|s| s.id.as_str()).collect();
            ids.sort();
            assert_eq!(ids, vec!["A", "B", "C"]);
            // Remote wins even though the local copy is newer.
            let a = sessions.iter().find(|s| s.id.as_str() == "A").unwrap();
            assert_eq!(a.status, SessionStatus::Active);
            assert_eq!(f.store.get("A").await.unwrap().status, SessionStatus::Active);
            assert_eq!(stored_ids(&f.store).await, vec!["A", "B", "C", "Z"]);
        }

        #[tokio::test]
        async fn remote_failure_returns_local_only() {
            let f = fixture(ScriptedRemote::new().failing_everything());
            f.store.set(&session("A", "alice", 1)).await;
            f.store.set(&session("B", "bob", 1)).await;

            let sessions = f.manager.sessions_for_owner("alice").await;

            assert_eq!(sessions.len(), 1);
            assert_eq!(sessions[0].id.as_str(), "A");
        }

        #[tokio::test]
        async fn ordered_newest_first() {
            let f = fixture(ScriptedRemote::new());
            let mut older = session("old", "alice", 1);
            older.created_at = at(1);
            let mut newer = session("new", "alice", 1);
            newer.created_at = at(2);
            f.remote.seed(older);
            f.remote.seed(newer);

            let sessions = f.manager.sessions_for_owner("alice").await;
            assert_eq!(sessions[0].id.as_str(), "new");
            assert_eq!(sessions[1].id.as_str(), "old");
        }
    }

    mod sync {
        use super::*;

        #[tokio::test]
        async fn newer_remote_version_replaces_local_and_new_ones_arrive() {
            let f = fixture(ScriptedRemote::new());
            f.store.set(&session("A", "alice", 1)).await;
            let mut remote_a = session("A", "alice", 2);
            remote_a.tags.insert("source".to_string(), "remote".to_string());
            f.remote.seed(remote_a.clone());
            f.remote.seed(session("B", "bob", 1));

            let report = f.manager.sync().await;

            assert!(report.remote_reachable);
            assert_eq!(report.updated, 2);
            assert_eq!(report.removed, 0);
            assert_eq!(f.store.get("A").await.unwrap(), remote_a);
            assert_eq!(stored_ids(&f.store).await, vec!["A", "B"]);
            assert_eq!(f.cache.get("A").unwrap(), remote_a);
        }

        #[tokio::test]
        async fn local_records_missing_remotely_are_removed() {
            let f = fixture(ScriptedRemote::new());
            f.store.set(&session("A", "alice", 1)).await;
            f.store.set(&session("C", "alice", 1)).await;
            f.cache.set(session("C", "alice", 1));
            f.remote.seed(session("A", "alice", 1));

            let report = f.manager.sync().await;

            assert_eq!(report.removed, 1);
            assert_eq!(report.unchanged, 1);
            assert_eq!(stored_ids(&f.store).await, vec!["A"]);
            assert!(f.cache.get("C").is_none());
        }

        #[tokio::test]
        async fn stale_s1_is_replaced_and_s2_dropped() {
            let f = fixture(ScriptedRemote::new());
            f.store.set(&session("S1", "alice", 50)).await;
            f.store.set(&session("S2", "alice", 50)).await;
            let mut remote_s1 = session("S1", "alice", 100);
            remote_s1.status = SessionStatus::Inactive;
            f.remote.seed(remote_s1.clone());

            f.manager.sync().await;

            let all = f.store.get_all().await;
            assert_eq!(all, vec![remote_s1]);
        }

        #[tokio::test]
        async fn equal_timestamps_keep_local_copy() {
            let f = fixture(ScriptedRemote::new());
            let mut local = session("A", "alice", 5);
            local.status = SessionStatus::Error;
            f.store.set(&local).await;
            f.remote.seed(session("A", "alice", 5));

            let report = f.manager.sync().await;

            assert_eq!(report.updated, 0);
            assert_eq!(f.store.get("A").await.unwrap(), local);
        }

        #[tokio::test]
        async fn unreachable_remote_changes_nothing() {
            let f = fixture(ScriptedRemote::new().failing_everything());
            f.store.set(&session("A", "alice", 1)).await;

            let report = f.manager.sync().await;

            assert!(!report.remote_reachable);
            assert_eq!(stored_ids(&f.store).await, vec!["A"]);
        }

        #[tokio::test]
        async fn sessions_beyond_page_limit_are_dropped_locally() {
            let config = ManagerConfig {
                sync_page_limit: 2,
                ..Default::default()
            };
            let f = fixture_with(ScriptedRemote::new(), config);
            for (id, t) in [("a", 1), ("b", 2), ("c", 3)] {
                f.remote.seed(session(id, "alice", t));
                f.store.set(&session(id, "alice", t)).await;
            }

            let report = f.manager.sync().await;

            assert!(report.is_truncated());
            assert_eq!(report.remote_total, 3);
            assert_eq!(stored_ids(&f.store).await, vec!["b", "c"]);
        }

        #[tokio::test]
        async fn sweeps_expired_cache_entries() {
            let f = fixture(ScriptedRemote::new());
            f.cache.set(session("stale", "alice", 1));
            f.clock.advance(chrono::Duration::seconds(301));

            f.manager.sync().await;

            assert!(f.cache.is_empty());
        }

        #[tokio::test]
        async fn publishes_report() {
            let f = fixture(ScriptedRemote::new());
            let mut rx = f.manager.event_bus().subscribe();
            f.remote.seed(session("A", "alice", 1));

            let report = f.manager.sync().await;

            assert_eq!(rx.recv().await.unwrap(), SessionEvent::Synced { report });
        }
    }

    mod stats {
        use super::*;

        #[tokio::test]
        async fn counts_by_status() {
            let f = fixture(ScriptedRemote::new());
            f.store.set(&session("a", "alice", 1)).await;
            f.store.set(&session("b", "alice", 1)).await;
            let mut errored = session("c", "bob", 1);
            errored.status = SessionStatus::Error;
            f.store.set(&errored).await;
            let mut paused = session("d", "bob", 1);
            paused.status = SessionStatus::Other("paused".to_string());
            f.store.set(&paused).await;

            let stats = f.manager.stats().await;

            assert_eq!(stats.total, 4);
            assert_eq!(stats.count(&SessionStatus::Active), 2);
            assert_eq!(stats.count(&SessionStatus::Error), 1);
            assert_eq!(stats.count(&SessionStatus::Inactive), 0);
            assert_eq!(stats.by_status.get("paused"), Some(&1));
            assert_eq!(f.remote.calls.total(), 0);
        }
    }

    mod background_sync {
        use super::*;

        fn config(interval_secs: u64) -> ManagerConfig {
            ManagerConfig {
                sync_interval: Duration::from_secs(interval_secs),
                ..Default::default()
            }
        }

        #[tokio::test(start_paused = true)]
        async fn ticks_run_sync() {
            let f = fixture_with(ScriptedRemote::new(), config(10));
            f.remote.seed(session("A", "alice", 1));

            f.manager.start_sync();
            assert!(f.manager.is_syncing());

            // Nothing fires before the first full interval.
            tokio::time::sleep(Duration::from_secs(5)).await;
            assert_eq!(f.remote.calls.search.load(Ordering::SeqCst), 0);

            tokio::time::sleep(Duration::from_secs(6)).await;
            assert!(f.store.has("A").await);

            f.manager.stop_sync();
        }

        #[tokio::test(start_paused = true)]
        async fn start_twice_keeps_one_ticker() {
            let f = fixture_with(ScriptedRemote::new(), config(10));

            f.manager.start_sync();
            f.manager.start_sync();
            tokio::time::sleep(Duration::from_secs(11)).await;

            assert_eq!(f.remote.calls.search.load(Ordering::SeqCst), 1);
            f.manager.stop_sync();
        }

        #[tokio::test(start_paused = true)]
        async fn stop_prevents_future_ticks() {
            let f = fixture_with(ScriptedRemote::new(), config(10));

            f.manager.start_sync();
            f.manager.stop_sync();
            tokio::time::sleep(Duration::from_secs(35)).await;

            assert!(!f.manager.is_syncing());
            assert_eq!(f.remote.calls.search.load(Ordering::SeqCst), 0);
        }

        #[tokio::test(start_paused = true)]
        async fn in_flight_pass_finishes_after_stop() {
            let f = fixture_with(
                ScriptedRemote::new().slow_search(Duration::from_secs(5)),
                config(10),
            );
            f.remote.seed(session("A", "alice", 1));

            f.manager.start_sync();
            tokio::time::sleep(Duration::from_secs(11)).await;
            assert_eq!(f.remote.calls.search.load(Ordering::SeqCst), 1);
            assert!(!f.store.has("A").await);

            f.manager.stop_sync();
            tokio::time::sleep(Duration::from_secs(30)).await;

            assert!(f.store.has("A").await);
            assert_eq!(f.remote.calls.search.load(Ordering::SeqCst), 1);
        }

        #[tokio::test(start_paused = true)]
        async fn overlapping_ticks_are_not_excluded() {
            let f = fixture_with(
                ScriptedRemote::new().slow_search(Duration::from_secs(5)),
                config(1),
            );

            f.manager.start_sync();
            tokio::time::sleep(Duration::from_millis(3_500)).await;

            // Three passes started, none finished yet.
            assert_eq!(f.remote.calls.search.load(Ordering::SeqCst), 3);
            assert_eq!(f.remote.searches_completed.load(Ordering::SeqCst), 0);
            f.manager.stop_sync();
        }

        #[tokio::test(start_paused = true)]
        async fn huge_interval_is_capped() {
            let config = ManagerConfig {
                sync_interval: Duration::MAX,
                ..Default::default()
            };
            let f = fixture_with(ScriptedRemote::new(), config);

            f.manager.start_sync();
            tokio::time::sleep(Duration::from_secs(1)).await;
            assert!(f.manager.is_syncing());

            tokio::time::sleep(MAX_DELAY).await;
            assert_eq!(f.remote.calls.search.load(Ordering::SeqCst), 1);
            f.manager.stop_sync();
        }

        #[tokio::test(start_paused = true)]
        async fn ticker_exits_when_manager_is_dropped() {
            let f = fixture_with(ScriptedRemote::new(), config(10));
            let remote = Arc::clone(&f.remote);

            f.manager.start_sync();
            drop(f);
            tokio::time::sleep(Duration::from_secs(25)).await;

            assert_eq!(remote.calls.search.load(Ordering::SeqCst), 0);
        }
    }
}
