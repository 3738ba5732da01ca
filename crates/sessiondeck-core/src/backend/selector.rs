//! Routes remote calls to the live backend or the simulated one.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::features::{self, Feature};
use super::mode::{BackendMode, ModeEvent, ModePreference};
use crate::event_bus::{EventBus, SessionEvent};
use crate::remote::{RemoteClient, RemoteError, SearchParams, SearchResult, SimulatedRemote};
use crate::session::{CreateSessionRequest, Session, SessionMessage};

pub const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone, PartialEq)]
pub struct BackendConfig {
    pub preference: ModePreference,
    /// Switch to the simulated backend, for good, after a live call fails.
    pub fallback_to_mock: bool,
    /// Upper bound on the auto-mode health probe.
    pub health_timeout: Duration,
    pub session_proxy_enabled: bool,
    /// Keep a simulated backend around even when production is forced.
    pub simulated_in_production: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            preference: ModePreference::Auto,
            fallback_to_mock: true,
            health_timeout: DEFAULT_HEALTH_TIMEOUT,
            session_proxy_enabled: false,
            simulated_in_production: false,
        }
    }
}

/// Chooses which backend serves each call.
///
/// The selector implements [`RemoteClient`] itself, so the session manager
/// is wired to it and never knows which backend answered.
pub struct BackendSelector {
    config: BackendConfig,
    live: Arc<dyn RemoteClient>,
    simulated: Option<Arc<dyn RemoteClient>>,
    mode: Mutex<BackendMode>,
    /// Serialises initialization so the probe runs once.
    init_lock: tokio::sync::Mutex<()>,
    event_bus: Option<Arc<EventBus>>,
}

impl BackendSelector {
    /// Build a selector. A [`SimulatedRemote`] is created whenever the
    /// configuration calls for one.
    pub fn new(config: BackendConfig, live: Arc<dyn RemoteClient>) -> Self {
        let simulated: Option<Arc<dyn RemoteClient>> = if features::has_simulated_backend(&config)
        {
            Some(Arc::new(SimulatedRemote::new()))
        } else {
            None
        };

        Self {
            config,
            live,
            simulated,
            mode: Mutex::new(BackendMode::Uninitialized),
            init_lock: tokio::sync::Mutex::new(()),
            event_bus: None,
        }
    }

    /// Use a specific simulated backend.
    pub fn with_simulated(mut self, simulated: Arc<dyn RemoteClient>) -> Self {
        if self.config.preference == ModePreference::Production {
            self.config.simulated_in_production = true;
        }
        self.simulated = Some(simulated);
        self
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    pub fn mode(&self) -> BackendMode {
        *self.mode.lock().unwrap()
    }

    pub fn has_simulated(&self) -> bool {
        self.simulated.is_some()
    }

    pub fn is_feature_available(&self, feature: Feature) -> bool {
        features::is_feature_available(&self.config, feature)
    }

    /// Resolve the mode if that hasn't happened yet. Idempotent.
    ///
    /// With [`ModePreference::Auto`] this runs a single health probe bounded
    /// by `health_timeout`.
    pub async fn initialize(&self) -> BackendMode {
        let current = self.mode();
        if current.is_initialized() {
            return current;
        }

        let _guard = self.init_lock.lock().await;
        let current = self.mode();
        if current.is_initialized() {
            return current;
        }

        let event = match self.config.preference {
            ModePreference::Auto => self.probe().await,
            forced => ModeEvent::Forced(forced),
        };
        let mode = self.apply(event);
        log::info!(
            "Backend mode resolved to {} (preference: {})",
            mode,
            self.config.preference
        );
        mode
    }

    async fn probe(&self) -> ModeEvent {
        let timeout = self.config.health_timeout;
        match tokio::time::timeout(timeout, self.live.health_check()).await {
            Ok(Ok(true)) => ModeEvent::ProbeHealthy,
            Ok(Ok(false)) => {
                log::info!("Live backend reported unhealthy");
                ModeEvent::ProbeFailed
            }
            Ok(Err(e)) => {
                log::info!("Live backend health check failed: {}", e);
                ModeEvent::ProbeFailed
            }
            Err(_) => {
                log::info!("Live backend health check timed out after {:?}", timeout);
                ModeEvent::ProbeFailed
            }
        }
    }

    fn apply(&self, event: ModeEvent) -> BackendMode {
        let (from, to) = {
            let mut mode = self.mode.lock().unwrap();
            let from = *mode;
            *mode = from.transition(event);
            (from, *mode)
        };

        if from != to {
            if let Some(bus) = &self.event_bus {
                bus.emit(SessionEvent::ModeChanged { from, to });
            }
        }
        to
    }

    async fn dispatch<T, F, Fut>(&self, op: &str, call: F) -> Result<T, RemoteError>
    where
        F: Fn(Arc<dyn RemoteClient>) -> Fut + Send + Sync,
        Fut: Future<Output = Result<T, RemoteError>> + Send,
        T: Send,
    {
        if self.initialize().await != BackendMode::Production {
            return match &self.simulated {
                Some(simulated) => call(Arc::clone(simulated)).await,
                None => Err(RemoteError::Unavailable(
                    "no simulated backend configured".to_string(),
                )),
            };
        }

        let err = match call(Arc::clone(&self.live)).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        let simulated = match (&self.simulated, self.config.fallback_to_mock) {
            (Some(simulated), true) => Arc::clone(simulated),
            _ => return Err(err),
        };

        log::warn!(
            "Live backend failed during {}: {}. Falling back to simulated backend",
            op,
            err
        );
        self.apply(ModeEvent::CallFailed { fallback: true });
        call(simulated).await
    }
}

#[async_trait]
impl RemoteClient for BackendSelector {
    async fn create(&self, request: &CreateSessionRequest) -> Result<Session, RemoteError> {
        self.dispatch("create", move |client| async move { client.create(request).await })
            .await
    }

    async fn search(&self, params: &SearchParams) -> Result<SearchResult, RemoteError> {
        self.dispatch("search", move |client| async move { client.search(params).await })
            .await
    }

    async fn delete(&self, id: &str) -> Result<(), RemoteError> {
        self.dispatch("delete", move |client| async move { client.delete(id).await })
            .await
    }

    async fn messages(&self, id: &str) -> Result<Vec<SessionMessage>, RemoteError> {
        self.dispatch("messages", move |client| async move { client.messages(id).await })
            .await
    }

    async fn health_check(&self) -> Result<bool, RemoteError> {
        self.dispatch("health", |client| async move { client.health_check().await })
            .await
    }
}
