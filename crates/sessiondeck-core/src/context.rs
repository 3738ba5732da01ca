//! DeckContext - the shared state every SessionDeck front end works against.
//!
//! ## Architecture
//!
//! ```text
//!                    ┌──────────────────────────┐
//!                    │       DeckContext        │
//!                    ├──────────────────────────┤
//!                    │  - EventBus              │
//!                    │  - SessionManager        │
//!                    │  - BackendSelector       │
//!                    │  - SessionStore / Cache  │
//!                    └────────────┬─────────────┘
//!                                 │
//!                 ┌───────────────┴───────────────┐
//!                 ▼                               ▼
//!          ┌─────────────┐                 ┌─────────────┐
//!          │   Daemon    │                 │  UI layers  │
//!          │    (CLI)    │                 │  (events)   │
//!          └─────────────┘                 └─────────────┘
//! ```
//!
//! There is no global instance. Build one at startup and clone it where
//! needed; clones share every component.

use std::path::PathBuf;
use std::sync::Arc;

use crate::backend::{has_simulated_backend, BackendSelector};
use crate::cache::SessionCache;
use crate::clock::{Clock, SystemClock};
use crate::config::DeckConfig;
use crate::event_bus::EventBus;
use crate::paths;
use crate::remote::{HttpRemoteClient, RemoteClient, SimulatedRemote};
use crate::session::SessionManager;
use crate::store::{FileStore, MemoryStore, SessionStore};

#[derive(Default)]
pub struct DeckContextBuilder {
    config: Option<DeckConfig>,
    config_dir: Option<PathBuf>,
    event_bus: Option<Arc<EventBus>>,
    clock: Option<Arc<dyn Clock>>,
    store: Option<Arc<dyn SessionStore>>,
    cache: Option<Arc<SessionCache>>,
    live_remote: Option<Arc<dyn RemoteClient>>,
    simulated_remote: Option<Arc<dyn RemoteClient>>,
}

impl DeckContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: DeckConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the configuration directory. Required for on-disk persistence.
    pub fn config_dir(mut self, dir: PathBuf) -> Self {
        self.config_dir = Some(dir);
        self
    }

    /// Use an existing EventBus (for testing or custom configurations).
    pub fn event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Use an existing store instead of the one `persist` would pick.
    pub fn store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn cache(mut self, cache: Arc<SessionCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Use this client as the production backend instead of HTTP.
    pub fn live_remote(mut self, remote: Arc<dyn RemoteClient>) -> Self {
        self.live_remote = Some(remote);
        self
    }

    pub fn simulated_remote(mut self, remote: Arc<dyn RemoteClient>) -> Self {
        self.simulated_remote = Some(remote);
        self
    }

    pub fn build(self) -> DeckContext {
        let config = self.config.unwrap_or_default();
        let event_bus = self.event_bus.unwrap_or_else(|| Arc::new(EventBus::new()));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let store: Arc<dyn SessionStore> = match self.store {
            Some(store) => store,
            None => match (&self.config_dir, config.persist) {
                (Some(dir), true) => Arc::new(FileStore::new(paths::sessions_dir(dir))),
                (None, true) => {
                    log::warn!("No config directory set, sessions will not be persisted");
                    Arc::new(MemoryStore::new())
                }
                (_, false) => Arc::new(MemoryStore::new()),
            },
        };

        let cache = self.cache.unwrap_or_else(|| {
            Arc::new(SessionCache::with_clock(config.cache_ttl(), Arc::clone(&clock)))
        });

        let live: Arc<dyn RemoteClient> = match self.live_remote {
            Some(remote) => remote,
            None => Arc::new(HttpRemoteClient::with_timeout(
                config.api_base_url.clone(),
                config.request_timeout(),
            )),
        };

        let backend_config = config.backend_config();
        let simulated: Option<Arc<dyn RemoteClient>> = match self.simulated_remote {
            Some(remote) => Some(remote),
            // Seeded from the store, so a sync against it keeps saved sessions.
            None if has_simulated_backend(&backend_config) => Some(Arc::new(
                SimulatedRemote::with_clock(Arc::clone(&clock)).with_store(Arc::clone(&store)),
            )),
            None => None,
        };

        let mut selector =
            BackendSelector::new(backend_config, live).with_event_bus(Arc::clone(&event_bus));
        if let Some(simulated) = simulated {
            selector = selector.with_simulated(simulated);
        }
        let backend = Arc::new(selector);

        let sessions = Arc::new(
            SessionManager::new(
                Arc::clone(&store),
                Arc::clone(&cache),
                Arc::clone(&backend) as Arc<dyn RemoteClient>,
                config.manager_config(),
            )
            .with_clock(clock)
            .with_event_bus(Arc::clone(&event_bus)),
        );

        DeckContext {
            config: Arc::new(config),
            config_dir: self.config_dir,
            event_bus,
            store,
            cache,
            backend,
            sessions,
        }
    }
}

/// Shared state for all SessionDeck operations.
///
/// All fields use `Arc`; cloning the context clones the pointers only.
#[derive(Clone)]
pub struct DeckContext {
    pub config: Arc<DeckConfig>,
    config_dir: Option<PathBuf>,
    pub event_bus: Arc<EventBus>,
    pub store: Arc<dyn SessionStore>,
    pub cache: Arc<SessionCache>,
    /// Mode selector; also the remote client the manager talks to.
    pub backend: Arc<BackendSelector>,
    pub sessions: Arc<SessionManager>,
}

impl DeckContext {
    pub fn builder() -> DeckContextBuilder {
        DeckContextBuilder::new()
    }

    pub fn config_dir(&self) -> Option<&PathBuf> {
        self.config_dir.as_ref()
    }
}
