//! Sessions and the manager that keeps the local mirror consistent with the
//! backend.

mod manager;
mod reconcile;
mod state;

pub use manager::{
    ManagerConfig, SessionError, SessionManager, SessionStats, DEFAULT_MAX_RETRIES,
    DEFAULT_RETRY_DELAY, DEFAULT_SYNC_INTERVAL, DEFAULT_SYNC_PAGE_LIMIT, MAX_DELAY,
};
pub use reconcile::SyncReport;
pub use state::{CreateSessionRequest, Session, SessionId, SessionMessage, SessionStatus};
