//! Backends the session manager talks to.
//!
//! The remote API has no point lookup: sessions are only reachable through
//! paged [`RemoteClient::search`]. Transport details (HTTP framing, timeouts,
//! error bodies) belong to each implementation.

mod http;
mod simulated;
#[cfg(test)]
pub(crate) mod testing;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::{CreateSessionRequest, Session, SessionMessage, SessionStatus};

pub use http::{HttpRemoteClient, DEFAULT_REQUEST_TIMEOUT};
pub use simulated::SimulatedRemote;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RemoteError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Backend returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Failed to decode backend response: {0}")]
    Decode(String),

    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// Filters for a paged session listing. Pages are 1-based.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<SessionStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl SearchParams {
    /// First page of everything, at most `limit` records.
    pub fn first_page(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            ..Default::default()
        }
    }

    pub fn for_owner(owner: impl Into<String>, limit: u32) -> Self {
        Self {
            owner: Some(owner.into()),
            limit: Some(limit),
            ..Default::default()
        }
    }
}

/// One page of sessions plus the total number matching the filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub sessions: Vec<Session>,
    pub total: u64,
}

/// Operations the core needs from a session backend.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    async fn create(&self, request: &CreateSessionRequest) -> Result<Session, RemoteError>;

    async fn search(&self, params: &SearchParams) -> Result<SearchResult, RemoteError>;

    async fn delete(&self, id: &str) -> Result<(), RemoteError>;

    async fn messages(&self, id: &str) -> Result<Vec<SessionMessage>, RemoteError>;

    /// `Ok(false)` and `Err(_)` both mean "not healthy".
    async fn health_check(&self) -> Result<bool, RemoteError>;
}
