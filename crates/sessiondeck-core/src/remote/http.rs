//! REST client for a live session backend.
//!
//! # Endpoints
//!
//! ```text
//! GET    {base}/health                     -> 2xx when healthy
//! POST   {base}/sessions                   -> Session
//! GET    {base}/sessions?owner&status&page&limit -> {sessions, total}
//! DELETE {base}/sessions/{id}
//! GET    {base}/sessions/{id}/messages     -> {messages}
//! ```
//!
//! `ureq` is blocking, so every request runs on tokio's blocking pool.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{RemoteClient, RemoteError, SearchParams, SearchResult};
use crate::session::{CreateSessionRequest, Session, SessionMessage};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    messages: Vec<SessionMessage>,
}

#[derive(Clone)]
pub struct HttpRemoteClient {
    agent: ureq::Agent,
    base_url: String,
}

impl HttpRemoteClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self { agent, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Run a blocking request off the async runtime.
async fn blocking<T, F>(request: F) -> Result<T, RemoteError>
where
    F: FnOnce() -> Result<T, RemoteError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(request)
        .await
        .map_err(|e| RemoteError::Transport(format!("request task failed: {e}")))?
}

fn map_error(err: ureq::Error) -> RemoteError {
    match err {
        ureq::Error::Status(404, response) => {
            RemoteError::NotFound(response.get_url().to_string())
        }
        ureq::Error::Status(status, response) => RemoteError::Status {
            status,
            message: response.into_string().unwrap_or_default(),
        },
        ureq::Error::Transport(transport) => RemoteError::Transport(transport.to_string()),
    }
}

fn decode<T: serde::de::DeserializeOwned>(response: ureq::Response) -> Result<T, RemoteError> {
    response
        .into_json::<T>()
        .map_err(|e| RemoteError::Decode(e.to_string()))
}

/// Percent-encode a path segment (RFC 3986 unreserved characters pass through).
fn encode_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}

#[async_trait]
impl RemoteClient for HttpRemoteClient {
    async fn create(&self, request: &CreateSessionRequest) -> Result<Session, RemoteError> {
        let agent = self.agent.clone();
        let url = self.url("/sessions");
        let body = serde_json::to_value(request).map_err(|e| RemoteError::Decode(e.to_string()))?;

        blocking(move || {
            let response = agent.post(&url).send_json(body).map_err(map_error)?;
            decode(response)
        })
        .await
    }

    async fn search(&self, params: &SearchParams) -> Result<SearchResult, RemoteError> {
        let agent = self.agent.clone();
        let url = self.url("/sessions");
        let params = params.clone();

        blocking(move || {
            let mut request = agent.get(&url);
            if let Some(owner) = &params.owner {
                request = request.query("owner", owner);
            }
            if let Some(status) = &params.status {
                request = request.query("status", status.as_str());
            }
            if let Some(page) = params.page {
                request = request.query("page", &page.to_string());
            }
            if let Some(limit) = params.limit {
                request = request.query("limit", &limit.to_string());
            }
            let response = request.call().map_err(map_error)?;
            decode(response)
        })
        .await
    }

    async fn delete(&self, id: &str) -> Result<(), RemoteError> {
        let agent = self.agent.clone();
        let url = self.url(&format!("/sessions/{}", encode_segment(id)));

        blocking(move || {
            agent.delete(&url).call().map_err(map_error)?;
            Ok(())
        })
        .await
    }

    async fn messages(&self, id: &str) -> Result<Vec<SessionMessage>, RemoteError> {
        let agent = self.agent.clone();
        let url = self.url(&format!("/sessions/{}/messages", encode_segment(id)));

        blocking(move || {
            let response = agent.get(&url).call().map_err(map_error)?;
            let body: MessagesResponse = decode(response)?;
            Ok(body.messages)
        })
        .await
    }

    async fn health_check(&self) -> Result<bool, RemoteError> {
        let agent = self.agent.clone();
        let url = self.url("/health");

        blocking(move || match agent.get(&url).call() {
            Ok(_) => Ok(true),
            Err(ureq::Error::Status(status, _)) => {
                log::debug!("health check returned HTTP {}", status);
                Ok(false)
            }
            Err(e) => Err(map_error(e)),
        })
        .await
    }
}
