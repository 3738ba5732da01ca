//! File-backed session store.
//!
//! # File Structure
//!
//! ```text
//! <config_dir>/sessions/
//! ├── <session-id>.json
//! └── ...
//! ```
//!
//! # Design Notes
//!
//! - **Atomic writes**: write `<id>.json.tmp`, then rename over `<id>.json`
//! - **No repair**: a file that fails to parse is skipped, not fixed
//! - **Safe names**: ids that are not a single plain path component are refused

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use super::SessionStore;
use crate::session::Session;

/// Internal error type. Never crosses the [`SessionStore`] boundary.
#[derive(Debug, thiserror::Error)]
enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid session id for file storage: {0}")]
    InvalidId(String),
}

/// Persists each session as its own JSON file.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_path(&self, id: &str) -> Result<PathBuf, StoreError> {
        validate_id(id)?;
        Ok(self.dir.join(format!("{id}.json")))
    }

    async fn read(&self, id: &str) -> Result<Option<Session>, StoreError> {
        let path = self.file_path(id)?;
        match fs::read_to_string(&path).await {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, session: &Session) -> Result<(), StoreError> {
        let file_path = self.file_path(session.id.as_str())?;
        let temp_path = self.dir.join(format!("{}.json.tmp", session.id));

        fs::create_dir_all(&self.dir).await?;

        let json = serde_json::to_string_pretty(session)?;
        fs::write(&temp_path, json).await?;
        fs::rename(&temp_path, &file_path).await?;

        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<(), StoreError> {
        let path = self.file_path(id)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Paths of every session file, skipping temp files.
    async fn list_files(&self) -> Result<Vec<PathBuf>, StoreError> {
        let mut files = Vec::new();

        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(files),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                files.push(path);
            }
        }

        Ok(files)
    }

    async fn read_all(&self) -> Result<Vec<Session>, StoreError> {
        let mut sessions = Vec::new();

        for path in self.list_files().await? {
            let contents = match fs::read_to_string(&path).await {
                Ok(c) => c,
                Err(e) => {
                    log::warn!("Skipping unreadable session file {}: {}", path.display(), e);
                    continue;
                }
            };
            match serde_json::from_str::<Session>(&contents) {
                Ok(session) => sessions.push(session),
                Err(e) => {
                    log::warn!("Skipping corrupt session file {}: {}", path.display(), e);
                }
            }
        }

        Ok(sessions)
    }

    async fn remove_all(&self) -> Result<(), StoreError> {
        for path in self.list_files().await? {
            fs::remove_file(&path).await?;
        }
        Ok(())
    }
}

fn validate_id(id: &str) -> Result<(), StoreError> {
    if id.is_empty() || id.contains(['/', '\\']) {
        return Err(StoreError::InvalidId(id.to_string()));
    }

    let mut components = Path::new(id).components();
    match components.next() {
        Some(Component::Normal(_)) if components.next().is_none() => Ok(()),
        _ => Err(StoreError::InvalidId(id.to_string())),
    }
}

#[async_trait]
impl SessionStore for FileStore {
    async fn get(&self, id: &str) -> Option<Session> {
        match self.read(id).await {
            Ok(session) => session,
            Err(e) => {
                log::warn!("Failed to load session {}: {}", id, e);
                None
            }
        }
    }

    async fn set(&self, session: &Session) {
        if let Err(e) = self.write(session).await {
            log::warn!("Failed to save session {}: {}", session.id, e);
        }
    }

    async fn delete(&self, id: &str) {
        if let Err(e) = self.remove(id).await {
            log::warn!("Failed to delete session {}: {}", id, e);
        }
    }

    async fn clear(&self) {
        if let Err(e) = self.remove_all().await {
            log::warn!("Failed to clear session store {}: {}", self.dir.display(), e);
        }
    }

    async fn get_all(&self) -> Vec<Session> {
        match self.read_all().await {
            Ok(sessions) => sessions,
            Err(e) => {
                log::warn!("Failed to list session store {}: {}", self.dir.display(), e);
                Vec::new()
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
