//! Short-lived read-through cache of session records.
//!
//! The cache is a performance layer only. Entries expire `ttl` after they were
//! last written; expiry is checked lazily on [`SessionCache::get`] and in bulk
//! by [`SessionCache::cleanup`]. Nothing runs in the background.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::clock::{Clock, SystemClock};
use crate::session::Session;

/// Default lifetime of a cache entry.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

struct CacheEntry {
    session: Session,
    expires_at: DateTime<Utc>,
}

pub struct SessionCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    ttl: chrono::Duration,
    clock: Arc<dyn Clock>,
}

impl SessionCache {
    /// Create a cache using the system clock.
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        // Out-of-range TTLs are clamped to a century.
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(36_500));
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            clock,
        }
    }

    /// Look up a session. Expired entries are evicted and reported as absent.
    pub fn get(&self, id: &str) -> Option<Session> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap();

        match entries.get(id) {
            Some(entry) if entry.expires_at > now => Some(entry.session.clone()),
            Some(_) => {
                log::debug!("cache entry expired: {}", id);
                entries.remove(id);
                None
            }
            None => None,
        }
    }

    /// Insert or replace a session, restarting its TTL.
    pub fn set(&self, session: Session) {
        let expires_at = self
            .clock
            .now()
            .checked_add_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let key = session.id.as_str().to_string();
        self.entries
            .lock()
            .unwrap()
            .insert(key, CacheEntry { session, expires_at });
    }

    pub fn delete(&self, id: &str) {
        self.entries.lock().unwrap().remove(id);
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn cleanup(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        let removed = before - entries.len();
        if removed > 0 {
            log::debug!("cache cleanup removed {} expired entries", removed);
        }
        removed
    }

    /// Number of entries held, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SessionCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}
