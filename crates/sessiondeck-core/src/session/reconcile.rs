//! Last-writer-wins reconciliation of the local mirror against one page of
//! remote truth.
//!
//! The fetched page is treated as the complete remote set: any local record
//! missing from it is scheduled for removal, even if the remote simply didn't
//! return it because it sat beyond the page limit.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::state::{Session, SessionId};

/// What a reconciliation pass will change.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct ReconcilePlan {
    /// Remote records to write over the local copy.
    pub upserts: Vec<Session>,
    /// Local records absent from the remote page.
    pub removals: Vec<SessionId>,
    /// Remote records whose local copy is as new or newer.
    pub unchanged: usize,
}

pub(crate) fn plan(local: &[Session], remote: &[Session]) -> ReconcilePlan {
    let local_by_id: HashMap<&str, &Session> =
        local.iter().map(|s| (s.id.as_str(), s)).collect();
    let remote_ids: HashSet<&str> = remote.iter().map(|s| s.id.as_str()).collect();

    let mut plan = ReconcilePlan::default();

    for incoming in remote {
        match local_by_id.get(incoming.id.as_str()) {
            Some(existing) if existing.updated_at >= incoming.updated_at => plan.unchanged += 1,
            _ => plan.upserts.push(incoming.clone()),
        }
    }

    plan.removals = local
        .iter()
        .filter(|s| !remote_ids.contains(s.id.as_str()))
        .map(|s| s.id.clone())
        .collect();

    plan
}

/// Outcome of one `sync()` pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// False when the remote page could not be fetched; nothing changed then.
    pub remote_reachable: bool,
    /// Records in the fetched page.
    pub fetched: usize,
    /// Total the remote claims to hold. Larger than `fetched` means the page
    /// limit hid some sessions from this pass.
    pub remote_total: u64,
    pub updated: usize,
    pub removed: usize,
    pub unchanged: usize,
}

impl SyncReport {
    pub fn unreachable() -> Self {
        Self::default()
    }

    pub fn is_truncated(&self) -> bool {
        self.remote_total > self.fetched as u64
    }
}
