//! Framework-agnostic change notifications.
//!
//! The session manager and the backend selector publish [`SessionEvent`]s
//! here so presentation layers can refresh without polling.
//!
//! # Example
//!
//! ```rust
//! use sessiondeck_core::event_bus::{EventBus, SessionEvent};
//!
//! let bus = EventBus::new();
//! let mut rx = bus.subscribe();
//!
//! bus.emit(SessionEvent::Deleted { id: "s-1".into() });
//!
//! // In async context:
//! // let event = rx.recv().await.unwrap();
//! ```

use serde::Serialize;
use tokio::sync::broadcast;

use crate::backend::BackendMode;
use crate::session::{Session, SessionId, SyncReport};

/// Default channel capacity for the event bus.
/// Slow subscribers that fall further behind than this miss events (lag).
const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionEvent {
    Created { session: Session },
    Updated { session: Session },
    Deleted { id: SessionId },
    Synced { report: SyncReport },
    ModeChanged { from: BackendMode, to: BackendMode },
}

impl SessionEvent {
    /// Short name, handy for log lines and UI routing.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionEvent::Created { .. } => "created",
            SessionEvent::Updated { .. } => "updated",
            SessionEvent::Deleted { .. } => "deleted",
            SessionEvent::Synced { .. } => "synced",
            SessionEvent::ModeChanged { .. } => "modeChanged",
        }
    }
}

pub struct EventBus {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event. Returns how many subscribers received it; with none
    /// listening the event is dropped and 0 is returned.
    pub fn emit(&self, event: SessionEvent) -> usize {
        log::debug!("event: {}", event.kind());
        self.sender.send(event).unwrap_or(0)
    }

    /// Receive all future events. Past events are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
