//! # sessiondeck-core
//!
//! Client-side session mirror for SessionDeck.
//!
//! This crate is framework-agnostic and can be used by:
//! - the `sessiondeck-daemon` CLI
//! - any UI layer that subscribes to the [`event_bus::EventBus`]
//!
//! ## Key Concepts
//!
//! - **Session**: a remote unit of work owned by a user, mirrored locally
//! - **Reconciliation**: last-writer-wins merge of the local mirror against
//!   one page of remote sessions
//! - **Backend mode**: production, or the built-in simulated backend after a
//!   failed probe or call

pub mod backend;
pub mod cache;
pub mod clock;
pub mod config;
pub mod context;
pub mod event_bus;
pub mod paths;
pub mod remote;
pub mod session;
pub mod store;

// Re-export commonly used types
pub use backend::{BackendMode, BackendSelector, Feature, ModePreference};
pub use config::{ConfigError, DeckConfig};
pub use context::DeckContext;
pub use remote::{RemoteClient, RemoteError};
pub use session::{Session, SessionError, SessionId, SessionManager, SessionStatus};
