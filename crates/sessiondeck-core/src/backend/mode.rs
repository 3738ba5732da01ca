//! Backend mode state machine.
//!
//! ```text
//!                  Forced(Production)
//!                  ProbeHealthy
//!   Uninitialized ───────────────────▶ Production
//!        │                                 │
//!        │ Forced(Mock)                    │ CallFailed { fallback: true }
//!        │ ProbeFailed                     ▼
//!        └───────────────────────────▶   Mock  (absorbing)
//! ```
//!
//! Every change of mode goes through [`BackendMode::transition`]. `Mock` never
//! leaves, so a selector that fell back stays on the simulated backend until
//! it is rebuilt.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Which backend is currently serving calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    Uninitialized,
    Production,
    Mock,
}

/// Configured mode preference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModePreference {
    /// Probe the live backend once and pick whichever answers.
    #[default]
    Auto,
    Production,
    Mock,
}

impl FromStr for ModePreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(ModePreference::Auto),
            "production" | "prod" | "live" => Ok(ModePreference::Production),
            "mock" | "simulated" => Ok(ModePreference::Mock),
            other => Err(format!("Unknown backend mode: {other}")),
        }
    }
}

impl std::fmt::Display for ModePreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ModePreference::Auto => "auto",
            ModePreference::Production => "production",
            ModePreference::Mock => "mock",
        };
        f.write_str(name)
    }
}

impl std::fmt::Display for BackendMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BackendMode::Uninitialized => "uninitialized",
            BackendMode::Production => "production",
            BackendMode::Mock => "mock",
        };
        f.write_str(name)
    }
}

/// Inputs that can move the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeEvent {
    /// Initialization with a non-auto preference.
    Forced(ModePreference),
    ProbeHealthy,
    /// Probe returned false, errored, or timed out.
    ProbeFailed,
    /// A live call failed. `fallback` is true when falling back is both
    /// enabled and possible (a simulated backend exists).
    CallFailed { fallback: bool },
}

impl BackendMode {
    /// Pure transition function.
    pub fn transition(self, event: ModeEvent) -> BackendMode {
        match (self, event) {
            (BackendMode::Mock, _) => BackendMode::Mock,

            (BackendMode::Uninitialized, ModeEvent::Forced(ModePreference::Mock)) => {
                BackendMode::Mock
            }
            (BackendMode::Uninitialized, ModeEvent::Forced(ModePreference::Production)) => {
                BackendMode::Production
            }
            (BackendMode::Uninitialized, ModeEvent::Forced(ModePreference::Auto)) => {
                BackendMode::Uninitialized
            }
            (BackendMode::Uninitialized, ModeEvent::ProbeHealthy) => BackendMode::Production,
            (BackendMode::Uninitialized, ModeEvent::ProbeFailed) => BackendMode::Mock,
            (BackendMode::Uninitialized, ModeEvent::CallFailed { .. }) => {
                BackendMode::Uninitialized
            }

            (BackendMode::Production, ModeEvent::CallFailed { fallback: true }) => {
                BackendMode::Mock
            }
            (BackendMode::Production, _) => BackendMode::Production,
        }
    }

    pub fn is_initialized(self) -> bool {
        self != BackendMode::Uninitialized
    }
}
