//! Feature gating.
//!
//! Availability depends only on configuration, never on the live mode, so the
//! UI can hide actions up front instead of failing when they're invoked.

use serde::{Deserialize, Serialize};

use super::mode::ModePreference;
use super::selector::BackendConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Feature {
    Status,
    Messages,
    Health,
    Webhooks,
    Bots,
    ApiKeys,
    CreateSession,
    ListSessions,
    DeleteSession,
    SendMessage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureCategory {
    /// Always available.
    Core,
    /// Served only by the simulated backend.
    Management,
    /// Routed through the session proxy.
    Session,
}

impl Feature {
    pub const ALL: [Feature; 10] = [
        Feature::Status,
        Feature::Messages,
        Feature::Health,
        Feature::Webhooks,
        Feature::Bots,
        Feature::ApiKeys,
        Feature::CreateSession,
        Feature::ListSessions,
        Feature::DeleteSession,
        Feature::SendMessage,
    ];

    pub fn category(self) -> FeatureCategory {
        match self {
            Feature::Status | Feature::Messages | Feature::Health => FeatureCategory::Core,
            Feature::Webhooks | Feature::Bots | Feature::ApiKeys => FeatureCategory::Management,
            Feature::CreateSession
            | Feature::ListSessions
            | Feature::DeleteSession
            | Feature::SendMessage => FeatureCategory::Session,
        }
    }
}

/// Whether a selector built from `config` carries a simulated backend.
pub fn has_simulated_backend(config: &BackendConfig) -> bool {
    match config.preference {
        ModePreference::Auto | ModePreference::Mock => true,
        ModePreference::Production => config.simulated_in_production,
    }
}

pub fn is_feature_available(config: &BackendConfig, feature: Feature) -> bool {
    match feature.category() {
        FeatureCategory::Core => true,
        FeatureCategory::Management => has_simulated_backend(config),
        FeatureCategory::Session => config.session_proxy_enabled,
    }
}
