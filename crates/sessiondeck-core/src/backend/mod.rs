//! Backend mode selection.
//!
//! Picks between the live backend and the built-in simulated one, and tells
//! the UI which features are usable under the current configuration.

mod features;
mod mode;
mod selector;

pub use features::{has_simulated_backend, is_feature_available, Feature, FeatureCategory};
pub use mode::{BackendMode, ModeEvent, ModePreference};
pub use selector::{BackendConfig, BackendSelector, DEFAULT_HEALTH_TIMEOUT};
