//! Layered configuration.
//!
//! Priority, lowest to highest: defaults, `<config_dir>/config.json`,
//! `SESSIONDECK_*` environment variables, then whatever the caller (usually
//! CLI flags) sets on the loaded value.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::{BackendConfig, ModePreference};
use crate::remote::DEFAULT_REQUEST_TIMEOUT;
use crate::session::ManagerConfig;

pub const CONFIG_FILE: &str = "config.json";
pub const API_URL_ENV: &str = "SESSIONDECK_API_URL";
pub const MODE_ENV: &str = "SESSIONDECK_MODE";

const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8080";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid value for environment variable '{name}': {message}")]
    InvalidEnvVar { name: String, message: String },

    #[error("no configuration directory: {0}")]
    NoConfigDir(String),
}

/// Everything needed to assemble a [`crate::context::DeckContext`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeckConfig {
    pub api_base_url: String,
    pub request_timeout_ms: u64,
    pub mode: ModePreference,
    pub fallback_to_mock: bool,
    pub health_timeout_ms: u64,
    pub session_proxy_enabled: bool,
    pub simulated_in_production: bool,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub sync_interval_ms: u64,
    pub sync_page_limit: u32,
    pub cache_ttl_ms: u64,
    /// Keep sessions on disk under `<config_dir>/sessions`; in memory otherwise.
    pub persist: bool,
}

impl Default for DeckConfig {
    fn default() -> Self {
        let backend = BackendConfig::default();
        let manager = ManagerConfig::default();
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT.as_millis() as u64,
            mode: backend.preference,
            fallback_to_mock: backend.fallback_to_mock,
            health_timeout_ms: backend.health_timeout.as_millis() as u64,
            session_proxy_enabled: backend.session_proxy_enabled,
            simulated_in_production: backend.simulated_in_production,
            max_retries: manager.max_retries,
            retry_delay_ms: manager.retry_delay.as_millis() as u64,
            sync_interval_ms: manager.sync_interval.as_millis() as u64,
            sync_page_limit: manager.sync_page_limit,
            cache_ttl_ms: crate::cache::DEFAULT_TTL.as_millis() as u64,
            persist: true,
        }
    }
}

impl DeckConfig {
    /// Defaults, overlaid with `<config_dir>/config.json` and the environment.
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::from_dir(config_dir)?;
        config.apply_env()?;
        Ok(config)
    }

    /// Defaults overlaid with `<config_dir>/config.json` only. A missing file
    /// is not an error.
    pub fn from_dir(config_dir: &Path) -> Result<Self, ConfigError> {
        let path = config_dir.join(CONFIG_FILE);
        if !path.exists() {
            log::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::ReadFile {
            path: path.clone(),
            source,
        })?;
        let config =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_vars(|name| std::env::var(name).ok())
    }

    fn apply_vars(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(url) = lookup(API_URL_ENV).filter(|v| !v.is_empty()) {
            self.api_base_url = url;
        }
        if let Some(mode) = lookup(MODE_ENV).filter(|v| !v.is_empty()) {
            self.mode = mode
                .parse()
                .map_err(|message| ConfigError::InvalidEnvVar {
                    name: MODE_ENV.to_string(),
                    message,
                })?;
        }
        Ok(())
    }

    pub fn backend_config(&self) -> BackendConfig {
        BackendConfig {
            preference: self.mode,
            fallback_to_mock: self.fallback_to_mock,
            health_timeout: Duration::from_millis(self.health_timeout_ms),
            session_proxy_enabled: self.session_proxy_enabled,
            simulated_in_production: self.simulated_in_production,
        }
    }

    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            max_retries: self.max_retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            sync_interval: Duration::from_millis(self.sync_interval_ms),
            sync_page_limit: self.sync_page_limit,
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Resolve the configuration directory from the environment.
pub fn resolve_config_dir() -> Result<PathBuf, ConfigError> {
    crate::paths::default_config_dir().map_err(ConfigError::NoConfigDir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    mod defaults {
        use super::*;

        #[test]
        fn match_component_defaults() {
            let config = DeckConfig::default();

            assert_eq!(config.backend_config(), BackendConfig::default());
            assert_eq!(config.manager_config(), ManagerConfig::default());
            assert_eq!(config.cache_ttl(), Duration::from_secs(300));
            assert_eq!(config.request_timeout(), Duration::from_secs(30));
            assert!(config.persist);
        }
    }

    mod file {
        use super::*;

        #[test]
        fn missing_file_yields_defaults() {
            let dir = tempdir().unwrap();
            assert_eq!(DeckConfig::from_dir(dir.path()).unwrap(), DeckConfig::default());
        }

        #[test]
        fn partial_file_overrides_named_fields() {
            let dir = tempdir().unwrap();
            std::fs::write(
                dir.path().join(CONFIG_FILE),
                r#"{ "mode": "mock", "maxRetries": 5, "syncIntervalMs": 1000, "persist": false }"#,
            )
            .unwrap();

            let config = DeckConfig::from_dir(dir.path()).unwrap();

            assert_eq!(config.mode, ModePreference::Mock);
            assert_eq!(config.max_retries, 5);
            assert_eq!(config.manager_config().sync_interval, Duration::from_secs(1));
            assert!(!config.persist);
            assert!(config.fallback_to_mock);
        }

        #[test]
        fn malformed_file_is_an_error() {
            let dir = tempdir().unwrap();
            std::fs::write(dir.path().join(CONFIG_FILE), "{ not json").unwrap();

            let err = DeckConfig::from_dir(dir.path()).unwrap_err();
            assert!(matches!(err, ConfigError::Parse { .. }));
        }
    }

    mod env {
        use super::*;

        #[test]
        fn overrides_url_and_mode() {
            let mut config = DeckConfig::default();
            config
                .apply_vars(vars(&[
                    (API_URL_ENV, "https://deck.example.com"),
                    (MODE_ENV, "Production"),
                ]))
                .unwrap();

            assert_eq!(config.api_base_url, "https://deck.example.com");
            assert_eq!(config.mode, ModePreference::Production);
        }

        #[test]
        fn empty_values_are_ignored() {
            let mut config = DeckConfig::default();
            config
                .apply_vars(vars(&[(API_URL_ENV, ""), (MODE_ENV, "")]))
                .unwrap();
            assert_eq!(config, DeckConfig::default());
        }

        #[test]
        fn bad_mode_is_rejected() {
            let mut config = DeckConfig::default();
            let err = config
                .apply_vars(vars(&[(MODE_ENV, "sometimes")]))
                .unwrap_err();
            assert!(err.to_string().contains(MODE_ENV));
        }
    }
}
