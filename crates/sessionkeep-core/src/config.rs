//! Client configuration management.
//!
//! This module handles loading and saving the client configuration, which
//! names the identity service base URL and the keychain slot holding the
//! bearer token.
//!
//! Configuration is stored at `~/.config/sessionkeep/config.json`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Application name used for config/log directory paths
const APP_NAME: &str = "sessionkeep";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Default identity service base URL
const DEFAULT_BASE_URL: &str = "http://localhost:3000/api";

/// Default keychain service name
const DEFAULT_KEYRING_SERVICE: &str = "sessionkeep";

/// Fixed key the bearer token is stored under
const DEFAULT_TOKEN_KEY: &str = "token";

/// HTTP request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Environment variable overriding the base URL
pub const ENV_API_URL: &str = "SESSIONKEEP_API_URL";

/// Environment variable overriding the keychain service name
pub const ENV_KEYRING_SERVICE: &str = "SESSIONKEEP_KEYRING_SERVICE";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub keyring_service: String,
    pub token_key: String,
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            keyring_service: DEFAULT_KEYRING_SERVICE.to_string(),
            token_key: DEFAULT_TOKEN_KEY.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Config pointing at the given identity service, defaults elsewhere.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let mut config = Self {
            base_url: base_url.into(),
            ..Self::default()
        };
        config.normalize();
        config
    }

    /// Load from the user config directory, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Load from an explicit path. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            debug!(path = %path.display(), "No config file, using defaults");
            Self::default()
        };
        config.normalize();
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply overrides from a variable lookup (the process environment in `load`).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            self.base_url = url.trim().to_string();
        }
        if let Some(service) = lookup(ENV_KEYRING_SERVICE).filter(|v| !v.trim().is_empty()) {
            self.keyring_service = service.trim().to_string();
        }
        self.normalize();
    }

    fn normalize(&mut self) {
        while self.base_url.ends_with('/') {
            self.base_url.pop();
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn log_dir() -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.token_key, "token");
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::with_base_url("https://id.example.com/api/");
        config.request_timeout_secs = 5;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.base_url, "https://id.example.com/api");
        assert_eq!(loaded.request_timeout_secs, 5);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "token_key": "session" }"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.token_key, "session");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_overrides_ignore_blank_values() {
        let mut config = Config::default();
        config.apply_overrides(|name| match name {
            ENV_API_URL => Some("https://override.example.com//".to_string()),
            ENV_KEYRING_SERVICE => Some("   ".to_string()),
            _ => None,
        });
        assert_eq!(config.base_url, "https://override.example.com");
        assert_eq!(config.keyring_service, DEFAULT_KEYRING_SERVICE);
    }

    #[test]
    fn test_with_base_url_strips_trailing_slash() {
        let config = Config::with_base_url("https://id.example.com/api/");
        assert_eq!(config.base_url, "https://id.example.com/api");
    }
}
