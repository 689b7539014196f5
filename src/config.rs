use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

const APP_NAME: &str = "qatron-board";
const CONFIG_FILE: &str = "config.json";

/// Default control-plane API, matching a local docker-compose deployment.
pub const DEFAULT_API_URL: &str = "http://localhost:8000/api/v1";

/// Environment variable overriding the API base URL.
pub const API_URL_ENV: &str = "QATRON_API_URL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    /// Versioned base path of the control-plane API.
    pub api_url: String,
    /// Location of the local storage database. Platform data dir when unset.
    pub storage_path: Option<PathBuf>,
    /// How many times a failed read is retried. Mutations are never retried.
    pub read_retries: u32,
    /// Delay between read attempts, in milliseconds.
    pub retry_delay_ms: u64,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            storage_path: None,
            read_retries: 1,
            retry_delay_ms: 300,
        }
    }
}

impl BoardConfig {
    /// Load configuration from the user's config directory, then apply
    /// environment overrides. Returns defaults if the file doesn't exist or
    /// fails to parse.
    pub fn load() -> Self {
        let config = match Self::try_load() {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config, using defaults: {:#}", e);
                Self::default()
            }
        };
        config.with_env_overrides(std::env::var(API_URL_ENV).ok())
    }

    fn try_load() -> Result<Self> {
        let config_path = get_config_path()?;
        if !config_path.exists() {
            return Ok(Self::default());
        }
        Self::read_from(&config_path)
    }

    pub fn read_from(path: &std::path::Path) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Self = serde_json::from_str(&content).context("Failed to parse config file")?;
        Ok(config.normalized())
    }

    /// Apply an API URL coming from the environment.
    pub fn with_env_overrides(self, api_url: Option<String>) -> Self {
        match api_url.filter(|u| !u.trim().is_empty()) {
            Some(url) => self.with_api_url(url),
            None => self,
        }
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self.normalized()
    }

    fn normalized(mut self) -> Self {
        let trimmed = self.api_url.trim().trim_end_matches('/');
        self.api_url = if trimmed.is_empty() {
            DEFAULT_API_URL.to_string()
        } else {
            trimmed.to_string()
        };
        self
    }

    /// Save the current configuration to disk.
    pub fn save(&self) -> Result<PathBuf> {
        let config_path = get_config_path()?;
        self.write_to(&config_path)?;
        Ok(config_path)
    }

    pub fn write_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    pub fn retry_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.retry_delay_ms)
    }
}

pub fn get_config_path() -> Result<PathBuf> {
    let mut path =
        config_dir().ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
    path.push(APP_NAME);
    path.push(CONFIG_FILE);
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_override_wins_and_is_trimmed() {
        let config = BoardConfig::default()
            .with_env_overrides(Some("https://qa.example.com/api/v1/".to_string()));
        assert_eq!(config.api_url, "https://qa.example.com/api/v1");
    }

    #[test]
    fn test_blank_env_is_ignored() {
        let config = BoardConfig::default().with_env_overrides(Some("  ".to_string()));
        assert_eq!(config.api_url, DEFAULT_API_URL);
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);
        let config = BoardConfig {
            read_retries: 3,
            ..BoardConfig::default().with_api_url("http://board:9000/api/v1")
        };
        config.write_to(&path).unwrap();

        assert_eq!(BoardConfig::read_from(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, r#"{"api_url": "http://other/api/v1"}"#).unwrap();

        let config = BoardConfig::read_from(&path).unwrap();
        assert_eq!(config.api_url, "http://other/api/v1");
        assert_eq!(config.read_retries, 1);
    }
}
