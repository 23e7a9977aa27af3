//! Engine configuration
//!
//! TOML-parseable settings for the identity engine. The shell loads one
//! of these at startup and hands it to the engine; every field except
//! the API base URL has a sensible default.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Engine configuration loaded from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Base URL of the REST backend, without a trailing slash.
    pub api_base_url: String,

    /// Development environment flag. Gates the billing bypass so local
    /// builds work without a payment backend. Defaults to the build
    /// profile: debug builds are development, release builds are not.
    #[serde(default = "default_development")]
    pub development: bool,

    /// Emails exempt from billing checks, compared case-insensitively.
    #[serde(default)]
    pub vip_emails: Vec<String>,

    /// Notification poll cadence in seconds.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Per-request timeout for backend calls in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_development() -> bool {
    cfg!(debug_assertions)
}

fn default_poll_interval_secs() -> u64 {
    12
}

fn default_request_timeout_secs() -> u64 {
    20
}

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
}

impl EngineConfig {
    /// Configuration with defaults for everything but the base URL.
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            development: default_development(),
            vip_emails: Vec::new(),
            poll_interval_secs: default_poll_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }

    /// Load a configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse a configuration directly from TOML content (for testing)
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}
