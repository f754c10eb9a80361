//! Client configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "neethi.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Backend API root, e.g. "http://localhost:8000/api"
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Directory holding the local storage file
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl SessionConfig {
    /// Full path of the local storage file
    pub fn storage_path(&self) -> PathBuf {
        self.data_dir.join(crate::session::STORAGE_FILE)
    }
}

// Defaults
fn default_base_url() -> String { "http://localhost:8000/api".to_string() }
fn default_timeout() -> u64 { 30 }
fn default_data_dir() -> PathBuf { PathBuf::from(".neethi") }

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl ClientConfig {
    /// Parse a configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load from `path`, falling back to defaults when the file is missing
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}
