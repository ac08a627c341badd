//! Configuration loaded from a TOML file
//!
//! Every key is optional; anything left out keeps its default or the value
//! supplied by the environment.
//!
//! ```toml
//! [backend]
//! url = "http://127.0.0.1:8000"
//! ws_url = "ws://127.0.0.1:8000/ws"
//!
//! [chat]
//! code_language = "python"
//! fence_detection = "presence"
//! welcome_message = "Welcome to AI Desktop Assistant"
//! download_url = "https://ollama.com/download"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::FenceDetection;

/// Root of the configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Backend endpoints
    #[serde(default)]
    pub backend: BackendSection,

    /// Chat behavior
    #[serde(default)]
    pub chat: ChatSection,
}

impl ConfigFile {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: ConfigFile = toml::from_str(content)?;
        Ok(config)
    }
}

/// Backend endpoints
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendSection {
    /// Base URL of the HTTP API
    #[serde(default)]
    pub url: Option<String>,

    /// Chat socket URL; derived from `url` when absent
    #[serde(default)]
    pub ws_url: Option<String>,
}

/// Chat behavior
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatSection {
    /// Language tag written into synthesized code fences
    #[serde(default)]
    pub code_language: Option<String>,

    /// How an open code fence is detected in streamed text
    #[serde(default)]
    pub fence_detection: Option<FenceDetection>,

    /// System notice shown when the backend sends no greeting
    #[serde(default)]
    pub welcome_message: Option<String>,

    /// Where users are sent to install the model runtime
    #[serde(default)]
    pub download_url: Option<String>,
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}
