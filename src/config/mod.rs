//! Application configuration
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! environment variables. Command-line flags are applied last by the binary.

pub mod file;

use std::env;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::FenceDetection;

pub use file::{ConfigError, ConfigFile};

pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_CODE_LANGUAGE: &str = "python";
pub const DEFAULT_WELCOME_MESSAGE: &str = "Welcome to AI Desktop Assistant";
pub const DEFAULT_DOWNLOAD_URL: &str = "https://ollama.com/download";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub backend_url: String,
    pub ws_url: Option<String>,
    pub code_language: String,
    pub fence_detection: FenceDetection,
    pub welcome_message: String,
    pub download_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.into(),
            ws_url: None,
            code_language: DEFAULT_CODE_LANGUAGE.into(),
            fence_detection: FenceDetection::default(),
            welcome_message: DEFAULT_WELCOME_MESSAGE.into(),
            download_url: DEFAULT_DOWNLOAD_URL.into(),
        }
    }
}

impl Config {
    /// Defaults overlaid by the optional file, then by the environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(path) = path {
            config.apply_file(ConfigFile::from_file(path)?);
        }
        config.apply_env(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    pub fn apply_file(&mut self, file: ConfigFile) {
        if let Some(url) = file.backend.url {
            self.backend_url = url;
        }
        if let Some(ws_url) = file.backend.ws_url {
            self.ws_url = Some(ws_url);
        }
        if let Some(language) = file.chat.code_language {
            self.code_language = language;
        }
        if let Some(detection) = file.chat.fence_detection {
            self.fence_detection = detection;
        }
        if let Some(message) = file.chat.welcome_message {
            self.welcome_message = message;
        }
        if let Some(url) = file.chat.download_url {
            self.download_url = url;
        }
    }

    /// Overlay `DESKCHAT_*` variables resolved through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DESKCHAT_BACKEND_URL") {
            self.backend_url = url;
        }
        if let Some(ws_url) = lookup("DESKCHAT_WS_URL") {
            self.ws_url = Some(ws_url);
        }
        if let Some(language) = lookup("DESKCHAT_CODE_LANGUAGE") {
            self.code_language = language;
        }
        if let Some(detection) = lookup("DESKCHAT_FENCE_DETECTION") {
            self.fence_detection = detection.parse().map_err(ConfigError::Validation)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.backend_url.starts_with("http://") || self.backend_url.starts_with("https://")) {
            return Err(ConfigError::Validation(format!(
                "backend url must be http(s): {}",
                self.backend_url
            )));
        }
        if self.code_language.contains(char::is_whitespace) {
            return Err(ConfigError::Validation(format!(
                "code language must be a single word: {:?}",
                self.code_language
            )));
        }
        Ok(())
    }

    /// Chat socket URL, derived from the backend URL when not set explicitly
    pub fn socket_url(&self) -> String {
        if let Some(ref url) = self.ws_url {
            return url.clone();
        }
        let base = self.backend_url.trim_end_matches('/');
        let base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            base.to_string()
        };
        format!("{}/ws", base)
    }
}
