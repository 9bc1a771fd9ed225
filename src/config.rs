//! Weft Configuration Module
//!
//! Persistent defaults and API keys, stored in `~/.config/weft/config.toml`.
//!
//! ## Priority Order (highest to lowest)
//!
//! 1. Environment variables (`WEFT_PROVIDER`, `WEFT_MODEL`, `OPENAI_API_KEY`,
//!    `OPENAI_BASE_URL`)
//! 2. Config file (`~/.config/weft/config.toml`)
//! 3. Defaults
//!
//! Pipeline and task settings override all of these at run time.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::ast::GenerationSettings;
use crate::error::{Result, WeftError};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WeftConfig {
    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub api_keys: ApiKeys,

    #[serde(default)]
    pub openai: OpenAiSection,

    #[serde(default)]
    pub expansion: ExpansionSection,
}

/// Default generation settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Defaults {
    /// Default provider (mock, openai)
    pub provider: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ApiKeys {
    /// OpenAI (or compatible) API key
    pub openai: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OpenAiSection {
    /// Base URL of an OpenAI-compatible endpoint, e.g. `http://localhost:8080/v1`
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExpansionSection {
    /// Activation passes for keyword entries (an entries file may override)
    pub max_depth: Option<usize>,
}

impl WeftConfig {
    /// `~/.config/weft/` on Unix, `%APPDATA%/weft/` on Windows
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("weft")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load from the default path (defaults if the file doesn't exist)
    pub fn load() -> Result<Self> {
        Self::load_from(Self::config_path())
    }

    /// Load from `path`.
    ///
    /// Returns default config if the file doesn't exist, an error if it
    /// exists but is malformed.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| WeftError::ConfigError {
            reason: format!("Failed to read config file: {}", e),
        })?;

        toml::from_str(&content).map_err(|e| WeftError::ConfigError {
            reason: format!("Failed to parse config file: {}", e),
        })
    }

    /// Write to `path`, creating parent directories
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| WeftError::ConfigError {
                reason: format!("Failed to create config directory: {}", e),
            })?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| WeftError::ConfigError {
            reason: format!("Failed to serialize config: {}", e),
        })?;

        fs::write(path, content).map_err(|e| WeftError::ConfigError {
            reason: format!("Failed to write config file: {}", e),
        })
    }

    /// Merge process environment variables (non-empty values win)
    pub fn with_env(self) -> Self {
        self.with_env_from(|key| std::env::var(key).ok())
    }

    /// Merge variables from an arbitrary lookup
    pub fn with_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(provider) = get("WEFT_PROVIDER") {
            self.defaults.provider = Some(provider);
        }
        if let Some(model) = get("WEFT_MODEL") {
            self.defaults.model = Some(model);
        }
        if let Some(key) = get("OPENAI_API_KEY") {
            self.api_keys.openai = Some(key);
        }
        if let Some(url) = get("OPENAI_BASE_URL") {
            self.openai.base_url = Some(url);
        }
        self
    }

    pub fn openai_key(&self) -> Option<&str> {
        self.api_keys.openai.as_deref()
    }

    pub fn openai_base_url(&self) -> Option<&str> {
        self.openai.base_url.as_deref()
    }

    /// Default provider (or auto-detect from available keys)
    pub fn default_provider(&self) -> Option<&str> {
        self.defaults.provider.as_deref().or_else(|| {
            if self.api_keys.openai.is_some() {
                Some("openai")
            } else {
                None
            }
        })
    }

    /// Lowest-priority generation settings layer
    pub fn default_settings(&self) -> GenerationSettings {
        GenerationSettings {
            provider: self.default_provider().map(str::to_string),
            model: self.defaults.model.clone(),
            temperature: self.defaults.temperature,
            max_tokens: self.defaults.max_tokens,
        }
    }
}

/// Mask an API key for display
///
/// Shows first N chars + asterisks, e.g. "sk-proj***"
pub fn mask_api_key(key: &str, visible_chars: usize) -> String {
    if key.is_empty() {
        return String::new();
    }

    let visible: String = key.chars().take(visible_chars).collect();
    format!("{}***", visible)
}
