//! Configuration file parser for ~/.config/yle-news/config.toml.
//!
//! Optional. A missing or blank file yields `Config::default()`; keys other
//! than the three below are logged and skipped.
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::feed::FetchSettings;
use crate::topics::Topic;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// An extra `[[topics]]` entry.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TopicConfig {
    pub key: String,
    pub url: String,
}

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Total request timeout in seconds. 0 = HTTP client default.
    pub timeout_secs: u64,

    /// Maximum accepted feed body size in bytes.
    pub max_feed_bytes: u64,

    /// Topics appended after the built-in Yle feeds.
    pub topics: Vec<TopicConfig>,
}

impl Default for Config {
    fn default() -> Self {
        let fetch = FetchSettings::default();
        Self {
            timeout_secs: 0,
            max_feed_bytes: fetch.max_feed_bytes as u64,
            topics: Vec::new(),
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: usize = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.len() > Self::MAX_FILE_SIZE {
            return Err(ConfigError::TooLarge(format!(
                "{} bytes (max {})",
                content.len(),
                Self::MAX_FILE_SIZE
            )));
        }

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let table: toml::Table = content.parse()?;
        for key in table.keys() {
            if !matches!(key.as_str(), "timeout_secs" | "max_feed_bytes" | "topics") {
                tracing::warn!(key = %key, "Unknown key in config file, ignoring");
            }
        }

        let config: Config = toml::Value::Table(table).try_into()?;
        tracing::info!(
            path = %path.display(),
            extra_topics = config.topics.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            timeout: (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs)),
            max_feed_bytes: usize::try_from(self.max_feed_bytes).unwrap_or(usize::MAX),
        }
    }

    pub fn extra_topics(&self) -> Vec<Topic> {
        self.topics
            .iter()
            .map(|t| Topic::new(t.key.clone(), t.url.clone()))
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
