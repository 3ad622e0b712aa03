//! Configuration file parser for ~/.config/feedsync/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are accepted by serde, though we log a warning for each one
//! since they are usually typos.
use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable that overrides `user_id` from the config file.
pub const USER_ID_ENV: &str = "FEEDSYNC_USER_ID";

/// Largest page the server will honour.
pub const MAX_PAGE_SIZE: u32 = 100;

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

    #[error("HOME environment variable not set")]
    NoHome,
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level client configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
///
/// The custom Debug impl masks `user_id`: the server trusts it as identity.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API root, e.g. `https://api.example.com/api/v1`.
    pub base_url: String,

    /// Identity sent as `X-User-ID`. `FEEDSYNC_USER_ID` takes precedence.
    pub user_id: Option<String>,

    /// Items requested per page (clamped to 1..=100).
    pub page_size: u32,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Maximum accepted response body size in bytes.
    pub max_response_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api/v1".to_string(),
            user_id: None,
            page_size: 20,
            request_timeout_secs: 30,
            max_response_bytes: 5 * 1024 * 1024,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("base_url", &self.base_url)
            .field("user_id", &self.user_id.as_ref().map(|_| "[REDACTED]"))
            .field("page_size", &self.page_size)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_response_bytes", &self.max_response_bytes)
            .finish()
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 5] = [
        "base_url",
        "user_id",
        "page_size",
        "request_timeout_secs",
        "max_response_bytes",
    ];

    /// Default location: `~/.config/feedsync/config.toml`.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let home = std::env::var("HOME").map_err(|_| ConfigError::NoHome)?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("feedsync")
            .join("config.toml"))
    }

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check file size before reading to avoid loading a huge file
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // File deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        Self::parse(&content)
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            tracing::debug!("Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let mut config: Config = toml::from_str(content)?;
        config.normalize();
        tracing::info!(base_url = %config.base_url, page_size = config.page_size, "Loaded configuration");
        Ok(config)
    }

    fn normalize(&mut self) {
        let clamped = self.page_size.clamp(1, MAX_PAGE_SIZE);
        if clamped != self.page_size {
            tracing::warn!(
                requested = self.page_size,
                used = clamped,
                "page_size out of range, clamping"
            );
            self.page_size = clamped;
        }
        if self.request_timeout_secs == 0 {
            tracing::warn!("request_timeout_secs = 0 is not allowed, using 30");
            self.request_timeout_secs = 30;
        }
        if let Some(id) = &self.user_id {
            if id.trim().is_empty() {
                self.user_id = None;
            }
        }
    }

    /// Identity to send, with the environment variable taking precedence.
    pub fn user_id(&self) -> Option<SecretString> {
        self.user_id_with_override(std::env::var(USER_ID_ENV).ok())
    }

    fn user_id_with_override(&self, env_value: Option<String>) -> Option<SecretString> {
        env_value
            .filter(|v| !v.trim().is_empty())
            .or_else(|| self.user_id.clone())
            .map(SecretString::from)
    }
}

// ============================================================================
// Tests
// ============================================================================
