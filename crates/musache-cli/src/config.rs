//! Configuration file support

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use musache_session::{PollConfig, SessionConfig};

/// Configuration for musache. Every key is optional; CLI flags win over the file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API root, e.g. `https://rag-musache.onrender.com/api/v1`
    pub base_url: Option<String>,
    /// Per-request timeout
    pub timeout_secs: Option<u64>,
    /// Status checks after an upload before giving up
    pub poll_max_attempts: Option<u32>,
    /// Pause between status checks
    pub poll_interval_ms: Option<u64>,
    /// Stop waiting after this many unreachable status checks in a row
    pub max_consecutive_poll_failures: Option<u32>,
    /// How many server-side history entries to show
    pub history_limit: Option<u32>,
    /// Background health check interval in interactive mode
    pub health_interval_secs: Option<u64>,
}

pub const DEFAULT_HISTORY_LIMIT: u32 = 20;

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("musache")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("MUSACHE_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from the default location
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load config from `path`. A missing or broken file yields the defaults.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Warning: Failed to parse config file: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Warning: Failed to read config file: {}", e);
                Self::default()
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let content = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, content)
    }

    /// Create a default config file if it doesn't exist
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }

        let default_config = Config {
            base_url: Some(musache_api::DEFAULT_BASE_URL.to_string()),
            timeout_secs: Some(musache_api::DEFAULT_TIMEOUT.as_secs()),
            poll_max_attempts: Some(20),
            poll_interval_ms: Some(3000),
            max_consecutive_poll_failures: None,
            history_limit: Some(DEFAULT_HISTORY_LIMIT),
            health_interval_secs: Some(30),
        };

        default_config.save_to(&path)?;
        Ok(path)
    }

    pub fn history_limit(&self) -> u32 {
        self.history_limit.unwrap_or(DEFAULT_HISTORY_LIMIT)
    }

    /// Session tuning with unset keys left at their defaults
    pub fn session_config(&self) -> SessionConfig {
        let defaults = SessionConfig::default();
        let poll = PollConfig {
            max_attempts: self.poll_max_attempts.unwrap_or(defaults.poll.max_attempts),
            interval: self
                .poll_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll.interval),
            max_consecutive_failures: self.max_consecutive_poll_failures,
        };
        SessionConfig {
            poll,
            health_interval: self
                .health_interval_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.health_interval),
        }
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# musache configuration file
# Place at ~/.config/musache/config.toml (Linux), ~/Library/Application Support/musache/config.toml (Mac)
# or %APPDATA%\musache\config.toml (Windows). MUSACHE_CONFIG_PATH overrides the location.

# API root of the document service
base_url = "https://rag-musache.onrender.com/api/v1"

# Per-request timeout in seconds
timeout_secs = 30

# How long to wait for a document to be processed:
# poll_max_attempts checks, poll_interval_ms apart
poll_max_attempts = 20
poll_interval_ms = 3000

# Give up early when the server cannot be reached this many times in a row
# (unset: keep trying until poll_max_attempts)
# max_consecutive_poll_failures = 5

# Entries shown by --history and /history
history_limit = 20

# Background connectivity check in interactive mode
health_interval_secs = 30
"#
}
