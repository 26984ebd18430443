//! Configuration loading for shelf-sync.
//!
//! Configuration is loaded from a TOML file: `--config <path>` if given,
//! otherwise `shelf.toml` in the per-user config directory if it exists,
//! otherwise built-in defaults.

use serde::{Deserialize, Serialize};
use shelf_client::CoordinatorConfig;
use shelf_core::TriggerPolicy;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name looked up in the per-user config directory.
const CONFIG_FILE: &str = "shelf.toml";

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Sync trigger configuration.
    #[serde(default)]
    pub sync: SyncSection,
    /// Connectivity configuration.
    #[serde(default)]
    pub connectivity: ConnectivitySection,
    /// In-memory services used by `run`.
    #[serde(default)]
    pub mock: MockSection,
}

/// Sync trigger configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSection {
    /// Also sync when a login completes while online (default: false).
    #[serde(default)]
    pub sync_on_login: bool,
    /// Upper bound for one sync call in seconds (default: 60).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Connectivity configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectivitySection {
    /// Reachability at process start (default: true).
    #[serde(default = "default_true")]
    pub initially_connected: bool,
}

/// In-memory identity and sync services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockSection {
    /// Email of the seeded account.
    #[serde(default = "default_email")]
    pub email: String,
    /// Password of the seeded account.
    #[serde(default = "default_password")]
    pub password: String,
    /// Display name of the seeded account.
    #[serde(default = "default_name")]
    pub name: String,
    /// Start with the seeded account already signed in (default: true).
    #[serde(default = "default_true")]
    pub restore_session: bool,
    /// Items reported by each successful sync (default: 12).
    #[serde(default = "default_synced_items")]
    pub synced_items: u64,
    /// Number of initial syncs that report a failure (default: 0).
    #[serde(default)]
    pub failing_syncs: u32,
}

// Default value functions
fn default_timeout_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

fn default_email() -> String {
    "reader@example.com".to_string()
}

fn default_password() -> String {
    "bookworm".to_string()
}

fn default_name() -> String {
    "Reader".to_string()
}

fn default_synced_items() -> u64 {
    12
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            sync_on_login: false,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for ConnectivitySection {
    fn default() -> Self {
        Self {
            initially_connected: default_true(),
        }
    }
}

impl Default for MockSection {
    fn default() -> Self {
        Self {
            email: default_email(),
            password: default_password(),
            name: default_name(),
            restore_session: default_true(),
            synced_items: default_synced_items(),
            failing_syncs: 0,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `explicit`, else the per-user config file, else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match default_config_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Reject values the coordinator cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sync.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "sync.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.mock.email.trim().is_empty() {
            return Err(ConfigError::Invalid("mock.email must not be empty".to_string()));
        }
        Ok(())
    }

    /// Coordinator settings derived from this configuration.
    pub fn coordinator(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            policy: TriggerPolicy {
                sync_on_login: self.sync.sync_on_login,
            },
            sync_timeout: Duration::from_secs(self.sync.timeout_secs),
        }
    }
}

/// Per-user config file location.
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("io", "shelf", "shelf-sync")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// A value is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}
