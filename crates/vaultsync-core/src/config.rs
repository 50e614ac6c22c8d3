//! Configuration module for VaultSync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::VaultPath;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for VaultSync.
///
/// Every section is optional in the YAML file; missing sections take their
/// defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sync: SyncConfig,
    pub remote: RemoteConfig,
    pub config_files: ConfigFilesConfig,
    pub logging: LoggingConfig,
    pub state: StateConfig,
}

/// Synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Root directory of the local tree.
    pub local_root: PathBuf,
    /// Concurrency ceiling of the bounded batch executor.
    pub batch_size: usize,
    /// Seconds before a single remote call is treated as failed.
    pub remote_timeout_secs: u64,
    /// Pull once when `watch` starts and the remote is reachable.
    pub pull_on_startup: bool,
}

/// Remote store endpoints and vault scoping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL of the files API.
    pub api_base_url: String,
    /// Endpoint exchanging the stored refresh credential for an access token.
    pub token_url: String,
    /// Endpoint probed by the connectivity check.
    pub ping_url: String,
    /// Name of the vault; every remote object is tagged with it.
    pub vault_name: String,
}

/// Host-application configuration files that are synced alongside content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFilesConfig {
    /// Folder (relative to the local root) holding the configuration files.
    pub directory: String,
    /// Entries inside `directory` to sync. Empty means everything.
    pub whitelist: Vec<String>,
    /// Entries inside `directory` never synced; wins over the whitelist.
    pub blacklist: Vec<String>,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

/// Location of the persisted state document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    pub path: PathBuf,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Write the configuration as YAML, creating the parent directory.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_yaml::to_string(self)?)?;
        Ok(())
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/vaultsync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("vaultsync")
            .join("config.yaml")
    }

    /// Per-call timeout for remote requests.
    pub fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.sync.remote_timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            local_root: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("~"))
                .join("Vault"),
            batch_size: 10,
            remote_timeout_secs: 30,
            pull_on_startup: true,
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://www.googleapis.com".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            ping_url: "https://www.googleapis.com/generate_204".to_string(),
            vault_name: "Vault".to_string(),
        }
    }
}

impl Default for ConfigFilesConfig {
    fn default() -> Self {
        Self {
            directory: ".vault".to_string(),
            whitelist: vec![
                "app.json".to_string(),
                "appearance.json".to_string(),
                "hotkeys.json".to_string(),
                "plugins".to_string(),
                "themes".to_string(),
                "snippets".to_string(),
            ],
            blacklist: vec!["workspace.json".to_string(), "cache".to_string()],
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("~/.local/share"))
                .join("vaultsync")
                .join("state.json"),
        }
    }
}

// ---------------------------------------------------------------------------
// Config-file selection
// ---------------------------------------------------------------------------

impl ConfigFilesConfig {
    /// Returns true if `path` lies inside the configuration folder.
    pub fn contains(&self, path: &VaultPath) -> bool {
        self.relative(path).is_some() || path.as_str() == self.directory.trim_matches('/')
    }

    /// Returns true if `path` is a configuration file that should be synced.
    pub fn is_synced(&self, path: &VaultPath) -> bool {
        let Some(rest) = self.relative(path) else {
            return false;
        };
        if self.blacklist.iter().any(|entry| matches_entry(rest, entry)) {
            return false;
        }
        self.whitelist.is_empty() || self.whitelist.iter().any(|entry| matches_entry(rest, entry))
    }

    fn relative<'a>(&self, path: &'a VaultPath) -> Option<&'a str> {
        let dir = self.directory.trim_matches('/');
        if dir.is_empty() {
            return None;
        }
        path.as_str()
            .strip_prefix(dir)
            .and_then(|rest| rest.strip_prefix('/'))
    }
}

fn matches_entry(rest: &str, entry: &str) -> bool {
    let entry = entry.trim_matches('/');
    rest == entry
        || rest
            .strip_prefix(entry)
            .is_some_and(|tail| tail.starts_with('/'))
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.batch_size"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- sync ---
        if self.sync.batch_size == 0 {
            errors.push(ValidationError {
                field: "sync.batch_size".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.sync.remote_timeout_secs == 0 {
            errors.push(ValidationError {
                field: "sync.remote_timeout_secs".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.sync.local_root.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "sync.local_root".into(),
                message: "must not be empty".into(),
            });
        }

        // --- remote ---
        for (field, value) in [
            ("remote.api_base_url", &self.remote.api_base_url),
            ("remote.token_url", &self.remote.token_url),
            ("remote.ping_url", &self.remote.ping_url),
        ] {
            if !is_http_url(value) {
                errors.push(ValidationError {
                    field: field.into(),
                    message: format!("not an http(s) URL: '{value}'"),
                });
            }
        }
        if self.remote.vault_name.trim().is_empty() {
            errors.push(ValidationError {
                field: "remote.vault_name".into(),
                message: "must not be empty".into(),
            });
        } else if self.remote.vault_name.contains('\'') {
            errors.push(ValidationError {
                field: "remote.vault_name".into(),
                message: "must not contain quotes".into(),
            });
        }

        // --- config_files ---
        if VaultPath::new(self.config_files.directory.as_str()).is_err() {
            errors.push(ValidationError {
                field: "config_files.directory".into(),
                message: format!("invalid folder name: '{}'", self.config_files.directory),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid log level '{}'; expected one of: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

fn is_http_url(value: &str) -> bool {
    url::Url::parse(value)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host().is_some())
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for [`Config`], starting from defaults.
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Start from [`Config::default`].
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- sync ---

    pub fn local_root(mut self, root: PathBuf) -> Self {
        self.config.sync.local_root = root;
        self
    }

    pub fn batch_size(mut self, n: usize) -> Self {
        self.config.sync.batch_size = n;
        self
    }

    pub fn remote_timeout_secs(mut self, seconds: u64) -> Self {
        self.config.sync.remote_timeout_secs = seconds;
        self
    }

    pub fn pull_on_startup(mut self, enabled: bool) -> Self {
        self.config.sync.pull_on_startup = enabled;
        self
    }

    // --- remote ---

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.remote.api_base_url = url.into();
        self
    }

    pub fn token_url(mut self, url: impl Into<String>) -> Self {
        self.config.remote.token_url = url.into();
        self
    }

    pub fn ping_url(mut self, url: impl Into<String>) -> Self {
        self.config.remote.ping_url = url.into();
        self
    }

    pub fn vault_name(mut self, name: impl Into<String>) -> Self {
        self.config.remote.vault_name = name.into();
        self
    }

    // --- config_files ---

    pub fn config_directory(mut self, directory: impl Into<String>) -> Self {
        self.config.config_files.directory = directory.into();
        self
    }

    pub fn config_whitelist(mut self, entries: Vec<String>) -> Self {
        self.config.config_files.whitelist = entries;
        self
    }

    pub fn config_blacklist(mut self, entries: Vec<String>) -> Self {
        self.config.config_files.blacklist = entries;
        self
    }

    // --- logging / state ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn state_path(mut self, path: PathBuf) -> Self {
        self.config.state.path = path;
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
