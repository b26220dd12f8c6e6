//! Bootstrap configuration
//!
//! Settings come from a TOML file. Resolution priority for the file itself:
//! 1. Command-line argument (highest priority)
//! 2. `STTP_CONFIG` environment variable
//! 3. `<config dir>/sttp/sttp.toml` (e.g. `~/.config/sttp/sttp.toml`)
//!
//! A missing file is not fatal: a warning is logged and compiled defaults are
//! used. A file that exists but does not parse is a configuration error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "STTP_CONFIG";

/// Environment variable holding the remote API bearer token
pub const TOKEN_ENV_VAR: &str = "STTP_API_TOKEN";

/// What to do when an artifact is submitted whose file name already has a delivered job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Always submit; every invocation creates a new job record
    #[default]
    Allow,
    /// Skip artifacts that already have a delivered job record
    Reject,
}

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Base URL of the remote transcription service (without trailing `/jobs`)
    #[serde(default = "default_api")]
    pub api: String,

    /// API bearer token; the `STTP_API_TOKEN` environment variable takes precedence
    #[serde(default)]
    pub token: Option<String>,

    /// Model / language selector sent with each submission
    #[serde(default = "default_model")]
    pub model: String,

    /// Technology tag written on canonical transcripts
    #[serde(default = "default_technology")]
    pub technology: String,

    /// Directory holding the audio artifacts to submit and audit
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,

    /// Media extension (without dot) that marks an artifact
    #[serde(default = "default_media_extension")]
    pub media_extension: String,

    /// SQLite file holding job records
    #[serde(default = "default_database")]
    pub database: PathBuf,

    /// SQLite file holding canonical transcripts (defaults to `database`)
    #[serde(default)]
    pub transcripts_database: Option<PathBuf>,

    /// Pause after each transcript fetch
    #[serde(default = "default_download_interval_ms")]
    pub download_interval_ms: u64,

    /// Per-request HTTP timeout
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Per-process request quota towards the remote service
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,

    /// Resubmission policy
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,

    /// Additional vocabulary sent with each submission
    #[serde(default)]
    pub additional_vocab: Vec<String>,

    /// Optional job priority sent with each submission
    #[serde(default)]
    pub priority: Option<String>,

    /// Interval between cycles in `run` mode
    #[serde(default = "default_cycle_interval_secs")]
    pub cycle_interval_secs: u64,

    /// Listen address of the status API in `run` mode
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Upper bound on lock-retry backoff for store writes
    #[serde(default = "default_max_lock_wait_ms")]
    pub max_lock_wait_ms: u64,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_api() -> String {
    "http://localhost:8080/api/v1".to_string()
}

fn default_model() -> String {
    "de".to_string()
}

fn default_technology() -> String {
    "recapp".to_string()
}

fn default_source_dir() -> PathBuf {
    PathBuf::from("./audio")
}

fn default_media_extension() -> String {
    "wav".to_string()
}

fn default_database() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("sttp").join("sttp.db"))
        .unwrap_or_else(|| PathBuf::from("./sttp_data/sttp.db"))
}

fn default_download_interval_ms() -> u64 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_requests_per_second() -> u32 {
    5
}

fn default_cycle_interval_secs() -> u64 {
    300
}

fn default_listen() -> String {
    "127.0.0.1:5780".to_string()
}

fn default_max_lock_wait_ms() -> u64 {
    5000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            api: default_api(),
            token: None,
            model: default_model(),
            technology: default_technology(),
            source_dir: default_source_dir(),
            media_extension: default_media_extension(),
            database: default_database(),
            transcripts_database: None,
            download_interval_ms: default_download_interval_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            requests_per_second: default_requests_per_second(),
            duplicate_policy: DuplicatePolicy::default(),
            additional_vocab: Vec::new(),
            priority: None,
            cycle_interval_secs: default_cycle_interval_secs(),
            listen: default_listen(),
            max_lock_wait_ms: default_max_lock_wait_ms(),
            logging: LoggingConfig::default(),
        }
    }
}

impl TomlConfig {
    /// API token, environment first, then TOML
    pub fn api_token(&self) -> Option<String> {
        if let Ok(token) = std::env::var(TOKEN_ENV_VAR) {
            if !token.trim().is_empty() {
                return Some(token);
            }
        }
        self.token
            .as_ref()
            .filter(|t| !t.trim().is_empty())
            .cloned()
    }

    /// Database file for canonical transcripts
    pub fn transcripts_database_path(&self) -> &Path {
        self.transcripts_database.as_deref().unwrap_or(&self.database)
    }

    /// Reject values no run could work with
    pub fn validate(&self) -> Result<()> {
        if self.api.trim().is_empty() {
            return Err(Error::Config("api must not be empty".to_string()));
        }
        if self.requests_per_second == 0 {
            return Err(Error::Config(
                "requests_per_second must be greater than zero".to_string(),
            ));
        }
        if self.media_extension.trim().is_empty() || self.media_extension.starts_with('.') {
            return Err(Error::Config(format!(
                "media_extension must be a bare extension like \"wav\", got {:?}",
                self.media_extension
            )));
        }
        if self.cycle_interval_secs == 0 {
            return Err(Error::Config(
                "cycle_interval_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Locate the config file following the documented priority order
///
/// Returns `None` when no candidate exists.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    dirs::config_dir()
        .map(|d| d.join("sttp").join("sttp.toml"))
        .filter(|p| p.exists())
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Load the resolved config file, or fall back to defaults if there is none
pub fn load_config(cli_arg: Option<&Path>) -> Result<TomlConfig> {
    let config = match resolve_config_path(cli_arg) {
        Some(path) if path.exists() => {
            info!("Loading configuration from {}", path.display());
            load_toml_config(&path)?
        }
        Some(path) => {
            warn!(
                "Config file {} not found, using built-in defaults",
                path.display()
            );
            TomlConfig::default()
        }
        None => {
            warn!("No config file found, using built-in defaults");
            TomlConfig::default()
        }
    };

    config.validate()?;
    Ok(config)
}
