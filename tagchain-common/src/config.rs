//! Bootstrap configuration loading
//!
//! Configuration is read from a single TOML file. Resolution order for the
//! file location:
//! 1. Explicit path (command-line argument)
//! 2. `TAGCHAIN_CONFIG` environment variable
//! 3. Platform config directory (`~/.config/tagchain/config.toml` on Linux)
//!
//! A missing file is not an error: every field has a default.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "TAGCHAIN_CONFIG";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TomlConfig {
    /// Path of the persistent cache database. When absent the resolver
    /// keeps a session-only in-memory cache.
    #[serde(default)]
    pub cache_path: Option<PathBuf>,

    /// AcoustID application key
    #[serde(default)]
    pub acoustid_api_key: Option<String>,

    /// Musixmatch access token (enables the tertiary lyrics provider)
    #[serde(default)]
    pub musixmatch_token: Option<String>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Resolver tuning; unset fields fall back to built-in defaults
    #[serde(default)]
    pub resolver: ResolverToml,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// `[resolver]` table
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ResolverToml {
    pub acoustid_interval_ms: Option<u64>,
    pub musicbrainz_interval_ms: Option<u64>,
    pub lyrics_interval_ms: Option<u64>,
    pub max_retries: Option<u32>,
    pub base_delay_ms: Option<u64>,
    pub min_score: Option<f64>,
    pub min_genre_votes: Option<u32>,
    pub fingerprint_timeout_secs: Option<u64>,
    pub fpcalc_path: Option<PathBuf>,
    /// Case-insensitive regular expressions; a line matching any of them is
    /// dropped from lyrics text. Replaces the built-in list when set.
    pub boilerplate_patterns: Option<Vec<String>>,
}

/// Platform default config file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tagchain").join("config.toml"))
}

/// Platform default persistent cache location
pub fn default_cache_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|d| d.join("tagchain").join("cache.db"))
}

/// Resolve which config file to read (may not exist)
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    default_config_path()
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;

    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Load configuration with graceful degradation.
///
/// A missing file yields defaults. A file that exists but cannot be parsed
/// is an error, since silently ignoring a typo would drop API keys.
pub fn load_config(cli_arg: Option<&Path>) -> Result<TomlConfig> {
    let Some(path) = resolve_config_path(cli_arg) else {
        warn!("Could not determine config directory, using defaults");
        return Ok(TomlConfig::default());
    };

    if !path.exists() {
        info!("No config file at {}, using defaults", path.display());
        return Ok(TomlConfig::default());
    }

    let config = load_toml_config(&path)?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// User-Agent sent to every upstream web service.
///
/// Always carries a contact URL; MusicBrainz requires one.
pub fn get_user_agent() -> String {
    format!(
        "tagchain/{} ( https://github.com/tagchain/tagchain )",
        env!("CARGO_PKG_VERSION")
    )
}
