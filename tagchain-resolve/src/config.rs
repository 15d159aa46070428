//! Resolver configuration
//!
//! Built from the bootstrap [`TomlConfig`] with priority
//! environment → TOML → built-in defaults. Secrets and the cache path may
//! come from the environment; tuning knobs only from the `[resolver]` table.

use crate::http::DEFAULT_TIMEOUT;
use crate::lyrics::cleanup::DEFAULT_BOILERPLATE_PATTERNS;
use crate::retry::RetryPolicy;
use std::path::PathBuf;
use std::time::Duration;
use tagchain_common::config::TomlConfig;
use tracing::{info, warn};

pub const ACOUSTID_KEY_ENV: &str = "TAGCHAIN_ACOUSTID_API_KEY";
pub const MUSIXMATCH_TOKEN_ENV: &str = "TAGCHAIN_MUSIXMATCH_TOKEN";
pub const CACHE_PATH_ENV: &str = "TAGCHAIN_CACHE_PATH";

/// Base URLs of the upstream services
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoints {
    /// Full lookup URL
    pub acoustid: String,
    pub musicbrainz: String,
    pub lrclib: String,
    pub lyrics_ovh: String,
    pub musixmatch: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            acoustid: "https://api.acoustid.org/v2/lookup".to_string(),
            musicbrainz: "https://musicbrainz.org/ws/2".to_string(),
            lrclib: "https://lrclib.net".to_string(),
            lyrics_ovh: "https://api.lyrics.ovh".to_string(),
            musixmatch: "https://api.musixmatch.com/ws/1.1".to_string(),
        }
    }
}

impl Endpoints {
    /// Point every service at one base URL (local mock servers)
    pub fn all_at(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            acoustid: format!("{}/v2/lookup", base),
            musicbrainz: format!("{}/ws/2", base),
            lrclib: base.to_string(),
            lyrics_ovh: base.to_string(),
            musixmatch: format!("{}/ws/1.1", base),
        }
    }
}

/// Fully resolved resolver settings
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub acoustid_api_key: Option<String>,
    /// Enables the Musixmatch provider
    pub musixmatch_token: Option<String>,
    /// Persistent store location; `None` keeps caches in memory for this run
    pub cache_path: Option<PathBuf>,
    pub acoustid_interval: Duration,
    pub musicbrainz_interval: Duration,
    /// Per lyrics provider
    pub lyrics_interval: Duration,
    pub retry: RetryPolicy,
    /// Identification candidates scoring below this are dropped
    pub min_score: f64,
    pub min_genre_votes: u32,
    pub fingerprint_timeout: Duration,
    pub fpcalc_path: PathBuf,
    /// Case-insensitive regexes matched against each trimmed lyrics line
    pub boilerplate_patterns: Vec<String>,
    pub user_agent: String,
    pub http_timeout: Duration,
    pub endpoints: Endpoints,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            acoustid_api_key: None,
            musixmatch_token: None,
            cache_path: None,
            acoustid_interval: Duration::from_millis(334),
            musicbrainz_interval: Duration::from_millis(1000),
            lyrics_interval: Duration::from_millis(200),
            retry: RetryPolicy::default(),
            min_score: 0.5,
            min_genre_votes: 1,
            fingerprint_timeout: Duration::from_secs(120),
            fpcalc_path: PathBuf::from("fpcalc"),
            boilerplate_patterns: DEFAULT_BOILERPLATE_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            user_agent: tagchain_common::config::get_user_agent(),
            http_timeout: DEFAULT_TIMEOUT,
            endpoints: Endpoints::default(),
        }
    }
}

impl ResolverConfig {
    /// Resolve settings from the environment and a loaded TOML file
    pub fn from_toml(toml: &TomlConfig) -> Self {
        let defaults = Self::default();
        let r = &toml.resolver;

        let acoustid_api_key = resolve_secret(
            "AcoustID API key",
            ACOUSTID_KEY_ENV,
            toml.acoustid_api_key.as_deref(),
        );
        let musixmatch_token = resolve_secret(
            "Musixmatch token",
            MUSIXMATCH_TOKEN_ENV,
            toml.musixmatch_token.as_deref(),
        );

        let cache_path = std::env::var(CACHE_PATH_ENV)
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
            .or_else(|| toml.cache_path.clone());

        let ms = |value: Option<u64>, default: Duration| {
            value.map(Duration::from_millis).unwrap_or(default)
        };

        Self {
            acoustid_api_key,
            musixmatch_token,
            cache_path,
            acoustid_interval: ms(r.acoustid_interval_ms, defaults.acoustid_interval),
            musicbrainz_interval: ms(r.musicbrainz_interval_ms, defaults.musicbrainz_interval),
            lyrics_interval: ms(r.lyrics_interval_ms, defaults.lyrics_interval),
            retry: RetryPolicy::new(
                r.max_retries.unwrap_or(defaults.retry.max_retries),
                ms(r.base_delay_ms, defaults.retry.base_delay),
            ),
            min_score: r.min_score.unwrap_or(defaults.min_score),
            min_genre_votes: r.min_genre_votes.unwrap_or(defaults.min_genre_votes),
            fingerprint_timeout: r
                .fingerprint_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.fingerprint_timeout),
            fpcalc_path: r.fpcalc_path.clone().unwrap_or(defaults.fpcalc_path),
            boilerplate_patterns: r
                .boilerplate_patterns
                .clone()
                .unwrap_or(defaults.boilerplate_patterns),
            ..defaults
        }
    }
}

/// Environment → TOML resolution for one secret
fn resolve_secret(label: &str, env_var: &str, toml_value: Option<&str>) -> Option<String> {
    let env_value = std::env::var(env_var).ok().filter(|v| is_valid_key(v));
    let toml_value = toml_value.filter(|v| is_valid_key(v));

    if env_value.is_some() && toml_value.is_some() {
        warn!(
            "{} found in multiple sources: environment, TOML. Using environment (highest priority).",
            label
        );
    }

    if let Some(value) = env_value {
        info!("{} loaded from environment variable", label);
        return Some(value.trim().to_string());
    }
    if let Some(value) = toml_value {
        info!("{} loaded from TOML config", label);
        return Some(value.trim().to_string());
    }
    None
}

/// Non-empty, non-whitespace
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
