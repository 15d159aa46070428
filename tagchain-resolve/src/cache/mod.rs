//! Storage-agnostic cache contract
//!
//! Stages depend only on [`Cache`]. Two implementations exist:
//! [`MemoryCache`] (session lifetime) and the SQLite-backed
//! [`PersistentCache`] / [`PersistentFileCache`] (cross-session).
//!
//! Lookups are three-valued so that "looked up, confirmed absent" can be
//! stored and told apart from "never looked up".

pub mod memory;
pub mod persistent;
pub mod store;

pub use memory::MemoryCache;
pub use persistent::{PersistentCache, PersistentFileCache};
pub use store::{CacheStore, SCHEMA_VERSION};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Cache storage errors
#[derive(Debug, Error)]
pub enum CacheError {
    /// Store or identity failure
    #[error(transparent)]
    Store(#[from] tagchain_common::Error),

    /// Stored value could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Key could not be normalized
    #[error("Invalid cache key: {0}")]
    Key(String),
}

impl From<sqlx::Error> for CacheError {
    fn from(err: sqlx::Error) -> Self {
        CacheError::Store(tagchain_common::Error::Database(err))
    }
}

/// Three-valued lookup result
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<V> {
    /// Cached value
    Hit(V),
    /// Cached explicit absence
    HitAbsent,
    /// Never stored
    Miss,
}

impl<V> Lookup<V> {
    pub fn is_miss(&self) -> bool {
        matches!(self, Lookup::Miss)
    }
}

/// Canonical string form of a cache key
pub trait CacheKey: Sync {
    fn cache_key(&self) -> Result<String, CacheError>;
}

/// Recording ids and other opaque identifiers
impl CacheKey for str {
    fn cache_key(&self) -> Result<String, CacheError> {
        let key = self.trim();
        if key.is_empty() {
            return Err(CacheError::Key("empty key".to_string()));
        }
        Ok(key.to_string())
    }
}

/// File paths resolve to absolute form
impl CacheKey for Path {
    fn cache_key(&self) -> Result<String, CacheError> {
        let absolute = std::path::absolute(self)
            .map_err(|e| CacheError::Key(format!("{}: {}", self.display(), e)))?;
        Ok(absolute.to_string_lossy().into_owned())
    }
}

/// Two-part `artist|title` key, lower-cased and trimmed.
///
/// `\` and `|` inside either part are backslash-escaped, so the separator
/// only ever appears between the parts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LyricsKey(String);

impl LyricsKey {
    pub const SEPARATOR: char = '|';

    pub fn new(artist: &str, title: &str) -> Self {
        Self(format!(
            "{}{}{}",
            Self::normalize(artist),
            Self::SEPARATOR,
            Self::normalize(title)
        ))
    }

    fn normalize(part: &str) -> String {
        let mut out = String::with_capacity(part.len());
        for c in part.trim().to_lowercase().chars() {
            if c == '\\' || c == Self::SEPARATOR {
                out.push('\\');
            }
            out.push(c);
        }
        out
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl CacheKey for LyricsKey {
    fn cache_key(&self) -> Result<String, CacheError> {
        Ok(self.0.clone())
    }
}

/// Generic key → value cache
///
/// `set(key, None)` stores an explicit absence.
#[async_trait]
pub trait Cache<K: ?Sized + Sync + 'static, V: Send + Sync + 'static>: Send + Sync {
    async fn get(&self, key: &K) -> Result<Lookup<V>, CacheError>;

    async fn set(&self, key: &K, value: Option<V>) -> Result<(), CacheError>;

    /// Returns whether an entry was removed
    async fn delete(&self, key: &K) -> Result<bool, CacheError>;

    async fn clear(&self) -> Result<(), CacheError>;

    async fn size(&self) -> Result<usize, CacheError>;

    /// True for a value or a cached absence
    async fn has(&self, key: &K) -> Result<bool, CacheError> {
        Ok(!self.get(key).await?.is_miss())
    }

    fn is_persistent(&self) -> bool {
        false
    }
}

/// Logical cache namespace (one table in the persistent store)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    Fingerprint,
    Metadata,
    Lyrics,
}

impl Namespace {
    pub const ALL: [Namespace; 3] = [Namespace::Fingerprint, Namespace::Metadata, Namespace::Lyrics];

    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Fingerprint => "fingerprint",
            Namespace::Metadata => "metadata",
            Namespace::Lyrics => "lyrics",
        }
    }

    /// Backing table in the persistent store
    pub(crate) fn table(&self) -> &'static str {
        match self {
            Namespace::Fingerprint => "fingerprint_cache",
            Namespace::Metadata => "metadata_cache",
            Namespace::Lyrics => "lyrics_cache",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Namespace {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fingerprint" | "fingerprints" | "acoustid" => Ok(Namespace::Fingerprint),
            "metadata" | "musicbrainz" => Ok(Namespace::Metadata),
            "lyrics" => Ok(Namespace::Lyrics),
            other => Err(format!(
                "unknown cache namespace '{}' (expected fingerprint, metadata or lyrics)",
                other
            )),
        }
    }
}

/// Cache statistics across namespaces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub counts: BTreeMap<Namespace, usize>,
    pub total_entries: usize,
    /// On-disk size of the store; 0 for session caches
    pub size_bytes: u64,
    pub is_persistent: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lyrics_key_normalization() {
        let a = LyricsKey::new("  Queen ", "Bohemian Rhapsody  ");
        let b = LyricsKey::new("queen", "BOHEMIAN RHAPSODY");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "queen|bohemian rhapsody");
    }

    #[test]
    fn test_lyrics_key_separator_in_names_is_escaped() {
        let a = LyricsKey::new("AC|DC", "Thunder");
        let b = LyricsKey::new("AC", "DC|Thunder");
        assert_ne!(a, b);
        assert_eq!(a.as_str(), "ac\\|dc|thunder");
        assert_ne!(LyricsKey::new("a\\", "b"), LyricsKey::new("a", "\\b"));
    }

    #[test]
    fn test_path_key_is_absolute() {
        let key = Path::new("music/track.flac").cache_key().unwrap();
        assert!(Path::new(&key).is_absolute());
        assert!(key.ends_with("track.flac"));
    }

    #[test]
    fn test_empty_str_key_rejected() {
        assert!(matches!("   ".cache_key(), Err(CacheError::Key(_))));
        assert_eq!(" mbid-1 ".cache_key().unwrap(), "mbid-1");
    }

    #[test]
    fn test_namespace_parse() {
        assert_eq!("Lyrics".parse::<Namespace>().unwrap(), Namespace::Lyrics);
        assert_eq!("acoustid".parse::<Namespace>().unwrap(), Namespace::Fingerprint);
        assert!("covers".parse::<Namespace>().is_err());
    }

    #[test]
    fn test_stats_serialize_namespace_keys() {
        let mut counts = BTreeMap::new();
        counts.insert(Namespace::Metadata, 2);
        let stats = CacheStats {
            counts,
            total_entries: 2,
            size_bytes: 0,
            is_persistent: false,
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["counts"]["metadata"], 2);
    }
}
