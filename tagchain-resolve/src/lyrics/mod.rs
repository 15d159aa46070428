//! Lyrics fallback resolution
//!
//! Providers are tried in priority order and the first one yielding
//! non-empty text after cleanup wins. Provider failures never surface to
//! the caller: a failing provider is skipped. A "no lyrics" outcome is
//! cached only when every provider answered cleanly, so a transient outage
//! does not pin a negative result.

pub mod cleanup;
pub mod lrclib;
pub mod lyrics_ovh;
pub mod musixmatch;

pub use cleanup::{fuzzy_matches, LyricsCleaner, DEFAULT_BOILERPLATE_PATTERNS};
pub use lrclib::{LrclibExact, LrclibSearch};
pub use lyrics_ovh::LyricsOvh;
pub use musixmatch::Musixmatch;

use crate::cache::{Cache, LyricsKey, Lookup};
use crate::error::ResolveResult;
use crate::types::{LyricsResult, LyricsSource};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Raw lyrics as returned by one provider, before cleanup
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProviderLyrics {
    pub text: String,
    /// Artist the provider says it matched
    pub artist: Option<String>,
    /// Title the provider says it matched
    pub title: Option<String>,
    /// Provider flags the track as instrumental
    pub instrumental: bool,
}

/// One step of the fallback chain
#[async_trait]
pub trait LyricsProvider: Send + Sync {
    fn source(&self) -> LyricsSource;

    /// Errors from optional providers are swallowed and do not count as a
    /// failed lookup
    fn is_optional(&self) -> bool {
        false
    }

    /// `Ok(None)` when the provider has nothing for this track
    async fn lookup(&self, artist: &str, title: &str) -> ResolveResult<Option<ProviderLyrics>>;
}

/// Ordered provider chain with cache
pub struct LyricsResolver {
    providers: Vec<Arc<dyn LyricsProvider>>,
    cleaner: LyricsCleaner,
    cache: Arc<dyn Cache<LyricsKey, LyricsResult>>,
}

impl LyricsResolver {
    pub fn new(
        providers: Vec<Arc<dyn LyricsProvider>>,
        cleaner: LyricsCleaner,
        cache: Arc<dyn Cache<LyricsKey, LyricsResult>>,
    ) -> Self {
        Self {
            providers,
            cleaner,
            cache,
        }
    }

    /// Provider order
    pub fn sources(&self) -> Vec<LyricsSource> {
        self.providers.iter().map(|p| p.source()).collect()
    }

    /// Cleaned lyrics for `artist` / `title`, or `None` when no provider has them
    pub async fn fetch_lyrics(&self, artist: &str, title: &str) -> Option<LyricsResult> {
        if artist.trim().is_empty() || title.trim().is_empty() {
            debug!("Lyrics lookup skipped: empty artist or title");
            return None;
        }

        let key = LyricsKey::new(artist, title);
        match self.cache.get(&key).await {
            Ok(Lookup::Hit(result)) => {
                debug!(key = key.as_str(), source = %result.source, "Lyrics cache hit");
                return Some(result);
            }
            Ok(Lookup::HitAbsent) => {
                debug!(key = key.as_str(), "Lyrics cached as not found");
                return None;
            }
            Ok(Lookup::Miss) => {}
            Err(e) => warn!(key = key.as_str(), error = %e, "Lyrics cache read failed"),
        }

        let mut provider_failed = false;

        for provider in &self.providers {
            let source = provider.source();
            let hit = match provider.lookup(artist, title).await {
                Ok(Some(hit)) => hit,
                Ok(None) => {
                    debug!(source = %source, "No lyrics from provider");
                    continue;
                }
                Err(e) if provider.is_optional() => {
                    debug!(source = %source, error = %e, "Optional lyrics provider failed");
                    continue;
                }
                Err(e) => {
                    warn!(source = %source, error = %e, "Lyrics provider failed, trying next");
                    provider_failed = true;
                    continue;
                }
            };

            if hit.instrumental {
                debug!(source = %source, "Provider reports instrumental track");
                continue;
            }

            let text = self.cleaner.clean(&hit.text);
            if text.is_empty() || cleanup::is_instrumental_text(&text) {
                debug!(source = %source, "Provider returned no usable text");
                continue;
            }

            let validated = match (hit.artist.as_deref(), hit.title.as_deref()) {
                (Some(a), Some(t)) => fuzzy_matches(artist, a) && fuzzy_matches(title, t),
                _ => false,
            };
            if !validated {
                debug!(
                    source = %source,
                    reported_artist = hit.artist.as_deref().unwrap_or(""),
                    reported_title = hit.title.as_deref().unwrap_or(""),
                    "Lyrics accepted without artist/title confirmation"
                );
            }

            let result = LyricsResult {
                text,
                source,
                validated,
            };
            info!(artist, title, source = %source, validated, "Lyrics resolved");
            self.store(&key, Some(result.clone())).await;
            return Some(result);
        }

        if provider_failed {
            info!(artist, title, "No lyrics found; not caching because a provider failed");
        } else {
            info!(artist, title, "No lyrics found");
            self.store(&key, None).await;
        }
        None
    }

    async fn store(&self, key: &LyricsKey, value: Option<LyricsResult>) {
        if let Err(e) = self.cache.set(key, value).await {
            warn!(key = key.as_str(), error = %e, "Lyrics cache write failed");
        }
    }
}
