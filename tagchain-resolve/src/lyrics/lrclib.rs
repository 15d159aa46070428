//! LRCLIB (<https://lrclib.net>) lyrics provider
//!
//! Two chain steps share one client and rate budget: an exact
//! `/api/get` lookup and a fuzzy `/api/search` fallback.

use super::cleanup::{fuzzy_matches, is_instrumental_text, strip_timestamps};
use super::{LyricsProvider, ProviderLyrics};
use crate::error::ResolveResult;
use crate::http::ServiceClient;
use crate::types::LyricsSource;
use async_trait::async_trait;
use serde::Deserialize;

pub const SERVICE: &str = "LRCLIB";

/// One LRCLIB track record
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LrclibTrack {
    #[serde(default)]
    pub track_name: Option<String>,
    #[serde(default)]
    pub artist_name: Option<String>,
    #[serde(default)]
    pub instrumental: bool,
    #[serde(default)]
    pub plain_lyrics: Option<String>,
    #[serde(default)]
    pub synced_lyrics: Option<String>,
}

impl LrclibTrack {
    /// Plain lyrics, else synced lyrics without timestamps
    fn text(&self) -> Option<String> {
        let plain = self.plain_lyrics.as_deref().map(str::trim).unwrap_or("");
        if !plain.is_empty() {
            return Some(plain.to_string());
        }
        let synced = strip_timestamps(self.synced_lyrics.as_deref().unwrap_or(""));
        let synced = synced.trim();
        (!synced.is_empty()).then(|| synced.to_string())
    }

    fn is_usable(&self) -> bool {
        !self.instrumental && self.text().is_some_and(|t| !is_instrumental_text(&t))
    }

    fn into_lyrics(self) -> Option<ProviderLyrics> {
        let text = self.text()?;
        Some(ProviderLyrics {
            text,
            artist: self.artist_name,
            title: self.track_name,
            instrumental: self.instrumental,
        })
    }
}

/// Exact artist + title lookup
pub struct LrclibExact {
    client: ServiceClient,
    base_url: String,
}

impl LrclibExact {
    pub fn new(client: ServiceClient, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl LyricsProvider for LrclibExact {
    fn source(&self) -> LyricsSource {
        LyricsSource::Lrclib
    }

    async fn lookup(&self, artist: &str, title: &str) -> ResolveResult<Option<ProviderLyrics>> {
        let url = format!("{}/api/get", self.base_url.trim_end_matches('/'));
        let query = [("artist_name", artist), ("track_name", title)];

        match self.client.get_json::<LrclibTrack>(&url, &query).await {
            Ok(track) if track.instrumental => Ok(Some(ProviderLyrics {
                instrumental: true,
                ..Default::default()
            })),
            Ok(track) => Ok(track.into_lyrics()),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Free-text search, preferring a result whose artist and title match
pub struct LrclibSearch {
    client: ServiceClient,
    base_url: String,
}

impl LrclibSearch {
    pub fn new(client: ServiceClient, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl LyricsProvider for LrclibSearch {
    fn source(&self) -> LyricsSource {
        LyricsSource::LrclibSearch
    }

    async fn lookup(&self, artist: &str, title: &str) -> ResolveResult<Option<ProviderLyrics>> {
        let url = format!("{}/api/search", self.base_url.trim_end_matches('/'));
        let q = format!("{} {}", artist.trim(), title.trim());

        let results: Vec<LrclibTrack> = self.client.get_json(&url, &[("q", q.as_str())]).await?;
        Ok(pick_search_result(results, artist, title).and_then(LrclibTrack::into_lyrics))
    }
}

/// First usable result whose artist and title fuzzily match, else the first
/// usable result
pub fn pick_search_result(results: Vec<LrclibTrack>, artist: &str, title: &str) -> Option<LrclibTrack> {
    let mut usable = results.into_iter().filter(LrclibTrack::is_usable).peekable();
    let first = usable.peek().cloned();

    usable
        .find(|track| {
            track.artist_name.as_deref().is_some_and(|a| fuzzy_matches(artist, a))
                && track.track_name.as_deref().is_some_and(|t| fuzzy_matches(title, t))
        })
        .or(first)
}
