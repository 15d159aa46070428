//! lyrics.ovh provider: `/suggest/{query}` then `/v1/{artist}/{title}`

use super::cleanup::fuzzy_matches;
use super::{LyricsProvider, ProviderLyrics};
use crate::error::ResolveResult;
use crate::http::ServiceClient;
use crate::types::LyricsSource;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

pub const SERVICE: &str = "lyrics.ovh";

#[derive(Debug, Clone, Deserialize)]
pub struct SuggestResponse {
    #[serde(default)]
    pub data: Vec<Suggestion>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Suggestion {
    pub title: String,
    pub artist: SuggestionArtist,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SuggestionArtist {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LyricsResponse {
    #[serde(default)]
    pub lyrics: String,
}

pub struct LyricsOvh {
    client: ServiceClient,
    base_url: String,
}

impl LyricsOvh {
    pub fn new(client: ServiceClient, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Artist and title as the provider spells them; the query itself when
    /// nothing is suggested
    async fn suggest(&self, artist: &str, title: &str) -> ResolveResult<(String, String)> {
        let query = format!("{} {}", artist.trim(), title.trim());
        let url = format!("{}/suggest/{}", self.base(), urlencoding::encode(&query));

        let response: SuggestResponse = self.client.get_json(&url, &[]).await?;
        let suggestion = response
            .data
            .iter()
            .find(|s| fuzzy_matches(artist, &s.artist.name) && fuzzy_matches(title, &s.title))
            .or_else(|| response.data.first());

        Ok(match suggestion {
            Some(s) => (s.artist.name.clone(), s.title.clone()),
            None => {
                debug!(query = %query, "No lyrics.ovh suggestion, using query as given");
                (artist.trim().to_string(), title.trim().to_string())
            }
        })
    }
}

#[async_trait]
impl LyricsProvider for LyricsOvh {
    fn source(&self) -> LyricsSource {
        LyricsSource::LyricsOvh
    }

    async fn lookup(&self, artist: &str, title: &str) -> ResolveResult<Option<ProviderLyrics>> {
        let (found_artist, found_title) = self.suggest(artist, title).await?;

        let url = format!(
            "{}/v1/{}/{}",
            self.base(),
            urlencoding::encode(&found_artist),
            urlencoding::encode(&found_title)
        );

        match self.client.get_json::<LyricsResponse>(&url, &[]).await {
            Ok(response) if response.lyrics.trim().is_empty() => Ok(None),
            Ok(response) => Ok(Some(ProviderLyrics {
                text: response.lyrics,
                artist: Some(found_artist),
                title: Some(found_title),
                instrumental: false,
            })),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_suggest_response() {
        let parsed: SuggestResponse = serde_json::from_str(
            r#"{"data": [{"id": 1, "title": "Bohemian Rhapsody", "artist": {"id": 2, "name": "Queen"}}],
                "total": 1}"#,
        )
        .unwrap();
        assert_eq!(parsed.data[0].artist.name, "Queen");
    }

    #[test]
    fn test_parse_lyrics_response() {
        let parsed: LyricsResponse =
            serde_json::from_str(r#"{"lyrics": "Is this the real life?"}"#).unwrap();
        assert_eq!(parsed.lyrics, "Is this the real life?");

        let empty: LyricsResponse = serde_json::from_str(r#"{"error": "No lyrics found"}"#).unwrap();
        assert!(empty.lyrics.is_empty());
    }
}
