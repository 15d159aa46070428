//! Musixmatch provider (only when an access token is configured)
//!
//! Musixmatch answers HTTP 200 and reports the real status in
//! `message.header.status_code`; that code is classified like an HTTP status
//! inside each attempt, so an envelope 429 or 5xx is retried.

use super::{LyricsProvider, ProviderLyrics};
use crate::error::{ResolveError, ResolveResult};
use crate::http::ServiceClient;
use crate::types::LyricsSource;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;

pub const SERVICE: &str = "Musixmatch";

#[derive(Debug, Deserialize)]
struct Envelope {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    header: Header,
    /// `[]` instead of an object on errors
    #[serde(default)]
    body: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct Header {
    status_code: u16,
}

#[derive(Debug, Deserialize)]
struct TrackSearchBody {
    #[serde(default)]
    track_list: Vec<TrackEntry>,
}

#[derive(Debug, Deserialize)]
struct TrackEntry {
    track: Track,
}

#[derive(Debug, Deserialize)]
struct Track {
    track_id: u64,
    #[serde(default)]
    track_name: Option<String>,
    #[serde(default)]
    artist_name: Option<String>,
    #[serde(default)]
    instrumental: u8,
}

#[derive(Debug, Deserialize)]
struct LyricsBody {
    lyrics: LyricsRecord,
}

#[derive(Debug, Deserialize)]
struct LyricsRecord {
    #[serde(default)]
    lyrics_body: String,
}

pub struct Musixmatch {
    client: ServiceClient,
    base_url: String,
    token: String,
}

impl Musixmatch {
    pub fn new(client: ServiceClient, base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, query: &[(&str, &str)]) -> ResolveResult<T> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), method);
        let mut params: Vec<(&str, &str)> = query.to_vec();
        params.push(("apikey", self.token.as_str()));

        self.client
            .get_json_then(&url, &params, unwrap_envelope::<T>)
            .await
    }
}

fn unwrap_envelope<T: DeserializeOwned>(envelope: Envelope) -> ResolveResult<T> {
    let code = envelope.message.header.status_code;
    if code != 200 {
        let status = StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_GATEWAY);
        return Err(ResolveError::from_status(
            SERVICE,
            status,
            format!("status_code {}", code),
        ));
    }
    serde_json::from_value(envelope.message.body).map_err(|e| ResolveError::MalformedResponse {
        service: SERVICE,
        message: e.to_string(),
    })
}

#[async_trait]
impl LyricsProvider for Musixmatch {
    fn source(&self) -> LyricsSource {
        LyricsSource::Musixmatch
    }

    fn is_optional(&self) -> bool {
        true
    }

    async fn lookup(&self, artist: &str, title: &str) -> ResolveResult<Option<ProviderLyrics>> {
        let search: TrackSearchBody = self
            .call(
                "track.search",
                &[
                    ("q_artist", artist),
                    ("q_track", title),
                    ("page_size", "1"),
                    ("s_track_rating", "desc"),
                ],
            )
            .await?;

        let Some(TrackEntry { track }) = search.track_list.into_iter().next() else {
            return Ok(None);
        };

        if track.instrumental != 0 {
            return Ok(Some(ProviderLyrics {
                instrumental: true,
                ..Default::default()
            }));
        }

        let track_id = track.track_id.to_string();
        let lyrics: LyricsBody = match self
            .call("track.lyrics.get", &[("track_id", track_id.as_str())])
            .await
        {
            Ok(body) => body,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };

        Ok(Some(ProviderLyrics {
            text: lyrics.lyrics.lyrics_body,
            artist: track.artist_name,
            title: track.track_name,
            instrumental: false,
        }))
    }
}
