//! Canonical metadata stage (MusicBrainz)
//!
//! Candidate recording ids are tried in ranked order. A 404 for one id is
//! cached as an explicit absence and the next id is tried; any other
//! failure stops the stage.

use crate::cache::{Cache, Lookup};
use crate::error::ResolveResult;
use crate::http::ServiceClient;
use crate::types::{RecordingMetadata, UNKNOWN_ARTIST, UNKNOWN_TITLE};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const SERVICE: &str = "MusicBrainz";

const RECORDING_INCLUDES: &str = "artist-credits+releases+release-groups+genres+tags";

/// MusicBrainz recording response (subset)
#[derive(Debug, Clone, Deserialize)]
pub struct MbRecording {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "artist-credit", default)]
    pub artist_credit: Vec<MbArtistCredit>,
    #[serde(default)]
    pub releases: Vec<MbRelease>,
    #[serde(rename = "first-release-date")]
    pub first_release_date: Option<String>,
    #[serde(default)]
    pub genres: Vec<MbTag>,
    #[serde(default)]
    pub tags: Vec<MbTag>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MbArtistCredit {
    /// Credited name (may differ from the artist's canonical name)
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MbRelease {
    pub id: String,
    pub title: String,
    /// "Official", "Promotion", "Bootleg", ...
    pub status: Option<String>,
    pub date: Option<String>,
    #[serde(rename = "release-group")]
    pub release_group: Option<MbReleaseGroup>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MbReleaseGroup {
    #[serde(rename = "primary-type")]
    pub primary_type: Option<String>,
    #[serde(rename = "secondary-types", default)]
    pub secondary_types: Vec<String>,
}

/// Genre or folksonomy tag with its vote count
#[derive(Debug, Clone, Deserialize)]
pub struct MbTag {
    pub name: String,
    #[serde(default)]
    pub count: i64,
}

impl MbRelease {
    fn is_official(&self) -> bool {
        self.status
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case("official"))
    }

    /// Plain album: primary type Album with no secondary types (so not a
    /// compilation, live album, soundtrack, ...)
    fn is_album(&self) -> bool {
        self.release_group.as_ref().is_some_and(|rg| {
            rg.primary_type
                .as_deref()
                .is_some_and(|t| t.eq_ignore_ascii_case("album"))
                && rg.secondary_types.is_empty()
        })
    }

    fn date(&self) -> Option<&str> {
        self.date.as_deref().map(str::trim).filter(|d| !d.is_empty())
    }
}

pub struct MetadataStage {
    client: ServiceClient,
    cache: Arc<dyn Cache<str, RecordingMetadata>>,
    base_url: String,
    min_genre_votes: u32,
}

impl MetadataStage {
    pub fn new(
        client: ServiceClient,
        cache: Arc<dyn Cache<str, RecordingMetadata>>,
        base_url: impl Into<String>,
        min_genre_votes: u32,
    ) -> Self {
        Self {
            client,
            cache,
            base_url: base_url.into(),
            min_genre_votes,
        }
    }

    /// First recording id that resolves, in the order given
    pub async fn fetch_metadata(
        &self,
        recording_ids: &[String],
    ) -> ResolveResult<Option<RecordingMetadata>> {
        for id in recording_ids.iter().map(|id| id.trim()).filter(|id| !id.is_empty()) {
            match self.cache.get(id).await {
                Ok(Lookup::Hit(metadata)) => {
                    debug!(recording_id = id, "Metadata cache hit");
                    return Ok(Some(metadata));
                }
                Ok(Lookup::HitAbsent) => {
                    debug!(recording_id = id, "Recording cached as not found, trying next");
                    continue;
                }
                Ok(Lookup::Miss) => {}
                Err(e) => warn!(recording_id = id, error = %e, "Metadata cache read failed"),
            }

            match self.fetch_recording(id).await {
                Ok(metadata) => {
                    info!(
                        recording_id = id,
                        title = %metadata.title,
                        artist = %metadata.artist,
                        "Recording metadata resolved"
                    );
                    self.store(id, Some(metadata.clone())).await;
                    return Ok(Some(metadata));
                }
                Err(e) if e.is_not_found() => {
                    debug!(recording_id = id, "Recording not found, trying next candidate");
                    self.store(id, None).await;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(None)
    }

    /// One uncached recording lookup
    pub async fn fetch_recording(&self, recording_id: &str) -> ResolveResult<RecordingMetadata> {
        let url = format!(
            "{}/recording/{}?inc={}&fmt=json",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(recording_id),
            RECORDING_INCLUDES
        );
        let recording: MbRecording = self.client.get_json(&url, &[]).await?;
        Ok(map_recording(recording, self.min_genre_votes))
    }

    async fn store(&self, recording_id: &str, value: Option<RecordingMetadata>) {
        if let Err(e) = self.cache.set(recording_id, value).await {
            warn!(recording_id, error = %e, "Metadata cache write failed");
        }
    }
}

/// Map a MusicBrainz recording onto [`RecordingMetadata`]
pub fn map_recording(recording: MbRecording, min_genre_votes: u32) -> RecordingMetadata {
    let mut credits = recording
        .artist_credit
        .into_iter()
        .map(|c| c.name.trim().to_string())
        .filter(|name| !name.is_empty());
    let artist = credits.next().unwrap_or_else(|| UNKNOWN_ARTIST.to_string());
    let featured_artists: Vec<String> = credits.collect();

    let title = match recording.title.trim() {
        "" => UNKNOWN_TITLE.to_string(),
        t => t.to_string(),
    };

    let release = select_best_release(&recording.releases);
    let year = release
        .and_then(|r| r.date())
        .and_then(extract_year)
        .or_else(|| recording.first_release_date.as_deref().and_then(extract_year));

    let tags = if recording.genres.is_empty() {
        &recording.tags
    } else {
        &recording.genres
    };

    RecordingMetadata {
        recording_id: recording.id,
        release_id: release.map(|r| r.id.clone()),
        title,
        artist,
        featured_artists,
        album: release.map(|r| r.title.clone()),
        year,
        genres: extract_genres(tags, min_genre_votes),
    }
}

/// Preferred release: official, then plain album, then dated, then earliest
pub fn select_best_release(releases: &[MbRelease]) -> Option<&MbRelease> {
    releases.iter().min_by(|a, b| {
        let key = |r: &MbRelease| (!r.is_official(), !r.is_album(), r.date().is_none());
        key(a)
            .cmp(&key(b))
            .then_with(|| a.date().unwrap_or("").cmp(b.date().unwrap_or("")))
    })
}

/// Year from `YYYY`, `YYYY-MM` or `YYYY-MM-DD`; anything else is `None`
pub fn extract_year(date: &str) -> Option<u16> {
    let date = date.trim();
    let bytes = date.as_bytes();
    let digits = |range: std::ops::Range<usize>| bytes[range].iter().all(u8::is_ascii_digit);

    let well_formed = match bytes.len() {
        4 => digits(0..4),
        7 => digits(0..4) && bytes[4] == b'-' && digits(5..7),
        10 => {
            digits(0..4)
                && bytes[4] == b'-'
                && digits(5..7)
                && bytes[7] == b'-'
                && digits(8..10)
        }
        _ => false,
    };
    if !well_formed {
        return None;
    }

    date[..4].parse().ok()
}

/// Genres with at least `min_votes`, most-voted first, title-cased, unique
pub fn extract_genres(tags: &[MbTag], min_votes: u32) -> Vec<String> {
    let mut kept: Vec<&MbTag> = tags
        .iter()
        .filter(|t| t.count >= i64::from(min_votes) && !t.name.trim().is_empty())
        .collect();
    kept.sort_by(|a, b| b.count.cmp(&a.count));

    let mut genres: Vec<String> = Vec::with_capacity(kept.len());
    for tag in kept {
        let genre = title_case_genre(tag.name.trim());
        if !genres.contains(&genre) {
            genres.push(genre);
        }
    }
    genres
}

/// Upper-case the first letter of every word, including segments joined by
/// `-`, `&` or `/` ("hip-hop" → "Hip-Hop", "r&b" → "R&B")
pub fn title_case_genre(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut at_boundary = true;
    for c in name.chars() {
        if at_boundary {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        at_boundary = c.is_whitespace() || matches!(c, '-' | '&' | '/');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn release(id: &str, status: &str, primary: &str, secondary: &[&str], date: &str) -> MbRelease {
        MbRelease {
            id: id.to_string(),
            title: format!("{} title", id),
            status: Some(status.to_string()),
            date: Some(date.to_string()),
            release_group: Some(MbReleaseGroup {
                primary_type: Some(primary.to_string()),
                secondary_types: secondary.iter().map(|s| s.to_string()).collect(),
            }),
        }
    }

    fn tag(name: &str, count: i64) -> MbTag {
        MbTag {
            name: name.to_string(),
            count,
        }
    }

    #[test]
    fn test_extract_year() {
        assert_eq!(extract_year("1975-11-21"), Some(1975));
        assert_eq!(extract_year("1975-11"), Some(1975));
        assert_eq!(extract_year("1975"), Some(1975));
        assert_eq!(extract_year("not-a-date"), None);
        assert_eq!(extract_year("75"), None);
        assert_eq!(extract_year("1975/11/21"), None);
        assert_eq!(extract_year(""), None);
    }

    #[test]
    fn test_genres_filtered_by_votes() {
        let genres = extract_genres(&[tag("rock", 10), tag("obscure", 1)], 2);
        assert_eq!(genres, vec!["Rock"]);
    }

    #[test]
    fn test_genres_sorted_by_votes() {
        let genres = extract_genres(&[tag("progressive rock", 3), tag("hip-hop", 7)], 1);
        assert_eq!(genres, vec!["Hip-Hop", "Progressive Rock"]);
    }

    #[test]
    fn test_title_case_genre() {
        assert_eq!(title_case_genre("drum & bass"), "Drum & Bass");
        assert_eq!(title_case_genre("r&b"), "R&B");
        assert_eq!(title_case_genre("rock/pop"), "Rock/Pop");
        assert_eq!(title_case_genre("UK garage"), "UK Garage");
    }

    #[test]
    fn test_release_selection_prefers_official_album() {
        let releases = vec![
            release("compilation", "Official", "Album", &["Compilation"], "2000"),
            release("original", "Official", "Album", &[], "1975"),
            release("bootleg", "Bootleg", "Album", &[], "1976"),
        ];
        assert_eq!(select_best_release(&releases).unwrap().id, "original");
    }

    #[test]
    fn test_release_selection_earliest_date_breaks_tie() {
        let releases = vec![
            release("reissue", "Official", "Album", &[], "2011-09-05"),
            release("undated", "Official", "Album", &[], ""),
            release("first", "Official", "Album", &[], "1975-10-31"),
        ];
        assert_eq!(select_best_release(&releases).unwrap().id, "first");
        assert!(select_best_release(&[]).is_none());
    }

    #[test]
    fn test_map_recording() {
        let recording: MbRecording = serde_json::from_str(
            r#"{
                "id": "b1a9c0e9-d987-4042-ae91-78d6a3267d69",
                "title": "Bohemian Rhapsody",
                "first-release-date": "1975-10-31",
                "artist-credit": [{"name": "Queen"}, {"name": "Guest"}],
                "releases": [
                    {"id": "rel-1", "title": "A Night at the Opera", "status": "Official",
                     "date": "1975-11-21",
                     "release-group": {"primary-type": "Album", "secondary-types": []}}
                ],
                "genres": [],
                "tags": [{"name": "classic rock", "count": 4}]
            }"#,
        )
        .unwrap();

        let metadata = map_recording(recording, 1);
        assert_eq!(metadata.title, "Bohemian Rhapsody");
        assert_eq!(metadata.artist, "Queen");
        assert_eq!(metadata.featured_artists, vec!["Guest"]);
        assert_eq!(metadata.album.as_deref(), Some("A Night at the Opera"));
        assert_eq!(metadata.release_id.as_deref(), Some("rel-1"));
        assert_eq!(metadata.year, Some(1975));
        assert_eq!(metadata.genres, vec!["Classic Rock"]);
    }

    #[test]
    fn test_map_recording_without_credits() {
        let recording: MbRecording =
            serde_json::from_str(r#"{"id": "r", "title": "", "first-release-date": "1999"}"#)
                .unwrap();
        let metadata = map_recording(recording, 1);
        assert_eq!(metadata.artist, UNKNOWN_ARTIST);
        assert_eq!(metadata.title, UNKNOWN_TITLE);
        assert_eq!(metadata.year, Some(1999));
        assert!(metadata.album.is_none());
    }
}
