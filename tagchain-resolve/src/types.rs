//! Domain types produced by the resolution stages

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Artist sentinel used when upstream credits are missing
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// Title sentinel used when upstream data has no title
pub const UNKNOWN_TITLE: &str = "Unknown Title";

/// One AcoustID match for a fingerprint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentificationCandidate {
    /// AcoustID track identifier
    pub external_id: String,
    /// Match confidence (0.0 to 1.0)
    pub score: f64,
    /// MusicBrainz recording MBIDs, provider order, no duplicates
    pub recording_ids: Vec<String>,
}

/// Cached outcome of identifying one audio file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FingerprintRecord {
    pub fingerprint: String,
    /// Track duration in seconds as reported by the fingerprint tool
    pub duration: f64,
    /// Ranked candidates (score-descending)
    pub candidates: Vec<IdentificationCandidate>,
}

impl FingerprintRecord {
    /// All recording ids across candidates, best candidate first, deduplicated
    pub fn ranked_recording_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for id in self.candidates.iter().flat_map(|c| c.recording_ids.iter()) {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
        ids
    }
}

/// Canonical recording metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    pub recording_id: String,
    pub release_id: Option<String>,
    pub title: String,
    /// Primary credited artist, never empty
    pub artist: String,
    pub featured_artists: Vec<String>,
    pub album: Option<String>,
    pub year: Option<u16>,
    pub genres: Vec<String>,
}

/// Lyrics provider that produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LyricsSource {
    /// LRCLIB exact-match lookup
    Lrclib,
    /// LRCLIB fuzzy search
    LrclibSearch,
    /// lyrics.ovh search-then-fetch
    LyricsOvh,
    /// Musixmatch (token required)
    Musixmatch,
}

impl LyricsSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LyricsSource::Lrclib => "lrclib",
            LyricsSource::LrclibSearch => "lrclib_search",
            LyricsSource::LyricsOvh => "lyrics_ovh",
            LyricsSource::Musixmatch => "musixmatch",
        }
    }
}

impl fmt::Display for LyricsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cleaned lyrics text from one provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LyricsResult {
    pub text: String,
    pub source: LyricsSource,
    /// Provider's reported artist/title fuzzily matched the query
    pub validated: bool,
}

/// Everything resolved for one audio file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub path: PathBuf,
    pub identification: FingerprintRecord,
    pub metadata: Option<RecordingMetadata>,
    pub lyrics: Option<LyricsResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranked_recording_ids_dedupes_in_order() {
        let record = FingerprintRecord {
            fingerprint: "AQAA".into(),
            duration: 180.0,
            candidates: vec![
                IdentificationCandidate {
                    external_id: "a".into(),
                    score: 0.9,
                    recording_ids: vec!["r1".into(), "r2".into()],
                },
                IdentificationCandidate {
                    external_id: "b".into(),
                    score: 0.8,
                    recording_ids: vec!["r2".into(), "r3".into()],
                },
            ],
        };
        assert_eq!(record.ranked_recording_ids(), vec!["r1", "r2", "r3"]);
    }

    #[test]
    fn test_lyrics_source_serializes_snake_case() {
        let json = serde_json::to_string(&LyricsSource::LyricsOvh).unwrap();
        assert_eq!(json, "\"lyrics_ovh\"");
    }
}
