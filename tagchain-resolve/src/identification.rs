//! Acoustic identification stage (AcoustID)
//!
//! `identify` is the raw lookup of one fingerprint. `identify_file` is the
//! cached path: the whole `{fingerprint, duration, candidates}` record is
//! stored per file so a later run skips both the fingerprint tool and the
//! network.

use crate::cache::{Cache, Lookup};
use crate::config::ACOUSTID_KEY_ENV;
use crate::error::{ResolveError, ResolveResult};
use crate::fingerprint::Fingerprinter;
use crate::http::ServiceClient;
use crate::types::{FingerprintRecord, IdentificationCandidate};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const SERVICE: &str = "AcoustID";

/// AcoustID lookup response
#[derive(Debug, Clone, Deserialize)]
pub struct AcoustIdResponse {
    pub status: String,
    #[serde(default)]
    pub results: Vec<AcoustIdResult>,
    pub error: Option<AcoustIdErrorBody>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AcoustIdResult {
    /// AcoustID track id
    pub id: String,
    pub score: f64,
    #[serde(default)]
    pub recordings: Vec<AcoustIdRecording>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AcoustIdRecording {
    /// MusicBrainz recording MBID
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AcoustIdErrorBody {
    pub message: String,
}

/// Identification settings taken from the resolver config
#[derive(Debug, Clone)]
pub struct IdentificationSettings {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub min_score: f64,
    pub fingerprint_timeout: Duration,
}

pub struct IdentificationStage {
    client: ServiceClient,
    cache: Arc<dyn Cache<Path, FingerprintRecord>>,
    settings: IdentificationSettings,
}

impl IdentificationStage {
    pub fn new(
        client: ServiceClient,
        cache: Arc<dyn Cache<Path, FingerprintRecord>>,
        settings: IdentificationSettings,
    ) -> Self {
        Self {
            client,
            cache,
            settings,
        }
    }

    fn api_key(&self) -> ResolveResult<&str> {
        self.settings.api_key.as_deref().ok_or_else(|| {
            ResolveError::Config(format!(
                "AcoustID API key not configured. Set {} or acoustid_api_key in the TOML config.\n\
                 Obtain a key at: https://acoustid.org/api-key",
                ACOUSTID_KEY_ENV
            ))
        })
    }

    /// Look up one fingerprint; ranked candidates at or above the minimum score
    pub async fn identify(
        &self,
        fingerprint: &str,
        duration: f64,
    ) -> ResolveResult<Vec<IdentificationCandidate>> {
        let api_key = self.api_key()?;
        let duration = format!("{}", duration.round().max(0.0) as u32);
        let query = [
            ("client", api_key),
            ("meta", "recordingids"),
            ("duration", duration.as_str()),
            ("fingerprint", fingerprint),
        ];

        debug!(duration = %duration, "Querying AcoustID");

        let response: AcoustIdResponse = self
            .client
            .get_json(&self.settings.endpoint, &query)
            .await?;

        if response.status != "ok" {
            let message = response
                .error
                .map(|e| e.message)
                .unwrap_or_else(|| format!("status '{}'", response.status));
            return Err(ResolveError::ClientError {
                service: SERVICE,
                status: 200,
                message,
            });
        }

        let total = response.results.len();
        let candidates = rank_candidates(response.results, self.settings.min_score);
        info!(
            results = total,
            kept = candidates.len(),
            min_score = self.settings.min_score,
            "AcoustID lookup complete"
        );
        Ok(candidates)
    }

    /// Fingerprint and identify a file, consulting the cache first.
    ///
    /// Nothing is cached when the tool or the lookup fails.
    pub async fn identify_file(
        &self,
        path: &Path,
        fingerprinter: &dyn Fingerprinter,
    ) -> ResolveResult<FingerprintRecord> {
        match self.cache.get(path).await {
            Ok(Lookup::Hit(record)) => {
                debug!(path = %path.display(), "Fingerprint cache hit");
                return Ok(record);
            }
            Ok(Lookup::HitAbsent) | Ok(Lookup::Miss) => {}
            Err(e) => warn!(path = %path.display(), error = %e, "Fingerprint cache read failed"),
        }

        self.api_key()?;

        let output = fingerprinter
            .run_fingerprint(path, self.settings.fingerprint_timeout)
            .await?;
        let candidates = self.identify(&output.fingerprint, output.duration).await?;

        let record = FingerprintRecord {
            fingerprint: output.fingerprint,
            duration: output.duration,
            candidates,
        };

        if let Err(e) = self.cache.set(path, Some(record.clone())).await {
            warn!(path = %path.display(), error = %e, "Fingerprint cache write failed");
        }
        Ok(record)
    }
}

/// Drop results below `min_score` and sort score-descending.
///
/// The sort is stable, so equal scores keep provider order. Recording ids
/// are deduplicated within each candidate.
pub fn rank_candidates(results: Vec<AcoustIdResult>, min_score: f64) -> Vec<IdentificationCandidate> {
    let mut candidates: Vec<IdentificationCandidate> = results
        .into_iter()
        .filter(|r| r.score >= min_score)
        .map(|r| {
            let mut recording_ids: Vec<String> = Vec::with_capacity(r.recordings.len());
            for recording in r.recordings {
                if !recording_ids.contains(&recording.id) {
                    recording_ids.push(recording.id);
                }
            }
            IdentificationCandidate {
                external_id: r.id,
                score: r.score,
                recording_ids,
            }
        })
        .collect();

    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    candidates
}
