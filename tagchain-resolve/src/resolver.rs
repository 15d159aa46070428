//! Pipeline facade
//!
//! Owns one rate limiter per upstream service, the caches for this run and
//! the three stages. Caches are persistent when a cache path is
//! configured, in-memory otherwise.

use crate::cache::{
    Cache, CacheStats, CacheStore, LyricsKey, MemoryCache, Namespace, PersistentCache,
    PersistentFileCache,
};
use crate::config::ResolverConfig;
use crate::error::ResolveResult;
use crate::fingerprint::{Fingerprinter, FpcalcRunner};
use crate::http::{HttpClient, ServiceClient};
use crate::identification::{self, IdentificationSettings, IdentificationStage};
use crate::lyrics::{
    lrclib, lyrics_ovh, musixmatch, LrclibExact, LrclibSearch, LyricsCleaner, LyricsOvh,
    LyricsProvider, LyricsResolver, Musixmatch,
};
use crate::metadata::{self, MetadataStage};
use crate::rate_limiter::RateLimiter;
use crate::types::{
    FingerprintRecord, IdentificationCandidate, LyricsResult, RecordingMetadata, Resolution,
    UNKNOWN_ARTIST,
};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

struct Caches {
    fingerprint: Arc<dyn Cache<Path, FingerprintRecord>>,
    metadata: Arc<dyn Cache<str, RecordingMetadata>>,
    lyrics: Arc<dyn Cache<LyricsKey, LyricsResult>>,
    store: Option<CacheStore>,
}

impl Caches {
    async fn open(cache_path: Option<&Path>) -> ResolveResult<Self> {
        let Some(path) = cache_path else {
            info!("Using session cache (no cache path configured)");
            return Ok(Self {
                fingerprint: Arc::new(MemoryCache::<Path, FingerprintRecord>::new()),
                metadata: Arc::new(MemoryCache::<str, RecordingMetadata>::new()),
                lyrics: Arc::new(MemoryCache::<LyricsKey, LyricsResult>::new()),
                store: None,
            });
        };

        let store = CacheStore::open(path).await?;
        Ok(Self {
            fingerprint: Arc::new(PersistentFileCache::<FingerprintRecord>::new(store.clone())),
            metadata: Arc::new(PersistentCache::<str, RecordingMetadata>::new(
                store.clone(),
                Namespace::Metadata,
            )),
            lyrics: Arc::new(PersistentCache::<LyricsKey, LyricsResult>::new(
                store.clone(),
                Namespace::Lyrics,
            )),
            store: Some(store),
        })
    }

    async fn size(&self, namespace: Namespace) -> ResolveResult<usize> {
        Ok(match namespace {
            Namespace::Fingerprint => self.fingerprint.size().await?,
            Namespace::Metadata => self.metadata.size().await?,
            Namespace::Lyrics => self.lyrics.size().await?,
        })
    }

    async fn clear(&self, namespace: Namespace) -> ResolveResult<()> {
        match namespace {
            Namespace::Fingerprint => self.fingerprint.clear().await?,
            Namespace::Metadata => self.metadata.clear().await?,
            Namespace::Lyrics => self.lyrics.clear().await?,
        }
        Ok(())
    }
}

/// Identification → metadata → lyrics for audio files
pub struct Resolver {
    identification: IdentificationStage,
    metadata: MetadataStage,
    lyrics: LyricsResolver,
    fingerprinter: Arc<dyn Fingerprinter>,
    caches: Caches,
}

impl Resolver {
    /// Resolver that fingerprints with the configured `fpcalc`
    pub async fn new(config: &ResolverConfig) -> ResolveResult<Self> {
        let fingerprinter = Arc::new(FpcalcRunner::new(config.fpcalc_path.clone()));
        Self::with_fingerprinter(config, fingerprinter).await
    }

    pub async fn with_fingerprinter(
        config: &ResolverConfig,
        fingerprinter: Arc<dyn Fingerprinter>,
    ) -> ResolveResult<Self> {
        let http = HttpClient::new(&config.user_agent, config.http_timeout)?;
        let cleaner = LyricsCleaner::new(config.boilerplate_patterns.as_slice())?;
        let caches = Caches::open(config.cache_path.as_deref()).await?;

        let service = |name: &'static str, interval: Duration| {
            ServiceClient::new(
                http.clone(),
                RateLimiter::new(name, interval),
                config.retry.clone(),
            )
        };

        let identification = IdentificationStage::new(
            service(identification::SERVICE, config.acoustid_interval),
            caches.fingerprint.clone(),
            IdentificationSettings {
                endpoint: config.endpoints.acoustid.clone(),
                api_key: config.acoustid_api_key.clone(),
                min_score: config.min_score,
                fingerprint_timeout: config.fingerprint_timeout,
            },
        );

        let metadata = MetadataStage::new(
            service(metadata::SERVICE, config.musicbrainz_interval),
            caches.metadata.clone(),
            &config.endpoints.musicbrainz,
            config.min_genre_votes,
        );

        let lrclib_client = service(lrclib::SERVICE, config.lyrics_interval);
        let mut providers: Vec<Arc<dyn LyricsProvider>> = vec![
            Arc::new(LrclibExact::new(lrclib_client.clone(), &config.endpoints.lrclib)),
            Arc::new(LrclibSearch::new(lrclib_client, &config.endpoints.lrclib)),
            Arc::new(LyricsOvh::new(
                service(lyrics_ovh::SERVICE, config.lyrics_interval),
                &config.endpoints.lyrics_ovh,
            )),
        ];
        if let Some(token) = &config.musixmatch_token {
            providers.push(Arc::new(Musixmatch::new(
                service(musixmatch::SERVICE, config.lyrics_interval),
                &config.endpoints.musixmatch,
                token.clone(),
            )));
        }
        let lyrics = LyricsResolver::new(providers, cleaner, caches.lyrics.clone());

        debug!(lyrics_providers = ?lyrics.sources(), "Resolver ready");

        Ok(Self {
            identification,
            metadata,
            lyrics,
            fingerprinter,
            caches,
        })
    }

    pub fn is_persistent(&self) -> bool {
        self.caches.store.is_some()
    }

    /// Raw AcoustID lookup of one fingerprint
    pub async fn identify(
        &self,
        fingerprint: &str,
        duration: f64,
    ) -> ResolveResult<Vec<IdentificationCandidate>> {
        self.identification.identify(fingerprint, duration).await
    }

    /// Fingerprint + identify one file (cached per file)
    pub async fn identify_file(&self, path: &Path) -> ResolveResult<FingerprintRecord> {
        self.identification
            .identify_file(path, self.fingerprinter.as_ref())
            .await
    }

    pub async fn fetch_metadata(
        &self,
        recording_ids: &[String],
    ) -> ResolveResult<Option<RecordingMetadata>> {
        self.metadata.fetch_metadata(recording_ids).await
    }

    pub async fn fetch_lyrics(&self, artist: &str, title: &str) -> Option<LyricsResult> {
        self.lyrics.fetch_lyrics(artist, title).await
    }

    /// Run the whole chain for one file, stages in sequence
    pub async fn resolve_file(&self, path: &Path) -> ResolveResult<Resolution> {
        info!(path = %path.display(), "Resolving file");

        let identification = self.identify_file(path).await?;
        let metadata = self
            .fetch_metadata(&identification.ranked_recording_ids())
            .await?;

        let lyrics = match &metadata {
            Some(m) if m.artist != UNKNOWN_ARTIST => self.fetch_lyrics(&m.artist, &m.title).await,
            _ => None,
        };

        Ok(Resolution {
            path: path.to_path_buf(),
            identification,
            metadata,
            lyrics,
        })
    }

    pub async fn clear_all(&self) -> ResolveResult<()> {
        for namespace in Namespace::ALL {
            self.caches.clear(namespace).await?;
        }
        info!("Cleared all caches");
        Ok(())
    }

    pub async fn clear_namespace(&self, namespace: Namespace) -> ResolveResult<()> {
        self.caches.clear(namespace).await?;
        info!(namespace = %namespace, "Cleared cache namespace");
        Ok(())
    }

    pub async fn stats(&self) -> ResolveResult<CacheStats> {
        let mut counts = BTreeMap::new();
        for namespace in Namespace::ALL {
            counts.insert(namespace, self.caches.size(namespace).await?);
        }
        let size_bytes = match &self.caches.store {
            Some(store) => store.size_bytes().await?,
            None => 0,
        };

        Ok(CacheStats {
            total_entries: counts.values().sum(),
            counts,
            size_bytes,
            is_persistent: self.is_persistent(),
        })
    }

    /// Release the persistent store, if any
    pub async fn close(&self) {
        if let Some(store) = &self.caches.store {
            store.close().await;
        }
    }
}
