//! tagchain-resolve: metadata resolution pipeline for audio files
//!
//! Chains rate-limited, unreliable web services:
//! - [`identification`]: AcoustID lookup of an acoustic fingerprint
//! - [`metadata`]: MusicBrainz recording metadata for ranked candidates
//! - [`lyrics`]: ordered fallback across lyrics providers
//!
//! Each upstream service has one [`RateLimiter`]; every attempt made under a
//! [`RetryPolicy`] takes a slot from it. Results are cached per stage in a
//! session or persistent [`cache`]. [`Resolver`] wires everything together.

pub mod cache;
pub mod config;
pub mod content_identity;
pub mod error;
pub mod fingerprint;
pub mod http;
pub mod identification;
pub mod lyrics;
pub mod metadata;
pub mod rate_limiter;
pub mod resolver;
pub mod retry;
pub mod types;

pub use crate::cache::{Cache, CacheStats, Lookup, Namespace};
pub use crate::config::ResolverConfig;
pub use crate::error::{ResolveError, ResolveResult};
pub use crate::rate_limiter::RateLimiter;
pub use crate::resolver::Resolver;
pub use crate::retry::RetryPolicy;
pub use crate::types::{
    FingerprintRecord, IdentificationCandidate, LyricsResult, LyricsSource, RecordingMetadata,
    Resolution,
};
