//! Test Helper Utilities
//!
//! Shared utilities for testing tagchain-resolve against local mock upstreams

#![allow(dead_code)]

pub mod fake_fingerprinter;
pub mod mock_server;

pub use fake_fingerprinter::FakeFingerprinter;
pub use mock_server::{HitCounter, MockServer};

use std::time::Duration;
use tagchain_resolve::config::Endpoints;
use tagchain_resolve::{ResolverConfig, RetryPolicy};

/// Config pointing every service at `base_url`, with short intervals and
/// backoff so tests run quickly
pub fn test_config(base_url: &str) -> ResolverConfig {
    ResolverConfig {
        acoustid_api_key: Some("test-key".to_string()),
        acoustid_interval: Duration::from_millis(1),
        musicbrainz_interval: Duration::from_millis(1),
        lyrics_interval: Duration::from_millis(1),
        retry: RetryPolicy::new(2, Duration::from_millis(5)),
        endpoints: Endpoints::all_at(base_url),
        ..ResolverConfig::default()
    }
}
