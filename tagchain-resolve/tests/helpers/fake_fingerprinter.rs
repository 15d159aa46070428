//! Fingerprinter returning a fixed result without running fpcalc

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tagchain_resolve::fingerprint::{FingerprintOutput, Fingerprinter};
use tagchain_resolve::ResolveResult;

pub struct FakeFingerprinter {
    output: FingerprintOutput,
    calls: AtomicUsize,
}

impl FakeFingerprinter {
    pub fn new(fingerprint: &str, duration: f64) -> Self {
        Self {
            output: FingerprintOutput {
                fingerprint: fingerprint.to_string(),
                duration,
            },
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fingerprinter for FakeFingerprinter {
    async fn run_fingerprint(&self, _path: &Path, _timeout: Duration) -> ResolveResult<FingerprintOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.output.clone())
    }
}
