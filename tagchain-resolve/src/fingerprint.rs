//! Acoustic fingerprint computation via the external `fpcalc` tool
//!
//! The fingerprint itself is opaque to this crate: the tool returns a
//! Chromaprint string and a duration, which are passed to AcoustID as-is.

use crate::error::{ResolveError, ResolveResult};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Output of one fingerprint computation
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FingerprintOutput {
    pub fingerprint: String,
    /// Seconds
    pub duration: f64,
}

/// Source of acoustic fingerprints
#[async_trait]
pub trait Fingerprinter: Send + Sync {
    /// # Errors
    /// [`ResolveError::ToolUnavailable`] when the tool is missing,
    /// [`ResolveError::ToolFailed`] for every other failure. Neither is retried.
    async fn run_fingerprint(&self, path: &Path, timeout: Duration) -> ResolveResult<FingerprintOutput>;
}

/// Runs Chromaprint's `fpcalc -json`
pub struct FpcalcRunner {
    binary: PathBuf,
}

impl FpcalcRunner {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for FpcalcRunner {
    fn default() -> Self {
        Self::new("fpcalc")
    }
}

#[async_trait]
impl Fingerprinter for FpcalcRunner {
    async fn run_fingerprint(&self, path: &Path, timeout: Duration) -> ResolveResult<FingerprintOutput> {
        debug!(path = %path.display(), binary = %self.binary.display(), "Running fingerprint tool");

        let child = Command::new(&self.binary)
            .arg("-json")
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => ResolveError::ToolUnavailable(format!(
                    "{} not found; install Chromaprint (fpcalc)",
                    self.binary.display()
                )),
                _ => ResolveError::ToolFailed(format!(
                    "Failed to start {}: {}",
                    self.binary.display(),
                    e
                )),
            })?;

        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                ResolveError::ToolFailed(format!(
                    "{} timed out after {}s on {}",
                    self.binary.display(),
                    timeout.as_secs(),
                    path.display()
                ))
            })?
            .map_err(|e| ResolveError::ToolFailed(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ResolveError::ToolFailed(format!(
                "{} exited with {} on {}: {}",
                self.binary.display(),
                output.status,
                path.display(),
                stderr.trim()
            )));
        }

        parse_fpcalc_json(&output.stdout)
    }
}

/// Parse `fpcalc -json` stdout
pub fn parse_fpcalc_json(stdout: &[u8]) -> ResolveResult<FingerprintOutput> {
    let parsed: FingerprintOutput = serde_json::from_slice(stdout)
        .map_err(|e| ResolveError::ToolFailed(format!("Unreadable fpcalc output: {}", e)))?;

    if parsed.fingerprint.is_empty() {
        return Err(ResolveError::ToolFailed("fpcalc returned an empty fingerprint".to_string()));
    }
    Ok(parsed)
}
