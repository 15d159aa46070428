//! Path-independent content identity for audio files
//!
//! SHA-256 over the first and last 1 MiB of the file, or over every byte
//! when the file is 2 MiB or smaller. Renaming, moving or touching a file
//! keeps its identity, so the persistent fingerprint cache survives library
//! reorganisation. Large files are not read in full; the identity is a cache
//! key, not an integrity check.

use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tagchain_common::{Error, Result};

/// Window hashed at each end of large files
pub const WINDOW_BYTES: u64 = 1024 * 1024;

/// Hex-encoded SHA-256 content digest
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentIdentity(String);

impl ContentIdentity {
    /// Compute the identity of the file at `path` on the blocking pool
    pub async fn compute(path: &Path) -> Result<Self> {
        let path_buf: PathBuf = path.to_path_buf();
        tracing::debug!(path = %path_buf.display(), "Computing content identity");

        tokio::task::spawn_blocking(move || Self::compute_blocking(&path_buf))
            .await
            .map_err(|e| Error::Internal(format!("Content identity task failed: {}", e)))?
    }

    /// Synchronous variant of [`ContentIdentity::compute`]
    pub fn compute_blocking(path: &Path) -> Result<Self> {
        let mut file = File::open(path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to open {} for hashing: {}", path.display(), e),
            ))
        })?;
        let len = file.metadata()?.len();

        let mut hasher = Sha256::new();

        if len <= 2 * WINDOW_BYTES {
            let mut buffer = Vec::with_capacity(len as usize);
            file.read_to_end(&mut buffer)?;
            hasher.update(&buffer);
        } else {
            let mut window = vec![0u8; WINDOW_BYTES as usize];
            file.read_exact(&mut window)?;
            hasher.update(&window);

            file.seek(SeekFrom::Start(len - WINDOW_BYTES))?;
            file.read_exact(&mut window)?;
            hasher.update(&window);
        }

        Ok(Self(format!("{:x}", hasher.finalize())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_identity_is_hex_sha256() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.bin");
        std::fs::write(&path, b"abc").unwrap();

        let id = ContentIdentity::compute_blocking(&path).unwrap();
        assert_eq!(
            id.as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_same_bytes_different_paths() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.flac");
        let b = dir.path().join("nested_b.mp3");
        let bytes: Vec<u8> = (0..50_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&a, &bytes).unwrap();
        std::fs::write(&b, &bytes).unwrap();

        assert_eq!(
            ContentIdentity::compute_blocking(&a).unwrap(),
            ContentIdentity::compute_blocking(&b).unwrap()
        );
    }

    #[test]
    fn test_single_byte_change_detected_in_small_file() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.bin");
        let b = dir.path().join("b.bin");
        let mut bytes = vec![7u8; (2 * WINDOW_BYTES) as usize];
        std::fs::write(&a, &bytes).unwrap();
        // Middle byte: outside both windows if the file were any larger
        bytes[WINDOW_BYTES as usize] ^= 0xff;
        std::fs::write(&b, &bytes).unwrap();

        assert_ne!(
            ContentIdentity::compute_blocking(&a).unwrap(),
            ContentIdentity::compute_blocking(&b).unwrap()
        );
    }

    #[test]
    fn test_large_file_hashes_only_windows() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.bin");
        let b = dir.path().join("b.bin");
        let mut bytes = vec![1u8; (3 * WINDOW_BYTES) as usize];
        std::fs::write(&a, &bytes).unwrap();
        bytes[(WINDOW_BYTES + WINDOW_BYTES / 2) as usize] = 2;
        std::fs::write(&b, &bytes).unwrap();

        assert_eq!(
            ContentIdentity::compute_blocking(&a).unwrap(),
            ContentIdentity::compute_blocking(&b).unwrap()
        );
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let result = ContentIdentity::compute(Path::new("/nonexistent/track.flac")).await;
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
