//! SHA-256 content digests for fetched payloads and files already on disk.

use std::fmt;
use std::path::Path;

use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use super::constants::DIGEST_BLOCK_SIZE;

/// SHA-256 digest of a byte sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentDigest([u8; 32]);

impl ContentDigest {
    /// Computes the digest of an in-memory buffer.
    #[must_use]
    pub fn of(bytes: &[u8]) -> Self {
        Self(Sha256::digest(bytes).into())
    }

    /// Lowercase hex rendering, as used in disambiguated file names.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Incremental hasher fed chunk by chunk while a response streams in.
#[derive(Debug, Default, Clone)]
pub struct DigestAccumulator {
    hasher: Sha256,
}

impl DigestAccumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
    }

    #[must_use]
    pub fn finalize(self) -> ContentDigest {
        ContentDigest(self.hasher.finalize().into())
    }
}

/// Digests a file by reading it in fixed-size blocks.
///
/// The file is never loaded into memory as a whole.
///
/// # Errors
///
/// Returns the underlying IO error if the file cannot be opened or read.
pub async fn digest_file(path: &Path) -> std::io::Result<ContentDigest> {
    let mut file = File::open(path).await?;
    let mut accumulator = DigestAccumulator::new();
    let mut buf = vec![0u8; DIGEST_BLOCK_SIZE];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        accumulator.update(&buf[..n]);
    }
    Ok(accumulator.finalize())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn test_digest_of_empty_input() {
        assert_eq!(ContentDigest::of(b"").to_hex(), EMPTY_SHA256);
    }

    #[test]
    fn test_digest_known_content() {
        assert_eq!(
            ContentDigest::of(b"hello\n").to_hex(),
            "5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be03"
        );
    }

    #[test]
    fn test_accumulator_matches_one_shot_digest() {
        let mut accumulator = DigestAccumulator::new();
        accumulator.update(b"hel");
        accumulator.update(b"lo\n");
        assert_eq!(accumulator.finalize(), ContentDigest::of(b"hello\n"));
    }

    #[tokio::test]
    async fn test_digest_file_spans_multiple_blocks() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("big.bin");
        let content: Vec<u8> = (0..DIGEST_BLOCK_SIZE * 3 + 17)
            .map(|i| (i % 251) as u8)
            .collect();
        std::fs::write(&path, &content).unwrap();

        let digest = digest_file(&path).await.unwrap();
        assert_eq!(digest, ContentDigest::of(&content));
    }

    #[tokio::test]
    async fn test_digest_file_missing_returns_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let err = digest_file(&temp_dir.path().join("missing")).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }

    #[test]
    fn test_display_is_hex() {
        let digest = ContentDigest::of(b"");
        assert_eq!(format!("{digest}"), EMPTY_SHA256);
    }
}
