//! Fetched payloads: bytes parked in a private temporary file.
//!
//! A payload lives for exactly one task. Its temporary file sits inside the
//! target directory (so the final rename never crosses filesystems) and is
//! deleted automatically if the payload is dropped without being stored,
//! discarded or retained.

use std::path::{Path, PathBuf};

use tempfile::{NamedTempFile, TempPath};
use tokio::io::AsyncWriteExt;

use super::constants::{TEMP_FILE_PREFIX, TEMP_FILE_RANDOM_LEN, TEMP_FILE_SUFFIX};
use super::filename::ResponseMetadata;
use super::{ContentDigest, DownloadError};

/// Downloaded bytes awaiting a dedup decision.
#[derive(Debug)]
pub struct FetchedPayload {
    temp: TempPath,
    digest: ContentDigest,
    bytes: u64,
    metadata: ResponseMetadata,
}

impl FetchedPayload {
    pub(crate) fn new(
        temp: TempPath,
        digest: ContentDigest,
        bytes: u64,
        metadata: ResponseMetadata,
    ) -> Self {
        Self {
            temp,
            digest,
            bytes,
            metadata,
        }
    }

    /// Writes an in-memory buffer to a fresh temporary file in `dir`.
    ///
    /// Meant for [`ContentFetcher`](super::ContentFetcher) implementations
    /// that do not stream.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Io`] if the temporary file cannot be created
    /// or written.
    pub async fn from_bytes(
        dir: &Path,
        bytes: &[u8],
        metadata: ResponseMetadata,
    ) -> Result<Self, DownloadError> {
        let (file, temp) = create_temp_file(dir)?.into_parts();
        let mut file = tokio::fs::File::from_std(file);
        file.write_all(bytes)
            .await
            .map_err(|e| DownloadError::io(temp.to_path_buf(), e))?;
        file.flush()
            .await
            .map_err(|e| DownloadError::io(temp.to_path_buf(), e))?;
        Ok(Self::new(
            temp,
            ContentDigest::of(bytes),
            bytes.len() as u64,
            metadata,
        ))
    }

    /// Current location of the temporary file.
    #[must_use]
    pub fn temp_path(&self) -> &Path {
        &self.temp
    }

    /// Digest of the fetched bytes.
    #[must_use]
    pub fn digest(&self) -> &ContentDigest {
        &self.digest
    }

    /// Number of bytes fetched.
    #[must_use]
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Response metadata captured with the bytes.
    #[must_use]
    pub fn metadata(&self) -> &ResponseMetadata {
        &self.metadata
    }

    /// Deletes the temporary file now, reporting failures.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Io`] if the file cannot be removed.
    pub fn discard(self) -> Result<(), DownloadError> {
        let path = self.temp.to_path_buf();
        self.temp.close().map_err(|e| DownloadError::io(path, e))
    }

    /// Keeps the temporary file on disk under its temporary name.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Io`] if the file can no longer be kept.
    pub fn retain(self) -> Result<PathBuf, DownloadError> {
        let path = self.temp.to_path_buf();
        self.temp
            .keep()
            .map_err(|e| DownloadError::io(path, e.error))
    }

    pub(crate) fn into_temp_path(self) -> TempPath {
        self.temp
    }
}

/// Creates a uniquely named temporary file in `dir`.
///
/// Creation is exclusive; on a name collision a new random name is drawn.
pub(crate) fn create_temp_file(dir: &Path) -> Result<NamedTempFile, DownloadError> {
    tempfile::Builder::new()
        .prefix(TEMP_FILE_PREFIX)
        .suffix(TEMP_FILE_SUFFIX)
        .rand_bytes(TEMP_FILE_RANDOM_LEN)
        .tempfile_in(dir)
        .map_err(|e| DownloadError::io(dir, e))
}

/// Returns true for names produced by [`create_temp_file`].
#[must_use]
pub fn is_temp_file_name(name: &str) -> bool {
    name.starts_with(TEMP_FILE_PREFIX) && name.ends_with(TEMP_FILE_SUFFIX)
}
