//! Content-addressed collision resolution inside the target directory.
//!
//! The store never overwrites: a payload is moved into place with a
//! no-clobber rename, and every collision is settled by digesting the file
//! that is already there. No in-memory index is kept; files from earlier
//! runs and from concurrent tasks are treated alike.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use super::digest::digest_file;
use super::filename::disambiguated_name;
use super::{ContentDigest, DownloadError, FetchedPayload};

/// How a payload ended up at its final path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreDisposition {
    /// Renamed to the candidate name.
    New,
    /// Renamed to `{stem}_{digest}{ext}` because the candidate name held
    /// different bytes.
    Disambiguated,
    /// Identical bytes were already on disk; the payload was deleted.
    AlreadyPresent,
}

/// A file inside the target directory and the digest of its bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Final location.
    pub path: PathBuf,
    /// Digest of the bytes at `path`.
    pub digest: ContentDigest,
    /// Whether the bytes were written by this call.
    pub disposition: StoreDisposition,
}

/// Decides where fetched bytes live inside one target directory.
#[derive(Debug, Clone)]
pub struct DedupStore {
    dir: PathBuf,
}

impl DedupStore {
    /// Creates a store rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The target directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Moves `payload` to `file_name`, or resolves the collision.
    ///
    /// 1. Nothing at the candidate: rename there.
    /// 2. Same digest at the candidate: delete the payload, reuse the file.
    /// 3. Different digest: retry once under `{stem}_{digest}{ext}`, where
    ///    an identical file is reused as in case 2.
    ///
    /// Exactly one of rename or delete happens to the temporary file.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Io`] if a rename or digest read fails, and
    /// [`DownloadError::NameConflict`] if the digest-qualified name is also
    /// taken by different bytes. The temporary file is removed in both cases.
    pub async fn store(
        &self,
        payload: FetchedPayload,
        file_name: &str,
    ) -> Result<StoredFile, DownloadError> {
        let digest = *payload.digest();
        let mut temp = payload.into_temp_path();

        let candidate = self.dir.join(file_name);
        let disambiguated = self.dir.join(disambiguated_name(file_name, &digest));

        for (path, fresh) in [
            (&candidate, StoreDisposition::New),
            (&disambiguated, StoreDisposition::Disambiguated),
        ] {
            match temp.persist_noclobber(path) {
                Ok(()) => {
                    info!(path = %path.display(), digest = %digest, "saved file");
                    return Ok(StoredFile {
                        path: path.clone(),
                        digest,
                        disposition: fresh,
                    });
                }
                Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
                    temp = e.path;
                }
                Err(e) => {
                    let _ = e.path.close();
                    return Err(DownloadError::io(path, e.error));
                }
            }

            let existing = match digest_file(path).await {
                Ok(existing) => existing,
                Err(e) => {
                    let _ = temp.close();
                    return Err(DownloadError::io(path, e));
                }
            };

            if existing == digest {
                debug!(path = %path.display(), "digest equal, deleting downloaded copy");
                temp.close().map_err(|e| DownloadError::io(path, e))?;
                return Ok(StoredFile {
                    path: path.clone(),
                    digest,
                    disposition: StoreDisposition::AlreadyPresent,
                });
            }

            debug!(
                path = %path.display(),
                existing = %existing,
                new = %digest,
                "existing file differs"
            );
        }

        let _ = temp.close();
        Err(DownloadError::name_conflict(disambiguated, digest.to_hex()))
    }
}
