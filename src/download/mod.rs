//! Media download pipeline: fetch, classify, name and deduplicate.
//!
//! Each reference becomes one task. A task streams the response body into a
//! private temporary file inside the target directory while computing its
//! SHA-256 digest, resolves a filename and media type, then hands the bytes
//! to the [`DedupStore`], which settles name collisions by content.
//!
//! # Example
//!
//! ```no_run
//! use mdlocal::download::{DownloadEngine, HttpClient};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = DownloadEngine::new(5, Arc::new(HttpClient::new()))?;
//! let report = engine
//!     .run(["https://example.com/figure.png"], Path::new("./Media"))
//!     .await?;
//! for (reference, path) in report.mapping().iter() {
//!     println!("{reference} -> {}", path.display());
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod constants;
mod digest;
mod engine;
mod error;
mod filename;
mod media_type;
mod payload;
mod store;

pub use client::{ContentFetcher, HttpClient};
pub use constants::CONNECT_TIMEOUT_SECS;
pub use digest::{ContentDigest, DigestAccumulator, digest_file};
pub use engine::{
    DEFAULT_CONCURRENCY, DownloadEngine, DownloadTask, EngineError, ResultMapping, RunReport,
    RunStats, TaskState,
};
pub use error::{DownloadError, FailureKind};
pub use filename::{ResponseMetadata, disambiguated_name, resolve_filename, split_extension};
pub use media_type::{
    DEFAULT_ALLOWED_MEDIA_TYPES, MediaTypeFilter, essence, media_type_from_extension,
    resolve_media_type,
};
pub use payload::{FetchedPayload, is_temp_file_name};
pub use store::{DedupStore, StoreDisposition, StoredFile};
