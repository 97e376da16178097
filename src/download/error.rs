//! Error types for the download module.
//!
//! This module defines structured errors for all task-level operations
//! (fetch, name resolution, dedup store), providing context-rich error
//! messages for logging and the run report.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while processing a single download task.
///
/// None of these abort a batch: the coordinator records the task as failed
/// and carries on with the remaining references.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// HTTP error response (4xx client errors, 5xx server errors).
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The provided URL is malformed or uses an unsupported scheme.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// File system error (temp file create, write, digest read, rename).
    #[error("IO error at {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Both the resolved name and its digest-qualified name are taken by
    /// files with different content.
    #[error("name conflict at {path}: existing file has different content (digest {digest})")]
    NameConflict {
        /// The digest-qualified path that is already occupied.
        path: PathBuf,
        /// Hex digest of the bytes that could not be stored.
        digest: String,
    },
}

/// Coarse failure classification used in logs and the run report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Transport or protocol failure while fetching.
    Fetch,
    /// Local filesystem failure while writing, reading or renaming.
    Filesystem,
}

impl DownloadError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a name conflict error.
    pub fn name_conflict(path: impl Into<PathBuf>, digest: impl Into<String>) -> Self {
        Self::NameConflict {
            path: path.into(),
            digest: digest.into(),
        }
    }

    /// Classifies the error as a fetch or filesystem failure.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Network { .. }
            | Self::Timeout { .. }
            | Self::HttpStatus { .. }
            | Self::InvalidUrl { .. } => FailureKind::Fetch,
            Self::Io { .. } | Self::NameConflict { .. } => FailureKind::Filesystem,
        }
    }
}

// No `From<reqwest::Error>` / `From<std::io::Error>`: every variant needs the
// url or path the source error does not carry. Use the constructors above.
