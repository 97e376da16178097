//! Error types for document handling.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while finding, reading or writing documents.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// An input path does not exist.
    #[error("no such file or directory: {path}")]
    NotFound {
        /// The missing path.
        path: PathBuf,
    },

    /// File system error while reading or writing a document.
    #[error("IO error at {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl DocumentError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
