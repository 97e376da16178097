//! Expands command-line paths into the list of documents to process.

use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::DocumentError;

const MARKDOWN_EXTENSION: &str = "md";

/// Collects the documents named by `paths`.
///
/// A file is taken as-is whatever its extension. A directory contributes its
/// direct `*.md` children; subdirectories are not descended into. The result
/// is sorted and free of duplicates.
///
/// # Errors
///
/// Returns [`DocumentError::NotFound`] for a path that does not exist and
/// [`DocumentError::Io`] if a directory cannot be listed.
pub fn collect_markdown_files<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<PathBuf>, DocumentError> {
    let mut files = BTreeSet::new();

    for path in paths {
        let path = path.as_ref();
        let metadata = fs::metadata(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => DocumentError::NotFound {
                path: path.to_path_buf(),
            },
            _ => DocumentError::io(path, e),
        })?;

        if !metadata.is_dir() {
            files.insert(path.to_path_buf());
            continue;
        }

        let entries = fs::read_dir(path).map_err(|e| DocumentError::io(path, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| DocumentError::io(path, e))?;
            let candidate = entry.path();
            let is_markdown = candidate
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(MARKDOWN_EXTENSION));
            if is_markdown && candidate.is_file() {
                files.insert(candidate);
            }
        }
    }

    debug!(count = files.len(), "collected markdown files");
    Ok(files.into_iter().collect())
}

/// Reads a document as UTF-8 text.
///
/// # Errors
///
/// Returns [`DocumentError::Io`] if the file cannot be read or is not UTF-8.
pub fn read_document(path: &Path) -> Result<String, DocumentError> {
    fs::read_to_string(path).map_err(|e| DocumentError::io(path, e))
}
