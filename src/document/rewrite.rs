//! Substitutes local paths for references and writes the localized copy.

use std::io::{ErrorKind, Write};
use std::path::{MAIN_SEPARATOR, Path, PathBuf};

use tracing::{debug, info};

use super::DocumentError;
use crate::download::ResultMapping;

const LOCALIZED_SUFFIX: &str = "-localMedia";

/// Replaces every mapped reference in `text` with its local path.
///
/// Substitution is a single left-to-right pass: replaced text is never
/// re-scanned, and where references overlap the longest match wins. Paths
/// are written with `/` separators.
#[must_use]
pub fn rewrite_references(text: &str, mapping: &ResultMapping) -> String {
    if mapping.is_empty() {
        return text.to_string();
    }

    let mut keys: Vec<(&str, &Path)> = mapping.iter().filter(|(k, _)| !k.is_empty()).collect();
    keys.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(b.0)));

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(ch) = rest.chars().next() {
        match keys.iter().find(|(key, _)| rest.starts_with(key)) {
            Some((key, path)) => {
                out.push_str(&render_path(path));
                rest = &rest[key.len()..];
            }
            None => {
                out.push(ch);
                rest = &rest[ch.len_utf8()..];
            }
        }
    }
    out
}

fn render_path(path: &Path) -> String {
    let rendered = path.to_string_lossy();
    if MAIN_SEPARATOR == '/' {
        rendered.into_owned()
    } else {
        rendered.replace(MAIN_SEPARATOR, "/")
    }
}

/// Name of the `n`-th localized copy of `source`: `{stem}-localMedia.md`
/// for `n == 0`, `{stem}-localMedia-{n}.md` otherwise.
#[must_use]
pub fn localized_document_name(source: &Path, n: usize) -> PathBuf {
    let stem = source
        .file_stem()
        .map_or_else(|| "document".into(), |s| s.to_string_lossy());
    let name = if n == 0 {
        format!("{stem}{LOCALIZED_SUFFIX}.md")
    } else {
        format!("{stem}{LOCALIZED_SUFFIX}-{n}.md")
    };
    source.with_file_name(name)
}

/// Writes `text` as the first free localized copy next to `source`.
///
/// The text goes to a temporary file in the same directory, which is then
/// renamed without replacing anything. The source is never modified.
///
/// # Errors
///
/// Returns [`DocumentError::Io`] if the temporary file cannot be written or
/// renamed.
pub fn write_localized_document(source: &Path, text: &str) -> Result<PathBuf, DocumentError> {
    let dir = match source.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = tempfile::Builder::new()
        .prefix(".mdlocal-")
        .suffix(".md")
        .tempfile_in(dir)
        .map_err(|e| DocumentError::io(dir, e))?;
    temp.write_all(text.as_bytes())
        .and_then(|()| temp.flush())
        .map_err(|e| DocumentError::io(temp.path(), e))?;
    debug!(temp = %temp.path().display(), "wrote temporary document");

    let mut n = 0;
    loop {
        let target = localized_document_name(source, n);
        match temp.persist_noclobber(&target) {
            Ok(_) => {
                info!(source = %source.display(), path = %target.display(), "wrote localized document");
                return Ok(target);
            }
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
                temp = e.file;
                n += 1;
            }
            Err(e) => return Err(DocumentError::io(target, e.error)),
        }
    }
}
