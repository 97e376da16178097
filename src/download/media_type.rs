//! Media type guessing and allow-list gating.
//!
//! Fetched payloads are classified by their declared `Content-Type` when the
//! server sends a meaningful one, otherwise by the extension of the resolved
//! file name. Only types matching the configured allow-list are stored.

use serde::{Deserialize, Serialize};

/// Generic type servers send when they do not know better.
const OCTET_STREAM: &str = "application/octet-stream";

/// Default allow-list: images and PDF documents.
pub const DEFAULT_ALLOWED_MEDIA_TYPES: &[&str] = &["image/*", "application/pdf"];

/// Returns the lowercase `type/subtype` part of a Content-Type value.
///
/// Parameters such as `charset` are dropped. Returns `None` for values that
/// are empty or have no `/`.
#[must_use]
pub fn essence(content_type: &str) -> Option<String> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    let (kind, subtype) = mime.split_once('/')?;
    if kind.is_empty() || subtype.is_empty() {
        return None;
    }
    Some(mime)
}

/// Guesses a media type from a file extension (with or without leading dot).
#[must_use]
pub fn media_type_from_extension(extension: &str) -> Option<&'static str> {
    let ext = extension.trim_start_matches('.').to_ascii_lowercase();
    let mime = match ext.as_str() {
        "jpg" | "jpeg" | "jpe" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "bmp" => "image/bmp",
        "ico" => "image/vnd.microsoft.icon",
        "tif" | "tiff" => "image/tiff",
        "avif" => "image/avif",
        "heic" => "image/heic",
        "pdf" => "application/pdf",
        "html" | "htm" => "text/html",
        "txt" => "text/plain",
        "css" => "text/css",
        "js" => "text/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mp3" => "audio/mpeg",
        _ => return None,
    };
    Some(mime)
}

/// Resolves the media type used for gating.
///
/// The declared Content-Type wins unless it is missing, unparsable or the
/// generic `application/octet-stream`; then the file name's extension decides.
#[must_use]
pub fn resolve_media_type(declared: Option<&str>, file_name: &str) -> Option<String> {
    if let Some(mime) = declared.and_then(essence)
        && mime != OCTET_STREAM
    {
        return Some(mime);
    }

    let (_, ext) = super::filename::split_extension(file_name);
    media_type_from_extension(ext).map(str::to_string)
}

/// Allow-list of media type patterns (`image/*`, `application/pdf`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaTypeFilter {
    patterns: Vec<String>,
}

impl Default for MediaTypeFilter {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOWED_MEDIA_TYPES.iter().copied())
    }
}

impl MediaTypeFilter {
    /// Builds a filter from patterns; matching is case-insensitive.
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| p.as_ref().trim().to_ascii_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// Returns the normalized patterns.
    #[must_use]
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Returns true if the media type matches any pattern.
    ///
    /// `type/*` matches every subtype of `type`; `*/*` and `*` match anything.
    #[must_use]
    pub fn allows(&self, media_type: &str) -> bool {
        let Some(mime) = essence(media_type) else {
            return false;
        };
        let (kind, _) = mime.split_once('/').unwrap_or((mime.as_str(), ""));
        self.patterns.iter().any(|pattern| match pattern.as_str() {
            "*" | "*/*" => true,
            p => match p.strip_suffix("/*") {
                Some(prefix) => prefix == kind,
                None => p == mime,
            },
        })
    }
}
