//! Resource references and the URLs they are fetched from.
//!
//! A reference is the link text exactly as it appears in a document. Most
//! references are fetched as-is; references that embed a full secondary URL
//! behind an archive marker (`https://archive.host/web/<timestamp>/https://origin/...`)
//! are fetched from the embedded URL.

use std::collections::HashSet;

use serde::Serialize;

/// Path segment that introduces an archived copy of another URL.
const ARCHIVE_MARKER: &str = "/web/";

/// A remote resource as referenced by a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ResourceReference {
    reference: String,
    fetch_url: String,
}

impl ResourceReference {
    /// Creates a reference and derives its fetch URL.
    pub fn new(reference: impl Into<String>) -> Self {
        let reference = reference.into();
        let fetch_url = derive_fetch_url(&reference);
        Self {
            reference,
            fetch_url,
        }
    }

    /// The literal reference text.
    #[must_use]
    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// The URL the bytes are fetched from.
    #[must_use]
    pub fn fetch_url(&self) -> &str {
        &self.fetch_url
    }
}

/// Derives the fetch URL for a reference.
///
/// For `…/web/<timestamp>/http(s)://…` the embedded URL is returned;
/// otherwise the reference itself.
#[must_use]
pub fn derive_fetch_url(reference: &str) -> String {
    let Some(scheme_end) = reference.find("://") else {
        return reference.to_string();
    };
    let rest = &reference[scheme_end + 3..];

    let Some(marker_pos) = rest.find(ARCHIVE_MARKER) else {
        return reference.to_string();
    };
    let after_marker = &rest[marker_pos + ARCHIVE_MARKER.len()..];

    // skip the timestamp segment (e.g. `20200101000000` or `20200101000000im_`)
    let Some((timestamp, embedded)) = after_marker.split_once('/') else {
        return reference.to_string();
    };
    if timestamp.is_empty() || !timestamp.starts_with(|c: char| c.is_ascii_digit()) {
        return reference.to_string();
    }

    if embedded.starts_with("http://") || embedded.starts_with("https://") {
        embedded.to_string()
    } else {
        reference.to_string()
    }
}

/// Removes repeated references, keeping first-seen order.
pub fn dedupe_references<I, S>(references: I) -> Vec<ResourceReference>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut seen = HashSet::new();
    references
        .into_iter()
        .map(|reference| -> String { reference.into() })
        .filter(|reference| seen.insert(reference.clone()))
        .map(ResourceReference::new)
        .collect()
}
