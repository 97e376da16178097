//! Markdown documents: discovery, reference extraction and rewriting.
//!
//! Documents are read whole, scanned for remote image references, and
//! written back as a sibling `{stem}-localMedia.md` copy. The source file is
//! never modified.

mod discover;
mod error;
mod extract;
mod rewrite;

pub use discover::{collect_markdown_files, read_document};
pub use error::DocumentError;
pub use extract::extract_image_references;
pub use rewrite::{localized_document_name, rewrite_references, write_localized_document};
