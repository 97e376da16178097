//! mdlocal library
//!
//! Localizes the remote media referenced by Markdown documents: every image
//! reference is downloaded once into a media folder, duplicate content is
//! detected by digest, and a rewritten copy of the document points at the
//! local files.
//!
//! # Architecture
//!
//! - [`document`] - Markdown discovery, reference extraction and rewriting
//! - [`download`] - Fetching, media gating, naming and the dedup store
//! - [`reference`] - Reference text and the URL it is fetched from
//! - [`config`] - Layered run configuration

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod document;
pub mod download;
pub mod reference;
#[cfg(test)]
mod test_support;
mod user_agent;

// Re-export commonly used types
pub use config::{ConfigError, FileConfig, LocalizeConfig};
pub use document::{DocumentError, extract_image_references, rewrite_references};
pub use download::{
    DEFAULT_CONCURRENCY, DedupStore, DownloadEngine, DownloadError, EngineError, HttpClient,
    MediaTypeFilter, ResultMapping, RunReport,
};
pub use reference::ResourceReference;
