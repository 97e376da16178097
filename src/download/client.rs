//! HTTP client wrapper for fetching remote media.
//!
//! This module provides the `HttpClient` struct which performs one streamed
//! GET per resource, writing the body to a private temporary file while the
//! content digest is computed on the fly.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE, HeaderMap, HeaderName};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, instrument};
use url::Url;

use super::constants::CONNECT_TIMEOUT_SECS;
use super::digest::DigestAccumulator;
use super::error::DownloadError;
use super::filename::ResponseMetadata;
use super::payload::{FetchedPayload, create_temp_file};
use crate::user_agent;

/// Source of fetched payloads.
///
/// [`HttpClient`] is the production implementation; the coordinator only
/// depends on this trait.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Fetches `url` into a fresh temporary file inside `dir`.
    ///
    /// A single attempt: no retries. On failure no temporary file remains.
    async fn fetch(&self, url: &str, dir: &Path) -> Result<FetchedPayload, DownloadError>;
}

/// HTTP client for fetching files with streaming support.
///
/// This client is designed to be created once and reused for all tasks of a
/// run, taking advantage of connection pooling.
///
/// # Example
///
/// ```no_run
/// use mdlocal::download::HttpClient;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = HttpClient::new();
/// let payload = client
///     .fetch_to_temp("https://example.com/diagram.png", Path::new("./Media"))
///     .await?;
/// println!("{} bytes, sha256 {}", payload.bytes(), payload.digest());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a new HTTP client with the default connect timeout and no
    /// read timeout.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    pub fn new() -> Self {
        Self::new_with_timeouts(CONNECT_TIMEOUT_SECS, None)
    }

    /// Creates a new HTTP client with explicit timeout values.
    ///
    /// `read_timeout_secs` bounds the idle time between body chunks; `None`
    /// leaves individual fetches unbounded.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the supplied
    /// timeout configuration.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new_with_timeouts(connect_timeout_secs: u64, read_timeout_secs: Option<u64>) -> Self {
        let client = build_client(connect_timeout_secs, read_timeout_secs)
            .expect("failed to build HTTP client with static configuration");
        Self { client }
    }

    /// Streams `url` into a temporary file inside `dir`.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` if:
    /// - The URL is invalid or not HTTP(S)
    /// - The request fails (network error, timeout)
    /// - The server returns an error status (4xx, 5xx)
    /// - Creating or writing the temporary file fails
    ///
    /// The partial temporary file is removed before any error is returned.
    #[instrument(skip(self, dir), fields(url = %url))]
    pub async fn fetch_to_temp(
        &self,
        url: &str,
        dir: &Path,
    ) -> Result<FetchedPayload, DownloadError> {
        debug!("starting fetch");

        let parsed_url = Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;
        if !matches!(parsed_url.scheme(), "http" | "https") {
            return Err(DownloadError::invalid_url(url));
        }

        let response = self.send_request(url).await?;
        let metadata = response_metadata(&response);

        let (std_file, temp_path) = create_temp_file(dir)?.into_parts();
        let mut file = File::from_std(std_file);
        debug!(temp = %temp_path.display(), "streaming into temporary file");

        let mut digest = DigestAccumulator::new();
        let stream_result = stream_to_file(&mut file, response, url, &temp_path, &mut digest).await;
        drop(file);

        let bytes = match stream_result {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(path = %temp_path.display(), "cleaning up partial file after error");
                let _ = temp_path.close();
                return Err(e);
            }
        };

        let digest = digest.finalize();
        debug!(bytes, digest = %digest, "fetch complete");

        Ok(FetchedPayload::new(temp_path, digest, bytes, metadata))
    }

    async fn send_request(&self, url: &str) -> Result<reqwest::Response, DownloadError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                DownloadError::timeout(url)
            } else {
                DownloadError::network(url, e)
            }
        })?;

        if !response.status().is_success() {
            return Err(DownloadError::http_status(url, response.status().as_u16()));
        }

        Ok(response)
    }

    /// Returns a reference to the underlying reqwest client.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl ContentFetcher for HttpClient {
    async fn fetch(&self, url: &str, dir: &Path) -> Result<FetchedPayload, DownloadError> {
        self.fetch_to_temp(url, dir).await
    }
}

/// Streams response body to file, feeding every chunk to the digest.
///
/// This is extracted to enable cleanup on error in the caller.
async fn stream_to_file(
    file: &mut File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
    digest: &mut DigestAccumulator,
) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| {
            if e.is_timeout() {
                DownloadError::timeout(url)
            } else {
                DownloadError::network(url, e)
            }
        })?;

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(file_path, e))?;
        digest.update(&chunk);

        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(file_path, e))?;

    Ok(bytes_written)
}

fn response_metadata(response: &reqwest::Response) -> ResponseMetadata {
    let headers = response.headers();
    ResponseMetadata {
        content_type: header_string(headers, &CONTENT_TYPE),
        content_disposition: header_string(headers, &CONTENT_DISPOSITION),
        final_url: Some(response.url().to_string()),
    }
}

fn header_string(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn build_client(
    connect_timeout_secs: u64,
    read_timeout_secs: Option<u64>,
) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .connect_timeout(Duration::from_secs(connect_timeout_secs))
        .gzip(true)
        .user_agent(user_agent::default_download_user_agent());
    if let Some(secs) = read_timeout_secs {
        builder = builder.read_timeout(Duration::from_secs(secs));
    }
    builder.build()
}
