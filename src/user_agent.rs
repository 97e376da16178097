//! User-Agent string sent with every media request.

/// Project URL for User-Agent identification (RFC 9308).
const PROJECT_UA_URL: &str = "https://github.com/fierce/mdlocal";

/// Default User-Agent for download requests (identifies the tool).
#[must_use]
pub(crate) fn default_download_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("mdlocal/{version} (markdown-media-localizer; +{PROJECT_UA_URL})")
}
