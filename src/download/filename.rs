//! Filename extraction and sanitization for fetched resources.
//!
//! Candidate names are derived from response metadata with a fixed fallback
//! order (see [`resolve_filename`]); every value that comes from the network
//! is reduced to a bare, filesystem-safe file name before use.

use std::path::{Component, Path};

use url::Url;

use super::ContentDigest;

/// Longest file name, in bytes, accepted by common filesystems.
const MAX_NAME_BYTES: usize = 255;

/// Longest extension kept, dot included.
const MAX_EXTENSION_BYTES: usize = 16;

/// Room reserved for the `_{digest-hex}` suffix of a disambiguated name.
const DIGEST_SUFFIX_BYTES: usize = 1 + 64;

/// Response metadata consulted when naming a fetched resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseMetadata {
    /// Raw `Content-Type` header value, if present.
    pub content_type: Option<String>,
    /// Raw `Content-Disposition` header value, if present.
    pub content_disposition: Option<String>,
    /// URL of the final response after redirects. Its last path segment
    /// names the file when the requested URL's segment does not.
    pub final_url: Option<String>,
}

/// Produces the proposed file name for a fetched resource.
///
/// Order of preference:
/// 1. `filename` parameter of the Content-Disposition header
/// 2. last URL path segment, when it carries an extension
/// 3. last URL path segment plus an extension guessed from Content-Type
/// 4. random name plus the guessed extension
///
/// Steps 2 and 3 look at `url` first, then at the final URL after redirects.
///
/// Never returns an empty string or a name with directory components, and
/// leaves room for a digest suffix within 255 bytes.
#[must_use]
pub fn resolve_filename(metadata: &ResponseMetadata, url: &str) -> String {
    if let Some(name) = metadata
        .content_disposition
        .as_deref()
        .and_then(parse_content_disposition)
        .and_then(|raw| bare_filename(&raw))
    {
        return limit_stem(&name);
    }

    let guessed_ext = metadata
        .content_type
        .as_deref()
        .and_then(extension_from_content_type)
        .unwrap_or(".bin");

    let segments: Vec<String> = [Some(url), metadata.final_url.as_deref()]
        .into_iter()
        .flatten()
        .filter_map(|candidate| Url::parse(candidate).ok())
        .filter_map(|parsed| last_path_segment(&parsed))
        .collect();

    if let Some(segment) = segments
        .iter()
        .find(|segment| !split_extension(segment).1.is_empty())
    {
        return limit_stem(segment);
    }
    if let Some(segment) = segments.first() {
        return limit_stem(&format!("{segment}{guessed_ext}"));
    }

    format!("{}{guessed_ext}", random_stem())
}

/// Decoded and sanitized last path segment, if non-empty.
fn last_path_segment(url: &Url) -> Option<String> {
    let last = url.path_segments()?.next_back()?;
    if last.is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(last).map_or_else(|_| last.to_string(), |d| d.into_owned());
    bare_filename(&decoded)
}

/// Reduces an untrusted name to a safe file name without directory parts.
///
/// Returns `None` if nothing meaningful survives sanitization.
pub(crate) fn bare_filename(raw: &str) -> Option<String> {
    let last = raw.rsplit(['/', '\\']).next().unwrap_or("").trim();
    let sanitized = sanitize_filename(last);
    if sanitized.trim_matches(['_', '.']).is_empty() {
        return None;
    }
    Some(sanitized)
}

/// Splits a file name into stem and extension (extension keeps its dot).
///
/// Leading dots belong to the stem, so `.hidden` has no extension.
#[must_use]
pub fn split_extension(name: &str) -> (&str, &str) {
    let body_start = name.len() - name.trim_start_matches('.').len();
    match name[body_start..].rfind('.') {
        Some(pos) if body_start + pos + 1 < name.len() => {
            (&name[..body_start + pos], &name[body_start + pos..])
        }
        _ => (name, ""),
    }
}

/// Builds `{stem}_{digest-hex}{extension}` for a name collision.
///
/// The stem is shortened when needed so the result fits in 255 bytes.
#[must_use]
pub fn disambiguated_name(name: &str, digest: &ContentDigest) -> String {
    let (stem, ext) = fit_stem_and_extension(name);
    format!("{stem}_{}{ext}", digest.to_hex())
}

fn limit_stem(name: &str) -> String {
    let (stem, ext) = fit_stem_and_extension(name);
    format!("{stem}{ext}")
}

/// Stem and extension cut to byte budgets that leave room for the digest
/// suffix.
fn fit_stem_and_extension(name: &str) -> (&str, &str) {
    let (stem, ext) = split_extension(name);
    let ext = truncate_to_bytes(ext, MAX_EXTENSION_BYTES);
    let stem = truncate_to_bytes(stem, MAX_NAME_BYTES - DIGEST_SUFFIX_BYTES - ext.len());
    (stem, ext)
}

/// Longest prefix of `s` within `max` bytes, cut on a character boundary.
fn truncate_to_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

fn random_stem() -> String {
    format!("{:032x}", rand::random::<u128>())
}

/// Guess file extension from Content-Type header.
pub(crate) fn extension_from_content_type(content_type: &str) -> Option<&'static str> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase();

    let ext = match mime.as_str() {
        "image/jpeg" | "image/pjpeg" => ".jpg",
        "image/png" => ".png",
        "image/gif" => ".gif",
        "image/webp" => ".webp",
        "image/svg+xml" => ".svg",
        "image/bmp" => ".bmp",
        "image/tiff" => ".tiff",
        "image/avif" => ".avif",
        "image/vnd.microsoft.icon" | "image/x-icon" => ".ico",
        "application/pdf" => ".pdf",
        "text/html" => ".html",
        "text/plain" => ".txt",
        "application/json" => ".json",
        "application/xml" | "text/xml" => ".xml",
        "application/zip" => ".zip",
        "application/gzip" => ".gz",
        "text/css" => ".css",
        "text/javascript" | "application/javascript" => ".js",
        "video/mp4" => ".mp4",
        "audio/mpeg" => ".mp3",
        _ => return None,
    };
    Some(ext)
}

/// Parses Content-Disposition header to extract filename.
///
/// Handles both:
/// - `attachment; filename="example.png"`
/// - `attachment; filename=example.png`
/// - `attachment; filename*=UTF-8''example.png` (RFC 5987)
pub(crate) fn parse_content_disposition(header: &str) -> Option<String> {
    // filename*= first (RFC 5987 encoded)
    if let Some(pos) = header.find("filename*=") {
        let value = header[pos + 10..].trim();
        // charset'language'encoded_value
        if let Some(quote_pos) = value.find("''") {
            let encoded = &value[quote_pos + 2..];
            let end = encoded.find(';').unwrap_or(encoded.len());
            let encoded_name = encoded[..end].trim().trim_matches('"');
            if let Ok(decoded) = urlencoding::decode(encoded_name)
                && !decoded.trim().is_empty()
            {
                return Some(decoded.into_owned());
            }
        }
    }

    if let Some(pos) = header.find("filename=") {
        let value = header[pos + 9..].trim();

        if let Some(stripped) = value.strip_prefix('"') {
            if let Some(end) = stripped.find('"') {
                let name = stripped[..end].trim();
                if !name.is_empty() {
                    return Some(name.to_string());
                }
            }
        } else {
            // Unquoted (or single-quoted) - take until ; or end
            let end = value.find(';').unwrap_or(value.len());
            let filename = value[..end].trim().trim_matches('\'').trim();
            if !filename.is_empty() {
                return Some(filename.to_string());
            }
        }
    }

    None
}

/// Sanitizes filename for filesystem safety.
///
/// Replaces characters that are invalid on common filesystems:
/// / \ : * ? " < > |
pub(crate) fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() {
        return "_".to_string();
    }

    if is_safe_filename_segment(&sanitized) {
        sanitized
    } else {
        sanitized
            .chars()
            .map(|c| if c == '.' { '_' } else { c })
            .collect()
    }
}

fn is_safe_filename_segment(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn metadata(content_type: Option<&str>, disposition: Option<&str>) -> ResponseMetadata {
        ResponseMetadata {
            content_type: content_type.map(str::to_string),
            content_disposition: disposition.map(str::to_string),
            final_url: None,
        }
    }

    #[test]
    fn test_sanitize_filename_removes_invalid_chars() {
        assert_eq!(sanitize_filename("file/name.png"), "file_name.png");
        assert_eq!(sanitize_filename("file\\name.png"), "file_name.png");
        assert_eq!(sanitize_filename("file:name.png"), "file_name.png");
        assert_eq!(sanitize_filename("file*name.png"), "file_name.png");
        assert_eq!(sanitize_filename("file?name.png"), "file_name.png");
        assert_eq!(sanitize_filename("file<name>.png"), "file_name_.png");
        assert_eq!(sanitize_filename("file|name.png"), "file_name.png");
    }

    #[test]
    fn test_sanitize_filename_rewrites_dot_segments() {
        assert_eq!(sanitize_filename("."), "_");
        assert_eq!(sanitize_filename(".."), "__");
    }

    #[test]
    fn test_sanitize_filename_preserves_valid_chars() {
        assert_eq!(sanitize_filename("valid-file_name.png"), "valid-file_name.png");
        assert_eq!(sanitize_filename("file (1).png"), "file (1).png");
        assert_eq!(sanitize_filename("日本語.png"), "日本語.png");
    }

    #[test]
    fn test_parse_content_disposition_quoted() {
        let header = r#"attachment; filename="example.png""#;
        assert_eq!(parse_content_disposition(header), Some("example.png".to_string()));
    }

    #[test]
    fn test_parse_content_disposition_unquoted() {
        let header = "attachment; filename=example.png";
        assert_eq!(parse_content_disposition(header), Some("example.png".to_string()));
    }

    #[test]
    fn test_parse_content_disposition_single_quoted() {
        let header = "inline; filename='example.png'";
        assert_eq!(parse_content_disposition(header), Some("example.png".to_string()));
    }

    #[test]
    fn test_parse_content_disposition_with_semicolon() {
        let header = r#"attachment; filename="example.png"; size=1234"#;
        assert_eq!(parse_content_disposition(header), Some("example.png".to_string()));
    }

    #[test]
    fn test_parse_content_disposition_rfc5987() {
        let header = "attachment; filename*=UTF-8''example%20file.png";
        assert_eq!(
            parse_content_disposition(header),
            Some("example file.png".to_string())
        );
    }

    #[test]
    fn test_parse_content_disposition_missing() {
        assert_eq!(parse_content_disposition("attachment"), None);
        assert_eq!(parse_content_disposition(r#"attachment; filename="""#), None);
    }

    #[test]
    fn test_resolve_filename_prefers_content_disposition() {
        let meta = metadata(
            Some("image/png"),
            Some(r#"attachment; filename="diagram.png""#),
        );
        assert_eq!(
            resolve_filename(&meta, "https://example.com/img/other.jpg"),
            "diagram.png"
        );
    }

    #[test]
    fn test_resolve_filename_strips_directories_from_header() {
        let meta = metadata(None, Some(r#"attachment; filename="../../etc/passwd""#));
        assert_eq!(resolve_filename(&meta, "https://example.com/a.png"), "passwd");

        let meta = metadata(None, Some(r#"attachment; filename="..\\..\\boot.ini""#));
        assert_eq!(resolve_filename(&meta, "https://example.com/a.png"), "boot.ini");
    }

    #[test]
    fn test_resolve_filename_ignores_dot_only_header_value() {
        let meta = metadata(Some("image/png"), Some(r#"attachment; filename="..""#));
        assert_eq!(resolve_filename(&meta, "https://example.com/a.png"), "a.png");
    }

    #[test]
    fn test_resolve_filename_uses_url_segment_with_extension() {
        let meta = metadata(Some("image/jpeg"), None);
        assert_eq!(
            resolve_filename(&meta, "https://example.com/img/photo.png?size=large"),
            "photo.png"
        );
    }

    #[test]
    fn test_resolve_filename_decodes_url_segment() {
        let meta = metadata(None, None);
        assert_eq!(
            resolve_filename(&meta, "https://example.com/my%20photo.png"),
            "my photo.png"
        );
    }

    #[test]
    fn test_resolve_filename_appends_guessed_extension() {
        let meta = metadata(Some("image/png; charset=binary"), None);
        assert_eq!(
            resolve_filename(&meta, "https://example.com/avatar/12345"),
            "12345.png"
        );
    }

    #[test]
    fn test_resolve_filename_unknown_type_appends_bin() {
        let meta = metadata(Some("application/x-custom"), None);
        assert_eq!(
            resolve_filename(&meta, "https://example.com/blob"),
            "blob.bin"
        );
        let meta = metadata(None, None);
        assert_eq!(resolve_filename(&meta, "https://example.com/blob"), "blob.bin");
    }

    #[test]
    fn test_resolve_filename_random_fallback_for_empty_path() {
        let meta = metadata(Some("image/gif"), None);
        let name = resolve_filename(&meta, "https://example.com/");
        assert!(name.ends_with(".gif"), "unexpected name: {name}");
        let (stem, _) = split_extension(&name);
        assert_eq!(stem.len(), 32);
        assert!(stem.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_resolve_filename_random_fallback_for_unparsable_url() {
        let name = resolve_filename(&ResponseMetadata::default(), "not a url");
        assert!(name.ends_with(".bin"));
        assert!(!name.is_empty());
    }

    #[test]
    fn test_resolve_filename_never_contains_separators() {
        let meta = metadata(None, Some(r#"attachment; filename="a/b\\c.png""#));
        let name = resolve_filename(&meta, "https://example.com/x%2Fy.png");
        assert!(!name.contains('/') && !name.contains('\\'), "got {name}");
        let name = resolve_filename(&metadata(None, None), "https://example.com/x%2Fy.png");
        assert!(!name.contains('/') && !name.contains('\\'), "got {name}");
    }

    #[test]
    fn test_resolve_filename_truncates_long_stems() {
        let long = "a".repeat(400);
        let name = resolve_filename(
            &metadata(None, None),
            &format!("https://example.com/{long}.png"),
        );
        assert!(name.ends_with(".png"));
        assert_eq!(name.len(), MAX_NAME_BYTES - DIGEST_SUFFIX_BYTES);
    }

    #[test]
    fn test_resolve_filename_counts_multibyte_stems_in_bytes() {
        let long = "図".repeat(100);
        let name = resolve_filename(
            &metadata(Some("image/png"), None),
            &format!("https://example.com/{long}.png"),
        );
        assert!(name.ends_with(".png"));
        assert!(name.starts_with('図'));
        assert!(name.len() <= MAX_NAME_BYTES - DIGEST_SUFFIX_BYTES, "{} bytes", name.len());

        let disambiguated = disambiguated_name(&name, &ContentDigest::of(b"x"));
        assert!(disambiguated.len() <= MAX_NAME_BYTES, "{} bytes", disambiguated.len());
        assert!(disambiguated.ends_with(".png"));
    }

    #[test]
    fn test_resolve_filename_caps_extension_length() {
        let ext = "x".repeat(300);
        let name = resolve_filename(
            &metadata(None, None),
            &format!("https://example.com/photo.{ext}"),
        );
        let (stem, kept_ext) = split_extension(&name);
        assert_eq!(stem, "photo");
        assert_eq!(kept_ext.len(), MAX_EXTENSION_BYTES);
    }

    #[test]
    fn test_disambiguated_name_shortens_overlong_names() {
        let name = format!("{}.png", "é".repeat(200));
        let digest = ContentDigest::of(b"bytes");
        let result = disambiguated_name(&name, &digest);
        assert!(result.len() <= MAX_NAME_BYTES);
        assert!(result.ends_with(&format!("_{}.png", digest.to_hex())));
    }

    #[test]
    fn test_resolve_filename_uses_redirect_target_segment() {
        let meta = ResponseMetadata {
            content_type: Some("image/jpeg".to_string()),
            content_disposition: None,
            final_url: Some("https://cdn.example.com/files/photo.png".to_string()),
        };
        assert_eq!(
            resolve_filename(&meta, "https://example.com/download"),
            "photo.png"
        );
    }

    #[test]
    fn test_resolve_filename_prefers_requested_segment_with_extension() {
        let meta = ResponseMetadata {
            content_type: None,
            content_disposition: None,
            final_url: Some("https://cdn.example.com/blob/abc123.webp".to_string()),
        };
        assert_eq!(
            resolve_filename(&meta, "https://example.com/img/cat.png"),
            "cat.png"
        );
    }

    #[test]
    fn test_resolve_filename_redirect_without_extension_keeps_requested_segment() {
        let meta = ResponseMetadata {
            content_type: Some("image/gif".to_string()),
            content_disposition: None,
            final_url: Some("https://cdn.example.com/objects/9f8e".to_string()),
        };
        assert_eq!(
            resolve_filename(&meta, "https://example.com/avatar"),
            "avatar.gif"
        );
    }

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("photo.png"), ("photo", ".png"));
        assert_eq!(split_extension("archive.tar.gz"), ("archive.tar", ".gz"));
        assert_eq!(split_extension("noext"), ("noext", ""));
        assert_eq!(split_extension(".hidden"), (".hidden", ""));
        assert_eq!(split_extension("..hidden.png"), ("..hidden", ".png"));
        assert_eq!(split_extension("trailing."), ("trailing.", ""));
    }

    #[test]
    fn test_disambiguated_name_inserts_digest_before_extension() {
        let digest = ContentDigest::of(b"");
        let hex = digest.to_hex();
        assert_eq!(
            disambiguated_name("photo.png", &digest),
            format!("photo_{hex}.png")
        );
        assert_eq!(disambiguated_name("noext", &digest), format!("noext_{hex}"));
    }

    #[test]
    fn test_extension_from_content_type_images() {
        assert_eq!(extension_from_content_type("image/jpeg"), Some(".jpg"));
        assert_eq!(extension_from_content_type("image/png"), Some(".png"));
        assert_eq!(extension_from_content_type("Image/SVG+XML"), Some(".svg"));
    }

    #[test]
    fn test_extension_from_content_type_strips_parameters() {
        assert_eq!(
            extension_from_content_type("text/html; charset=utf-8"),
            Some(".html")
        );
    }

    #[test]
    fn test_extension_from_content_type_unknown() {
        assert_eq!(extension_from_content_type("application/octet-stream"), None);
        assert_eq!(extension_from_content_type(""), None);
    }

    #[test]
    fn test_bare_filename_rejects_empty_results() {
        assert_eq!(bare_filename("dir/"), None);
        assert_eq!(bare_filename("   "), None);
        assert_eq!(bare_filename("..."), None);
        assert_eq!(bare_filename("dir/ok.png"), Some("ok.png".to_string()));
    }
}
