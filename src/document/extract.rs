//! Finds remote image references in Markdown text.
//!
//! Recognized forms:
//! - inline images: `![alt](src)`, `![alt](<src>)`, `![alt](src "title")`;
//!   a bare `src` may hold one level of balanced parentheses
//! - reference images: `![alt][label]`, `![label][]`, resolved through
//!   `[label]: src` definitions
//! - raw HTML: `<img src="...">`
//!
//! Fenced code blocks are ignored. Only `http://` and `https://` sources are
//! returned.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use tracing::trace;

#[allow(clippy::expect_used)]
static INLINE_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"!\[[^\]]*\]\(\s*(?:<([^>\n]+)>|((?:[^\s()]|\([^\s()]*\))+))(?:\s+(?:"[^"]*"|'[^']*'|\([^)]*\)))?\s*\)"#,
    )
    .expect("inline image regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static REFERENCE_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!\[([^\]]*)\]\[([^\]]*)\]").expect("reference image regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static LINK_DEFINITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^ {0,3}\[([^\]]+)\]:[ \t]*<?([^\s>]+)>?")
        .expect("link definition regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static HTML_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<img\b[^>]*?\bsrc\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#)
        .expect("HTML image regex is valid") // Static pattern, safe to panic
});

/// Returns every remote image source in document order.
///
/// Repeated sources are kept; callers that need distinct references
/// deduplicate themselves.
#[must_use]
pub fn extract_image_references(markdown: &str) -> Vec<String> {
    let fenced = fenced_code_ranges(markdown);
    let in_code = |offset: usize| fenced.iter().any(|range| range.contains(&offset));

    let definitions: HashMap<String, &str> = LINK_DEFINITION
        .captures_iter(markdown)
        .filter(|caps| caps.get(0).is_some_and(|m| !in_code(m.start())))
        .filter_map(|caps| Some((normalize_label(caps.get(1)?.as_str()), caps.get(2)?.as_str())))
        .collect();

    let mut found: Vec<(usize, &str)> = Vec::new();

    for caps in INLINE_IMAGE.captures_iter(markdown) {
        if let (Some(whole), Some(src)) = (caps.get(0), caps.get(1).or_else(|| caps.get(2))) {
            found.push((whole.start(), src.as_str().trim()));
        }
    }

    for caps in REFERENCE_IMAGE.captures_iter(markdown) {
        let (Some(whole), Some(alt), Some(label)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        let label = if label.as_str().trim().is_empty() {
            alt.as_str()
        } else {
            label.as_str()
        };
        if let Some(src) = definitions.get(&normalize_label(label)) {
            found.push((whole.start(), *src));
        }
    }

    for caps in HTML_IMAGE.captures_iter(markdown) {
        let src = caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3));
        if let (Some(whole), Some(src)) = (caps.get(0), src) {
            found.push((whole.start(), src.as_str().trim()));
        }
    }

    found.sort_by_key(|(offset, _)| *offset);
    found
        .into_iter()
        .filter(|(offset, _)| !in_code(*offset))
        .map(|(_, src)| src)
        .filter(|src| is_remote(src))
        .inspect(|src| trace!(src, "found image reference"))
        .map(str::to_string)
        .collect()
}

fn is_remote(src: &str) -> bool {
    let lower = src.get(..8).unwrap_or(src).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn normalize_label(label: &str) -> String {
    label.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Byte ranges covered by ``` or ~~~ fenced blocks, fences included.
///
/// An unclosed fence runs to the end of the text.
fn fenced_code_ranges(text: &str) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut open: Option<(usize, char, usize)> = None;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        let trimmed = line.trim_start_matches(' ');
        let indent = line.len() - trimmed.len();
        let fence = trimmed
            .chars()
            .next()
            .filter(|c| *c == '`' || *c == '~')
            .map(|c| (c, trimmed.chars().take_while(|x| *x == c).count()))
            .filter(|(_, len)| *len >= 3 && indent <= 3);

        match (open, fence) {
            (None, Some((c, len))) => open = Some((offset, c, len)),
            (Some((start, c, len)), Some((close_c, close_len)))
                if close_c == c
                    && close_len >= len
                    && trimmed.trim_end().chars().all(|x| x == c) =>
            {
                ranges.push(start..offset + line.len());
                open = None;
            }
            _ => {}
        }
        offset += line.len();
    }

    if let Some((start, _, _)) = open {
        ranges.push(start..text.len());
    }
    ranges
}
