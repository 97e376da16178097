//! Progress UI (spinner) while a document's media is downloading.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Whether a spinner should be drawn at all.
pub(crate) fn should_use_spinner(stderr_is_terminal: bool, quiet: bool, dumb_terminal: bool) -> bool {
    stderr_is_terminal && !quiet && !dumb_terminal
}

pub(crate) fn is_dumb_terminal() -> bool {
    std::env::var("TERM")
        .map(|value| value.eq_ignore_ascii_case("dumb"))
        .unwrap_or(false)
}

/// Starts a spinner for one document, or returns `None` when disabled.
///
/// The caller clears it with [`ProgressBar::finish_and_clear`].
pub(crate) fn start_document_spinner(
    enabled: bool,
    index: usize,
    total: usize,
    references: usize,
    document: &str,
) -> Option<ProgressBar> {
    if !enabled {
        return None;
    }
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(format!(
        "[{index}/{total}] Downloading {references} reference(s) from {document}..."
    ));
    spinner.enable_steady_tick(Duration::from_millis(100));
    Some(spinner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spinner_requires_interactive_stderr() {
        assert!(should_use_spinner(true, false, false));
        assert!(!should_use_spinner(false, false, false));
        assert!(!should_use_spinner(true, true, false));
        assert!(!should_use_spinner(true, false, true));
    }

    #[test]
    fn test_disabled_spinner_is_none() {
        assert!(start_document_spinner(false, 1, 1, 3, "post.md").is_none());
    }

    #[test]
    fn test_enabled_spinner_can_be_cleared() {
        let spinner = start_document_spinner(true, 1, 2, 3, "post.md").unwrap();
        assert!(spinner.message().contains("[1/2]"));
        spinner.finish_and_clear();
    }
}
