//! CLI entry point for the mdlocal tool.

use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use mdlocal::config::{LocalizeConfig, load_file_config};
use mdlocal::document::{
    collect_markdown_files, extract_image_references, read_document, rewrite_references,
    write_localized_document,
};
use mdlocal::download::{DownloadEngine, RunReport};
use serde::Serialize;
use tracing::{debug, error, info, warn};

mod cli;
mod progress;

use cli::Args;

/// Outcome for one document, printed with `--json`.
#[derive(Debug, Serialize)]
struct DocumentSummary {
    document: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    localized: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(flatten)]
    report: RunReport,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    init_tracing(args.default_log_level(), args.no_color || no_color_env_requested());

    debug!(?args, "CLI arguments parsed");

    let loaded = load_file_config(args.config.as_deref())?;
    if let (true, Some(path)) = (loaded.loaded_from_file(), loaded.path.as_deref()) {
        debug!(path = %path.display(), "loaded config file");
    }
    let cli_layer = args.config_layer();
    let config = LocalizeConfig::from_layers(loaded.config.iter().chain([&cli_layer]))?;
    debug!(?config, "resolved configuration");

    if !config.target_directory.is_dir() {
        bail!(
            "media folder {} does not exist",
            config.target_directory.display()
        );
    }

    let documents = collect_markdown_files(&args.paths)?;
    if documents.is_empty() {
        info!("no markdown files found");
        return Ok(());
    }

    info!(count = documents.len(), "detected markdown files");
    for document in &documents {
        info!("  {}", document.display());
    }

    if !args.yes && io::stdin().is_terminal() && !confirm(documents.len())? {
        info!("aborted");
        return Ok(());
    }

    let engine = DownloadEngine::from_config(&config)?;
    let use_spinner = progress::should_use_spinner(
        io::stderr().is_terminal(),
        args.quiet,
        progress::is_dumb_terminal(),
    );
    let total = documents.len();
    let mut summaries = Vec::with_capacity(total);
    let mut unreadable = 0usize;

    for (index, document) in documents.into_iter().enumerate() {
        let position = DocumentPosition {
            enabled: use_spinner,
            index: index + 1,
            total,
        };
        match localize_document(&engine, &config, &document, position).await {
            Ok(summary) => summaries.push(summary),
            Err(DocumentFailure::Fatal(e)) => return Err(e),
            Err(DocumentFailure::Recoverable(e)) => {
                error!(document = %document.display(), error = %e, "could not process document");
                unreadable += 1;
                summaries.push(DocumentSummary {
                    document,
                    localized: None,
                    error: Some(format!("{e:#}")),
                    report: RunReport::default(),
                });
            }
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
    }

    if unreadable > 0 {
        bail!("{unreadable} document(s) could not be processed");
    }
    Ok(())
}

/// Position of a document in the run, for the spinner.
#[derive(Debug, Clone, Copy)]
struct DocumentPosition {
    enabled: bool,
    index: usize,
    total: usize,
}

enum DocumentFailure {
    /// Stops the whole run (the media folder is gone).
    Fatal(anyhow::Error),
    /// Only this document is affected.
    Recoverable(anyhow::Error),
}

async fn localize_document(
    engine: &DownloadEngine,
    config: &LocalizeConfig,
    document: &Path,
    position: DocumentPosition,
) -> Result<DocumentSummary, DocumentFailure> {
    info!(document = %document.display(), "parsing");
    let text = read_document(document).map_err(|e| DocumentFailure::Recoverable(e.into()))?;

    let references = extract_image_references(&text);
    if references.is_empty() {
        info!(document = %document.display(), "no downloadable urls found");
        return Ok(DocumentSummary {
            document: document.to_path_buf(),
            localized: None,
            error: None,
            report: RunReport {
                dry_run: config.dry_run,
                ..RunReport::default()
            },
        });
    }

    let spinner = progress::start_document_spinner(
        position.enabled && !config.dry_run,
        position.index,
        position.total,
        references.len(),
        &document.display().to_string(),
    );
    let result = engine.run(references, &config.target_directory).await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    let report = result.map_err(|e| DocumentFailure::Fatal(e.into()))?;

    for (reference, path) in report.mapping().iter() {
        debug!(reference, path = %path.display(), "saved");
    }
    let stats = report.stats();
    info!(
        document = %document.display(),
        scheduled = stats.scheduled,
        completed = stats.completed,
        skipped = stats.skipped,
        failed = stats.failed,
        "downloads finished"
    );

    let localized = if report.dry_run {
        None
    } else if report.mapping().is_empty() {
        warn!(document = %document.display(), "nothing was localized, not writing a copy");
        None
    } else {
        let rewritten = rewrite_references(&text, report.mapping());
        let path = write_localized_document(document, &rewritten)
            .context("failed to write localized document")
            .map_err(DocumentFailure::Recoverable)?;
        Some(path)
    };

    Ok(DocumentSummary {
        document: document.to_path_buf(),
        localized,
        error: None,
        report,
    })
}

/// Asks on stderr whether to go ahead; anything but `y`/`yes` declines.
fn confirm(count: usize) -> Result<bool> {
    let mut stderr = io::stderr().lock();
    write!(stderr, "handle all {count} files? [y/N] ")?;
    stderr.flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}

fn no_color_env_requested() -> bool {
    std::env::var_os("NO_COLOR").is_some_and(|value| !value.is_empty())
}

fn init_tracing(default_level: &str, no_color: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_ansi(!no_color)
        .with_env_filter(filter)
        .init();
}
