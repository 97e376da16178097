//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use mdlocal::config::FileConfig;

/// Download the remote images of Markdown documents and write copies that
/// reference the local files.
///
/// Each document `notes.md` gets a sibling `notes-localMedia.md`; the
/// original is never modified.
#[derive(Parser, Debug)]
#[command(name = "mdlocal")]
#[command(author, version, about)]
pub struct Args {
    /// Markdown files, or directories whose direct `*.md` children are processed
    #[arg(required = true, value_name = "PATH")]
    pub paths: Vec<PathBuf>,

    /// Folder for media downloads; must already exist [default: ./Media]
    #[arg(short = 'm', long, value_name = "DIR")]
    pub media: Option<PathBuf>,

    /// Maximum concurrent downloads (1-100) [default: 5]
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: Option<u8>,

    /// Keep downloads of non-allowed media types under their temporary names
    #[arg(long)]
    pub keep_all_files: bool,

    /// List what would be downloaded without fetching or writing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Allowed media type pattern, e.g. `image/*`; repeat to allow several
    /// (replaces the default `image/*`, `application/pdf`)
    #[arg(long = "allow-type", value_name = "PATTERN")]
    pub allow_types: Vec<String>,

    /// Config file (default: $XDG_CONFIG_HOME/mdlocal/config.toml)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Do not ask for confirmation
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Print run reports as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Disable colored log output
    #[arg(long)]
    pub no_color: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Command-line settings as the topmost configuration layer.
    ///
    /// Flags that were not given leave the field unset so lower layers
    /// show through.
    #[must_use]
    pub fn config_layer(&self) -> FileConfig {
        FileConfig {
            target_directory: self.media.clone(),
            max_concurrency: self.concurrency.map(usize::from),
            keep_all_files: self.keep_all_files.then_some(true),
            dry_run: self.dry_run.then_some(true),
            allowed_media_types: (!self.allow_types.is_empty()).then(|| self.allow_types.clone()),
            connect_timeout_secs: None,
            read_timeout_secs: None,
        }
    }

    /// Default log level from `-q` and `-v` flags.
    #[must_use]
    pub fn default_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "info",
                1 => "debug",
                _ => "trace",
            }
        }
    }
}
