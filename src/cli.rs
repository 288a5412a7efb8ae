//! CLI parsing and orchestration. Merges flags with the config file, runs the
//! extractor over the input directory, and maps errors to exit codes.

use crate::config::{self, Config};
use crate::extract::{extract_directory, plan_directory, ExtractError, ExtractOptions};
use crate::model::BatchReport;
use crate::naming::{NamingScheme, DEFAULT_MAX_NAME_LEN};
use clap::Parser;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const DEFAULT_INPUT_DIR: &str = "epub_files";
const DEFAULT_OUTPUT_DIR: &str = "extracted_text";

/// CLI error carrying exit code and message.
#[derive(Debug, Error)]
pub enum CliRunError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Extract(#[from] ExtractError),
}

impl CliRunError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliRunError::InvalidInput(_) => 1,
            CliRunError::Extract(_) => 2,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "epubtext", version)]
#[command(about = "Extract the chapters of EPUB books into per-chapter plain-text files")]
#[command(
    after_help = "Config file keys (input_dir, output_dir, naming, max_name_len, min_chapter_chars, heading_titles) are read from ./epubtext.toml or the user config dir. CLI flags override config."
)]
pub struct Args {
    /// Directory of .epub files, or a single .epub file. Default: ./epub_files
    pub input: Option<PathBuf>,

    /// Output root; each book gets a subdirectory. Default: ./extracted_text
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Chapter file naming: title (Title.txt) or numbered (001_Title.txt).
    #[arg(long, value_parser = parse_naming)]
    pub naming: Option<NamingScheme>,

    /// Shorthand for --naming numbered.
    #[arg(long, conflicts_with = "naming")]
    pub numbered: bool,

    /// Collect chapters shorter than this many characters into non_chapter_content.txt.
    #[arg(long)]
    pub min_chapter_chars: Option<usize>,

    /// Maximum file and directory name length in characters (default 100).
    #[arg(long, value_parser = parse_max_name_len)]
    pub max_name_len: Option<usize>,

    /// Use in-document headings when the table of contents has no label (default).
    #[arg(long, overrides_with = "no_heading_titles")]
    pub heading_titles: bool,

    /// Only use table-of-contents labels for chapter titles, never in-document headings.
    #[arg(long, overrides_with = "heading_titles")]
    pub no_heading_titles: bool,

    /// Read config from this file instead of the default search locations.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Read every book and print what would be written, without writing.
    #[arg(long)]
    pub dry_run: bool,

    /// Suppress progress and summary output (errors only).
    #[arg(short, long)]
    pub quiet: bool,

    /// Debug logging and full error chains.
    #[arg(short, long)]
    pub verbose: bool,
}

fn parse_max_name_len(s: &str) -> Result<usize, String> {
    let n: usize = s
        .trim()
        .parse()
        .map_err(|_| format!("Invalid --max-name-len: '{}' is not a number", s))?;
    if n == 0 {
        return Err("Invalid --max-name-len: must be at least 1".to_string());
    }
    Ok(n)
}

fn parse_naming(s: &str) -> Result<NamingScheme, String> {
    match s.to_lowercase().as_str() {
        "title" => Ok(NamingScheme::Title),
        "numbered" | "number" => Ok(NamingScheme::Numbered),
        _ => Err(format!(
            "Invalid naming value: '{}'. Use title or numbered.",
            s
        )),
    }
}

/// Flags win over config, config over built-in defaults.
fn resolve_options(args: &Args, config: Option<&Config>) -> Result<ExtractOptions, CliRunError> {
    let naming = match (args.naming, args.numbered) {
        (Some(naming), _) => naming,
        (None, true) => NamingScheme::Numbered,
        (None, false) => match config.and_then(|c| c.naming.as_deref()) {
            Some(s) => parse_naming(s).map_err(CliRunError::InvalidInput)?,
            None => NamingScheme::Title,
        },
    };
    let max_name_len = args
        .max_name_len
        .or_else(|| config.and_then(|c| c.max_name_len))
        .unwrap_or(DEFAULT_MAX_NAME_LEN);
    if max_name_len == 0 {
        return Err(CliRunError::InvalidInput(
            "Invalid config: max_name_len must be at least 1".to_string(),
        ));
    }
    let min_chapter_chars = args
        .min_chapter_chars
        .or_else(|| config.and_then(|c| c.min_chapter_chars))
        .unwrap_or(0);
    let heading_titles = if args.heading_titles {
        true
    } else if args.no_heading_titles {
        false
    } else {
        config.and_then(|c| c.heading_titles).unwrap_or(true)
    };

    Ok(ExtractOptions {
        naming,
        max_name_len,
        min_chapter_chars,
        heading_titles,
    })
}

fn resolve_paths(args: &Args, config: Option<&Config>) -> (PathBuf, PathBuf) {
    let input = args
        .input
        .clone()
        .or_else(|| config.and_then(|c| c.input_dir.clone()))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_INPUT_DIR));
    let output = args
        .output
        .clone()
        .or_else(|| config.and_then(|c| c.output_dir.clone()))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));
    (input, output)
}

/// Input problems are the user's to fix (exit 1); anything else is an extraction failure.
fn map_extract_error(e: ExtractError) -> CliRunError {
    match e {
        ExtractError::InputNotFound { path } => CliRunError::InvalidInput(format!(
            "Input not found: {}. Put .epub files there or pass a directory.",
            path.display()
        )),
        ExtractError::NotADirectory { path } => CliRunError::InvalidInput(format!(
            "Input must be a directory or an .epub file: {}",
            path.display()
        )),
        other => CliRunError::Extract(other),
    }
}

/// Entry point for the CLI. Returns Ok(()) once the batch completes, even if
/// some books failed; those are logged and listed in the summary.
pub fn run(args: &Args) -> Result<(), CliRunError> {
    let config = match &args.config {
        Some(path) => Some(config::load_config_file(path).map_err(CliRunError::InvalidInput)?),
        None => config::load_config().map_err(CliRunError::InvalidInput)?,
    };
    let options = resolve_options(args, config.as_ref())?;
    let (input, output) = resolve_paths(args, config.as_ref());

    if args.dry_run {
        return dry_run(&input, &output, &options);
    }

    let show_progress = !args.quiet && !args.verbose;
    let progress_state: RefCell<Option<indicatif::ProgressBar>> = RefCell::new(None);
    let progress_cb = |done: usize, total: usize, path: &Path| {
        if total == 0 {
            return;
        }
        let mut state = progress_state.borrow_mut();
        let pb = state.get_or_insert_with(|| {
            let bar = indicatif::ProgressBar::new(total as u64);
            if let Ok(style) = indicatif::ProgressStyle::default_bar()
                .template("{spinner} {msg} [{bar:40}] {pos}/{len} ({elapsed})")
            {
                bar.set_style(
                    style
                        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
                        .progress_chars("█▉▊▋▌▍▎▏ "),
                );
            }
            bar.enable_steady_tick(Duration::from_millis(80));
            bar
        });
        pb.set_position(done as u64);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        pb.set_message(format!("Extracted {}", name));
    };
    let progress: Option<&dyn Fn(usize, usize, &Path)> = if show_progress {
        Some(&progress_cb)
    } else {
        None
    };

    let report =
        extract_directory(&input, &output, &options, progress).map_err(map_extract_error)?;

    if let Some(pb) = progress_state.borrow_mut().take() {
        pb.disable_steady_tick();
        pb.finish_and_clear();
    }

    if !args.quiet {
        eprintln!("{}", summary(&report, &output));
    }
    Ok(())
}

fn summary(report: &BatchReport, output: &Path) -> String {
    let mut lines = vec![format!(
        "Extracted {} book(s), {} file(s) to {}",
        report.books.len(),
        report.chapter_files(),
        output.display()
    )];
    if report.skipped > 0 {
        lines.push(format!("Ignored {} non-EPUB file(s)", report.skipped));
    }
    for failure in &report.failures {
        lines.push(format!(
            "Failed: {}: {}",
            failure.source.display(),
            failure.error
        ));
    }
    lines.join("\n")
}

/// Resolve every book's directory and chapter files exactly as a real run would,
/// print them, and write nothing.
fn dry_run(input: &Path, output: &Path, options: &ExtractOptions) -> Result<(), CliRunError> {
    let report = plan_directory(input, output, options).map_err(map_extract_error)?;
    print!("{}", plan_listing(&report));
    Ok(())
}

fn plan_listing(report: &BatchReport) -> String {
    let mut out = String::new();
    for book in &report.books {
        out.push_str(&format!(
            "{} -> {} ({} files)\n",
            book.source.display(),
            book.output_dir.display(),
            book.artifacts.len()
        ));
        for artifact in &book.artifacts {
            out.push_str(&format!("  {}\n", artifact.path.display()));
        }
    }
    if report.skipped > 0 {
        out.push_str(&format!("Ignored {} non-EPUB file(s)\n", report.skipped));
    }
    for failure in &report.failures {
        out.push_str(&format!(
            "{} -> error: {}\n",
            failure.source.display(),
            failure.error
        ));
    }
    out
}
