//! The extractor: read EPUBs, strip markup from each spine document, and write
//! one text file per chapter under a directory named after the book.

use crate::epub::{EpubArchive, EpubError};
use crate::markup::ChapterDocument;
use crate::model::{BatchReport, Book, BookFailure, BookReport, Chapter, OutputArtifact};
use crate::naming::{self, NameRegistry, NamingScheme, DEFAULT_MAX_NAME_LEN};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info};

/// Directory name used when a book has neither a usable title nor file stem.
const UNKNOWN_BOOK: &str = "Unknown_Book";

/// Errors from extracting a directory or a single book.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Input not found: {path}")]
    InputNotFound { path: PathBuf },

    #[error("Input is neither a directory nor an .epub file: {path}")]
    NotADirectory { path: PathBuf },

    #[error("{path}: {source}")]
    Epub {
        path: PathBuf,
        #[source]
        source: EpubError,
    },

    #[error("Chapter {index} ({href}) could not be read: {source}")]
    Chapter {
        index: usize,
        href: String,
        #[source]
        source: EpubError,
    },

    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> ExtractError + '_ {
    move |source| ExtractError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Knobs for one extraction run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    pub naming: NamingScheme,
    /// Cap on file and directory names, in characters.
    pub max_name_len: usize,
    /// Chapters with fewer characters go to the shared non-chapter file. 0 disables.
    pub min_chapter_chars: usize,
    /// Fall back to in-document headings when the TOC has no label.
    pub heading_titles: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            naming: NamingScheme::Title,
            max_name_len: DEFAULT_MAX_NAME_LEN,
            min_chapter_chars: 0,
            heading_titles: true,
        }
    }
}

/// Progress callback: books finished, total books, book just finished.
pub type Progress<'a> = &'a dyn Fn(usize, usize, &Path);

/// EPUB files to process for `input`, sorted by name, plus the count of other
/// files that were ignored. `input` may also be a single `.epub` file.
pub fn list_epubs(input: &Path) -> Result<(Vec<PathBuf>, usize), ExtractError> {
    if !input.exists() {
        return Err(ExtractError::InputNotFound {
            path: input.to_path_buf(),
        });
    }
    if input.is_file() {
        return if is_epub(input) {
            Ok((vec![input.to_path_buf()], 0))
        } else {
            Err(ExtractError::NotADirectory {
                path: input.to_path_buf(),
            })
        };
    }
    if !input.is_dir() {
        return Err(ExtractError::NotADirectory {
            path: input.to_path_buf(),
        });
    }

    let mut epubs = Vec::new();
    let mut skipped = 0;
    for entry in fs::read_dir(input).map_err(io_err(input))? {
        let path = entry.map_err(io_err(input))?.path();
        if !path.is_file() {
            continue;
        }
        if is_epub(&path) {
            epubs.push(path);
        } else {
            debug!(path = %path.display(), "Ignoring non-EPUB file");
            skipped += 1;
        }
    }
    epubs.sort();
    Ok((epubs, skipped))
}

fn is_epub(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("epub"))
}

/// Extract every EPUB under `input` into `output`. A book that fails is logged
/// and recorded in the report; the run continues with the next file.
pub fn extract_directory(
    input: &Path,
    output: &Path,
    options: &ExtractOptions,
    progress: Option<Progress<'_>>,
) -> Result<BatchReport, ExtractError> {
    run_batch(input, output, options, progress, true)
}

/// Resolve what `extract_directory` would write (book directories, chapter files,
/// collision suffixes) without creating or writing anything.
pub fn plan_directory(
    input: &Path,
    output: &Path,
    options: &ExtractOptions,
) -> Result<BatchReport, ExtractError> {
    run_batch(input, output, options, None, false)
}

fn run_batch(
    input: &Path,
    output: &Path,
    options: &ExtractOptions,
    progress: Option<Progress<'_>>,
    write: bool,
) -> Result<BatchReport, ExtractError> {
    let (epubs, skipped) = list_epubs(input)?;
    if write {
        fs::create_dir_all(output).map_err(io_err(output))?;
    }

    info!(
        input = %input.display(),
        output = %output.display(),
        books = epubs.len(),
        dry_run = !write,
        "Starting extraction"
    );

    let mut report = BatchReport {
        skipped,
        ..Default::default()
    };
    let mut book_dirs = NameRegistry::new();
    let total = epubs.len();

    for (done, path) in epubs.into_iter().enumerate() {
        match extract_into(&path, output, options, &mut book_dirs, write) {
            Ok(book) => {
                info!(
                    path = %path.display(),
                    output = %book.output_dir.display(),
                    files = book.artifacts.len(),
                    "Extracted book"
                );
                report.books.push(book);
            }
            Err(error) => {
                error!(path = %path.display(), "Skipping book: {error}");
                report.failures.push(BookFailure {
                    source: path.clone(),
                    error,
                });
            }
        }
        if let Some(progress) = progress {
            progress(done + 1, total, &path);
        }
    }

    info!(
        books = report.books.len(),
        failed = report.failures.len(),
        files = report.chapter_files(),
        "Extraction complete"
    );
    Ok(report)
}

/// Extract one EPUB into `<output>/<book name>/`.
pub fn extract_epub(
    path: &Path,
    output: &Path,
    options: &ExtractOptions,
) -> Result<BookReport, ExtractError> {
    extract_into(path, output, options, &mut NameRegistry::new(), true)
}

fn extract_into(
    path: &Path,
    output: &Path,
    options: &ExtractOptions,
    book_dirs: &mut NameRegistry,
    write: bool,
) -> Result<BookReport, ExtractError> {
    let book = load_book(path, options)?;
    let dir_name = book_dirs.claim_book(
        &book_dir_name(&book, options),
        &book.file_stem(),
        options.max_name_len,
    );
    let dir = output.join(dir_name);
    if write {
        write_book(&book, &dir, options)
    } else {
        Ok(plan_book(&book, &dir, options))
    }
}

/// Sanitized directory name for `book`: title, else file stem, else `Unknown_Book`.
pub fn book_dir_name(book: &Book, options: &ExtractOptions) -> String {
    naming::sanitize(&book.display_name(), options.max_name_len)
        .or_else(|| naming::sanitize(&book.file_stem(), options.max_name_len))
        .unwrap_or_else(|| UNKNOWN_BOOK.to_string())
}

/// Open `path` and build every chapter in spine order.
pub fn load_book(path: &Path, options: &ExtractOptions) -> Result<Book, ExtractError> {
    let mut epub = EpubArchive::open(path).map_err(|source| ExtractError::Epub {
        path: path.to_path_buf(),
        source,
    })?;

    let spine = epub.spine().to_vec();
    let mut chapters = Vec::with_capacity(spine.len());
    for item in spine {
        let source = epub
            .read_text(&item.href)
            .map_err(|source| ExtractError::Chapter {
                index: item.index,
                href: item.href.clone(),
                source,
            })?;
        let document = ChapterDocument::parse(&source);
        let text = document.text();

        let title = match epub.toc().label(&item.href) {
            Some(label) => Some(label.to_string()),
            None if options.heading_titles => document.heading_title(),
            None => None,
        };

        debug!(
            index = item.index,
            href = %item.href,
            title = title.as_deref().unwrap_or(""),
            chars = text.chars().count(),
            "Parsed chapter"
        );
        chapters.push(Chapter {
            index: item.index,
            href: item.href,
            title,
            text,
        });
    }

    Ok(Book {
        source: path.to_path_buf(),
        metadata: epub.metadata().clone(),
        chapters,
    })
}

/// A file `write_book` produces, resolved before anything touches the disk.
struct PlannedFile {
    path: PathBuf,
    contents: String,
    chapters: Vec<usize>,
}

impl PlannedFile {
    /// Empty text gives an empty file; otherwise the text plus one trailing newline.
    fn new(path: PathBuf, text: &str, chapters: Vec<usize>) -> Self {
        let contents = if text.is_empty() {
            String::new()
        } else {
            format!("{}\n", text)
        };
        Self {
            path,
            contents,
            chapters,
        }
    }

    fn artifact(&self) -> OutputArtifact {
        OutputArtifact {
            path: self.path.clone(),
            chapters: self.chapters.clone(),
            bytes: self.contents.len(),
        }
    }
}

fn plan_files(book: &Book, dir: &Path, options: &ExtractOptions) -> Vec<PlannedFile> {
    let folding = options.min_chapter_chars > 0;
    let non_chapter = naming::non_chapter_stem(options.naming);
    let mut names = NameRegistry::new();
    if folding {
        names.reserve(&non_chapter);
    }

    let mut files = Vec::with_capacity(book.chapters.len());
    let mut folded: Vec<&Chapter> = Vec::new();

    for chapter in &book.chapters {
        if folding && chapter.char_count() < options.min_chapter_chars {
            folded.push(chapter);
            continue;
        }
        let stem = naming::chapter_stem(
            options.naming,
            chapter.index,
            &chapter_title(chapter),
            options.max_name_len,
        );
        let stem = names.claim_chapter(&stem, chapter.index, options.max_name_len);
        files.push(PlannedFile::new(
            dir.join(format!("{}.txt", stem)),
            &chapter.text,
            vec![chapter.index],
        ));
    }

    let folded_text = folded
        .iter()
        .map(|c| c.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");
    if !folded_text.is_empty() {
        files.push(PlannedFile::new(
            dir.join(format!("{}.txt", non_chapter)),
            &folded_text,
            folded.iter().map(|c| c.index).collect(),
        ));
    }
    files
}

/// What `write_book` would produce for `book` in `dir`, without writing.
pub fn plan_book(book: &Book, dir: &Path, options: &ExtractOptions) -> BookReport {
    BookReport {
        source: book.source.clone(),
        output_dir: dir.to_path_buf(),
        artifacts: plan_files(book, dir, options)
            .iter()
            .map(PlannedFile::artifact)
            .collect(),
    }
}

/// Write `book`'s chapters into `dir` (created if missing).
pub fn write_book(
    book: &Book,
    dir: &Path,
    options: &ExtractOptions,
) -> Result<BookReport, ExtractError> {
    fs::create_dir_all(dir).map_err(io_err(dir))?;

    let files = plan_files(book, dir, options);
    let mut artifacts = Vec::with_capacity(files.len());
    for file in &files {
        fs::write(&file.path, &file.contents).map_err(io_err(&file.path))?;
        artifacts.push(file.artifact());
    }

    Ok(BookReport {
        source: book.source.clone(),
        output_dir: dir.to_path_buf(),
        artifacts,
    })
}

fn chapter_title(chapter: &Chapter) -> String {
    chapter
        .title
        .clone()
        .unwrap_or_else(|| format!("{:03}", chapter.index))
}
