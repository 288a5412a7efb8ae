//! Data model for one extraction pass: the book read from an archive, its
//! chapters, and the files written for them.

use crate::epub::PackageMetadata;
use crate::extract::ExtractError;
use std::path::PathBuf;

/// One EPUB archive, read in full.
#[derive(Debug, Clone)]
pub struct Book {
    /// The `.epub` file this book came from.
    pub source: PathBuf,
    pub metadata: PackageMetadata,
    /// Chapters in spine order.
    pub chapters: Vec<Chapter>,
}

impl Book {
    /// Title used for the output directory: `dc:title`, else the file stem.
    pub fn display_name(&self) -> String {
        self.metadata
            .title
            .clone()
            .unwrap_or_else(|| self.file_stem())
    }

    pub fn file_stem(&self) -> String {
        self.source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// One content document from the spine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    /// 1-based spine position.
    pub index: usize,
    /// Archive path of the source document.
    pub href: String,
    /// TOC label or in-document heading; `None` means the index names it.
    pub title: Option<String>,
    /// Visible text, markup stripped. May be empty.
    pub text: String,
}

impl Chapter {
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// A text file written for one or more chapters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputArtifact {
    pub path: PathBuf,
    /// Spine indexes whose text is in this file. One entry except for the
    /// short-chapter collection file.
    pub chapters: Vec<usize>,
    pub bytes: usize,
}

/// Result of extracting one book.
#[derive(Debug, Clone)]
pub struct BookReport {
    pub source: PathBuf,
    pub output_dir: PathBuf,
    pub artifacts: Vec<OutputArtifact>,
}

/// A book that could not be extracted.
#[derive(Debug)]
pub struct BookFailure {
    pub source: PathBuf,
    pub error: ExtractError,
}

/// Result of a directory run.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub books: Vec<BookReport>,
    pub failures: Vec<BookFailure>,
    /// Non-EPUB files that were ignored.
    pub skipped: usize,
}

impl BatchReport {
    pub fn chapter_files(&self) -> usize {
        self.books.iter().map(|b| b.artifacts.len()).sum()
    }
}
