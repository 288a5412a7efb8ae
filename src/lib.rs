//! epubtext: extract the chapters of EPUB books into per-chapter plain-text files.

pub mod cli;
pub mod config;
pub mod epub;
pub mod extract;
pub mod markup;
pub mod model;
pub mod naming;

// Re-exports for CLI and consumers.
pub use epub::{EpubArchive, EpubError, PackageMetadata, SpineItem};
pub use extract::{
    extract_directory, extract_epub, load_book, plan_book, plan_directory, write_book,
    ExtractError, ExtractOptions,
};
pub use markup::{extract_text, ChapterDocument};
pub use model::{BatchReport, Book, BookFailure, BookReport, Chapter, OutputArtifact};
pub use naming::NamingScheme;
