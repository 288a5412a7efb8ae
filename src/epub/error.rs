//! Error type for reading EPUB archives: container, package document, and entries.

use std::path::PathBuf;
use thiserror::Error;

/// Failure while opening an EPUB or reading one of its entries.
#[derive(Debug, Error)]
pub enum EpubError {
    // Archive level
    #[error("Cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Not a valid zip archive: {source}")]
    Archive {
        #[source]
        source: zip::result::ZipError,
    },

    // Package structure
    #[error("Missing META-INF/container.xml; not an EPUB.")]
    MissingContainer,

    #[error("Package document {path} named in container.xml is missing from the archive.")]
    MissingPackage { path: String },

    #[error("Malformed package: {reason}")]
    MalformedPackage { reason: String },

    #[error("Package has no spine entries.")]
    EmptySpine,

    // Entries
    #[error("Archive entry {path} is missing.")]
    MissingEntry { path: String },

    #[error("Archive entry {path} is not valid UTF-8.")]
    Encoding { path: String },

    #[error("Failed to read archive entry {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: zip::result::ZipError,
    },
}

impl From<zip::result::ZipError> for EpubError {
    fn from(source: zip::result::ZipError) -> Self {
        EpubError::Archive { source }
    }
}
