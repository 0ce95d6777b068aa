//! Error taxonomy for archive extraction and document import.
//!
//! Collaborator traits (rendering surface, speech engine) report failures as
//! `anyhow::Error`; the two enums here cover the failures callers are expected
//! to branch on.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failures while opening or walking an EPUB container.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive at {path} is not readable: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("archive is corrupt: {0}")]
    Corrupt(String),
}

impl From<zip::result::ZipError> for ArchiveError {
    fn from(err: zip::result::ZipError) -> Self {
        ArchiveError::Corrupt(err.to_string())
    }
}

/// Failures while copying a picked document into app storage.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("import failed: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("user cancelled the document picker")]
    Cancelled,

    #[error("document picker completed without a selection")]
    NoSelection,
}

impl ImportError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        ImportError::Io {
            context: context.into(),
            source,
        }
    }

    /// True when the user backed out of the picker; hosts show no error UI.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, ImportError::Cancelled)
    }
}
