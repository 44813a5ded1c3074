//! Error types for source fetching and hunk expansion.

use thiserror::Error;

use crate::types::GitRef;

/// Failure reported by a [`crate::source::FileContentProvider`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("{file} does not exist at {git_ref}")]
    NotFound { file: String, git_ref: String },

    #[error("revision {0} could not be resolved")]
    BadRevision(String),

    #[error("I/O error reading {file}: {message}")]
    Io { file: String, message: String },

    #[error("git error: {0}")]
    Git(String),

    #[error("git worker is no longer running")]
    WorkerGone,
}

impl SourceError {
    pub fn not_found(file: &str, git_ref: &GitRef) -> Self {
        SourceError::NotFound { file: file.to_owned(), git_ref: git_ref.to_string() }
    }
}

/// Failure of [`crate::expand::ContextExpander::expand`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExpandError {
    /// The primary read and its fallback both failed.
    #[error("could not load {file}: {source}")]
    Source {
        file: String,
        #[source]
        source: SourceError,
    },

    /// The diff session changed while the fetch was in flight.
    #[error("diff session changed while loading {0}")]
    StaleSession(String),

    #[error("{0} is not part of the current diff")]
    UnknownFile(String),
}
