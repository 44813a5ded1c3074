//! Owned messages exchanged with the git background thread.
//!
//! Everything here is `Send`: requests travel to the thread that owns the
//! `git2::Repository`, replies travel back either as an [`AppEvent`] (diff
//! loads) or over a `tokio::sync::oneshot` (file reads made on behalf of the
//! context expander).
//!
//! [`AppEvent`]: crate::event::AppEvent

use gutter_core::{DiffSession, FileDiff, GitRef, SourceError};
use tokio::sync::oneshot;

/// One-shot reply slot for a provider read.
pub type Reply<T> = oneshot::Sender<Result<T, SourceError>>;

/// Commands sent from the async side to the git worker thread.
#[derive(Debug)]
pub enum GitRequest {
    /// Compute the diff for a session. The result arrives as
    /// `AppEvent::DiffLoaded`.
    LoadDiff(DiffSession),
    /// Full text of a file at a revision.
    ReadAt {
        git_ref: GitRef,
        file: String,
        reply: Reply<String>,
    },
    /// Full text of a file in the working tree.
    ReadWorkingCopy { file: String, reply: Reply<String> },
    /// Merge-base of a branch against the repository's base branch.
    BranchBase { branch: String, reply: Reply<String> },
}

/// Result of a [`GitRequest::LoadDiff`].
#[derive(Debug)]
pub struct DiffPayload {
    /// The session the diff was computed for.
    pub session: DiffSession,
    pub files: Result<Vec<FileDiff>, SourceError>,
}
