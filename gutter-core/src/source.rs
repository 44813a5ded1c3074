//! File content provider seam and base-reference resolution.
//!
//! The core never talks to git directly. It asks a [`FileContentProvider`]
//! for file text and decides, per [`DiffSession`], which revision holds the
//! pre-image and which read to fall back to when that revision lacks the file.

use std::future::Future;

use tracing::{debug, warn};

use crate::error::SourceError;
use crate::types::{DiffSession, GitRef};

/// Supplies file text for hunk expansion.
///
/// Implementations must be cheap to share across tasks; the expander calls
/// them from whichever task triggered the expansion.
pub trait FileContentProvider: Send + Sync {
    /// Full text of `file` at `git_ref`. Fails if either does not exist.
    fn read_at_ref(
        &self,
        git_ref: &GitRef,
        file: &str,
    ) -> impl Future<Output = Result<String, SourceError>> + Send;

    /// Full text of `file` in the working tree.
    fn read_working_copy(&self, file: &str) -> impl Future<Output = Result<String, SourceError>> + Send;

    /// Merge-base of `branch` against the repository's base branch, as a
    /// revision string.
    fn branch_base(&self, branch: &str) -> impl Future<Output = Result<String, SourceError>> + Send;
}

/// Where the fallback read goes when the base revision lacks the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackRead {
    WorkingCopy,
    At(GitRef),
}

/// Resolves the pre-image revision for `session`.
///
/// A branch whose merge-base cannot be resolved falls back to `HEAD`. The
/// expanded context may then come from the wrong base; this is logged, not
/// reported.
pub async fn base_ref<P: FileContentProvider>(provider: &P, session: &DiffSession) -> GitRef {
    match session {
        DiffSession::Unstaged => GitRef::Index,
        DiffSession::Staged => GitRef::Head,
        DiffSession::Commit { hash } => GitRef::Rev(format!("{hash}^")),
        DiffSession::Range { from, .. } => GitRef::Rev(from.clone()),
        DiffSession::Branch { name } => match provider.branch_base(name).await {
            Ok(base) => GitRef::Rev(base),
            Err(err) => {
                warn!(branch = %name, error = %err, "merge-base unresolved, expanding against HEAD");
                GitRef::Head
            }
        },
        DiffSession::Head => GitRef::Head,
    }
}

/// The read tried after the base revision fails for `session`.
pub fn fallback_read(session: &DiffSession) -> FallbackRead {
    match session {
        DiffSession::Unstaged | DiffSession::Head => FallbackRead::WorkingCopy,
        DiffSession::Staged => FallbackRead::At(GitRef::Index),
        DiffSession::Commit { hash } => FallbackRead::At(GitRef::Rev(hash.clone())),
        DiffSession::Range { to, .. } => FallbackRead::At(GitRef::Rev(to.clone())),
        DiffSession::Branch { name } => FallbackRead::At(GitRef::Rev(name.clone())),
    }
}

/// Fetches the full text of `file` for `session`: the base revision first,
/// then the session's fallback read. Only the fallback's error is returned.
pub async fn fetch_source<P: FileContentProvider>(
    provider: &P,
    session: &DiffSession,
    file: &str,
) -> Result<String, SourceError> {
    let base = base_ref(provider, session).await;
    match provider.read_at_ref(&base, file).await {
        Ok(text) => {
            debug!(file, git_ref = %base, "read base source");
            Ok(text)
        }
        Err(err) => {
            let fallback = fallback_read(session);
            warn!(file, git_ref = %base, error = %err, ?fallback, "base read failed, trying fallback");
            match fallback {
                FallbackRead::WorkingCopy => provider.read_working_copy(file).await,
                FallbackRead::At(git_ref) => provider.read_at_ref(&git_ref, file).await,
            }
        }
    }
}

/// Splits file text into lines. A trailing newline does not produce an
/// extra empty line.
pub fn split_lines(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let mut lines: Vec<String> = text.split('\n').map(str::to_owned).collect();
    if text.ends_with('\n') {
        lines.pop();
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_lines_drops_trailing_newline_only() {
        assert_eq!(split_lines("a\nb\n"), vec!["a", "b"]);
        assert_eq!(split_lines("a\nb"), vec!["a", "b"]);
        assert_eq!(split_lines("a\n\n"), vec!["a", ""]);
        assert!(split_lines("").is_empty());
    }

    #[test]
    fn fallback_reads_follow_session_kind() {
        assert_eq!(fallback_read(&DiffSession::Unstaged), FallbackRead::WorkingCopy);
        assert_eq!(fallback_read(&DiffSession::Staged), FallbackRead::At(GitRef::Index));
        assert_eq!(
            fallback_read(&DiffSession::Commit { hash: "abc".into() }),
            FallbackRead::At(GitRef::Rev("abc".into()))
        );
        assert_eq!(
            fallback_read(&DiffSession::Range { from: "a".into(), to: "b".into() }),
            FallbackRead::At(GitRef::Rev("b".into()))
        );
    }
}
