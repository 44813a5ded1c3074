//! Background thread that owns git2::Repository for its lifetime.
//!
//! git2::Repository is !Send, so it is opened inside the thread. Requests
//! arrive over a crossbeam channel; diff loads are answered with
//! `AppEvent::DiffLoaded`, file reads over the request's oneshot.

use std::cell::RefCell;
use std::path::Path;

use crossbeam_channel::Receiver;
use git2::{Delta, Diff, DiffDelta, DiffOptions, ErrorCode, Oid, Repository, Tree};
use gutter_core::source::split_lines;
use gutter_core::{Change, DiffSession, FileDiff, FileStatus, GitRef, Hunk, SourceError};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, warn};

use crate::event::AppEvent;
use crate::git::types::{DiffPayload, GitRequest};

/// Entry point for the background thread.
///
/// Opens the repository containing `path` and serves requests until every
/// sender is dropped. If the repository cannot be opened, every request is
/// answered with that error.
pub fn git_worker_loop(path: String, rx: Receiver<GitRequest>, event_tx: UnboundedSender<AppEvent>) {
    let repo = match Repository::discover(&path) {
        Ok(repo) => repo,
        Err(err) => {
            error!(path = %path, error = %err, "could not open repository");
            let failure = git_error(err);
            for request in rx {
                fail_request(request, failure.clone(), &event_tx);
            }
            return;
        }
    };
    debug!(workdir = ?repo.workdir(), "git worker started");

    for request in rx {
        handle_request(&repo, request, &event_tx);
    }
    debug!("git worker stopped");
}

fn handle_request(repo: &Repository, request: GitRequest, event_tx: &UnboundedSender<AppEvent>) {
    match request {
        GitRequest::LoadDiff(session) => {
            let files = load_diff(repo, &session);
            if let Err(err) = &files {
                warn!(session = %session.label(), error = %err, "diff failed");
            }
            let _ = event_tx.send(AppEvent::DiffLoaded(Box::new(DiffPayload { session, files })));
        }
        GitRequest::ReadAt { git_ref, file, reply } => {
            let _ = reply.send(read_at_ref(repo, &git_ref, &file));
        }
        GitRequest::ReadWorkingCopy { file, reply } => {
            let _ = reply.send(read_working_copy(repo, &file));
        }
        GitRequest::BranchBase { branch, reply } => {
            let _ = reply.send(branch_base(repo, &branch));
        }
    }
}

fn fail_request(request: GitRequest, failure: SourceError, event_tx: &UnboundedSender<AppEvent>) {
    match request {
        GitRequest::LoadDiff(session) => {
            let payload = DiffPayload { session, files: Err(failure) };
            let _ = event_tx.send(AppEvent::DiffLoaded(Box::new(payload)));
        }
        GitRequest::ReadAt { reply, .. }
        | GitRequest::ReadWorkingCopy { reply, .. }
        | GitRequest::BranchBase { reply, .. } => {
            let _ = reply.send(Err(failure));
        }
    }
}

fn git_error(err: git2::Error) -> SourceError {
    SourceError::Git(err.message().to_owned())
}

// ---------------------------------------------------------------------------
// Diffs
// ---------------------------------------------------------------------------

/// Computes the diff for `session` and converts it to owned [`FileDiff`]s.
///
/// Renames are detected, so a moved file shows up once with its old path.
/// Each file also carries the old side's total line count, which lets the
/// context expander offer a gap below the last hunk without a fetch.
///
/// # Errors
///
/// Returns `SourceError::Git` if a revision named by the session does not
/// resolve, the branch has no merge-base, or any delta cannot be turned
/// into a patch. Either every file is returned or none is.
pub fn load_diff(repo: &Repository, session: &DiffSession) -> Result<Vec<FileDiff>, SourceError> {
    let diff = diff_for_session(repo, session).map_err(git_error)?;
    let files = extract_files(repo, &diff)?;
    debug!(session = %session.label(), files = files.len(), "diff loaded");
    Ok(files)
}

fn diff_for_session<'r>(repo: &'r Repository, session: &DiffSession) -> Result<Diff<'r>, git2::Error> {
    let mut opts = DiffOptions::new();
    let mut diff = match session {
        DiffSession::Unstaged => repo.diff_index_to_workdir(None, Some(&mut opts))?,
        DiffSession::Staged => {
            let head = head_tree(repo);
            repo.diff_tree_to_index(head.as_ref(), None, Some(&mut opts))?
        }
        DiffSession::Commit { hash } => {
            let commit = repo.revparse_single(hash)?.peel_to_commit()?;
            let parent = match commit.parents().next() {
                Some(parent) => Some(parent.tree()?),
                None => None,
            };
            repo.diff_tree_to_tree(parent.as_ref(), Some(&commit.tree()?), Some(&mut opts))?
        }
        DiffSession::Range { from, to } => {
            let old = rev_tree(repo, from)?;
            let new = rev_tree(repo, to)?;
            repo.diff_tree_to_tree(Some(&old), Some(&new), Some(&mut opts))?
        }
        DiffSession::Branch { name } => {
            let base = repo.find_commit(merge_base(repo, name)?)?.tree()?;
            let tip = rev_tree(repo, name)?;
            repo.diff_tree_to_tree(Some(&base), Some(&tip), Some(&mut opts))?
        }
        DiffSession::Head => {
            let head = head_tree(repo);
            repo.diff_tree_to_workdir_with_index(head.as_ref(), Some(&mut opts))?
        }
    };
    diff.find_similar(None)?;
    Ok(diff)
}

/// HEAD's tree, or `None` on an unborn branch.
fn head_tree(repo: &Repository) -> Option<Tree<'_>> {
    repo.head().ok().and_then(|head| head.peel_to_tree().ok())
}

fn rev_tree<'r>(repo: &'r Repository, rev: &str) -> Result<Tree<'r>, git2::Error> {
    repo.revparse_single(rev)?.peel_to_tree()
}

/// Walks every delta, hunk and line once, building owned file diffs.
///
/// # Errors
///
/// Fails if libgit2 cannot produce a patch for some delta (a missing or
/// unreadable blob, say). No partial list is returned.
fn extract_files(repo: &Repository, diff: &Diff<'_>) -> Result<Vec<FileDiff>, SourceError> {
    let files: RefCell<Vec<FileDiff>> = RefCell::new(Vec::new());

    diff.foreach(
        &mut |delta, _progress| {
            files.borrow_mut().push(file_entry(repo, &delta));
            true
        },
        None,
        Some(&mut |_delta, hunk| {
            if let Some(file) = files.borrow_mut().last_mut() {
                file.hunks.push(Hunk {
                    old_start: hunk.old_start(),
                    old_lines: hunk.old_lines(),
                    new_start: hunk.new_start(),
                    new_lines: hunk.new_lines(),
                    changes: Vec::new(),
                });
            }
            true
        }),
        Some(&mut |_delta, _hunk, line| {
            let content = line_text(line.content());
            let change = match (line.origin(), line.old_lineno(), line.new_lineno()) {
                ('+', _, Some(new_line)) => Change::Insert { new_line, content },
                ('-', Some(old_line), _) => Change::Delete { old_line, content },
                (' ', Some(old_line), Some(new_line)) => Change::Normal { old_line, new_line, content },
                // End-of-file newline markers.
                _ => return true,
            };
            if let Some(hunk) = files.borrow_mut().last_mut().and_then(|f| f.hunks.last_mut()) {
                hunk.changes.push(change);
            }
            true
        }),
    )
    .map_err(git_error)?;

    Ok(files.into_inner())
}

fn file_entry(repo: &Repository, delta: &DiffDelta<'_>) -> FileDiff {
    let path_of = |p: Option<&Path>| p.map(|p| p.to_string_lossy().into_owned());
    let old_path = path_of(delta.old_file().path());
    let path = path_of(delta.new_file().path())
        .or_else(|| old_path.clone())
        .unwrap_or_default();
    let status = match delta.status() {
        Delta::Added | Delta::Untracked => FileStatus::Added,
        Delta::Deleted => FileStatus::Deleted,
        Delta::Renamed => FileStatus::Renamed,
        _ => FileStatus::Modified,
    };
    FileDiff {
        old_path: old_path.unwrap_or_else(|| path.clone()),
        path,
        status,
        hunks: Vec::new(),
        old_line_count: blob_line_count(repo, delta.old_file().id()),
    }
}

fn blob_line_count(repo: &Repository, id: Oid) -> Option<u32> {
    if id.is_zero() {
        return None;
    }
    let blob = repo.find_blob(id).ok()?;
    let text = String::from_utf8_lossy(blob.content());
    u32::try_from(split_lines(&text).len()).ok()
}

fn line_text(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    text.trim_end_matches('\n').trim_end_matches('\r').to_owned()
}

// ---------------------------------------------------------------------------
// File reads
// ---------------------------------------------------------------------------

/// Full text of `file` at `git_ref`. The index is re-read from disk first so
/// a long-running worker sees fresh `git add`s.
///
/// Non-UTF-8 content is decoded lossily.
///
/// # Errors
///
/// - `SourceError::NotFound` if the ref exists but has no such file (a file
///   added in this session, for instance).
/// - `SourceError::BadRevision` if a `Head` or `Rev` ref does not resolve.
/// - `SourceError::Git` for any other libgit2 failure.
pub fn read_at_ref(repo: &Repository, git_ref: &GitRef, file: &str) -> Result<String, SourceError> {
    let oid = match git_ref {
        GitRef::Index => {
            let mut index = repo.index().map_err(git_error)?;
            index.read(false).map_err(git_error)?;
            index.get_path(Path::new(file), 0).map(|entry| entry.id)
        }
        GitRef::Head => tree_entry(repo, "HEAD", file)?,
        GitRef::Rev(rev) => tree_entry(repo, rev, file)?,
    };
    let oid = oid.ok_or_else(|| SourceError::not_found(file, git_ref))?;
    let blob = repo.find_blob(oid).map_err(git_error)?;
    Ok(String::from_utf8_lossy(blob.content()).into_owned())
}

fn tree_entry(repo: &Repository, rev: &str, file: &str) -> Result<Option<Oid>, SourceError> {
    let tree = rev_tree(repo, rev).map_err(|_| SourceError::BadRevision(rev.to_owned()))?;
    match tree.get_path(Path::new(file)) {
        Ok(entry) => Ok(Some(entry.id())),
        Err(err) if err.code() == ErrorCode::NotFound => Ok(None),
        Err(err) => Err(git_error(err)),
    }
}

/// Full text of `file` as it is on disk in the working tree.
///
/// # Errors
///
/// `SourceError::Git` for a bare repository, `SourceError::Io` if the file
/// cannot be read (deleted, or not UTF-8).
pub fn read_working_copy(repo: &Repository, file: &str) -> Result<String, SourceError> {
    let workdir = repo
        .workdir()
        .ok_or_else(|| SourceError::Git("repository has no working tree".into()))?;
    std::fs::read_to_string(workdir.join(file)).map_err(|err| SourceError::Io {
        file: file.to_owned(),
        message: err.to_string(),
    })
}

/// Merge-base of `branch` against `main`, or against the current branch
/// when the repository has no `main`, as a full commit hash.
///
/// # Errors
///
/// `SourceError::Git` if either side does not resolve to a commit or the
/// histories share no ancestor. The context expander then falls back to
/// `HEAD` and logs a warning.
pub fn branch_base(repo: &Repository, branch: &str) -> Result<String, SourceError> {
    merge_base(repo, branch).map(|oid| oid.to_string()).map_err(git_error)
}

fn merge_base(repo: &Repository, branch: &str) -> Result<Oid, git2::Error> {
    let base = match repo.revparse_single("main") {
        Ok(main) => main.peel_to_commit()?.id(),
        Err(_) => repo.head()?.peel_to_commit()?.id(),
    };
    let tip = repo.revparse_single(branch)?.peel_to_commit()?.id();
    repo.merge_base(base, tip)
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::{IndexAddOption, RepositoryInitOptions, Signature};
    use tempfile::TempDir;

    fn numbered(lines: u32) -> String {
        (1..=lines).map(|n| format!("line {n}\n")).collect()
    }

    fn init_repo() -> (TempDir, Repository) {
        let dir = TempDir::new().unwrap();
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("main");
        let repo = Repository::init_opts(dir.path(), &opts).unwrap();
        (dir, repo)
    }

    fn write(dir: &TempDir, file: &str, text: &str) {
        std::fs::write(dir.path().join(file), text).unwrap();
    }

    fn commit_all(repo: &Repository, message: &str) -> Oid {
        let mut index = repo.index().unwrap();
        index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = Signature::now("Test", "test@example.com").unwrap();
        let parents: Vec<git2::Commit<'_>> =
            repo.head().ok().and_then(|h| h.peel_to_commit().ok()).into_iter().collect();
        let parent_refs: Vec<&git2::Commit<'_>> = parents.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs).unwrap()
    }

    #[test]
    fn unstaged_diff_carries_hunks_and_old_line_count() {
        let (dir, repo) = init_repo();
        write(&dir, "notes.txt", &numbered(30));
        commit_all(&repo, "initial");
        write(&dir, "notes.txt", &numbered(30).replace("line 15\n", "line fifteen\n"));

        let files = load_diff(&repo, &DiffSession::Unstaged).unwrap();
        assert_eq!(files.len(), 1);
        let file = &files[0];
        assert_eq!(file.path, "notes.txt");
        assert_eq!(file.status, FileStatus::Modified);
        assert_eq!(file.old_line_count, Some(30));
        assert_eq!((file.added(), file.removed()), (1, 1));
        let changes = &file.hunks[0].changes;
        assert!(changes.contains(&Change::Insert { new_line: 15, content: "line fifteen".into() }));
        assert!(changes.contains(&Change::Delete { old_line: 15, content: "line 15".into() }));
    }

    #[test]
    fn unreadable_blob_fails_the_whole_diff() {
        let (dir, repo) = init_repo();
        write(&dir, "a.txt", &numbered(10));
        write(&dir, "b.txt", &numbered(10));
        commit_all(&repo, "initial");
        write(&dir, "a.txt", &numbered(12));
        write(&dir, "b.txt", &numbered(12));

        let blob = repo.index().unwrap().get_path(Path::new("b.txt"), 0).unwrap().id.to_string();
        let object = repo.path().join("objects").join(&blob[..2]).join(&blob[2..]);
        std::fs::remove_file(object).unwrap();

        assert!(matches!(load_diff(&repo, &DiffSession::Unstaged), Err(SourceError::Git(_))));
    }

    #[test]
    fn reads_follow_the_requested_ref() {
        let (dir, repo) = init_repo();
        write(&dir, "a.txt", "committed\n");
        commit_all(&repo, "initial");
        write(&dir, "a.txt", "edited\n");

        assert_eq!(read_at_ref(&repo, &GitRef::Head, "a.txt").unwrap(), "committed\n");
        assert_eq!(read_at_ref(&repo, &GitRef::Index, "a.txt").unwrap(), "committed\n");
        assert_eq!(read_working_copy(&repo, "a.txt").unwrap(), "edited\n");
        assert_eq!(
            read_at_ref(&repo, &GitRef::Head, "missing.txt"),
            Err(SourceError::not_found("missing.txt", &GitRef::Head))
        );
        assert!(matches!(
            read_at_ref(&repo, &GitRef::Rev("nope".into()), "a.txt"),
            Err(SourceError::BadRevision(_))
        ));
    }

    #[test]
    fn branch_base_is_merge_base_with_main() {
        let (dir, repo) = init_repo();
        write(&dir, "a.txt", "one\n");
        let fork = commit_all(&repo, "initial");

        let commit = repo.find_commit(fork).unwrap();
        repo.branch("feature", &commit, false).unwrap();
        repo.set_head("refs/heads/feature").unwrap();
        write(&dir, "a.txt", "one\ntwo\n");
        commit_all(&repo, "feature work");

        assert_eq!(branch_base(&repo, "feature").unwrap(), fork.to_string());
        let files = load_diff(&repo, &DiffSession::Branch { name: "feature".into() }).unwrap();
        assert_eq!(files[0].added(), 1);
    }
}
