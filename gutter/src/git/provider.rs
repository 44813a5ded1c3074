//! Async facade over the git worker thread.

use std::thread;

use crossbeam_channel::Sender;
use gutter_core::source::FileContentProvider;
use gutter_core::{DiffSession, GitRef, SourceError};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::oneshot;

use crate::event::AppEvent;
use crate::git::types::{GitRequest, Reply};
use crate::git::worker::git_worker_loop;

/// Handle to the git worker. Dropping the last clone stops the thread.
#[derive(Debug, Clone)]
pub struct GitProvider {
    tx: Sender<GitRequest>,
}

impl GitProvider {
    /// Spawns the worker thread for the repository containing `path`.
    pub fn spawn(path: String, event_tx: UnboundedSender<AppEvent>) -> std::io::Result<Self> {
        let (tx, rx) = crossbeam_channel::unbounded();
        thread::Builder::new()
            .name("gutter-git".into())
            .spawn(move || git_worker_loop(path, rx, event_tx))?;
        Ok(Self { tx })
    }

    /// Requests the diff for `session`; the result arrives as
    /// `AppEvent::DiffLoaded`. Returns false if the worker is gone.
    pub fn load_diff(&self, session: DiffSession) -> bool {
        self.tx.send(GitRequest::LoadDiff(session)).is_ok()
    }

    async fn ask<T>(&self, build: impl FnOnce(Reply<T>) -> GitRequest) -> Result<T, SourceError> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(build(reply)).map_err(|_| SourceError::WorkerGone)?;
        rx.await.map_err(|_| SourceError::WorkerGone)?
    }
}

impl FileContentProvider for GitProvider {
    async fn read_at_ref(&self, git_ref: &GitRef, file: &str) -> Result<String, SourceError> {
        let (git_ref, file) = (git_ref.clone(), file.to_owned());
        self.ask(|reply| GitRequest::ReadAt { git_ref, file, reply }).await
    }

    async fn read_working_copy(&self, file: &str) -> Result<String, SourceError> {
        let file = file.to_owned();
        self.ask(|reply| GitRequest::ReadWorkingCopy { file, reply }).await
    }

    async fn branch_base(&self, branch: &str) -> Result<String, SourceError> {
        let branch = branch.to_owned();
        self.ask(|reply| GitRequest::BranchBase { branch, reply }).await
    }
}
