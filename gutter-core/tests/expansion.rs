//! Integration tests for lazy context expansion.
//!
//! Exercises: ContextExpander::expand, set_session, the per-session source
//! cache, base-ref fallbacks and comment placement over expanded hunks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use gutter_core::anchors::AnchorStore;
use gutter_core::expand::ContextExpander;
use gutter_core::source::FileContentProvider;
use gutter_core::{Change, ChangeKey, DiffSession, ExpandError, FileDiff, FileStatus, GitRef, Hunk, Side};

/// In-memory provider that counts reads and answers after a short delay.
#[derive(Default)]
struct FakeProvider {
    at_ref: HashMap<(String, String), String>,
    working: HashMap<String, String>,
    merge_base: Option<String>,
    ref_reads: AtomicUsize,
    working_reads: AtomicUsize,
}

impl FakeProvider {
    fn with_file(mut self, git_ref: &str, file: &str, text: String) -> Self {
        self.at_ref.insert((git_ref.to_owned(), file.to_owned()), text);
        self
    }
}

impl FileContentProvider for FakeProvider {
    async fn read_at_ref(&self, git_ref: &GitRef, file: &str) -> Result<String, gutter_core::SourceError> {
        self.ref_reads.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.at_ref
            .get(&(git_ref.to_string(), file.to_owned()))
            .cloned()
            .ok_or_else(|| gutter_core::SourceError::not_found(file, git_ref))
    }

    async fn read_working_copy(&self, file: &str) -> Result<String, gutter_core::SourceError> {
        self.working_reads.fetch_add(1, Ordering::SeqCst);
        self.working.get(file).cloned().ok_or_else(|| gutter_core::SourceError::Io {
            file: file.to_owned(),
            message: "missing".into(),
        })
    }

    async fn branch_base(&self, branch: &str) -> Result<String, gutter_core::SourceError> {
        self.merge_base
            .clone()
            .ok_or_else(|| gutter_core::SourceError::BadRevision(branch.to_owned()))
    }
}

fn source(lines: u32) -> String {
    (1..=lines).map(|n| format!("line {n}\n")).collect()
}

fn context_hunk(old_start: u32, len: u32) -> Hunk {
    Hunk {
        old_start,
        old_lines: len,
        new_start: old_start,
        new_lines: len,
        changes: (old_start..old_start + len)
            .map(|n| Change::Normal { old_line: n, new_line: n, content: format!("line {n}") })
            .collect(),
    }
}

fn file(path: &str, hunks: Vec<Hunk>) -> FileDiff {
    FileDiff {
        path: path.into(),
        old_path: path.into(),
        status: FileStatus::Modified,
        hunks,
        old_line_count: None,
    }
}

fn expander(provider: FakeProvider, session: DiffSession) -> (Arc<FakeProvider>, ContextExpander<FakeProvider>) {
    let provider = Arc::new(provider);
    let expander = ContextExpander::new(Arc::clone(&provider), session);
    expander.set_files(vec![file("src/lib.rs", vec![context_hunk(10, 5), context_hunk(80, 3)])]);
    (provider, expander)
}

#[tokio::test]
async fn concurrent_expansions_fetch_once() {
    let provider = FakeProvider::default().with_file(":0", "src/lib.rs", source(100));
    let (provider, expander) = expander(provider, DiffSession::Unstaged);

    let results = join_all((0..8).map(|_| expander.expand("src/lib.rs", 15, 20))).await;

    assert!(results.iter().all(Result::is_ok));
    assert_eq!(provider.ref_reads.load(Ordering::SeqCst), 1);
    assert_eq!(expander.cached_files(), 1);
    let hunks = expander.hunks("src/lib.rs").unwrap();
    assert_eq!((hunks[0].old_start, hunks[0].old_end()), (10, 21));
}

#[tokio::test]
async fn later_expansions_build_on_earlier_ones() {
    let provider = FakeProvider::default().with_file(":0", "src/lib.rs", source(100));
    let (provider, expander) = expander(provider, DiffSession::Unstaged);

    expander.expand("src/lib.rs", 15, 29).await.unwrap();
    let hunks = expander.expand("src/lib.rs", 65, 79).await.unwrap();

    assert_eq!(hunks.len(), 2);
    assert_eq!((hunks[0].old_start, hunks[0].old_end()), (10, 30));
    assert_eq!((hunks[1].old_start, hunks[1].old_end()), (65, 83));
    assert_eq!(provider.ref_reads.load(Ordering::SeqCst), 1);
    assert_eq!(expander.total_lines("src/lib.rs"), Some(100));
}

#[tokio::test]
async fn session_change_clears_everything() {
    let provider = FakeProvider::default()
        .with_file(":0", "src/lib.rs", source(100))
        .with_file("HEAD", "src/lib.rs", source(100));
    let (provider, expander) = expander(provider, DiffSession::Unstaged);

    expander.expand("src/lib.rs", 15, 19).await.unwrap();
    assert!(expander.set_session(DiffSession::Staged));
    assert_eq!(expander.cached_files(), 0);
    assert_eq!(expander.expanded_files(), 0);
    assert_eq!(expander.hunks("src/lib.rs").unwrap().len(), 2);

    expander.expand("src/lib.rs", 15, 19).await.unwrap();
    assert_eq!(provider.ref_reads.load(Ordering::SeqCst), 2);
    assert!(!expander.set_session(DiffSession::Staged));
}

#[tokio::test]
async fn fetch_finishing_after_session_change_is_discarded() {
    let provider = FakeProvider::default().with_file(":0", "src/lib.rs", source(100));
    let (_provider, expander) = expander(provider, DiffSession::Unstaged);

    let (result, _) = tokio::join!(expander.expand("src/lib.rs", 15, 19), async {
        tokio::task::yield_now().await;
        expander.set_session(DiffSession::Commit { hash: "abc".into() })
    });

    assert_eq!(result, Err(ExpandError::StaleSession("src/lib.rs".into())));
    assert_eq!(expander.cached_files(), 0);
    assert_eq!(expander.expanded_files(), 0);
}

#[tokio::test]
async fn new_file_falls_back_to_working_copy() {
    let mut provider = FakeProvider::default();
    provider.working.insert("src/lib.rs".into(), source(90));
    let (provider, expander) = expander(provider, DiffSession::Unstaged);

    expander.expand("src/lib.rs", 15, 16).await.unwrap();
    assert_eq!(provider.ref_reads.load(Ordering::SeqCst), 1);
    assert_eq!(provider.working_reads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_fetch_writes_no_cache_entry() {
    let (provider, expander) = expander(FakeProvider::default(), DiffSession::Staged);

    let err = expander.expand("src/lib.rs", 15, 19).await.unwrap_err();
    assert!(matches!(err, ExpandError::Source { .. }));
    assert_eq!(expander.cached_files(), 0);
    assert_eq!(expander.hunks("src/lib.rs").unwrap().len(), 2);

    // HEAD, then the index.
    assert_eq!(provider.ref_reads.load(Ordering::SeqCst), 2);
    expander.expand("src/lib.rs", 15, 19).await.unwrap_err();
    assert_eq!(provider.ref_reads.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn unresolved_merge_base_reads_head() {
    let provider = FakeProvider::default().with_file("HEAD", "src/lib.rs", source(100));
    let session = DiffSession::Branch { name: "feature".into() };
    let (provider, expander) = expander(provider, session);

    expander.expand("src/lib.rs", 15, 19).await.unwrap();
    assert_eq!(provider.ref_reads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unknown_file_is_rejected() {
    let (_provider, expander) = expander(FakeProvider::default(), DiffSession::Unstaged);
    assert_eq!(
        expander.expand("nope.rs", 1, 2).await,
        Err(ExpandError::UnknownFile("nope.rs".into()))
    );
}

#[tokio::test]
async fn collapsed_comment_appears_after_expansion() {
    let provider = FakeProvider::default().with_file(":0", "src/lib.rs", source(100));
    let (_provider, expander) = expander(provider, DiffSession::Unstaged);
    let mut store = AnchorStore::new();
    let id = store.add_comment("src/lib.rs", 48, 50, Side::New, "check this");

    let before = expander.hunks("src/lib.rs").unwrap();
    assert!(store.placement("src/lib.rs", &before).widgets.is_empty());

    let after = expander.expand("src/lib.rs", 40, 55).await.unwrap();
    let placement = store.placement("src/lib.rs", &after);
    let key = "N50".parse::<ChangeKey>().unwrap();
    assert_eq!(placement.widgets[&key].len(), 1);
    assert_eq!(store.get(id).map(|c| c.end_line), Some(50));
}
