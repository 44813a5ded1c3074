//! Collapsed-context gaps and lazy hunk expansion.
//!
//! A [`Gap`] is a run of old-side lines hidden between (or around) hunks.
//! Expanding a gap fetches the file's pre-image once per diff session,
//! splices the requested lines in as `Normal` context and merges any hunks
//! the new context now touches. The spliced list replaces the previous one
//! and is what every later expansion and key lookup sees.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::error::{ExpandError, SourceError};
use crate::source::{fetch_source, split_lines, FileContentProvider};
use crate::types::{Change, DiffSession, FileDiff, Hunk};

/// Lines revealed by a partial expansion.
pub const EXPAND_STEP: u32 = 15;

/// A collapsed old-side line range `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gap {
    pub start: u32,
    pub end: u32,
    /// A hunk sits directly above the gap.
    pub has_previous: bool,
    /// A hunk sits directly below the gap.
    pub has_next: bool,
}

/// One expansion control offered on a gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapAction {
    /// The first [`EXPAND_STEP`] lines, adjacent to the hunk above.
    AfterPrevious,
    /// The last [`EXPAND_STEP`] lines, adjacent to the hunk below.
    BeforeNext,
    All,
}

impl Gap {
    pub fn len(&self) -> u32 {
        self.end + 1 - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Controls for this gap. Gaps longer than [`EXPAND_STEP`] get partial
    /// expansions toward whichever neighbouring hunks exist.
    pub fn actions(&self) -> Vec<GapAction> {
        let mut actions = Vec::with_capacity(3);
        if self.len() > EXPAND_STEP {
            if self.has_previous {
                actions.push(GapAction::AfterPrevious);
            }
            if self.has_next {
                actions.push(GapAction::BeforeNext);
            }
        }
        actions.push(GapAction::All);
        actions
    }
}

impl GapAction {
    /// The inclusive line range this action expands within `gap`.
    pub fn range(self, gap: &Gap) -> (u32, u32) {
        match self {
            GapAction::AfterPrevious => (gap.start, (gap.start + EXPAND_STEP - 1).min(gap.end)),
            GapAction::BeforeNext => ((gap.end + 1).saturating_sub(EXPAND_STEP).max(gap.start), gap.end),
            GapAction::All => (gap.start, gap.end),
        }
    }

    pub fn label(self, gap: &Gap) -> String {
        match self {
            GapAction::AfterPrevious => format!("↓ {EXPAND_STEP} lines"),
            GapAction::BeforeNext => format!("↑ {EXPAND_STEP} lines"),
            GapAction::All => format!("↕ all {} lines", gap.len()),
        }
    }
}

/// The collapsed range between `prev` and `next`.
///
/// With no previous hunk the gap runs from line 1; with no next hunk it runs
/// to `total_lines`. Returns `None` when the range is empty or there is no
/// hunk on either side.
pub fn compute_gap(prev: Option<&Hunk>, next: Option<&Hunk>, total_lines: u32) -> Option<Gap> {
    let (start, end) = match (prev, next) {
        (None, Some(next)) => (1, i64::from(next.old_start) - 1),
        (Some(prev), None) => (i64::from(prev.old_end()), i64::from(total_lines)),
        (Some(prev), Some(next)) => (i64::from(prev.old_end()), i64::from(next.old_start) - 1),
        (None, None) => return None,
    };
    // Whole-file additions report `-0,0`.
    let start = start.max(1);
    if end - start + 1 <= 0 {
        return None;
    }
    Some(Gap {
        start: u32::try_from(start).ok()?,
        end: u32::try_from(end).ok()?,
        has_previous: prev.is_some(),
        has_next: next.is_some(),
    })
}

/// Every gap around `hunks`, in file order. The gap below the last hunk is
/// only known once `total_lines` is.
pub fn gaps(hunks: &[Hunk], total_lines: Option<u32>) -> Vec<Gap> {
    let Some(first) = hunks.first() else {
        return Vec::new();
    };
    let mut out = Vec::new();
    out.extend(compute_gap(None, Some(first), 0));
    for pair in hunks.windows(2) {
        out.extend(compute_gap(Some(&pair[0]), Some(&pair[1]), 0));
    }
    if let (Some(last), Some(total)) = (hunks.last(), total_lines) {
        out.extend(compute_gap(Some(last), None, total));
    }
    out
}

/// Splices old-side lines `[start, end]` of `source` into `hunks` as context
/// and merges hunks that end up touching. Lines already inside a hunk are
/// left alone; the range is clamped to the source.
pub fn splice_context(hunks: &[Hunk], source: &[String], start: u32, end: u32) -> Vec<Hunk> {
    let total = u32::try_from(source.len()).unwrap_or(u32::MAX);
    let start = start.max(1);
    let end = end.min(total);
    let mut all: Vec<Hunk> = hunks.to_vec();
    all.sort_by_key(|h| h.old_start);
    if start > end {
        return all;
    }

    let mut context: Vec<Hunk> = Vec::new();
    for line in start..=end {
        if all.iter().any(|h| (h.old_start..h.old_end()).contains(&line)) {
            continue;
        }
        let new_line = shift_to_new(&all, line);
        let content = source[(line - 1) as usize].clone();
        match context.last_mut() {
            Some(run) if run.old_end() == line => {
                run.old_lines += 1;
                run.new_lines += 1;
                run.changes.push(Change::Normal { old_line: line, new_line, content });
            }
            _ => context.push(Hunk {
                old_start: line,
                old_lines: 1,
                new_start: new_line,
                new_lines: 1,
                changes: vec![Change::Normal { old_line: line, new_line, content }],
            }),
        }
    }

    all.extend(context);
    all.sort_by_key(|h| h.old_start);
    merge_touching(all)
}

/// New-side number of an unchanged old-side `line` outside every hunk.
fn shift_to_new(hunks: &[Hunk], line: u32) -> u32 {
    let delta = hunks
        .iter()
        .filter(|h| h.old_end() <= line)
        .max_by_key(|h| h.old_end())
        .map_or(0, |h| i64::from(h.new_end()) - i64::from(h.old_end()));
    u32::try_from(i64::from(line) + delta).unwrap_or(line)
}

fn merge_touching(sorted: Vec<Hunk>) -> Vec<Hunk> {
    let mut merged: Vec<Hunk> = Vec::with_capacity(sorted.len());
    for hunk in sorted {
        match merged.last_mut() {
            Some(current) if hunk.old_start <= current.old_end() => {
                let old_end = current.old_end().max(hunk.old_end());
                let new_end = current.new_end().max(hunk.new_end());
                current.old_lines = old_end - current.old_start;
                current.new_lines = new_end - current.new_start;
                current.changes.extend(hunk.changes);
            }
            _ => merged.push(hunk),
        }
    }
    merged
}

type SourceCell = Arc<OnceCell<Arc<[String]>>>;

/// Per-session map of file path to source lines.
///
/// Each entry is a once-cell, so concurrent requests for one file share a
/// single fetch. A failed fetch leaves its cell empty.
#[derive(Debug, Default)]
pub struct SourceCache {
    session: DiffSession,
    entries: HashMap<String, SourceCell>,
}

impl SourceCache {
    pub fn new(session: DiffSession) -> Self {
        Self { session, entries: HashMap::new() }
    }

    pub fn session(&self) -> &DiffSession {
        &self.session
    }

    /// Drops every entry if `session` differs from the one the cache was
    /// filled under. Returns true when entries were dropped.
    pub fn ensure_session(&mut self, session: &DiffSession) -> bool {
        if &self.session == session {
            return false;
        }
        self.session = session.clone();
        self.entries.clear();
        true
    }

    /// The cell for `file`, created empty on first use.
    fn cell(&mut self, file: &str) -> SourceCell {
        self.entries.entry(file.to_owned()).or_default().clone()
    }

    /// Cached lines for `file`, if a fetch has completed.
    pub fn get(&self, file: &str) -> Option<Arc<[String]>> {
        self.entries.get(file).and_then(|cell| cell.get().cloned())
    }

    /// Number of files with cached lines.
    pub fn len(&self) -> usize {
        self.entries.values().filter(|cell| cell.initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Default)]
struct ExpanderState {
    generation: u64,
    cache: SourceCache,
    files: HashMap<String, FileDiff>,
    expanded: HashMap<String, Vec<Hunk>>,
}

/// Owns the current hunk list of every file and expands it on request.
pub struct ContextExpander<P> {
    provider: Arc<P>,
    state: Mutex<ExpanderState>,
}

impl<P: FileContentProvider> ContextExpander<P> {
    pub fn new(provider: Arc<P>, session: DiffSession) -> Self {
        Self {
            provider,
            state: Mutex::new(ExpanderState {
                cache: SourceCache::new(session),
                ..ExpanderState::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ExpanderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn session(&self) -> DiffSession {
        self.lock().cache.session().clone()
    }

    /// Switches the diff session. A different session clears all cached
    /// source and every expansion; in-flight fetches become stale.
    pub fn set_session(&self, session: DiffSession) -> bool {
        let mut state = self.lock();
        if !state.cache.ensure_session(&session) {
            return false;
        }
        state.generation += 1;
        state.expanded.clear();
        debug!(session = %session.label(), "diff session changed, expansion state cleared");
        true
    }

    /// Replaces the diff this expander works on. Expansions of the previous
    /// diff are dropped; cached source stays valid for the session.
    pub fn set_files(&self, files: Vec<FileDiff>) {
        let mut state = self.lock();
        state.expanded.clear();
        state.files = files.into_iter().map(|f| (f.path.clone(), f)).collect();
    }

    /// Current hunk list of `file`: the last expansion, else the original.
    pub fn hunks(&self, file: &str) -> Option<Vec<Hunk>> {
        let state = self.lock();
        state
            .expanded
            .get(file)
            .or_else(|| state.files.get(file).map(|f| &f.hunks))
            .cloned()
    }

    /// Old-side line count of `file`, from cached source or diff metadata.
    pub fn total_lines(&self, file: &str) -> Option<u32> {
        let state = self.lock();
        state
            .cache
            .get(file)
            .and_then(|lines| u32::try_from(lines.len()).ok())
            .or_else(|| state.files.get(file).and_then(|f| f.old_line_count))
    }

    pub fn is_cached(&self, file: &str) -> bool {
        self.lock().cache.get(file).is_some()
    }

    pub fn cached_files(&self) -> usize {
        self.lock().cache.len()
    }

    pub fn expanded_files(&self) -> usize {
        self.lock().expanded.len()
    }

    /// Reveals old-side lines `[start, end]` of `file` and returns its new
    /// hunk list.
    pub async fn expand(&self, file: &str, start: u32, end: u32) -> Result<Vec<Hunk>, ExpandError> {
        let (cell, session, generation) = {
            let mut state = self.lock();
            if !state.files.contains_key(file) {
                return Err(ExpandError::UnknownFile(file.to_owned()));
            }
            let session = state.cache.session().clone();
            (state.cache.cell(file), session, state.generation)
        };

        if cell.initialized() {
            debug!(file, "source cache hit");
        }
        let provider = Arc::clone(&self.provider);
        let lines = cell
            .get_or_try_init(|| async {
                debug!(file, session = %session.label(), "fetching source");
                let text = fetch_source(provider.as_ref(), &session, file).await?;
                Ok::<_, SourceError>(Arc::<[String]>::from(split_lines(&text)))
            })
            .await
            .map_err(|source| {
                warn!(file, error = %source, "expansion failed");
                ExpandError::Source { file: file.to_owned(), source }
            })?
            .clone();

        let mut state = self.lock();
        if state.generation != generation {
            debug!(file, "discarding expansion from previous session");
            return Err(ExpandError::StaleSession(file.to_owned()));
        }
        let current = match state.expanded.get(file) {
            Some(hunks) => hunks.clone(),
            None => state.files.get(file).map(|f| f.hunks.clone()).unwrap_or_default(),
        };
        let next = splice_context(&current, &lines, start, end);
        debug!(file, start, end, hunks = next.len(), "expanded context");
        state.expanded.insert(file.to_owned(), next.clone());
        Ok(next)
    }
}
