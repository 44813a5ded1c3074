//! Incremental text search over rendered code.

use std::time::{Duration, Instant};

use tracing::debug;

use super::text::{build_pattern, clear_marks, code_containers, mark_all, MatchOptions};
use crate::dom::{Document, NodeId, ObserverId};

pub const SEARCH_CLASS: &str = "search-match";
pub const SEARCH_CURRENT_CLASS: &str = "search-match-current";

/// Quiet period after the last container mutation before a re-scan.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

/// Search state for one rendered document.
///
/// While open, the engine observes `root`; bursts of mutations are
/// coalesced and re-scanned once they go quiet for the debounce period.
/// Re-scans keep the current match index, clamped to the new match count.
#[derive(Debug)]
pub struct SearchEngine {
    root: NodeId,
    debounce: Duration,
    open: bool,
    query: String,
    options: MatchOptions,
    matches: Vec<NodeId>,
    current: Option<usize>,
    observer: Option<ObserverId>,
    last_mutation: Option<Instant>,
}

impl SearchEngine {
    pub fn new(root: NodeId) -> Self {
        Self {
            root,
            debounce: DEFAULT_DEBOUNCE,
            open: false,
            query: String::new(),
            options: MatchOptions::default(),
            matches: Vec::new(),
            current: None,
            observer: None,
            last_mutation: None,
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn matches(&self) -> &[NodeId] {
        &self.matches
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current_match(&self) -> Option<NodeId> {
        self.current.and_then(|i| self.matches.get(i).copied())
    }

    /// `"3/7"`-style position, or `None` with no matches.
    pub fn position_label(&self) -> Option<String> {
        self.current.map(|i| format!("{}/{}", i + 1, self.matches.len()))
    }

    pub fn open(&mut self, doc: &mut Document) {
        if self.open {
            return;
        }
        self.open = true;
        self.observer = Some(doc.observe(self.root));
    }

    /// Replaces the query and marks from the first match. Returns the match
    /// to scroll to.
    pub fn set_query(&mut self, doc: &mut Document, query: &str) -> Option<NodeId> {
        if !self.open {
            self.open(doc);
        }
        self.query = query.to_owned();
        self.rescan(doc, 0)
    }

    pub fn next(&mut self, doc: &mut Document) -> Option<NodeId> {
        let len = self.matches.len();
        if len == 0 {
            return None;
        }
        let index = self.current.map_or(0, |i| (i + 1) % len);
        self.set_current(doc, index)
    }

    pub fn prev(&mut self, doc: &mut Document) -> Option<NodeId> {
        let len = self.matches.len();
        if len == 0 {
            return None;
        }
        let index = self.current.map_or(len - 1, |i| (i + len - 1) % len);
        self.set_current(doc, index)
    }

    /// Closes the search and removes every mark.
    pub fn close(&mut self, doc: &mut Document) {
        if let Some(observer) = self.observer.take() {
            doc.disconnect(observer);
        }
        self.open = false;
        self.query.clear();
        self.matches.clear();
        self.current = None;
        self.last_mutation = None;
        clear_all(doc, self.root);
    }

    /// Drains pending mutations and re-scans once the debounce period has
    /// passed since the last one. Returns true if a re-scan ran.
    pub fn poll(&mut self, doc: &mut Document, now: Instant) -> bool {
        let Some(observer) = self.observer else {
            return false;
        };
        if !doc.take_records(observer).is_empty() {
            self.last_mutation = Some(now);
        }
        match self.last_mutation {
            Some(at) if now.duration_since(at) >= self.debounce => {
                self.last_mutation = None;
                if self.query.trim().is_empty() {
                    return false;
                }
                debug!(query = %self.query, "re-scanning after content change");
                self.rescan(doc, self.current.unwrap_or(0));
                true
            }
            _ => false,
        }
    }

    /// Time left until a pending re-scan is due.
    pub fn pending(&self, now: Instant) -> Option<Duration> {
        self.last_mutation
            .map(|at| self.debounce.saturating_sub(now.duration_since(at)))
    }

    fn rescan(&mut self, doc: &mut Document, preferred: usize) -> Option<NodeId> {
        if let Some(observer) = self.observer.take() {
            doc.disconnect(observer);
        }
        clear_all(doc, self.root);
        self.matches = match build_pattern(&self.query, self.options) {
            Some(pattern) => {
                let containers = code_containers(doc, self.root);
                mark_all(doc, &containers, &pattern, SEARCH_CLASS)
            }
            None => Vec::new(),
        };
        self.current = None;
        let target = if self.matches.is_empty() {
            None
        } else {
            self.set_current(doc, preferred.min(self.matches.len() - 1))
        };
        if self.open {
            self.observer = Some(doc.observe(self.root));
        }
        target
    }

    fn set_current(&mut self, doc: &mut Document, index: usize) -> Option<NodeId> {
        for &mark in &self.matches {
            doc.remove_class(mark, SEARCH_CURRENT_CLASS);
        }
        let mark = *self.matches.get(index)?;
        doc.add_class(mark, SEARCH_CURRENT_CLASS);
        self.current = Some(index);
        Some(mark)
    }
}

fn clear_all(doc: &mut Document, root: NodeId) {
    clear_marks(doc, root, SEARCH_CURRENT_CLASS);
    clear_marks(doc, root, SEARCH_CLASS);
}
