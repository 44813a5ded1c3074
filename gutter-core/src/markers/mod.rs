//! Search and word highlight over one rendered document.
//!
//! Both engines mark text with the same primitive ([`text`]) under
//! different classes. They never coexist: opening the search drops the
//! word highlight, and double-clicks are ignored while the search is open.

pub mod search;
pub mod text;
pub mod word;

use std::time::Instant;

use crate::dom::{Document, NodeId};

pub use search::{SearchEngine, SEARCH_CLASS, SEARCH_CURRENT_CLASS};
pub use text::{build_pattern, clear_marks, code_containers, mark_all, MatchOptions};
pub use word::{highlightable, word_at, WordHighlighter, WORD_HIGHLIGHT_CLASS};

#[derive(Debug)]
pub struct Markers {
    pub search: SearchEngine,
    pub words: WordHighlighter,
}

impl Markers {
    /// Marks inside `root` (the diff view container).
    pub fn new(root: NodeId) -> Self {
        Self { search: SearchEngine::new(root), words: WordHighlighter::new(root) }
    }

    pub fn open_search(&mut self, doc: &mut Document) {
        self.words.clear(doc);
        self.search.open(doc);
    }

    pub fn close_search(&mut self, doc: &mut Document) {
        self.search.close(doc);
    }

    /// A double-click on `target` with `selection` as the selected text.
    pub fn double_click(&mut self, doc: &mut Document, target: NodeId, selection: &str) -> bool {
        if self.search.is_open() || !text::in_code(doc, target) {
            return false;
        }
        self.words.highlight(doc, selection)
    }

    /// Any plain single click.
    pub fn click(&mut self, doc: &mut Document) {
        if self.words.word().is_some() {
            self.words.clear(doc);
        }
    }

    /// Called after the renderer replaced the document's content.
    pub fn after_render(&mut self, doc: &mut Document) {
        if !self.search.is_open() {
            self.words.reapply(doc);
        }
    }

    /// Drives the search debounce.
    pub fn poll(&mut self, doc: &mut Document, now: Instant) -> bool {
        self.search.poll(doc, now)
    }
}
