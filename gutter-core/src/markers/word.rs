//! Double-click word highlight.

use super::text::{build_pattern, clear_marks, code_containers, mark_all, MatchOptions};
use crate::dom::{Document, NodeId};

pub const WORD_HIGHLIGHT_CLASS: &str = "word-highlight";

const WORD_OPTIONS: MatchOptions = MatchOptions { case_sensitive: true, whole_word: true };

/// The word to highlight for a selection: a single run of non-whitespace
/// characters longer than one character.
pub fn highlightable(selection: &str) -> Option<&str> {
    let trimmed = selection.trim();
    let single_run = !trimmed.chars().any(char::is_whitespace);
    (trimmed.chars().count() > 1 && single_run).then_some(trimmed)
}

/// The identifier-like run around byte `index` of `line`, as a double-click
/// would select it.
pub fn word_at(line: &str, index: usize) -> Option<&str> {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    if index >= line.len() || !line.is_char_boundary(index) {
        return None;
    }
    if !line[index..].chars().next().is_some_and(is_word) {
        return None;
    }
    let start = line[..index]
        .char_indices()
        .rev()
        .take_while(|&(_, c)| is_word(c))
        .last()
        .map_or(index, |(i, _)| i);
    let end = line[index..]
        .char_indices()
        .find(|&(_, c)| !is_word(c))
        .map_or(line.len(), |(i, _)| index + i);
    (end > start).then(|| &line[start..end])
}

#[derive(Debug)]
pub struct WordHighlighter {
    root: NodeId,
    word: Option<String>,
    marks: Vec<NodeId>,
}

impl WordHighlighter {
    pub fn new(root: NodeId) -> Self {
        Self { root, word: None, marks: Vec::new() }
    }

    pub fn word(&self) -> Option<&str> {
        self.word.as_deref()
    }

    pub fn marks(&self) -> &[NodeId] {
        &self.marks
    }

    /// Highlights every whole-word, case-sensitive occurrence of the
    /// selection. Returns false and leaves the highlight alone if the
    /// selection is not a single word.
    pub fn highlight(&mut self, doc: &mut Document, selection: &str) -> bool {
        let Some(word) = highlightable(selection) else {
            return false;
        };
        self.word = Some(word.to_owned());
        self.apply(doc);
        true
    }

    /// Re-marks the current word after the document was re-rendered.
    pub fn reapply(&mut self, doc: &mut Document) {
        if self.word.is_some() {
            self.apply(doc);
        }
    }

    pub fn clear(&mut self, doc: &mut Document) {
        self.word = None;
        self.marks.clear();
        clear_marks(doc, self.root, WORD_HIGHLIGHT_CLASS);
    }

    fn apply(&mut self, doc: &mut Document) {
        clear_marks(doc, self.root, WORD_HIGHLIGHT_CLASS);
        let pattern = self.word.as_deref().and_then(|w| build_pattern(w, WORD_OPTIONS));
        self.marks = match pattern {
            Some(pattern) => {
                let containers = code_containers(doc, self.root);
                mark_all(doc, &containers, &pattern, WORD_HIGHLIGHT_CLASS)
            }
            None => Vec::new(),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_single_words_qualify() {
        assert_eq!(highlightable(" value "), Some("value"));
        assert_eq!(highlightable("x"), None);
        assert_eq!(highlightable("a b"), None);
        assert_eq!(highlightable(""), None);
        assert_eq!(highlightable("a.b"), Some("a.b"));
    }

    #[test]
    fn word_at_expands_around_index() {
        let line = "let total_count = 3;";
        assert_eq!(word_at(line, 6), Some("total_count"));
        assert_eq!(word_at(line, 4), Some("total_count"));
        assert_eq!(word_at(line, 3), None);
        assert_eq!(word_at(line, 0), Some("let"));
        assert_eq!(word_at(line, 99), None);
    }
}
