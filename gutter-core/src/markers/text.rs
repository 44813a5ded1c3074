//! The marking primitive shared by search and word highlight.
//!
//! Text inside a code container is usually split across many nodes by
//! syntax highlighting. Matching runs over the concatenation of a
//! container's text nodes; each match is then mapped back to a pair of
//! `(node, offset)` boundaries and extracted into a `<mark>` element.

use regex::{Regex, RegexBuilder};

use crate::dom::{Boundary, Document, Element, NodeId, Tag};

/// Classes of elements whose text is searchable.
pub const CODE_CLASSES: [&str; 2] = ["diff-code-cell", "diff-code"];

/// How a query is turned into a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MatchOptions {
    pub case_sensitive: bool,
    pub whole_word: bool,
}

/// Compiles `query` as a literal pattern. A blank query has no pattern.
pub fn build_pattern(query: &str, options: MatchOptions) -> Option<Regex> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return None;
    }
    let escaped = regex::escape(trimmed);
    let pattern = if options.whole_word { format!(r"\b{escaped}\b") } else { escaped };
    RegexBuilder::new(&pattern)
        .case_insensitive(!options.case_sensitive)
        .build()
        .ok()
}

/// Rendered code containers under `root`, in document order. A container
/// nested inside another one is not listed twice.
pub fn code_containers(doc: &Document, root: NodeId) -> Vec<NodeId> {
    let candidates: Vec<NodeId> = doc
        .descendants(root)
        .into_iter()
        .filter(|&id| CODE_CLASSES.iter().any(|class| doc.has_class(id, class)))
        .collect();
    candidates
        .iter()
        .copied()
        .filter(|&id| {
            !doc
                .ancestors(id)
                .iter()
                .any(|a| candidates.contains(a))
        })
        .filter(|&id| doc.is_rendered(id))
        .collect()
}

/// True if `node` lies inside a code container.
pub fn in_code(doc: &Document, node: NodeId) -> bool {
    doc.closest(node, |e| CODE_CLASSES.iter().any(|class| e.has_class(class)))
        .is_some()
}

fn skip_subtree(element: &Element) -> bool {
    matches!(element.tag, Tag::Script | Tag::Style | Tag::Mark)
}

/// One text node's byte span inside the concatenated container text.
#[derive(Debug, Clone, Copy)]
struct Segment {
    node: NodeId,
    start: usize,
    end: usize,
}

/// Match boundaries inside `container`, in document order.
fn find_ranges(doc: &Document, container: NodeId, pattern: &Regex) -> Vec<(Boundary, Boundary)> {
    let mut text = String::new();
    let mut segments = Vec::new();
    for node in doc.text_nodes(container, skip_subtree) {
        let value = doc.text(node).unwrap_or_default();
        if value.is_empty() {
            continue;
        }
        let start = text.len();
        text.push_str(value);
        segments.push(Segment { node, start, end: text.len() });
    }

    pattern
        .find_iter(&text)
        .filter(|m| !m.is_empty())
        .filter_map(|m| {
            let first = segments.iter().find(|s| m.start() < s.end)?;
            let last = segments.iter().find(|s| s.start < m.end() && m.end() <= s.end)?;
            Some((
                Boundary { node: first.node, offset: m.start() - first.start },
                Boundary { node: last.node, offset: m.end() - last.start },
            ))
        })
        .collect()
}

/// Wraps every match of `pattern` in `containers` in a `mark.{class}` and
/// returns the marks in document order.
pub fn mark_all(doc: &mut Document, containers: &[NodeId], pattern: &Regex, class: &str) -> Vec<NodeId> {
    let ranges: Vec<(Boundary, Boundary)> = containers
        .iter()
        .flat_map(|&container| find_ranges(doc, container, pattern))
        .collect();

    // Later ranges first: wrapping only splits nodes at or after its own
    // start, so earlier boundaries stay valid.
    let mut marks = Vec::with_capacity(ranges.len());
    for (start, end) in ranges.into_iter().rev() {
        let mark = doc.element_with(Tag::Mark, &[class], &[]);
        if doc.wrap_range(start, end, mark) {
            marks.push(mark);
        }
    }
    marks.reverse();
    marks
}

/// Unwraps every `mark.{class}` under `root` and merges the text it split.
pub fn clear_marks(doc: &mut Document, root: NodeId, class: &str) {
    let marks: Vec<NodeId> = doc
        .find_by_class(root, class)
        .into_iter()
        .filter(|&id| doc.tag(id) == Some(Tag::Mark))
        .collect();
    let mut parents = Vec::new();
    for mark in marks {
        let Some(parent) = doc.parent(mark) else { continue };
        for child in doc.children(mark).to_vec() {
            doc.insert_before(parent, child, Some(mark));
        }
        doc.remove(mark);
        if !parents.contains(&parent) {
            parents.push(parent);
        }
    }
    for parent in parents {
        doc.normalize(parent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `div.diff-code > [span "val", span "ue", " and value"]`
    fn split_value(doc: &mut Document) -> NodeId {
        let code = doc.element_with(Tag::Div, &["diff-code"], &[]);
        let a = doc.create_element(Tag::Span);
        let b = doc.create_element(Tag::Span);
        let t1 = doc.create_text("val");
        let t2 = doc.create_text("ue");
        let t3 = doc.create_text(" and value");
        let root = doc.root();
        doc.append_child(root, code);
        doc.append_child(code, a);
        doc.append_child(a, t1);
        doc.append_child(code, b);
        doc.append_child(b, t2);
        doc.append_child(code, t3);
        code
    }

    #[test]
    fn blank_query_has_no_pattern() {
        assert!(build_pattern("   ", MatchOptions::default()).is_none());
        let pattern = build_pattern(" a.b ", MatchOptions::default()).unwrap();
        assert!(pattern.is_match("A.B"));
        assert!(!pattern.is_match("axb"));
    }

    #[test]
    fn marks_span_highlighting_boundaries() {
        let mut doc = Document::new();
        let code = split_value(&mut doc);
        let pattern = build_pattern("value", MatchOptions::default()).unwrap();
        let marks = mark_all(&mut doc, &[code], &pattern, "hit");

        assert_eq!(marks.len(), 2);
        assert_eq!(doc.text_content(marks[0]), "value");
        assert_eq!(doc.text_content(marks[1]), "value");
        assert_eq!(doc.text_content(code), "value and value");
    }

    #[test]
    fn clearing_restores_text_nodes() {
        let mut doc = Document::new();
        let code = split_value(&mut doc);
        let pattern = build_pattern("and", MatchOptions::default()).unwrap();
        mark_all(&mut doc, &[code], &pattern, "hit");
        clear_marks(&mut doc, code, "hit");

        assert!(doc.find_by_class(code, "hit").is_empty());
        let last = *doc.children(code).last().unwrap();
        assert_eq!(doc.text(last), Some(" and value"));
    }

    #[test]
    fn whole_word_case_sensitive() {
        let options = MatchOptions { case_sensitive: true, whole_word: true };
        let pattern = build_pattern("val", options).unwrap();
        assert!(!pattern.is_match("value"));
        assert!(pattern.is_match("let val = 1"));
        assert!(!pattern.is_match("VAL"));
    }

    #[test]
    fn hidden_and_nested_containers_are_skipped() {
        let mut doc = Document::new();
        let cell = doc.element_with(Tag::Td, &["diff-code-cell"], &[]);
        let inner = doc.element_with(Tag::Div, &["diff-code"], &[]);
        let hidden = doc.element_with(Tag::Div, &["diff-code"], &[]);
        let root = doc.root();
        doc.append_child(root, cell);
        doc.append_child(cell, inner);
        doc.append_child(root, hidden);
        doc.set_display_none(hidden, true);

        assert_eq!(code_containers(&doc, root), vec![cell]);
    }
}
