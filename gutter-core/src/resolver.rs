//! Maps a rendered node to a semantic `{file, line, side}` coordinate.
//!
//! Two addressing schemes coexist in one document: table rows of a diff
//! (`td[data-change-key]` inside `[data-diff-file]`) and lines of a flat file
//! viewer (`[data-line-number]` inside `[data-file-viewer]`). They are tried
//! in a fixed order; a node neither scheme recognises resolves to `None`,
//! which callers treat as a no-op.

use crate::dom::{Document, NodeId, Tag, MAX_DEPTH};
use crate::types::{ChangeKey, LineRef, Side};

pub const CHANGE_KEY_ATTR: &str = "data-change-key";
pub const DIFF_FILE_ATTR: &str = "data-diff-file";
pub const LINE_NUMBER_ATTR: &str = "data-line-number";
pub const LINE_SIDE_ATTR: &str = "data-line-side";
pub const FILE_VIEWER_ATTR: &str = "data-file-viewer";

/// One way of addressing a line in the rendered tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    /// Diff table cells keyed by a change key.
    Tabular,
    /// Flat file lines keyed by number and optional side.
    FlatFile,
}

/// Resolution order.
pub const SCHEMES: [Scheme; 2] = [Scheme::Tabular, Scheme::FlatFile];

/// Resolves `node` (text or element, possibly deep inside highlighting
/// spans) to a line coordinate.
pub fn resolve(doc: &Document, node: NodeId) -> Option<LineRef> {
    SCHEMES.iter().find_map(|scheme| scheme.resolve(doc, node))
}

impl Scheme {
    pub fn resolve(self, doc: &Document, node: NodeId) -> Option<LineRef> {
        match self {
            Scheme::Tabular => resolve_tabular(doc, node),
            Scheme::FlatFile => resolve_flat(doc, node),
        }
    }
}

/// First element at or above `node`; text nodes start at their parent.
fn start_element(doc: &Document, node: NodeId) -> Option<NodeId> {
    if doc.is_text(node) {
        doc.parent(node)
    } else {
        Some(node)
    }
}

fn resolve_tabular(doc: &Document, node: NodeId) -> Option<LineRef> {
    let mut current = start_element(doc, node);
    let mut steps = 0;
    while let Some(el) = current {
        if steps > MAX_DEPTH || doc.tag(el) == Some(Tag::Table) {
            return None;
        }
        if doc.tag(el) == Some(Tag::Td) {
            if let Some(raw) = doc.attr(el, CHANGE_KEY_ATTR).filter(|v| !v.is_empty()) {
                let key: ChangeKey = raw.parse().ok()?;
                let file = enclosing_attr(doc, el, DIFF_FILE_ATTR);
                return Some(LineRef { file, line: key.line, side: key.side() });
            }
        }
        current = doc.parent(el);
        steps += 1;
    }
    None
}

fn resolve_flat(doc: &Document, node: NodeId) -> Option<LineRef> {
    let mut current = start_element(doc, node);
    let mut steps = 0;
    while let Some(el) = current {
        if steps > MAX_DEPTH {
            return None;
        }
        if let Some(raw) = doc.attr(el, LINE_NUMBER_ATTR).filter(|v| !v.is_empty()) {
            let line = raw.parse::<u32>().ok()?;
            let side = doc
                .attr(el, LINE_SIDE_ATTR)
                .and_then(Side::parse)
                .unwrap_or(Side::New);
            let file = enclosing_attr(doc, el, FILE_VIEWER_ATTR);
            return Some(LineRef { file, line, side });
        }
        current = doc.parent(el);
        steps += 1;
    }
    None
}

/// Value of `name` on the nearest ancestor carrying it, or empty.
fn enclosing_attr(doc: &Document, el: NodeId, name: &str) -> String {
    doc.closest(el, |e| e.attr(name).is_some())
        .and_then(|owner| doc.attr(owner, name))
        .unwrap_or_default()
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `div[data-diff-file] > table > tr > td[key] > span > span > text`
    fn diff_cell(doc: &mut Document, file: &str, key: &str) -> NodeId {
        let wrapper = doc.element_with(Tag::Div, &[], &[(DIFF_FILE_ATTR, file)]);
        let table = doc.create_element(Tag::Table);
        let row = doc.create_element(Tag::Tr);
        let cell = doc.element_with(Tag::Td, &["diff-code-cell"], &[(CHANGE_KEY_ATTR, key)]);
        let outer = doc.create_element(Tag::Span);
        let inner = doc.create_element(Tag::Span);
        let text = doc.create_text("let x = 1;");
        let root = doc.root();
        doc.append_child(root, wrapper);
        doc.append_child(wrapper, table);
        doc.append_child(table, row);
        doc.append_child(row, cell);
        doc.append_child(cell, outer);
        doc.append_child(outer, inner);
        doc.append_child(inner, text);
        text
    }

    #[test]
    fn resolves_diff_cells_from_deep_text() {
        let mut doc = Document::new();
        let text = diff_cell(&mut doc, "src/lib.rs", "I42");
        let resolved = resolve(&doc, text).unwrap();
        assert_eq!(
            resolved,
            LineRef { file: "src/lib.rs".into(), line: 42, side: Side::New }
        );
        assert_eq!(resolve(&doc, text), Some(resolved));
    }

    #[test]
    fn delete_keys_resolve_to_old_side() {
        let mut doc = Document::new();
        let text = diff_cell(&mut doc, "a.rs", "D7");
        assert_eq!(resolve(&doc, text).map(|r| r.side), Some(Side::Old));
    }

    #[test]
    fn malformed_key_is_none() {
        let mut doc = Document::new();
        let text = diff_cell(&mut doc, "a.rs", "Nx");
        assert_eq!(resolve(&doc, text), None);
    }

    #[test]
    fn tabular_ascent_stops_at_table() {
        let mut doc = Document::new();
        let outer = doc.element_with(Tag::Td, &[], &[(CHANGE_KEY_ATTR, "N1")]);
        let table = doc.create_element(Tag::Table);
        let text = doc.create_text("x");
        let root = doc.root();
        doc.append_child(root, outer);
        doc.append_child(outer, table);
        doc.append_child(table, text);
        assert_eq!(resolve(&doc, text), None);
    }

    #[test]
    fn flat_file_defaults_to_new_side() {
        let mut doc = Document::new();
        let viewer = doc.element_with(Tag::Div, &[], &[(FILE_VIEWER_ATTR, "README.md")]);
        let line = doc.element_with(Tag::Div, &[], &[(LINE_NUMBER_ATTR, "12")]);
        let span = doc.create_element(Tag::Span);
        let text = doc.create_text("hello");
        let root = doc.root();
        doc.append_child(root, viewer);
        doc.append_child(viewer, line);
        doc.append_child(line, span);
        doc.append_child(span, text);

        assert_eq!(
            resolve(&doc, text),
            Some(LineRef { file: "README.md".into(), line: 12, side: Side::New })
        );
        doc.set_attr(line, LINE_SIDE_ATTR, "old");
        assert_eq!(resolve(&doc, span).map(|r| r.side), Some(Side::Old));
    }

    #[test]
    fn unrelated_nodes_resolve_to_none() {
        let mut doc = Document::new();
        let text = doc.create_text("nothing here");
        let root = doc.root();
        doc.append_child(root, text);
        assert_eq!(resolve(&doc, text), None);
        assert_eq!(resolve(&doc, root), None);
    }
}
