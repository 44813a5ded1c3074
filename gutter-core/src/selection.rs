//! Gutter range selection.
//!
//! A drag starts on pointer-down over a gutter cell and ends on the next
//! pointer-up anywhere in the document. Every transition either extends the
//! current drag or leaves the selector `Idle`; nothing waits on the gutter
//! element that started it.

use crate::dom::{Document, NodeId};
use crate::resolver;
use crate::types::{Change, Hunk, LineRef, SelectionRange, Side};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DragState {
    #[default]
    Idle,
    Dragging { file: String, anchor: u32, side: Side },
}

/// The drag state machine plus the selection it produces.
#[derive(Debug, Clone, Default)]
pub struct RangeSelector {
    state: DragState,
    selected: Option<SelectionRange>,
    last_focused: Option<LineRef>,
    suppress_next_click: bool,
}

impl RangeSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    /// The highlighted range, if any.
    pub fn selected(&self) -> Option<&SelectionRange> {
        self.selected.as_ref()
    }

    pub fn last_focused(&self) -> Option<&LineRef> {
        self.last_focused.as_ref()
    }

    /// Starts a drag at `line`; the line alone is selected immediately.
    ///
    /// The last focused line is left alone: a press is also the first half
    /// of a click, and a shift-click extends from the focus before it.
    pub fn pointer_down(&mut self, line: &LineRef) {
        self.state = DragState::Dragging {
            file: line.file.clone(),
            anchor: line.line,
            side: line.side,
        };
        self.selected = Some(SelectionRange::single(line.file.clone(), line.line, line.side));
    }

    /// Extends the drag to `line` if it lies in the dragged file and side.
    /// Returns true when the selection changed.
    pub fn pointer_enter(&mut self, line: &LineRef) -> bool {
        let DragState::Dragging { file, anchor, side } = &self.state else {
            return false;
        };
        if &line.file != file || line.side != *side {
            return false;
        }
        let next = SelectionRange::spanning(file.clone(), *anchor, line.line, *side);
        if self.selected.as_ref() == Some(&next) {
            return false;
        }
        self.selected = Some(next);
        true
    }

    /// Document-level pointer tracking: resolves whatever node is under the
    /// pointer and extends the drag to it.
    pub fn pointer_move(&mut self, doc: &Document, node: NodeId) -> bool {
        if !self.is_dragging() {
            return false;
        }
        match resolver::resolve(doc, node) {
            Some(line) => self.pointer_enter(&line),
            None => false,
        }
    }

    /// Ends the drag. A multi-line selection is committed and returned, and
    /// the click that the same gesture produces is swallowed. A single-line
    /// drag is dropped and left to the click handler.
    pub fn pointer_up(&mut self) -> Option<SelectionRange> {
        let DragState::Dragging { anchor, .. } = std::mem::take(&mut self.state) else {
            return None;
        };
        match self.selected.clone() {
            Some(range) if !range.is_single_line() => {
                let head = if range.start_line == anchor { range.end_line } else { range.start_line };
                self.last_focused = Some(LineRef { file: range.file.clone(), line: head, side: range.side });
                self.suppress_next_click = true;
                Some(range)
            }
            _ => {
                self.selected = None;
                None
            }
        }
    }

    /// An ordinary gutter click. Shift extends from the last focused line
    /// in the same file and side. Returns the range to open a form on, or
    /// `None` if this click was swallowed after a drag.
    pub fn click(&mut self, line: &LineRef, shift: bool) -> Option<SelectionRange> {
        if std::mem::take(&mut self.suppress_next_click) {
            return None;
        }
        let range = match &self.last_focused {
            Some(last) if shift && last.file == line.file && last.side == line.side => {
                SelectionRange::spanning(line.file.clone(), last.line, line.line, line.side)
            }
            _ => SelectionRange::single(line.file.clone(), line.line, line.side),
        };
        self.last_focused = Some(line.clone());
        self.selected = Some(range.clone());
        Some(range)
    }

    /// Drops any drag and the visible selection.
    pub fn cancel(&mut self) {
        self.state = DragState::Idle;
        self.selected = None;
        self.suppress_next_click = false;
    }

    /// Forgets everything, including the last focused line.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// The source text of lines `[start, end]` on `side`, joined with newlines,
/// or `None` if no such line is present in `hunks`.
pub fn extract_lines(hunks: &[Hunk], start: u32, end: u32, side: Side) -> Option<String> {
    let lines: Vec<&str> = hunks
        .iter()
        .flat_map(|h| h.changes.iter())
        .filter(|change| {
            change
                .line_on(side)
                .is_some_and(|n| (start..=end).contains(&n))
        })
        .map(Change::content)
        .collect();
    (!lines.is_empty()).then(|| lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(line: u32) -> LineRef {
        LineRef { file: "src/main.rs".into(), line, side: Side::New }
    }

    #[test]
    fn drag_extends_in_either_direction() {
        let mut selector = RangeSelector::new();
        selector.pointer_down(&at(9));
        assert_eq!(selector.selected().map(|r| (r.start_line, r.end_line)), Some((9, 9)));
        assert!(selector.pointer_enter(&at(5)));
        assert_eq!(selector.selected().map(|r| (r.start_line, r.end_line)), Some((5, 9)));
        assert!(!selector.pointer_enter(&at(5)));
    }

    #[test]
    fn drag_ignores_other_files_and_sides() {
        let mut selector = RangeSelector::new();
        selector.pointer_down(&at(5));
        let old_side = LineRef { side: Side::Old, ..at(8) };
        let other_file = LineRef { file: "b.rs".into(), ..at(8) };
        assert!(!selector.pointer_enter(&old_side));
        assert!(!selector.pointer_enter(&other_file));
        assert!(selector.selected().unwrap().is_single_line());
    }

    #[test]
    fn release_commits_and_swallows_one_click() {
        let mut selector = RangeSelector::new();
        selector.pointer_down(&at(5));
        selector.pointer_enter(&at(9));
        let committed = selector.pointer_up().unwrap();
        assert_eq!((committed.start_line, committed.end_line), (5, 9));
        assert_eq!(*selector.state(), DragState::Idle);
        assert_eq!(selector.click(&at(9), false), None);
        assert!(selector.click(&at(9), false).is_some());
    }

    #[test]
    fn single_line_release_defers_to_click() {
        let mut selector = RangeSelector::new();
        selector.pointer_down(&at(5));
        assert_eq!(selector.pointer_up(), None);
        assert!(selector.selected().is_none());
        assert_eq!(selector.click(&at(5), false), Some(SelectionRange::single("src/main.rs", 5, Side::New)));
        assert_eq!(selector.pointer_up(), None);
    }

    #[test]
    fn shift_click_spans_from_last_focus() {
        let mut selector = RangeSelector::new();
        selector.click(&at(20), false);
        let range = selector.click(&at(12), true).unwrap();
        assert_eq!((range.start_line, range.end_line), (12, 20));

        let other_side = LineRef { side: Side::Old, ..at(30) };
        assert!(selector.click(&other_side, true).unwrap().is_single_line());
    }

    #[test]
    fn shift_click_after_press_and_release_spans_lines() {
        let mut selector = RangeSelector::new();
        selector.pointer_down(&at(3));
        assert_eq!(selector.pointer_up(), None);
        assert!(selector.click(&at(3), false).unwrap().is_single_line());

        selector.pointer_down(&at(8));
        assert_eq!(selector.pointer_up(), None);
        let range = selector.click(&at(8), true).unwrap();
        assert_eq!((range.start_line, range.end_line), (3, 8));
        assert_eq!(selector.last_focused(), Some(&at(8)));
    }

    #[test]
    fn drag_release_focuses_the_released_line() {
        let mut selector = RangeSelector::new();
        selector.pointer_down(&at(9));
        selector.pointer_enter(&at(4));
        selector.pointer_up().unwrap();
        assert_eq!(selector.click(&at(4), false), None);
        assert_eq!(selector.last_focused(), Some(&at(4)));

        let range = selector.click(&at(12), true).unwrap();
        assert_eq!((range.start_line, range.end_line), (4, 12));
    }

    #[test]
    fn cancel_returns_to_idle() {
        let mut selector = RangeSelector::new();
        selector.pointer_down(&at(3));
        selector.cancel();
        assert!(!selector.is_dragging());
        assert_eq!(selector.pointer_up(), None);
    }

    #[test]
    fn extract_lines_reads_one_side() {
        let hunks = vec![Hunk {
            old_start: 1,
            old_lines: 2,
            new_start: 1,
            new_lines: 2,
            changes: vec![
                Change::Normal { old_line: 1, new_line: 1, content: "keep".into() },
                Change::Delete { old_line: 2, content: "old".into() },
                Change::Insert { new_line: 2, content: "new".into() },
            ],
        }];
        assert_eq!(extract_lines(&hunks, 1, 2, Side::New).as_deref(), Some("keep\nnew"));
        assert_eq!(extract_lines(&hunks, 1, 2, Side::Old).as_deref(), Some("keep\nold"));
        assert_eq!(extract_lines(&hunks, 5, 9, Side::New), None);
    }
}
