//! Comment storage and widget placement.
//!
//! [`AnchorStore`] owns every review comment of the process, the single
//! comment in edit mode, the open add-comment draft and the gutter
//! [`RangeSelector`]. Placement maps comments onto the change keys of a
//! file's *current* hunk list; a comment whose last line is collapsed simply
//! has no widget until that line is expanded.

use std::collections::{BTreeMap, HashSet};
use std::time::SystemTime;

use tracing::debug;
use uuid::Uuid;

use crate::dom::{Document, NodeId};
use crate::selection::{extract_lines, RangeSelector};
use crate::types::{find_change_key, ChangeKey, Comment, Hunk, LineRef, SelectionRange, Side};

/// An add-comment form that has not been submitted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub range: SelectionRange,
    /// Source text of `range`, shown above the input.
    pub code: Option<String>,
    pub text: String,
}

/// A renderable fragment attached below one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Widget {
    Comment { comment: Comment, editing: bool },
    Draft(Draft),
}

/// Everything the renderer needs to decorate one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Placement {
    pub widgets: BTreeMap<ChangeKey, Vec<Widget>>,
    pub highlighted: HashSet<ChangeKey>,
}

impl Placement {
    pub fn is_empty(&self) -> bool {
        self.widgets.is_empty() && self.highlighted.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct AnchorStore {
    comments: Vec<Comment>,
    editing: Option<Uuid>,
    draft: Option<Draft>,
    selector: RangeSelector,
}

fn now_rfc3339() -> String {
    humantime::format_rfc3339_seconds(SystemTime::now()).to_string()
}

impl AnchorStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ---------------------------------------------------------------------
    // Comments
    // ---------------------------------------------------------------------

    /// Stores a new comment and returns its id. The line bounds may be given
    /// in either order.
    pub fn add_comment(
        &mut self,
        file: impl Into<String>,
        start_line: u32,
        end_line: u32,
        side: Side,
        text: impl Into<String>,
    ) -> Uuid {
        let comment = Comment {
            id: Uuid::new_v4(),
            file: file.into(),
            start_line: start_line.min(end_line),
            end_line: start_line.max(end_line),
            side,
            text: text.into(),
            created_at: now_rfc3339(),
        };
        let id = comment.id;
        debug!(%id, file = %comment.file, start = comment.start_line, end = comment.end_line, "comment added");
        self.comments.push(comment);
        id
    }

    /// Replaces the text of comment `id`. Returns false if it does not exist.
    pub fn update_comment(&mut self, id: Uuid, text: impl Into<String>) -> bool {
        match self.comments.iter_mut().find(|c| c.id == id) {
            Some(comment) => {
                comment.text = text.into();
                true
            }
            None => false,
        }
    }

    pub fn delete_comment(&mut self, id: Uuid) -> bool {
        let before = self.comments.len();
        self.comments.retain(|c| c.id != id);
        if self.editing == Some(id) {
            self.editing = None;
        }
        self.comments.len() != before
    }

    pub fn clear_all(&mut self) {
        self.comments.clear();
        self.editing = None;
    }

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn get(&self, id: Uuid) -> Option<&Comment> {
        self.comments.iter().find(|c| c.id == id)
    }

    /// Comments on `file` ordered by side, then start line.
    pub fn comments_for(&self, file: &str) -> Vec<&Comment> {
        let mut out: Vec<&Comment> = self.comments.iter().filter(|c| c.file == file).collect();
        out.sort_by_key(|c| (c.side, c.start_line, c.end_line));
        out
    }

    pub fn len(&self) -> usize {
        self.comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }

    // ---------------------------------------------------------------------
    // Editing and drafts
    // ---------------------------------------------------------------------

    /// Puts comment `id` in edit mode, taking edit mode away from any other
    /// comment and closing the draft form.
    pub fn start_editing(&mut self, id: Uuid) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        self.editing = Some(id);
        self.draft = None;
        true
    }

    pub fn stop_editing(&mut self) {
        self.editing = None;
    }

    pub fn editing(&self) -> Option<Uuid> {
        self.editing
    }

    /// Opens the add-comment form on `range`, seeded with the range's
    /// source text from `hunks`.
    pub fn open_draft(&mut self, range: SelectionRange, hunks: Option<&[Hunk]>) {
        let code = hunks.and_then(|h| extract_lines(h, range.start_line, range.end_line, range.side));
        self.editing = None;
        self.draft = Some(Draft { range, code, text: String::new() });
    }

    pub fn draft(&self) -> Option<&Draft> {
        self.draft.as_ref()
    }

    pub fn draft_mut(&mut self) -> Option<&mut Draft> {
        self.draft.as_mut()
    }

    /// Turns the draft into a comment. A blank draft is discarded.
    pub fn submit_draft(&mut self) -> Option<Uuid> {
        let draft = self.draft.take()?;
        self.selector.cancel();
        let text = draft.text.trim();
        if text.is_empty() {
            return None;
        }
        let range = draft.range;
        Some(self.add_comment(range.file, range.start_line, range.end_line, range.side, text))
    }

    pub fn cancel_draft(&mut self) {
        self.draft = None;
        self.selector.cancel();
    }

    // ---------------------------------------------------------------------
    // Gutter selection
    // ---------------------------------------------------------------------

    pub fn selector(&self) -> &RangeSelector {
        &self.selector
    }

    pub fn pointer_down(&mut self, line: &LineRef) {
        self.selector.pointer_down(line);
    }

    pub fn pointer_enter(&mut self, line: &LineRef) -> bool {
        self.selector.pointer_enter(line)
    }

    pub fn pointer_move(&mut self, doc: &Document, node: NodeId) -> bool {
        self.selector.pointer_move(doc, node)
    }

    /// Ends a drag. A multi-line selection opens the draft form; `hunks_for`
    /// supplies the current hunks of the selected file. Returns true if a
    /// form was opened.
    pub fn pointer_up<F>(&mut self, hunks_for: F) -> bool
    where
        F: FnOnce(&str) -> Option<Vec<Hunk>>,
    {
        let Some(range) = self.selector.pointer_up() else {
            return false;
        };
        let hunks = hunks_for(&range.file);
        self.open_draft(range, hunks.as_deref());
        true
    }

    /// A gutter click (with or without shift). Opens the draft form unless
    /// the click closes a drag gesture.
    pub fn click<F>(&mut self, line: &LineRef, shift: bool, hunks_for: F) -> bool
    where
        F: FnOnce(&str) -> Option<Vec<Hunk>>,
    {
        let Some(range) = self.selector.click(line, shift) else {
            return false;
        };
        let hunks = hunks_for(&range.file);
        self.open_draft(range, hunks.as_deref());
        true
    }

    pub fn cancel_selection(&mut self) {
        self.selector.cancel();
    }

    // ---------------------------------------------------------------------
    // Placement
    // ---------------------------------------------------------------------

    /// Widgets and highlighted rows for `file` rendered from `hunks`.
    pub fn placement(&self, file: &str, hunks: &[Hunk]) -> Placement {
        let mut placement = Placement::default();

        let mut groups: BTreeMap<(Side, u32), Vec<&Comment>> = BTreeMap::new();
        for comment in self.comments.iter().filter(|c| c.file == file) {
            groups.entry((comment.side, comment.end_line)).or_default().push(comment);
        }
        for ((side, end_line), group) in groups {
            let Some(key) = find_change_key(hunks, side, end_line) else {
                continue;
            };
            let widgets = placement.widgets.entry(key).or_default();
            widgets.extend(group.into_iter().map(|comment| Widget::Comment {
                comment: comment.clone(),
                editing: self.editing == Some(comment.id),
            }));
        }

        if let Some(draft) = self.draft.as_ref().filter(|d| d.range.file == file) {
            if let Some(key) = find_change_key(hunks, draft.range.side, draft.range.end_line) {
                placement.widgets.entry(key).or_default().push(Widget::Draft(draft.clone()));
            }
        }

        let editing_range = self
            .editing
            .and_then(|id| self.get(id))
            .map(|c| SelectionRange::spanning(c.file.clone(), c.start_line, c.end_line, c.side));
        let ranges = [
            self.selector.selected().cloned(),
            self.draft.as_ref().map(|d| d.range.clone()),
            editing_range,
        ];
        for range in ranges.into_iter().flatten().filter(|r| r.file == file) {
            for line in range.start_line..=range.end_line {
                if let Some(key) = find_change_key(hunks, range.side, line) {
                    placement.highlighted.insert(key);
                }
            }
        }
        placement
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Change;

    fn hunk(start: u32, len: u32) -> Hunk {
        Hunk {
            old_start: start,
            old_lines: len,
            new_start: start,
            new_lines: len,
            changes: (start..start + len)
                .map(|n| Change::Normal { old_line: n, new_line: n, content: format!("line {n}") })
                .collect(),
        }
    }

    fn line(n: u32) -> LineRef {
        LineRef { file: "a.rs".into(), line: n, side: Side::New }
    }

    #[test]
    fn crud_round() {
        let mut store = AnchorStore::new();
        let id = store.add_comment("a.rs", 9, 4, Side::New, "hi");
        let comment = store.get(id).unwrap();
        assert_eq!((comment.start_line, comment.end_line), (4, 9));
        assert!(humantime::parse_rfc3339(&comment.created_at).is_ok());

        assert!(store.update_comment(id, "edited"));
        assert_eq!(store.get(id).unwrap().text, "edited");
        assert!(store.delete_comment(id));
        assert!(!store.delete_comment(id));
        assert!(!store.update_comment(id, "gone"));
    }

    #[test]
    fn only_one_comment_is_edited() {
        let mut store = AnchorStore::new();
        let a = store.add_comment("a.rs", 1, 1, Side::New, "a");
        let b = store.add_comment("a.rs", 2, 2, Side::New, "b");
        assert!(store.start_editing(a));
        assert!(store.start_editing(b));
        assert_eq!(store.editing(), Some(b));
        store.delete_comment(b);
        assert_eq!(store.editing(), None);
        assert!(!store.start_editing(b));
    }

    #[test]
    fn placement_groups_by_side_and_end_line() {
        let mut store = AnchorStore::new();
        store.add_comment("a.rs", 1, 3, Side::New, "one");
        store.add_comment("a.rs", 3, 3, Side::New, "two");
        store.add_comment("a.rs", 40, 40, Side::New, "collapsed");
        store.add_comment("b.rs", 3, 3, Side::New, "elsewhere");

        let placement = store.placement("a.rs", &[hunk(1, 5)]);
        assert_eq!(placement.widgets.len(), 1);
        assert_eq!(placement.widgets[&"N3".parse::<ChangeKey>().unwrap()].len(), 2);
    }

    #[test]
    fn drag_release_opens_seeded_draft() {
        let mut store = AnchorStore::new();
        let hunks = vec![hunk(1, 12)];
        store.pointer_down(&line(5));
        store.pointer_enter(&line(9));
        assert!(store.pointer_up(|_| Some(hunks.clone())));

        let draft = store.draft().unwrap();
        assert_eq!((draft.range.start_line, draft.range.end_line), (5, 9));
        assert_eq!(
            draft.code.as_deref(),
            Some("line 5\nline 6\nline 7\nline 8\nline 9")
        );
        assert!(!store.click(&line(9), false, |_| Some(hunks.clone())));

        let placement = store.placement("a.rs", &hunks);
        assert_eq!(placement.highlighted.len(), 5);
        assert!(matches!(placement.widgets[&"N9".parse::<ChangeKey>().unwrap()][0], Widget::Draft(_)));
    }

    #[test]
    fn blank_draft_is_discarded() {
        let mut store = AnchorStore::new();
        store.click(&line(2), false, |_| None);
        assert!(store.submit_draft().is_none());

        store.click(&line(2), false, |_| None);
        if let Some(draft) = store.draft_mut() {
            draft.text = "  looks off  ".into();
        }
        let id = store.submit_draft().unwrap();
        assert_eq!(store.get(id).unwrap().text, "looks off");
        assert!(store.selector().selected().is_none());
    }
}
