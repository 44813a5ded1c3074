//! Diff panel: paints the rendered document into terminal lines.
//!
//! [`paint`] walks the document the core rendered (`div.diff-file` tables or
//! a flat `div.file-viewer`) and produces one [`PaintedLine`] per visual
//! row. Each line remembers which document node was drawn in which columns,
//! so mouse positions map back to nodes and through the resolver to lines.
//!
//! [`render_diff`] then draws only the visible window, making rendering
//! O(viewport) rather than O(total lines).

use std::ops::Range;

use gutter_core::dom::{Document, NodeId, Tag};
use gutter_core::markers::{SEARCH_CLASS, SEARCH_CURRENT_CLASS, WORD_HIGHLIGHT_CLASS};
use gutter_core::render::FG_ATTR;
use gutter_core::resolver::{resolve, CHANGE_KEY_ATTR};
use gutter_core::LineRef;
use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{List, ListItem},
};

use crate::app::{AppState, PanelFocus};
use crate::theme::Theme;
use crate::ui::layout::{inner_rect, panel_block};

/// Columns of one gutter cell: five digits and a space.
const GUTTER_WIDTH: usize = 6;

/// A node drawn at a column range of a painted line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hit {
    pub columns: Range<u16>,
    pub node: NodeId,
}

/// One visual row of the diff panel.
#[derive(Debug, Clone)]
pub struct PaintedLine {
    pub spans: Vec<Span<'static>>,
    pub hits: Vec<Hit>,
    /// The element this line was painted from.
    pub row: NodeId,
    /// The line coordinate the row addresses, for code rows.
    pub target: Option<LineRef>,
}

impl PaintedLine {
    /// Innermost node drawn at `column`.
    pub fn node_at(&self, column: u16) -> Option<NodeId> {
        self.hits
            .iter()
            .filter(|hit| hit.columns.contains(&column))
            .min_by_key(|hit| hit.columns.len())
            .map(|hit| hit.node)
    }

    pub fn hit_of(&self, node: NodeId) -> Option<&Hit> {
        self.hits.iter().find(|hit| hit.node == node)
    }
}

#[derive(Default)]
struct LineBuilder {
    spans: Vec<Span<'static>>,
    hits: Vec<Hit>,
    column: u16,
}

impl LineBuilder {
    fn push(&mut self, text: String, style: Style) -> Range<u16> {
        let width = u16::try_from(Span::raw(text.as_str()).width()).unwrap_or(u16::MAX);
        let start = self.column;
        self.column = self.column.saturating_add(width);
        self.spans.push(Span::styled(text, style));
        start..self.column
    }

    fn push_node(&mut self, text: String, style: Style, node: NodeId) {
        let columns = self.push(text, style);
        self.hits.push(Hit { columns, node });
    }

    fn pad_to(&mut self, column: u16, style: Style) {
        if self.column < column {
            self.push(" ".repeat(usize::from(column - self.column)), style);
        }
    }

    fn finish(self, row: NodeId, target: Option<LineRef>) -> PaintedLine {
        PaintedLine { spans: self.spans, hits: self.hits, row, target }
    }
}

/// Paints every file (or the flat viewer) under `root`, `width` columns wide.
pub fn paint(doc: &Document, root: NodeId, theme: &Theme, width: u16) -> Vec<PaintedLine> {
    let mut painter = Painter { doc, theme, width, lines: Vec::new() };
    for &child in doc.children(root) {
        if doc.has_class(child, "diff-file") {
            painter.file(child);
        } else if doc.has_class(child, "file-viewer") {
            painter.viewer(child);
        }
    }
    painter.lines
}

struct Painter<'a> {
    doc: &'a Document,
    theme: &'a Theme,
    width: u16,
    lines: Vec<PaintedLine>,
}

impl Painter<'_> {
    fn file(&mut self, file: NodeId) {
        let doc = self.doc;
        for &part in doc.children(file) {
            if doc.has_class(part, "diff-file-header") {
                let mut out = LineBuilder::default();
                let style = Style::default().fg(self.theme.border_active).add_modifier(Modifier::BOLD);
                out.push_node(doc.text_content(part), style, part);
                self.lines.push(out.finish(part, None));
            } else if doc.tag(part) == Some(Tag::Table) {
                for &body in doc.children(part) {
                    for &row in doc.children(body) {
                        self.row(row);
                    }
                }
            }
        }
    }

    fn row(&mut self, row: NodeId) {
        let doc = self.doc;
        if doc.has_class(row, "diff-gap") {
            let mut out = LineBuilder::default();
            let style = Style::default().fg(self.theme.diff_gap);
            out.push("   ⋯  ".to_owned(), style);
            for &cell in doc.children(row) {
                self.walk(cell, style.add_modifier(Modifier::UNDERLINED), &mut out);
            }
            self.lines.push(out.finish(row, None));
        } else if doc.has_class(row, "diff-hunk-header") {
            let mut out = LineBuilder::default();
            out.push(doc.text_content(row), Style::default().fg(self.theme.diff_hunk_header));
            self.lines.push(out.finish(row, None));
        } else if doc.has_class(row, "diff-line") {
            self.code_row(row);
        } else if doc.has_class(row, "diff-widget") {
            for &cell in doc.children(row) {
                self.widgets(cell);
            }
        }
    }

    fn code_row(&mut self, row: NodeId) {
        let doc = self.doc;
        let base = if doc.has_class(row, "diff-selected") {
            Style::default().bg(self.theme.selection_bg)
        } else {
            Style::default()
        };
        let split = doc.has_class(row, "diff-split");
        let half = self.width / 2;
        let mut out = LineBuilder::default();
        for (index, &cell) in doc.children(row).iter().enumerate() {
            if doc.has_class(cell, "diff-gutter") {
                let number = doc.text_content(cell);
                let style = base.fg(self.theme.diff_gutter);
                out.push_node(format!("{number:>w$} ", w = GUTTER_WIDTH - 1), style, cell);
            } else if doc.has_class(cell, "diff-code-cell") {
                let (sign, color) = if doc.has_class(cell, "diff-insert") {
                    ('+', self.theme.diff_added)
                } else if doc.has_class(cell, "diff-delete") {
                    ('-', self.theme.diff_removed)
                } else {
                    (' ', self.theme.diff_context)
                };
                let style = base.fg(color);
                out.push_node(format!("{sign} "), style, cell);
                for &code in doc.children(cell) {
                    self.walk(code, style, &mut out);
                }
            } else if doc.has_class(cell, "diff-empty") && index % 2 == 0 {
                out.push(" ".repeat(GUTTER_WIDTH), base);
            }
            if split && index == 1 {
                out.pad_to(half, base);
            }
        }
        if base != Style::default() {
            out.pad_to(self.width, base);
        }
        let target = doc
            .children(row)
            .iter()
            .rev()
            .find(|&&cell| doc.attr(cell, CHANGE_KEY_ATTR).is_some())
            .and_then(|&cell| resolve(doc, cell));
        self.lines.push(out.finish(row, target));
    }

    fn viewer(&mut self, viewer: NodeId) {
        let doc = self.doc;
        for &row in doc.children(viewer) {
            if doc.has_class(row, "diff-widget") {
                self.widgets(row);
                continue;
            }
            let base = if doc.has_class(row, "diff-selected") {
                Style::default().bg(self.theme.selection_bg)
            } else {
                Style::default()
            };
            let mut out = LineBuilder::default();
            for &part in doc.children(row) {
                if doc.has_class(part, "file-line-number") {
                    let number = doc.text_content(part);
                    let style = base.fg(self.theme.diff_gutter);
                    out.push_node(format!("{number:>w$}  ", w = GUTTER_WIDTH - 1), style, part);
                } else {
                    self.walk(part, base.fg(self.theme.diff_context), &mut out);
                }
            }
            if base != Style::default() {
                out.pad_to(self.width, base);
            }
            self.lines.push(out.finish(row, resolve(doc, row)));
        }
    }

    fn widgets(&mut self, holder: NodeId) {
        let doc = self.doc;
        for &widget in doc.children(holder) {
            let editing = doc.has_class(widget, "comment-editing");
            let border_color = if editing { self.theme.comment_editing } else { self.theme.comment_border };
            let border = Style::default().fg(border_color);
            for &part in doc.children(widget) {
                let (style, prefix) = if doc.has_class(part, "comment-meta") {
                    (Style::default().fg(self.theme.comment_meta).add_modifier(Modifier::BOLD), "")
                } else if doc.has_class(part, "comment-form-code") {
                    (Style::default().fg(self.theme.comment_meta).add_modifier(Modifier::ITALIC), "")
                } else if doc.has_class(part, "comment-form-input") {
                    (Style::default().fg(self.theme.diff_context), "> ")
                } else {
                    (Style::default().fg(self.theme.diff_context), "")
                };
                let text = doc.text_content(part);
                let input = doc.has_class(part, "comment-form-input");
                let rows: Vec<&str> = text.split('\n').collect();
                let last = rows.len().saturating_sub(1);
                for (index, row) in rows.iter().enumerate() {
                    let cursor = if input && index == last { "▏" } else { "" };
                    let mut out = LineBuilder::default();
                    out.push("   ┃ ".to_owned(), border);
                    out.push_node(format!("{prefix}{row}{cursor}"), style, widget);
                    self.lines.push(out.finish(widget, None));
                }
            }
        }
    }

    fn walk(&self, node: NodeId, style: Style, out: &mut LineBuilder) {
        let doc = self.doc;
        if let Some(text) = doc.text(node) {
            if !text.is_empty() {
                out.push_node(text.replace('\t', " "), style, node);
            }
            return;
        }
        if !doc.is_rendered(node) {
            return;
        }
        let style = self.element_style(node, style);
        for &child in doc.children(node) {
            self.walk(child, style, out);
        }
    }

    fn element_style(&self, node: NodeId, mut style: Style) -> Style {
        let doc = self.doc;
        if let Some(fg) = doc.attr(node, FG_ATTR).and_then(parse_hex) {
            style = style.fg(fg);
        }
        if doc.has_class(node, "diff-edit") {
            style = style.add_modifier(Modifier::BOLD | Modifier::UNDERLINED);
        }
        if doc.tag(node) == Some(Tag::Mark) {
            let bg = if doc.has_class(node, SEARCH_CURRENT_CLASS) {
                Some(self.theme.search_current_bg)
            } else if doc.has_class(node, SEARCH_CLASS) {
                Some(self.theme.search_match_bg)
            } else if doc.has_class(node, WORD_HIGHLIGHT_CLASS) {
                Some(self.theme.word_highlight_bg)
            } else {
                None
            };
            if let Some(bg) = bg {
                style = style.bg(bg).fg(self.theme.mark_fg);
            }
        }
        style
    }
}

/// `#rrggbb` to an RGB color.
fn parse_hex(value: &str) -> Option<Color> {
    let hex = value.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    Some(Color::Rgb(channel(0)?, channel(2)?, channel(4)?))
}

/// Renders the diff panel, drawing only the visible window of painted lines.
pub fn render_diff(frame: &mut Frame, area: Rect, focus: PanelFocus, state: &mut AppState, theme: &Theme) {
    let is_focused = focus == PanelFocus::Diff;
    let title = state.diff_title();
    let block = panel_block(&title, is_focused, theme);
    let inner = inner_rect(area);
    state.diff_area = inner;
    let viewport_height = usize::from(inner.height);
    state.repaint(theme, inner.width);

    frame.render_widget(block, area);

    if state.lines.is_empty() {
        let msg = if state.diff_loading {
            "Computing diff..."
        } else {
            "No changes in this diff session."
        };
        frame.render_widget(List::new(vec![ListItem::new(Line::raw(msg))]), inner);
        return;
    }

    let total = state.lines.len();
    let visible_start = state.diff_scroll.min(total.saturating_sub(1));
    let visible_end = (visible_start + viewport_height).min(total);

    let items: Vec<ListItem> = state.lines[visible_start..visible_end]
        .iter()
        .enumerate()
        .map(|(offset, painted)| {
            let mut line = Line::from(painted.spans.clone());
            if visible_start + offset == state.cursor && is_focused {
                line = line.style(Style::default().bg(theme.cursor_bg));
            }
            ListItem::new(line)
        })
        .collect();

    frame.render_widget(List::new(items), inner);
}

#[cfg(test)]
mod tests {
    use super::*;
    use gutter_core::anchors::Placement;
    use gutter_core::render::{render_diff as render_document, FileView, RenderOptions};
    use gutter_core::{Change, FileDiff, FileStatus, Hunk, Side};

    fn painted() -> (Document, Vec<PaintedLine>) {
        let file = FileDiff {
            path: "lib.rs".into(),
            old_path: "lib.rs".into(),
            status: FileStatus::Modified,
            hunks: vec![Hunk {
                old_start: 5,
                old_lines: 2,
                new_start: 5,
                new_lines: 2,
                changes: vec![
                    Change::Normal { old_line: 5, new_line: 5, content: "fn main() {".into() },
                    Change::Delete { old_line: 6, content: "}".into() },
                    Change::Insert { new_line: 6, content: "    run();".into() },
                ],
            }],
            old_line_count: Some(6),
        };
        let mut doc = Document::new();
        let container = doc.create_element(Tag::Div);
        let root = doc.root();
        doc.append_child(root, container);
        let placement = Placement::default();
        let views = [FileView { diff: &file, hunks: &file.hunks, total_lines: file.old_line_count, placement: &placement }];
        render_document(&mut doc, container, &views, &RenderOptions::default());
        let lines = paint(&doc, container, &Theme::dark(), 80);
        (doc, lines)
    }

    #[test]
    fn code_rows_carry_their_line() {
        let (_, lines) = painted();
        let targets: Vec<(u32, Side)> = lines
            .iter()
            .filter_map(|l| l.target.as_ref())
            .map(|t| (t.line, t.side))
            .collect();
        assert_eq!(targets, vec![(5, Side::New), (6, Side::Old), (6, Side::New)]);
    }

    #[test]
    fn columns_map_back_to_cells() {
        let (doc, lines) = painted();
        let row = lines.iter().find(|l| l.target.as_ref().map(|t| t.side) == Some(Side::Old)).unwrap();
        let gutter = row.node_at(0).unwrap();
        assert_eq!(resolve(&doc, gutter).map(|t| t.line), Some(6));
        let code = row.node_at(u16::try_from(2 * GUTTER_WIDTH + 2).unwrap()).unwrap();
        assert_eq!(doc.text(code), Some("}"));
    }

    #[test]
    fn hex_colors_parse() {
        assert_eq!(parse_hex("#0a0b0c"), Some(Color::Rgb(10, 11, 12)));
        assert_eq!(parse_hex("0a0b0c"), None);
        assert_eq!(parse_hex("#fff"), None);
    }
}
