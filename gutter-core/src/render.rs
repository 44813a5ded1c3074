//! Builds the rendered document for a diff or a single file.
//!
//! Every code row carries its [`ChangeKey`] on the row and on each cell so
//! the resolver can address it from any descendant. Code text is split into
//! syntect token spans (`span[data-fg]`); paired delete/insert lines get
//! word-level `span.diff-edit` emphasis from `similar`.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::LazyLock;

use serde::Deserialize;
use similar::{ChangeTag as DiffTag, TextDiff};
use syntect::easy::HighlightLines;
use syntect::highlighting::ThemeSet;
use syntect::parsing::SyntaxSet;

use crate::anchors::{Placement, Widget};
use crate::dom::{Document, NodeId, Tag};
use crate::expand::{compute_gap, Gap, GapAction};
use crate::resolver::{CHANGE_KEY_ATTR, DIFF_FILE_ATTR, FILE_VIEWER_ATTR, LINE_NUMBER_ATTR, LINE_SIDE_ATTR};
use crate::types::{Change, ChangeKey, ChangeTag, FileDiff, FileStatus, Hunk, Side};

static SYNTAXES: LazyLock<SyntaxSet> = LazyLock::new(SyntaxSet::load_defaults_newlines);
static THEMES: LazyLock<ThemeSet> = LazyLock::new(ThemeSet::load_defaults);

pub const DEFAULT_SYNTAX_THEME: &str = "base16-ocean.dark";

pub const GAP_START_ATTR: &str = "data-gap-start";
pub const GAP_END_ATTR: &str = "data-gap-end";
pub const GAP_ACTION_ATTR: &str = "data-gap-action";
pub const EXPAND_START_ATTR: &str = "data-expand-start";
pub const EXPAND_END_ATTR: &str = "data-expand-end";
pub const FG_ATTR: &str = "data-fg";
pub const COMMENT_ID_ATTR: &str = "data-comment-id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewType {
    #[default]
    Unified,
    Split,
}

impl ViewType {
    pub fn toggled(self) -> Self {
        match self {
            ViewType::Unified => ViewType::Split,
            ViewType::Split => ViewType::Unified,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ViewType::Unified => "unified",
            ViewType::Split => "split",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub view: ViewType,
    pub syntax_theme: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self { view: ViewType::Unified, syntax_theme: DEFAULT_SYNTAX_THEME.to_owned() }
    }
}

/// One file as the renderer sees it: metadata, the current (possibly
/// expanded) hunks and its comment placement.
#[derive(Debug, Clone, Copy)]
pub struct FileView<'a> {
    pub diff: &'a FileDiff,
    pub hunks: &'a [Hunk],
    pub total_lines: Option<u32>,
    pub placement: &'a Placement,
}

/// Replaces the children of `container` with the rendering of `files`.
pub fn render_diff(doc: &mut Document, container: NodeId, files: &[FileView<'_>], options: &RenderOptions) {
    let children: Vec<NodeId> = files
        .iter()
        .map(|file| render_file_diff(doc, file, options))
        .collect();
    doc.replace_children(container, children);
}

/// Replaces the children of `container` with a flat, line-numbered view of
/// `lines` (new side).
pub fn render_file(
    doc: &mut Document,
    container: NodeId,
    path: &str,
    lines: &[String],
    placement: &Placement,
    options: &RenderOptions,
) {
    let viewer = doc.element_with(Tag::Div, &["file-viewer"], &[(FILE_VIEWER_ATTR, path)]);
    let mut highlighter = LineHighlighter::new(path, &options.syntax_theme);
    for (index, line) in lines.iter().enumerate() {
        let number = u32::try_from(index + 1).unwrap_or(u32::MAX);
        let key = ChangeKey::new(ChangeTag::Normal, number);
        let number_text = number.to_string();
        let mut classes = vec!["file-line"];
        if placement.highlighted.contains(&key) {
            classes.push("diff-selected");
        }
        let row = doc.element_with(
            Tag::Div,
            &classes,
            &[(LINE_NUMBER_ATTR, number_text.as_str()), (LINE_SIDE_ATTR, Side::New.as_str())],
        );
        let gutter = doc.element_with(Tag::Span, &["file-line-number"], &[]);
        let gutter_text = doc.create_text(number_text.as_str());
        doc.append_child(gutter, gutter_text);
        doc.append_child(row, gutter);
        let code = doc.element_with(Tag::Div, &["diff-code"], &[]);
        let tokens = highlighter.tokens(line);
        append_code(doc, code, line, &tokens, &[]);
        doc.append_child(row, code);
        doc.append_child(viewer, row);

        if let Some(widgets) = placement.widgets.get(&key) {
            let holder = doc.element_with(Tag::Div, &["diff-widget"], &[]);
            append_widgets(doc, holder, widgets);
            doc.append_child(viewer, holder);
        }
    }
    doc.replace_children(container, vec![viewer]);
}

/// The whole of `lines` as one all-context hunk, so flat files share the
/// change-key addressing of diffs.
pub fn file_hunk(lines: &[String]) -> Hunk {
    let count = u32::try_from(lines.len()).unwrap_or(u32::MAX);
    Hunk {
        old_start: 1,
        old_lines: count,
        new_start: 1,
        new_lines: count,
        changes: lines
            .iter()
            .zip(1..)
            .map(|(content, n)| Change::Normal { old_line: n, new_line: n, content: content.clone() })
            .collect(),
    }
}

fn render_file_diff(doc: &mut Document, file: &FileView<'_>, options: &RenderOptions) -> NodeId {
    let path = file.diff.path.as_str();
    let wrapper = doc.element_with(Tag::Div, &["diff-file"], &[(DIFF_FILE_ATTR, path)]);

    let header = doc.element_with(Tag::Div, &["diff-file-header"], &[]);
    let title = match file.diff.status {
        FileStatus::Renamed => format!("{} → {}", file.diff.old_path, path),
        _ => path.to_owned(),
    };
    let header_text = doc.create_text(format!(
        "{} {}  +{} -{}",
        file.diff.status.badge(),
        title,
        file.diff.added(),
        file.diff.removed()
    ));
    doc.append_child(header, header_text);
    doc.append_child(wrapper, header);

    let table = doc.create_element(Tag::Table);
    let body = doc.create_element(Tag::Tbody);
    doc.append_child(wrapper, table);
    doc.append_child(table, body);

    let columns = match options.view {
        ViewType::Unified => 3,
        ViewType::Split => 4,
    };
    let mut highlighter = LineHighlighter::new(path, &options.syntax_theme);
    for (index, hunk) in file.hunks.iter().enumerate() {
        let prev = index.checked_sub(1).and_then(|i| file.hunks.get(i));
        if let Some(gap) = compute_gap(prev, Some(hunk), 0) {
            append_gap_row(doc, body, &gap, columns);
        }
        append_hunk_header(doc, body, hunk, columns);

        let tokens = highlighter.hunk_tokens(hunk);
        let rows = split_rows(&hunk.changes);
        let edits = word_edits(&rows);
        let ctx = RowContext { placement: file.placement, tokens: &tokens, edits: &edits, columns };
        match options.view {
            ViewType::Unified => {
                for change in &hunk.changes {
                    append_unified_row(doc, body, change, &ctx);
                }
            }
            ViewType::Split => {
                for row in &rows {
                    append_split_row(doc, body, row, &ctx);
                }
            }
        }
    }
    if let (Some(last), Some(total)) = (file.hunks.last(), file.total_lines) {
        if let Some(gap) = compute_gap(Some(last), None, total) {
            append_gap_row(doc, body, &gap, columns);
        }
    }
    wrapper
}

struct RowContext<'a> {
    placement: &'a Placement,
    tokens: &'a HashMap<ChangeKey, Vec<Token>>,
    edits: &'a HashMap<ChangeKey, Vec<Range<usize>>>,
    columns: usize,
}

fn kind_class(change: &Change) -> &'static str {
    match change {
        Change::Normal { .. } => "diff-normal",
        Change::Insert { .. } => "diff-insert",
        Change::Delete { .. } => "diff-delete",
    }
}

fn append_unified_row(doc: &mut Document, body: NodeId, change: &Change, ctx: &RowContext<'_>) {
    let key = change.key();
    let key_text = key.to_string();
    let mut classes = vec!["diff-line", kind_class(change)];
    if ctx.placement.highlighted.contains(&key) {
        classes.push("diff-selected");
    }
    let row = doc.element_with(Tag::Tr, &classes, &[(CHANGE_KEY_ATTR, key_text.as_str())]);
    append_gutter(doc, row, "diff-gutter-old", &key_text, change.old_line());
    append_gutter(doc, row, "diff-gutter-new", &key_text, change.new_line());
    append_code_cell(doc, row, change, ctx);
    doc.append_child(body, row);
    append_widget_row(doc, body, &[key], ctx);
}

fn append_split_row(doc: &mut Document, body: NodeId, row: &SplitRow<'_>, ctx: &RowContext<'_>) {
    let (left, right) = match row {
        SplitRow::Both(change) => (Some(*change), Some(*change)),
        SplitRow::Sides(old, new) => (*old, *new),
    };
    let keys: Vec<ChangeKey> = {
        let mut keys: Vec<ChangeKey> = left.iter().chain(right.iter()).map(|c| c.key()).collect();
        keys.dedup();
        keys
    };
    let mut classes = vec!["diff-line", "diff-split"];
    if keys.iter().any(|k| ctx.placement.highlighted.contains(k)) {
        classes.push("diff-selected");
    }
    let tr = doc.element_with(Tag::Tr, &classes, &[]);
    for (half, line_of) in [(left, Side::Old), (right, Side::New)] {
        match half {
            Some(change) => {
                let key_text = change.key().to_string();
                let gutter_class = match line_of {
                    Side::Old => "diff-gutter-old",
                    Side::New => "diff-gutter-new",
                };
                append_gutter(doc, tr, gutter_class, &key_text, change.line_on(line_of));
                append_code_cell(doc, tr, change, ctx);
            }
            None => {
                for _ in 0..2 {
                    let empty = doc.element_with(Tag::Td, &["diff-empty"], &[]);
                    doc.append_child(tr, empty);
                }
            }
        }
    }
    doc.append_child(body, tr);
    append_widget_row(doc, body, &keys, ctx);
}

fn append_gutter(doc: &mut Document, row: NodeId, class: &str, key: &str, line: Option<u32>) {
    let cell = doc.element_with(Tag::Td, &["diff-gutter", class], &[(CHANGE_KEY_ATTR, key)]);
    let text = doc.create_text(line.map(|n| n.to_string()).unwrap_or_default());
    doc.append_child(cell, text);
    doc.append_child(row, cell);
}

fn append_code_cell(doc: &mut Document, row: NodeId, change: &Change, ctx: &RowContext<'_>) {
    let key = change.key();
    let key_text = key.to_string();
    let cell = doc.element_with(Tag::Td, &["diff-code-cell", kind_class(change)], &[(CHANGE_KEY_ATTR, key_text.as_str())]);
    let code = doc.element_with(Tag::Div, &["diff-code"], &[]);
    let tokens = ctx.tokens.get(&key).map(Vec::as_slice).unwrap_or_default();
    let edits = ctx.edits.get(&key).map(Vec::as_slice).unwrap_or_default();
    append_code(doc, code, change.content(), tokens, edits);
    doc.append_child(cell, code);
    doc.append_child(row, cell);
}

fn append_widget_row(doc: &mut Document, body: NodeId, keys: &[ChangeKey], ctx: &RowContext<'_>) {
    let widgets: Vec<Widget> = keys
        .iter()
        .filter_map(|k| ctx.placement.widgets.get(k))
        .flatten()
        .cloned()
        .collect();
    if widgets.is_empty() {
        return;
    }
    let row = doc.element_with(Tag::Tr, &["diff-widget"], &[]);
    let columns = ctx.columns.to_string();
    let cell = doc.element_with(Tag::Td, &["diff-widget-cell"], &[("colspan", columns.as_str())]);
    append_widgets(doc, cell, &widgets);
    doc.append_child(row, cell);
    doc.append_child(body, row);
}

fn append_widgets(doc: &mut Document, parent: NodeId, widgets: &[Widget]) {
    for widget in widgets {
        let node = match widget {
            Widget::Comment { comment, editing } => {
                let id = comment.id.to_string();
                let mut classes = vec!["comment"];
                if *editing {
                    classes.push("comment-editing");
                }
                let node = doc.element_with(Tag::Div, &classes, &[(COMMENT_ID_ATTR, id.as_str())]);
                let location = if comment.start_line == comment.end_line {
                    format!("{} L{}", comment.side, comment.start_line)
                } else {
                    format!("{} L{}-{}", comment.side, comment.start_line, comment.end_line)
                };
                append_text_div(doc, node, "comment-meta", &location);
                append_text_div(doc, node, "comment-body", &comment.text);
                node
            }
            Widget::Draft(draft) => {
                let node = doc.element_with(Tag::Div, &["comment-form"], &[]);
                if let Some(code) = &draft.code {
                    append_text_div(doc, node, "comment-form-code", code);
                }
                append_text_div(doc, node, "comment-form-input", &draft.text);
                node
            }
        };
        doc.append_child(parent, node);
    }
}

fn append_text_div(doc: &mut Document, parent: NodeId, class: &str, text: &str) {
    let div = doc.element_with(Tag::Div, &[class], &[]);
    let node = doc.create_text(text);
    doc.append_child(div, node);
    doc.append_child(parent, div);
}

fn append_gap_row(doc: &mut Document, body: NodeId, gap: &Gap, columns: usize) {
    let start = gap.start.to_string();
    let end = gap.end.to_string();
    let row = doc.element_with(
        Tag::Tr,
        &["diff-gap"],
        &[(GAP_START_ATTR, start.as_str()), (GAP_END_ATTR, end.as_str())],
    );
    let columns = columns.to_string();
    let cell = doc.element_with(Tag::Td, &["diff-gap-cell"], &[("colspan", columns.as_str())]);
    for (index, action) in gap.actions().into_iter().enumerate() {
        if index > 0 {
            let spacer = doc.create_text("   ");
            doc.append_child(cell, spacer);
        }
        let (from, to) = action.range(gap);
        let (from, to) = (from.to_string(), to.to_string());
        let name = match action {
            GapAction::AfterPrevious => "after-previous",
            GapAction::BeforeNext => "before-next",
            GapAction::All => "all",
        };
        let button = doc.element_with(
            Tag::Span,
            &["gap-action"],
            &[
                (GAP_ACTION_ATTR, name),
                (EXPAND_START_ATTR, from.as_str()),
                (EXPAND_END_ATTR, to.as_str()),
            ],
        );
        let label = doc.create_text(action.label(gap));
        doc.append_child(button, label);
        doc.append_child(cell, button);
    }
    doc.append_child(row, cell);
    doc.append_child(body, row);
}

fn append_hunk_header(doc: &mut Document, body: NodeId, hunk: &Hunk, columns: usize) {
    let row = doc.element_with(Tag::Tr, &["diff-hunk-header"], &[]);
    let columns = columns.to_string();
    let cell = doc.element_with(Tag::Td, &["diff-hunk-cell"], &[("colspan", columns.as_str())]);
    let text = doc.create_text(hunk.header());
    doc.append_child(cell, text);
    doc.append_child(row, cell);
    doc.append_child(body, row);
}

// -------------------------------------------------------------------------
// Row pairing and word emphasis
// -------------------------------------------------------------------------

/// A visual row of the split view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitRow<'a> {
    Both(&'a Change),
    Sides(Option<&'a Change>, Option<&'a Change>),
}

/// Pairs each run of deletions with the run of insertions that follows it.
pub fn split_rows(changes: &[Change]) -> Vec<SplitRow<'_>> {
    let mut rows = Vec::new();
    let mut i = 0;
    while i < changes.len() {
        if let Change::Normal { .. } = changes[i] {
            rows.push(SplitRow::Both(&changes[i]));
            i += 1;
            continue;
        }
        let deletes_start = i;
        while i < changes.len() && matches!(changes[i], Change::Delete { .. }) {
            i += 1;
        }
        let inserts_start = i;
        while i < changes.len() && matches!(changes[i], Change::Insert { .. }) {
            i += 1;
        }
        let deletes = &changes[deletes_start..inserts_start];
        let inserts = &changes[inserts_start..i];
        for j in 0..deletes.len().max(inserts.len()) {
            rows.push(SplitRow::Sides(deletes.get(j), inserts.get(j)));
        }
    }
    rows
}

fn word_edits(rows: &[SplitRow<'_>]) -> HashMap<ChangeKey, Vec<Range<usize>>> {
    let mut edits = HashMap::new();
    for row in rows {
        if let SplitRow::Sides(Some(old), Some(new)) = row {
            let (old_edits, new_edits) = word_edit_ranges(old.content(), new.content());
            edits.insert(old.key(), old_edits);
            edits.insert(new.key(), new_edits);
        }
    }
    edits
}

/// Byte ranges of the words that differ between `old` and `new`.
pub fn word_edit_ranges(old: &str, new: &str) -> (Vec<Range<usize>>, Vec<Range<usize>>) {
    let diff = TextDiff::from_words(old, new);
    let mut old_ranges = Vec::new();
    let mut new_ranges = Vec::new();
    let (mut old_pos, mut new_pos) = (0, 0);
    for op in diff.ops() {
        for change in diff.iter_inline_changes(op) {
            for (emphasized, value) in change.iter_strings_lossy() {
                let len = value.len();
                match change.tag() {
                    DiffTag::Delete => {
                        if emphasized {
                            push_range(&mut old_ranges, old_pos..old_pos + len);
                        }
                        old_pos += len;
                    }
                    DiffTag::Insert => {
                        if emphasized {
                            push_range(&mut new_ranges, new_pos..new_pos + len);
                        }
                        new_pos += len;
                    }
                    DiffTag::Equal => {
                        old_pos += len;
                        new_pos += len;
                    }
                }
            }
        }
    }
    (old_ranges, new_ranges)
}

fn push_range(ranges: &mut Vec<Range<usize>>, next: Range<usize>) {
    if next.is_empty() {
        return;
    }
    match ranges.last_mut() {
        Some(last) if last.end == next.start => last.end = next.end,
        _ => ranges.push(next),
    }
}

// -------------------------------------------------------------------------
// Syntax highlighting
// -------------------------------------------------------------------------

/// A highlighted byte range of one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub range: Range<usize>,
    /// `#rrggbb`, absent for transparent styles.
    pub fg: Option<String>,
}

struct LineHighlighter {
    inner: Option<HighlightLines<'static>>,
}

impl LineHighlighter {
    fn new(path: &str, theme_name: &str) -> Self {
        let ext = path.rsplit('.').next().unwrap_or("txt");
        let syntax = SYNTAXES
            .find_syntax_by_extension(ext)
            .unwrap_or_else(|| SYNTAXES.find_syntax_plain_text());
        let theme = THEMES
            .themes
            .get(theme_name)
            .or_else(|| THEMES.themes.get(DEFAULT_SYNTAX_THEME))
            .or_else(|| THEMES.themes.values().next());
        Self { inner: theme.map(|t| HighlightLines::new(syntax, t)) }
    }

    /// Tokens for every change of `hunk`, highlighted in hunk order.
    fn hunk_tokens(&mut self, hunk: &Hunk) -> HashMap<ChangeKey, Vec<Token>> {
        hunk.changes
            .iter()
            .map(|change| (change.key(), self.tokens(change.content())))
            .collect()
    }

    fn tokens(&mut self, code: &str) -> Vec<Token> {
        let Some(highlighter) = self.inner.as_mut() else {
            return Vec::new();
        };
        let ranges = highlighter.highlight_line(code, &SYNTAXES).unwrap_or_default();
        let mut pos = 0;
        ranges
            .into_iter()
            .map(|(style, text)| {
                let fg = style.foreground;
                let token = Token {
                    range: pos..pos + text.len(),
                    fg: (fg.a > 0).then(|| format!("#{:02x}{:02x}{:02x}", fg.r, fg.g, fg.b)),
                };
                pos += text.len();
                token
            })
            .collect()
    }
}

/// Appends `code` to `parent` as spans cut at token and edit boundaries.
fn append_code(doc: &mut Document, parent: NodeId, code: &str, tokens: &[Token], edits: &[Range<usize>]) {
    if code.is_empty() {
        return;
    }
    let plain = [Token { range: 0..code.len(), fg: None }];
    let tokens = if tokens.is_empty() { &plain[..] } else { tokens };
    for token in tokens {
        let mut cuts = vec![token.range.start, token.range.end];
        for edit in edits {
            for point in [edit.start, edit.end] {
                if token.range.start < point && point < token.range.end {
                    cuts.push(point);
                }
            }
        }
        cuts.sort_unstable();
        cuts.dedup();
        for piece in cuts.windows(2) {
            let (start, end) = (piece[0], piece[1]);
            let Some(text) = code.get(start..end) else { continue };
            let emphasized = edits.iter().any(|e| e.start <= start && end <= e.end);
            let classes: &[&str] = if emphasized { &["diff-edit"] } else { &[] };
            let span = match &token.fg {
                Some(fg) => doc.element_with(Tag::Span, classes, &[(FG_ATTR, fg.as_str())]),
                None => doc.element_with(Tag::Span, classes, &[]),
            };
            let node = doc.create_text(text);
            doc.append_child(span, node);
            doc.append_child(parent, span);
        }
    }
}
