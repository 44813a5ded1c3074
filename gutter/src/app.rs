//! Central application state for gutter.
//!
//! `AppState` owns the rendered review document and everything that mutates
//! it: the diff returned by the git worker, the context expander, the anchor
//! store with its drag selector, and the search/word markers. Input handlers
//! in `ui::keybindings` call the methods here; the render path only reads,
//! except for [`AppState::repaint`], which converts the document into painted
//! terminal lines once per change.

use std::sync::Arc;
use std::time::{Duration, Instant};

use gutter_core::anchors::{AnchorStore, Placement};
use gutter_core::dom::{Document, NodeId, Tag};
use gutter_core::expand::ContextExpander;
use gutter_core::markers::{word_at, Markers, SearchEngine, WordHighlighter};
use gutter_core::render::{
    file_hunk, render_diff, render_file, FileView, RenderOptions, COMMENT_ID_ATTR, EXPAND_END_ATTR,
    EXPAND_START_ATTR, GAP_ACTION_ATTR,
};
use gutter_core::resolver::{resolve, DIFF_FILE_ATTR, FILE_VIEWER_ATTR};
use gutter_core::source::{split_lines, FileContentProvider};
use gutter_core::{DiffSession, ExpandError, FileDiff, Hunk, LineRef, SourceError};
use ratatui::layout::{Position, Rect};
use ratatui::widgets::ListState;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::event::AppEvent;
use crate::git::types::DiffPayload;
use crate::git::GitProvider;
use crate::theme::Theme;
use crate::ui::diff_view::{paint, PaintedLine};

/// Two clicks on the same cell within this window form a double-click.
pub const DOUBLE_CLICK: Duration = Duration::from_millis(400);

/// Editor mode controlling which keybinding set is active.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Normal,
    /// Typing into the comment form or the comment being edited.
    Insert,
    /// Typing a search query.
    Search,
    HelpOverlay,
    /// Preview of the prompt printed on exit.
    PromptPreview,
    /// Quit-confirmation dialog shown while a comment is being written.
    ConfirmQuit,
}

/// Which panel currently has keyboard focus.
///
/// Navigation cycles through FileList → Diff → Comments → FileList via
/// `next()` and in reverse via `prev()`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PanelFocus {
    #[default]
    FileList,
    Diff,
    Comments,
}

impl PanelFocus {
    pub fn prev(self) -> Self {
        match self {
            PanelFocus::FileList => PanelFocus::Comments,
            PanelFocus::Diff => PanelFocus::FileList,
            PanelFocus::Comments => PanelFocus::Diff,
        }
    }

    pub fn next(self) -> Self {
        match self {
            PanelFocus::FileList => PanelFocus::Diff,
            PanelFocus::Diff => PanelFocus::Comments,
            PanelFocus::Comments => PanelFocus::FileList,
        }
    }
}

/// A whole file shown without diff decoration.
#[derive(Debug, Clone)]
pub struct FileViewer {
    pub path: String,
    pub lines: Vec<String>,
}

pub struct AppState {
    pub mode: Mode,
    pub focus: PanelFocus,

    pub file_list_state: ListState,
    pub comment_list_state: ListState,

    /// First painted line shown in the diff panel.
    pub diff_scroll: usize,
    /// Keyboard cursor, an index into `lines`.
    pub cursor: usize,

    /// Inner panel heights, cached after each render for page scrolling.
    pub diff_viewport_height: u16,
    pub comments_viewport_height: u16,
    pub file_list_viewport_height: u16,

    pub left_pct: u16,
    pub center_pct: u16,
    pub right_pct: u16,
    pub help_scroll: u16,

    /// Outer rects of the three panels from the last frame.
    pub panel_rects: [Rect; 3],
    /// Inner rect of the diff panel from the last frame, for mouse mapping.
    pub diff_area: Rect,

    pub session: DiffSession,
    pub files: Vec<FileDiff>,
    /// True while the git worker computes a diff.
    pub diff_loading: bool,
    /// One-line message for the status bar.
    pub status: Option<String>,
    pub render_options: RenderOptions,
    pub viewer: Option<FileViewer>,

    pub doc: Document,
    /// Container the diff (or flat file) is rendered into.
    pub view_root: NodeId,
    pub anchors: AnchorStore,
    pub markers: Markers,
    /// The document painted for the terminal.
    pub lines: Vec<PaintedLine>,
    pub search_input: String,

    needs_paint: bool,
    paint_width: u16,
    pending_reveal: Option<NodeId>,
    /// Text of the comment under edit before editing began.
    edit_original: Option<String>,
    /// Gutter line the left button went down on.
    press: Option<LineRef>,
    last_click: Option<(Instant, u16, u16)>,
    /// File requested for the flat viewer and not yet loaded.
    pending_viewer: Option<String>,

    expander: Arc<ContextExpander<GitProvider>>,
    git: GitProvider,
    events: UnboundedSender<AppEvent>,
}

impl AppState {
    pub fn new(config: &Config, session: DiffSession, git: GitProvider, events: UnboundedSender<AppEvent>) -> Self {
        let mut doc = Document::new();
        let view_root = doc.create_element(Tag::Div);
        let root = doc.root();
        doc.append_child(root, view_root);

        let markers = Markers {
            search: SearchEngine::new(view_root).with_debounce(config.search_debounce()),
            words: WordHighlighter::new(view_root),
        };
        let expander = Arc::new(ContextExpander::new(Arc::new(git.clone()), session.clone()));

        Self {
            mode: Mode::default(),
            focus: PanelFocus::default(),
            file_list_state: ListState::default(),
            comment_list_state: ListState::default(),
            diff_scroll: 0,
            cursor: 0,
            diff_viewport_height: 0,
            comments_viewport_height: 0,
            file_list_viewport_height: 0,
            left_pct: 20,
            center_pct: 55,
            right_pct: 25,
            help_scroll: 0,
            panel_rects: [Rect::default(); 3],
            diff_area: Rect::default(),
            session,
            files: Vec::new(),
            diff_loading: false,
            status: None,
            render_options: RenderOptions { view: config.view, syntax_theme: config.syntax_theme.clone() },
            viewer: None,
            doc,
            view_root,
            anchors: AnchorStore::new(),
            markers,
            lines: Vec::new(),
            search_input: String::new(),
            needs_paint: true,
            paint_width: 0,
            pending_reveal: None,
            edit_original: None,
            press: None,
            last_click: None,
            pending_viewer: None,
            expander,
            git,
            events,
        }
    }

    // ---------------------------------------------------------------------
    // Diff session
    // ---------------------------------------------------------------------

    pub fn request_diff(&mut self) {
        self.diff_loading = true;
        if !self.git.load_diff(self.session.clone()) {
            warn!("git worker is gone, diff request dropped");
            self.diff_loading = false;
            self.status = Some("git worker stopped".to_owned());
        }
    }

    /// Switches to `session` and requests its diff. Expansions and cached
    /// source of the previous session are dropped.
    pub fn set_session(&mut self, session: DiffSession) {
        if session == self.session {
            return;
        }
        info!(session = %session.label(), "switching diff session");
        self.expander.set_session(session.clone());
        self.session = session;
        self.files.clear();
        self.viewer = None;
        self.anchors.cancel_selection();
        self.cursor = 0;
        self.diff_scroll = 0;
        self.rerender();
        self.request_diff();
    }

    /// Tab order: unstaged → staged → HEAD → unstaged.
    pub fn cycle_session(&mut self) {
        let next = match self.session {
            DiffSession::Unstaged => DiffSession::Staged,
            DiffSession::Staged => DiffSession::Head,
            _ => DiffSession::Unstaged,
        };
        self.set_session(next);
    }

    pub fn apply_diff(&mut self, payload: DiffPayload) {
        if payload.session != self.session {
            debug!(session = %payload.session.label(), "dropping diff of a previous session");
            return;
        }
        self.diff_loading = false;
        match payload.files {
            Ok(files) => {
                info!(session = %self.session.label(), files = files.len(), "diff loaded");
                self.expander.set_files(files.clone());
                self.files = files;
                self.status = None;
                match self.file_list_state.selected() {
                    Some(i) if i < self.files.len() => {}
                    _ if self.files.is_empty() => self.file_list_state.select(None),
                    _ => self.file_list_state.select(Some(0)),
                }
            }
            Err(err) => {
                warn!(session = %self.session.label(), error = %err, "diff failed");
                self.status = Some(format!("diff failed: {err}"));
                self.expander.set_files(Vec::new());
                self.files.clear();
            }
        }
        self.rerender();
    }

    pub fn diff_title(&self) -> String {
        match &self.viewer {
            Some(viewer) => format!("File: {}", viewer.path),
            None => format!("Diff: {} ({})", self.session.label(), self.render_options.view.label()),
        }
    }

    // ---------------------------------------------------------------------
    // Rendering
    // ---------------------------------------------------------------------

    /// Re-renders the document from the current diff, expansions and
    /// comments. Marks survive the render through `Markers::after_render`.
    pub fn rerender(&mut self) {
        if let Some(viewer) = &self.viewer {
            let hunk = file_hunk(&viewer.lines);
            let placement = self.anchors.placement(&viewer.path, std::slice::from_ref(&hunk));
            render_file(&mut self.doc, self.view_root, &viewer.path, &viewer.lines, &placement, &self.render_options);
        } else {
            let hunks: Vec<Vec<Hunk>> = self
                .files
                .iter()
                .map(|f| self.expander.hunks(&f.path).unwrap_or_else(|| f.hunks.clone()))
                .collect();
            let placements: Vec<Placement> = self
                .files
                .iter()
                .zip(&hunks)
                .map(|(f, h)| self.anchors.placement(&f.path, h))
                .collect();
            let views: Vec<FileView<'_>> = self
                .files
                .iter()
                .zip(&hunks)
                .zip(&placements)
                .map(|((diff, hunks), placement)| FileView {
                    diff,
                    hunks,
                    total_lines: self.expander.total_lines(&diff.path),
                    placement,
                })
                .collect();
            render_diff(&mut self.doc, self.view_root, &views, &self.render_options);
        }
        self.markers.after_render(&mut self.doc);
        self.needs_paint = true;
    }

    /// Repaints the document for a panel `width` columns wide if anything
    /// changed since the last paint. The cursor stays on the same line.
    pub fn repaint(&mut self, theme: &Theme, width: u16) {
        if !self.needs_paint && width == self.paint_width {
            return;
        }
        let keep = self.lines.get(self.cursor).and_then(|l| l.target.clone());
        let offset = self.cursor.saturating_sub(self.diff_scroll);

        self.lines = paint(&self.doc, self.view_root, theme, width);
        self.paint_width = width;
        self.needs_paint = false;

        if let Some(node) = self.pending_reveal.take() {
            let doc = &self.doc;
            let shows = |l: &PaintedLine| l.hits.iter().any(|h| h.node == node || doc.contains(node, h.node));
            if let Some(index) = self.lines.iter().position(shows) {
                self.cursor = index;
                self.center_on_cursor();
            }
        } else if let Some(target) = keep {
            if let Some(index) = self.lines.iter().position(|l| l.target.as_ref() == Some(&target)) {
                self.cursor = index;
                self.diff_scroll = index.saturating_sub(offset);
            }
        }
        self.cursor = self.cursor.min(self.lines.len().saturating_sub(1));
    }

    /// Drives the search debounce.
    pub fn tick(&mut self, now: Instant) {
        if self.markers.poll(&mut self.doc, now) {
            self.needs_paint = true;
        }
    }

    pub fn toggle_view(&mut self) {
        self.render_options.view = self.render_options.view.toggled();
        debug!(view = self.render_options.view.label(), "diff view toggled");
        self.rerender();
    }

    // ---------------------------------------------------------------------
    // Cursor and scrolling
    // ---------------------------------------------------------------------

    pub fn current_target(&self) -> Option<LineRef> {
        self.lines.get(self.cursor).and_then(|l| l.target.clone())
    }

    pub fn move_cursor(&mut self, delta: isize) {
        let last = self.lines.len().saturating_sub(1);
        self.cursor = self.cursor.saturating_add_signed(delta).min(last);
        self.keep_cursor_visible();
        self.follow_drag();
    }

    pub fn cursor_to(&mut self, index: usize) {
        self.cursor = index.min(self.lines.len().saturating_sub(1));
        self.keep_cursor_visible();
        self.follow_drag();
    }

    fn keep_cursor_visible(&mut self) {
        let height = usize::from(self.diff_viewport_height.max(1));
        if self.cursor < self.diff_scroll {
            self.diff_scroll = self.cursor;
        } else if self.cursor >= self.diff_scroll + height {
            self.diff_scroll = self.cursor + 1 - height;
        }
    }

    fn center_on_cursor(&mut self) {
        let half = usize::from(self.diff_viewport_height / 2);
        self.diff_scroll = self.cursor.saturating_sub(half);
    }

    /// Extends a keyboard drag to the cursor line.
    fn follow_drag(&mut self) {
        if !self.anchors.selector().is_dragging() {
            return;
        }
        if let Some(line) = self.current_target() {
            if self.anchors.pointer_enter(&line) {
                self.rerender();
            }
        }
    }

    /// Scrolls the focused panel down by `lines` rows.
    pub fn scroll_down(&mut self, lines: u16) {
        match self.focus {
            PanelFocus::FileList => self.file_list_state.scroll_down_by(lines),
            PanelFocus::Diff => self.move_cursor(isize::try_from(lines).unwrap_or(isize::MAX)),
            PanelFocus::Comments => self.comment_list_state.scroll_down_by(lines),
        }
    }

    pub fn scroll_up(&mut self, lines: u16) {
        match self.focus {
            PanelFocus::FileList => self.file_list_state.scroll_up_by(lines),
            PanelFocus::Diff => self.move_cursor(-isize::try_from(lines).unwrap_or(isize::MAX)),
            PanelFocus::Comments => self.comment_list_state.scroll_up_by(lines),
        }
    }

    pub fn scroll_top(&mut self) {
        match self.focus {
            PanelFocus::FileList => self.file_list_state.select_first(),
            PanelFocus::Diff => self.cursor_to(0),
            PanelFocus::Comments => self.comment_list_state.select_first(),
        }
    }

    pub fn scroll_bottom(&mut self) {
        match self.focus {
            PanelFocus::FileList => self.file_list_state.select_last(),
            PanelFocus::Diff => self.cursor_to(usize::MAX),
            PanelFocus::Comments => self.comment_list_state.select_last(),
        }
    }

    fn focused_height(&self) -> u16 {
        match self.focus {
            PanelFocus::FileList => self.file_list_viewport_height,
            PanelFocus::Diff => self.diff_viewport_height,
            PanelFocus::Comments => self.comments_viewport_height,
        }
    }

    pub fn half_page_down(&mut self) {
        self.scroll_down((self.focused_height() / 2).max(1));
    }

    pub fn half_page_up(&mut self) {
        self.scroll_up((self.focused_height() / 2).max(1));
    }

    pub fn full_page_down(&mut self) {
        self.scroll_down(self.focused_height().max(1));
    }

    pub fn full_page_up(&mut self) {
        self.scroll_up(self.focused_height().max(1));
    }

    /// Mouse-wheel scrolling of the diff panel; the cursor stays put.
    pub fn scroll_view(&mut self, delta: isize) {
        let last = self.lines.len().saturating_sub(1);
        self.diff_scroll = self.diff_scroll.saturating_add_signed(delta).min(last);
    }

    pub fn prev_hunk(&mut self) {
        let found = self.lines[..self.cursor.min(self.lines.len())]
            .iter()
            .rposition(|l| self.doc.has_class(l.row, "diff-hunk-header"));
        if let Some(index) = found {
            self.cursor_to(index);
        }
    }

    pub fn next_hunk(&mut self) {
        let found = self
            .lines
            .iter()
            .enumerate()
            .skip(self.cursor + 1)
            .find(|(_, l)| self.doc.has_class(l.row, "diff-hunk-header"))
            .map(|(i, _)| i);
        if let Some(index) = found {
            self.cursor_to(index);
        }
    }

    /// Path of the file a painted line belongs to.
    pub fn line_file(&self, index: usize) -> Option<&str> {
        let row = self.lines.get(index)?.row;
        let owner = self
            .doc
            .closest(row, |e| e.attr(DIFF_FILE_ATTR).is_some() || e.attr(FILE_VIEWER_ATTR).is_some())?;
        self.doc
            .attr(owner, DIFF_FILE_ATTR)
            .or_else(|| self.doc.attr(owner, FILE_VIEWER_ATTR))
    }

    pub fn selected_file(&self) -> Option<&FileDiff> {
        self.file_list_state.selected().and_then(|i| self.files.get(i))
    }

    pub fn prev_file(&mut self) {
        self.file_list_state.scroll_up_by(1);
    }

    pub fn next_file(&mut self) {
        self.file_list_state.scroll_down_by(1);
    }

    /// Moves the diff cursor to the header of the selected file.
    pub fn jump_to_selected_file(&mut self) {
        let Some(path) = self.selected_file().map(|f| f.path.clone()) else {
            return;
        };
        let found = (0..self.lines.len()).find(|&i| self.line_file(i) == Some(path.as_str()));
        if let Some(index) = found {
            self.cursor = index;
            self.diff_scroll = index;
        }
        self.focus = PanelFocus::Diff;
    }

    /// Moves the diff cursor to the line the selected comment is anchored on.
    pub fn jump_to_comment(&mut self) {
        let Some(comment) = self.selected_comment().and_then(|id| self.anchors.get(id)) else {
            return;
        };
        let anchor = LineRef { file: comment.file.clone(), line: comment.end_line, side: comment.side };
        match self.lines.iter().position(|l| l.target.as_ref() == Some(&anchor)) {
            Some(index) => {
                self.cursor = index;
                self.center_on_cursor();
                self.focus = PanelFocus::Diff;
            }
            None => self.status = Some(format!("{}:{} is not in view", anchor.file, anchor.line)),
        }
    }

    // ---------------------------------------------------------------------
    // Expansion
    // ---------------------------------------------------------------------

    /// Expands the gap action `node` belongs to. Returns false if `node` is
    /// not inside a gap action.
    pub fn expand_node(&mut self, node: NodeId) -> bool {
        let Some(action) = self.doc.closest(node, |e| e.attr(GAP_ACTION_ATTR).is_some()) else {
            return false;
        };
        let bound = |name: &str| self.doc.attr(action, name).and_then(|v| v.parse::<u32>().ok());
        let (Some(start), Some(end)) = (bound(EXPAND_START_ATTR), bound(EXPAND_END_ATTR)) else {
            return false;
        };
        let file = self
            .doc
            .closest(action, |e| e.attr(DIFF_FILE_ATTR).is_some())
            .and_then(|owner| self.doc.attr(owner, DIFF_FILE_ATTR))
            .map(str::to_owned);
        match file {
            Some(file) => {
                self.expand(file, start, end);
                true
            }
            None => false,
        }
    }

    /// Expands the whole gap under the cursor.
    pub fn expand_at_cursor(&mut self) -> bool {
        let Some(row) = self.lines.get(self.cursor).map(|l| l.row) else {
            return false;
        };
        let action = self
            .doc
            .find_by_attr(row, GAP_ACTION_ATTR, "all")
            .first()
            .copied()
            .or_else(|| self.doc.descendants(row).into_iter().find(|&n| self.doc.attr(n, GAP_ACTION_ATTR).is_some()));
        action.is_some_and(|node| self.expand_node(node))
    }

    /// Starts an expansion of old-side lines `[start, end]` of `file`; the
    /// result comes back as `AppEvent::Expanded`.
    pub fn expand(&mut self, file: String, start: u32, end: u32) {
        debug!(file = %file, start, end, "expansion requested");
        self.status = Some(format!("loading {file}..."));
        let expander = Arc::clone(&self.expander);
        let tx = self.events.clone();
        tokio::spawn(async move {
            let result = expander.expand(&file, start, end).await;
            let _ = tx.send(AppEvent::Expanded { file, result });
        });
    }

    pub fn apply_expansion(&mut self, file: &str, result: Result<Vec<Hunk>, ExpandError>) {
        match result {
            Ok(hunks) => {
                debug!(file, hunks = hunks.len(), "expansion applied");
                self.status = None;
                self.rerender();
            }
            Err(ExpandError::StaleSession(_)) => {
                debug!(file, "expansion of a previous session ignored");
            }
            Err(err) => self.status = Some(err.to_string()),
        }
    }

    // ---------------------------------------------------------------------
    // Flat file viewer
    // ---------------------------------------------------------------------

    /// Opens the working copy of the file under the cursor (or selected in
    /// the file list) without diff decoration, or closes the viewer.
    pub fn toggle_viewer(&mut self) {
        if self.viewer.take().is_some() {
            self.pending_viewer = None;
            self.cursor = 0;
            self.diff_scroll = 0;
            self.rerender();
            return;
        }
        let path = match self.focus {
            PanelFocus::Diff => self.line_file(self.cursor).map(str::to_owned),
            _ => None,
        }
        .or_else(|| self.selected_file().map(|f| f.path.clone()));
        let Some(path) = path else {
            return;
        };
        self.pending_viewer = Some(path.clone());
        self.status = Some(format!("opening {path}..."));
        let git = self.git.clone();
        let tx = self.events.clone();
        tokio::spawn(async move {
            let result = git.read_working_copy(&path).await;
            let _ = tx.send(AppEvent::FileLoaded { path, result });
        });
    }

    pub fn apply_file(&mut self, path: String, result: Result<String, SourceError>) {
        if self.pending_viewer.as_deref() != Some(path.as_str()) {
            return;
        }
        self.pending_viewer = None;
        match result {
            Ok(text) => {
                self.viewer = Some(FileViewer { path, lines: split_lines(&text) });
                self.status = None;
                self.cursor = 0;
                self.diff_scroll = 0;
                self.rerender();
            }
            Err(err) => self.status = Some(err.to_string()),
        }
    }

    // ---------------------------------------------------------------------
    // Comments
    // ---------------------------------------------------------------------

    fn hunks_for(viewer: Option<&FileViewer>, expander: &ContextExpander<GitProvider>, file: &str) -> Option<Vec<Hunk>> {
        match viewer {
            Some(viewer) if viewer.path == file => Some(vec![file_hunk(&viewer.lines)]),
            _ => expander.hunks(file),
        }
    }

    /// Gutter click on the cursor line; `shift` extends from the last
    /// clicked line.
    pub fn comment_here(&mut self, shift: bool) {
        let Some(line) = self.current_target() else {
            return;
        };
        let (viewer, expander) = (self.viewer.as_ref(), &self.expander);
        if self.anchors.click(&line, shift, |f| Self::hunks_for(viewer, expander, f)) {
            self.mode = Mode::Insert;
        }
        self.rerender();
    }

    /// Starts a keyboard drag at the cursor, or ends the running one.
    pub fn toggle_drag(&mut self) {
        let Some(line) = self.current_target() else {
            return;
        };
        if self.anchors.selector().is_dragging() {
            self.anchors.pointer_enter(&line);
            self.finish_drag(&line, false);
        } else {
            self.anchors.pointer_down(&line);
        }
        self.rerender();
    }

    /// Ends a drag. A multi-line drag opens the form and swallows the click
    /// of the same gesture; otherwise the click on `line` opens it.
    fn finish_drag(&mut self, line: &LineRef, shift: bool) {
        let (viewer, expander) = (self.viewer.as_ref(), &self.expander);
        let dragged = self.anchors.pointer_up(|f| Self::hunks_for(viewer, expander, f));
        let clicked = self.anchors.click(line, shift, |f| Self::hunks_for(viewer, expander, f));
        if dragged || clicked {
            self.mode = Mode::Insert;
            self.focus = PanelFocus::Diff;
        }
    }

    pub fn cancel_selection(&mut self) {
        self.anchors.cancel_selection();
        self.rerender();
    }

    /// The comment widget on the cursor line.
    pub fn comment_at_cursor(&self) -> Option<Uuid> {
        let row = self.lines.get(self.cursor)?.row;
        let node = self.doc.closest(row, |e| e.attr(COMMENT_ID_ATTR).is_some())?;
        self.doc.attr(node, COMMENT_ID_ATTR)?.parse().ok()
    }

    pub fn selected_comment(&self) -> Option<Uuid> {
        let index = self.comment_list_state.selected()?;
        self.anchors.comments().get(index).map(|c| c.id)
    }

    pub fn start_edit(&mut self, id: Uuid) {
        let Some(text) = self.anchors.get(id).map(|c| c.text.clone()) else {
            return;
        };
        if self.anchors.start_editing(id) {
            self.edit_original = Some(text);
            self.mode = Mode::Insert;
            self.rerender();
        }
    }

    pub fn delete_comment(&mut self, id: Uuid) {
        if self.anchors.delete_comment(id) {
            self.status = Some("comment deleted".to_owned());
            if self.anchors.is_empty() {
                self.comment_list_state.select(None);
            }
            self.rerender();
        }
    }

    pub fn clear_comments(&mut self) {
        let count = self.anchors.len();
        self.anchors.clear_all();
        self.anchors.cancel_draft();
        self.comment_list_state.select(None);
        self.status = Some(format!("cleared {count} comments"));
        self.rerender();
    }

    /// True while text is being written that quitting would lose.
    pub fn has_unsaved_input(&self) -> bool {
        self.anchors.draft().is_some_and(|d| !d.text.trim().is_empty()) || self.anchors.editing().is_some()
    }

    fn edit_text(&mut self, edit: impl FnOnce(&mut String)) {
        if let Some(draft) = self.anchors.draft_mut() {
            edit(&mut draft.text);
        } else if let Some(id) = self.anchors.editing() {
            let Some(mut text) = self.anchors.get(id).map(|c| c.text.clone()) else {
                return;
            };
            edit(&mut text);
            self.anchors.update_comment(id, text);
        } else {
            return;
        }
        self.rerender();
    }

    pub fn insert_char(&mut self, c: char) {
        self.edit_text(|text| text.push(c));
    }

    pub fn backspace(&mut self) {
        self.edit_text(|text| {
            text.pop();
        });
    }

    /// Saves the draft or the edited comment. A blank edit deletes the
    /// comment.
    pub fn submit_input(&mut self) {
        if self.anchors.draft().is_some() {
            self.status = Some(match self.anchors.submit_draft() {
                Some(_) => "comment added".to_owned(),
                None => "empty comment discarded".to_owned(),
            });
        } else if let Some(id) = self.anchors.editing() {
            let blank = self.anchors.get(id).is_some_and(|c| c.text.trim().is_empty());
            self.anchors.stop_editing();
            self.edit_original = None;
            if blank {
                self.anchors.delete_comment(id);
            }
        }
        self.mode = Mode::Normal;
        self.rerender();
    }

    /// Drops the draft, or restores the edited comment.
    pub fn cancel_input(&mut self) {
        if self.anchors.draft().is_some() {
            self.anchors.cancel_draft();
        } else if let Some(id) = self.anchors.editing() {
            if let Some(original) = self.edit_original.take() {
                self.anchors.update_comment(id, original);
            }
            self.anchors.stop_editing();
        }
        self.mode = Mode::Normal;
        self.rerender();
    }

    // ---------------------------------------------------------------------
    // Search
    // ---------------------------------------------------------------------

    pub fn open_search(&mut self) {
        self.markers.open_search(&mut self.doc);
        self.search_input = self.markers.search.query().to_owned();
        self.mode = Mode::Search;
        self.needs_paint = true;
    }

    pub fn search_input_changed(&mut self) {
        self.pending_reveal = self.markers.search.set_query(&mut self.doc, &self.search_input);
        self.needs_paint = true;
    }

    pub fn search_step(&mut self, forward: bool) {
        if !self.markers.search.is_open() {
            return;
        }
        let found = if forward {
            self.markers.search.next(&mut self.doc)
        } else {
            self.markers.search.prev(&mut self.doc)
        };
        self.pending_reveal = found;
        self.needs_paint = true;
    }

    pub fn close_search(&mut self) {
        self.markers.close_search(&mut self.doc);
        self.search_input.clear();
        self.mode = Mode::Normal;
        self.needs_paint = true;
    }

    // ---------------------------------------------------------------------
    // Mouse
    // ---------------------------------------------------------------------

    /// Painted line and panel column under a screen position.
    fn line_at(&self, column: u16, row: u16) -> Option<(usize, u16)> {
        let area = self.diff_area;
        if !area.contains(Position { x: column, y: row }) {
            return None;
        }
        let index = self.diff_scroll + usize::from(row - area.y);
        (index < self.lines.len()).then_some((index, column - area.x))
    }

    fn node_at(&self, column: u16, row: u16) -> Option<(usize, u16, NodeId)> {
        let (index, column) = self.line_at(column, row)?;
        self.lines[index].node_at(column).map(|node| (index, column, node))
    }

    fn is_gutter(&self, node: NodeId) -> bool {
        self.doc
            .closest(node, |e| e.has_class("diff-gutter") || e.has_class("file-line-number"))
            .is_some()
    }

    pub fn mouse_down(&mut self, column: u16, row: u16, now: Instant) {
        let Some((index, panel_column, node)) = self.node_at(column, row) else {
            self.press = None;
            return;
        };
        self.cursor = index;
        if self.expand_node(node) {
            return;
        }
        if self.is_gutter(node) {
            if let Some(line) = resolve(&self.doc, node) {
                self.anchors.pointer_down(&line);
                self.press = Some(line);
                self.rerender();
            }
            return;
        }
        self.press = None;

        let double = matches!(
            self.last_click,
            Some((at, c, r)) if c == column && r == row && now.duration_since(at) <= DOUBLE_CLICK
        );
        if double {
            self.last_click = None;
            self.double_click(index, panel_column, node);
        } else {
            self.last_click = Some((now, column, row));
            if self.markers.words.word().is_some() {
                self.markers.click(&mut self.doc);
                self.needs_paint = true;
            }
        }
    }

    /// Highlights every occurrence of the word under a double-click at
    /// panel `column`.
    fn double_click(&mut self, index: usize, column: u16, node: NodeId) {
        let Some(offset) = self.lines[index].hit_of(node).and_then(|hit| column.checked_sub(hit.columns.start)) else {
            return;
        };
        let Some(text) = self.doc.text(node) else {
            return;
        };
        let Some(byte) = text.char_indices().nth(usize::from(offset)).map(|(i, _)| i) else {
            return;
        };
        let Some(word) = word_at(text, byte).map(str::to_owned) else {
            return;
        };
        if self.markers.double_click(&mut self.doc, node, &word) {
            debug!(word = %word, marks = self.markers.words.marks().len(), "word highlighted");
            self.needs_paint = true;
        }
    }

    pub fn mouse_drag(&mut self, column: u16, row: u16) {
        if !self.anchors.selector().is_dragging() {
            return;
        }
        let node = self
            .line_at(column, row)
            .map(|(index, col)| self.lines[index].node_at(col).unwrap_or(self.lines[index].row));
        if let Some(node) = node {
            if self.anchors.pointer_move(&self.doc, node) {
                self.rerender();
            }
        }
    }

    pub fn mouse_up(&mut self, column: u16, row: u16, shift: bool) {
        let Some(press) = self.press.take() else {
            if self.anchors.selector().is_dragging() {
                self.anchors.cancel_selection();
                self.rerender();
            }
            return;
        };
        let released = self
            .node_at(column, row)
            .filter(|&(_, _, node)| self.is_gutter(node))
            .and_then(|(_, _, node)| resolve(&self.doc, node));
        if released.as_ref() == Some(&press) || self.anchors.selector().selected().is_some_and(|r| !r.is_single_line()) {
            self.finish_drag(&press, shift);
        } else {
            self.anchors.cancel_selection();
        }
        self.rerender();
    }

    // ---------------------------------------------------------------------
    // Layout
    // ---------------------------------------------------------------------

    /// Shrinks the diff panel by 5%, never below 20%.
    pub fn shrink_diff_panel(&mut self) {
        const MIN_CENTER: u16 = 20;
        const STEP: u16 = 5;
        if self.center_pct <= MIN_CENTER {
            return;
        }
        let transfer = STEP.min(self.center_pct - MIN_CENTER);
        self.center_pct -= transfer;
        let left_gain = transfer / 2;
        self.left_pct = self.left_pct.saturating_add(left_gain);
        self.right_pct = self.right_pct.saturating_add(transfer - left_gain);
    }

    /// Grows the diff panel by 5%, never above 80%.
    pub fn grow_diff_panel(&mut self) {
        const MAX_CENTER: u16 = 80;
        const MIN_SIDE: u16 = 5;
        const STEP: u16 = 5;
        if self.center_pct >= MAX_CENTER {
            return;
        }
        let transfer = STEP.min(MAX_CENTER - self.center_pct);
        let left_give = (transfer / 2).min(self.left_pct.saturating_sub(MIN_SIDE));
        let right_give = (transfer - transfer / 2).min(self.right_pct.saturating_sub(MIN_SIDE));
        self.left_pct -= left_give;
        self.right_pct -= right_give;
        self.center_pct += left_give + right_give;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gutter_core::{Change, FileStatus, Side};
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    const SOURCE: [&str; 12] = [
        "fn load(raw: &str) -> Value {",
        "    let trimmed = raw.trim();",
        "    let value = parse(trimmed);",
        "    check(&value);",
        "    log(&value);",
        "    let extra = 1;",
        "    let more = 2;",
        "    Value::from(value)",
        "}",
        "// needle",
        "",
        "fn parse(s: &str) -> Value { todo!() }",
    ];

    fn diff() -> FileDiff {
        let changes = SOURCE
            .iter()
            .zip(1u32..)
            .map(|(line, n)| Change::Normal { old_line: n, new_line: n, content: (*line).to_owned() })
            .collect();
        FileDiff {
            path: "src/load.rs".into(),
            old_path: "src/load.rs".into(),
            status: FileStatus::Modified,
            hunks: vec![Hunk { old_start: 1, old_lines: 12, new_start: 1, new_lines: 12, changes }],
            old_line_count: Some(12),
        }
    }

    /// State with the worker pointed at a path that holds no repository.
    fn state() -> (AppState, UnboundedReceiver<AppEvent>) {
        let (tx, rx) = unbounded_channel();
        let git = GitProvider::spawn("/nonexistent/gutter-test".into(), tx.clone()).unwrap();
        let mut state = AppState::new(&Config::default(), DiffSession::Unstaged, git, tx);
        state.diff_viewport_height = 40;
        state.diff_area = Rect::new(0, 0, 100, 40);
        (state, rx)
    }

    fn loaded() -> (AppState, UnboundedReceiver<AppEvent>) {
        let (mut state, rx) = state();
        state.apply_diff(DiffPayload { session: DiffSession::Unstaged, files: Ok(vec![diff()]) });
        state.repaint(&Theme::dark(), 100);
        (state, rx)
    }

    fn line_index(state: &AppState, line: u32) -> usize {
        state
            .lines
            .iter()
            .position(|l| l.target.as_ref().is_some_and(|t| t.line == line && t.side == Side::New))
            .unwrap()
    }

    /// Screen position of the gutter cell that addresses `line`.
    fn gutter_cell(state: &AppState, line: u32) -> (u16, u16) {
        let index = line_index(state, line);
        let painted = &state.lines[index];
        let column = painted
            .hits
            .iter()
            .find(|hit| state.is_gutter(hit.node) && resolve(&state.doc, hit.node) == painted.target)
            .map(|hit| hit.columns.start)
            .unwrap();
        (column, u16::try_from(index - state.diff_scroll).unwrap())
    }

    fn click_gutter(state: &mut AppState, line: u32, shift: bool, now: Instant) {
        let (column, row) = gutter_cell(state, line);
        state.mouse_down(column, row, now);
        state.repaint(&Theme::dark(), 100);
        state.mouse_up(column, row, shift);
        state.repaint(&Theme::dark(), 100);
    }

    #[test]
    fn diff_of_another_session_is_dropped() {
        let (mut state, _rx) = state();
        state.apply_diff(DiffPayload { session: DiffSession::Staged, files: Ok(vec![diff()]) });
        assert!(state.files.is_empty());

        state.apply_diff(DiffPayload { session: DiffSession::Unstaged, files: Ok(vec![diff()]) });
        assert_eq!(state.files.len(), 1);
        assert_eq!(state.file_list_state.selected(), Some(0));
    }

    #[test]
    fn keyboard_drag_writes_a_range_comment() {
        let (mut state, _rx) = loaded();
        let theme = Theme::dark();

        state.cursor_to(line_index(&state, 3));
        state.toggle_drag();
        state.repaint(&theme, 100);
        state.move_cursor(2);
        state.repaint(&theme, 100);
        state.toggle_drag();
        assert_eq!(state.mode, Mode::Insert);
        let draft = state.anchors.draft().unwrap();
        assert_eq!((draft.range.start_line, draft.range.end_line), (3, 5));

        for c in "fix".chars() {
            state.insert_char(c);
        }
        state.submit_input();
        assert_eq!(state.mode, Mode::Normal);
        let comment = &state.anchors.comments()[0];
        assert_eq!((comment.start_line, comment.end_line, comment.text.as_str()), (3, 5, "fix"));
    }

    #[test]
    fn search_moves_the_cursor_to_the_match() {
        let (mut state, _rx) = loaded();
        state.open_search();
        state.search_input = "needle".into();
        state.search_input_changed();
        state.repaint(&Theme::dark(), 100);
        assert_eq!(state.current_target().map(|t| t.line), Some(10));
        assert_eq!(state.markers.search.position_label().as_deref(), Some("1/1"));

        state.close_search();
        assert!(state.markers.search.matches().is_empty());
    }

    #[test]
    fn cancelled_edit_restores_the_comment() {
        let (mut state, _rx) = loaded();
        let id = state.anchors.add_comment("src/load.rs", 4, 4, Side::New, "check this");
        state.rerender();
        state.start_edit(id);
        state.backspace();
        state.insert_char('!');
        assert_eq!(state.anchors.get(id).unwrap().text, "check thi!");

        state.cancel_input();
        assert_eq!(state.anchors.get(id).unwrap().text, "check this");
        assert_eq!(state.anchors.editing(), None);
    }

    #[test]
    fn double_click_highlights_the_word() {
        let (mut state, _rx) = loaded();
        let index = line_index(&state, 3);
        let (column, _) = state.lines[index]
            .hits
            .iter()
            .find_map(|hit| {
                let text = state.doc.text(hit.node)?;
                let at = text.find("value")?;
                Some((hit.columns.start + u16::try_from(text[..at].chars().count()).ok()?, ()))
            })
            .unwrap();
        let row = u16::try_from(index - state.diff_scroll).unwrap();

        let now = Instant::now();
        state.mouse_down(column, row, now);
        assert_eq!(state.markers.words.word(), None);
        state.mouse_down(column, row, now + Duration::from_millis(100));
        assert_eq!(state.markers.words.word(), Some("value"));
    }

    #[test]
    fn gutter_drag_opens_a_range_draft() {
        let (mut state, _rx) = loaded();
        let theme = Theme::dark();

        let (column, row) = gutter_cell(&state, 3);
        state.mouse_down(column, row, Instant::now());
        state.repaint(&theme, 100);
        let (column, row) = gutter_cell(&state, 6);
        state.mouse_drag(column, row);
        state.repaint(&theme, 100);
        let selected = state.anchors.selector().selected().unwrap();
        assert_eq!((selected.start_line, selected.end_line), (3, 6));

        state.mouse_up(column, row, false);
        assert_eq!(state.mode, Mode::Insert);
        let draft = state.anchors.draft().unwrap();
        assert_eq!((draft.range.start_line, draft.range.end_line), (3, 6));
        assert_eq!(draft.code.as_deref(), Some(SOURCE[2..6].join("\n").as_str()));
    }

    #[test]
    fn release_outside_the_gutter_cancels() {
        let (mut state, _rx) = loaded();
        let (column, row) = gutter_cell(&state, 4);
        state.mouse_down(column, row, Instant::now());
        state.repaint(&Theme::dark(), 100);
        assert!(state.anchors.selector().is_dragging());

        state.mouse_up(column + 20, row, false);
        assert!(!state.anchors.selector().is_dragging());
        assert!(state.anchors.selector().selected().is_none());
        assert!(state.anchors.draft().is_none());
        assert_eq!(state.mode, Mode::Normal);
    }

    #[test]
    fn shift_click_in_the_gutter_spans_from_the_last_click() {
        let (mut state, _rx) = loaded();
        let now = Instant::now();

        click_gutter(&mut state, 3, false, now);
        let draft = state.anchors.draft().unwrap();
        assert_eq!((draft.range.start_line, draft.range.end_line), (3, 3));
        state.cancel_input();
        state.repaint(&Theme::dark(), 100);

        click_gutter(&mut state, 8, true, now + Duration::from_secs(1));
        assert_eq!(state.mode, Mode::Insert);
        let draft = state.anchors.draft().unwrap();
        assert_eq!((draft.range.start_line, draft.range.end_line), (3, 8));
    }
}
