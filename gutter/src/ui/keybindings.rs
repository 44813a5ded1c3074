//! Keybinding dispatcher for gutter.
//!
//! Translates raw crossterm key and mouse events into `AppState` calls and
//! returns a `KeyAction` telling the event loop whether to continue or quit.
//! The dispatcher branches first on `state.mode` so every mode has an
//! isolated handler.

use std::time::Instant;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Position;

use crate::app::{AppState, Mode, PanelFocus};

/// Control-flow signal returned from the dispatchers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Continue,
    Quit,
}

/// Dispatches a key event to the handler matching the current mode.
pub fn handle_key(key: KeyEvent, state: &mut AppState) -> KeyAction {
    match state.mode {
        Mode::HelpOverlay | Mode::PromptPreview => handle_overlay(key, state),
        Mode::ConfirmQuit => handle_confirm_quit(key, state),
        Mode::Normal => handle_normal(key, state),
        Mode::Insert => handle_insert(key, state),
        Mode::Search => handle_search(key, state),
    }
}

// ---------------------------------------------------------------------------
// Normal mode
// ---------------------------------------------------------------------------

fn handle_normal(key: KeyEvent, state: &mut AppState) -> KeyAction {
    if let Some(action) = handle_scroll_key(key, state) {
        return action;
    }
    if let Some(action) = handle_panel_key(key, state) {
        return action;
    }

    match key.code {
        KeyCode::Char('H') => state.focus = state.focus.prev(),
        KeyCode::Char('L') => state.focus = state.focus.next(),

        KeyCode::Char('{') => state.prev_file(),
        KeyCode::Char('}') => state.next_file(),
        KeyCode::Char('[') => state.prev_hunk(),
        KeyCode::Char(']') => state.next_hunk(),
        KeyCode::Char('<') => state.shrink_diff_panel(),
        KeyCode::Char('>') => state.grow_diff_panel(),

        KeyCode::Tab => state.cycle_session(),
        KeyCode::Char('t') => state.toggle_view(),
        KeyCode::Char('o') => state.toggle_viewer(),

        KeyCode::Char('/') => state.open_search(),
        KeyCode::Char('n') => state.search_step(true),
        KeyCode::Char('N') => state.search_step(false),

        KeyCode::Char('X') => state.clear_comments(),

        KeyCode::Char('?') => {
            state.help_scroll = 0;
            state.mode = Mode::HelpOverlay;
        }
        KeyCode::Char('p') => {
            state.help_scroll = 0;
            state.mode = Mode::PromptPreview;
        }

        KeyCode::Esc => {
            if state.anchors.selector().selected().is_some() {
                state.cancel_selection();
            } else if state.markers.search.is_open() {
                state.close_search();
            } else if state.markers.words.word().is_some() {
                state.markers.click(&mut state.doc);
                state.rerender();
            }
        }

        KeyCode::Char('q') => {
            if state.has_unsaved_input() {
                state.mode = Mode::ConfirmQuit;
            } else {
                return KeyAction::Quit;
            }
        }

        _ => {}
    }
    KeyAction::Continue
}

/// Keys whose meaning depends on the focused panel. Returns `None` when the
/// key should fall through to the global Normal bindings.
fn handle_panel_key(key: KeyEvent, state: &mut AppState) -> Option<KeyAction> {
    match (state.focus, key.code) {
        (PanelFocus::FileList, KeyCode::Enter | KeyCode::Char('l')) => state.jump_to_selected_file(),

        (PanelFocus::Diff, KeyCode::Enter) => {
            if !state.expand_at_cursor() {
                match state.comment_at_cursor() {
                    Some(id) => state.start_edit(id),
                    None => state.comment_here(false),
                }
            }
        }
        (PanelFocus::Diff, KeyCode::Char('c')) => state.comment_here(false),
        (PanelFocus::Diff, KeyCode::Char('C')) => state.comment_here(true),
        (PanelFocus::Diff, KeyCode::Char('v')) => state.toggle_drag(),
        (PanelFocus::Diff, KeyCode::Char('e')) => state.start_edit(state.comment_at_cursor()?),
        (PanelFocus::Diff, KeyCode::Char('d')) if key.modifiers.is_empty() => {
            state.delete_comment(state.comment_at_cursor()?)
        }

        (PanelFocus::Comments, KeyCode::Enter | KeyCode::Char('l')) => state.jump_to_comment(),
        (PanelFocus::Comments, KeyCode::Char('e')) => state.start_edit(state.selected_comment()?),
        (PanelFocus::Comments, KeyCode::Char('d')) if key.modifiers.is_empty() => {
            state.delete_comment(state.selected_comment()?)
        }

        _ => return None,
    }
    Some(KeyAction::Continue)
}

/// Scroll keys: j / k / g / G and Ctrl combos.
fn handle_scroll_key(key: KeyEvent, state: &mut AppState) -> Option<KeyAction> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    match key.code {
        KeyCode::Char('j') | KeyCode::Down => state.scroll_down(1),
        KeyCode::Char('k') | KeyCode::Up => state.scroll_up(1),
        KeyCode::Char('g') | KeyCode::Home => state.scroll_top(),
        KeyCode::Char('G') | KeyCode::End => state.scroll_bottom(),
        KeyCode::Char('d') if ctrl => state.half_page_down(),
        KeyCode::Char('u') if ctrl => state.half_page_up(),
        KeyCode::Char('f') if ctrl => state.full_page_down(),
        KeyCode::Char('b') if ctrl => state.full_page_up(),
        KeyCode::PageDown => state.full_page_down(),
        KeyCode::PageUp => state.full_page_up(),
        _ => return None,
    }
    Some(KeyAction::Continue)
}

// ---------------------------------------------------------------------------
// Overlays
// ---------------------------------------------------------------------------

/// Help and prompt preview: j/k scroll, `?` / `p` / Esc / q dismiss.
fn handle_overlay(key: KeyEvent, state: &mut AppState) -> KeyAction {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => state.help_scroll = state.help_scroll.saturating_add(1),
        KeyCode::Char('k') | KeyCode::Up => state.help_scroll = state.help_scroll.saturating_sub(1),
        KeyCode::Char('g') => state.help_scroll = 0,
        KeyCode::Char('G') => state.help_scroll = u16::MAX,
        KeyCode::Char('?') | KeyCode::Char('p') | KeyCode::Esc | KeyCode::Char('q') => state.mode = Mode::Normal,
        _ => {}
    }
    KeyAction::Continue
}

/// `y` quits, `n` / Esc goes back to the comment being written.
fn handle_confirm_quit(key: KeyEvent, state: &mut AppState) -> KeyAction {
    match key.code {
        KeyCode::Char('y') | KeyCode::Char('Y') => KeyAction::Quit,
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
            state.mode = Mode::Insert;
            KeyAction::Continue
        }
        _ => KeyAction::Continue,
    }
}

// ---------------------------------------------------------------------------
// Insert and search
// ---------------------------------------------------------------------------

/// Typing into the draft or the edited comment. Enter saves, Alt-Enter
/// inserts a newline, Esc cancels.
fn handle_insert(key: KeyEvent, state: &mut AppState) -> KeyAction {
    match key.code {
        KeyCode::Esc => state.cancel_input(),
        KeyCode::Enter if key.modifiers.contains(KeyModifiers::ALT) => state.insert_char('\n'),
        KeyCode::Enter => state.submit_input(),
        KeyCode::Backspace => state.backspace(),
        KeyCode::Char('q') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            state.mode = Mode::ConfirmQuit;
        }
        KeyCode::Char(c) => state.insert_char(c),
        _ => {}
    }
    KeyAction::Continue
}

/// Typing a query. Enter keeps the matches and returns to Normal so `n` /
/// `N` navigate; Esc closes the search.
fn handle_search(key: KeyEvent, state: &mut AppState) -> KeyAction {
    match key.code {
        KeyCode::Esc => state.close_search(),
        KeyCode::Enter => state.mode = Mode::Normal,
        KeyCode::Backspace => {
            state.search_input.pop();
            state.search_input_changed();
        }
        KeyCode::Char(c) => {
            state.search_input.push(c);
            state.search_input_changed();
        }
        KeyCode::Down => state.search_step(true),
        KeyCode::Up => state.search_step(false),
        _ => {}
    }
    KeyAction::Continue
}

// ---------------------------------------------------------------------------
// Mouse events
// ---------------------------------------------------------------------------

/// Left button inside the diff panel drives gutter selection, gap
/// expansion and word highlight; elsewhere it focuses the clicked panel.
/// The wheel scrolls the panel under focus.
pub fn handle_mouse(mouse: MouseEvent, state: &mut AppState) -> KeyAction {
    let shift = mouse.modifiers.contains(KeyModifiers::SHIFT);
    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => {
            focus_clicked_panel(mouse.column, mouse.row, state);
            if state.focus == PanelFocus::Diff && matches!(state.mode, Mode::Normal | Mode::Insert) {
                state.mouse_down(mouse.column, mouse.row, Instant::now());
            }
        }
        MouseEventKind::Drag(MouseButton::Left) => state.mouse_drag(mouse.column, mouse.row),
        MouseEventKind::Up(MouseButton::Left) => state.mouse_up(mouse.column, mouse.row, shift),
        MouseEventKind::ScrollUp => scroll(state, -3),
        MouseEventKind::ScrollDown => scroll(state, 3),
        _ => {}
    }
    KeyAction::Continue
}

fn focus_clicked_panel(col: u16, row: u16, state: &mut AppState) {
    let pos = Position { x: col, y: row };
    let [left, center, right] = state.panel_rects;

    if left.width > 0 && left.contains(pos) {
        state.focus = PanelFocus::FileList;
    } else if center.contains(pos) {
        state.focus = PanelFocus::Diff;
    } else if right.width > 0 && right.contains(pos) {
        state.focus = PanelFocus::Comments;
    }
}

fn scroll(state: &mut AppState, delta: i16) {
    if matches!(state.mode, Mode::HelpOverlay | Mode::PromptPreview) {
        state.help_scroll = state.help_scroll.saturating_add_signed(delta);
        return;
    }
    match state.focus {
        PanelFocus::Diff => state.scroll_view(isize::from(delta)),
        _ if delta < 0 => state.scroll_up(delta.unsigned_abs()),
        _ => state.scroll_down(delta.unsigned_abs()),
    }
}
