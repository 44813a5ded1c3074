//! Frame rendering for gutter.
//!
//! [`render`] is the single entry point called from the event loop's
//! `terminal.draw()` closure. Layout arithmetic lives in `layout.rs`, the
//! diff panel in `diff_view.rs`, the file list in `file_tree.rs` and the
//! overlays in `help.rs`; the comments panel is drawn here.

pub mod diff_view;
pub mod file_tree;
pub mod help;
pub mod keybindings;
mod layout;

use ratatui::{
    Frame,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{List, ListItem},
};

use crate::app::{AppState, Mode, PanelFocus};
use crate::theme::Theme;
use layout::{compute_layout, inner_rect, panel_block, render_status_bar};

/// Renders one complete frame.
///
/// Panel rects and inner heights are written back into `state` so the next
/// key or mouse event can page and hit-test against what is on screen.
pub fn render(frame: &mut Frame, state: &mut AppState, theme: &Theme) {
    let [left, center, right, status_bar] = compute_layout(frame, state);

    state.panel_rects = [left, center, right];
    state.file_list_viewport_height = inner_rect(left).height;
    state.diff_viewport_height = inner_rect(center).height;
    state.comments_viewport_height = inner_rect(right).height;

    let focus = state.focus;
    if left.width > 0 {
        file_tree::render_file_list(frame, left, focus, state, theme);
    }
    diff_view::render_diff(frame, center, focus, state, theme);
    if right.width > 0 {
        render_comments(frame, right, focus, state, theme);
    }
    render_status_bar(frame, status_bar, state, theme);

    match state.mode {
        Mode::HelpOverlay => help::render_help_overlay(frame, theme, state.help_scroll),
        Mode::PromptPreview => help::render_prompt_preview(frame, state, theme),
        _ => {}
    }
}

/// Every comment in the review, in creation order.
fn render_comments(frame: &mut Frame, area: Rect, focus: PanelFocus, state: &mut AppState, theme: &Theme) {
    let title = match state.anchors.len() {
        0 => "Comments".to_owned(),
        n => format!("Comments ({n})"),
    };
    let block = panel_block(&title, focus == PanelFocus::Comments, theme);

    let editing = state.anchors.editing();
    let items: Vec<ListItem> = if state.anchors.is_empty() {
        vec![ListItem::new(Line::raw("Select lines in the gutter to comment."))]
    } else {
        state
            .anchors
            .comments()
            .iter()
            .map(|comment| {
                let range = if comment.start_line == comment.end_line {
                    comment.start_line.to_string()
                } else {
                    format!("{}-{}", comment.start_line, comment.end_line)
                };
                let border = if editing == Some(comment.id) { theme.comment_editing } else { theme.comment_border };
                let mut lines = vec![Line::from(vec![
                    Span::styled(
                        format!("{}:{range}", comment.file),
                        Style::default().fg(border).add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(format!(" {}", comment.side), Style::default().fg(theme.comment_meta)),
                ])];
                lines.extend(help::comment_lines(&comment.text, vec![Span::raw("  ")], theme));
                lines.push(Line::raw(""));
                ListItem::new(lines)
            })
            .collect()
    };

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().bg(theme.cursor_bg));
    frame.render_stateful_widget(list, area, &mut state.comment_list_state);
}
