//! Panel geometry, panel chrome and the status bar.
//!
//! Widths follow the terminal on every frame:
//!
//! | Terminal width | Panels |
//! |----------------|--------|
//! | `>= 120` cols  | files, diff and comments at `left_pct / center_pct / right_pct` |
//! | `80..120` cols | files and diff; comments collapse |
//! | `< 80` cols    | diff only |
//!
//! Neighbouring blocks overlap by one column and merge their borders.

use ratatui::{
    Frame,
    layout::{Constraint, Layout, Margin, Rect, Spacing},
    style::{Modifier, Style},
    symbols::merge::MergeStrategy,
    text::{Line, Span},
    widgets::{Block, BorderType, Paragraph},
};

use crate::app::{AppState, Mode};
use crate::theme::Theme;

/// Width below which the comments panel collapses.
const WIDE: u16 = 120;
/// Width below which the file list collapses too.
const NARROW: u16 = 80;

/// `[files, diff, comments, status_bar]` for the current frame. Collapsed
/// panels come back zero-width.
pub fn compute_layout(frame: &Frame, state: &AppState) -> [Rect; 4] {
    let width = frame.area().width;
    let [main_area, status_bar] =
        frame.area().layout(&Layout::vertical([Constraint::Fill(1), Constraint::Length(1)]));

    let columns = if width >= WIDE {
        [
            Constraint::Percentage(state.left_pct),
            Constraint::Percentage(state.center_pct),
            Constraint::Percentage(state.right_pct),
        ]
    } else if width >= NARROW {
        [Constraint::Percentage(state.left_pct + 5), Constraint::Fill(1), Constraint::Length(0)]
    } else {
        [Constraint::Length(0), Constraint::Fill(1), Constraint::Length(0)]
    };
    let [left, center, right] =
        main_area.layout(&Layout::horizontal(columns).spacing(Spacing::Overlap(1)));

    [left, center, right, status_bar]
}

/// A panel's content area inside its one-cell border.
pub fn inner_rect(area: Rect) -> Rect {
    area.inner(Margin { vertical: 1, horizontal: 1 })
}

/// Bordered block for a panel; thick and highlighted while focused. Fuzzy
/// merging keeps junctions right where thick and plain borders meet.
pub fn panel_block<'a>(title: &'a str, is_focused: bool, theme: &Theme) -> Block<'a> {
    let (border_type, color) = if is_focused {
        (BorderType::Thick, theme.border_active)
    } else {
        (BorderType::Plain, theme.border_inactive)
    };
    Block::bordered()
        .title(title)
        .border_type(border_type)
        .border_style(Style::default().fg(color))
        .merge_borders(MergeStrategy::Fuzzy)
}

/// Renders the 1-row status bar at the bottom of the terminal.
///
/// Left to right: mode badge, diff session and view, comment count, then
/// either the search input (while typing a query), the search position, or
/// the latest status message.
pub fn render_status_bar(frame: &mut Frame, area: Rect, state: &AppState, theme: &Theme) {
    let (mode_text, mode_fg) = match state.mode {
        Mode::Insert => (" INSERT ", theme.status_mode_insert),
        Mode::Search => (" SEARCH ", theme.status_mode_search),
        Mode::Normal | Mode::ConfirmQuit | Mode::HelpOverlay | Mode::PromptPreview => {
            (" NORMAL ", theme.status_mode_normal)
        }
    };

    let mut spans = vec![
        Span::styled(mode_text, Style::default().fg(mode_fg).add_modifier(Modifier::BOLD)),
        Span::raw(format!(" {} | {} ", state.session.label(), state.render_options.view.label())),
    ];
    if !state.anchors.is_empty() {
        spans.push(Span::raw(format!("| {} comments ", state.anchors.len())));
    }
    if state.diff_loading {
        spans.push(Span::raw("| loading... "));
    }

    let search = &state.markers.search;
    if state.mode == Mode::Search {
        let position = search.position_label().unwrap_or_else(|| "0/0".to_owned());
        spans.push(Span::styled(
            format!("/{}▏ {position}", state.search_input),
            Style::default().fg(theme.status_mode_search),
        ));
    } else if state.mode == Mode::ConfirmQuit {
        spans.push(Span::styled(
            "Discard the comment being written and quit? (y/n)",
            Style::default().fg(theme.status_mode_insert).add_modifier(Modifier::BOLD),
        ));
    } else if let Some(status) = &state.status {
        spans.push(Span::raw(format!("| {status}")));
    } else if search.is_open() {
        let position = search.position_label().unwrap_or_else(|| "no matches".to_owned());
        spans.push(Span::raw(format!("| /{} {position}", search.query())));
    }

    frame.render_widget(
        Paragraph::new(Line::from(spans))
            .style(Style::default().bg(theme.status_bar_bg).fg(theme.status_bar_fg)),
        area,
    );
}
