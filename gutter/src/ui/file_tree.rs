//! File list panel: one row per changed file with its status badge, path,
//! line counts and the number of comments on it.

use ratatui::{
    Frame,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{List, ListItem},
};

use gutter_core::{FileDiff, FileStatus};

use crate::app::{AppState, PanelFocus};
use crate::theme::Theme;
use crate::ui::layout::panel_block;

/// Paths longer than this are shown with their head elided.
const MAX_PATH: usize = 32;

pub fn render_file_list(frame: &mut Frame, area: Rect, focus: PanelFocus, state: &mut AppState, theme: &Theme) {
    let title = match state.files.len() {
        0 => "Files".to_owned(),
        n => format!("Files ({n})"),
    };
    let block = panel_block(&title, focus == PanelFocus::FileList, theme);

    let items: Vec<ListItem> = if state.files.is_empty() {
        let msg = if state.diff_loading { "Loading..." } else { "No changed files" };
        vec![ListItem::new(Line::raw(msg))]
    } else {
        state
            .files
            .iter()
            .map(|file| file_item(file, state.anchors.comments_for(&file.path).len(), theme))
            .collect()
    };

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().fg(theme.border_active).add_modifier(Modifier::BOLD));

    frame.render_stateful_widget(list, area, &mut state.file_list_state);
}

fn file_item(file: &FileDiff, comments: usize, theme: &Theme) -> ListItem<'static> {
    let badge_color = match file.status {
        FileStatus::Added => theme.file_added,
        FileStatus::Deleted => theme.file_removed,
        FileStatus::Renamed => theme.file_renamed,
        FileStatus::Modified => theme.file_modified,
    };
    let mut spans = vec![
        Span::styled(format!("{} ", file.status.badge()), Style::default().fg(badge_color)),
        Span::raw(elide(&file.path)),
        Span::styled(format!("  +{}", file.added()), Style::default().fg(theme.diff_added)),
        Span::styled(format!(" -{}", file.removed()), Style::default().fg(theme.diff_removed)),
    ];
    if comments > 0 {
        spans.push(Span::styled(format!("  ✎{comments}"), Style::default().fg(theme.comment_border)));
    }
    ListItem::new(Line::from(spans))
}

fn elide(path: &str) -> String {
    let count = path.chars().count();
    if count <= MAX_PATH {
        return path.to_owned();
    }
    let tail: String = path.chars().skip(count - (MAX_PATH - 1)).collect();
    format!("…{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_paths_keep_their_tail() {
        assert_eq!(elide("src/lib.rs"), "src/lib.rs");
        let long = "crates/very/deeply/nested/module/path/lib.rs";
        let shown = elide(long);
        assert_eq!(shown.chars().count(), MAX_PATH);
        assert!(shown.ends_with("path/lib.rs"));
    }
}
