//! Modal overlays: the keybinding help and the prompt preview.
//!
//! Both are drawn inside the normal `terminal.draw()` closure: `Clear` erases
//! a centred rect, then a bordered `Paragraph` scrolled by `help_scroll`
//! goes on top.

use gutter_core::prompt::{generate_prompt, parse_comment_text, parse_prompt_lines, CommentSegment, PromptLine};
use ratatui::{
    Frame,
    layout::{Constraint, Rect},
    style::{Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Clear, Paragraph, Wrap},
};

use crate::app::AppState;
use crate::theme::Theme;

/// Overlays are skipped on terminals narrower than this.
const MIN_WIDTH: u16 = 60;

fn overlay(frame: &mut Frame, title: &str, body: Text<'static>, scroll: u16, theme: &Theme) {
    if frame.area().width < MIN_WIDTH {
        return;
    }
    let area: Rect = frame
        .area()
        .centered(Constraint::Percentage(80), Constraint::Percentage(80));
    frame.render_widget(Clear, area);
    let block = Block::bordered()
        .title(title.to_owned())
        .border_style(Style::default().fg(theme.border_active));
    frame.render_widget(
        Paragraph::new(body).block(block).wrap(Wrap { trim: false }).scroll((scroll, 0)),
        area,
    );
}

pub fn render_help_overlay(frame: &mut Frame, theme: &Theme, help_scroll: u16) {
    overlay(frame, " Help  (j/k scroll, ? or Esc to close) ", help_text(), help_scroll, theme);
}

/// The prompt that will be printed on exit, styled the way it parses.
pub fn render_prompt_preview(frame: &mut Frame, state: &AppState, theme: &Theme) {
    let prompt = generate_prompt(state.anchors.comments());
    let body = if prompt.is_empty() {
        Text::from("No comments yet.")
    } else {
        prompt_text(&prompt, theme)
    };
    overlay(frame, " Review prompt  (printed on exit; p or Esc to close) ", body, state.help_scroll, theme);
}

fn prompt_text(prompt: &str, theme: &Theme) -> Text<'static> {
    let mut lines = Vec::new();
    for line in parse_prompt_lines(prompt) {
        match line {
            PromptLine::Text(text) => lines.push(Line::from(text)),
            PromptLine::Comment { path, start_line, end_line, deleted, text, .. } => {
                let range = match end_line {
                    Some(end) => format!("{start_line}-{end}"),
                    None => start_line.to_string(),
                };
                let location = Span::styled(
                    format!("{path}:{range}"),
                    Style::default().fg(theme.comment_border).add_modifier(Modifier::BOLD),
                );
                let mut head = vec![Span::raw("- "), location];
                if deleted {
                    head.push(Span::styled(" (deleted)", Style::default().fg(theme.diff_removed)));
                }
                head.push(Span::raw("  "));
                lines.extend(comment_lines(&text, head, theme));
            }
            PromptLine::CodeBlock { content, .. } => {
                let style = Style::default().fg(theme.comment_meta).add_modifier(Modifier::ITALIC);
                lines.extend(content.split('\n').map(|l| Line::styled(format!("    {l}"), style)));
            }
        }
    }
    Text::from(lines)
}

/// Comment body lines, prose in the body color and fenced code dimmed.
/// `head` is prepended to the first line.
pub fn comment_lines(text: &str, head: Vec<Span<'static>>, theme: &Theme) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut current = head;
    for segment in parse_comment_text(text) {
        let (content, style) = match segment {
            CommentSegment::Text(text) => (text, Style::default().fg(theme.diff_context)),
            CommentSegment::Code { content, .. } => {
                (content, Style::default().fg(theme.comment_meta).add_modifier(Modifier::ITALIC))
            }
        };
        let mut parts = content.split('\n').peekable();
        while let Some(part) = parts.next() {
            if !part.is_empty() {
                current.push(Span::styled(part.to_owned(), style));
            }
            if parts.peek().is_some() {
                lines.push(Line::from(std::mem::take(&mut current)));
            }
        }
    }
    if !current.is_empty() {
        lines.push(Line::from(current));
    }
    lines
}

fn help_text() -> Text<'static> {
    Text::from(vec![
        Line::from("Navigation"),
        Line::from("  j / k         Move down / up"),
        Line::from("  g / G         Jump to top / bottom"),
        Line::from("  Ctrl-d / u    Half page down / up"),
        Line::from("  Ctrl-f / b    Full page down / up"),
        Line::from("  H / L         Focus previous / next panel"),
        Line::from("  { / }         Previous / next file"),
        Line::from("  [ / ]         Previous / next hunk"),
        Line::from("  < / >         Shrink / grow the diff panel"),
        Line::from(""),
        Line::from("Diff"),
        Line::from("  Tab           Cycle unstaged -> staged -> HEAD"),
        Line::from("  t             Toggle unified / split view"),
        Line::from("  o             Open / close the whole file"),
        Line::from("  Enter         Expand gap, edit comment, or comment on line"),
        Line::from("  c / C         Comment on line / extend from last line"),
        Line::from("  v             Start / finish a range selection"),
        Line::from("  e / d         Edit / delete the comment under the cursor"),
        Line::from("  mouse         Drag the gutter to select lines, click gap actions,"),
        Line::from("                double-click a word to highlight it"),
        Line::from(""),
        Line::from("Comment form"),
        Line::from("  Enter         Save"),
        Line::from("  Alt-Enter     New line"),
        Line::from("  Esc           Cancel"),
        Line::from(""),
        Line::from("Search"),
        Line::from("  /             Search the rendered code"),
        Line::from("  n / N         Next / previous match"),
        Line::from("  Esc           Close the search"),
        Line::from(""),
        Line::from("Comments"),
        Line::from("  Enter / l     Jump to the selected comment"),
        Line::from("  X             Clear all comments"),
        Line::from("  p             Preview the prompt printed on exit"),
        Line::from(""),
        Line::from("  ?             Toggle this help"),
        Line::from("  q             Quit"),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_code_splits_comment_lines() {
        let theme = Theme::dark();
        let lines = comment_lines("use this:\n```rust\nlet x = 1;\n```\nthanks", vec![Span::raw("> ")], &theme);
        let rendered: Vec<String> = lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect();
        assert_eq!(rendered, vec!["> use this:", "let x = 1;", "", "thanks"]);
    }
}
