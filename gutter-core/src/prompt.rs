//! Review prompt export and the parsers used to display it back.
//!
//! The prompt is a plain-text bullet list, one line per comment:
//!
//! ```text
//! Please address these review comments:
//!
//! - `src/lib.rs:12` — rename this
//! - `src/lib.rs:20-24 (deleted)` — why was this removed?
//! ```

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::types::{Comment, Side};

pub const PROMPT_HEADER: &str = "Please address these review comments:";

static COMMENT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^- `(.+?):(\d+)(?:-(\d+))?( \(deleted\))?` — (.+)$").expect("valid regex")
});
static FENCE_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^```(\w*)$").expect("valid regex"));
static FENCED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```(\w*)\n((?s).*?)```").expect("valid regex"));

/// Renders every comment as a review prompt. Files are sorted by path and
/// comments within a file by start line. Empty input yields an empty string.
pub fn generate_prompt(comments: &[Comment]) -> String {
    if comments.is_empty() {
        return String::new();
    }
    let mut by_file: BTreeMap<&str, Vec<&Comment>> = BTreeMap::new();
    for comment in comments {
        by_file.entry(comment.file.as_str()).or_default().push(comment);
    }

    let mut lines = vec![PROMPT_HEADER.to_owned(), String::new()];
    for (file, mut file_comments) in by_file {
        file_comments.sort_by_key(|c| c.start_line);
        for comment in file_comments {
            let location = if comment.start_line == comment.end_line {
                format!("{file}:{}", comment.start_line)
            } else {
                format!("{file}:{}-{}", comment.start_line, comment.end_line)
            };
            let deleted = if comment.side == Side::Old { " (deleted)" } else { "" };
            lines.push(format!("- `{location}{deleted}` — {}", comment.text));
        }
    }
    lines.join("\n")
}

/// One line (or fenced block) of a parsed prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptLine {
    Text(String),
    Comment {
        path: String,
        file_name: String,
        start_line: u32,
        end_line: Option<u32>,
        deleted: bool,
        text: String,
    },
    CodeBlock { language: String, content: String },
}

/// Splits a prompt into text lines, comment bullets and fenced code blocks.
/// An unterminated fence runs to the end of the input.
pub fn parse_prompt_lines(prompt: &str) -> Vec<PromptLine> {
    let lines: Vec<&str> = prompt.split('\n').collect();
    let mut out = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        if let Some(fence) = FENCE_OPEN.captures(lines[i]) {
            let language = fence[1].to_owned();
            let mut code = Vec::new();
            i += 1;
            while i < lines.len() && lines[i] != "```" {
                code.push(lines[i]);
                i += 1;
            }
            i += 1;
            out.push(PromptLine::CodeBlock { language, content: code.join("\n") });
            continue;
        }
        out.push(parse_comment_line(lines[i]).unwrap_or_else(|| PromptLine::Text(lines[i].to_owned())));
        i += 1;
    }
    out
}

fn parse_comment_line(line: &str) -> Option<PromptLine> {
    let caps = COMMENT_LINE.captures(line)?;
    let path = caps[1].to_owned();
    let file_name = path.rsplit('/').next().unwrap_or(&path).to_owned();
    Some(PromptLine::Comment {
        start_line: caps[2].parse().ok()?,
        end_line: caps.get(3).and_then(|m| m.as_str().parse().ok()),
        deleted: caps.get(4).is_some(),
        text: caps[5].to_owned(),
        path,
        file_name,
    })
}

/// A run of comment body text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentSegment {
    Text(String),
    Code { language: Option<String>, content: String },
}

/// Splits a comment body into prose and fenced code segments.
pub fn parse_comment_text(text: &str) -> Vec<CommentSegment> {
    let mut segments = Vec::new();
    let mut last = 0;
    for caps in FENCED_BLOCK.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        if whole.start() > last {
            segments.push(CommentSegment::Text(text[last..whole.start()].to_owned()));
        }
        let language = Some(caps[1].to_owned()).filter(|l| !l.is_empty());
        segments.push(CommentSegment::Code { language, content: caps[2].to_owned() });
        last = whole.end();
    }
    if last < text.len() {
        segments.push(CommentSegment::Text(text[last..].to_owned()));
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn comment(file: &str, start: u32, end: u32, side: Side, text: &str) -> Comment {
        Comment {
            id: Uuid::new_v4(),
            file: file.into(),
            start_line: start,
            end_line: end,
            side,
            text: text.into(),
            created_at: String::new(),
        }
    }

    #[test]
    fn prompt_sorts_files_and_lines() {
        let prompt = generate_prompt(&[
            comment("src/b.rs", 30, 30, Side::New, "third"),
            comment("src/a.rs", 9, 12, Side::New, "second"),
            comment("src/a.rs", 2, 2, Side::Old, "first"),
        ]);
        assert_eq!(
            prompt,
            "Please address these review comments:\n\n\
             - `src/a.rs:2 (deleted)` — first\n\
             - `src/a.rs:9-12` — second\n\
             - `src/b.rs:30` — third"
        );
        assert_eq!(generate_prompt(&[]), "");
    }

    #[test]
    fn generated_prompt_parses_back() {
        let prompt = generate_prompt(&[comment("src/ui/mod.rs", 4, 8, Side::Old, "gone?")]);
        let parsed = parse_prompt_lines(&prompt);
        assert_eq!(parsed[0], PromptLine::Text(PROMPT_HEADER.into()));
        assert_eq!(
            parsed[2],
            PromptLine::Comment {
                path: "src/ui/mod.rs".into(),
                file_name: "mod.rs".into(),
                start_line: 4,
                end_line: Some(8),
                deleted: true,
                text: "gone?".into(),
            }
        );
    }

    #[test]
    fn prompt_fences_become_code_blocks() {
        let parsed = parse_prompt_lines("intro\n```rust\nfn a() {}\nfn b() {}\n```\nafter");
        assert_eq!(
            parsed,
            vec![
                PromptLine::Text("intro".into()),
                PromptLine::CodeBlock { language: "rust".into(), content: "fn a() {}\nfn b() {}".into() },
                PromptLine::Text("after".into()),
            ]
        );
    }

    #[test]
    fn comment_text_splits_code_segments() {
        let segments = parse_comment_text("use this:\n```rust\nlet x = 1;\n```\nthanks");
        assert_eq!(
            segments,
            vec![
                CommentSegment::Text("use this:\n".into()),
                CommentSegment::Code { language: Some("rust".into()), content: "let x = 1;\n".into() },
                CommentSegment::Text("\nthanks".into()),
            ]
        );
        assert!(parse_comment_text("").is_empty());
        assert_eq!(
            parse_comment_text("```\nplain\n```"),
            vec![CommentSegment::Code { language: None, content: "plain\n".into() }]
        );
    }
}
