//! Semantic data model shared by every gutter-core module.
//!
//! Hunks and changes come from the diff source already parsed; this crate
//! never sees raw unified-diff text. Line numbers are 1-based throughout.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which version of a file a line or comment refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// The pre-image.
    Old,
    /// The post-image.
    New,
}

impl Side {
    /// Attribute value used by the flat-file scheme (`data-line-side`).
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Old => "old",
            Side::New => "new",
        }
    }

    /// Parses a `data-line-side` value. Anything unrecognised is `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "old" => Some(Side::Old),
            "new" => Some(Side::New),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line within a hunk.
///
/// `content` never includes the leading `+`, `-` or space of the unified format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// Present on both sides.
    Normal { old_line: u32, new_line: u32, content: String },
    /// New side only.
    Insert { new_line: u32, content: String },
    /// Old side only.
    Delete { old_line: u32, content: String },
}

impl Change {
    pub fn content(&self) -> &str {
        match self {
            Change::Normal { content, .. }
            | Change::Insert { content, .. }
            | Change::Delete { content, .. } => content,
        }
    }

    pub fn old_line(&self) -> Option<u32> {
        match self {
            Change::Normal { old_line, .. } | Change::Delete { old_line, .. } => Some(*old_line),
            Change::Insert { .. } => None,
        }
    }

    pub fn new_line(&self) -> Option<u32> {
        match self {
            Change::Normal { new_line, .. } | Change::Insert { new_line, .. } => Some(*new_line),
            Change::Delete { .. } => None,
        }
    }

    /// The line number this change occupies on `side`, if it exists there.
    pub fn line_on(&self, side: Side) -> Option<u32> {
        match side {
            Side::Old => self.old_line(),
            Side::New => self.new_line(),
        }
    }

    /// The rendering address of this row.
    ///
    /// Normal rows are keyed by their new-side number so that the tag alone
    /// decides the side when a key is decoded.
    pub fn key(&self) -> ChangeKey {
        match self {
            Change::Normal { new_line, .. } => ChangeKey::new(ChangeTag::Normal, *new_line),
            Change::Insert { new_line, .. } => ChangeKey::new(ChangeTag::Insert, *new_line),
            Change::Delete { old_line, .. } => ChangeKey::new(ChangeTag::Delete, *old_line),
        }
    }
}

/// One contiguous diff region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    pub old_start: u32,
    pub old_lines: u32,
    pub new_start: u32,
    pub new_lines: u32,
    pub changes: Vec<Change>,
}

impl Hunk {
    /// First old-side line after this hunk.
    pub fn old_end(&self) -> u32 {
        self.old_start + self.old_lines
    }

    /// First new-side line after this hunk.
    pub fn new_end(&self) -> u32 {
        self.new_start + self.new_lines
    }

    /// The `@@ -a,b +c,d @@` header line.
    pub fn header(&self) -> String {
        format!(
            "@@ -{},{} +{},{} @@",
            self.old_start, self.old_lines, self.new_start, self.new_lines
        )
    }
}

/// Variant tag of a [`ChangeKey`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChangeTag {
    Normal,
    Insert,
    Delete,
}

impl ChangeTag {
    fn as_char(self) -> char {
        match self {
            ChangeTag::Normal => 'N',
            ChangeTag::Insert => 'I',
            ChangeTag::Delete => 'D',
        }
    }

    /// The side a key with this tag resolves to: `D` is old, everything else new.
    pub fn side(self) -> Side {
        match self {
            ChangeTag::Delete => Side::Old,
            ChangeTag::Normal | ChangeTag::Insert => Side::New,
        }
    }
}

/// Per-row address token (`N12`, `I7`, `D3`) attached to rendered cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChangeKey {
    pub tag: ChangeTag,
    pub line: u32,
}

impl ChangeKey {
    pub fn new(tag: ChangeTag, line: u32) -> Self {
        Self { tag, line }
    }

    pub fn side(self) -> Side {
        self.tag.side()
    }
}

impl fmt::Display for ChangeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.tag.as_char(), self.line)
    }
}

/// Error returned when a string is not a well-formed change key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed change key {0:?}")]
pub struct ParseChangeKeyError(pub String);

impl FromStr for ChangeKey {
    type Err = ParseChangeKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let tag = match chars.next() {
            Some('N') => ChangeTag::Normal,
            Some('I') => ChangeTag::Insert,
            Some('D') => ChangeTag::Delete,
            _ => return Err(ParseChangeKeyError(s.to_owned())),
        };
        let line = chars
            .as_str()
            .parse::<u32>()
            .map_err(|_| ParseChangeKeyError(s.to_owned()))?;
        Ok(Self { tag, line })
    }
}

/// Finds the key of the row showing `line` on `side`, if that row is present
/// in `hunks`. Collapsed lines have no row and yield `None`.
pub fn find_change_key(hunks: &[Hunk], side: Side, line: u32) -> Option<ChangeKey> {
    hunks
        .iter()
        .flat_map(|hunk| hunk.changes.iter())
        .find(|change| change.line_on(side) == Some(line))
        .map(Change::key)
}

/// File-level status reported by the diff source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Added,
    Modified,
    Deleted,
    Renamed,
}

impl FileStatus {
    /// Single-letter badge used in file lists.
    pub fn badge(self) -> char {
        match self {
            FileStatus::Added => 'A',
            FileStatus::Modified => 'M',
            FileStatus::Deleted => 'D',
            FileStatus::Renamed => 'R',
        }
    }
}

/// All hunks of one changed file plus its metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    /// New-side path (old-side path for deletions).
    pub path: String,
    /// Pre-rename path; equal to `path` unless the file was renamed.
    pub old_path: String,
    pub status: FileStatus,
    pub hunks: Vec<Hunk>,
    /// Line count of the pre-image, when the diff source knows it. Bounds
    /// the gap below the last hunk.
    pub old_line_count: Option<u32>,
}

impl FileDiff {
    pub fn added(&self) -> usize {
        self.count(|c| matches!(c, Change::Insert { .. }))
    }

    pub fn removed(&self) -> usize {
        self.count(|c| matches!(c, Change::Delete { .. }))
    }

    fn count(&self, pred: impl Fn(&Change) -> bool) -> usize {
        self.hunks
            .iter()
            .flat_map(|h| h.changes.iter())
            .filter(|c| pred(c))
            .count()
    }
}

/// A semantic line coordinate resolved from a rendered node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LineRef {
    pub file: String,
    pub line: u32,
    pub side: Side,
}

/// A review comment anchored to a line range on one side of a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub file: String,
    pub start_line: u32,
    pub end_line: u32,
    /// Fixed at creation.
    pub side: Side,
    pub text: String,
    /// RFC 3339, UTC.
    pub created_at: String,
}

/// A finalized line range on one side of a file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SelectionRange {
    pub file: String,
    pub start_line: u32,
    pub end_line: u32,
    pub side: Side,
}

impl SelectionRange {
    /// Builds a range from two endpoints in either order.
    pub fn spanning(file: impl Into<String>, a: u32, b: u32, side: Side) -> Self {
        Self {
            file: file.into(),
            start_line: a.min(b),
            end_line: a.max(b),
            side,
        }
    }

    pub fn single(file: impl Into<String>, line: u32, side: Side) -> Self {
        Self::spanning(file, line, line, side)
    }

    pub fn is_single_line(&self) -> bool {
        self.start_line == self.end_line
    }

    pub fn contains(&self, line: u32) -> bool {
        (self.start_line..=self.end_line).contains(&line)
    }
}

/// The diff session key: which comparison is on screen.
///
/// Every cache in this crate is scoped to one session and cleared in full
/// when it changes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum DiffSession {
    /// Working tree against the index.
    #[default]
    Unstaged,
    /// Index against HEAD.
    Staged,
    /// A single commit against its parent.
    Commit { hash: String },
    /// `from..to`.
    Range { from: String, to: String },
    /// A branch against its merge-base with the base branch.
    Branch { name: String },
    /// Working tree against HEAD.
    Head,
}

impl DiffSession {
    /// Short label for status bars and logs.
    pub fn label(&self) -> String {
        match self {
            DiffSession::Unstaged => "unstaged".to_owned(),
            DiffSession::Staged => "staged".to_owned(),
            DiffSession::Commit { hash } => format!("commit {}", short_rev(hash)),
            DiffSession::Range { from, to } => format!("{from}..{to}"),
            DiffSession::Branch { name } => format!("branch {name}"),
            DiffSession::Head => "HEAD".to_owned(),
        }
    }
}

fn short_rev(rev: &str) -> &str {
    rev.get(..8).unwrap_or(rev)
}

/// A git revision as understood by the file content provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GitRef {
    /// The staged snapshot (`:0`).
    Index,
    Head,
    /// Any revision expression (`abc123`, `abc123^`, `main`).
    Rev(String),
}

impl fmt::Display for GitRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GitRef::Index => f.write_str(":0"),
            GitRef::Head => f.write_str("HEAD"),
            GitRef::Rev(rev) => f.write_str(rev),
        }
    }
}
