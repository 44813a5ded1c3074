//! Annotation core for the gutter review tool.
//!
//! Everything here operates on parsed hunks and on the rendered
//! [`dom::Document`]; terminal drawing and git access live in the `gutter`
//! binary, which implements [`source::FileContentProvider`].

pub mod anchors;
pub mod dom;
pub mod error;
pub mod expand;
pub mod markers;
pub mod prompt;
pub mod render;
pub mod resolver;
pub mod selection;
pub mod source;
pub mod types;

pub use error::{ExpandError, SourceError};
pub use types::{
    Change, ChangeKey, ChangeTag, Comment, DiffSession, FileDiff, FileStatus, GitRef, Hunk,
    LineRef, SelectionRange, Side,
};
