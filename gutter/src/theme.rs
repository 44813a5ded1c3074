//! Color theme system for gutter.
//!
//! A `Theme` holds named `ratatui::style::Color` fields covering every UI surface
//! gutter paints. Two built-in themes are provided:
//!
//! - `dark` uses ANSI 16 colors so it works on any terminal, including
//!   256-color SSH sessions with no truecolor support.
//! - `catppuccin_mocha` uses the Catppuccin Mocha palette in RGB and needs
//!   truecolor.

use ratatui::style::Color;
use tracing::warn;

/// Every color gutter paints with.
///
/// Fields are grouped by the surface that uses them. Callers read them
/// directly, as in `Style::default().fg(theme.diff_added)`; nothing is
/// derived at paint time, so a theme is just a table of colors.
#[derive(Debug, Clone)]
pub struct Theme {
    // Panel borders
    /// Border of the focused panel, and the overlay frames.
    pub border_active: Color,
    /// Border of unfocused panels.
    pub border_inactive: Color,

    // Diff view
    /// Inserted lines (`+`) and the `+N` file count.
    pub diff_added: Color,
    /// Deleted lines (`-`), the `-N` file count and the `(deleted)` tag.
    pub diff_removed: Color,
    /// Unchanged context lines and comment prose.
    pub diff_context: Color,
    /// Hunk header rows (`@@ ... @@`).
    pub diff_hunk_header: Color,
    /// Line numbers in the gutter columns.
    pub diff_gutter: Color,
    /// Expand actions on collapsed gaps.
    pub diff_gap: Color,
    /// Background of the keyboard cursor row.
    pub cursor_bg: Color,
    /// Background of rows inside the selected or commented range.
    pub selection_bg: Color,

    // Marks
    //
    // Mark colors are backgrounds; `mark_fg` keeps the text readable on all
    // three whatever the syntax color underneath was.
    /// Every search match.
    pub search_match_bg: Color,
    /// The match `n`/`N` last moved to.
    pub search_current_bg: Color,
    /// Occurrences of a double-clicked word.
    pub word_highlight_bg: Color,
    /// Foreground drawn on top of any mark background.
    pub mark_fg: Color,

    // Comments
    /// Comment widget border and the `file:line` header.
    pub comment_border: Color,
    /// Side labels, quoted code and other secondary comment text.
    pub comment_meta: Color,
    /// Border of the comment currently being edited.
    pub comment_editing: Color,

    // File tree
    /// Status badge: added or untracked.
    pub file_added: Color,
    /// Status badge: deleted.
    pub file_removed: Color,
    /// Status badge: modified.
    pub file_modified: Color,
    /// Status badge: renamed.
    pub file_renamed: Color,

    // Status bar
    /// Status bar background.
    pub status_bar_bg: Color,
    /// Status bar text.
    pub status_bar_fg: Color,
    /// Mode badge in NORMAL mode.
    pub status_mode_normal: Color,
    /// Mode badge while a comment form has focus.
    pub status_mode_insert: Color,
    /// Mode badge while the search input has focus.
    pub status_mode_search: Color,
}

impl Theme {
    /// The built-in dark theme using ANSI 16 colors.
    pub fn dark() -> Self {
        Self {
            border_active: Color::Cyan,
            border_inactive: Color::DarkGray,

            diff_added: Color::Green,
            diff_removed: Color::Red,
            diff_context: Color::Reset,
            diff_hunk_header: Color::Cyan,
            diff_gutter: Color::DarkGray,
            diff_gap: Color::Blue,
            cursor_bg: Color::Black,
            selection_bg: Color::Indexed(236),

            search_match_bg: Color::Yellow,
            search_current_bg: Color::LightRed,
            word_highlight_bg: Color::Blue,
            mark_fg: Color::Black,

            comment_border: Color::Magenta,
            comment_meta: Color::DarkGray,
            comment_editing: Color::Yellow,

            file_added: Color::Green,
            file_removed: Color::Red,
            file_modified: Color::Yellow,
            file_renamed: Color::Cyan,

            status_bar_bg: Color::DarkGray,
            status_bar_fg: Color::White,
            status_mode_normal: Color::Cyan,
            status_mode_insert: Color::Green,
            status_mode_search: Color::Yellow,
        }
    }

    /// The Catppuccin Mocha theme using RGB truecolor values.
    ///
    /// Palette source: <https://github.com/catppuccin/catppuccin> Mocha variant.
    pub fn catppuccin_mocha() -> Self {
        let green = Color::Rgb(166, 227, 161); // #a6e3a1
        let red = Color::Rgb(243, 139, 168); // #f38ba8
        let yellow = Color::Rgb(249, 226, 175); // #f9e2af
        let blue = Color::Rgb(137, 180, 250); // #89b4fa
        let teal = Color::Rgb(148, 226, 213); // #94e2d5
        let lavender = Color::Rgb(180, 190, 254); // #b4befe
        let mauve = Color::Rgb(203, 166, 247); // #cba6f7
        let peach = Color::Rgb(250, 179, 135); // #fab387
        let overlay1 = Color::Rgb(127, 132, 156); // #7f849c
        let surface0 = Color::Rgb(49, 50, 68); // #313244
        let surface1 = Color::Rgb(69, 71, 90); // #45475a
        let crust = Color::Rgb(17, 17, 27); // #11111b
        let text = Color::Rgb(205, 214, 244); // #cdd6f4

        Self {
            border_active: lavender,
            border_inactive: overlay1,

            diff_added: green,
            diff_removed: red,
            diff_context: text,
            diff_hunk_header: teal,
            diff_gutter: overlay1,
            diff_gap: blue,
            cursor_bg: surface0,
            selection_bg: surface1,

            search_match_bg: yellow,
            search_current_bg: peach,
            word_highlight_bg: blue,
            mark_fg: crust,

            comment_border: mauve,
            comment_meta: overlay1,
            comment_editing: yellow,

            file_added: green,
            file_removed: red,
            file_modified: yellow,
            file_renamed: teal,

            status_bar_bg: surface1,
            status_bar_fg: text,
            status_mode_normal: lavender,
            status_mode_insert: green,
            status_mode_search: yellow,
        }
    }

    /// Resolves a theme name from config. Unknown names fall back to `dark()`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "catppuccin-mocha" | "catppuccin_mocha" => Self::catppuccin_mocha(),
            "dark" => Self::dark(),
            other => {
                warn!(theme = other, "unknown theme, falling back to dark");
                Self::dark()
            }
        }
    }
}
