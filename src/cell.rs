// src/cell.rs

//! Defines the `Cell` type, its visual attributes (`AttrFlags`, `Attributes`,
//! `UnderlineStyle`), and related constants.
//!
//! A `Cell` represents a single character cell of the terminal grid as seen by
//! the render pipeline. Cells are produced by the screen-buffer collaborator
//! and consumed read-only here; they are immutable for the duration of a frame.
//! Color definitions (`Color`, `NamedColor`) live in the `crate::color` module.

use bitflags::bitflags;
use std::fmt;

use crate::color::Color;

/// Marks the second column of a wide (double-width) character.
///
/// The screen buffer emits the wide character itself in the first column and a
/// placeholder cell containing `'\0'` in the second. The placeholder never
/// contributes a glyph of its own; it only carries the background of the pair.
pub const WIDE_CHAR_PLACEHOLDER: char = '\0';

bitflags! {
    /// Text attribute flags corresponding to common ANSI SGR parameters.
    ///
    /// The `bitflags` macro allows these to be combined
    /// (e.g., `AttrFlags::BOLD | AttrFlags::STRIKETHROUGH`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AttrFlags: u16 {
        const BOLD          = 1 << 0; // Increases intensity or selects a heavier face.
        const FAINT         = 1 << 1; // Decreases intensity.
        const ITALIC        = 1 << 2; // Italicizes text (font-dependent).
        const BLINK         = 1 << 3; // Blinking text; rendering may ignore it.
        const INVERSE       = 1 << 4; // Swaps foreground and background colors.
        const HIDDEN        = 1 << 5; // Invisible text (aka Conceal); background still paints.
        const STRIKETHROUGH = 1 << 6; // Horizontal line through the glyphs.
    }
}

/// The underline variant requested for a cell, if any.
///
/// Decorated variants (curly, dotted, dashed) map to dedicated canvas
/// operations; `Single` and `Double` are drawn as plain lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UnderlineStyle {
    #[default]
    None,
    Single,
    Double,
    Curly,
    Dotted,
    Dashed,
}

/// Visual attributes of a cell: colors, styling flags, and underline variant.
///
/// `fg`/`bg` of `Color::Default` mean "resolve against the current theme".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Attributes {
    /// Foreground color specification.
    pub fg: Color,
    /// Background color specification.
    pub bg: Color,
    /// Styling flags (bold, inverse, hidden, etc.).
    pub flags: AttrFlags,
    /// Underline variant for the cell.
    pub underline: UnderlineStyle,
}

/// A single character cell of the terminal grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    /// The character displayed in the cell. `WIDE_CHAR_PLACEHOLDER` signifies
    /// the second half of a wide character.
    pub ch: char,
    /// The visual attributes of the cell.
    pub attr: Attributes,
}

/// Default cell: a space with default attributes. Used by callers for
/// initializing or clearing rows.
pub const DEFAULT_CELL: Cell = Cell {
    ch: ' ',
    attr: Attributes {
        fg: Color::Default,
        bg: Color::Default,
        flags: AttrFlags::empty(),
        underline: UnderlineStyle::None,
    },
};

impl Cell {
    /// True for the dominant blank case: a space or placeholder character with
    /// no explicit colors and no attribute flags. Such cells paint nothing and
    /// are skipped by the compiler before any color resolution happens.
    pub fn is_default_empty(&self) -> bool {
        (self.ch == ' ' || self.ch == WIDE_CHAR_PLACEHOLDER)
            && self.attr.fg == Color::Default
            && self.attr.bg == Color::Default
            && self.attr.flags.is_empty()
            && self.attr.underline == UnderlineStyle::None
    }

    /// True if rendering this cell could put pixels on the canvas: a visible
    /// character, an explicit background, or inverse video (which turns the
    /// default background into a painted one).
    pub fn is_paintable(&self) -> bool {
        (self.ch != ' ' && self.ch != WIDE_CHAR_PLACEHOLDER)
            || self.attr.bg != Color::Default
            || self.attr.flags.contains(AttrFlags::INVERSE)
    }

    /// True when this cell carries a glyph the compiler should hand to a text
    /// run. Hidden cells keep their background but draw no glyph.
    pub fn has_glyph(&self) -> bool {
        self.ch != ' '
            && self.ch != WIDE_CHAR_PLACEHOLDER
            && !self.attr.flags.contains(AttrFlags::HIDDEN)
    }
}

impl Default for Cell {
    fn default() -> Self {
        DEFAULT_CELL
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ch)
    }
}
