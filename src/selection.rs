// src/selection.rs

//! Selection geometry used by the overlay pass.
//!
//! A `SelectionRange` is a transient, per-frame value built from the host's
//! anchor and head points. It is never cached: the overlay pass re-evaluates
//! it every frame on top of whatever content was replayed, which is what lets
//! an interactive selection change without touching the render cache.

use std::cmp::{max, min};

/// The mode of text selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionMode {
    /// Character-wise selection that follows line order.
    #[default]
    Normal,
    /// Rectangular block selection.
    Block,
}

/// A cell position inside the viewport grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SelectionPoint {
    /// 0-based column index.
    pub col: usize,
    /// 0-based row index.
    pub row: usize,
}

impl SelectionPoint {
    pub const fn new(col: usize, row: usize) -> Self {
        SelectionPoint { col, row }
    }
}

/// A normalized, inclusive selection over viewport cells.
///
/// `start` is the top (and, within a row, left) end regardless of drag
/// direction; normalization happens at construction. For `Block` mode the
/// column bounds are normalized independently of the rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionRange {
    start: SelectionPoint,
    end: SelectionPoint,
    mode: SelectionMode,
}

impl SelectionRange {
    /// Build a normalized range from the drag anchor and current head.
    pub fn new(anchor: SelectionPoint, head: SelectionPoint, mode: SelectionMode) -> Self {
        let (start, end) = match mode {
            SelectionMode::Normal => {
                if (anchor.row, anchor.col) <= (head.row, head.col) {
                    (anchor, head)
                } else {
                    (head, anchor)
                }
            }
            SelectionMode::Block => (
                SelectionPoint::new(min(anchor.col, head.col), min(anchor.row, head.row)),
                SelectionPoint::new(max(anchor.col, head.col), max(anchor.row, head.row)),
            ),
        };
        SelectionRange { start, end, mode }
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    /// Top-left end of the normalized range.
    pub fn start(&self) -> SelectionPoint {
        self.start
    }

    /// Bottom-right end of the normalized range.
    pub fn end(&self) -> SelectionPoint {
        self.end
    }

    /// A constructed range always covers at least the anchor cell.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Cheap per-row predicate: could any cell of `row` be selected?
    /// A range check only; used to skip whole rows before touching cells.
    pub fn might_intersect_row(&self, row: usize) -> bool {
        self.start.row <= row && row <= self.end.row
    }

    /// Precise per-cell predicate.
    pub fn contains(&self, row: usize, col: usize) -> bool {
        if !self.might_intersect_row(row) {
            return false;
        }
        match self.mode {
            SelectionMode::Block => self.start.col <= col && col <= self.end.col,
            SelectionMode::Normal => {
                if self.start.row == self.end.row {
                    self.start.col <= col && col <= self.end.col
                } else if row == self.start.row {
                    col >= self.start.col
                } else if row == self.end.row {
                    col <= self.end.col
                } else {
                    true
                }
            }
        }
    }
}
