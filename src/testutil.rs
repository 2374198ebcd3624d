// src/testutil.rs

//! Shared test doubles for the pipeline: an in-memory grid, fixed font
//! metrics, a call-recording canvas, and resolvers with controllable
//! behavior. Only compiled for tests.

use anyhow::{bail, Result};
use std::cell::Cell as StdCell;

use crate::canvas::{Canvas, DrawCommand, FontHandle, PointF, RectF};
use crate::cell::{Attributes, Cell};
use crate::color::{Color, ColorResolver, Rgba};
use crate::grid::{FontSource, GridSource};

/// An in-memory grid with per-row dirty bits and a content revision, mirroring
/// what a real screen buffer provides. Counts `row()` calls so tests can prove
/// the compiler was not invoked on a cache hit.
pub struct MockGrid {
    columns: usize,
    rows: Vec<Vec<Cell>>,
    dirty: Vec<bool>,
    revision: u64,
    row_reads: StdCell<usize>,
}

impl MockGrid {
    /// A grid of default (blank) cells, everything initially dirty.
    pub fn blank(columns: usize, rows: usize) -> Self {
        MockGrid {
            columns,
            rows: vec![vec![Cell::default(); columns]; rows],
            dirty: vec![true; rows],
            revision: 1,
            row_reads: StdCell::new(0),
        }
    }

    /// Overwrite one cell, marking the row dirty and bumping the revision.
    pub fn set(&mut self, col: usize, row: usize, ch: char, attr: Attributes) {
        self.rows[row][col] = Cell { ch, attr };
        self.dirty[row] = true;
        self.revision += 1;
    }

    /// Write a string of single-width characters starting at `(col, row)`.
    pub fn set_text(&mut self, col: usize, row: usize, text: &str, attr: Attributes) {
        for (i, ch) in text.chars().enumerate() {
            self.set(col + i, row, ch, attr);
        }
    }

    /// Truncate one row's cell storage (a short scrollback line).
    pub fn truncate_row(&mut self, row: usize, len: usize) {
        self.rows[row].truncate(len);
    }

    /// Clear every dirty bit without touching the revision.
    pub fn mark_all_clean(&mut self) {
        self.dirty.iter_mut().for_each(|bit| *bit = false);
    }

    pub fn dirty_bits(&self) -> &[bool] {
        &self.dirty
    }

    /// Number of `row()` calls so far.
    pub fn row_reads(&self) -> usize {
        self.row_reads.get()
    }
}

impl GridSource for MockGrid {
    fn columns(&self) -> usize {
        self.columns
    }

    fn rows(&self) -> usize {
        self.rows.len()
    }

    fn row(&self, index: usize) -> &[Cell] {
        self.row_reads.set(self.row_reads.get() + 1);
        &self.rows[index]
    }

    fn is_row_dirty(&self, index: usize) -> bool {
        self.dirty[index]
    }

    fn clear_dirty_flags(&mut self) {
        self.mark_all_clean();
    }

    fn content_revision(&self) -> u64 {
        self.revision
    }
}

/// Fixed metrics: 8x16 px cells, 12 pt font. Font handles encode the
/// bold/italic combination so run batching across faces is observable.
#[derive(Debug, Clone, Copy)]
pub struct FixedFonts {
    pub char_width: f32,
    pub line_height: f32,
    pub font_size: f32,
}

impl Default for FixedFonts {
    fn default() -> Self {
        FixedFonts {
            char_width: 8.0,
            line_height: 16.0,
            font_size: 12.0,
        }
    }
}

impl FontSource for FixedFonts {
    fn select_font(&self, attr: &Attributes) -> FontHandle {
        use crate::cell::AttrFlags;
        let mut id = 0;
        if attr.flags.contains(AttrFlags::BOLD) {
            id |= 1;
        }
        if attr.flags.contains(AttrFlags::ITALIC) {
            id |= 2;
        }
        FontHandle(id)
    }

    fn font_size(&self) -> f32 {
        self.font_size
    }

    fn char_width(&self) -> f32 {
        self.char_width
    }

    fn line_height(&self) -> f32 {
        self.line_height
    }
}

/// A canvas that records every operation and can inject a failure after a
/// given number of them.
#[derive(Debug, Default)]
pub struct TestCanvas {
    pub ops: Vec<DrawCommand>,
    /// When set, the operation that would be recorded at this index fails.
    pub fail_at: Option<usize>,
}

impl TestCanvas {
    pub fn new() -> Self {
        TestCanvas::default()
    }

    fn record(&mut self, command: DrawCommand) -> Result<()> {
        if self.fail_at == Some(self.ops.len()) {
            bail!("injected canvas failure at op {}", self.ops.len());
        }
        self.ops.push(command);
        Ok(())
    }

    pub fn fill_rects(&self) -> Vec<(RectF, Rgba)> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawCommand::FillRect { rect, color } => Some((*rect, *color)),
                _ => None,
            })
            .collect()
    }

    pub fn text_runs(&self) -> Vec<(PointF, String, FontHandle, Rgba)> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawCommand::TextRun {
                    origin,
                    text,
                    font,
                    color,
                    ..
                } => Some((*origin, text.clone(), *font, *color)),
                _ => None,
            })
            .collect()
    }
}

impl Canvas for TestCanvas {
    fn fill_rect(&mut self, rect: RectF, color: Rgba) -> Result<()> {
        self.record(DrawCommand::FillRect { rect, color })
    }

    fn draw_text_run(
        &mut self,
        origin: PointF,
        text: &str,
        font: FontHandle,
        font_size: f32,
        color: Rgba,
    ) -> Result<()> {
        self.record(DrawCommand::TextRun {
            origin,
            text: text.to_owned(),
            font,
            font_size,
            color,
        })
    }

    fn draw_line(&mut self, from: PointF, to: PointF, color: Rgba) -> Result<()> {
        self.record(DrawCommand::Line { from, to, color })
    }

    fn draw_curly_underline(&mut self, origin: PointF, width: f32, color: Rgba) -> Result<()> {
        self.record(DrawCommand::CurlyUnderline {
            origin,
            width,
            color,
        })
    }

    fn draw_dotted_underline(&mut self, origin: PointF, width: f32, color: Rgba) -> Result<()> {
        self.record(DrawCommand::DottedUnderline {
            origin,
            width,
            color,
        })
    }

    fn draw_dashed_underline(&mut self, origin: PointF, width: f32, color: Rgba) -> Result<()> {
        self.record(DrawCommand::DashedUnderline {
            origin,
            width,
            color,
        })
    }
}

/// A resolver that fails a configurable number of times before delegating to
/// the default theme; exercises the capture-abandon path.
pub struct FlakyResolver {
    inner: crate::color::ThemePalette,
    remaining_failures: StdCell<u32>,
}

impl FlakyResolver {
    pub fn failing(times: u32) -> Self {
        FlakyResolver {
            inner: crate::color::ThemePalette::default(),
            remaining_failures: StdCell::new(times),
        }
    }
}

impl ColorResolver for FlakyResolver {
    fn resolve_fg(&self, spec: Color, flags: crate::cell::AttrFlags) -> Result<Rgba> {
        let remaining = self.remaining_failures.get();
        if remaining > 0 {
            self.remaining_failures.set(remaining - 1);
            bail!("injected resolver failure");
        }
        self.inner.resolve_fg(spec, flags)
    }

    fn resolve_bg(&self, spec: Color) -> Result<Rgba> {
        self.inner.resolve_bg(spec)
    }
}

/// A resolver that counts calls, for memoization tests. The counter handle is
/// shared so tests can read it after the resolver moves into a cache.
pub struct CountingResolver {
    inner: crate::color::ThemePalette,
    pub calls: std::rc::Rc<StdCell<usize>>,
}

impl CountingResolver {
    pub fn new() -> Self {
        CountingResolver {
            inner: crate::color::ThemePalette::default(),
            calls: std::rc::Rc::new(StdCell::new(0)),
        }
    }
}

impl ColorResolver for CountingResolver {
    fn resolve_fg(&self, spec: Color, flags: crate::cell::AttrFlags) -> Result<Rgba> {
        self.calls.set(self.calls.get() + 1);
        self.inner.resolve_fg(spec, flags)
    }

    fn resolve_bg(&self, spec: Color) -> Result<Rgba> {
        self.inner.resolve_bg(spec)
    }
}
