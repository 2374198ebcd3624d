// src/compiler.rs

//! The grid compiler: turns visible cells into canvas operations.
//!
//! The compiler walks the viewport rows left to right and emits the minimal
//! operation sequence that reproduces the grid: background fills batched into
//! runs of one resolved color, glyphs batched into runs of one resolved
//! foreground and one font, decorations drawn after the glyphs they belong to.
//! Rows that would paint nothing are skipped before any color resolution.
//!
//! The same row machinery drives three passes: the full content pass (used for
//! capture and for direct fallback rendering), the selection overlay pass
//! (selected cells only, drawn over replayed content), and the cursor overlay.

use anyhow::Result;
use log::{trace, warn};
use std::mem;

use crate::canvas::{Canvas, FontHandle, PointF, RectF};
use crate::cell::{AttrFlags, Cell, UnderlineStyle, WIDE_CHAR_PLACEHOLDER};
use crate::color::{ColorCache, ResolvedColors, Rgba};
use crate::config::RenderConfig;
use crate::grid::{CursorShape, CursorState, FontSource, GridSource};
use crate::selection::SelectionRange;

// Vertical placement of decorations inside a cell, in pixels from the cell
// edges. Underlines sit near the bottom, strikethrough near the middle.
const UNDERLINE_RISE: f32 = 1.5;
const DOUBLE_UNDERLINE_GAP: f32 = 2.0;
const STRIKETHROUGH_FACTOR: f32 = 0.5;

/// Snapshot of the font metrics for one compile pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellMetrics {
    pub char_width: f32,
    pub line_height: f32,
    pub font_size: f32,
}

impl CellMetrics {
    pub fn snapshot(fonts: &dyn FontSource) -> Self {
        CellMetrics {
            char_width: fonts.char_width(),
            line_height: fonts.line_height(),
            font_size: fonts.font_size(),
        }
    }
}

/// Per-pass inputs for `GridCompiler::compile`.
#[derive(Debug, Clone, Copy)]
pub struct CompileOptions<'a> {
    /// Top-left pixel of the grid on the target canvas. Zero during capture.
    pub origin: PointF,
    /// The selection to honor, or `None` to compile the unselected steady
    /// state (captures always pass `None`).
    pub selection: Option<&'a SelectionRange>,
    /// Engage dirty-row skipping and clear the dirty flags after a full pass.
    /// Only valid when compiling the live, non-scrolled buffer.
    pub use_dirty_tracking: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PassKind {
    /// Every paintable cell.
    Full,
    /// Only cells inside the selection; everything else is untouched.
    SelectionOnly,
}

/// A decoration owed to one cell of the open text run.
#[derive(Debug, Clone, Copy)]
struct Decoration {
    col: usize,
    width_cols: usize,
    underline: UnderlineStyle,
    strikethrough: bool,
}

/// Compiles grid content into canvas operations.
///
/// Holds the pooled scratch buffers for the per-row run accumulators so the
/// per-frame hot path does not allocate. A compiler is cheap but stateful;
/// use one per pipeline.
pub struct GridCompiler {
    config: RenderConfig,
    text_pool: String,
    decor_pool: Vec<Decoration>,
}

impl GridCompiler {
    pub fn new(config: RenderConfig) -> Self {
        GridCompiler {
            config,
            text_pool: String::new(),
            decor_pool: Vec::new(),
        }
    }

    /// Compile the full grid onto `canvas`.
    ///
    /// With `opts.use_dirty_tracking` set, rows whose dirty bit is clear and
    /// which would paint nothing are skipped, and all dirty bits are cleared
    /// after the pass completes; the clearing is skipped when the pass errors
    /// out so the next frame repaints what this one missed.
    pub fn compile(
        &mut self,
        grid: &mut dyn GridSource,
        colors: &mut ColorCache,
        fonts: &dyn FontSource,
        canvas: &mut dyn Canvas,
        opts: &CompileOptions,
    ) -> Result<()> {
        let columns = grid.columns();
        let rows = grid.rows();
        if columns == 0 || rows == 0 {
            return Ok(());
        }

        let metrics = CellMetrics::snapshot(fonts);
        for row in 0..rows {
            let cells = grid.row(row);
            let selection = opts
                .selection
                .filter(|sel| sel.might_intersect_row(row));
            let has_content = cells.iter().take(columns).any(Cell::is_paintable);
            if selection.is_none() && !has_content {
                continue;
            }
            if opts.use_dirty_tracking
                && !grid.is_row_dirty(row)
                && !has_content
                && selection.is_none()
            {
                continue;
            }
            self.compile_row(
                row, cells, columns, selection, PassKind::Full, colors, fonts, canvas, opts.origin,
                metrics,
            )?;
        }

        if opts.use_dirty_tracking {
            grid.clear_dirty_flags();
        }
        Ok(())
    }

    /// Compile only the selected cells, on top of already-drawn content.
    ///
    /// This is the overlay pass run after a cache replay: it repaints the
    /// cells inside `selection` with the fixed override colors and leaves
    /// every other pixel alone, so the cached capture stays valid while the
    /// selection changes frame to frame.
    pub fn compile_selection_overlay(
        &mut self,
        grid: &dyn GridSource,
        colors: &mut ColorCache,
        fonts: &dyn FontSource,
        canvas: &mut dyn Canvas,
        selection: &SelectionRange,
        origin: PointF,
    ) -> Result<()> {
        let columns = grid.columns();
        let rows = grid.rows();
        if columns == 0 || rows == 0 {
            return Ok(());
        }

        let metrics = CellMetrics::snapshot(fonts);
        let first = selection.start().row.min(rows.saturating_sub(1));
        let last = selection.end().row.min(rows.saturating_sub(1));
        for row in first..=last {
            let cells = grid.row(row);
            self.compile_row(
                row,
                cells,
                columns,
                Some(selection),
                PassKind::SelectionOnly,
                colors,
                fonts,
                canvas,
                origin,
                metrics,
            )?;
        }
        Ok(())
    }

    /// Draw the cursor as a direct overlay.
    ///
    /// Block cursors invert the cell under them (background filled with the
    /// cell's foreground, glyph redrawn in the cell's background); underline
    /// and bar cursors paint a strip in the cell's foreground color. A cursor
    /// sitting on the second column of a wide character is drawn over the
    /// first.
    pub fn compile_cursor(
        &mut self,
        grid: &dyn GridSource,
        colors: &mut ColorCache,
        fonts: &dyn FontSource,
        canvas: &mut dyn Canvas,
        cursor: &CursorState,
        origin: PointF,
    ) -> Result<()> {
        if !cursor.visible {
            return Ok(());
        }
        let columns = grid.columns();
        let rows = grid.rows();
        if cursor.col >= columns || cursor.row >= rows {
            warn!(
                "GridCompiler: cursor at ({}, {}) is outside the {}x{} grid, not drawing it",
                cursor.col, cursor.row, columns, rows
            );
            return Ok(());
        }

        let metrics = CellMetrics::snapshot(fonts);
        let cells = grid.row(cursor.row);
        let cell_at = |col: usize| cells.get(col).copied().unwrap_or_default();

        // The second half of a wide character redirects to the first.
        let draw_col = if cell_at(cursor.col).ch == WIDE_CHAR_PLACEHOLDER && cursor.col > 0 {
            cursor.col - 1
        } else {
            cursor.col
        };
        let cell = cell_at(draw_col);
        let wide = cell_at(draw_col + 1).ch == WIDE_CHAR_PLACEHOLDER && cell.has_glyph();
        let width_cells = if wide { 2.0 } else { 1.0 };

        let resolved = colors.resolve_cell(&cell.attr)?;
        let x = origin.x + draw_col as f32 * metrics.char_width;
        let y = origin.y + cursor.row as f32 * metrics.line_height;

        match cursor.shape {
            CursorShape::Block => {
                let rect = RectF::new(x, y, metrics.char_width * width_cells, metrics.line_height);
                canvas.fill_rect(rect, resolved.fg)?;
                if cell.has_glyph() {
                    let mut buf = [0u8; 4];
                    let text = cell.ch.encode_utf8(&mut buf);
                    let font = fonts.select_font(&cell.attr);
                    canvas.draw_text_run(
                        PointF::new(x, y),
                        text,
                        font,
                        metrics.font_size,
                        resolved.bg,
                    )?;
                }
            }
            CursorShape::Underline => {
                let thickness = self.config.cursor.underline_thickness;
                let rect = RectF::new(
                    x,
                    y + metrics.line_height - thickness,
                    metrics.char_width * width_cells,
                    thickness,
                );
                canvas.fill_rect(rect, resolved.fg)?;
            }
            CursorShape::Bar => {
                let rect = RectF::new(x, y, self.config.cursor.bar_width, metrics.line_height);
                canvas.fill_rect(rect, resolved.fg)?;
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn compile_row(
        &mut self,
        row: usize,
        cells: &[Cell],
        columns: usize,
        selection: Option<&SelectionRange>,
        pass: PassKind,
        colors: &mut ColorCache,
        fonts: &dyn FontSource,
        canvas: &mut dyn Canvas,
        origin: PointF,
        metrics: CellMetrics,
    ) -> Result<()> {
        trace!("GridCompiler: compiling row {} ({:?})", row, pass);
        let row_top = origin.y + row as f32 * metrics.line_height;
        let mut runs = RowRuns::new(
            canvas,
            origin,
            row_top,
            metrics,
            mem::take(&mut self.text_pool),
            mem::take(&mut self.decor_pool),
        );

        let result = Self::walk_row(
            &mut runs,
            row,
            cells,
            columns,
            selection,
            pass,
            colors,
            fonts,
            &self.config,
        );
        // The pooled buffers go back even when the walk errors out.
        let (text_pool, decor_pool) = runs.into_pools();
        self.text_pool = text_pool;
        self.decor_pool = decor_pool;
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn walk_row(
        runs: &mut RowRuns<'_>,
        row: usize,
        cells: &[Cell],
        columns: usize,
        selection: Option<&SelectionRange>,
        pass: PassKind,
        colors: &mut ColorCache,
        fonts: &dyn FontSource,
        config: &RenderConfig,
    ) -> Result<()> {
        // A row view narrower than the grid leaves its tail implicitly blank.
        let limit = cells.len().min(columns);
        for col in 0..limit {
            let cell = cells[col];
            let selected = selection.map_or(false, |sel| sel.contains(row, col));
            if !selected {
                if pass == PassKind::SelectionOnly {
                    continue;
                }
                // Dominant blank case, decided before any color resolution.
                if cell.is_default_empty() {
                    continue;
                }
            }

            let resolved = if selected {
                ResolvedColors {
                    fg: config.selection.foreground,
                    bg: config.selection.background,
                    needs_background: true,
                }
            } else {
                colors.resolve_cell(&cell.attr)?
            };
            let font = fonts.select_font(&cell.attr);
            runs.process_cell(col, &cell, resolved, font, selected)?;
        }
        runs.flush_background()?;
        runs.flush_text()
    }
}

impl std::fmt::Debug for GridCompiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GridCompiler").finish_non_exhaustive()
    }
}

/// The two run accumulators for one row.
///
/// The background accumulator batches contiguous columns of one resolved
/// background color; the text accumulator batches contiguous glyphs of one
/// resolved foreground and one font. They track independently: a cell can
/// extend one without touching the other. The background run may flush alone
/// (its fills never overlap glyphs that are still accumulating), but whenever
/// the text run flushes the background run is flushed first so fills never
/// paint over glyphs already issued.
struct RowRuns<'a> {
    canvas: &'a mut dyn Canvas,
    origin: PointF,
    row_top: f32,
    metrics: CellMetrics,

    // Column just past the last processed cell; a processed cell elsewhere is
    // a gap and breaks both runs.
    next_col: Option<usize>,
    last_cell_hidden: bool,

    bg_open: bool,
    bg_start: usize,
    bg_end: usize,
    bg_color: Rgba,

    text_open: bool,
    text_start: usize,
    text_color: Rgba,
    text_font: FontHandle,
    text_selected: bool,
    text: String,
    decorations: Vec<Decoration>,
}

impl<'a> RowRuns<'a> {
    fn new(
        canvas: &'a mut dyn Canvas,
        origin: PointF,
        row_top: f32,
        metrics: CellMetrics,
        text_pool: String,
        decor_pool: Vec<Decoration>,
    ) -> Self {
        let mut text = text_pool;
        text.clear();
        let mut decorations = decor_pool;
        decorations.clear();
        RowRuns {
            canvas,
            origin,
            row_top,
            metrics,
            next_col: None,
            last_cell_hidden: false,
            bg_open: false,
            bg_start: 0,
            bg_end: 0,
            bg_color: Rgba(0),
            text_open: false,
            text_start: 0,
            text_color: Rgba(0),
            text_font: FontHandle::default(),
            text_selected: false,
            text,
            decorations,
        }
    }

    /// Hand the pooled buffers back to the compiler.
    fn into_pools(self) -> (String, Vec<Decoration>) {
        (self.text, self.decorations)
    }

    fn process_cell(
        &mut self,
        col: usize,
        cell: &Cell,
        resolved: ResolvedColors,
        font: FontHandle,
        selected: bool,
    ) -> Result<()> {
        let is_placeholder = cell.ch == WIDE_CHAR_PLACEHOLDER;
        let hidden = cell.attr.flags.contains(AttrFlags::HIDDEN);
        // Hidden cells keep the run contiguous with a blank glyph; the
        // placeholder column is spanned by the wide glyph before it.
        let glyph = if is_placeholder {
            None
        } else if hidden {
            Some(' ')
        } else {
            Some(cell.ch)
        };
        let wants_bg = selected || resolved.needs_background;

        // A skipped column between processed cells breaks both runs.
        if self.next_col != Some(col) && (self.bg_open || self.text_open) {
            self.flush_background()?;
            self.flush_text()?;
        }

        // Foreground style change: flush background first so no fill can land
        // on top of the glyphs being issued.
        if self.text_open {
            let breaks = selected != self.text_selected
                || (glyph.is_some()
                    && (resolved.fg != self.text_color || font != self.text_font));
            if breaks {
                self.flush_background()?;
                self.flush_text()?;
            }
        }

        // Background color change or end of painted background.
        if self.bg_open && (!wants_bg || resolved.bg != self.bg_color) {
            self.flush_background()?;
        }

        if wants_bg {
            if !self.bg_open {
                self.bg_open = true;
                self.bg_start = col;
                self.bg_color = resolved.bg;
            }
            self.bg_end = col + 1;
        }

        if let Some(ch) = glyph {
            if !self.text_open {
                self.text_open = true;
                self.text_start = col;
                self.text_color = resolved.fg;
                self.text_font = font;
                self.text_selected = selected;
            }
            self.text.push(ch);
            if !selected && !hidden {
                let strikethrough = cell.attr.flags.contains(AttrFlags::STRIKETHROUGH);
                if cell.attr.underline != UnderlineStyle::None || strikethrough {
                    self.decorations.push(Decoration {
                        col,
                        width_cols: 1,
                        underline: cell.attr.underline,
                        strikethrough,
                    });
                }
            }
        } else if is_placeholder && self.text_open {
            if self.last_cell_hidden {
                // The wide glyph was concealed; pad so later glyphs stay aligned.
                self.text.push(' ');
            }
            // A decoration on the wide cell spans its placeholder column too.
            if let Some(last) = self.decorations.last_mut() {
                if last.col + last.width_cols == col {
                    last.width_cols += 1;
                }
            }
        }

        self.last_cell_hidden = hidden && !is_placeholder;
        self.next_col = Some(col + 1);
        Ok(())
    }

    /// Flush the open background run, if any. Always safe to call.
    fn flush_background(&mut self) -> Result<()> {
        if !self.bg_open {
            return Ok(());
        }
        self.bg_open = false;
        let rect = RectF::new(
            self.origin.x + self.bg_start as f32 * self.metrics.char_width,
            self.row_top,
            (self.bg_end - self.bg_start) as f32 * self.metrics.char_width,
            self.metrics.line_height,
        );
        self.canvas.fill_rect(rect, self.bg_color)
    }

    /// Flush the open text run and its decorations. The caller must have
    /// flushed the background run first.
    fn flush_text(&mut self) -> Result<()> {
        if !self.text_open {
            return Ok(());
        }
        self.text_open = false;

        // A run of nothing but blanks with no decorations paints no pixels.
        let all_blank = self.text.bytes().all(|b| b == b' ');
        if all_blank && self.decorations.is_empty() {
            self.text.clear();
            return Ok(());
        }

        if !all_blank {
            let run_origin = PointF::new(
                self.origin.x + self.text_start as f32 * self.metrics.char_width,
                self.row_top,
            );
            self.canvas.draw_text_run(
                run_origin,
                &self.text,
                self.text_font,
                self.metrics.font_size,
                self.text_color,
            )?;
        }
        self.text.clear();

        // Decorations go on top of the glyphs, in the run's foreground color.
        let cw = self.metrics.char_width;
        let underline_y = self.row_top + self.metrics.line_height - UNDERLINE_RISE;
        let strike_y = self.row_top + self.metrics.line_height * STRIKETHROUGH_FACTOR;
        for idx in 0..self.decorations.len() {
            let deco = self.decorations[idx];
            let x = self.origin.x + deco.col as f32 * cw;
            let width = deco.width_cols as f32 * cw;
            match deco.underline {
                UnderlineStyle::None => {}
                UnderlineStyle::Single => {
                    self.canvas.draw_line(
                        PointF::new(x, underline_y),
                        PointF::new(x + width, underline_y),
                        self.text_color,
                    )?;
                }
                UnderlineStyle::Double => {
                    let upper = underline_y - DOUBLE_UNDERLINE_GAP;
                    self.canvas.draw_line(
                        PointF::new(x, upper),
                        PointF::new(x + width, upper),
                        self.text_color,
                    )?;
                    self.canvas.draw_line(
                        PointF::new(x, underline_y),
                        PointF::new(x + width, underline_y),
                        self.text_color,
                    )?;
                }
                UnderlineStyle::Curly => {
                    self.canvas.draw_curly_underline(
                        PointF::new(x, underline_y),
                        width,
                        self.text_color,
                    )?;
                }
                UnderlineStyle::Dotted => {
                    self.canvas.draw_dotted_underline(
                        PointF::new(x, underline_y),
                        width,
                        self.text_color,
                    )?;
                }
                UnderlineStyle::Dashed => {
                    self.canvas.draw_dashed_underline(
                        PointF::new(x, underline_y),
                        width,
                        self.text_color,
                    )?;
                }
            }
            if deco.strikethrough {
                self.canvas.draw_line(
                    PointF::new(x, strike_y),
                    PointF::new(x + width, strike_y),
                    self.text_color,
                )?;
            }
        }
        self.decorations.clear();
        Ok(())
    }
}
