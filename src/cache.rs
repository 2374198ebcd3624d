// src/cache.rs

//! The render key and the per-frame cache coordinator.
//!
//! `RenderCache` decides, once per frame, whether the viewport can be replayed
//! from the backing store or must be recompiled. The decision is a structural
//! comparison of `RenderKey`s; nothing else. Selection and cursor are layered
//! on top of the replayed content by direct overlay passes, which is what lets
//! them change every frame without ever invalidating an otherwise-valid cache.

use anyhow::Result;
use log::{debug, warn};
use std::cell::RefCell;
use std::rc::Rc;

use crate::canvas::{Canvas, PointF};
use crate::color::ColorCache;
use crate::compiler::{CompileOptions, GridCompiler};
use crate::config::RenderConfig;
use crate::grid::{CursorState, FontSource, GridSource};
use crate::selection::SelectionRange;
use crate::store::BackingStore;

/// Identity of one cached viewport rendering.
///
/// Recomputed from current state every frame and compared structurally; a
/// cache hit requires every field to match. The float metrics are compared
/// within an epsilon tolerance so sub-epsilon font-metric jitter does not
/// thrash the cache. The invalidation sequence belongs to the coordinator:
/// bumping it makes any previously stored key unmatchable without comparing
/// object identity.
#[derive(Debug, Clone, Copy)]
pub struct RenderKey {
    /// Screen-buffer revision at the time of capture.
    pub content_revision: u64,
    /// Viewport scroll offset in rows; 0 is the live bottom.
    pub scroll_offset: usize,
    /// Theme/palette version from the color cache.
    pub theme_version: u64,
    pub font_size: f32,
    pub char_width: f32,
    pub line_height: f32,
    pub columns: usize,
    pub rows: usize,
    /// Forced-invalidation sequence number.
    pub invalidation_seq: u64,
}

impl RenderKey {
    /// Structural equality with `epsilon` tolerance on the float metrics.
    pub fn matches(&self, other: &RenderKey, epsilon: f32) -> bool {
        self.content_revision == other.content_revision
            && self.scroll_offset == other.scroll_offset
            && self.theme_version == other.theme_version
            && self.columns == other.columns
            && self.rows == other.rows
            && self.invalidation_seq == other.invalidation_seq
            && (self.font_size - other.font_size).abs() <= epsilon
            && (self.char_width - other.char_width).abs() <= epsilon
            && (self.line_height - other.line_height).abs() <= epsilon
    }
}

/// Per-frame inputs to `RenderCache::render_frame`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameParams<'a> {
    /// Top-left pixel of the viewport on the live canvas.
    pub origin: PointF,
    /// Scroll offset in rows; 0 means the live bottom of the buffer.
    pub scroll_offset: usize,
    /// Current selection, if any. Never cached; drawn as an overlay.
    pub selection: Option<&'a SelectionRange>,
    /// Current cursor, if any. Never cached; drawn as an overlay.
    pub cursor: Option<CursorState>,
}

/// Orchestrates compiler, backing store, and overlays for each frame.
pub struct RenderCache {
    store: Box<dyn BackingStore>,
    compiler: GridCompiler,
    colors: Rc<RefCell<ColorCache>>,
    config: RenderConfig,
    stored_key: Option<RenderKey>,
    valid: bool,
    invalidation_seq: u64,
}

impl RenderCache {
    /// The backing store fixes the caching strategy for the lifetime of the
    /// pipeline; it is never switched per frame. The color cache is shared
    /// with the host, which keeps its own handle to announce theme changes.
    pub fn new(
        store: Box<dyn BackingStore>,
        colors: Rc<RefCell<ColorCache>>,
        config: RenderConfig,
    ) -> Self {
        RenderCache {
            store,
            compiler: GridCompiler::new(config.clone()),
            colors,
            config,
            stored_key: None,
            valid: false,
            invalidation_seq: 0,
        }
    }

    /// The shared color cache handle.
    pub fn color_cache(&self) -> &Rc<RefCell<ColorCache>> {
        &self.colors
    }

    /// Compute the key identifying the viewport as it must render right now.
    pub fn current_key(
        &self,
        grid: &dyn GridSource,
        fonts: &dyn FontSource,
        scroll_offset: usize,
    ) -> RenderKey {
        RenderKey {
            content_revision: grid.content_revision(),
            scroll_offset,
            theme_version: self.colors.borrow().theme_version(),
            font_size: fonts.font_size(),
            char_width: fonts.char_width(),
            line_height: fonts.line_height(),
            columns: grid.columns(),
            rows: grid.rows(),
            invalidation_seq: self.invalidation_seq,
        }
    }

    /// True only if a completed capture exists and its key structurally
    /// equals `key`.
    pub fn is_valid(&self, key: &RenderKey) -> bool {
        if !self.valid || !self.store.is_ready() {
            return false;
        }
        match &self.stored_key {
            Some(stored) => stored.matches(key, self.config.cache.metric_epsilon),
            None => false,
        }
    }

    /// Forcibly drop the cache (e.g. on device/context loss). Bumps the
    /// invalidation sequence so the next computed key cannot match the stale
    /// stored key even if every other field is unchanged.
    pub fn invalidate(&mut self) {
        self.valid = false;
        self.stored_key = None;
        self.store.invalidate();
        self.invalidation_seq = self.invalidation_seq.wrapping_add(1);
        debug!(
            "RenderCache: forced invalidation, sequence now {}",
            self.invalidation_seq
        );
    }

    /// Replay the cached rendering at `position`. Only meaningful while the
    /// cache is valid; the pass-through store replays nothing.
    pub fn draw(&mut self, canvas: &mut dyn Canvas, position: PointF) -> Result<()> {
        self.store.replay(canvas, position)
    }

    /// Open a capture for `key`'s viewport. Any existing cache state is torn
    /// down first (without consuming an invalidation sequence number). On
    /// allocation failure returns `false`; the caller renders directly this
    /// frame and no retry happens until the next one.
    fn begin_capture(&mut self, key: RenderKey) -> bool {
        self.valid = false;
        self.stored_key = None;

        let width = key.columns as f32 * key.char_width;
        let height = key.rows as f32 * key.line_height;
        if !self.store.begin_capture(width, height) {
            return false;
        }
        self.stored_key = Some(key);
        true
    }

    /// Close the open capture and mark the cache valid for the pending key.
    fn end_capture(&mut self) {
        self.store.end_capture();
        self.valid = true;
    }

    /// Abandon an in-progress capture as if `begin_capture` had failed.
    fn abandon_capture(&mut self) {
        self.valid = false;
        self.stored_key = None;
        self.store.invalidate();
    }

    /// Render one frame.
    ///
    /// Decision ladder, in order: replay a valid cache; recapture and replay;
    /// direct rendering with no caching. A failure anywhere in the capture
    /// branch is logged and degrades to the direct path, never propagates, and
    /// leaves the cache invalid so the next frame recaptures from scratch.
    pub fn render_frame(
        &mut self,
        grid: &mut dyn GridSource,
        fonts: &dyn FontSource,
        canvas: &mut dyn Canvas,
        params: &FrameParams,
    ) -> Result<()> {
        let key = self.current_key(&*grid, fonts, params.scroll_offset);
        let live = params.scroll_offset == 0;

        if self.is_valid(&key) {
            debug!("RenderCache: hit, replaying capture");
            self.draw(canvas, params.origin)?;
            return self.draw_overlays(&*grid, fonts, canvas, params, true);
        }

        if self.begin_capture(key) {
            match self.capture_and_replay(grid, fonts, canvas, params, live) {
                Ok(()) => return Ok(()),
                Err(err) => {
                    warn!("RenderCache: capture abandoned, rendering direct: {err:#}");
                    self.abandon_capture();
                }
            }
        } else {
            debug!("RenderCache: capture refused, rendering direct");
        }

        // Full direct fallback: compile with the actual selection enabled and
        // nothing cached. Only the cursor still needs an overlay.
        let colors_rc = Rc::clone(&self.colors);
        let mut colors = colors_rc.borrow_mut();
        let opts = CompileOptions {
            origin: params.origin,
            selection: params.selection.filter(|sel| !sel.is_empty()),
            use_dirty_tracking: live,
        };
        self.compiler
            .compile(grid, &mut colors, fonts, canvas, &opts)?;
        drop(colors);
        self.draw_overlays(&*grid, fonts, canvas, params, false)
    }

    /// The capture branch: compile the unselected steady state into the
    /// store, finalize, replay, then overlay. Any error bubbles to the caller
    /// for the abandon-and-fall-back treatment.
    fn capture_and_replay(
        &mut self,
        grid: &mut dyn GridSource,
        fonts: &dyn FontSource,
        canvas: &mut dyn Canvas,
        params: &FrameParams,
        live: bool,
    ) -> Result<()> {
        debug!("RenderCache: miss, capturing");
        let colors_rc = Rc::clone(&self.colors);
        let mut colors = colors_rc.borrow_mut();
        // Recording stores capture in local coordinates with selection
        // disabled: the recording must be the unselected steady state, valid
        // at any future draw position. The pass-through store asks for the
        // real origin instead, since its operations hit the device now.
        let opts = CompileOptions {
            origin: self.store.capture_origin(params.origin),
            selection: None,
            use_dirty_tracking: live,
        };
        let capture = self.store.capture_canvas(canvas);
        self.compiler
            .compile(grid, &mut colors, fonts, capture, &opts)?;
        drop(colors);

        self.end_capture();
        self.draw(canvas, params.origin)?;
        self.draw_overlays(&*grid, fonts, canvas, params, true)
    }

    fn draw_overlays(
        &mut self,
        grid: &dyn GridSource,
        fonts: &dyn FontSource,
        canvas: &mut dyn Canvas,
        params: &FrameParams,
        with_selection: bool,
    ) -> Result<()> {
        let colors_rc = Rc::clone(&self.colors);
        let mut colors = colors_rc.borrow_mut();
        if with_selection {
            if let Some(selection) = params.selection.filter(|sel| !sel.is_empty()) {
                self.compiler.compile_selection_overlay(
                    grid,
                    &mut colors,
                    fonts,
                    canvas,
                    selection,
                    params.origin,
                )?;
            }
        }
        if let Some(cursor) = &params.cursor {
            self.compiler
                .compile_cursor(grid, &mut colors, fonts, canvas, cursor, params.origin)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for RenderCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderCache")
            .field("valid", &self.valid)
            .field("stored_key", &self.stored_key)
            .field("invalidation_seq", &self.invalidation_seq)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests;
