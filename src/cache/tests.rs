// src/cache/tests.rs

//! Unit tests for the render-cache coordinator: hit/miss/fallback decisions,
//! key comparison, overlay compositing, and the failure-degradation paths.

#[cfg(test)]
mod cache_tests {
    use crate::cache::{FrameParams, RenderCache, RenderKey};
    use crate::canvas::{DrawCommand, PointF};
    use crate::cell::Attributes;
    use crate::color::{Color, ColorCache, NamedColor, ThemePalette};
    use crate::compiler::{CompileOptions, GridCompiler};
    use crate::config::RenderConfig;
    use crate::grid::{CursorShape, CursorState, GridSource};
    use crate::selection::{SelectionMode, SelectionPoint, SelectionRange};
    use crate::store::{CommandBufferStore, PassthroughStore};
    use crate::testutil::{FixedFonts, FlakyResolver, MockGrid, TestCanvas};
    use std::cell::RefCell;
    use std::rc::Rc;
    use test_log::test;

    fn red_fg() -> Attributes {
        Attributes {
            fg: Color::Named(NamedColor::Red),
            ..Attributes::default()
        }
    }

    fn shared_colors() -> Rc<RefCell<ColorCache>> {
        Rc::new(RefCell::new(ColorCache::new(Box::new(
            ThemePalette::default(),
        ))))
    }

    fn cached_pipeline() -> RenderCache {
        RenderCache::new(
            Box::new(CommandBufferStore::new()),
            shared_colors(),
            RenderConfig::default(),
        )
    }

    fn selection_cols(first: usize, last: usize, row: usize) -> SelectionRange {
        SelectionRange::new(
            SelectionPoint::new(first, row),
            SelectionPoint::new(last, row),
            SelectionMode::Normal,
        )
    }

    #[test]
    fn idle_grid_is_captured_once_and_replayed_thereafter() {
        let mut cache = cached_pipeline();
        let mut grid = MockGrid::blank(80, 24);
        let fonts = FixedFonts::default();
        let params = FrameParams::default();

        let mut canvas = TestCanvas::new();
        cache
            .render_frame(&mut grid, &fonts, &mut canvas, &params)
            .unwrap();
        assert!(canvas.ops.is_empty(), "a blank grid paints nothing");
        let reads_after_capture = grid.row_reads();
        assert!(reads_after_capture > 0);

        for _ in 0..2 {
            let mut canvas = TestCanvas::new();
            cache
                .render_frame(&mut grid, &fonts, &mut canvas, &params)
                .unwrap();
            assert!(canvas.ops.is_empty());
        }
        assert_eq!(
            grid.row_reads(),
            reads_after_capture,
            "cache hits must not touch the grid compiler"
        );
        let key = cache.current_key(&grid, &fonts, 0);
        assert!(cache.is_valid(&key));
    }

    #[test]
    fn cache_hit_replays_the_captured_operations_verbatim() {
        let mut cache = cached_pipeline();
        let mut grid = MockGrid::blank(10, 1);
        grid.set_text(0, 0, "hello", red_fg());
        let fonts = FixedFonts::default();
        let params = FrameParams::default();

        let mut first = TestCanvas::new();
        cache
            .render_frame(&mut grid, &fonts, &mut first, &params)
            .unwrap();
        let reads = grid.row_reads();

        let mut second = TestCanvas::new();
        cache
            .render_frame(&mut grid, &fonts, &mut second, &params)
            .unwrap();
        assert_eq!(first.ops, second.ops);
        assert_eq!(grid.row_reads(), reads);
    }

    #[test]
    fn replay_is_idempotent_and_content_equivalent_to_a_direct_compile() {
        let mut cache = cached_pipeline();
        let mut grid = MockGrid::blank(10, 2);
        grid.set_text(0, 0, "hello", red_fg());
        grid.set_text(2, 1, "ok", Attributes::default());
        let fonts = FixedFonts::default();
        let params = FrameParams::default();

        let mut first = TestCanvas::new();
        cache
            .render_frame(&mut grid, &fonts, &mut first, &params)
            .unwrap();

        // N replays all produce the captured sequence.
        for _ in 0..3 {
            let mut replayed = TestCanvas::new();
            cache.draw(&mut replayed, PointF::default()).unwrap();
            assert_eq!(replayed.ops, first.ops);
        }

        // And that sequence equals what a direct compile of the same grid
        // emits.
        let mut direct = TestCanvas::new();
        let mut colors = ColorCache::new(Box::new(ThemePalette::default()));
        GridCompiler::new(RenderConfig::default())
            .compile(
                &mut grid,
                &mut colors,
                &fonts,
                &mut direct,
                &CompileOptions {
                    origin: PointF::default(),
                    selection: None,
                    use_dirty_tracking: false,
                },
            )
            .unwrap();
        assert_eq!(direct.ops, first.ops);
    }

    #[test]
    fn single_cell_change_recaptures_with_one_text_run() {
        let mut cache = cached_pipeline();
        let mut grid = MockGrid::blank(80, 24);
        let fonts = FixedFonts::default();
        let params = FrameParams::default();

        let mut canvas = TestCanvas::new();
        cache
            .render_frame(&mut grid, &fonts, &mut canvas, &params)
            .unwrap();

        grid.set(0, 0, 'A', red_fg());
        assert!(grid.is_row_dirty(0));

        let mut canvas = TestCanvas::new();
        cache
            .render_frame(&mut grid, &fonts, &mut canvas, &params)
            .unwrap();
        assert!(canvas.fill_rects().is_empty(), "default background skips the fill");
        let runs = canvas.text_runs();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].1, "A");
    }

    #[test]
    fn selection_toggling_never_invalidates_an_unchanged_key() {
        let mut cache = cached_pipeline();
        let mut grid = MockGrid::blank(10, 1);
        grid.set_text(0, 0, "hello", red_fg());
        let fonts = FixedFonts::default();

        let mut plain = TestCanvas::new();
        cache
            .render_frame(&mut grid, &fonts, &mut plain, &FrameParams::default())
            .unwrap();
        let key = cache.current_key(&grid, &fonts, 0);
        assert!(cache.is_valid(&key));

        // Frame 2: selection appears. The cache stays valid; the overlay is
        // composited on top of the replayed content.
        let selection = selection_cols(0, 5, 0);
        let params = FrameParams {
            selection: Some(&selection),
            ..FrameParams::default()
        };
        let mut selected = TestCanvas::new();
        cache
            .render_frame(&mut grid, &fonts, &mut selected, &params)
            .unwrap();
        assert!(cache.is_valid(&key));
        assert_eq!(selected.ops[..plain.ops.len()], plain.ops[..]);
        let overlay = &selected.ops[plain.ops.len()..];
        let highlight_rects = overlay
            .iter()
            .filter(|op| matches!(op, DrawCommand::FillRect { .. }))
            .count();
        assert_eq!(highlight_rects, 1);
        let overlay_texts = overlay
            .iter()
            .filter(|op| matches!(op, DrawCommand::TextRun { .. }))
            .count();
        assert!(overlay_texts <= 6);
        for op in overlay {
            match op {
                DrawCommand::FillRect { rect, .. } => assert_eq!(rect.y, 0.0),
                DrawCommand::TextRun { origin, .. } => assert_eq!(origin.y, 0.0),
                other => panic!("unexpected overlay op: {other:?}"),
            }
        }

        // Frame 3: selection gone again; a pure replay.
        let mut cleared = TestCanvas::new();
        cache
            .render_frame(&mut grid, &fonts, &mut cleared, &FrameParams::default())
            .unwrap();
        assert!(cache.is_valid(&key));
        assert_eq!(cleared.ops, plain.ops);
    }

    #[test]
    fn forced_invalidation_defeats_an_otherwise_unchanged_key() {
        let mut cache = cached_pipeline();
        let mut grid = MockGrid::blank(10, 1);
        grid.set_text(0, 0, "hi", Attributes::default());
        let fonts = FixedFonts::default();

        let mut canvas = TestCanvas::new();
        cache
            .render_frame(&mut grid, &fonts, &mut canvas, &FrameParams::default())
            .unwrap();
        let old_key = cache.current_key(&grid, &fonts, 0);
        assert!(cache.is_valid(&old_key));

        cache.invalidate();
        assert!(!cache.is_valid(&old_key));
        // The freshly computed key embeds the bumped sequence and cannot
        // match the stale stored key either.
        let new_key = cache.current_key(&grid, &fonts, 0);
        assert!(!cache.is_valid(&new_key));

        let reads = grid.row_reads();
        let mut canvas = TestCanvas::new();
        cache
            .render_frame(&mut grid, &fonts, &mut canvas, &FrameParams::default())
            .unwrap();
        assert!(grid.row_reads() > reads, "next frame recaptures");
        assert!(cache.is_valid(&cache.current_key(&grid, &fonts, 0)));
    }

    #[test]
    fn refused_capture_degrades_to_direct_rendering_for_the_frame() {
        // 3000 columns at 8 px exceeds the store's dimension guard.
        let mut cache = cached_pipeline();
        let mut grid = MockGrid::blank(3000, 2);
        grid.set_text(0, 0, "hi", red_fg());
        let fonts = FixedFonts::default();
        let selection = selection_cols(0, 1, 0);
        let params = FrameParams {
            selection: Some(&selection),
            ..FrameParams::default()
        };

        let mut canvas = TestCanvas::new();
        cache
            .render_frame(&mut grid, &fonts, &mut canvas, &params)
            .unwrap();
        // Drawn, with the actual selection, and nothing cached.
        let config = RenderConfig::default();
        assert!(canvas
            .fill_rects()
            .iter()
            .any(|(_, color)| *color == config.selection.background));
        assert!(!canvas.text_runs().is_empty());
        assert!(!cache.is_valid(&cache.current_key(&grid, &fonts, 0)));
    }

    #[test]
    fn capture_failure_is_abandoned_and_the_frame_renders_direct() {
        let colors = Rc::new(RefCell::new(ColorCache::new(Box::new(
            FlakyResolver::failing(1),
        ))));
        let mut cache = RenderCache::new(
            Box::new(CommandBufferStore::new()),
            colors,
            RenderConfig::default(),
        );
        let mut grid = MockGrid::blank(10, 1);
        grid.set_text(0, 0, "hi", red_fg());
        let fonts = FixedFonts::default();

        let mut canvas = TestCanvas::new();
        cache
            .render_frame(&mut grid, &fonts, &mut canvas, &FrameParams::default())
            .unwrap();
        // The capture hit the injected failure, fell back, and still drew.
        assert_eq!(canvas.text_runs().len(), 1);
        assert!(!cache.is_valid(&cache.current_key(&grid, &fonts, 0)));

        // The cache was left invalid, so the next frame recaptures cleanly.
        let mut canvas = TestCanvas::new();
        cache
            .render_frame(&mut grid, &fonts, &mut canvas, &FrameParams::default())
            .unwrap();
        assert!(cache.is_valid(&cache.current_key(&grid, &fonts, 0)));
    }

    #[test]
    fn passthrough_store_renders_every_frame_and_never_validates() {
        let mut cache = RenderCache::new(
            Box::new(PassthroughStore::new()),
            shared_colors(),
            RenderConfig::default(),
        );
        let mut grid = MockGrid::blank(10, 1);
        grid.set_text(0, 0, "hi", Attributes::default());
        let fonts = FixedFonts::default();
        let params = FrameParams {
            origin: PointF::new(5.0, 7.0),
            ..FrameParams::default()
        };

        for _ in 0..2 {
            let mut canvas = TestCanvas::new();
            cache
                .render_frame(&mut grid, &fonts, &mut canvas, &params)
                .unwrap();
            let runs = canvas.text_runs();
            assert_eq!(runs.len(), 1, "drawn directly each frame");
            assert_eq!(
                runs[0].0,
                PointF::new(5.0, 7.0),
                "pass-through compiles at the frame's real origin"
            );
            assert!(!cache.is_valid(&cache.current_key(&grid, &fonts, 0)));
        }
    }

    #[test]
    fn theme_change_recaptures_through_the_shared_color_cache() {
        let mut cache = cached_pipeline();
        let mut grid = MockGrid::blank(10, 1);
        grid.set_text(0, 0, "hi", Attributes::default());
        let fonts = FixedFonts::default();

        let mut canvas = TestCanvas::new();
        cache
            .render_frame(&mut grid, &fonts, &mut canvas, &FrameParams::default())
            .unwrap();
        let reads = grid.row_reads();

        cache.color_cache().borrow_mut().on_theme_changed();
        let mut canvas = TestCanvas::new();
        cache
            .render_frame(&mut grid, &fonts, &mut canvas, &FrameParams::default())
            .unwrap();
        assert!(grid.row_reads() > reads);
    }

    #[test]
    fn scrollback_views_key_separately_and_skip_dirty_bookkeeping() {
        let mut cache = cached_pipeline();
        let mut grid = MockGrid::blank(10, 2);
        grid.set_text(0, 0, "hi", Attributes::default());
        let fonts = FixedFonts::default();

        // Live frame captures and clears the dirty bits.
        let mut canvas = TestCanvas::new();
        cache
            .render_frame(&mut grid, &fonts, &mut canvas, &FrameParams::default())
            .unwrap();
        assert!(grid.dirty_bits().iter().all(|&bit| !bit));

        // A scrolled view is a different key; rendering it must not clear
        // dirty state the live buffer accumulated meanwhile.
        grid.set(0, 1, 'x', Attributes::default());
        let scrolled = FrameParams {
            scroll_offset: 5,
            ..FrameParams::default()
        };
        let mut canvas = TestCanvas::new();
        cache
            .render_frame(&mut grid, &fonts, &mut canvas, &scrolled)
            .unwrap();
        assert!(grid.is_row_dirty(1));

        // Same scrolled key next frame: a hit.
        let reads = grid.row_reads();
        let mut canvas = TestCanvas::new();
        cache
            .render_frame(&mut grid, &fonts, &mut canvas, &scrolled)
            .unwrap();
        assert_eq!(grid.row_reads(), reads);
    }

    #[test]
    fn cursor_overlay_is_drawn_on_top_of_a_cache_hit() {
        let mut cache = cached_pipeline();
        let mut grid = MockGrid::blank(10, 1);
        grid.set_text(0, 0, "hi", Attributes::default());
        let fonts = FixedFonts::default();

        let mut canvas = TestCanvas::new();
        cache
            .render_frame(&mut grid, &fonts, &mut canvas, &FrameParams::default())
            .unwrap();
        let replay_ops = canvas.ops.len();

        let params = FrameParams {
            cursor: Some(CursorState {
                col: 0,
                row: 0,
                shape: CursorShape::Block,
                visible: true,
            }),
            ..FrameParams::default()
        };
        let mut canvas = TestCanvas::new();
        cache
            .render_frame(&mut grid, &fonts, &mut canvas, &params)
            .unwrap();
        assert!(cache.is_valid(&cache.current_key(&grid, &fonts, 0)));
        assert!(canvas.ops.len() > replay_ops);
        assert!(matches!(
            canvas.ops[replay_ops],
            DrawCommand::FillRect { .. }
        ));
    }

    #[test]
    fn render_key_metrics_compare_within_epsilon() {
        let key = RenderKey {
            content_revision: 7,
            scroll_offset: 0,
            theme_version: 1,
            font_size: 12.0,
            char_width: 8.0,
            line_height: 16.0,
            columns: 80,
            rows: 24,
            invalidation_seq: 0,
        };
        let mut jittered = key;
        jittered.char_width = 8.0005;
        assert!(key.matches(&jittered, 0.001));
        jittered.char_width = 8.01;
        assert!(!key.matches(&jittered, 0.001));

        let mut resized = key;
        resized.columns = 81;
        assert!(!key.matches(&resized, 0.001));
        let mut scrolled = key;
        scrolled.scroll_offset = 3;
        assert!(!key.matches(&scrolled, 0.001));
        let mut revised = key;
        revised.content_revision = 8;
        assert!(!key.matches(&revised, 0.001));
    }
}
