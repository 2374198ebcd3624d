// src/store.rs

//! The capture/replay backing store behind the render cache.
//!
//! A `BackingStore` owns one recorded rendering at a time. The coordinator
//! opens a capture, points the grid compiler at the store's capture canvas,
//! closes the capture, and from then on replays the recording instead of
//! recompiling, until the render key changes. Two conforming implementations
//! exist, chosen at construction time and never switched per frame:
//! `CommandBufferStore` (the cache proper) and `PassthroughStore` (cache off,
//! coordinator control flow preserved).

use anyhow::Result;
use log::{debug, warn};

use crate::canvas::{Canvas, PointF, RecordingCanvas};

/// Capture/replay lifecycle shared by all backing stores.
///
/// Failure contract: if `begin_capture` cannot allocate what it needs it
/// returns `false` and leaves any previous recording invalidated; a store is
/// never left half-initialized with `is_ready` still true.
pub trait BackingStore {
    /// Open a capture for a viewport of `width` x `height` pixels, discarding
    /// any previous recording. Returns `false` if the store cannot allocate
    /// for those dimensions; the caller must then fall back to direct
    /// rendering for this frame.
    fn begin_capture(&mut self, width: f32, height: f32) -> bool;

    /// The canvas the compiler should draw into while a capture is open.
    /// `live` is the frame's real canvas; the pass-through store hands it
    /// straight back.
    fn capture_canvas<'a>(&'a mut self, live: &'a mut dyn Canvas) -> &'a mut dyn Canvas;

    /// The origin the compiler should use while capturing. Recording stores
    /// capture in local coordinates and translate on replay; the pass-through
    /// store forwards operations straight to the device, so they must be
    /// compiled at the frame's real origin.
    fn capture_origin(&self, frame_origin: PointF) -> PointF {
        let _ = frame_origin;
        PointF::default()
    }

    /// Close the current capture. The recording becomes replayable.
    fn end_capture(&mut self);

    /// Whether a completed recording exists that `replay` can draw.
    fn is_ready(&self) -> bool;

    /// Discard any recording and mark the store not ready.
    fn invalidate(&mut self);

    /// Re-issue the recorded operations onto `target`, translated so the
    /// capture's origin lands at `position`.
    fn replay(&mut self, target: &mut dyn Canvas, position: PointF) -> Result<()>;
}

/// A store that records nothing: the capture canvas is the live canvas, so
/// every "capture" draws directly, and `replay` has nothing to do.
///
/// `is_ready` is pinned to `false`; the coordinator therefore takes the
/// capture branch every frame and the terminal is compiled directly each time.
/// This turns the cache off without changing any control flow around it.
#[derive(Debug, Default)]
pub struct PassthroughStore;

impl PassthroughStore {
    pub fn new() -> Self {
        PassthroughStore
    }
}

impl BackingStore for PassthroughStore {
    fn begin_capture(&mut self, _width: f32, _height: f32) -> bool {
        true
    }

    fn capture_canvas<'a>(&'a mut self, live: &'a mut dyn Canvas) -> &'a mut dyn Canvas {
        live
    }

    fn capture_origin(&self, frame_origin: PointF) -> PointF {
        frame_origin
    }

    fn end_capture(&mut self) {}

    fn is_ready(&self) -> bool {
        false
    }

    fn invalidate(&mut self) {}

    fn replay(&mut self, _target: &mut dyn Canvas, _position: PointF) -> Result<()> {
        Ok(())
    }
}

// Captures wider or taller than this are refused. Guards against pathological
// dimension negotiation (an absurd resize event) producing an unbounded
// command list.
const MAX_CAPTURE_DIMENSION: f32 = 16384.0;

/// A store that records canvas operations into an ordered command list and
/// replays them verbatim.
///
/// The list is cleared and rebuilt on every successful recapture, never
/// incrementally patched. Replay restores font and size per text command, so
/// no font state is assumed to persist on the target between replays.
#[derive(Debug, Default)]
pub struct CommandBufferStore {
    recording: RecordingCanvas,
    capturing: bool,
    ready: bool,
}

impl CommandBufferStore {
    pub fn new() -> Self {
        CommandBufferStore {
            recording: RecordingCanvas::new(),
            capturing: false,
            ready: false,
        }
    }

    /// Number of recorded commands; exposed for tests and diagnostics.
    pub fn command_count(&self) -> usize {
        self.recording.len()
    }
}

impl BackingStore for CommandBufferStore {
    fn begin_capture(&mut self, width: f32, height: f32) -> bool {
        // Any refused capture must still tear down the previous recording:
        // the coordinator has already invalidated its key by this point.
        self.ready = false;
        self.capturing = false;
        self.recording.clear();

        if !width.is_finite()
            || !height.is_finite()
            || width <= 0.0
            || height <= 0.0
            || width > MAX_CAPTURE_DIMENSION
            || height > MAX_CAPTURE_DIMENSION
        {
            warn!(
                "CommandBufferStore: refusing capture for {}x{} px viewport",
                width, height
            );
            return false;
        }

        debug!(
            "CommandBufferStore: capture open for {}x{} px viewport",
            width, height
        );
        self.capturing = true;
        true
    }

    fn capture_canvas<'a>(&'a mut self, _live: &'a mut dyn Canvas) -> &'a mut dyn Canvas {
        &mut self.recording
    }

    fn end_capture(&mut self) {
        if !self.capturing {
            warn!("CommandBufferStore: end_capture without an open capture");
            return;
        }
        self.capturing = false;
        self.ready = true;
        debug!(
            "CommandBufferStore: capture closed with {} commands",
            self.recording.len()
        );
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn invalidate(&mut self) {
        self.ready = false;
        self.capturing = false;
        self.recording.clear();
    }

    fn replay(&mut self, target: &mut dyn Canvas, position: PointF) -> Result<()> {
        self.recording.replay_onto(target, position)
    }
}
