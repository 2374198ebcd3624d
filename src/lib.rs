// src/lib.rs

//! Viewport render cache and grid-compilation pipeline for character-grid
//! terminal displays.
//!
//! The crate turns a grid of [`cell::Cell`]s into canvas operations and avoids
//! redundant work across frames: when the visible content has not changed, a
//! previously recorded rendering is replayed instead of recompiling the grid
//! cell by cell. Interactive state that changes every frame (text selection,
//! the cursor) is composited on top of the replayed content by direct overlay
//! passes and never invalidates the cache.
//!
//! The embedding application drives [`cache::RenderCache::render_frame`] once
//! per frame from its render callback, supplying its own implementations of
//! the collaborator traits: [`grid::GridSource`] (screen buffer and dirty
//! bits), [`grid::FontSource`] (font selection and metrics),
//! [`color::ColorResolver`] (theme colors), and [`canvas::Canvas`] (the real
//! drawing device). Everything here is strictly single-threaded: one canvas,
//! one pass, one frame at a time.

pub mod cache;
pub mod canvas;
pub mod cell;
pub mod color;
pub mod compiler;
pub mod config;
pub mod grid;
pub mod selection;
pub mod store;

#[cfg(test)]
pub(crate) mod testutil;

pub use cache::{FrameParams, RenderCache, RenderKey};
pub use canvas::{Canvas, DrawCommand, FontHandle, PointF, RecordingCanvas, RectF};
pub use cell::{AttrFlags, Attributes, Cell, UnderlineStyle, DEFAULT_CELL, WIDE_CHAR_PLACEHOLDER};
pub use color::{Color, ColorCache, ColorResolver, NamedColor, ResolvedColors, Rgba, ThemePalette};
pub use compiler::{CellMetrics, CompileOptions, GridCompiler};
pub use config::{CacheConfig, CursorConfig, RenderConfig, SelectionStyle};
pub use grid::{CursorShape, CursorState, FontSource, GridSource};
pub use selection::{SelectionMode, SelectionPoint, SelectionRange};
pub use store::{BackingStore, CommandBufferStore, PassthroughStore};
