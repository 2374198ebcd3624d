// src/canvas.rs

//! The `Canvas` capability trait and the recording implementation.
//!
//! The pipeline is backend-agnostic: it never touches a real drawing API.
//! Instead the host supplies a `Canvas` whose operations map onto its own
//! immediate-mode primitives (filled rectangle, text run, line, decorated
//! underline). `RecordingCanvas` is the second conforming implementation: it
//! appends every operation, with its exact arguments, to an ordered command
//! list that can later be replayed onto a real canvas at an arbitrary offset.

use anyhow::Result;

use crate::color::Rgba;

/// A point in canvas pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointF {
    pub x: f32,
    pub y: f32,
}

impl PointF {
    pub const fn new(x: f32, y: f32) -> Self {
        PointF { x, y }
    }

    /// This point translated by `offset`.
    pub fn offset_by(self, offset: PointF) -> Self {
        PointF {
            x: self.x + offset.x,
            y: self.y + offset.y,
        }
    }
}

/// An axis-aligned rectangle in canvas pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RectF {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl RectF {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        RectF {
            x,
            y,
            width,
            height,
        }
    }

    /// This rectangle translated by `offset`.
    pub fn offset_by(self, offset: PointF) -> Self {
        RectF {
            x: self.x + offset.x,
            y: self.y + offset.y,
            ..self
        }
    }
}

/// An opaque handle to a font face chosen by the host's font source.
///
/// The pipeline only compares handles for run batching and passes them back
/// verbatim with every text operation; it never interprets them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FontHandle(pub u32);

/// Abstract drawing surface consumed by the grid compiler.
///
/// One canvas serves exactly one frame. Operations are issued in paint order;
/// an implementation must not reorder them. Text operations carry their font
/// and size explicitly so a replayed command never depends on ambient state.
pub trait Canvas {
    /// Fill `rect` with `color`. Translucent colors blend over existing content.
    fn fill_rect(&mut self, rect: RectF, color: Rgba) -> Result<()>;

    /// Draw `text` with its baseline-box anchored at `origin` (top-left of the
    /// first cell), using `font` at `font_size`.
    fn draw_text_run(
        &mut self,
        origin: PointF,
        text: &str,
        font: FontHandle,
        font_size: f32,
        color: Rgba,
    ) -> Result<()>;

    /// Draw a straight line from `from` to `to`.
    fn draw_line(&mut self, from: PointF, to: PointF, color: Rgba) -> Result<()>;

    /// Draw a curly (sine-wave) underline starting at `origin`, `width` pixels wide.
    fn draw_curly_underline(&mut self, origin: PointF, width: f32, color: Rgba) -> Result<()>;

    /// Draw a dotted underline starting at `origin`, `width` pixels wide.
    fn draw_dotted_underline(&mut self, origin: PointF, width: f32, color: Rgba) -> Result<()>;

    /// Draw a dashed underline starting at `origin`, `width` pixels wide.
    fn draw_dashed_underline(&mut self, origin: PointF, width: f32, color: Rgba) -> Result<()>;
}

/// One recorded canvas operation with its exact arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    FillRect {
        rect: RectF,
        color: Rgba,
    },
    TextRun {
        origin: PointF,
        text: String,
        font: FontHandle,
        font_size: f32,
        color: Rgba,
    },
    Line {
        from: PointF,
        to: PointF,
        color: Rgba,
    },
    CurlyUnderline {
        origin: PointF,
        width: f32,
        color: Rgba,
    },
    DottedUnderline {
        origin: PointF,
        width: f32,
        color: Rgba,
    },
    DashedUnderline {
        origin: PointF,
        width: f32,
        color: Rgba,
    },
}

/// A canvas that appends every operation to an ordered command list.
///
/// Commands are recorded in capture-local coordinates (the compiler captures
/// with a zero origin); `replay_onto` re-issues them translated to the frame's
/// draw position. Font and size are restored per text command from the command
/// itself.
#[derive(Debug, Default)]
pub struct RecordingCanvas {
    commands: Vec<DrawCommand>,
}

impl RecordingCanvas {
    pub fn new() -> Self {
        RecordingCanvas {
            commands: Vec::new(),
        }
    }

    /// Discard all recorded commands, keeping the allocation for reuse.
    pub fn clear(&mut self) {
        self.commands.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// The recorded commands, in issue order.
    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Re-issue every recorded command onto `target`, translated by `offset`.
    pub fn replay_onto(&self, target: &mut dyn Canvas, offset: PointF) -> Result<()> {
        for command in &self.commands {
            match command {
                DrawCommand::FillRect { rect, color } => {
                    target.fill_rect(rect.offset_by(offset), *color)?;
                }
                DrawCommand::TextRun {
                    origin,
                    text,
                    font,
                    font_size,
                    color,
                } => {
                    target.draw_text_run(
                        origin.offset_by(offset),
                        text,
                        *font,
                        *font_size,
                        *color,
                    )?;
                }
                DrawCommand::Line { from, to, color } => {
                    target.draw_line(from.offset_by(offset), to.offset_by(offset), *color)?;
                }
                DrawCommand::CurlyUnderline {
                    origin,
                    width,
                    color,
                } => {
                    target.draw_curly_underline(origin.offset_by(offset), *width, *color)?;
                }
                DrawCommand::DottedUnderline {
                    origin,
                    width,
                    color,
                } => {
                    target.draw_dotted_underline(origin.offset_by(offset), *width, *color)?;
                }
                DrawCommand::DashedUnderline {
                    origin,
                    width,
                    color,
                } => {
                    target.draw_dashed_underline(origin.offset_by(offset), *width, *color)?;
                }
            }
        }
        Ok(())
    }
}

impl Canvas for RecordingCanvas {
    fn fill_rect(&mut self, rect: RectF, color: Rgba) -> Result<()> {
        self.commands.push(DrawCommand::FillRect { rect, color });
        Ok(())
    }

    fn draw_text_run(
        &mut self,
        origin: PointF,
        text: &str,
        font: FontHandle,
        font_size: f32,
        color: Rgba,
    ) -> Result<()> {
        self.commands.push(DrawCommand::TextRun {
            origin,
            text: text.to_owned(),
            font,
            font_size,
            color,
        });
        Ok(())
    }

    fn draw_line(&mut self, from: PointF, to: PointF, color: Rgba) -> Result<()> {
        self.commands.push(DrawCommand::Line { from, to, color });
        Ok(())
    }

    fn draw_curly_underline(&mut self, origin: PointF, width: f32, color: Rgba) -> Result<()> {
        self.commands.push(DrawCommand::CurlyUnderline {
            origin,
            width,
            color,
        });
        Ok(())
    }

    fn draw_dotted_underline(&mut self, origin: PointF, width: f32, color: Rgba) -> Result<()> {
        self.commands.push(DrawCommand::DottedUnderline {
            origin,
            width,
            color,
        });
        Ok(())
    }

    fn draw_dashed_underline(&mut self, origin: PointF, width: f32, color: Rgba) -> Result<()> {
        self.commands.push(DrawCommand::DashedUnderline {
            origin,
            width,
            color,
        });
        Ok(())
    }
}
