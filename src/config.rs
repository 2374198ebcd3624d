// src/config.rs

//! Configuration structures for the render pipeline.
//!
//! Every field has a sensible default so an embedding application can run with
//! `RenderConfig::default()` and override selectively from a JSON document.
//! Defaults lean on common terminal conventions (a translucent blue selection
//! highlight, near-white selected text).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::color::Rgba;

/// Complete configuration for the render pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RenderConfig {
    /// Render-key metric comparison.
    pub cache: CacheConfig,
    /// Selection overlay appearance.
    pub selection: SelectionStyle,
    /// Cursor overlay appearance.
    pub cursor: CursorConfig,
}

impl RenderConfig {
    /// Parse a configuration from a JSON document. Missing fields take their
    /// defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("failed to parse render configuration")
    }
}

/// Tunables for render-key comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Tolerance for comparing the floating font metrics of two render keys.
    /// Metric jitter below this threshold does not force a recapture; jitter
    /// above it thrashes the cache (correct, merely slower).
    pub metric_epsilon: f32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            metric_epsilon: 0.001,
        }
    }
}

/// Fixed override colors used for selected cells.
///
/// Selected cells never use their resolved theme colors: the overlay paints a
/// translucent highlight over the replayed content and redraws the glyphs in a
/// solid light foreground on top.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionStyle {
    /// Translucent highlight painted behind selected cells.
    pub background: Rgba,
    /// Solid foreground for selected glyphs.
    pub foreground: Rgba,
}

impl Default for SelectionStyle {
    fn default() -> Self {
        SelectionStyle {
            background: Rgba::new(0x4D, 0x8F, 0xD6, 0x66),
            foreground: Rgba::opaque(0xF2, 0xF2, 0xF2),
        }
    }
}

/// Cursor overlay sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CursorConfig {
    /// Thickness in pixels of the underline cursor.
    pub underline_thickness: f32,
    /// Width in pixels of the bar cursor.
    pub bar_width: f32,
}

impl Default for CursorConfig {
    fn default() -> Self {
        CursorConfig {
            underline_thickness: 2.0,
            bar_width: 2.0,
        }
    }
}

#[cfg(test)]
mod tests;
