// src/color.rs

//! Color specifications, concrete packed colors, and the memoizing color cache.
//!
//! Cells carry `Color` *specifications* (named, indexed, true-color, or the
//! theme default); the pipeline resolves them to packed `Rgba` pixels through a
//! `ColorResolver` supplied by the host. `ColorCache` wraps the resolver with a
//! per-attribute memo table and owns the theme version used by the render key:
//! `on_theme_changed` clears the memo and bumps the version so cached frames
//! keyed against the old theme can never be replayed.

use anyhow::Result;
use log::warn;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::cell::{AttrFlags, Attributes};

/// Standard ANSI named colors (indices 0-15): 8 normal and 8 bright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum NamedColor {
    Black = 0,
    Red = 1,
    Green = 2,
    Yellow = 3,
    Blue = 4,
    Magenta = 5,
    Cyan = 6,
    White = 7,
    BrightBlack = 8,
    BrightRed = 9,
    BrightGreen = 10,
    BrightYellow = 11,
    BrightBlue = 12,
    BrightMagenta = 13,
    BrightCyan = 14,
    BrightWhite = 15,
}

impl NamedColor {
    /// Index of this color in a 16-entry ANSI table.
    pub fn index(self) -> usize {
        self as usize
    }

    /// The bright counterpart of a normal color; bright colors map to themselves.
    pub fn to_bright(self) -> Self {
        match self {
            NamedColor::Black => NamedColor::BrightBlack,
            NamedColor::Red => NamedColor::BrightRed,
            NamedColor::Green => NamedColor::BrightGreen,
            NamedColor::Yellow => NamedColor::BrightYellow,
            NamedColor::Blue => NamedColor::BrightBlue,
            NamedColor::Magenta => NamedColor::BrightMagenta,
            NamedColor::Cyan => NamedColor::BrightCyan,
            NamedColor::White => NamedColor::BrightWhite,
            other => other,
        }
    }
}

/// A color as specified by a cell.
///
/// `Default` defers to the theme's default foreground or background depending
/// on the role the specification is resolved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Color {
    /// Default foreground or background, resolved against the current theme.
    #[default]
    Default,
    /// A standard named ANSI color (indices 0-15).
    Named(NamedColor),
    /// An indexed color from the 256-color palette.
    Indexed(u8),
    /// An RGB true color.
    Rgb(u8, u8, u8),
}

/// A concrete color packed as `0xRRGGBBAA`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgba(pub u32);

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Rgba(((r as u32) << 24) | ((g as u32) << 16) | ((b as u32) << 8) | a as u32)
    }

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 0xFF)
    }

    pub const fn r(self) -> u8 {
        (self.0 >> 24) as u8
    }

    pub const fn g(self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub const fn b(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub const fn a(self) -> u8 {
        self.0 as u8
    }

    /// The same color with a different alpha.
    pub const fn with_alpha(self, a: u8) -> Self {
        Rgba((self.0 & 0xFFFF_FF00) | a as u32)
    }

    /// Components as `[r, g, b, a]`, each in `0..=255`.
    pub const fn components(self) -> [u8; 4] {
        [self.r(), self.g(), self.b(), self.a()]
    }

    /// Component-wise scale of the RGB channels, alpha untouched.
    /// Used for faint text.
    pub fn dimmed(self, factor: f32) -> Self {
        let scale = |c: u8| -> u8 { (c as f32 * factor).round().clamp(0.0, 255.0) as u8 };
        Rgba::new(scale(self.r()), scale(self.g()), scale(self.b()), self.a())
    }
}

// Layout of the xterm 256-color palette.
const ANSI_NAMED_COLOR_COUNT: usize = 16;
const COLOR_CUBE_SIZE: u32 = 6;
const GRAYSCALE_OFFSET: usize = 232;

/// The xterm 256-color palette: 16 ANSI entries, a 6x6x6 color cube, and a
/// 24-step grayscale ramp. Indices 0-15 here hold conventional sRGB values;
/// a `ThemePalette` overrides them with its own ANSI table.
static PALETTE_256: Lazy<[Rgba; 256]> = Lazy::new(|| {
    let mut table = [Rgba::opaque(0, 0, 0); 256];
    const ANSI_SRGB: [(u8, u8, u8); 16] = [
        (0, 0, 0),
        (205, 0, 0),
        (0, 205, 0),
        (205, 205, 0),
        (0, 0, 238),
        (205, 0, 205),
        (0, 205, 205),
        (229, 229, 229),
        (127, 127, 127),
        (255, 0, 0),
        (0, 255, 0),
        (255, 255, 0),
        (92, 92, 255),
        (255, 0, 255),
        (0, 255, 255),
        (255, 255, 255),
    ];
    for (i, (r, g, b)) in ANSI_SRGB.iter().enumerate() {
        table[i] = Rgba::opaque(*r, *g, *b);
    }
    for idx in ANSI_NAMED_COLOR_COUNT..GRAYSCALE_OFFSET {
        let cube_idx = (idx - ANSI_NAMED_COLOR_COUNT) as u32;
        let r_comp = (cube_idx / (COLOR_CUBE_SIZE * COLOR_CUBE_SIZE)) % COLOR_CUBE_SIZE;
        let g_comp = (cube_idx / COLOR_CUBE_SIZE) % COLOR_CUBE_SIZE;
        let b_comp = cube_idx % COLOR_CUBE_SIZE;
        let level = |comp: u32| -> u8 {
            if comp == 0 {
                0
            } else {
                (comp * 40 + 55) as u8
            }
        };
        table[idx] = Rgba::opaque(level(r_comp), level(g_comp), level(b_comp));
    }
    for idx in GRAYSCALE_OFFSET..256 {
        let level = ((idx - GRAYSCALE_OFFSET) * 10 + 8) as u8;
        table[idx] = Rgba::opaque(level, level, level);
    }
    table
});

/// Concrete colors for one cell, produced by the color cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedColors {
    /// Foreground pixel, inverse video already applied.
    pub fg: Rgba,
    /// Background pixel, inverse video already applied.
    pub bg: Rgba,
    /// Whether the background differs from the theme default and must be
    /// painted explicitly. Default-background cells rely on the cleared canvas.
    pub needs_background: bool,
}

/// Resolves color specifications against the current theme.
///
/// Implementations must be theme-aware and cheap: the cache calls through once
/// per distinct attribute set, but a cold cache resolves once per non-skipped
/// cell of a frame.
pub trait ColorResolver {
    /// Resolve a specification in foreground position. `flags` lets an
    /// implementation apply intensity handling (bold brightening, faint
    /// dimming).
    fn resolve_fg(&self, spec: Color, flags: AttrFlags) -> Result<Rgba>;

    /// Resolve a specification in background position.
    fn resolve_bg(&self, spec: Color) -> Result<Rgba>;
}

/// A self-contained resolver backed by a theme's default colors and ANSI table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemePalette {
    /// Default foreground pixel.
    pub foreground: Rgba,
    /// Default background pixel.
    pub background: Rgba,
    /// The 16 ANSI colors.
    pub ansi: [Rgba; 16],
    /// Substitute bright variants for bold text using named colors 0-7.
    pub bold_brightens: bool,
    /// RGB scale factor applied to faint text.
    pub faint_factor: f32,
}

impl Default for ThemePalette {
    fn default() -> Self {
        let mut ansi = [Rgba::opaque(0, 0, 0); 16];
        ansi.copy_from_slice(&PALETTE_256[..16]);
        ThemePalette {
            foreground: Rgba::opaque(229, 229, 229),
            background: Rgba::opaque(0, 0, 0),
            ansi,
            bold_brightens: true,
            faint_factor: 2.0 / 3.0,
        }
    }
}

impl ThemePalette {
    fn lookup(&self, spec: Color, default: Rgba) -> Rgba {
        match spec {
            Color::Default => default,
            Color::Named(named) => self.ansi[named.index()],
            Color::Indexed(idx) if (idx as usize) < ANSI_NAMED_COLOR_COUNT => {
                self.ansi[idx as usize]
            }
            Color::Indexed(idx) => PALETTE_256[idx as usize],
            Color::Rgb(r, g, b) => Rgba::opaque(r, g, b),
        }
    }
}

impl ColorResolver for ThemePalette {
    fn resolve_fg(&self, spec: Color, flags: AttrFlags) -> Result<Rgba> {
        let spec = match spec {
            Color::Named(named) if self.bold_brightens && flags.contains(AttrFlags::BOLD) => {
                Color::Named(named.to_bright())
            }
            other => other,
        };
        let mut pixel = self.lookup(spec, self.foreground);
        if flags.contains(AttrFlags::FAINT) {
            pixel = pixel.dimmed(self.faint_factor);
        }
        Ok(pixel)
    }

    fn resolve_bg(&self, spec: Color) -> Result<Rgba> {
        Ok(self.lookup(spec, self.background))
    }
}

// Flags that can change the resolved pixel pair. Underline variants and
// strikethrough reuse the foreground color and are irrelevant here.
const COLOR_AFFECTING_FLAGS: AttrFlags = AttrFlags::BOLD
    .union(AttrFlags::FAINT)
    .union(AttrFlags::INVERSE);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ColorKey {
    fg: Color,
    bg: Color,
    flags: AttrFlags,
}

/// Memoizes resolved cell colors keyed on their color-affecting attributes.
///
/// The cache applies inverse video by swapping the resolved pair, so inverse
/// cells always report `needs_background` even when both specifications are
/// `Color::Default`. Theme changes must be announced via `on_theme_changed`.
pub struct ColorCache {
    resolver: Box<dyn ColorResolver>,
    map: HashMap<ColorKey, ResolvedColors>,
    theme_version: u64,
}

impl ColorCache {
    pub fn new(resolver: Box<dyn ColorResolver>) -> Self {
        ColorCache {
            resolver,
            map: HashMap::new(),
            theme_version: 0,
        }
    }

    /// Current theme version; a field of the render key.
    pub fn theme_version(&self) -> u64 {
        self.theme_version
    }

    /// Drops every memoized entry and bumps the theme version. Call whenever
    /// the theme or palette the resolver consults has changed.
    pub fn on_theme_changed(&mut self) {
        self.map.clear();
        self.theme_version = self.theme_version.wrapping_add(1);
        log::debug!(
            "ColorCache: theme changed, memo cleared, version now {}",
            self.theme_version
        );
    }

    /// Resolve a cell's attribute set to concrete colors, memoized.
    pub fn resolve_cell(&mut self, attr: &Attributes) -> Result<ResolvedColors> {
        let key = ColorKey {
            fg: attr.fg,
            bg: attr.bg,
            flags: attr.flags.intersection(COLOR_AFFECTING_FLAGS),
        };
        if let Some(resolved) = self.map.get(&key) {
            return Ok(*resolved);
        }

        let fg = self.resolver.resolve_fg(key.fg, key.flags)?;
        let bg = self.resolver.resolve_bg(key.bg)?;
        let resolved = if key.flags.contains(AttrFlags::INVERSE) {
            ResolvedColors {
                fg: bg,
                bg: fg,
                needs_background: true,
            }
        } else {
            ResolvedColors {
                fg,
                bg,
                needs_background: key.bg != Color::Default,
            }
        };

        // An unbounded attribute stream (e.g. a program cycling true colors)
        // should not grow the memo forever.
        if self.map.len() >= 4096 {
            warn!("ColorCache: memo exceeded 4096 entries, dropping all");
            self.map.clear();
        }
        self.map.insert(key, resolved);
        Ok(resolved)
    }
}

impl std::fmt::Debug for ColorCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColorCache")
            .field("entries", &self.map.len())
            .field("theme_version", &self.theme_version)
            .finish()
    }
}
