//! Render-surface boundary.
//!
//! The world never owns a drawing backend. It draws into anything that
//! implements [`Surface`]. [`RecordingSurface`] records [`DrawCommand`]s and
//! serves two roles: a headless surface for tests and tooling, and the cached
//! static-background layer the world re-renders only when the background is
//! dirty.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::grid::{Point, Rect, Size};
use crate::WorldError;

// ---------------------------------------------------------------------------
// Color
// ---------------------------------------------------------------------------

/// An RGBA color, serialized as `"#rrggbb"` (opaque) or `"#rrggbbaa"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const SKY: Color = Color::rgb(0x5c, 0x94, 0xfc);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::SKY
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 255 {
            write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            write!(f, "#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

impl FromStr for Color {
    type Err = WorldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || WorldError::InvalidColor { raw: s.to_owned() };
        let hex = s.strip_prefix('#').ok_or_else(invalid)?;
        if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
            return Err(invalid());
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
        let a = if hex.len() == 8 { channel(6)? } else { 255 };
        Ok(Color::rgba(channel(0)?, channel(2)?, channel(4)?, a))
    }
}

impl TryFrom<String> for Color {
    type Error = WorldError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(c: Color) -> Self {
        c.to_string()
    }
}

/// Opaque reference to an image asset owned by the rendering backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageHandle(pub String);

// ---------------------------------------------------------------------------
// Surface
// ---------------------------------------------------------------------------

/// A 2D drawing target. Coordinates are surface pixels.
pub trait Surface {
    /// Current drawable size.
    fn size(&self) -> Size;

    /// Fill a rectangle with a solid color.
    fn draw_rect(&mut self, rect: Rect, color: Color);

    /// Draw the `src` region of an image scaled into `dst`.
    fn draw_image(&mut self, image: &ImageHandle, src: Rect, dst: Rect);

    /// Composite a previously recorded layer with its top-left at `at`.
    fn draw_layer(&mut self, layer: &RecordingSurface, at: Point);
}

/// One recorded draw call.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Rect { rect: Rect, color: Color },
    Image { image: ImageHandle, src: Rect, dst: Rect },
    /// A composited layer; `commands` is how many commands the layer held.
    Layer { at: Point, commands: usize },
}

// ---------------------------------------------------------------------------
// RecordingSurface
// ---------------------------------------------------------------------------

/// A [`Surface`] that records every draw call in order.
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    size: Size,
    commands: Vec<DrawCommand>,
}

impl RecordingSurface {
    pub fn new(size: Size) -> Self {
        Self {
            size,
            commands: Vec::new(),
        }
    }

    /// Drop all recorded commands, keeping the size.
    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// Drop all recorded commands and change the size.
    pub fn reset(&mut self, size: Size) {
        self.size = size;
        self.commands.clear();
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl Surface for RecordingSurface {
    fn size(&self) -> Size {
        self.size
    }

    fn draw_rect(&mut self, rect: Rect, color: Color) {
        self.commands.push(DrawCommand::Rect { rect, color });
    }

    fn draw_image(&mut self, image: &ImageHandle, src: Rect, dst: Rect) {
        self.commands.push(DrawCommand::Image {
            image: image.clone(),
            src,
            dst,
        });
    }

    fn draw_layer(&mut self, layer: &RecordingSurface, at: Point) {
        self.commands.push(DrawCommand::Layer {
            at,
            commands: layer.len(),
        });
    }
}
