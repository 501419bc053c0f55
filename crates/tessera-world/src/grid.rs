//! Pixel/grid coordinate conversion and basic 2D geometry.
//!
//! All positions are in world pixels with the origin at the top-left corner
//! of the world. A cell's *world index* is `column * grid_height + row`, which
//! orders cells column-major and doubles as the identity of grid-aligned
//! entities.

use serde::{Deserialize, Serialize};

use crate::WorldError;

// ---------------------------------------------------------------------------
// Point / Size / Rect
// ---------------------------------------------------------------------------

/// A position in world pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Both coordinates are finite (not NaN or infinite).
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// A width/height pair in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// An axis-aligned rectangle in pixels.
///
/// Containment is half-open: a point on the right or bottom edge is outside.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// A rectangle anchored at `origin` with the given size.
    pub fn from_origin(origin: Point, size: Size) -> Self {
        Self::new(origin.x, origin.y, size.width, size.height)
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x < self.right() && p.y >= self.y && p.y < self.bottom()
    }

    /// Strict overlap test: rectangles that only share an edge do not
    /// intersect.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    pub fn overlaps(&self, shape: Shape) -> bool {
        match shape {
            Shape::Point(p) => self.contains(p),
            Shape::Rect(r) => self.intersects(&r),
        }
    }

    /// Move by an offset (used when drawing with the world pan applied).
    pub fn translate(&self, offset: Point) -> Rect {
        Rect::new(self.x + offset.x, self.y + offset.y, self.width, self.height)
    }
}

/// What an entity can be tested against with [`Entity::overlaps`](crate::entity::Entity::overlaps).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Point(Point),
    Rect(Rect),
}

impl From<Point> for Shape {
    fn from(p: Point) -> Self {
        Shape::Point(p)
    }
}

impl From<Rect> for Shape {
    fn from(r: Rect) -> Self {
        Shape::Rect(r)
    }
}

// ---------------------------------------------------------------------------
// GridDims
// ---------------------------------------------------------------------------

/// Grid dimensions (in tiles) and tile size (in pixels).
///
/// All four values are positive; this is checked once at construction so the
/// conversion functions never divide by zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridDims {
    width: u32,
    height: u32,
    tile_width: u32,
    tile_height: u32,
}

impl GridDims {
    /// Validate and build grid dimensions.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::InvalidDimensions`] if any value is zero or the
    /// cell count does not fit the `u32` world index space.
    pub fn new(
        width: u32,
        height: u32,
        tile_width: u32,
        tile_height: u32,
    ) -> Result<Self, WorldError> {
        let fits = width.checked_mul(height).is_some();
        if width == 0 || height == 0 || tile_width == 0 || tile_height == 0 || !fits {
            return Err(WorldError::InvalidDimensions {
                width,
                height,
                tile_width,
                tile_height,
            });
        }
        Ok(Self {
            width,
            height,
            tile_width,
            tile_height,
        })
    }

    /// Grid width in tiles.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Grid height in tiles.
    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn tile_width(&self) -> u32 {
        self.tile_width
    }

    pub fn tile_height(&self) -> u32 {
        self.tile_height
    }

    pub fn tile_size(&self) -> Size {
        Size::new(self.tile_width as f64, self.tile_height as f64)
    }

    /// World width in pixels.
    pub fn pixel_width(&self) -> f64 {
        self.width as f64 * self.tile_width as f64
    }

    /// World height in pixels.
    pub fn pixel_height(&self) -> f64 {
        self.height as f64 * self.tile_height as f64
    }

    pub fn pixel_size(&self) -> Size {
        Size::new(self.pixel_width(), self.pixel_height())
    }

    // -- conversions --------------------------------------------------------

    /// `floor(x / tile_width)`. May be negative or past the grid edge.
    pub fn to_column(&self, x: f64) -> i64 {
        (x / self.tile_width as f64).floor() as i64
    }

    /// `floor(y / tile_height)`. May be negative or past the grid edge.
    pub fn to_row(&self, y: f64) -> i64 {
        (y / self.tile_height as f64).floor() as i64
    }

    /// The in-grid `(column, row)` containing a pixel, or `None` for
    /// non-finite input or a point outside the grid.
    pub fn cell_at(&self, x: f64, y: f64) -> Option<(u32, u32)> {
        if !x.is_finite() || !y.is_finite() {
            return None;
        }
        let col = self.to_column(x);
        let row = self.to_row(y);
        if col < 0 || row < 0 || col >= self.width as i64 || row >= self.height as i64 {
            return None;
        }
        Some((col as u32, row as u32))
    }

    /// `column * grid_height + row` for the cell containing a pixel.
    ///
    /// Returns `None` (the "no index" sentinel) for non-positional input.
    pub fn world_index(&self, x: f64, y: f64) -> Option<u32> {
        let (col, row) = self.cell_at(x, y)?;
        self.cell_index(col, row)
    }

    /// World index of an in-grid cell.
    pub fn cell_index(&self, col: u32, row: u32) -> Option<u32> {
        if col >= self.width || row >= self.height {
            return None;
        }
        Some(col * self.height + row)
    }

    /// Inverse of [`cell_index`](Self::cell_index).
    pub fn cell_of_index(&self, index: u32) -> (u32, u32) {
        (index / self.height, index % self.height)
    }

    /// Pixel position of a cell's top-left corner.
    pub fn cell_origin(&self, col: u32, row: u32) -> Point {
        Point::new(
            col as f64 * self.tile_width as f64,
            row as f64 * self.tile_height as f64,
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
