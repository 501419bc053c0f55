//! Per-tick visible-band computation.
//!
//! The viewport is the surface rectangle under the current pan, widened by a
//! margin of whole tiles on every side and clamped to the world. From it the
//! culler derives the visible column/row band, the span of static tiles to
//! draw, and which dynamic entities are active this tick.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::grid::{GridDims, Point, Rect, Size};
use crate::registry::DynamicSlot;
use crate::static_index::StaticIndex;

/// Culling parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CullConfig {
    /// Extra tiles kept live beyond each surface edge, so entities just off
    /// screen keep updating and scroll in already drawn.
    pub margin_tiles: u32,
}

impl Default for CullConfig {
    fn default() -> Self {
        Self { margin_tiles: 3 }
    }
}

/// The clamped world-pixel rectangle considered visible this tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewport {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

/// Everything the culler derived for one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct VisibleBand {
    pub viewport: Viewport,
    pub min_col: i64,
    pub max_col: i64,
    pub min_row: i64,
    pub max_row: i64,
    /// Inclusive span of the static collection to draw, `None` when there
    /// are no static entities.
    pub static_range: Option<(usize, usize)>,
}

#[derive(Debug, Clone, Default)]
pub struct ViewportCuller {
    config: CullConfig,
}

impl ViewportCuller {
    pub fn new(config: CullConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CullConfig {
        &self.config
    }

    /// The viewport for a pan and surface size:
    ///
    /// ```text
    /// min_x = clamp(-floor(pan_x) - margin * tile_w, 0, world_w)
    /// max_x = clamp(min_x + surface_w + 2 * margin * tile_w, min_x, world_w)
    /// ```
    ///
    /// and likewise on the vertical axis.
    pub fn viewport(&self, grid: &GridDims, pan: Point, surface: Size) -> Viewport {
        let margin = self.config.margin_tiles as f64;
        let (min_x, max_x) = axis(
            pan.x,
            surface.width,
            margin * grid.tile_width() as f64,
            grid.pixel_width(),
        );
        let (min_y, max_y) = axis(
            pan.y,
            surface.height,
            margin * grid.tile_height() as f64,
            grid.pixel_height(),
        );
        Viewport {
            x: min_x,
            y: min_y,
            width: max_x - min_x,
            height: max_y - min_y,
        }
    }

    /// Compute the visible band and the static draw span.
    pub fn cull(
        &self,
        grid: &GridDims,
        pan: Point,
        surface: Size,
        statics: &StaticIndex,
    ) -> VisibleBand {
        let viewport = self.viewport(grid, pan, surface);
        let min_col = grid.to_column(viewport.x);
        let max_col = grid.to_column(viewport.x + viewport.width);
        let min_row = grid.to_row(viewport.y);
        let max_row = grid.to_row(viewport.y + viewport.height);
        let static_range = statics.visible_range(min_col, max_col);
        trace!(min_col, max_col, min_row, max_row, ?static_range, "culled");
        VisibleBand {
            viewport,
            min_col,
            max_col,
            min_row,
            max_row,
            static_range,
        }
    }

    /// Positions of the dynamic entities to update this tick: the hero,
    /// wherever it is, plus everything overlapping the viewport. Computed in
    /// full before any entity is updated.
    pub fn active_set(
        &self,
        dynamics: &[DynamicSlot],
        hero: Option<&str>,
        viewport: &Viewport,
    ) -> Vec<usize> {
        let rect = viewport.rect();
        dynamics
            .iter()
            .enumerate()
            .filter(|(_, slot)| {
                let entity = slot.entity.as_ref();
                hero.is_some_and(|h| entity.name() == h) || entity.overlaps(rect.into())
            })
            .map(|(i, _)| i)
            .collect()
    }
}

fn axis(pan: f64, surface: f64, margin: f64, world: f64) -> (f64, f64) {
    let min = (-pan.floor() - margin).clamp(0.0, world);
    let max = (min + surface + 2.0 * margin).clamp(min, world);
    (min, max)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::entity::{Entity, EntityId};
    use crate::factory::{EntityFactory, SpawnArgs};

    fn grid() -> GridDims {
        GridDims::new(100, 19, 32, 32).unwrap()
    }

    fn slot(class: &str, id: EntityId, origin: Point) -> DynamicSlot {
        let g = grid();
        let factory = EntityFactory::standard();
        let class = factory.class(class).unwrap();
        let props = BTreeMap::new();
        let entity: Box<dyn Entity> = class
            .build(SpawnArgs {
                class,
                id,
                origin,
                size: class.pixel_size(&g),
                facing: class.default_facing,
                props: &props,
                input: None,
            })
            .unwrap();
        DynamicSlot {
            entity,
            needs_draw: false,
        }
    }

    #[test]
    fn margin_clamps_at_world_origin() {
        let culler = ViewportCuller::default();
        let vp = culler.viewport(&grid(), Point::ZERO, Size::new(640.0, 360.0));
        assert_eq!(vp.x, 0.0);
        // 640 + 2 * 3 * 32
        assert_eq!(vp.width, 832.0);
        assert_eq!(vp.y, 0.0);
        // 360 + 2 * 3 * 32, still inside the 608 px world.
        assert_eq!(vp.height, 552.0);

        // A taller surface runs past the 608 px world and is clipped.
        let tall = culler.viewport(&grid(), Point::ZERO, Size::new(640.0, 600.0));
        assert_eq!(tall.y, 0.0);
        assert_eq!(tall.height, 19.0 * 32.0);
    }

    #[test]
    fn panned_viewport_keeps_margin_on_both_sides() {
        let culler = ViewportCuller::default();
        let vp = culler.viewport(&grid(), Point::new(-1000.4, 0.0), Size::new(640.0, 360.0));
        // -floor(-1000.4) = 1001, minus 96.
        assert_eq!(vp.x, 905.0);
        assert_eq!(vp.width, 832.0);
    }

    #[test]
    fn viewport_never_exceeds_world() {
        let culler = ViewportCuller::default();
        let g = grid();
        let vp = culler.viewport(&g, Point::new(-1.0e9, 50.0), Size::new(640.0, 360.0));
        assert_eq!(vp.x, g.pixel_width());
        assert_eq!(vp.width, 0.0);
    }

    #[test]
    fn band_columns_follow_viewport() {
        let culler = ViewportCuller::new(CullConfig { margin_tiles: 0 });
        let g = grid();
        let statics = StaticIndex::new(g);
        let band = culler.cull(&g, Point::new(-320.0, 0.0), Size::new(320.0, 200.0), &statics);
        assert_eq!(band.min_col, 10);
        assert_eq!(band.max_col, 20);
        assert_eq!(band.static_range, None);
    }

    #[test]
    fn hero_is_active_even_off_screen() {
        let culler = ViewportCuller::new(CullConfig { margin_tiles: 0 });
        let g = grid();
        let vp = culler.viewport(&g, Point::ZERO, Size::new(320.0, 200.0));
        let dynamics = vec![
            slot("goomba", EntityId::named("goomba", 1), Point::new(64.0, 64.0)),
            slot("goomba", EntityId::named("goomba", 2), Point::new(2000.0, 64.0)),
            slot("hero", EntityId::named("hero", 1), Point::new(2500.0, 64.0)),
        ];
        assert_eq!(culler.active_set(&dynamics, Some("hero"), &vp), vec![0, 2]);
        assert_eq!(culler.active_set(&dynamics, None, &vp), vec![0]);
    }
}
