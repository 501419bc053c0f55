//! Built-in entity kinds: static [`Tile`]s and dynamic [`Actor`]s.
//!
//! These are deliberately plain. A game registers its own classes next to
//! (or instead of) the ones in [`EntityFactory::standard`].

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::entity::{Entity, EntityId, Facing, UpdateContext, CHARACTER_KIND};
use crate::factory::{EntityClass, EntityFactory, SpawnArgs};
use crate::grid::{Point, Rect};
use crate::input::{Action, InputSource};
use crate::persist::EntityDescriptor;
use crate::render::{Color, ImageHandle, Surface};

// ---------------------------------------------------------------------------
// Tile
// ---------------------------------------------------------------------------

/// A static background tile: a colored rectangle or an image.
#[derive(Debug)]
pub struct Tile {
    id: EntityId,
    name: String,
    rect: Rect,
    color: Color,
    image: Option<ImageHandle>,
    collision: bool,
    props: BTreeMap<String, serde_json::Value>,
}

impl Tile {
    pub const KIND: &'static str = "tile";

    /// A one-tile static class. Instances may override `color`, `image` and
    /// `collision` through descriptor props.
    pub fn class(name: &str, color: Color, collision: bool) -> EntityClass {
        EntityClass::new(
            name,
            Self::KIND,
            true,
            Box::new(move |args: SpawnArgs<'_>| {
                let tile = Tile {
                    color: args.prop_or("color", color)?,
                    image: args.prop_or("image", None)?,
                    collision: args.prop_or("collision", args.class.collision)?,
                    id: args.id,
                    name: args.class.name.clone(),
                    rect: Rect::from_origin(args.origin, args.size),
                    props: args.props.clone(),
                };
                Ok(Box::new(tile) as Box<dyn Entity>)
            }),
        )
        .with_collision(collision)
    }
}

impl Entity for Tile {
    fn id(&self) -> &EntityId {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        Self::KIND
    }

    fn bounds(&self) -> Rect {
        self.rect
    }

    fn is_static(&self) -> bool {
        true
    }

    fn collision(&self) -> bool {
        self.collision
    }

    fn draw(&self, surface: &mut dyn Surface, offset: Point) {
        let dst = self.rect.translate(offset);
        match &self.image {
            Some(image) => {
                let src = Rect::new(0.0, 0.0, self.rect.width, self.rect.height);
                surface.draw_image(image, src, dst);
            }
            None => surface.draw_rect(dst, self.color),
        }
    }

    fn describe(&self) -> EntityDescriptor {
        EntityDescriptor {
            class: self.name.clone(),
            id: Some(self.id.clone()),
            x: self.rect.x,
            y: self.rect.y,
            facing: None,
            props: self.props.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// A dynamic entity with a facing direction and an animation frame counter.
///
/// When constructed with an input source (only the hero is), it walks left
/// and right while the matching actions are held, refusing to step into a
/// colliding static tile or off the world.
pub struct Actor {
    id: EntityId,
    name: String,
    kind: String,
    rect: Rect,
    facing: Option<Facing>,
    color: Color,
    /// Walk speed in pixels per second.
    speed: f64,
    frame: u64,
    input: Option<Arc<dyn InputSource>>,
    props: BTreeMap<String, serde_json::Value>,
}

impl Actor {
    pub const DEFAULT_SPEED: f64 = 96.0;

    pub fn class(name: &str, kind: &str, color: Color) -> EntityClass {
        EntityClass::new(
            name,
            kind,
            false,
            Box::new(move |args: SpawnArgs<'_>| {
                let actor = Actor {
                    color: args.prop_or("color", color)?,
                    speed: args.prop_or("speed", Self::DEFAULT_SPEED)?,
                    id: args.id,
                    name: args.class.name.clone(),
                    kind: args.class.kind.clone(),
                    rect: Rect::from_origin(args.origin, args.size),
                    facing: args.facing,
                    frame: 0,
                    input: args.input,
                    props: args.props.clone(),
                };
                Ok(Box::new(actor) as Box<dyn Entity>)
            }),
        )
    }

    /// Number of updates received so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn is_input_controlled(&self) -> bool {
        self.input.is_some()
    }

    fn walk(&mut self, dt: f64, ctx: &UpdateContext<'_>) {
        let Some(input) = &self.input else {
            return;
        };
        let dir = match (input.is_held(Action::Left), input.is_held(Action::Right)) {
            (true, false) => -1.0,
            (false, true) => 1.0,
            _ => return,
        };
        self.facing = Some(if dir < 0.0 { Facing::Left } else { Facing::Right });

        let max_x = (ctx.grid.pixel_width() - self.rect.width).max(0.0);
        let next_x = (self.rect.x + dir * self.speed * dt).clamp(0.0, max_x);
        // Probe the leading edge at mid-height. The right edge is exclusive,
        // so step back by a margin that survives pixel-scale magnitudes.
        let probe_x = if dir < 0.0 {
            next_x
        } else {
            let right = next_x + self.rect.width;
            right - right.abs().max(1.0) * 1e-9
        };
        let probe_y = self.rect.y + self.rect.height / 2.0;
        if !ctx.is_solid_at(probe_x, probe_y) {
            self.rect.x = next_x;
        }
    }
}

impl std::fmt::Debug for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Actor")
            .field("id", &self.id)
            .field("rect", &self.rect)
            .field("facing", &self.facing)
            .field("frame", &self.frame)
            .field("input_controlled", &self.input.is_some())
            .finish()
    }
}

impl Entity for Actor {
    fn id(&self) -> &EntityId {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        &self.kind
    }

    fn bounds(&self) -> Rect {
        self.rect
    }

    fn is_static(&self) -> bool {
        false
    }

    fn facing(&self) -> Option<Facing> {
        self.facing
    }

    fn set_facing(&mut self, facing: Facing) {
        self.facing = Some(facing);
    }

    /// Always advances; only asks to be drawn while on screen (the hero is
    /// updated even when it has walked out of view).
    fn update(&mut self, dt: f64, ctx: &UpdateContext<'_>) -> bool {
        self.frame += 1;
        self.walk(dt, ctx);
        ctx.viewport.intersects(&self.rect)
    }

    fn draw(&self, surface: &mut dyn Surface, offset: Point) {
        let body = self.rect.translate(offset);
        surface.draw_rect(body, self.color);
        // A small marker on the facing side.
        if let Some(facing) = self.facing {
            let w = (body.width / 4.0).max(1.0);
            let x = match facing {
                Facing::Left => body.x,
                Facing::Right => body.right() - w,
            };
            surface.draw_rect(Rect::new(x, body.y + w, w, w), Color::WHITE);
        }
    }

    fn on_detach(&mut self) {
        self.input = None;
    }

    fn describe(&self) -> EntityDescriptor {
        EntityDescriptor {
            class: self.name.clone(),
            id: Some(self.id.clone()),
            x: self.rect.x,
            y: self.rect.y,
            facing: self.facing,
            props: self.props.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Standard factory
// ---------------------------------------------------------------------------

impl EntityFactory {
    /// A factory with the stock classes:
    ///
    /// | Class | Kind | Static | Collision | Span | Facing |
    /// |-------|------|--------|-----------|------|--------|
    /// | `ground`, `brick`, `block` | tile | yes | yes | 1x1 | -- |
    /// | `cloud`, `bush` | tile | yes | no | 1x1 | -- |
    /// | `hero` | character | no | no | 1x2 | right |
    /// | `goomba` | character | no | no | 1x1 | left |
    /// | `coin` | item | no | no | 1x1 | -- |
    pub fn standard() -> Self {
        let mut factory = EntityFactory::new();
        factory
            .register(Tile::class("ground", Color::rgb(0xc8, 0x4c, 0x0c), true))
            .register(Tile::class("brick", Color::rgb(0xb8, 0x40, 0x10), true))
            .register(Tile::class("block", Color::rgb(0xfc, 0x98, 0x38), true))
            .register(Tile::class("cloud", Color::WHITE, false))
            .register(Tile::class("bush", Color::rgb(0x80, 0xd0, 0x10), false))
            .register(
                Actor::class("hero", CHARACTER_KIND, Color::rgb(0xd8, 0x28, 0x00))
                    .with_span(1.0, 2.0)
                    .with_facing(Facing::Right),
            )
            .register(
                Actor::class("goomba", CHARACTER_KIND, Color::rgb(0x88, 0x50, 0x18))
                    .with_facing(Facing::Left),
            )
            .register(Actor::class("coin", "item", Color::rgb(0xfc, 0xd8, 0x00)));
        factory
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{GridDims, Size};
    use crate::input::InputState;
    use crate::render::{DrawCommand, RecordingSurface};
    use crate::static_index::StaticIndex;

    fn spawn(
        factory: &EntityFactory,
        class: &str,
        id: EntityId,
        origin: Point,
        input: Option<Arc<dyn InputSource>>,
    ) -> Box<dyn Entity> {
        let grid = GridDims::new(20, 10, 32, 32).unwrap();
        let class = factory.class(class).unwrap();
        let props = BTreeMap::new();
        class
            .build(SpawnArgs {
                class,
                id,
                origin,
                size: class.pixel_size(&grid),
                facing: class.default_facing,
                props: &props,
                input,
            })
            .unwrap()
    }

    #[test]
    fn standard_factory_classes() {
        let factory = EntityFactory::standard();
        let hero = factory.class("hero").unwrap();
        assert_eq!(hero.kind, CHARACTER_KIND);
        assert_eq!(hero.span, Size::new(1.0, 2.0));
        assert_eq!(hero.default_facing, Some(Facing::Right));
        assert!(factory.class("brick").unwrap().is_static);
        assert!(!factory.class("cloud").unwrap().collision);
        assert!(factory.class("coin").unwrap().default_facing.is_none());
    }

    #[test]
    fn tile_draws_with_offset_and_describes_itself() {
        let factory = EntityFactory::standard();
        let tile = spawn(
            &factory,
            "brick",
            EntityId::Cell(41),
            Point::new(64.0, 96.0),
            None,
        );
        let mut surface = RecordingSurface::new(Size::new(100.0, 100.0));
        tile.draw(&mut surface, Point::new(-32.0, 0.0));
        match &surface.commands()[0] {
            DrawCommand::Rect { rect, .. } => assert_eq!(rect.x, 32.0),
            other => panic!("expected a rect, got {other:?}"),
        }

        let desc = tile.describe();
        assert_eq!(desc.class, "brick");
        assert_eq!(desc.id, Some(EntityId::Cell(41)));
        assert_eq!((desc.x, desc.y), (64.0, 96.0));
    }

    #[test]
    fn hero_walks_with_input_and_stops_at_solid_tiles() {
        let factory = EntityFactory::standard();
        let grid = GridDims::new(20, 10, 32, 32).unwrap();
        let input = Arc::new(InputState::new());
        let mut hero = spawn(
            &factory,
            "hero",
            EntityId::named("hero", 1),
            Point::new(64.0, 0.0),
            Some(input.clone()),
        );

        // A wall one column to the right, at the hero's mid-height.
        let mut statics = StaticIndex::new(grid);
        let wall = spawn(
            &factory,
            "brick",
            EntityId::Cell(grid.cell_index(3, 1).unwrap()),
            grid.cell_origin(3, 1),
            None,
        );
        statics.insert(wall).unwrap();
        statics.rebuild();

        let viewport = Rect::new(0.0, 0.0, 640.0, 320.0);
        let ctx = UpdateContext::new(&grid, viewport, true, &statics);

        input.press(Action::Left);
        assert!(hero.update(0.5, &ctx));
        assert_eq!(hero.bounds().x, 16.0);
        assert_eq!(hero.facing(), Some(Facing::Left));

        input.release(Action::Left);
        input.press(Action::Right);
        hero.update(0.25, &ctx); // 16 -> 40
        assert_eq!(hero.bounds().x, 40.0);
        hero.update(0.25, &ctx); // 40 -> 64
        assert_eq!(hero.bounds().x, 64.0);
        // Next step would put the leading edge inside the wall at column 3.
        hero.update(0.25, &ctx);
        assert_eq!(hero.bounds().x, 64.0);
        assert_eq!(hero.facing(), Some(Facing::Right));
    }

    #[test]
    fn actor_off_screen_asks_not_to_be_drawn() {
        let factory = EntityFactory::standard();
        let grid = GridDims::new(100, 10, 32, 32).unwrap();
        let statics = StaticIndex::new(grid);
        let mut goomba = spawn(
            &factory,
            "goomba",
            EntityId::named("goomba", 1),
            Point::new(2000.0, 0.0),
            None,
        );
        let ctx = UpdateContext::new(&grid, Rect::new(0.0, 0.0, 640.0, 320.0), false, &statics);
        assert!(!goomba.update(1.0 / 60.0, &ctx));
        assert_eq!(goomba.facing(), Some(Facing::Left));
    }
}
