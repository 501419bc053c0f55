//! The world aggregate: grid, pan, background, entities, and the per-tick
//! update/draw cycle.
//!
//! A tick is `update` followed by `draw`. `update` applies the camera, culls
//! against the surface, and updates the active dynamic entities; `draw`
//! re-renders the cached static background only when it is dirty, composites
//! it, then draws the dynamic entities that asked to be drawn. Edits
//! (placement, removal, attribute setters) must happen between ticks.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::camera::{CameraFollow, CameraTarget};
use crate::dirty::DirtyTracker;
use crate::entity::{AttachContext, Entity, EntityId, Facing, UpdateContext, CHARACTER_KIND};
use crate::factory::{EntityClass, EntityFactory, SpawnArgs};
use crate::grid::{GridDims, Point, Rect, Size};
use crate::input::InputSource;
use crate::persist::{EntityDescriptor, WorldDescriptor};
use crate::query::{self, QueryFilter};
use crate::registry::EntityRegistry;
use crate::render::{Color, ImageHandle, RecordingSurface, Surface};
use crate::viewport::{CullConfig, ViewportCuller, VisibleBand};
use crate::WorldError;

/// Whether dynamic entities are simulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorldMode {
    #[default]
    Play,
    /// Dynamic entities are frozen: no update callbacks, but everything in
    /// the viewport is drawn.
    Edit,
}

/// Per-tick measurements.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameStats {
    pub update_time: Duration,
    pub draw_time: Duration,
    /// Static tiles rendered into the background layer this frame. Zero when
    /// the cached layer was reused.
    pub tiles_drawn: usize,
    pub entities_drawn: usize,
    pub active_entities: usize,
    pub background_redrawn: bool,
}

pub struct World {
    pub(crate) grid: GridDims,
    pan: Point,
    background_color: Color,
    background_image: Option<ImageHandle>,
    hero: Option<String>,
    mode: WorldMode,
    pub(crate) registry: EntityRegistry,
    pub(crate) dirty: DirtyTracker,
    culler: ViewportCuller,
    pub(crate) factory: Arc<EntityFactory>,
    camera: Option<Box<dyn CameraFollow>>,
    input: Option<Arc<dyn InputSource>>,
    band: Option<VisibleBand>,
    background_layer: RecordingSurface,
    stats: FrameStats,
}

impl World {
    /// An empty world in play mode with the default background.
    pub fn new(grid: GridDims, factory: Arc<EntityFactory>) -> Self {
        Self {
            grid,
            pan: Point::ZERO,
            background_color: Color::default(),
            background_image: None,
            hero: None,
            mode: WorldMode::Play,
            registry: EntityRegistry::new(grid),
            dirty: DirtyTracker::new(),
            culler: ViewportCuller::default(),
            factory,
            camera: None,
            input: None,
            band: None,
            background_layer: RecordingSurface::default(),
            stats: FrameStats::default(),
        }
    }

    pub fn with_cull_config(mut self, config: CullConfig) -> Self {
        self.culler = ViewportCuller::new(config);
        self
    }

    /// Construct a world from its persisted form.
    ///
    /// # Errors
    ///
    /// Fails on invalid dimensions, unknown entity classes, or entity props
    /// their class rejects. Static entities outside the grid and duplicate
    /// heroes are skipped with a warning.
    pub fn from_descriptor(
        desc: &WorldDescriptor,
        factory: Arc<EntityFactory>,
    ) -> Result<Self, WorldError> {
        Self::build(desc, factory, ViewportCuller::default(), None)
    }

    /// Replace this world's state with a persisted one, keeping the factory,
    /// cull settings, input source and camera. On error nothing changes.
    ///
    /// # Errors
    ///
    /// Same as [`from_descriptor`](Self::from_descriptor).
    pub fn load(&mut self, desc: &WorldDescriptor) -> Result<(), WorldError> {
        let mut fresh = Self::build(
            desc,
            Arc::clone(&self.factory),
            self.culler.clone(),
            self.input.clone(),
        )?;
        if let Some(camera) = self.camera.take() {
            fresh.set_camera(camera);
        }
        self.registry.clear(&mut self.dirty);
        *self = fresh;
        Ok(())
    }

    fn build(
        desc: &WorldDescriptor,
        factory: Arc<EntityFactory>,
        culler: ViewportCuller,
        input: Option<Arc<dyn InputSource>>,
    ) -> Result<Self, WorldError> {
        let mut world = World::new(desc.grid()?, factory);
        world.culler = culler;
        world.input = input;
        world.set_pan(Point::new(desc.x, desc.y));
        world.background_color = desc.background_color;
        world.background_image = desc.background_image.clone();
        world.hero = desc.hero.clone();
        world.mode = desc.mode;
        world.reset_from_descriptors(&desc.entities)?;
        info!(
            width = desc.width,
            height = desc.height,
            entities = world.registry.len(),
            "world loaded"
        );
        Ok(world)
    }

    /// Persisted form of the world, stamped with the current time.
    pub fn to_descriptor(&self) -> WorldDescriptor {
        let saved_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .ok()
            .map(|d| d.as_secs());
        let desc = WorldDescriptor {
            x: self.pan.x,
            y: self.pan.y,
            width: self.grid.width(),
            height: self.grid.height(),
            tile_width: self.grid.tile_width(),
            tile_height: self.grid.tile_height(),
            background_color: self.background_color,
            background_image: self.background_image.clone(),
            hero: self.hero.clone(),
            mode: self.mode,
            entities: self.registry.iter().map(|e| e.describe()).collect(),
            saved_at,
        };
        info!(entities = desc.entities.len(), "world saved");
        desc
    }

    /// Replace every entity with ones built from descriptors.
    ///
    /// Static entities are identified by the cell under their position.
    /// Dynamic entities keep a persisted identity when they have one;
    /// otherwise characters get the smallest free ordinal for their name
    /// (explicit ordinals are reserved first) and other kinds their cell.
    ///
    /// # Errors
    ///
    /// Unknown classes and rejected props abort the reset before the
    /// registry is touched.
    pub fn reset_from_descriptors(
        &mut self,
        descriptors: &[EntityDescriptor],
    ) -> Result<(), WorldError> {
        let factory = Arc::clone(&self.factory);

        let mut taken: HashMap<String, BTreeSet<u32>> = HashMap::new();
        for desc in descriptors {
            if let Some(EntityId::Named { name, ordinal }) = &desc.id {
                taken.entry(name.clone()).or_default().insert(*ordinal);
            }
        }

        let mut entities = Vec::with_capacity(descriptors.len());
        let mut hero_seen = false;
        let mut dynamic_ids = HashSet::new();
        for desc in descriptors {
            let class = factory.class(&desc.class)?;
            let is_hero = self.is_hero_name(&class.name);
            if is_hero {
                if hero_seen {
                    warn!(class = %class.name, "duplicate hero skipped");
                    continue;
                }
                hero_seen = true;
            }

            let cell = self.grid.world_index(desc.x, desc.y);
            let id = if class.is_static {
                match cell {
                    Some(cell) => EntityId::Cell(cell),
                    None => {
                        warn!(
                            class = %class.name,
                            x = desc.x,
                            y = desc.y,
                            "static entity outside the grid skipped"
                        );
                        continue;
                    }
                }
            } else {
                let id = match (&desc.id, cell) {
                    (Some(id), _) => id.clone(),
                    (None, _) if class.kind == CHARACTER_KIND => {
                        allocate_ordinal(&mut taken, &class.name)
                    }
                    (None, Some(cell)) => EntityId::Cell(cell),
                    (None, None) => {
                        warn!(
                            class = %class.name,
                            x = desc.x,
                            y = desc.y,
                            "grid-aligned entity outside the grid skipped"
                        );
                        continue;
                    }
                };
                if !dynamic_ids.insert(id.clone()) {
                    warn!(id = %id, class = %class.name, "duplicate entity id skipped");
                    continue;
                }
                id
            };

            let facing = desc.facing.or(class.default_facing);
            entities.push(self.build_entity(
                class,
                id,
                Point::new(desc.x, desc.y),
                facing,
                &desc.props,
                is_hero,
            )?);
        }

        let ctx = AttachContext {
            grid: &self.grid,
            hero: self.hero.as_deref(),
        };
        self.registry.reset(entities, &ctx, &mut self.dirty)?;
        self.rebind_camera();
        Ok(())
    }

    pub(crate) fn build_entity(
        &self,
        class: &EntityClass,
        id: EntityId,
        origin: Point,
        facing: Option<Facing>,
        props: &BTreeMap<String, serde_json::Value>,
        is_hero: bool,
    ) -> Result<Box<dyn Entity>, WorldError> {
        class.build(SpawnArgs {
            class,
            id,
            origin,
            size: class.pixel_size(&self.grid),
            facing,
            props,
            input: if is_hero { self.input.clone() } else { None },
        })
    }

    // -- entities -----------------------------------------------------------

    /// Insert an entity, replacing any entity with the same identity. Adding
    /// a hero removes every other live entity carrying the hero name.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::OutOfGrid`] for a static entity outside the
    /// grid and [`WorldError::StaticIdMismatch`] for one whose identity is
    /// not its cell. The world is unchanged in both cases.
    pub fn add(&mut self, entity: Box<dyn Entity>) -> Result<(), WorldError> {
        if entity.is_static() {
            self.registry.statics().cell_for(entity.as_ref())?;
        }
        let is_hero = self.is_hero_name(entity.name());
        if is_hero {
            for id in self.registry.ids_named(entity.name()) {
                if &id != entity.id() {
                    debug!(id = %id, "previous hero replaced");
                    self.remove(&id);
                }
            }
        }
        let ctx = AttachContext {
            grid: &self.grid,
            hero: self.hero.as_deref(),
        };
        self.registry.add(entity, &ctx, &mut self.dirty)?;
        if is_hero {
            self.rebind_camera();
        }
        Ok(())
    }

    pub fn remove(&mut self, id: &EntityId) -> Option<Box<dyn Entity>> {
        self.registry.remove(id, &mut self.dirty)
    }

    pub fn clear(&mut self) {
        self.registry.clear(&mut self.dirty);
    }

    pub fn get(&self, id: &EntityId) -> Option<&dyn Entity> {
        self.registry.get(id)
    }

    pub fn entity_count(&self) -> usize {
        self.registry.len()
    }

    /// Whether the dynamic entity asked to be drawn on the last update.
    pub fn needs_draw(&self, id: &EntityId) -> bool {
        self.registry.needs_draw(id)
    }

    /// The live entity carrying the hero name, if any.
    pub fn hero_id(&self) -> Option<EntityId> {
        let hero = self.hero.as_deref()?;
        self.registry
            .iter()
            .find(|e| e.name() == hero)
            .map(|e| e.id().clone())
    }

    pub(crate) fn is_hero_name(&self, name: &str) -> bool {
        self.hero.as_deref() == Some(name)
    }

    pub(crate) fn rebind_camera(&mut self) {
        let Some(subject) = self.hero_id() else {
            return;
        };
        let world = self.grid.pixel_size();
        if let Some(camera) = self.camera.as_mut() {
            camera.follow(CameraTarget { subject, world });
        }
    }

    // -- queries ------------------------------------------------------------

    pub fn find_at(&self, point: Point, filter: &QueryFilter) -> Option<&dyn Entity> {
        query::find_at(&self.registry, point, filter)
    }

    pub fn filter_at(&self, point: Point, filter: &QueryFilter) -> Vec<&dyn Entity> {
        query::filter_at(&self.registry, point, filter)
    }

    pub fn find_colliding_at(&self, x: f64, y: f64) -> Option<&dyn Entity> {
        query::find_colliding_at(&self.registry, x, y)
    }

    // -- attributes ---------------------------------------------------------

    pub fn grid(&self) -> &GridDims {
        &self.grid
    }

    pub fn pan(&self) -> Point {
        self.pan
    }

    /// Set the pan offset. Non-finite offsets are ignored.
    pub fn set_pan(&mut self, pan: Point) {
        if !pan.is_finite() {
            warn!(x = pan.x, y = pan.y, "ignoring non-finite pan");
            return;
        }
        self.pan = pan;
        self.dirty.mark_background();
    }

    pub fn background_color(&self) -> Color {
        self.background_color
    }

    pub fn background_image(&self) -> Option<&ImageHandle> {
        self.background_image.as_ref()
    }

    pub fn set_background(&mut self, color: Color, image: Option<ImageHandle>) {
        self.background_color = color;
        self.background_image = image;
        self.dirty.mark_background();
    }

    /// Change the grid size in tiles, keeping the tile size. Entities are
    /// re-identified against the new grid; statics that no longer fit are
    /// dropped.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::InvalidDimensions`] for a zero size. The world
    /// is unchanged in that case.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), WorldError> {
        let grid = GridDims::new(
            width,
            height,
            self.grid.tile_width(),
            self.grid.tile_height(),
        )?;
        let descriptors: Vec<EntityDescriptor> = self
            .registry
            .iter()
            .map(|e| {
                let mut desc = e.describe();
                // Cell identities encode the old height.
                if matches!(desc.id, Some(EntityId::Cell(_))) {
                    desc.id = None;
                }
                desc
            })
            .collect();

        let previous = std::mem::replace(&mut self.grid, grid);
        let mut old = std::mem::replace(&mut self.registry, EntityRegistry::new(grid));
        if let Err(e) = self.reset_from_descriptors(&descriptors) {
            self.grid = previous;
            self.registry = old;
            return Err(e);
        }
        old.clear(&mut self.dirty);
        self.band = None;
        self.dirty.mark_background();
        Ok(())
    }

    pub fn hero(&self) -> Option<&str> {
        self.hero.as_deref()
    }

    /// Designate the hero class name and point the camera at it. If several
    /// live entities carry the new name, the first is kept and the rest are
    /// removed.
    pub fn set_hero(&mut self, hero: Option<String>) {
        self.hero = hero;
        if let Some(name) = self.hero.clone() {
            for id in self.registry.ids_named(&name).into_iter().skip(1) {
                warn!(id = %id, hero = %name, "extra hero instance removed");
                self.remove(&id);
            }
        }
        self.rebind_camera();
    }

    pub fn mode(&self) -> WorldMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: WorldMode) {
        self.mode = mode;
    }

    pub fn set_camera(&mut self, camera: Box<dyn CameraFollow>) {
        self.camera = Some(camera);
        self.rebind_camera();
    }

    pub fn camera(&self) -> Option<&dyn CameraFollow> {
        self.camera.as_deref()
    }

    pub fn take_camera(&mut self) -> Option<Box<dyn CameraFollow>> {
        self.camera.take()
    }

    /// Input source handed to the hero. A hero already in the world is
    /// rebuilt in place so it picks the new source up.
    pub fn set_input(&mut self, input: Arc<dyn InputSource>) {
        self.input = Some(input);
        if let Err(e) = self.respawn_hero() {
            warn!(error = %e, "hero kept its previous input");
        }
    }

    fn respawn_hero(&mut self) -> Result<(), WorldError> {
        let Some(id) = self.hero_id() else {
            return Ok(());
        };
        let Some(desc) = self.registry.get(&id).map(|e| e.describe()) else {
            return Ok(());
        };
        let factory = Arc::clone(&self.factory);
        let class = factory.class(&desc.class)?;
        let entity = self.build_entity(
            class,
            id,
            Point::new(desc.x, desc.y),
            desc.facing.or(class.default_facing),
            &desc.props,
            true,
        )?;
        self.add(entity)
    }

    pub fn input(&self) -> Option<&Arc<dyn InputSource>> {
        self.input.as_ref()
    }

    pub fn factory(&self) -> &Arc<EntityFactory> {
        &self.factory
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn is_background_dirty(&self) -> bool {
        self.dirty.is_background_dirty()
    }

    /// The band computed by the last update.
    pub fn band(&self) -> Option<&VisibleBand> {
        self.band.as_ref()
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    // -- tick ---------------------------------------------------------------

    /// Advance one tick against a surface of the given size.
    pub fn update(&mut self, dt: f64, surface: Size) {
        let start = Instant::now();

        let camera_pan = self.camera.as_ref().and_then(|camera| {
            let bounds = self.registry.get(camera.subject()?)?.bounds();
            camera.pan_for(bounds, surface)
        });
        if let Some(pan) = camera_pan.filter(|p| p.is_finite()) {
            self.pan = pan;
        }
        self.dirty.observe_pan(self.pan);

        let band = self
            .culler
            .cull(&self.grid, self.pan, surface, self.registry.statics());
        let active = self.culler.active_set(
            self.registry.dynamics(),
            self.hero.as_deref(),
            &band.viewport,
        );

        let viewport = band.viewport.rect();
        let frozen = self.mode == WorldMode::Edit;
        let hero = self.hero.as_deref();
        let (statics, dynamics) = self.registry.split_for_update();
        for slot in dynamics.iter_mut() {
            slot.needs_draw = false;
        }
        for &i in &active {
            let slot = &mut dynamics[i];
            if frozen {
                slot.needs_draw = true;
                continue;
            }
            let is_hero = hero.is_some_and(|h| slot.entity.name() == h);
            let ctx = UpdateContext::new(&self.grid, viewport, is_hero, statics);
            slot.needs_draw = slot.entity.update(dt, &ctx);
        }

        self.band = Some(band);
        self.stats.active_entities = active.len();
        self.stats.update_time = start.elapsed();
    }

    /// Draw the world onto `surface`.
    pub fn draw(&mut self, surface: &mut dyn Surface) {
        let start = Instant::now();
        let size = surface.size();
        let band = match self.band.take() {
            Some(band) => band,
            None => self
                .culler
                .cull(&self.grid, self.pan, size, self.registry.statics()),
        };

        let redraw = self.dirty.take_background();
        let mut tiles_drawn = 0;
        if redraw {
            self.background_layer.reset(size);
            let full = Rect::new(0.0, 0.0, size.width, size.height);
            self.background_layer.draw_rect(full, self.background_color);
            if let Some(image) = &self.background_image {
                self.background_layer.draw_image(image, full, full);
            }
            if let Some((from, to)) = band.static_range {
                for tile in self.registry.statics().range(from, to) {
                    tile.draw(&mut self.background_layer, self.pan);
                    tiles_drawn += 1;
                }
            }
        }
        surface.draw_layer(&self.background_layer, Point::ZERO);

        let mut entities_drawn = 0;
        for slot in self.registry.dynamics().iter().filter(|s| s.needs_draw) {
            slot.entity.draw(surface, self.pan);
            entities_drawn += 1;
        }

        self.band = Some(band);
        self.stats.tiles_drawn = tiles_drawn;
        self.stats.entities_drawn = entities_drawn;
        self.stats.background_redrawn = redraw;
        self.stats.draw_time = start.elapsed();
    }
}

fn allocate_ordinal(taken: &mut HashMap<String, BTreeSet<u32>>, name: &str) -> EntityId {
    let used = taken.entry(name.to_owned()).or_default();
    let mut ordinal = 1;
    while used.contains(&ordinal) {
        ordinal += 1;
    }
    used.insert(ordinal);
    EntityId::named(name, ordinal)
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("grid", &self.grid)
            .field("pan", &self.pan)
            .field("hero", &self.hero)
            .field("mode", &self.mode)
            .field("registry", &self.registry)
            .field("camera", &self.camera.as_ref().map(|c| c.subject()))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
