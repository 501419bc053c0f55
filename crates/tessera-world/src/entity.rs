//! Entity identities and the capability contract every entity satisfies.
//!
//! An [`EntityId`] comes in two shapes:
//!
//! - [`EntityId::Cell`]: the world index `column * grid_height + row` of the
//!   cell the entity was placed in. Used by static tiles and by grid-aligned
//!   non-character placements. Unique within one world only.
//! - [`EntityId::Named`]: `"<name>.<ordinal>"`, where the ordinal is the
//!   smallest positive integer not already taken by a live dynamic entity of
//!   the same name. Used by characters.
//!
//! Entities hold no pointer back to the world. Anything they need from it
//! during a tick arrives through an explicit [`UpdateContext`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::grid::{GridDims, Point, Rect, Shape};
use crate::persist::EntityDescriptor;
use crate::render::Surface;
use crate::static_index::StaticIndex;
use crate::WorldError;

/// Type tag of player/NPC entities. Characters get [`EntityId::Named`]
/// identities and take absolute precedence in character queries.
pub const CHARACTER_KIND: &str = "character";

// ---------------------------------------------------------------------------
// EntityId
// ---------------------------------------------------------------------------

/// Identity of an entity within one world.
///
/// Serialized as a bare integer for cells and as `"name.ordinal"` for named
/// entities.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "IdRepr", into = "IdRepr")]
pub enum EntityId {
    Cell(u32),
    Named { name: String, ordinal: u32 },
}

impl EntityId {
    pub fn named(name: impl Into<String>, ordinal: u32) -> Self {
        EntityId::Named {
            name: name.into(),
            ordinal,
        }
    }

    /// The world index, if this is a cell identity.
    pub fn cell(&self) -> Option<u32> {
        match self {
            EntityId::Cell(index) => Some(*index),
            EntityId::Named { .. } => None,
        }
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({self})")
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Cell(index) => write!(f, "{index}"),
            EntityId::Named { name, ordinal } => write!(f, "{name}.{ordinal}"),
        }
    }
}

impl FromStr for EntityId {
    type Err = WorldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(index) = s.parse::<u32>() {
            return Ok(EntityId::Cell(index));
        }
        let invalid = || WorldError::InvalidEntityId { raw: s.to_owned() };
        let (name, ordinal) = s.rsplit_once('.').ok_or_else(invalid)?;
        let ordinal: u32 = ordinal.parse().map_err(|_| invalid())?;
        if name.is_empty() || ordinal == 0 {
            return Err(invalid());
        }
        Ok(EntityId::named(name, ordinal))
    }
}

/// Wire shape of [`EntityId`].
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum IdRepr {
    Cell(u32),
    Named(String),
}

impl TryFrom<IdRepr> for EntityId {
    type Error = WorldError;

    fn try_from(repr: IdRepr) -> Result<Self, Self::Error> {
        match repr {
            IdRepr::Cell(index) => Ok(EntityId::Cell(index)),
            IdRepr::Named(s) => s.parse(),
        }
    }
}

impl From<EntityId> for IdRepr {
    fn from(id: EntityId) -> Self {
        match id {
            EntityId::Cell(index) => IdRepr::Cell(index),
            named @ EntityId::Named { .. } => IdRepr::Named(named.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Facing
// ---------------------------------------------------------------------------

/// Horizontal facing direction of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    Left,
    Right,
}

impl Facing {
    pub fn flipped(self) -> Facing {
        match self {
            Facing::Left => Facing::Right,
            Facing::Right => Facing::Left,
        }
    }
}

// ---------------------------------------------------------------------------
// Contexts
// ---------------------------------------------------------------------------

/// Read-only world state handed to an entity when it joins the registry.
#[derive(Debug, Clone, Copy)]
pub struct AttachContext<'a> {
    pub grid: &'a GridDims,
    /// Name of the world's hero entity, if any.
    pub hero: Option<&'a str>,
}

/// Read-only world state handed to a dynamic entity for one update call.
///
/// Borrowed for the duration of the call only; entities must not retain it.
pub struct UpdateContext<'a> {
    pub grid: &'a GridDims,
    /// The culled viewport rectangle for this tick, in world pixels.
    pub viewport: Rect,
    /// Whether the entity being updated is the hero.
    pub is_hero: bool,
    pub(crate) statics: &'a StaticIndex,
}

impl<'a> UpdateContext<'a> {
    pub(crate) fn new(
        grid: &'a GridDims,
        viewport: Rect,
        is_hero: bool,
        statics: &'a StaticIndex,
    ) -> Self {
        Self {
            grid,
            viewport,
            is_hero,
            statics,
        }
    }

    /// Whether the static tile occupying the cell under `(x, y)` has its
    /// collision flag set. Points outside the grid are not solid.
    pub fn is_solid_at(&self, x: f64, y: f64) -> bool {
        self.grid
            .world_index(x, y)
            .and_then(|cell| self.statics.get_by_cell(cell))
            .is_some_and(|e| e.collision())
    }
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// The capability contract the world consumes from every entity.
///
/// Behavior and animation are entirely the entity's business; the world only
/// reads identity and geometry, asks for updates and draws, and tests
/// overlap.
pub trait Entity: Send + Sync {
    fn id(&self) -> &EntityId;

    /// Class name, e.g. `"brick"` or `"hero"`.
    fn name(&self) -> &str;

    /// Type tag, e.g. `"tile"` or [`CHARACTER_KIND`].
    fn kind(&self) -> &str;

    /// Bounding box in world pixels.
    fn bounds(&self) -> Rect;

    /// Static entities are indexed by grid cell and never updated.
    fn is_static(&self) -> bool;

    fn position(&self) -> Point {
        self.bounds().origin()
    }

    fn collision(&self) -> bool {
        false
    }

    fn facing(&self) -> Option<Facing> {
        None
    }

    /// Entities without a facing ignore this.
    fn set_facing(&mut self, _facing: Facing) {}

    fn overlaps(&self, shape: Shape) -> bool {
        self.bounds().overlaps(shape)
    }

    /// Advance one tick. Returns whether the entity needs to be drawn this
    /// frame.
    fn update(&mut self, _dt: f64, _ctx: &UpdateContext<'_>) -> bool {
        true
    }

    /// Draw with `offset` (the world pan) added to world coordinates.
    fn draw(&self, surface: &mut dyn Surface, offset: Point);

    fn on_attach(&mut self, _ctx: &AttachContext<'_>) {}

    fn on_detach(&mut self) {}

    /// Persisted form of this entity.
    fn describe(&self) -> EntityDescriptor;
}

impl fmt::Debug for dyn Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("id", self.id())
            .field("name", &self.name())
            .field("kind", &self.kind())
            .field("bounds", &self.bounds())
            .field("static", &self.is_static())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
