//! Tessera World -- spatial state of a tile-based 2D game world.
//!
//! Entities are split into two collections on insertion: *static* tiles,
//! kept ordered by grid cell in a [`StaticIndex`](static_index::StaticIndex)
//! that answers "which tiles are in this column band" without searching, and
//! *dynamic* entities, culled against the viewport every tick. On top of that
//! sit point/collision queries and the editor placement protocol.
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use tessera_world::prelude::*;
//!
//! let grid = GridDims::new(64, 19, 32, 32).unwrap();
//! let mut world = World::new(grid, Arc::new(EntityFactory::standard()));
//!
//! // Place a brick at pixel (64, 96): column 2, row 3, identity 2 * 19 + 3.
//! let id = world.place(Some("brick"), 64.0, 96.0).unwrap();
//! assert_eq!(id, Some(EntityId::Cell(41)));
//!
//! // Run one tick against a 256x192 surface, then draw it.
//! world.update(1.0 / 60.0, Size::new(256.0, 192.0));
//! let mut surface = RecordingSurface::new(Size::new(256.0, 192.0));
//! world.draw(&mut surface);
//! assert_eq!(world.stats().tiles_drawn, 1);
//! ```

#![deny(unsafe_code)]

pub mod builtin;
pub mod camera;
pub mod dirty;
pub mod entity;
pub mod factory;
pub mod grid;
pub mod input;
pub mod persist;
pub mod placement;
pub mod query;
pub mod registry;
pub mod render;
pub mod static_index;
pub mod viewport;
pub mod world;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by world operations.
///
/// Positional lookups never fail -- they return `None`. These variants cover
/// collaborator contract violations: bad descriptors, unknown entity classes,
/// and entities that cannot live on the grid.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// An entity class name was referenced that the factory does not know.
    #[error("entity class '{class}' not registered. Registered classes: [{registered}]")]
    UnknownEntityClass { class: String, registered: String },

    /// Grid or tile dimensions were zero or overflow the world index space.
    #[error(
        "invalid world dimensions {width}x{height} tiles of {tile_width}x{tile_height} px \
         (all must be positive and width * height must fit in u32)"
    )]
    InvalidDimensions {
        width: u32,
        height: u32,
        tile_width: u32,
        tile_height: u32,
    },

    /// A static entity's position does not map to a cell inside the grid.
    #[error("static entity {id} at ({x}, {y}) lies outside the grid")]
    OutOfGrid { id: String, x: f64, y: f64 },

    /// A static entity's identity is not the cell its position maps to.
    #[error("static entity {id} sits in cell {cell} and must carry that identity")]
    StaticIdMismatch { id: String, cell: u32 },

    /// A string could not be parsed as an entity identity.
    #[error("invalid entity id '{raw}' (expected a cell index or '<name>.<ordinal>')")]
    InvalidEntityId { raw: String },

    /// A string could not be parsed as a color.
    #[error("invalid color '{raw}' (expected '#rrggbb' or '#rrggbbaa')")]
    InvalidColor { raw: String },

    /// An entity property had the wrong shape for its class.
    #[error("invalid property '{property}' for entity class '{class}': {details}")]
    InvalidProperty {
        class: String,
        property: String,
        details: String,
    },

    /// A world or entity descriptor failed to (de)serialize.
    #[error("malformed world descriptor: {0}")]
    Descriptor(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::builtin::{Actor, Tile};
    pub use crate::camera::{CameraFollow, CameraTarget, FollowCamera};
    pub use crate::dirty::DirtyTracker;
    pub use crate::entity::{
        AttachContext, Entity, EntityId, Facing, UpdateContext, CHARACTER_KIND,
    };
    pub use crate::factory::{EntityClass, EntityFactory, SpawnArgs};
    pub use crate::grid::{GridDims, Point, Rect, Shape, Size};
    pub use crate::input::{Action, InputSource, InputState};
    pub use crate::persist::{EntityDescriptor, WorldDescriptor};
    pub use crate::query::QueryFilter;
    pub use crate::registry::EntityRegistry;
    pub use crate::render::{Color, DrawCommand, ImageHandle, RecordingSurface, Surface};
    pub use crate::static_index::{LookupEntry, StaticIndex};
    pub use crate::viewport::{CullConfig, ViewportCuller, Viewport, VisibleBand};
    pub use crate::world::{FrameStats, World, WorldMode};
    pub use crate::WorldError;
}
