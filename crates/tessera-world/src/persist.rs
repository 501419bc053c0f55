//! Persisted shape of a world and its entities.
//!
//! A [`WorldDescriptor`] holds the shallow world attributes plus one
//! [`EntityDescriptor`] per entity, each produced by the entity itself via
//! [`Entity::describe`](crate::entity::Entity::describe). The same shape is
//! used to construct a world on load.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entity::{EntityId, Facing};
use crate::grid::GridDims;
use crate::render::{Color, ImageHandle};
use crate::world::WorldMode;
use crate::WorldError;

// ---------------------------------------------------------------------------
// EntityDescriptor
// ---------------------------------------------------------------------------

/// Persisted form of one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDescriptor {
    /// Registered class name, resolved through the
    /// [`EntityFactory`](crate::factory::EntityFactory).
    pub class: String,
    /// Stable identity. Allocated on load when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facing: Option<Facing>,
    /// Class-specific attributes. Uses `BTreeMap` for deterministic
    /// serialization order.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub props: BTreeMap<String, serde_json::Value>,
}

impl EntityDescriptor {
    pub fn new(class: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            class: class.into(),
            id: None,
            x,
            y,
            facing: None,
            props: BTreeMap::new(),
        }
    }

    pub fn with_id(mut self, id: EntityId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_facing(mut self, facing: Facing) -> Self {
        self.facing = Some(facing);
        self
    }

    pub fn with_prop(mut self, key: &str, value: serde_json::Value) -> Self {
        self.props.insert(key.to_owned(), value);
        self
    }
}

// ---------------------------------------------------------------------------
// WorldDescriptor
// ---------------------------------------------------------------------------

fn default_tile() -> u32 {
    32
}

/// Persisted form of a whole world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldDescriptor {
    /// Pan offset in pixels.
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    /// Grid width in tiles.
    pub width: u32,
    /// Grid height in tiles.
    pub height: u32,
    #[serde(default = "default_tile")]
    pub tile_width: u32,
    #[serde(default = "default_tile")]
    pub tile_height: u32,
    #[serde(default)]
    pub background_color: Color,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_image: Option<ImageHandle>,
    /// Name of the singleton player-controlled entity class.
    #[serde(default)]
    pub hero: Option<String>,
    #[serde(default)]
    pub mode: WorldMode,
    #[serde(default)]
    pub entities: Vec<EntityDescriptor>,
    /// Seconds since the Unix epoch at save time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<u64>,
}

impl WorldDescriptor {
    /// An empty world of the given size with default attributes.
    pub fn new(width: u32, height: u32, tile_width: u32, tile_height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width,
            height,
            tile_width,
            tile_height,
            background_color: Color::default(),
            background_image: None,
            hero: None,
            mode: WorldMode::default(),
            entities: Vec::new(),
            saved_at: None,
        }
    }

    /// Validated grid dimensions.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::InvalidDimensions`] for zero or oversized values.
    pub fn grid(&self) -> Result<GridDims, WorldError> {
        GridDims::new(self.width, self.height, self.tile_width, self.tile_height)
    }

    pub fn from_json(json: &str) -> Result<Self, WorldError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, WorldError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
