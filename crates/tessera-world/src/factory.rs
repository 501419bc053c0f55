//! Entity factory: class name -> constructor table.
//!
//! Every entity class is registered once with its static traits (type tag,
//! size, static flag, collision, default facing) and a build function. The
//! world resolves descriptor and placement class names through this table;
//! an unknown name is a contract violation reported as
//! [`WorldError::UnknownEntityClass`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::entity::{Entity, EntityId, Facing};
use crate::grid::{GridDims, Point, Size};
use crate::input::InputSource;
use crate::WorldError;

// ---------------------------------------------------------------------------
// SpawnArgs
// ---------------------------------------------------------------------------

/// Everything a build function needs to construct one entity.
pub struct SpawnArgs<'a> {
    pub class: &'a EntityClass,
    pub id: EntityId,
    /// Top-left corner in world pixels.
    pub origin: Point,
    /// Pixel size, resolved from the class span and the grid's tile size.
    pub size: Size,
    pub facing: Option<Facing>,
    pub props: &'a BTreeMap<String, serde_json::Value>,
    /// Only set for the hero.
    pub input: Option<Arc<dyn InputSource>>,
}

impl SpawnArgs<'_> {
    /// Look up a typed property, falling back to `default` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::InvalidProperty`] when the property is present
    /// but does not deserialize as `T`.
    pub fn prop_or<T>(&self, key: &str, default: T) -> Result<T, WorldError>
    where
        T: for<'de> serde::Deserialize<'de>,
    {
        match self.props.get(key) {
            None => Ok(default),
            Some(value) => {
                serde_json::from_value(value.clone()).map_err(|e| WorldError::InvalidProperty {
                    class: self.class.name.clone(),
                    property: key.to_owned(),
                    details: e.to_string(),
                })
            }
        }
    }
}

/// Type-erased constructor for one entity class.
pub type BuildFn =
    Box<dyn Fn(SpawnArgs<'_>) -> Result<Box<dyn Entity>, WorldError> + Send + Sync>;

// ---------------------------------------------------------------------------
// EntityClass
// ---------------------------------------------------------------------------

/// A registered entity class.
pub struct EntityClass {
    pub name: String,
    pub kind: String,
    /// Size in tiles (fractions allowed).
    pub span: Size,
    pub is_static: bool,
    pub collision: bool,
    /// Facing a freshly placed entity starts with. `None` means the class
    /// has no facing, so re-placing it toggles straight to removal.
    pub default_facing: Option<Facing>,
    build: BuildFn,
}

impl EntityClass {
    /// A class one tile in size, with no collision and no facing.
    pub fn new(
        name: impl Into<String>,
        kind: impl Into<String>,
        is_static: bool,
        build: BuildFn,
    ) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            span: Size::new(1.0, 1.0),
            is_static,
            collision: false,
            default_facing: None,
            build,
        }
    }

    pub fn with_span(mut self, columns: f64, rows: f64) -> Self {
        self.span = Size::new(columns, rows);
        self
    }

    /// Pixel size of instances on `grid`.
    pub fn pixel_size(&self, grid: &GridDims) -> Size {
        Size::new(
            self.span.width * grid.tile_width() as f64,
            self.span.height * grid.tile_height() as f64,
        )
    }

    pub fn with_collision(mut self, collision: bool) -> Self {
        self.collision = collision;
        self
    }

    pub fn with_facing(mut self, facing: Facing) -> Self {
        self.default_facing = Some(facing);
        self
    }

    pub fn build(&self, args: SpawnArgs<'_>) -> Result<Box<dyn Entity>, WorldError> {
        (self.build)(args)
    }
}

impl fmt::Debug for EntityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityClass")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("span", &self.span)
            .field("is_static", &self.is_static)
            .field("collision", &self.collision)
            .field("default_facing", &self.default_facing)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// EntityFactory
// ---------------------------------------------------------------------------

/// Registry of entity classes, keyed by class name.
#[derive(Debug, Default)]
pub struct EntityFactory {
    classes: BTreeMap<String, EntityClass>,
}

impl EntityFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class, replacing any previous class of the same name.
    pub fn register(&mut self, class: EntityClass) -> &mut Self {
        self.classes.insert(class.name.clone(), class);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    /// Resolve a class by name.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::UnknownEntityClass`] listing the registered
    /// names.
    pub fn class(&self, name: &str) -> Result<&EntityClass, WorldError> {
        self.classes
            .get(name)
            .ok_or_else(|| WorldError::UnknownEntityClass {
                class: name.to_owned(),
                registered: self.names().collect::<Vec<_>>().join(", "),
            })
    }

    /// Registered class names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
