//! Positional queries over a registry.
//!
//! Dynamic entities always take precedence over static ones. A query for
//! [`CHARACTER_KIND`] never falls through to the static collection.

use crate::entity::{Entity, EntityId, CHARACTER_KIND};
use crate::grid::Point;
use crate::registry::EntityRegistry;
use crate::static_index::StaticIndex;

/// Optional constraints applied to every candidate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryFilter {
    /// Only entities with this type tag.
    pub kind: Option<String>,
    /// Skip this entity.
    pub exclude: Option<EntityId>,
    /// Only entities with their collision flag set.
    pub collision_only: bool,
}

impl QueryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn exclude(mut self, id: EntityId) -> Self {
        self.exclude = Some(id);
        self
    }

    pub fn collision_only(mut self) -> Self {
        self.collision_only = true;
        self
    }

    fn is_character_query(&self) -> bool {
        self.kind.as_deref() == Some(CHARACTER_KIND)
    }

    pub fn matches(&self, entity: &dyn Entity, point: Point) -> bool {
        if self.exclude.as_ref() == Some(entity.id()) {
            return false;
        }
        if let Some(kind) = &self.kind {
            if entity.kind() != kind {
                return false;
            }
        }
        if self.collision_only && !entity.collision() {
            return false;
        }
        entity.overlaps(point.into())
    }
}

/// Statics that could contain `point`: those in columns up to and including
/// the point's own. Anything further right starts past it.
fn static_candidates<'a>(
    statics: &'a StaticIndex,
    point: Point,
) -> impl Iterator<Item = &'a dyn Entity> + 'a {
    let col = statics.grid().to_column(point.x);
    let end = if !point.is_finite() || col < 0 {
        0
    } else {
        statics
            .lookup_column(col.saturating_add(1))
            .map_or(statics.len(), |e| e.index)
    };
    statics.iter().take(end)
}

/// First entity overlapping `point` that passes `filter`.
pub fn find_at<'a>(
    registry: &'a EntityRegistry,
    point: Point,
    filter: &QueryFilter,
) -> Option<&'a dyn Entity> {
    let dynamic = registry
        .iter_dynamic()
        .find(|e| filter.matches(*e, point));
    if dynamic.is_some() || filter.is_character_query() {
        return dynamic;
    }
    static_candidates(registry.statics(), point).find(|e| filter.matches(*e, point))
}

/// Every entity overlapping `point` that passes `filter`, dynamics first.
pub fn filter_at<'a>(
    registry: &'a EntityRegistry,
    point: Point,
    filter: &QueryFilter,
) -> Vec<&'a dyn Entity> {
    let mut found: Vec<&dyn Entity> = registry
        .iter_dynamic()
        .filter(|e| filter.matches(*e, point))
        .collect();
    if !filter.is_character_query() {
        found.extend(
            static_candidates(registry.statics(), point).filter(|e| filter.matches(*e, point)),
        );
    }
    found
}

/// The entity whose identity is the world index under `(x, y)`, if it has
/// its collision flag set. Exact cell lookup, no overlap testing.
pub fn find_colliding_at(registry: &EntityRegistry, x: f64, y: f64) -> Option<&dyn Entity> {
    let cell = registry.statics().grid().world_index(x, y)?;
    registry
        .statics()
        .get_by_cell(cell)
        .or_else(|| registry.get(&EntityId::Cell(cell)))
        .filter(|e| e.collision())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
