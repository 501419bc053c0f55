//! Editor placement protocol.
//!
//! Clicking a cell with a candidate class either places a new entity there,
//! replaces a different occupant, or toggles an occupant of the same class:
//! the first re-click flips its facing, the next removes it. Clicking with no
//! candidate erases.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use crate::entity::{EntityId, Facing, CHARACTER_KIND};
use crate::grid::Point;
use crate::query::QueryFilter;
use crate::world::World;
use crate::WorldError;

/// The facing in which a re-clicked entity is removed instead of flipped.
/// The hero starts facing right and other classes left, so each toggles
/// through the opposite facing first.
fn remove_direction(is_hero: bool) -> Facing {
    if is_hero {
        Facing::Left
    } else {
        Facing::Right
    }
}

impl World {
    /// Apply a placement click at pixel `(x, y)`.
    ///
    /// Returns the identity of the entity now at the target (newly placed or
    /// flipped), or `None` when the click removed something or did nothing.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::UnknownEntityClass`] for an unregistered
    /// candidate, before anything is modified. Construction errors from the
    /// class's build function are also propagated.
    pub fn place(
        &mut self,
        candidate: Option<&str>,
        x: f64,
        y: f64,
    ) -> Result<Option<EntityId>, WorldError> {
        let factory = Arc::clone(&self.factory);
        let class = candidate.map(|name| factory.class(name)).transpose()?;

        let occupant = self
            .find_at(Point::new(x, y), &QueryFilter::new())
            .map(|e| (e.id().clone(), e.name().to_owned(), e.facing()));

        if let Some((id, name, facing)) = occupant {
            match class {
                None => {
                    self.remove(&id);
                    return Ok(None);
                }
                Some(class) if class.name == name => {
                    return Ok(self.toggle(id, &name, facing));
                }
                Some(_) => {
                    self.remove(&id);
                }
            }
        }

        let Some(class) = class else {
            return Ok(None);
        };

        let col = self.grid.to_column(x);
        let clicked_row = self.grid.to_row(y);
        let (width, height) = (self.grid.width() as i64, self.grid.height() as i64);
        if !x.is_finite() || !y.is_finite() || !(0..width).contains(&col) {
            return Ok(None);
        }
        if !(0..height).contains(&clicked_row) {
            return Ok(None);
        }

        // Anchor the entity's bottom edge on the bottom of the clicked cell.
        let base = (clicked_row + 1) as f64 * self.grid.tile_height() as f64;
        let class_height = class.pixel_size(&self.grid).height;
        let row = self.grid.to_row(base - class_height).clamp(0, height - 1);
        let (col, row) = (col as u32, row as u32);

        let is_hero = self.is_hero_name(&class.name);
        if is_hero {
            for id in self.registry.ids_named(&class.name) {
                self.remove(&id);
            }
        }

        let id = if class.kind == CHARACTER_KIND {
            EntityId::named(class.name.as_str(), self.registry.next_ordinal(&class.name))
        } else {
            match self.grid.cell_index(col, row) {
                Some(cell) => EntityId::Cell(cell),
                None => return Ok(None),
            }
        };

        let entity = self.build_entity(
            class,
            id.clone(),
            self.grid.cell_origin(col, row),
            class.default_facing,
            &BTreeMap::new(),
            is_hero,
        )?;
        self.add(entity)?;

        if is_hero {
            self.rebind_camera();
            info!(id = %id, col, row, "hero placed");
        }
        Ok(Some(id))
    }

    fn toggle(&mut self, id: EntityId, name: &str, facing: Option<Facing>) -> Option<EntityId> {
        let remove_dir = remove_direction(self.is_hero_name(name));
        match facing {
            Some(current) if current != remove_dir => {
                if let Some(entity) = self.registry.get_mut(&id) {
                    entity.set_facing(current.flipped());
                }
                Some(id)
            }
            _ => {
                self.remove(&id);
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
