//! Owns every entity of a world, split into static and dynamic collections.
//!
//! Static entities go to the [`StaticIndex`]; every static mutation rebuilds
//! it and raises the background-dirty flag. Dynamic entities live in an
//! insertion-ordered list together with their per-tick `needs_draw` flag.
//! Lifecycle hooks are called directly on insertion and removal.

use crate::dirty::DirtyTracker;
use crate::entity::{AttachContext, Entity, EntityId};
use crate::grid::GridDims;
use crate::static_index::StaticIndex;
use crate::WorldError;

/// A dynamic entity plus its draw flag for the current tick.
pub struct DynamicSlot {
    pub entity: Box<dyn Entity>,
    pub needs_draw: bool,
}

fn dynamic_ref(slot: &DynamicSlot) -> &dyn Entity {
    slot.entity.as_ref()
}

fn dynamic_mut(slot: &mut DynamicSlot) -> &mut dyn Entity {
    slot.entity.as_mut()
}

pub struct EntityRegistry {
    statics: StaticIndex,
    dynamics: Vec<DynamicSlot>,
}

impl EntityRegistry {
    pub fn new(grid: GridDims) -> Self {
        Self {
            statics: StaticIndex::new(grid),
            dynamics: Vec::new(),
        }
    }

    pub fn statics(&self) -> &StaticIndex {
        &self.statics
    }

    pub fn dynamics(&self) -> &[DynamicSlot] {
        &self.dynamics
    }

    /// Borrow the static index and the dynamic slots at the same time, so
    /// dynamic entities can be updated against the statics.
    pub fn split_for_update(&mut self) -> (&StaticIndex, &mut [DynamicSlot]) {
        (&self.statics, &mut self.dynamics)
    }

    pub fn len(&self) -> usize {
        self.statics.len() + self.dynamics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // -- mutation -----------------------------------------------------------

    /// Attach and insert an entity, routing it by its static flag. An entity
    /// whose identity is already present replaces the previous occupant,
    /// which is detached and dropped.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::OutOfGrid`] for a static entity positioned
    /// outside the grid and [`WorldError::StaticIdMismatch`] for one whose
    /// identity is not its cell. Nothing is modified in either case.
    pub fn add(
        &mut self,
        mut entity: Box<dyn Entity>,
        ctx: &AttachContext<'_>,
        dirty: &mut DirtyTracker,
    ) -> Result<(), WorldError> {
        if entity.is_static() {
            self.statics.cell_for(entity.as_ref())?;
            // Identity may collide with a dynamic grid-aligned placement.
            self.remove_dynamic(entity.id());
            entity.on_attach(ctx);
            if let Some(mut old) = self.statics.insert(entity)? {
                old.on_detach();
            }
            self.statics.rebuild();
            dirty.mark_background();
        } else {
            let id = entity.id().clone();
            self.remove_static(&id, dirty);
            entity.on_attach(ctx);
            let slot = DynamicSlot {
                entity,
                needs_draw: false,
            };
            match self.dynamics.iter().position(|s| s.entity.id() == &id) {
                Some(pos) => {
                    let mut old = std::mem::replace(&mut self.dynamics[pos], slot);
                    old.entity.on_detach();
                }
                None => self.dynamics.push(slot),
            }
        }
        Ok(())
    }

    /// Detach and remove the entity with `id`, trying the static index first.
    pub fn remove(&mut self, id: &EntityId, dirty: &mut DirtyTracker) -> Option<Box<dyn Entity>> {
        self.remove_static(id, dirty)
            .or_else(|| self.remove_dynamic(id))
    }

    fn remove_static(&mut self, id: &EntityId, dirty: &mut DirtyTracker) -> Option<Box<dyn Entity>> {
        self.statics.get(id)?;
        let mut entity = self.statics.remove(id.cell()?)?;
        self.statics.rebuild();
        dirty.mark_background();
        entity.on_detach();
        Some(entity)
    }

    fn remove_dynamic(&mut self, id: &EntityId) -> Option<Box<dyn Entity>> {
        let pos = self.dynamics.iter().position(|s| s.entity.id() == id)?;
        let mut entity = self.dynamics.remove(pos).entity;
        entity.on_detach();
        Some(entity)
    }

    /// Replace the whole population. The static index is rebuilt exactly
    /// once.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::OutOfGrid`] if any static entity lies outside
    /// the grid, or [`WorldError::StaticIdMismatch`] if one carries an
    /// identity other than its cell. The registry is left untouched.
    pub fn reset(
        &mut self,
        entities: Vec<Box<dyn Entity>>,
        ctx: &AttachContext<'_>,
        dirty: &mut DirtyTracker,
    ) -> Result<(), WorldError> {
        for entity in entities.iter().filter(|e| e.is_static()) {
            self.statics.cell_for(entity.as_ref())?;
        }

        self.clear_without_rebuild();
        for mut entity in entities {
            entity.on_attach(ctx);
            if entity.is_static() {
                if let Some(mut old) = self.statics.insert(entity)? {
                    old.on_detach();
                }
            } else {
                let id = entity.id().clone();
                let slot = DynamicSlot {
                    entity,
                    needs_draw: false,
                };
                match self.dynamics.iter().position(|s| s.entity.id() == &id) {
                    Some(pos) => {
                        let mut old = std::mem::replace(&mut self.dynamics[pos], slot);
                        old.entity.on_detach();
                    }
                    None => self.dynamics.push(slot),
                }
            }
        }
        self.statics.rebuild();
        dirty.mark_background();
        Ok(())
    }

    /// Detach every entity and empty both collections.
    pub fn clear(&mut self, dirty: &mut DirtyTracker) {
        self.clear_without_rebuild();
        self.statics.rebuild();
        dirty.mark_background();
    }

    fn clear_without_rebuild(&mut self) {
        for mut entity in self.statics.drain() {
            entity.on_detach();
        }
        for mut slot in self.dynamics.drain(..) {
            slot.entity.on_detach();
        }
    }

    // -- lookup -------------------------------------------------------------

    pub fn get(&self, id: &EntityId) -> Option<&dyn Entity> {
        self.statics
            .get(id)
            .or_else(|| self.dynamic(id).map(dynamic_ref))
    }

    /// Mutable access to a dynamic entity. Static entities are immutable once
    /// placed.
    pub fn get_mut(&mut self, id: &EntityId) -> Option<&mut dyn Entity> {
        self.dynamics
            .iter_mut()
            .find(|s| s.entity.id() == id)
            .map(dynamic_mut)
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.get(id).is_some()
    }

    pub fn needs_draw(&self, id: &EntityId) -> bool {
        self.dynamic(id).is_some_and(|s| s.needs_draw)
    }

    fn dynamic(&self, id: &EntityId) -> Option<&DynamicSlot> {
        self.dynamics.iter().find(|s| s.entity.id() == id)
    }

    /// Identities of all entities with the given class name, statics first.
    pub fn ids_named(&self, name: &str) -> Vec<EntityId> {
        self.iter()
            .filter(|e| e.name() == name)
            .map(|e| e.id().clone())
            .collect()
    }

    /// Smallest positive ordinal not used by a live dynamic entity named
    /// `name`.
    pub fn next_ordinal(&self, name: &str) -> u32 {
        let mut used: Vec<u32> = self
            .dynamics
            .iter()
            .filter_map(|s| match s.entity.id() {
                EntityId::Named { name: n, ordinal } if n == name => Some(*ordinal),
                _ => None,
            })
            .collect();
        used.sort_unstable();
        let mut next = 1;
        for ordinal in used {
            if ordinal == next {
                next += 1;
            } else if ordinal > next {
                break;
            }
        }
        next
    }

    /// Every entity: statics in world-index order, then dynamics in
    /// insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Entity> {
        self.statics
            .iter()
            .chain(self.dynamics.iter().map(dynamic_ref))
    }

    pub fn iter_dynamic(&self) -> impl Iterator<Item = &dyn Entity> {
        self.dynamics.iter().map(dynamic_ref)
    }
}

impl std::fmt::Debug for EntityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityRegistry")
            .field("statics", &self.statics.len())
            .field("dynamics", &self.dynamics.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
