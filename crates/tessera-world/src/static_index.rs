//! Column-ordered index over static tiles.
//!
//! Static entities are kept sorted by world index (`column * height + row`),
//! which is column-major order. After every mutation the index is rebuilt
//! wholesale into a lookup table with one slot per column in `[0, width]`:
//! slot `c` names the first static entity in column `c` or, if that column is
//! empty, the first one in any later column. Finding the static draw span of
//! a column band is then two array reads.
//!
//! The lookup table is published as an `Arc<[_]>` snapshot. A reader holding
//! an old snapshot keeps a consistent, if stale, view.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::entity::{Entity, EntityId};
use crate::grid::GridDims;
use crate::WorldError;

/// One lookup slot: the static entity a column resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupEntry {
    pub id: EntityId,
    /// Row of that entity (the minimum row within its column).
    pub row: u32,
    /// Position of that entity in the ordered static collection.
    pub index: usize,
}

struct StaticSlot {
    cell: u32,
    entity: Box<dyn Entity>,
}

fn entity_ref(slot: &StaticSlot) -> &dyn Entity {
    slot.entity.as_ref()
}

pub struct StaticIndex {
    grid: GridDims,
    slots: Vec<StaticSlot>,
    cells: HashMap<u32, usize>,
    lookup: Arc<[Option<LookupEntry>]>,
    /// Set by `insert`/`remove`, cleared by `rebuild`.
    stale: bool,
}

impl StaticIndex {
    pub fn new(grid: GridDims) -> Self {
        let mut index = Self {
            grid,
            slots: Vec::new(),
            cells: HashMap::new(),
            lookup: Arc::from(Vec::new()),
            stale: true,
        };
        index.rebuild();
        index
    }

    pub fn grid(&self) -> &GridDims {
        &self.grid
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    // -- mutation -----------------------------------------------------------

    /// Insert a static entity at the cell under its position, returning the
    /// entity it displaced, if any. The lookup table is not refreshed until
    /// [`rebuild`](Self::rebuild).
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::OutOfGrid`] when the entity's position is not
    /// inside the grid, or [`WorldError::StaticIdMismatch`] when its identity
    /// disagrees with its cell. The entity is dropped.
    pub fn insert(
        &mut self,
        entity: Box<dyn Entity>,
    ) -> Result<Option<Box<dyn Entity>>, WorldError> {
        let cell = self.cell_for(entity.as_ref())?;
        self.stale = true;
        match self.slots.binary_search_by_key(&cell, |s| s.cell) {
            Ok(pos) => Ok(Some(std::mem::replace(&mut self.slots[pos].entity, entity))),
            Err(pos) => {
                self.slots.insert(pos, StaticSlot { cell, entity });
                Ok(None)
            }
        }
    }

    /// The cell a static entity would be indexed under.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::OutOfGrid`] for positions outside the grid and
    /// [`WorldError::StaticIdMismatch`] when the entity's identity is not
    /// that cell.
    pub fn cell_for(&self, entity: &dyn Entity) -> Result<u32, WorldError> {
        let p = entity.position();
        let cell = self
            .grid
            .world_index(p.x, p.y)
            .ok_or_else(|| WorldError::OutOfGrid {
                id: entity.id().to_string(),
                x: p.x,
                y: p.y,
            })?;
        if entity.id().cell() != Some(cell) {
            return Err(WorldError::StaticIdMismatch {
                id: entity.id().to_string(),
                cell,
            });
        }
        Ok(cell)
    }

    /// Remove the entity occupying `cell`.
    pub fn remove(&mut self, cell: u32) -> Option<Box<dyn Entity>> {
        let pos = self.position_of(cell)?;
        self.stale = true;
        Some(self.slots.remove(pos).entity)
    }

    /// Remove and return every entity.
    pub fn drain(&mut self) -> Vec<Box<dyn Entity>> {
        self.stale = true;
        self.slots.drain(..).map(|s| s.entity).collect()
    }

    /// Recompute the cell map and the column lookup from the ordered
    /// collection, then publish the new lookup.
    pub fn rebuild(&mut self) {
        let width = self.grid.width() as usize;
        let height = self.grid.height();

        let mut cells = HashMap::with_capacity(self.slots.len());
        // Slot `width + 1` is the implicit null that terminates the fill.
        let mut lookup: Vec<Option<LookupEntry>> = vec![None; width + 1];

        // Slots are sorted by `col * height + row`, so the first slot seen in
        // a column holds that column's minimum row.
        for (index, slot) in self.slots.iter().enumerate() {
            cells.insert(slot.cell, index);
            let col = (slot.cell / height) as usize;
            if lookup[col].is_none() {
                lookup[col] = Some(LookupEntry {
                    id: slot.entity.id().clone(),
                    row: slot.cell % height,
                    index,
                });
            }
        }

        // Backward fill: an empty column chains to the next non-empty one.
        for col in (0..width).rev() {
            if lookup[col].is_none() {
                lookup[col] = lookup[col + 1].clone();
            }
        }

        self.cells = cells;
        self.lookup = Arc::from(lookup);
        self.stale = false;
        debug!(
            statics = self.slots.len(),
            columns = width,
            "static index rebuilt"
        );
    }

    // -- queries ------------------------------------------------------------

    /// Snapshot of the column lookup, `width + 1` slots long.
    pub fn lookup(&self) -> Arc<[Option<LookupEntry>]> {
        Arc::clone(&self.lookup)
    }

    /// Lookup slot for a column, clamped to `[0, width]`.
    pub fn lookup_column(&self, col: i64) -> Option<&LookupEntry> {
        let col = col.clamp(0, self.grid.width() as i64) as usize;
        self.lookup.get(col).and_then(Option::as_ref)
    }

    /// Inclusive span of the ordered collection to draw for a column band.
    ///
    /// `from` is the lookup entry of `min_col` (or the first static), `to`
    /// is the lookup entry of `max_col` (or the last static). Returns `None`
    /// when there are no static entities.
    pub fn visible_range(&self, min_col: i64, max_col: i64) -> Option<(usize, usize)> {
        let last = self.slots.len().checked_sub(1)?;
        let from = self.lookup_column(min_col).map_or(0, |e| e.index);
        let to = self.lookup_column(max_col).map_or(last, |e| e.index);
        Some((from, to.min(last)))
    }

    pub fn get_by_cell(&self, cell: u32) -> Option<&dyn Entity> {
        self.position_of(cell).map(|pos| entity_ref(&self.slots[pos]))
    }

    pub fn get(&self, id: &EntityId) -> Option<&dyn Entity> {
        self.get_by_cell(id.cell()?)
            .filter(|e| e.id() == id)
    }

    /// Entity at a position in the ordered collection.
    pub fn at(&self, index: usize) -> Option<&dyn Entity> {
        self.slots.get(index).map(entity_ref)
    }

    /// Entities in `from..=to` of the ordered collection.
    pub fn range(&self, from: usize, to: usize) -> impl Iterator<Item = &dyn Entity> {
        let end = to.saturating_add(1).min(self.slots.len());
        let start = from.min(end);
        self.slots[start..end].iter().map(entity_ref)
    }

    /// All static entities in world-index order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Entity> {
        self.slots.iter().map(entity_ref)
    }

    /// World indices in collection order.
    pub fn cells(&self) -> impl Iterator<Item = u32> + '_ {
        self.slots.iter().map(|s| s.cell)
    }

    fn position_of(&self, cell: u32) -> Option<usize> {
        if self.stale {
            self.slots.binary_search_by_key(&cell, |s| s.cell).ok()
        } else {
            self.cells.get(&cell).copied()
        }
    }
}

impl std::fmt::Debug for StaticIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticIndex")
            .field("grid", &self.grid)
            .field("len", &self.slots.len())
            .field("stale", &self.stale)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::factory::{EntityFactory, SpawnArgs};

    fn grid() -> GridDims {
        GridDims::new(10, 5, 32, 32).unwrap()
    }

    fn tile(col: u32, row: u32) -> Box<dyn Entity> {
        let g = grid();
        let factory = EntityFactory::standard();
        let class = factory.class("brick").unwrap();
        let props = BTreeMap::new();
        class
            .build(SpawnArgs {
                class,
                id: EntityId::Cell(g.cell_index(col, row).unwrap()),
                origin: g.cell_origin(col, row),
                size: class.pixel_size(&g),
                facing: None,
                props: &props,
                input: None,
            })
            .unwrap()
    }

    fn index_with(cells: &[(u32, u32)]) -> StaticIndex {
        let mut index = StaticIndex::new(grid());
        for &(col, row) in cells {
            index.insert(tile(col, row)).unwrap();
        }
        index.rebuild();
        index
    }

    #[test]
    fn empty_index_has_all_null_lookup() {
        let index = StaticIndex::new(grid());
        assert_eq!(index.lookup().len(), 11);
        assert!(index.lookup().iter().all(Option::is_none));
        assert_eq!(index.visible_range(0, 10), None);
    }

    #[test]
    fn collection_is_ordered_by_world_index() {
        let index = index_with(&[(4, 1), (0, 3), (4, 0), (2, 2)]);
        let cells: Vec<u32> = index.cells().collect();
        assert_eq!(cells, vec![3, 12, 20, 21]);
    }

    #[test]
    fn lookup_picks_min_row_and_chains_rightward() {
        let index = index_with(&[(2, 4), (2, 1), (6, 0)]);
        let lookup = index.lookup();

        // Columns 0..=2 resolve to (2, 1), the lower row of column 2.
        for col in 0..=2 {
            let entry = lookup[col].as_ref().unwrap();
            assert_eq!(entry.id, EntityId::Cell(2 * 5 + 1));
            assert_eq!(entry.row, 1);
            assert_eq!(entry.index, 0);
        }
        // Columns 3..=6 chain to column 6.
        for col in 3..=6 {
            assert_eq!(lookup[col].as_ref().unwrap().index, 2);
        }
        // Nothing at or after column 7.
        for col in 7..=10 {
            assert!(lookup[col].is_none());
        }
    }

    #[test]
    fn visible_range_defaults_when_columns_resolve_to_nothing() {
        let index = index_with(&[(1, 0), (3, 0), (5, 0)]);
        assert_eq!(index.visible_range(2, 4), Some((1, 2)));
        // Max column past the last static: `to` falls back to count - 1.
        assert_eq!(index.visible_range(0, 8), Some((0, 2)));
        // Out-of-range columns are clamped.
        assert_eq!(index.visible_range(-4, 99), Some((0, 2)));
    }

    #[test]
    fn insert_replaces_same_cell() {
        let mut index = index_with(&[(1, 1)]);
        let old = index.insert(tile(1, 1)).unwrap();
        assert!(old.is_some());
        index.rebuild();
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn remove_by_cell_before_and_after_rebuild() {
        let mut index = index_with(&[(1, 1), (2, 2)]);
        assert!(index.remove(99).is_none());
        assert!(index.remove(6).is_some());
        // Still findable while stale.
        assert!(index.get_by_cell(12).is_some());
        index.rebuild();
        assert!(index.get_by_cell(12).is_some());
        assert!(index.get_by_cell(6).is_none());
        assert_eq!(index.lookup()[0].as_ref().unwrap().id, EntityId::Cell(12));
    }

    #[test]
    fn old_lookup_snapshot_survives_rebuild() {
        let mut index = index_with(&[(1, 1)]);
        let before = index.lookup();
        index.insert(tile(0, 0)).unwrap();
        index.rebuild();
        assert_eq!(before[0].as_ref().unwrap().id, EntityId::Cell(6));
        assert_eq!(index.lookup()[0].as_ref().unwrap().id, EntityId::Cell(0));
    }

    #[test]
    fn range_is_inclusive_and_bounded() {
        let index = index_with(&[(0, 0), (1, 0), (2, 0)]);
        assert_eq!(index.range(1, 2).count(), 2);
        assert_eq!(index.range(0, 99).count(), 3);
        assert_eq!(index.range(5, 9).count(), 0);
    }
}
