//! Property tests for the static index and the placement protocol.
//!
//! Random layouts and random click sequences are generated and the index and
//! identity invariants are checked after each one.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use proptest::prelude::*;
use tessera_world::prelude::*;

const TILE: f64 = 32.0;

fn world(width: u32, height: u32) -> World {
    let grid = GridDims::new(width, height, 32, 32).unwrap();
    let mut world = World::new(grid, Arc::new(EntityFactory::standard()));
    world.set_hero(Some("hero".to_owned()));
    world
}

fn click(col: u32, row: u32) -> (f64, f64) {
    (col as f64 * TILE + 1.0, row as f64 * TILE + 1.0)
}

/// A grid size plus a set of distinct cells inside it.
fn layout() -> impl Strategy<Value = (u32, u32, BTreeSet<(u32, u32)>)> {
    (1u32..40, 1u32..20).prop_flat_map(|(w, h)| {
        (
            Just(w),
            Just(h),
            prop::collection::btree_set((0..w, 0..h), 0..80),
        )
    })
}

/// One editor click.
#[derive(Debug, Clone)]
struct Click {
    candidate: Option<&'static str>,
    col: u32,
    row: u32,
}

fn click_strategy() -> impl Strategy<Value = Click> {
    let candidate = prop_oneof![
        Just(None),
        Just(Some("brick")),
        Just(Some("cloud")),
        Just(Some("goomba")),
        Just(Some("hero")),
        Just(Some("coin")),
    ];
    (candidate, 0u32..20, 0u32..10).prop_map(|(candidate, col, row)| Click { candidate, col, row })
}

/// A click, a direct insertion of a character, or a change of hero name.
#[derive(Debug, Clone)]
enum EditorOp {
    Click(Click),
    Add { class: &'static str, ordinal: u32, col: u32 },
    SetHero(&'static str),
}

fn editor_op_strategy() -> impl Strategy<Value = EditorOp> {
    let character = prop_oneof![Just("hero"), Just("goomba")];
    prop_oneof![
        4 => click_strategy().prop_map(EditorOp::Click),
        2 => (character.clone(), 1u32..4, 0u32..20)
            .prop_map(|(class, ordinal, col)| EditorOp::Add { class, ordinal, col }),
        1 => character.prop_map(EditorOp::SetHero),
    ]
}

fn add_character(world: &mut World, class: &str, ordinal: u32, col: u32) {
    let factory = Arc::clone(world.factory());
    let class = factory.class(class).unwrap();
    let props = BTreeMap::new();
    let entity = class
        .build(SpawnArgs {
            class,
            id: EntityId::named(class.name.as_str(), ordinal),
            origin: Point::new(col as f64 * TILE, 0.0),
            size: class.pixel_size(world.grid()),
            facing: class.default_facing,
            props: &props,
            input: None,
        })
        .unwrap();
    world.add(entity).unwrap();
}

fn assert_identity_invariants(world: &World) -> Result<(), TestCaseError> {
    if let Some(hero) = world.hero() {
        let heroes = world.registry().ids_named(hero);
        prop_assert!(heroes.len() <= 1, "more than one {hero}: {heroes:?}");
    }

    let mut seen = HashSet::new();
    for entity in world.registry().iter_dynamic() {
        let id = entity.id().clone();
        if let EntityId::Named { ordinal, .. } = &id {
            prop_assert!(*ordinal > 0);
        }
        prop_assert!(seen.insert(id.to_string()), "duplicate id {id}");
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn lookup_orders_columns_and_chains_rightward((w, h, cells) in layout()) {
        let mut world = world(w, h);
        for &(col, row) in &cells {
            let (x, y) = click(col, row);
            world.place(Some("brick"), x, y).unwrap();
        }
        let lookup = world.registry().statics().lookup();
        prop_assert_eq!(lookup.len(), w as usize + 1);
        prop_assert!(lookup[w as usize].is_none());

        let occupied: BTreeSet<u32> = cells.iter().map(|&(c, _)| c).collect();
        for c in 0..w as usize {
            if occupied.contains(&(c as u32)) {
                let min_row = cells.iter().filter(|&&(col, _)| col as usize == c).map(|&(_, r)| r).min();
                prop_assert_eq!(lookup[c].as_ref().map(|e| e.row), min_row);
            } else {
                prop_assert_eq!(&lookup[c], &lookup[c + 1]);
            }
        }

        for c1 in 0..w as usize {
            for c2 in c1 + 1..=w as usize {
                if let (Some(a), Some(b)) = (&lookup[c1], &lookup[c2]) {
                    prop_assert!(a.index <= b.index);
                }
            }
        }
    }

    #[test]
    fn reset_is_idempotent((w, h, cells) in layout(), goombas in 0usize..6) {
        let mut descriptors: Vec<EntityDescriptor> = cells
            .iter()
            .map(|&(col, row)| EntityDescriptor::new("ground", col as f64 * TILE, row as f64 * TILE))
            .collect();
        for i in 0..goombas {
            descriptors.push(EntityDescriptor::new("goomba", i as f64 * 7.0, 0.0));
        }

        let mut world = world(w, h);
        world.reset_from_descriptors(&descriptors).unwrap();
        let lookup = world.registry().statics().lookup().to_vec();
        let members: Vec<EntityId> = world.registry().iter().map(|e| e.id().clone()).collect();

        world.reset_from_descriptors(&descriptors).unwrap();
        prop_assert_eq!(world.registry().statics().lookup().to_vec(), lookup);
        let again: Vec<EntityId> = world.registry().iter().map(|e| e.id().clone()).collect();
        prop_assert_eq!(again, members);
        prop_assert_eq!(world.registry().statics().len(), cells.len());
        prop_assert_eq!(world.registry().dynamics().len(), goombas);
    }

    #[test]
    fn random_clicks_keep_hero_singleton_and_unique_ids(
        clicks in prop::collection::vec(click_strategy(), 1..60)
    ) {
        let mut world = world(20, 10);
        for Click { candidate, col, row } in clicks {
            let (x, y) = click(col, row);
            world.place(candidate, x, y).unwrap();
            assert_identity_invariants(&world)?;
        }
    }

    #[test]
    fn hero_singleton_survives_direct_adds_and_renames(
        ops in prop::collection::vec(editor_op_strategy(), 1..60)
    ) {
        let mut world = world(20, 10);
        for op in ops {
            match op {
                EditorOp::Click(Click { candidate, col, row }) => {
                    let (x, y) = click(col, row);
                    world.place(candidate, x, y).unwrap();
                }
                EditorOp::Add { class, ordinal, col } => add_character(&mut world, class, ordinal, col),
                EditorOp::SetHero(name) => world.set_hero(Some(name.to_owned())),
            }
            assert_identity_invariants(&world)?;
        }
    }

    #[test]
    fn facingless_candidate_toggles_off_on_second_click(col in 0u32..20, row in 0u32..10) {
        for class in ["brick", "cloud", "coin"] {
            let mut world = world(20, 10);
            let (x, y) = click(col, row);
            let placed = world.place(Some(class), x, y).unwrap();
            prop_assert!(placed.is_some());
            prop_assert_eq!(world.place(Some(class), x, y).unwrap(), None);
            prop_assert_eq!(world.entity_count(), 0);
        }
    }

    #[test]
    fn placed_tiles_have_column_major_identity(col in 0u32..64, row in 0u32..19) {
        let mut world = world(64, 19);
        let (x, y) = click(col, row);
        let id = world.place(Some("block"), x, y).unwrap();
        prop_assert_eq!(id, Some(EntityId::Cell(col * 19 + row)));
        prop_assert_eq!(world.grid().world_index(x, y), Some(col * 19 + row));
    }
}
