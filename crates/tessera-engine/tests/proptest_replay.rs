//! Property tests for determinism: any edit script, recorded and replayed
//! from its initial save, reproduces every checkpoint.

use std::sync::Arc;

use proptest::prelude::*;
use tessera_engine::prelude::*;

fn game() -> GameLoop {
    let grid = GridDims::new(24, 10, 32, 32).unwrap();
    let mut world = World::new(grid, Arc::new(EntityFactory::standard()));
    world.set_hero(Some("hero".to_owned()));
    world.set_camera(Box::new(FollowCamera::new()));
    GameLoop::new(
        world,
        TickConfig {
            headless: true,
            surface_width: 256.0,
            surface_height: 320.0,
            ..Default::default()
        },
    )
}

fn edit_strategy() -> impl Strategy<Value = Edit> {
    let class = prop_oneof![
        Just(None),
        Just(Some("ground".to_owned())),
        Just(Some("brick".to_owned())),
        Just(Some("cloud".to_owned())),
        Just(Some("hero".to_owned())),
        Just(Some("goomba".to_owned())),
        Just(Some("coin".to_owned())),
    ];
    let action = prop_oneof![Just(Action::Left), Just(Action::Right), Just(Action::Jump)];
    prop_oneof![
        4 => (class, 0u32..24, 0u32..10).prop_map(|(class, col, row)| Edit::Place {
            class,
            x: col as f64 * 32.0 + 4.0,
            y: row as f64 * 32.0 + 4.0,
        }),
        2 => action.clone().prop_map(|action| Edit::Press { action }),
        2 => action.prop_map(|action| Edit::Release { action }),
        1 => (-400i32..0).prop_map(|x| Edit::Pan { x: x as f64, y: 0.0 }),
        1 => prop_oneof![Just(WorldMode::Play), Just(WorldMode::Edit)]
            .prop_map(|mode| Edit::SetMode { mode }),
    ]
}

/// A tick-indexed edit script over `0..ticks`.
fn script_strategy() -> impl Strategy<Value = Vec<(u64, Edit)>> {
    prop::collection::vec((0u64..60, edit_strategy()), 0..40)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn recorded_scripts_replay_without_divergence(
        script in script_strategy(),
        interval in 0u64..8,
    ) {
        let mut original = game();
        let mut recorder = EditRecorder::start(&original, interval).unwrap();
        for tick in 0..60u64 {
            for (_, edit) in script.iter().filter(|(t, _)| *t == tick) {
                original.queue_edit(edit.clone());
            }
            recorder.tick(&mut original).unwrap();
        }
        let log = recorder.finish();

        let mut replayed = game();
        let result = replay(&mut replayed, &log).unwrap();
        prop_assert!(result.completed, "diverged: {:?}", result.first_divergence);
        prop_assert_eq!(result.ticks_replayed, 60);
        prop_assert_eq!(replayed.state_hash().unwrap(), original.state_hash().unwrap());
    }

    #[test]
    fn save_restore_resumes_identically(
        script in script_strategy(),
        split in 1u64..59,
    ) {
        let mut a = game();
        for tick in 0..split {
            for (_, edit) in script.iter().filter(|(t, _)| *t == tick) {
                a.queue_edit(edit.clone());
            }
            a.tick();
        }
        let save = a.capture_save().unwrap();
        let mut b = game();
        b.restore(&save).unwrap();

        for tick in split..60 {
            for (_, edit) in script.iter().filter(|(t, _)| *t == tick) {
                a.queue_edit(edit.clone());
                b.queue_edit(edit.clone());
            }
            a.tick();
            b.tick();
        }
        prop_assert_eq!(a.state_hash().unwrap(), b.state_hash().unwrap());
    }
}
