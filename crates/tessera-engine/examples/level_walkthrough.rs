//! Build a small level through the edit queue, walk the hero across it with
//! the camera following, then replay the recorded session and check it
//! reproduces the same state.
//!
//! Run with: `RUST_LOG=debug cargo run --example level_walkthrough`

use std::sync::Arc;

use tessera_engine::logging;
use tessera_engine::prelude::*;

const COLUMNS: u32 = 200;
const ROWS: u32 = 15;

fn new_loop() -> GameLoop {
    let grid = GridDims::new(1, 1, 32, 32).expect("valid grid");
    let world = World::new(grid, Arc::new(EntityFactory::standard()));
    let mut game = GameLoop::new(world, TickConfig::default());
    game.world_mut().set_camera(Box::new(FollowCamera::new()));
    game
}

fn main() -> Result<(), anyhow::Error> {
    logging::init("info");

    let mut game = new_loop();
    game.set_telemetry(Box::new(TracingTelemetry::new(120)));
    game.queue_edit(Edit::Resize {
        width: COLUMNS,
        height: ROWS,
    });
    game.queue_edit(Edit::SetHero {
        hero: Some("hero".into()),
    });
    game.tick();

    let mut recorder = EditRecorder::start(&game, 30)?;
    let floor = (ROWS - 1) as f64 * 32.0;
    for col in 0..COLUMNS {
        game.queue_edit(Edit::Place {
            class: Some("ground".into()),
            x: col as f64 * 32.0,
            y: floor,
        });
        if col % 17 == 5 {
            game.queue_edit(Edit::Place {
                class: Some("cloud".into()),
                x: col as f64 * 32.0,
                y: 64.0,
            });
        }
    }
    game.queue_edit(Edit::Place {
        class: Some("brick".into()),
        x: 150.0 * 32.0,
        y: floor - 32.0,
    });
    for col in [40.0, 90.0, 120.0] {
        game.queue_edit(Edit::Place {
            class: Some("goomba".into()),
            x: col * 32.0,
            y: floor - 32.0,
        });
    }
    game.queue_edit(Edit::Place {
        class: Some("hero".into()),
        x: 64.0,
        y: floor - 32.0,
    });
    game.queue_edit(Edit::Press {
        action: Action::Right,
    });

    for _ in 0..1200 {
        recorder.tick(&mut game)?;
    }
    let log = recorder.finish();

    let hero = game.world().hero_id().expect("hero placed");
    let bounds = game.world().get(&hero).expect("hero alive").bounds();
    println!("hero stopped at x = {:.1} (brick at {})", bounds.x, 150 * 32);
    println!("pan = {:?}", game.world().pan());
    println!("last frame: {:?}", game.last_diagnostics().frame);

    let mut other = new_loop();
    let result = replay(&mut other, &log)?;
    println!(
        "replayed {} ticks, {} checkpoints diverged",
        result.ticks_replayed,
        usize::from(result.first_divergence.is_some())
    );
    assert_eq!(other.state_hash()?, game.state_hash()?);
    Ok(())
}
