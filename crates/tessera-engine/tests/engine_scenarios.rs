//! End-to-end runs: config file on disk, world file, scripted edits, save,
//! restore on a fresh loop.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tessera_engine::prelude::*;

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("tessera-{name}-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn level() -> WorldDescriptor {
    let mut desc = WorldDescriptor::new(120, 12, 32, 32);
    desc.hero = Some("hero".into());
    for col in 0..120 {
        desc.entities
            .push(EntityDescriptor::new("ground", col as f64 * 32.0, 11.0 * 32.0));
    }
    desc.entities
        .push(EntityDescriptor::new("brick", 80.0 * 32.0, 10.0 * 32.0));
    desc.entities
        .push(EntityDescriptor::new("hero", 4.0 * 32.0, 9.0 * 32.0));
    desc.entities
        .push(EntityDescriptor::new("goomba", 30.0 * 32.0, 10.0 * 32.0));
    desc
}

#[test]
fn config_driven_run_saves_and_restores() {
    let dir = scratch_dir("run");
    fs::write(dir.join("level.json"), level().to_json().unwrap()).unwrap();
    fs::write(
        dir.join("engine.json"),
        r#"{
            "world": "level.json",
            "tick": { "headless": true },
            "ticks": 120,
            "save_to": "out.json",
            "script": [
                { "tick": 0, "edit": { "op": "press", "action": "right" } },
                { "tick": 10, "edit": { "op": "place", "class": "coin", "x": 320.0, "y": 64.0 } }
            ]
        }"#,
    )
    .unwrap();

    let config = EngineConfig::load(dir.join("engine.json")).unwrap();
    assert_eq!(config.world, dir.join("level.json"));

    let world = config
        .load_world(Arc::new(EntityFactory::standard()))
        .unwrap();
    let mut game = GameLoop::new(world, config.tick);
    for tick in 0..config.ticks {
        for s in config.script.iter().filter(|s| s.tick == tick) {
            game.queue_edit(s.edit.clone());
        }
        game.tick();
    }

    let hero = game.world().hero_id().unwrap();
    // 96 px/s for two seconds.
    let x = game.world().get(&hero).unwrap().bounds().x;
    assert!((x - (128.0 + 192.0)).abs() < 1e-6, "hero at {x}");
    assert!(game.world().get(&EntityId::Cell(10 * 12 + 2)).is_some());

    let save = game.capture_save().unwrap();
    save.write_to(config.save_to.as_ref().unwrap()).unwrap();
    let read = SaveFile::read_from(dir.join("out.json")).unwrap();

    let grid = GridDims::new(1, 1, 32, 32).unwrap();
    let blank = World::new(grid, Arc::new(EntityFactory::standard()));
    let mut resumed = GameLoop::new(blank, config.tick);
    resumed.restore(&read).unwrap();
    assert_eq!(resumed.state_hash().unwrap(), game.state_hash().unwrap());

    // Both continue identically: the held key was restored too.
    game.run_ticks(30);
    resumed.run_ticks(30);
    assert_eq!(resumed.state_hash().unwrap(), game.state_hash().unwrap());

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn camera_tracks_hero_through_the_loop() {
    let world = World::from_descriptor(&level(), Arc::new(EntityFactory::standard())).unwrap();
    let mut game = GameLoop::new(
        world,
        TickConfig {
            surface_width: 320.0,
            surface_height: 384.0,
            ..Default::default()
        },
    );
    game.world_mut().set_camera(Box::new(FollowCamera::new()));

    game.queue_edit(Edit::Press {
        action: Action::Right,
    });
    game.run_ticks(1600);

    let hero = game.world().hero_id().unwrap();
    let bounds = game.world().get(&hero).unwrap().bounds();
    // Stopped by the brick at column 80.
    assert!(bounds.right() <= 80.0 * 32.0);
    assert!(bounds.right() > 79.0 * 32.0);
    assert_eq!(game.world().pan().x, -(bounds.center().x - 160.0));

    // Pinned against the brick the pan stops changing, so the cached
    // background is reused. The goomba is long off screen.
    let frame = game.last_diagnostics().frame;
    assert!(!frame.background_redrawn);
    assert_eq!(frame.entities_drawn, 1);
}

#[test]
fn edit_mode_freezes_hero_until_play_resumes() {
    let world = World::from_descriptor(&level(), Arc::new(EntityFactory::standard())).unwrap();
    let mut game = GameLoop::new(world, TickConfig::default());
    let hero = game.world().hero_id().unwrap();

    game.queue_edit(Edit::SetMode {
        mode: WorldMode::Edit,
    });
    game.queue_edit(Edit::Press {
        action: Action::Right,
    });
    game.run_ticks(30);
    assert_eq!(game.world().get(&hero).unwrap().bounds().x, 128.0);
    assert!(game.world().needs_draw(&hero));

    game.queue_edit(Edit::SetMode {
        mode: WorldMode::Play,
    });
    game.run_ticks(30);
    assert!(game.world().get(&hero).unwrap().bounds().x > 128.0);
}

#[test]
fn resize_through_the_queue_reidentifies_tiles() {
    let world = World::from_descriptor(&level(), Arc::new(EntityFactory::standard())).unwrap();
    let mut game = GameLoop::new(world, TickConfig::default());
    game.queue_edit(Edit::Resize {
        width: 40,
        height: 14,
    });
    let applied = game.tick();
    assert!(applied[0].applied_successfully());

    // Ground at row 11 column 3 is now cell 3 * 14 + 11.
    let tile = game.world().get(&EntityId::Cell(3 * 14 + 11)).unwrap();
    assert_eq!(tile.name(), "ground");
    // Columns past 40, including the brick at 80, were dropped.
    assert_eq!(game.world().registry().statics().len(), 40);
    assert!(game.world().hero_id().is_some());
}
