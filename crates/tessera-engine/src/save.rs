//! Hashed save files.
//!
//! A [`SaveFile`] is the persisted world descriptor plus the loop state that
//! affects the simulation (tick counter, fixed dt, held input), sealed with a
//! BLAKE3 hex digest of their canonical JSON. The hash is recomputed and
//! checked before a save is restored, so a corrupted or hand-edited file is
//! rejected without touching the running loop.
//!
//! ```
//! use std::sync::Arc;
//! use tessera_engine::prelude::*;
//!
//! let grid = GridDims::new(20, 10, 32, 32).unwrap();
//! let world = World::new(grid, Arc::new(EntityFactory::standard()));
//! let mut game = GameLoop::new(world, TickConfig { headless: true, ..Default::default() });
//! game.queue_edit(Edit::Place { class: Some("brick".into()), x: 0.0, y: 0.0 });
//! game.run_ticks(10);
//!
//! let save = game.capture_save().unwrap();
//! assert_eq!(save.tick_counter, 10);
//! assert_eq!(save.hash.len(), 64);
//!
//! game.run_ticks(10);
//! game.restore(&save).unwrap();
//! assert_eq!(game.tick_count(), 10);
//! ```
//!
//! The save timestamp is excluded from the hash so that two captures of the
//! same state hash equal. Queued edits, diagnostics and telemetry are not
//! saved.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use tessera_world::prelude::*;

use crate::tick::GameLoop;
use crate::EngineError;

// ---------------------------------------------------------------------------
// SaveFile
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveFile {
    pub world: WorldDescriptor,
    /// Number of ticks executed at the time of capture.
    pub tick_counter: u64,
    pub fixed_dt: f64,
    /// Input actions held at the time of capture.
    #[serde(default)]
    pub held: Vec<Action>,
    /// BLAKE3 hex digest (64 lowercase hex chars) of everything above.
    pub hash: String,
}

/// BLAKE3 hex digest of the hashable save state.
pub(crate) fn compute_hash(
    world: &WorldDescriptor,
    tick_counter: u64,
    fixed_dt: f64,
    held: &[Action],
) -> Result<String, EngineError> {
    #[derive(Serialize)]
    struct HashableState<'a> {
        world: &'a WorldDescriptor,
        tick_counter: u64,
        fixed_dt: f64,
        held: &'a [Action],
    }

    let mut world = world.clone();
    world.saved_at = None;
    let hashable = HashableState {
        world: &world,
        tick_counter,
        fixed_dt,
        held,
    };
    let json_bytes = serde_json::to_vec(&hashable)?;
    Ok(blake3::hash(&json_bytes).to_hex().to_string())
}

impl SaveFile {
    /// Seal `world` and the loop state into a save.
    ///
    /// # Errors
    ///
    /// Fails only if the descriptor cannot be serialized.
    pub fn new(
        world: WorldDescriptor,
        tick_counter: u64,
        fixed_dt: f64,
        held: Vec<Action>,
    ) -> Result<Self, EngineError> {
        let hash = compute_hash(&world, tick_counter, fixed_dt, &held)?;
        Ok(Self {
            world,
            tick_counter,
            fixed_dt,
            held,
            hash,
        })
    }

    /// Recompute the hash and compare it with the recorded one.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::HashMismatch`] when they differ.
    pub fn verify(&self) -> Result<(), EngineError> {
        let computed = compute_hash(&self.world, self.tick_counter, self.fixed_dt, &self.held)?;
        if computed != self.hash {
            return Err(EngineError::HashMismatch {
                recorded: self.hash.clone(),
                computed,
            });
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a save without verifying it.
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), EngineError> {
        let path = path.as_ref();
        fs::write(path, self.to_json()?).map_err(|e| EngineError::io(path, e))?;
        info!(path = %path.display(), tick = self.tick_counter, "save written");
        Ok(())
    }

    /// Read and verify a save.
    ///
    /// # Errors
    ///
    /// I/O and JSON errors, and [`EngineError::HashMismatch`] for a save
    /// whose contents no longer match its hash.
    pub fn read_from(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| EngineError::io(path, e))?;
        let save = Self::from_json(&json)?;
        if let Err(e) = save.verify() {
            warn!(path = %path.display(), error = %e, "rejecting save");
            return Err(e);
        }
        Ok(save)
    }
}

// ---------------------------------------------------------------------------
// GameLoop save/restore methods
// ---------------------------------------------------------------------------

impl GameLoop {
    /// Capture the world and loop state as a sealed save.
    pub fn capture_save(&self) -> Result<SaveFile, EngineError> {
        SaveFile::new(
            self.world().to_descriptor(),
            self.tick_count(),
            self.fixed_dt(),
            self.input().held(),
        )
    }

    /// The hash a save captured now would carry.
    pub fn state_hash(&self) -> Result<String, EngineError> {
        compute_hash(
            &self.world().to_descriptor(),
            self.tick_count(),
            self.fixed_dt(),
            &self.input().held(),
        )
    }

    /// Restore the world and loop state from a save.
    ///
    /// The save is verified first; on any error the loop is unchanged.
    /// Queued edits are dropped. The world's factory, camera and cull
    /// settings are kept.
    pub fn restore(&mut self, save: &SaveFile) -> Result<(), EngineError> {
        if !(save.fixed_dt > 0.0 && save.fixed_dt.is_finite()) {
            return Err(EngineError::InvalidConfig(format!(
                "save has invalid fixed_dt: {}. Must be positive and finite.",
                save.fixed_dt
            )));
        }
        save.verify()?;

        self.world_mut().load(&save.world)?;
        self.input().set_held(&save.held);
        self.set_tick_counter(save.tick_counter);
        self.set_fixed_dt(save.fixed_dt);
        self.clear_pending();
        info!(tick = save.tick_counter, "save restored");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::tick::{Edit, TickConfig};

    fn game() -> GameLoop {
        let grid = GridDims::new(30, 12, 32, 32).unwrap();
        let mut world = World::new(grid, Arc::new(EntityFactory::standard()));
        world.set_hero(Some("hero".to_owned()));
        let mut game = GameLoop::new(
            world,
            TickConfig {
                headless: true,
                ..Default::default()
            },
        );
        for col in 0..10 {
            game.queue_edit(Edit::Place {
                class: Some("ground".into()),
                x: col as f64 * 32.0,
                y: 11.0 * 32.0,
            });
        }
        game.queue_edit(Edit::Place {
            class: Some("hero".into()),
            x: 64.0,
            y: 10.0 * 32.0,
        });
        game.tick();
        game
    }

    #[test]
    fn hash_is_stable_and_ignores_timestamp() {
        let game = game();
        let a = game.capture_save().unwrap();
        let mut b = game.capture_save().unwrap();
        b.world.saved_at = Some(0);
        assert_eq!(a.hash, b.hash);
        assert!(b.verify().is_ok());
        assert_eq!(game.state_hash().unwrap(), a.hash);
    }

    #[test]
    fn hash_covers_held_input_and_tick() {
        let mut game = game();
        let before = game.state_hash().unwrap();
        game.input().press(Action::Jump);
        assert_ne!(game.state_hash().unwrap(), before);
        game.input().release(Action::Jump);
        assert_eq!(game.state_hash().unwrap(), before);
        game.tick();
        assert_ne!(game.state_hash().unwrap(), before);
    }

    #[test]
    fn tampered_save_is_rejected_without_side_effects() {
        let mut game = game();
        let mut save = game.capture_save().unwrap();
        save.world.entities.pop();

        game.run_ticks(5);
        let err = game.restore(&save).unwrap_err();
        assert!(matches!(err, EngineError::HashMismatch { .. }));
        assert_eq!(game.tick_count(), 6);
        assert_eq!(game.world().entity_count(), 11);
    }

    #[test]
    fn invalid_dt_is_rejected_before_hashing() {
        let mut game = game();
        let mut save = game.capture_save().unwrap();
        save.fixed_dt = 0.0;
        assert!(matches!(
            game.restore(&save),
            Err(EngineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn restore_rewinds_world_tick_and_input() {
        let mut game = game();
        game.input().press(Action::Right);
        let save = game.capture_save().unwrap();
        let hero = game.world().hero_id().unwrap();
        let x = game.world().get(&hero).unwrap().bounds().x;

        game.run_ticks(20);
        game.queue_edit(Edit::Release {
            action: Action::Right,
        });
        game.restore(&save).unwrap();

        assert_eq!(game.tick_count(), 1);
        assert!(game.pending_edits().is_empty());
        assert_eq!(game.input().held(), vec![Action::Right]);
        assert_eq!(game.world().get(&hero).unwrap().bounds().x, x);
        assert_eq!(game.state_hash().unwrap(), save.hash);

        // The restored hero still reads the loop's input.
        game.tick();
        assert!(game.world().get(&hero).unwrap().bounds().x > x);
    }

    #[test]
    fn json_round_trip_preserves_hash() {
        let save = game().capture_save().unwrap();
        let back = SaveFile::from_json(&save.to_json().unwrap()).unwrap();
        assert_eq!(back, save);
        assert!(back.verify().is_ok());
    }

    #[test]
    fn files_are_verified_on_read() {
        let dir = std::env::temp_dir().join(format!("tessera-save-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("level.json");

        let save = game().capture_save().unwrap();
        save.write_to(&path).unwrap();
        assert_eq!(SaveFile::read_from(&path).unwrap(), save);

        let tampered = fs::read_to_string(&path)
            .unwrap()
            .replace("\"tick_counter\": 1", "\"tick_counter\": 2");
        fs::write(&path, tampered).unwrap();
        assert!(matches!(
            SaveFile::read_from(&path),
            Err(EngineError::HashMismatch { .. })
        ));

        assert!(matches!(
            SaveFile::read_from(dir.join("missing.json")),
            Err(EngineError::Io { .. })
        ));
        fs::remove_dir_all(&dir).unwrap();
    }
}
