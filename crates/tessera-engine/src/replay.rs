//! Deterministic replay of recorded edits with checkpoint verification.
//!
//! An [`EditRecorder`] captures the edits queued before each tick together
//! with periodic state-hash checkpoints, producing an [`EditLog`]. Replaying
//! the log restores its initial save on a loop, re-queues the recorded edits
//! tick by tick, and compares state hashes at each checkpoint.
//!
//! # Recording
//!
//! ```
//! use std::sync::Arc;
//! use tessera_engine::prelude::*;
//!
//! let grid = GridDims::new(20, 10, 32, 32).unwrap();
//! let world = World::new(grid, Arc::new(EntityFactory::standard()));
//! let mut game = GameLoop::new(world, TickConfig { headless: true, ..Default::default() });
//!
//! let mut recorder = EditRecorder::start(&game, 10).unwrap();
//! for tick in 0..50u32 {
//!     if tick % 7 == 0 {
//!         game.queue_edit(Edit::Place { class: Some("goomba".into()), x: tick as f64 * 8.0, y: 0.0 });
//!     }
//!     recorder.tick(&mut game).unwrap();
//! }
//! let log = recorder.finish();
//!
//! // Replay on a second loop built from the same factory.
//! let grid = GridDims::new(1, 1, 32, 32).unwrap();
//! let world = World::new(grid, Arc::new(EntityFactory::standard()));
//! let mut other = GameLoop::new(world, TickConfig { headless: true, ..Default::default() });
//! let result = replay(&mut other, &log).unwrap();
//! assert!(result.completed);
//! assert!(result.first_divergence.is_none());
//! assert_eq!(other.state_hash().unwrap(), game.state_hash().unwrap());
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::save::SaveFile;
use crate::tick::{AppliedEdit, Edit, GameLoop};
use crate::EngineError;

// ---------------------------------------------------------------------------
// EditLog
// ---------------------------------------------------------------------------

/// A complete recording: the initial save plus the ordered edits and
/// checkpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditLog {
    /// Replay begins by restoring this save.
    pub initial: SaveFile,
    /// Number of ticks recorded. Replay executes exactly this many ticks
    /// from the initial save's tick.
    pub total_ticks: u64,
    pub entries: Vec<EditLogEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EditLogEntry {
    /// Edits queued before the given tick executed.
    Edits { tick: u64, edits: Vec<Edit> },
    /// State hash taken before the given tick executed.
    Checkpoint { tick: u64, state_hash: String },
}

impl EditLog {
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), EngineError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|e| EngineError::io(path, e))?;
        info!(path = %path.display(), ticks = self.total_ticks, "edit log written");
        Ok(())
    }

    pub fn read_from(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| EngineError::io(path, e))?;
        Ok(serde_json::from_str(&json)?)
    }
}

// ---------------------------------------------------------------------------
// ReplayResult
// ---------------------------------------------------------------------------

/// The outcome of replaying an [`EditLog`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayResult {
    /// Whether every recorded tick was replayed without divergence.
    pub completed: bool,
    pub ticks_replayed: u64,
    /// The first checkpoint whose hash did not match. `None` if all matched.
    pub first_divergence: Option<ReplayDivergence>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayDivergence {
    pub tick: u64,
    pub expected_hash: String,
    pub actual_hash: String,
}

// ---------------------------------------------------------------------------
// EditRecorder
// ---------------------------------------------------------------------------

/// Records a run into an [`EditLog`].
///
/// Ticks must be recorded in strictly increasing order.
pub struct EditRecorder {
    log: EditLog,
    /// How often (in ticks) to take a checkpoint. 0 checkpoints every tick.
    checkpoint_interval: u64,
    ticks_recorded: u64,
    last_tick: Option<u64>,
}

impl EditRecorder {
    pub fn new(initial: SaveFile, checkpoint_interval: u64) -> Self {
        Self {
            log: EditLog {
                initial,
                total_ticks: 0,
                entries: Vec::new(),
            },
            checkpoint_interval,
            ticks_recorded: 0,
            last_tick: None,
        }
    }

    /// Start recording from the loop's current state.
    pub fn start(game: &GameLoop, checkpoint_interval: u64) -> Result<Self, EngineError> {
        Ok(Self::new(game.capture_save()?, checkpoint_interval))
    }

    fn wants_checkpoint(&self, tick: u64) -> bool {
        self.checkpoint_interval == 0 || tick % self.checkpoint_interval == 0
    }

    /// Record one tick's edits and, when provided and due, its hash.
    ///
    /// # Panics
    ///
    /// Panics if `tick` is not strictly greater than the previous one.
    pub fn record_tick(&mut self, tick: u64, edits: &[Edit], state_hash: Option<String>) {
        if let Some(prev) = self.last_tick {
            assert!(
                tick > prev,
                "EditRecorder::record_tick: tick {tick} is not strictly greater than previous tick {prev}"
            );
        }
        self.last_tick = Some(tick);
        self.ticks_recorded += 1;

        if !edits.is_empty() {
            self.log.entries.push(EditLogEntry::Edits {
                tick,
                edits: edits.to_vec(),
            });
        }
        if let Some(state_hash) = state_hash.filter(|_| self.wants_checkpoint(tick)) {
            self.log
                .entries
                .push(EditLogEntry::Checkpoint { tick, state_hash });
        }
    }

    /// Record the loop's pending edits and a due checkpoint, then tick it.
    pub fn tick(&mut self, game: &mut GameLoop) -> Result<Vec<AppliedEdit>, EngineError> {
        let tick = game.tick_count();
        let hash = if self.wants_checkpoint(tick) {
            Some(game.state_hash()?)
        } else {
            None
        };
        self.record_tick(tick, game.pending_edits(), hash);
        Ok(game.tick())
    }

    pub fn finish(mut self) -> EditLog {
        self.log.total_ticks = self.ticks_recorded;
        self.log
    }
}

// ---------------------------------------------------------------------------
// replay()
// ---------------------------------------------------------------------------

/// Replay `log` on `game`, verifying every checkpoint.
///
/// Replay stops at the first divergence. The log is validated before the
/// loop is touched.
///
/// # Errors
///
/// [`EngineError::InvalidReplay`] for duplicate entries or a tick range that
/// overflows, and any error from restoring the initial save.
pub fn replay(game: &mut GameLoop, log: &EditLog) -> Result<ReplayResult, EngineError> {
    let mut edit_map: BTreeMap<u64, &[Edit]> = BTreeMap::new();
    let mut checkpoint_map: BTreeMap<u64, &str> = BTreeMap::new();
    for entry in &log.entries {
        match entry {
            EditLogEntry::Edits { tick, edits } => {
                if edit_map.insert(*tick, edits).is_some() {
                    return Err(EngineError::InvalidReplay(format!(
                        "duplicate Edits entry at tick {tick}"
                    )));
                }
            }
            EditLogEntry::Checkpoint { tick, state_hash } => {
                if checkpoint_map.insert(*tick, state_hash).is_some() {
                    return Err(EngineError::InvalidReplay(format!(
                        "duplicate Checkpoint entry at tick {tick}"
                    )));
                }
            }
        }
    }

    let start_tick = log.initial.tick_counter;
    let end_tick = start_tick.checked_add(log.total_ticks).ok_or_else(|| {
        EngineError::InvalidReplay(format!(
            "tick range overflow: {start_tick} + {} exceeds u64::MAX",
            log.total_ticks
        ))
    })?;

    game.restore(&log.initial)?;

    let mut ticks_replayed = 0;
    for tick in start_tick..end_tick {
        if let Some(&expected) = checkpoint_map.get(&tick) {
            let actual = game.state_hash()?;
            if actual != expected {
                warn!(tick, expected, actual = %actual, "replay diverged");
                return Ok(ReplayResult {
                    completed: false,
                    ticks_replayed,
                    first_divergence: Some(ReplayDivergence {
                        tick,
                        expected_hash: expected.to_owned(),
                        actual_hash: actual,
                    }),
                });
            }
        }
        for edit in edit_map.get(&tick).copied().unwrap_or_default() {
            game.queue_edit(edit.clone());
        }
        game.tick();
        ticks_replayed += 1;
    }

    info!(ticks = ticks_replayed, "replay completed");
    Ok(ReplayResult {
        completed: true,
        ticks_replayed,
        first_divergence: None,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
