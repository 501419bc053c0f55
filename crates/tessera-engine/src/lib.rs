//! Tessera Engine -- fixed-timestep driver around a [`tessera_world::World`].
//!
//! The world crate knows nothing about time or files. This crate adds the
//! simulation driver: a [`GameLoop`](tick::GameLoop) that applies queued
//! editor edits at the tick boundary, updates and draws the world at a fixed
//! time step, hashes its state for saves, and records and replays edit logs
//! to check determinism.
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use tessera_engine::prelude::*;
//!
//! let grid = GridDims::new(64, 19, 32, 32).unwrap();
//! let mut world = World::new(grid, Arc::new(EntityFactory::standard()));
//! world.set_hero(Some("hero".to_owned()));
//!
//! let mut game = GameLoop::new(world, TickConfig::default());
//! game.queue_edit(Edit::Place { class: Some("ground".into()), x: 0.0, y: 576.0 });
//! game.queue_edit(Edit::Place { class: Some("hero".into()), x: 0.0, y: 544.0 });
//! game.run_ticks(10);
//!
//! assert_eq!(game.tick_count(), 10);
//! assert_eq!(game.world().entity_count(), 2);
//! ```

#![deny(unsafe_code)]

use std::path::PathBuf;

use tessera_world::WorldError;

pub mod config;
pub mod logging;
pub mod replay;
pub mod save;
pub mod tick;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

/// Re-export the world crate for convenience.
pub use tessera_world;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by the engine layer.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A world operation failed.
    #[error(transparent)]
    World(#[from] WorldError),

    /// Reading or writing a file failed.
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A save, log or config file could not be (de)serialized.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A save's recorded hash does not match its contents.
    #[error(
        "save hash mismatch: recorded {recorded} but recomputed {computed}. \
         The save may be corrupted or tampered with."
    )]
    HashMismatch { recorded: String, computed: String },

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An edit log is malformed.
    #[error("invalid edit log: {0}")]
    InvalidReplay(String),
}

impl EngineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EngineError::Io {
            path: path.into(),
            source,
        }
    }
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common engine usage.
pub mod prelude {
    pub use tessera_world::prelude::*;

    pub use crate::config::{EngineConfig, ScheduledEdit};
    pub use crate::replay::{
        replay, EditLog, EditLogEntry, EditRecorder, ReplayDivergence, ReplayResult,
    };
    pub use crate::save::SaveFile;
    pub use crate::tick::{
        AppliedEdit, Edit, GameLoop, TelemetrySink, TickConfig, TickDiagnostics, TracingTelemetry,
    };
    pub use crate::EngineError;
}
