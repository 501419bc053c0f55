//! Engine configuration file.
//!
//! A JSON document naming the world to load and how to run it. Every field
//! has a default, so `{}` plus a `world` path is a valid config:
//!
//! ```json
//! {
//!   "world": "levels/1-1.json",
//!   "tick": { "fixed_dt": 0.016666666666666666, "headless": true },
//!   "cull": { "margin_tiles": 3 },
//!   "ticks": 600,
//!   "script": [ { "tick": 0, "edit": { "op": "press", "action": "right" } } ]
//! }
//! ```
//!
//! Relative paths are resolved against the config file's directory.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use tessera_world::prelude::*;

use crate::tick::{Edit, TickConfig};
use crate::EngineError;

/// An edit to queue before a given tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledEdit {
    pub tick: u64,
    pub edit: Edit,
}

fn default_log_filter() -> String {
    "info".to_owned()
}

fn default_ticks() -> u64 {
    600
}

fn default_checkpoint_interval() -> u64 {
    60
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub tick: TickConfig,
    pub cull: CullConfig,
    /// World descriptor to load.
    pub world: PathBuf,
    /// `tracing` filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    /// Ticks to run.
    #[serde(default = "default_ticks")]
    pub ticks: u64,
    /// Checkpoint spacing for recorded edit logs. 0 checkpoints every tick.
    #[serde(default = "default_checkpoint_interval")]
    pub checkpoint_interval: u64,
    /// Where to write a hashed save after the run.
    pub save_to: Option<PathBuf>,
    /// Where to write the recorded edit log after the run.
    pub record_to: Option<PathBuf>,
    pub script: Vec<ScheduledEdit>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick: TickConfig::default(),
            cull: CullConfig::default(),
            world: PathBuf::from("world.json"),
            log_filter: default_log_filter(),
            ticks: default_ticks(),
            checkpoint_interval: default_checkpoint_interval(),
            save_to: None,
            record_to: None,
            script: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a config, resolving relative paths against
    /// `base`.
    pub fn from_json(json: &str, base: &Path) -> Result<Self, EngineError> {
        let mut config: EngineConfig = serde_json::from_str(json)?;
        for path in [
            Some(&mut config.world),
            config.save_to.as_mut(),
            config.record_to.as_mut(),
        ]
        .into_iter()
        .flatten()
        {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| EngineError::io(path, e))?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        let config = Self::from_json(&json, base)?;
        debug!(path = %path.display(), world = %config.world.display(), "config loaded");
        Ok(config)
    }

    /// # Errors
    ///
    /// [`EngineError::InvalidConfig`] for a bad tick config or a scripted
    /// edit scheduled past the last tick.
    pub fn validate(&self) -> Result<(), EngineError> {
        self.tick.validate()?;
        if let Some(late) = self.script.iter().find(|s| s.tick >= self.ticks) {
            return Err(EngineError::InvalidConfig(format!(
                "edit scheduled at tick {} but only {} ticks run",
                late.tick, self.ticks
            )));
        }
        Ok(())
    }

    /// Load the configured world with this config's cull settings.
    pub fn load_world(&self, factory: std::sync::Arc<EntityFactory>) -> Result<World, EngineError> {
        let json = fs::read_to_string(&self.world).map_err(|e| EngineError::io(&self.world, e))?;
        let desc = WorldDescriptor::from_json(&json)?;
        Ok(World::from_descriptor(&desc, factory)?.with_cull_config(self.cull))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
