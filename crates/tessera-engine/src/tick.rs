//! Fixed-timestep game loop for deterministic simulation.
//!
//! The [`GameLoop`] drives a [`World`] forward. Each tick:
//!
//! 1. Edits queued since the last tick are applied in FIFO order. This is the
//!    only point at which the world is mutated from outside, so an edit can
//!    never land in the middle of an update or draw.
//! 2. The world is updated with the fixed time step against the configured
//!    surface size.
//! 3. Unless headless, the world is drawn onto the loop's recording surface.
//! 4. The tick counter advances and diagnostics are recorded.
//!
//! Input is held in an [`InputState`] owned by the loop and injected into the
//! world's hero. Key presses travel through the edit queue like any other
//! edit, so a recorded edit log reproduces a run exactly.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use tessera_engine::tick::{Edit, GameLoop, TickConfig};
//! use tessera_world::prelude::*;
//!
//! let grid = GridDims::new(20, 10, 32, 32).unwrap();
//! let world = World::new(grid, Arc::new(EntityFactory::standard()));
//! let mut game = GameLoop::new(world, TickConfig { headless: true, ..Default::default() });
//!
//! game.queue_edit(Edit::Place { class: Some("brick".into()), x: 64.0, y: 96.0 });
//! let applied = game.tick();
//! assert!(applied[0].applied_successfully());
//! assert_eq!(game.tick_count(), 1);
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use tessera_world::prelude::*;

use crate::EngineError;

// ---------------------------------------------------------------------------
// TickConfig
// ---------------------------------------------------------------------------

/// Configuration for the fixed-timestep game loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickConfig {
    /// Fixed time step in seconds per tick. Must be positive and finite.
    pub fixed_dt: f64,
    /// Headless mode: update only, never draw.
    pub headless: bool,
    /// Size of the surface the world is culled against and drawn onto.
    pub surface_width: f64,
    pub surface_height: f64,
}

impl Default for TickConfig {
    /// 60 Hz onto a 640x360 surface, headless off.
    fn default() -> Self {
        Self {
            fixed_dt: 1.0 / 60.0,
            headless: false,
            surface_width: 640.0,
            surface_height: 360.0,
        }
    }
}

impl TickConfig {
    pub fn surface(&self) -> Size {
        Size::new(self.surface_width, self.surface_height)
    }

    /// Check the values [`GameLoop::new`] would otherwise panic on.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] for a non-positive or
    /// non-finite `fixed_dt` or surface dimension.
    pub fn validate(&self) -> Result<(), EngineError> {
        if !(self.fixed_dt > 0.0 && self.fixed_dt.is_finite()) {
            return Err(EngineError::InvalidConfig(format!(
                "fixed_dt must be positive and finite, got {}",
                self.fixed_dt
            )));
        }
        let (w, h) = (self.surface_width, self.surface_height);
        if !(w > 0.0 && w.is_finite() && h > 0.0 && h.is_finite()) {
            return Err(EngineError::InvalidConfig(format!(
                "surface must be positive and finite, got {w}x{h}"
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Edit
// ---------------------------------------------------------------------------

/// A mutation of the world requested from outside the loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Edit {
    /// An editor click at pixel `(x, y)`. `class: None` erases.
    Place {
        class: Option<String>,
        x: f64,
        y: f64,
    },
    Remove {
        id: EntityId,
    },
    Pan {
        x: f64,
        y: f64,
    },
    SetMode {
        mode: WorldMode,
    },
    SetHero {
        hero: Option<String>,
    },
    SetBackground {
        color: Color,
        #[serde(default)]
        image: Option<ImageHandle>,
    },
    Resize {
        width: u32,
        height: u32,
    },
    Press {
        action: Action,
    },
    Release {
        action: Action,
    },
}

/// An edit after it was applied.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedEdit {
    pub edit: Edit,
    /// The entity the edit placed, flipped or removed, if any.
    pub entity: Option<EntityId>,
    /// Why the edit failed. The world is unchanged in that case.
    pub error: Option<String>,
}

impl AppliedEdit {
    pub fn applied_successfully(&self) -> bool {
        self.error.is_none()
    }
}

// ---------------------------------------------------------------------------
// TickDiagnostics
// ---------------------------------------------------------------------------

/// Measurements for the last tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickDiagnostics {
    /// The tick these measurements belong to (1 for the first tick).
    pub tick: u64,
    pub frame: FrameStats,
    pub edits_applied: usize,
    pub edit_errors: usize,
    /// Total time for the tick (edits + update + draw).
    pub total_time: Duration,
}

// ---------------------------------------------------------------------------
// Telemetry
// ---------------------------------------------------------------------------

/// Receives diagnostics after every tick.
pub trait TelemetrySink: Send {
    fn record(&mut self, diagnostics: &TickDiagnostics);
}

/// Emits every `every`-th tick's diagnostics as a `tracing` event.
#[derive(Debug, Clone)]
pub struct TracingTelemetry {
    every: u64,
}

impl TracingTelemetry {
    pub fn new(every: u64) -> Self {
        Self {
            every: every.max(1),
        }
    }
}

impl Default for TracingTelemetry {
    fn default() -> Self {
        Self::new(60)
    }
}

impl TelemetrySink for TracingTelemetry {
    fn record(&mut self, d: &TickDiagnostics) {
        if d.tick % self.every != 0 {
            return;
        }
        info!(
            tick = d.tick,
            update_us = d.frame.update_time.as_micros() as u64,
            draw_us = d.frame.draw_time.as_micros() as u64,
            tiles_drawn = d.frame.tiles_drawn,
            entities_drawn = d.frame.entities_drawn,
            active = d.frame.active_entities,
            edits = d.edits_applied,
            "tick"
        );
    }
}

// ---------------------------------------------------------------------------
// GameLoop
// ---------------------------------------------------------------------------

/// The deterministic fixed-timestep game loop.
///
/// # Determinism Guarantee
///
/// Given the same initial world and the same edits queued before the same
/// ticks, the loop produces identical world states. Edits apply in FIFO
/// order at the tick boundary, input only changes through edits, and
/// simulation time is `tick_count * fixed_dt` rather than an accumulation.
pub struct GameLoop {
    world: World,
    surface: RecordingSurface,
    config: TickConfig,
    tick_counter: u64,
    pending: Vec<Edit>,
    input: Arc<InputState>,
    last_diagnostics: TickDiagnostics,
    telemetry: Option<Box<dyn TelemetrySink>>,
}

impl GameLoop {
    /// Create a loop around `world` and hand its input state to the hero.
    ///
    /// # Panics
    ///
    /// Panics if `fixed_dt` is not positive and finite, or the surface is
    /// empty. Use [`TickConfig::validate`] to check untrusted configs first.
    pub fn new(mut world: World, config: TickConfig) -> Self {
        assert!(
            config.fixed_dt > 0.0 && config.fixed_dt.is_finite(),
            "fixed_dt must be positive and finite, got {}",
            config.fixed_dt
        );
        assert!(
            config.validate().is_ok(),
            "surface must be positive and finite, got {}x{}",
            config.surface_width,
            config.surface_height
        );
        let input = Arc::new(InputState::new());
        world.set_input(input.clone());
        Self {
            world,
            surface: RecordingSurface::new(config.surface()),
            config,
            tick_counter: 0,
            pending: Vec::new(),
            input,
            last_diagnostics: TickDiagnostics::default(),
            telemetry: None,
        }
    }

    /// Queue an edit for the start of the next tick.
    pub fn queue_edit(&mut self, edit: Edit) {
        self.pending.push(edit);
    }

    /// Edits queued for the next tick, in application order.
    pub fn pending_edits(&self) -> &[Edit] {
        &self.pending
    }

    /// Execute one tick. Returns the edits applied at its start.
    pub fn tick(&mut self) -> Vec<AppliedEdit> {
        let tick_start = Instant::now();

        let edits = std::mem::take(&mut self.pending);
        let applied: Vec<AppliedEdit> = edits.into_iter().map(|e| self.apply(e)).collect();
        let edit_errors = applied.iter().filter(|a| !a.applied_successfully()).count();

        let surface = self.config.surface();
        self.world.update(self.config.fixed_dt, surface);
        if !self.config.headless {
            self.surface.reset(surface);
            self.world.draw(&mut self.surface);
        }

        self.tick_counter += 1;
        self.last_diagnostics = TickDiagnostics {
            tick: self.tick_counter,
            frame: *self.world.stats(),
            edits_applied: applied.len() - edit_errors,
            edit_errors,
            total_time: tick_start.elapsed(),
        };
        if let Some(sink) = self.telemetry.as_mut() {
            sink.record(&self.last_diagnostics);
        }
        applied
    }

    /// Run `count` ticks. Returns the number of edits that failed.
    pub fn run_ticks(&mut self, count: u64) -> usize {
        let mut failed = 0;
        for _ in 0..count {
            failed += self
                .tick()
                .iter()
                .filter(|a| !a.applied_successfully())
                .count();
        }
        failed
    }

    fn apply(&mut self, edit: Edit) -> AppliedEdit {
        let result = match &edit {
            Edit::Place { class, x, y } => self.world.place(class.as_deref(), *x, *y),
            Edit::Remove { id } => Ok(self.world.remove(id).map(|_| id.clone())),
            Edit::Pan { x, y } => {
                self.world.set_pan(Point::new(*x, *y));
                Ok(None)
            }
            Edit::SetMode { mode } => {
                self.world.set_mode(*mode);
                Ok(None)
            }
            Edit::SetHero { hero } => {
                self.world.set_hero(hero.clone());
                Ok(self.world.hero_id())
            }
            Edit::SetBackground { color, image } => {
                self.world.set_background(*color, image.clone());
                Ok(None)
            }
            Edit::Resize { width, height } => self.world.resize(*width, *height).map(|()| None),
            Edit::Press { action } => {
                self.input.press(*action);
                Ok(None)
            }
            Edit::Release { action } => {
                self.input.release(*action);
                Ok(None)
            }
        };
        match result {
            Ok(entity) => {
                debug!(?edit, ?entity, "edit applied");
                AppliedEdit {
                    edit,
                    entity,
                    error: None,
                }
            }
            Err(e) => {
                warn!(?edit, error = %e, "edit rejected");
                AppliedEdit {
                    edit,
                    entity: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    // -- accessors ----------------------------------------------------------

    pub fn tick_count(&self) -> u64 {
        self.tick_counter
    }

    /// The current simulation time in seconds, computed as
    /// `tick_count * fixed_dt`.
    pub fn sim_time(&self) -> f64 {
        self.tick_counter as f64 * self.config.fixed_dt
    }

    pub fn fixed_dt(&self) -> f64 {
        self.config.fixed_dt
    }

    pub fn config(&self) -> &TickConfig {
        &self.config
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Mutable access to the world.
    ///
    /// Meant for setup and tests. Edits made here bypass the queue and are
    /// not captured by an edit recorder.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// What the last non-headless tick drew.
    pub fn surface(&self) -> &RecordingSurface {
        &self.surface
    }

    pub fn last_diagnostics(&self) -> &TickDiagnostics {
        &self.last_diagnostics
    }

    pub fn is_headless(&self) -> bool {
        self.config.headless
    }

    /// The input state the hero reads.
    pub fn input(&self) -> &Arc<InputState> {
        &self.input
    }

    pub fn set_telemetry(&mut self, sink: Box<dyn TelemetrySink>) {
        self.telemetry = Some(sink);
    }

    // -- restore helpers ----------------------------------------------------

    pub(crate) fn set_tick_counter(&mut self, tick: u64) {
        self.tick_counter = tick;
    }

    pub(crate) fn set_fixed_dt(&mut self, dt: f64) {
        assert!(
            dt > 0.0 && dt.is_finite(),
            "fixed_dt must be positive and finite, got {dt}"
        );
        self.config.fixed_dt = dt;
    }

    pub(crate) fn clear_pending(&mut self) {
        self.pending.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
