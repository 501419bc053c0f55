//! `tessera` -- run a world from an engine config.
//!
//! ```text
//! tessera <config.json> [--ticks N]
//! ```
//!
//! Loads the configured world, runs the configured number of ticks while
//! queueing scripted edits, prints a summary, and optionally writes a hashed
//! save and the recorded edit log.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use tessera_engine::logging;
use tessera_engine::prelude::*;

#[derive(Parser)]
#[command(name = "tessera")]
#[command(about = "Run a tile world from an engine config")]
struct Cli {
    /// Engine config file (JSON)
    config: PathBuf,

    /// Override the configured number of ticks
    #[arg(long)]
    ticks: Option<u64>,
}

fn main() -> Result<(), anyhow::Error> {
    let args = Cli::parse();
    let mut config = EngineConfig::load(&args.config)
        .with_context(|| format!("loading config {}", args.config.display()))?;
    if let Some(ticks) = args.ticks {
        config.ticks = ticks;
        config.validate()?;
    }
    logging::init(&config.log_filter);

    let world = config
        .load_world(Arc::new(EntityFactory::standard()))
        .with_context(|| format!("loading world {}", config.world.display()))?;
    let mut game = GameLoop::new(world, config.tick);
    game.world_mut().set_camera(Box::new(FollowCamera::new()));
    game.set_telemetry(Box::new(TracingTelemetry::default()));

    let mut recorder = match config.record_to {
        Some(_) => Some(EditRecorder::start(&game, config.checkpoint_interval)?),
        None => None,
    };

    let mut script = config.script.clone();
    script.sort_by_key(|s| s.tick);
    let mut script = script.into_iter().peekable();

    info!(ticks = config.ticks, headless = config.tick.headless, "running");
    let mut edit_errors = 0;
    let mut peak_update = std::time::Duration::ZERO;
    for tick in 0..config.ticks {
        while let Some(scheduled) = script.next_if(|s| s.tick == tick) {
            game.queue_edit(scheduled.edit);
        }
        let applied = match recorder.as_mut() {
            Some(recorder) => recorder.tick(&mut game)?,
            None => game.tick(),
        };
        edit_errors += applied.iter().filter(|a| !a.applied_successfully()).count();
        peak_update = peak_update.max(game.last_diagnostics().frame.update_time);
    }

    let d = game.last_diagnostics();
    println!("ticks:          {}", game.tick_count());
    println!("sim time:       {:.3}s", game.sim_time());
    println!("entities:       {}", game.world().entity_count());
    println!("active:         {}", d.frame.active_entities);
    println!("pan:            ({}, {})", game.world().pan().x, game.world().pan().y);
    println!("peak update:    {peak_update:?}");
    println!("edit errors:    {edit_errors}");
    println!("state hash:     {}", game.state_hash()?);

    if let Some(path) = &config.save_to {
        game.capture_save()?.write_to(path)?;
    }
    if let (Some(recorder), Some(path)) = (recorder, &config.record_to) {
        recorder.finish().write_to(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_config_and_tick_override() {
        let cli = Cli::try_parse_from(["tessera", "level.json", "--ticks", "90"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("level.json"));
        assert_eq!(cli.ticks, Some(90));

        let cli = Cli::try_parse_from(["tessera", "level.json"]).unwrap();
        assert_eq!(cli.ticks, None);

        assert!(Cli::try_parse_from(["tessera"]).is_err());
        assert!(Cli::try_parse_from(["tessera", "a.json", "--ticks", "many"]).is_err());
    }
}
