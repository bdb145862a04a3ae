//! Headless driver: builds a small world and runs light updates through the scheduler.

mod config;
mod scenario;

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser as _;
use glimmer_blocks::BlockRegistry;
use glimmer_runtime::UpdateScheduler;
use glimmer_world::VoxelWorld;
use log::{info, warn};

use crate::config::AppConfig;

#[derive(Debug, clap::Parser)]
#[command(author, about, version)]
struct Args {
    /// TOML file with `[scheduler]`, `[world]` and `[scenario]` sections.
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Worker threads; overrides the config file. 0 picks from available parallelism.
    #[arg(long)]
    threads: Option<usize>,

    /// Chunks loaded in each direction around the origin.
    #[arg(long)]
    radius: Option<i32>,

    /// Block table to use instead of the built-in one.
    #[arg(long)]
    blocks: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `glimmer_runtime=trace`. `RUST_LOG` wins when set.
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level))
        .format_timestamp_millis()
        .init();

    let mut cfg = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    if let Some(threads) = args.threads {
        cfg.scheduler.worker_threads = threads;
    }
    if let Some(radius) = args.radius {
        cfg.scenario.radius = radius;
    }
    if args.blocks.is_some() {
        cfg.blocks = args.blocks.clone();
    }

    let registry = match &cfg.blocks {
        Some(path) => BlockRegistry::load_from_path(path)?,
        None => BlockRegistry::builtin()?,
    };
    info!("block registry: {} types", registry.len());

    let world = VoxelWorld::new(&cfg.world, Arc::new(registry));
    let sched = UpdateScheduler::start(cfg.scheduler.clone())?;
    info!(
        "light scheduler: {} workers, {} in flight max",
        sched.workers(),
        cfg.scheduler.max_in_flight
    );

    let started = Instant::now();
    let result = scenario::run(&world, &sched, &cfg.scenario);
    if !sched.wait_until_idle(Duration::from_secs(5)) {
        warn!("light updates still running at shutdown");
    }
    sched.shutdown();
    let summary = result?;

    let stats = sched.stats();
    info!(
        "done in {:.1?}: {} ticks, {} submitted, {} follow-ups, {} updates ({} truncated, {} voxels visited), {} dropped, {} chunks unloaded",
        started.elapsed(),
        summary.ticks,
        summary.submitted,
        summary.follow_ups,
        summary.completed,
        summary.truncated,
        summary.visited,
        summary.dropped,
        summary.unloaded
    );
    info!(
        "scheduler: accepted {} completed {} panicked {} reports dropped {} rejected dup/sat/unloaded/oow {}/{}/{}/{}",
        stats.accepted,
        stats.completed,
        stats.panicked,
        stats.reports_dropped,
        stats.rejected_duplicate,
        stats.rejected_saturated,
        stats.rejected_not_loaded,
        stats.rejected_out_of_world
    );
    if summary.unsettled > 0 {
        warn!("{} steps did not settle", summary.unsettled);
    }
    Ok(())
}
