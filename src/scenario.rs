use std::error::Error;
use std::time::Duration;

use glimmer_geom::{ChunkCoord, LightChannel, VoxelPos};
use glimmer_runtime::{LightUpdateDone, UpdateScheduler};
use glimmer_world::{ChunkData, VoxelWorld};
use log::{debug, info, warn};

use crate::config::ScenarioConfig;

/// Totals gathered while the scenario runs.
#[derive(Debug, Default)]
pub struct ScenarioSummary {
    pub ticks: u64,
    pub submitted: usize,
    pub dropped: usize,
    pub follow_ups: usize,
    pub completed: usize,
    pub truncated: usize,
    pub visited: usize,
    pub unloaded: usize,
    /// Steps that ran out of ticks before light settled.
    pub unsettled: usize,
}

struct Runner<'a> {
    world: &'a VoxelWorld,
    sched: &'a UpdateScheduler,
    max_ticks: u32,
    summary: ScenarioSummary,
}

impl Runner<'_> {
    fn absorb(&mut self, completed: &[LightUpdateDone]) {
        for done in completed {
            self.summary.completed += 1;
            self.summary.visited += done.visited;
            if done.truncated {
                self.summary.truncated += 1;
                warn!(
                    "{} update at {} hit the queue limit after {} voxels",
                    done.channel, done.origin, done.visited
                );
            }
        }
    }

    /// Ticks until no relight is queued or running and no follow-up is left.
    fn settle(&mut self, step: &str) {
        for _ in 0..self.max_ticks {
            let report = self.world.tick(self.sched);
            self.summary.ticks += 1;
            self.summary.submitted += report.submitted;
            self.summary.dropped += report.dropped;
            self.summary.follow_ups += report.follow_ups;
            self.summary.unloaded += report.unloaded.len();
            self.absorb(&report.completed);
            self.sched.wait_until_idle(Duration::from_millis(20));
            if self.world.is_settled(self.sched) {
                let late = self.sched.drain_completed();
                self.absorb(&late);
                debug!("{step}: settled at tick {}", report.tick);
                return;
            }
        }
        warn!("{step}: light still changing after {} ticks", self.max_ticks);
        self.summary.unsettled += 1;
    }

    fn report_light(&self, label: &str, pos: VoxelPos) {
        info!(
            "{label} {pos}: sky {} block {}",
            self.world.get_light(pos, LightChannel::Sky),
            self.world.get_light(pos, LightChannel::Block)
        );
    }
}

/// Builds a flat world, places emitters, digs and caps a shaft, then unloads the outer ring.
pub fn run(
    world: &VoxelWorld,
    sched: &UpdateScheduler,
    cfg: &ScenarioConfig,
) -> Result<ScenarioSummary, Box<dyn Error>> {
    let ground = world
        .registry()
        .state_by_name(&cfg.ground)
        .ok_or_else(|| format!("unknown ground block `{}`", cfg.ground))?;
    let radius = cfg.radius.max(1);
    for cx in -radius..=radius {
        for cz in -radius..=radius {
            let data = ChunkData::flat(world.height(), cfg.ground_y, ground);
            world.load_chunk(ChunkCoord::new(cx, cz), data)?;
        }
    }
    info!(
        "loaded {} chunks, surface at y={}",
        world.loaded_chunks().len(),
        cfg.ground_y
    );

    let mut runner = Runner {
        world,
        sched,
        max_ticks: cfg.max_ticks.max(1),
        summary: ScenarioSummary::default(),
    };
    runner.settle("load");

    let emitters = cfg
        .torches
        .iter()
        .map(|p| (*p, "torch"))
        .chain(cfg.lanterns.iter().map(|p| (*p, "lantern")));
    for ([x, y, z], name) in emitters {
        let pos = VoxelPos::new(x, y, z);
        world.set_block_by_name(pos, name)?;
        runner.settle(name);
        runner.report_light(name, pos);
        runner.report_light("  4 east of it", pos.offset(4, 0, 0));
    }

    if let Some([x, z]) = cfg.shaft {
        let top = cfg.ground_y - 1;
        let bottom = top - cfg.shaft_depth.max(1) + 1;
        for y in (bottom..=top).rev() {
            world.set_block_by_name(VoxelPos::new(x, y, z), "air")?;
        }
        runner.settle("dig");
        runner.report_light("open shaft floor", VoxelPos::new(x, bottom, z));

        world.set_block(VoxelPos::new(x, top, z), ground)?;
        runner.settle("cap");
        runner.report_light("capped shaft floor", VoxelPos::new(x, bottom, z));
    }

    if let Some([x, y, z]) = cfg.torches.first() {
        let pos = VoxelPos::new(*x, *y, *z);
        world.set_block_by_name(pos, "air")?;
        runner.settle("remove torch");
        runner.report_light("removed torch", pos);
    }

    let mut requested = 0;
    for coord in world.loaded_chunks() {
        if coord.ring_distance(ChunkCoord::new(0, 0)) == radius && world.request_unload(coord) {
            requested += 1;
        }
    }
    info!("requested unload of {requested} edge chunks");
    runner.settle("unload");

    Ok(runner.summary)
}
