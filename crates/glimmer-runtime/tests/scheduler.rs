use std::sync::{Arc, Condvar, Mutex, RwLock};
use std::thread;
use std::time::Duration;

use glimmer_blocks::{BlockRegistry, BlockState};
use glimmer_chunk::{ChunkRef, LightChunk};
use glimmer_geom::{ChunkCoord, LightChannel, VoxelPos, WorldHeight};
use glimmer_lighting::{BlockView, GridAccessor, LightError};
use glimmer_runtime::{SchedulerConfig, UpdateScheduler};
use hashbrown::HashMap;

const HEIGHT: WorldHeight = WorldHeight::new(0, 32);
const WAIT: Duration = Duration::from_secs(10);

/// Holds workers inside block lookups until opened.
struct Gate {
    open: Mutex<bool>,
    cv: Condvar,
}

impl Gate {
    fn new(open: bool) -> Arc<Self> {
        Arc::new(Self {
            open: Mutex::new(open),
            cv: Condvar::new(),
        })
    }

    fn open(&self) {
        *self.open.lock().unwrap() = true;
        self.cv.notify_all();
    }

    fn pass(&self) {
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.cv.wait(open).unwrap();
        }
    }
}

struct Blocks {
    reg: BlockRegistry,
    placed: RwLock<HashMap<VoxelPos, BlockState>>,
    gate: Arc<Gate>,
    explode_at: Option<VoxelPos>,
}

impl BlockView for Blocks {
    fn get_block_state(&self, pos: VoxelPos) -> BlockState {
        self.gate.pass();
        if self.explode_at == Some(pos) {
            panic!("block lookup exploded at {pos}");
        }
        self.placed.read().unwrap().get(&pos).copied().unwrap_or(BlockState::AIR)
    }
    fn get_light_opacity(&self, state: BlockState) -> u8 {
        self.reg.opacity(state)
    }
    fn get_light_emission(&self, state: BlockState) -> u8 {
        self.reg.emission(state)
    }
    fn can_see_sky(&self, _pos: VoxelPos) -> bool {
        false
    }
}

struct Grid {
    blocks: Arc<Blocks>,
    chunks: RwLock<HashMap<ChunkCoord, ChunkRef>>,
}

impl BlockView for Grid {
    fn get_block_state(&self, pos: VoxelPos) -> BlockState {
        self.blocks.get_block_state(pos)
    }
    fn get_light_opacity(&self, state: BlockState) -> u8 {
        self.blocks.get_light_opacity(state)
    }
    fn get_light_emission(&self, state: BlockState) -> u8 {
        self.blocks.get_light_emission(state)
    }
    fn can_see_sky(&self, pos: VoxelPos) -> bool {
        self.blocks.can_see_sky(pos)
    }
}

impl GridAccessor for Grid {
    fn get_loaded_chunk(&self, coord: ChunkCoord) -> Option<ChunkRef> {
        self.chunks.read().unwrap().get(&coord).cloned()
    }
    fn world_height(&self) -> WorldHeight {
        HEIGHT
    }
    fn block_view(&self) -> Arc<dyn BlockView> {
        self.blocks.clone()
    }
}

impl Grid {
    fn new(radius: i32, gate: Arc<Gate>, explode_at: Option<VoxelPos>) -> Self {
        let mut chunks = HashMap::new();
        for cz in -radius..=radius {
            for cx in -radius..=radius {
                let coord = ChunkCoord::new(cx, cz);
                chunks.insert(coord, Arc::new(LightChunk::new(coord, HEIGHT)));
            }
        }
        Self {
            blocks: Arc::new(Blocks {
                reg: BlockRegistry::builtin().unwrap(),
                placed: RwLock::new(HashMap::new()),
                gate,
                explode_at,
            }),
            chunks: RwLock::new(chunks),
        }
    }

    fn place(&self, pos: VoxelPos, name: &str) {
        let state = self.blocks.reg.state_by_name(name).unwrap();
        self.blocks.placed.write().unwrap().insert(pos, state);
    }

    fn chunk(&self, cx: i32, cz: i32) -> ChunkRef {
        self.get_loaded_chunk(ChunkCoord::new(cx, cz)).unwrap()
    }

    fn light(&self, pos: VoxelPos, channel: LightChannel) -> u8 {
        self.get_loaded_chunk(pos.chunk_coord())
            .and_then(|c| c.light_at(channel, pos))
            .unwrap_or(0)
    }

    fn all_pending_zero(&self) -> bool {
        self.chunks.read().unwrap().values().all(|c| c.pending_count() == 0)
    }
}

fn scheduler(workers: usize, max_in_flight: usize) -> UpdateScheduler {
    UpdateScheduler::start(SchedulerConfig {
        worker_threads: workers,
        max_in_flight,
        ..SchedulerConfig::default()
    })
    .unwrap()
}

#[test]
fn accepted_update_lights_neighbors_and_reports() {
    let grid = Grid::new(2, Gate::new(true), None);
    let sched = scheduler(2, 64);
    let lamp = VoxelPos::new(13, 16, 8);
    grid.place(lamp, "lantern");
    sched.set_tick(42);
    assert!(sched.request_light_update(&grid, lamp, LightChannel::Block));
    assert_eq!(grid.chunk(0, 0).last_light_update_tick(), 42);
    assert!(sched.wait_until_idle(WAIT));

    assert_eq!(grid.light(lamp, LightChannel::Block), 15);
    assert_eq!(grid.light(lamp.offset(4, 0, 0), LightChannel::Block), 11);
    assert_eq!(grid.light(lamp.offset(-9, 0, 0), LightChannel::Block), 6);
    assert!(grid.all_pending_zero());

    let reports = sched.drain_completed();
    assert_eq!(reports.len(), 1);
    let done = &reports[0];
    assert_eq!((done.origin, done.channel, done.tick), (lamp, LightChannel::Block, 42));
    assert!(!done.truncated);
    assert!(done.dirty_chunks.contains(&ChunkCoord::new(1, 0)));
    assert!(done.dirty_chunks.contains(&ChunkCoord::new(-1, 0)));
    assert_eq!(sched.stats().completed, 1);
    assert_eq!(sched.advance_tick(), 43);
}

#[test]
fn duplicate_request_is_rejected_and_counted_once() {
    let gate = Gate::new(false);
    let grid = Grid::new(1, gate.clone(), None);
    let sched = scheduler(1, 64);
    let pos = VoxelPos::new(4, 10, 4);
    grid.place(pos, "torch");

    assert!(sched.request_light_update(&grid, pos, LightChannel::Block));
    assert_eq!(
        sched.try_request_light_update(&grid, pos, LightChannel::Block),
        Err(LightError::AlreadyQueued { pos, channel: LightChannel::Block })
    );
    assert!(!sched.request_light_update(&grid, pos, LightChannel::Sky));
    assert_eq!(grid.chunk(0, 0).pending_count(), 1);
    assert_eq!(grid.chunk(-1, 1).pending_count(), 1);
    assert_eq!(sched.stats().rejected_duplicate, 2);

    gate.open();
    assert!(sched.wait_until_idle(WAIT));
    assert!(grid.all_pending_zero());
    assert!(sched.request_light_update(&grid, pos, LightChannel::Sky));
    assert!(sched.wait_until_idle(WAIT));
}

#[test]
fn missing_or_unloading_chunks_reject_without_side_effects() {
    let grid = Grid::new(1, Gate::new(true), None);
    let sched = scheduler(1, 64);
    let pos = VoxelPos::new(2, 5, 2);

    grid.chunks.write().unwrap().remove(&ChunkCoord::new(1, 1));
    assert_eq!(
        sched.try_request_light_update(&grid, pos, LightChannel::Block),
        Err(LightError::ChunkNotLoaded { coord: ChunkCoord::new(1, 1) })
    );
    assert!(grid.all_pending_zero());
    assert_eq!(grid.chunk(0, 0).queued_len(), 0);

    let far = VoxelPos::new(40, 5, 2);
    assert_eq!(
        sched.try_request_light_update(&grid, far, LightChannel::Block),
        Err(LightError::ChunkNotLoaded { coord: ChunkCoord::new(2, 0) })
    );

    grid.chunks
        .write()
        .unwrap()
        .insert(ChunkCoord::new(1, 1), Arc::new(LightChunk::new(ChunkCoord::new(1, 1), HEIGHT)));
    grid.chunk(0, 0).set_unloading(true);
    assert!(!sched.request_light_update(&grid, pos, LightChannel::Block));
    grid.chunk(0, 0).set_unloading(false);
    assert!(sched.request_light_update(&grid, pos, LightChannel::Block));
    assert!(sched.wait_until_idle(WAIT));
    assert_eq!(sched.stats().rejected_not_loaded, 3);
}

#[test]
fn positions_outside_world_height_are_rejected() {
    let grid = Grid::new(1, Gate::new(true), None);
    let sched = scheduler(1, 64);
    for y in [-1, HEIGHT.max_y()] {
        let pos = VoxelPos::new(0, y, 0);
        assert_eq!(
            sched.try_request_light_update(&grid, pos, LightChannel::Sky),
            Err(LightError::OutOfWorld { pos })
        );
    }
}

#[test]
fn pending_work_defers_unload_until_complete() {
    let gate = Gate::new(false);
    let grid = Grid::new(1, gate.clone(), None);
    let sched = scheduler(2, 64);
    assert!(sched.request_light_update(&grid, VoxelPos::new(15, 3, 15), LightChannel::Block));
    let corner = grid.chunk(1, 1);
    assert!(sched.pending_count(&corner) > 0);
    assert!(!corner.is_safe_to_unload());

    gate.open();
    assert!(sched.wait_until_idle(WAIT));
    assert_eq!(sched.pending_count(&corner), 0);
    assert!(corner.is_safe_to_unload());
}

#[test]
fn admission_limit_caps_in_flight_tasks() {
    let gate = Gate::new(false);
    let grid = Grid::new(1, gate.clone(), None);
    let sched = scheduler(1, 2);
    assert!(sched.request_light_update(&grid, VoxelPos::new(1, 1, 1), LightChannel::Block));
    assert!(sched.request_light_update(&grid, VoxelPos::new(2, 1, 1), LightChannel::Block));
    assert_eq!(
        sched.try_request_light_update(&grid, VoxelPos::new(3, 1, 1), LightChannel::Block),
        Err(LightError::SchedulerSaturated)
    );
    assert_eq!(sched.in_flight(), 2);
    assert_eq!(grid.chunk(0, 0).pending_count(), 2);
    assert_eq!(sched.stats().rejected_saturated, 1);

    gate.open();
    assert!(sched.wait_until_idle(WAIT));
    assert!(sched.request_light_update(&grid, VoxelPos::new(3, 1, 1), LightChannel::Block));
    assert!(sched.wait_until_idle(WAIT));
}

#[test]
fn shutdown_drains_queued_work_then_rejects() {
    let gate = Gate::new(false);
    let grid = Grid::new(1, gate.clone(), None);
    let sched = scheduler(1, 64);
    let lamp = VoxelPos::new(8, 8, 8);
    grid.place(lamp, "glowstone");
    assert!(sched.request_light_update(&grid, lamp, LightChannel::Block));
    assert!(sched.request_light_update(&grid, lamp.offset(0, 2, 0), LightChannel::Block));

    let opener = {
        let gate = gate.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            gate.open();
        })
    };
    sched.shutdown();
    opener.join().unwrap();

    assert!(grid.all_pending_zero());
    assert_eq!(sched.drain_completed().len(), 2);
    assert_eq!(grid.light(lamp.offset(0, 0, 3), LightChannel::Block), 12);
    assert!(!sched.is_accepting());
    assert_eq!(
        sched.try_request_light_update(&grid, lamp, LightChannel::Block),
        Err(LightError::SchedulerSaturated)
    );
    assert!(grid.all_pending_zero());
    assert_eq!(grid.chunk(0, 0).queued_len(), 0);
}

#[test]
fn panicking_task_releases_its_lease_and_worker_survives() {
    let boom = VoxelPos::new(6, 6, 6);
    let grid = Grid::new(1, Gate::new(true), Some(boom));
    let sched = scheduler(1, 64);
    assert!(sched.request_light_update(&grid, boom, LightChannel::Block));
    assert!(sched.wait_until_idle(WAIT));
    assert!(grid.all_pending_zero());
    assert_eq!(grid.chunk(0, 0).queued_len(), 0);
    assert_eq!(sched.stats().panicked, 1);
    assert!(sched.drain_completed().is_empty());

    let lamp = VoxelPos::new(15, 31, 15);
    grid.place(lamp, "torch");
    assert!(sched.request_light_update(&grid, lamp, LightChannel::Block));
    assert!(sched.wait_until_idle(WAIT));
    assert_eq!(grid.light(lamp, LightChannel::Block), 14);
}

#[test]
fn undrained_reports_are_capped_and_counted() {
    let grid = Grid::new(1, Gate::new(true), None);
    let sched = UpdateScheduler::start(SchedulerConfig {
        worker_threads: 1,
        report_capacity: 2,
        ..SchedulerConfig::default()
    })
    .unwrap();
    for x in 1..=5 {
        assert!(sched.request_light_update(&grid, VoxelPos::new(x, 1, 1), LightChannel::Block));
        assert!(sched.wait_until_idle(WAIT));
    }
    let stats = sched.stats();
    assert_eq!((stats.completed, stats.reports_dropped), (5, 3));
    let kept = sched.drain_completed();
    assert_eq!(kept.iter().map(|d| d.origin.x).collect::<Vec<_>>(), vec![1, 2]);

    // Draining frees room again.
    assert!(sched.request_light_update(&grid, VoxelPos::new(6, 1, 1), LightChannel::Block));
    assert!(sched.wait_until_idle(WAIT));
    assert_eq!(sched.drain_completed().len(), 1);
    assert_eq!(sched.stats().reports_dropped, 3);
}

#[test]
fn reports_can_be_turned_off() {
    let grid = Grid::new(1, Gate::new(true), None);
    let sched = UpdateScheduler::start(SchedulerConfig {
        worker_threads: 1,
        report_capacity: 0,
        ..SchedulerConfig::default()
    })
    .unwrap();
    let lamp = VoxelPos::new(8, 8, 8);
    grid.place(lamp, "lantern");
    assert!(sched.request_light_update(&grid, lamp, LightChannel::Block));
    assert!(sched.wait_until_idle(WAIT));
    assert_eq!(grid.light(lamp, LightChannel::Block), 15);
    assert!(sched.drain_completed().is_empty());
    assert_eq!(sched.stats().reports_dropped, 0);
    assert_eq!(sched.stats().completed, 1);
    assert_eq!(sched.pending_follow_ups(), 0);
    assert!(sched.drain_follow_ups().is_empty());
}

#[test]
fn scheduler_config_reads_partial_toml() {
    let cfg: SchedulerConfig = toml::from_str("worker_threads = 3\nmax_in_flight = 8\n").unwrap();
    assert_eq!(cfg.worker_threads, 3);
    assert_eq!(cfg.max_in_flight, 8);
    assert_eq!(cfg.queue_capacity, SchedulerConfig::default().queue_capacity);
    assert_eq!(cfg.report_capacity, 4096);
    assert_eq!(cfg.resolved_workers(), 3);
    assert!(SchedulerConfig::default().resolved_workers() >= 1);

    let bad = SchedulerConfig {
        max_in_flight: 0,
        ..SchedulerConfig::default()
    };
    assert!(UpdateScheduler::start(bad).is_err());
}
