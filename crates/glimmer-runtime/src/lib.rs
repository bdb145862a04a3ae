//! Light update scheduling and the propagation worker pool.
#![forbid(unsafe_code)]

mod config;
mod job;
mod queue_pool;
mod stats;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use glimmer_chunk::LightChunk;
use glimmer_geom::{LightChannel, VoxelPos};
use glimmer_lighting::{
    ChunkSnapshotSet, GridAccessor, LightError, PendingLease, try_resolve_neighbors,
};
use log::{debug, error, info};
use parking_lot::RwLock;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use thiserror::Error;

pub use crate::config::SchedulerConfig;
pub use crate::job::LightUpdateDone;
pub use crate::stats::SchedulerStats;

use crate::job::{InFlight, LightJob, WorkerShared, process_light_job};
use crate::queue_pool::QueuePool;
use crate::stats::{Counters, FollowUps, IdleSignal};

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("failed to build light worker pool: {0}")]
    PoolBuild(#[from] ThreadPoolBuildError),
    #[error("invalid scheduler config: {0}")]
    InvalidConfig(&'static str),
}

/// Accepts light update requests from the simulation thread and runs them on a worker pool.
pub struct UpdateScheduler {
    config: SchedulerConfig,
    workers: usize,
    job_tx: RwLock<Option<Sender<LightJob>>>,
    exit_rx: Receiver<()>,
    res_rx: Option<Receiver<LightUpdateDone>>,
    shared: Arc<WorkerShared>,
    idle: Arc<IdleSignal>,
    accepting: AtomicBool,
    tick: AtomicU64,
    _pool: ThreadPool,
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}

impl UpdateScheduler {
    pub fn start(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        if config.queue_capacity < 8 {
            return Err(SchedulerError::InvalidConfig("queue_capacity must be at least 8"));
        }
        if config.max_in_flight == 0 {
            return Err(SchedulerError::InvalidConfig("max_in_flight must be positive"));
        }
        let workers = config.resolved_workers();
        let (job_tx, job_rx) = unbounded::<LightJob>();
        let (res_tx, res_rx) = match config.report_capacity {
            0 => (None, None),
            cap => {
                let (tx, rx) = bounded::<LightUpdateDone>(cap);
                (Some(tx), Some(rx))
            }
        };
        let (exit_tx, exit_rx) = unbounded::<()>();
        let shared = Arc::new(WorkerShared {
            queues: QueuePool::with_capacity_from_workers(workers, config.queue_capacity),
            counters: Counters::default(),
            follow_ups: FollowUps::default(),
            reports: res_tx,
        });
        let idle = Arc::new(IdleSignal::default());

        let prefix = config.thread_name_prefix.clone();
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(move |i| format!("{prefix}-{i}"))
            .build()?;
        for _ in 0..workers {
            let rx = job_rx.clone();
            let exit = exit_tx.clone();
            let shared = shared.clone();
            pool.spawn(move || {
                let _exit = exit;
                while let Ok(job) = rx.recv() {
                    let origin = job.origin;
                    let run = AssertUnwindSafe(|| process_light_job(job, &shared));
                    if let Err(payload) = panic::catch_unwind(run) {
                        Counters::bump(&shared.counters.panicked, 1);
                        error!(
                            "light task at {origin} panicked: {}",
                            panic_message(payload.as_ref())
                        );
                    }
                }
            });
        }
        info!(
            "light scheduler started: {workers} workers, queue capacity {}, max in flight {}",
            config.queue_capacity, config.max_in_flight
        );
        Ok(Self {
            config,
            workers,
            job_tx: RwLock::new(Some(job_tx)),
            exit_rx,
            res_rx,
            shared,
            idle,
            accepting: AtomicBool::new(true),
            tick: AtomicU64::new(0),
            _pool: pool,
        })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Acquire)
    }

    /// Boolean form of [`Self::try_request_light_update`].
    pub fn request_light_update<G>(&self, grid: &G, pos: VoxelPos, channel: LightChannel) -> bool
    where
        G: GridAccessor + ?Sized,
    {
        self.try_request_light_update(grid, pos, channel).is_ok()
    }

    /// Schedules a relight of `channel` around `pos`. Call from the simulation thread only.
    pub fn try_request_light_update<G>(
        &self,
        grid: &G,
        pos: VoxelPos,
        channel: LightChannel,
    ) -> Result<(), LightError>
    where
        G: GridAccessor + ?Sized,
    {
        let res = self.submit(grid, pos, channel);
        match &res {
            Ok(()) => Counters::bump(&self.shared.counters.accepted, 1),
            Err(err) => {
                debug!("{channel} light update at {pos} rejected: {err}");
                self.shared.counters.record_rejection(err);
            }
        }
        res
    }

    fn submit<G>(&self, grid: &G, pos: VoxelPos, channel: LightChannel) -> Result<(), LightError>
    where
        G: GridAccessor + ?Sized,
    {
        if !self.is_accepting() {
            return Err(LightError::SchedulerSaturated);
        }
        let local = pos
            .local(grid.world_height())
            .ok_or(LightError::OutOfWorld { pos })?;
        let coord = grid.chunk_coords_of(pos);
        let owner = grid
            .get_loaded_chunk(coord)
            .filter(|c| !grid.is_chunk_unloading(c) && !c.is_invalidated())
            .ok_or(LightError::ChunkNotLoaded { coord })?;
        let ring = try_resolve_neighbors(grid, &owner)
            .map_err(|coord| LightError::ChunkNotLoaded { coord })?;
        if self.idle.outstanding() >= self.config.max_in_flight {
            return Err(LightError::SchedulerSaturated);
        }
        owner
            .try_mark_queued(local, channel)
            .map_err(|_| LightError::AlreadyQueued { pos, channel })?;

        let tick = self.tick();
        owner.record_update_tick(tick);
        let snapshot = ChunkSnapshotSet::new(owner.clone(), ring);
        let lease = PendingLease::acquire(&snapshot).with_mark(owner, local, channel);
        let job = LightJob {
            origin: pos,
            channel,
            snapshot,
            blocks: grid.block_view(),
            tick,
            in_flight: InFlight::new(lease, self.idle.clone()),
        };

        let guard = self.job_tx.read();
        match guard.as_ref() {
            // A rejected job is dropped here, which releases its lease.
            Some(tx) => tx.send(job).map_err(|_| LightError::SchedulerSaturated),
            None => Err(LightError::SchedulerSaturated),
        }
    }

    #[inline]
    pub fn pending_count(&self, chunk: &LightChunk) -> u32 {
        glimmer_lighting::pending_count(chunk)
    }

    pub fn tick(&self) -> u64 {
        self.tick.load(Ordering::Relaxed)
    }

    pub fn set_tick(&self, tick: u64) {
        self.tick.store(tick, Ordering::Relaxed);
    }

    pub fn advance_tick(&self) -> u64 {
        self.tick.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Completion reports not yet collected. At most `report_capacity` are kept.
    pub fn drain_completed(&self) -> Vec<LightUpdateDone> {
        self.res_rx
            .as_ref()
            .map(|rx| rx.try_iter().collect())
            .unwrap_or_default()
    }

    /// Positions finished tasks could not settle within their spread radius. The caller
    /// resubmits them like any other light update.
    pub fn drain_follow_ups(&self) -> Vec<(VoxelPos, LightChannel)> {
        self.shared.follow_ups.drain()
    }

    pub fn pending_follow_ups(&self) -> usize {
        self.shared.follow_ups.len()
    }

    pub fn in_flight(&self) -> usize {
        self.idle.outstanding()
    }

    /// Blocks until no task is outstanding. Returns false on timeout.
    pub fn wait_until_idle(&self, timeout: Duration) -> bool {
        self.idle.wait(timeout)
    }

    pub fn stats(&self) -> SchedulerStats {
        self.shared.counters.snapshot(self.idle.outstanding())
    }

    /// Stops accepting requests, lets workers drain the queue and waits for them to exit.
    pub fn shutdown(&self) {
        let was_accepting = self.accepting.swap(false, Ordering::AcqRel);
        drop(self.job_tx.write().take());
        // Every worker holds an exit sender; recv fails once all of them are gone.
        let _ = self.exit_rx.recv();
        if was_accepting {
            let stats = self.stats();
            info!(
                "light scheduler stopped: {} completed, {} panicked, {} rejected as saturated",
                stats.completed, stats.panicked, stats.rejected_saturated
            );
        }
    }
}

impl Drop for UpdateScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
