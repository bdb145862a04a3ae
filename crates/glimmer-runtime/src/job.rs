use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::{Sender, TrySendError};
use glimmer_geom::{ChunkCoord, LightChannel, VoxelPos};
use glimmer_lighting::{
    BlockView, ChunkSnapshotSet, PendingLease, PropagationOutcome, dirty_chunks, propagate,
};
use log::{debug, trace};

use crate::queue_pool::QueuePool;
use crate::stats::{Counters, FollowUps, IdleSignal};

/// Completion report for one light update.
#[derive(Clone, Debug)]
pub struct LightUpdateDone {
    pub origin: VoxelPos,
    pub channel: LightChannel,
    pub dirty: Vec<VoxelPos>,
    pub dirty_chunks: Vec<ChunkCoord>,
    /// Positions queued as follow-up updates; see [`crate::UpdateScheduler::drain_follow_ups`].
    pub frontier: Vec<VoxelPos>,
    pub visited: usize,
    pub truncated: bool,
    pub skipped_writes: usize,
    /// Tick at which the request was accepted.
    pub tick: u64,
    pub t_total_us: u32,
}

impl LightUpdateDone {
    fn new(outcome: PropagationOutcome, tick: u64, t_total_us: u32) -> Self {
        let dirty_chunks = dirty_chunks(&outcome);
        Self {
            origin: outcome.origin,
            channel: outcome.channel,
            dirty: outcome.dirty,
            dirty_chunks,
            frontier: outcome.frontier,
            visited: outcome.visited,
            truncated: outcome.truncated,
            skipped_writes: outcome.skipped_writes,
            tick,
            t_total_us,
        }
    }
}

/// Bookkeeping a task owns from acceptance until it is dropped, whether it
/// ran, panicked or never reached a worker.
pub(crate) struct InFlight {
    lease: Option<PendingLease>,
    idle: Arc<IdleSignal>,
}

impl InFlight {
    pub fn new(lease: PendingLease, idle: Arc<IdleSignal>) -> Self {
        idle.begin();
        Self {
            lease: Some(lease),
            idle,
        }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        // Counters and the dedup mark go first so an idle scheduler implies settled chunks.
        drop(self.lease.take());
        self.idle.end();
    }
}

pub(crate) struct LightJob {
    pub origin: VoxelPos,
    pub channel: LightChannel,
    pub snapshot: ChunkSnapshotSet,
    pub blocks: Arc<dyn BlockView>,
    pub tick: u64,
    pub in_flight: InFlight,
}

/// Shared state every worker reports into.
pub(crate) struct WorkerShared {
    pub queues: QueuePool,
    pub counters: Counters,
    pub follow_ups: FollowUps,
    /// `None` when completion reports are turned off.
    pub reports: Option<Sender<LightUpdateDone>>,
}

pub(crate) fn process_light_job(job: LightJob, shared: &WorkerShared) {
    let LightJob {
        origin,
        channel,
        snapshot,
        blocks,
        tick,
        in_flight,
    } = job;
    let t0 = Instant::now();
    let outcome = {
        let mut queue = shared.queues.acquire();
        propagate(origin, channel, &snapshot, blocks.as_ref(), &mut queue)
    };
    let t_total_us = t0.elapsed().as_micros().min(u128::from(u32::MAX)) as u32;
    let counters = &shared.counters;
    if outcome.truncated {
        Counters::bump(&counters.truncated, 1);
    }
    Counters::bump(&counters.skipped_writes, outcome.skipped_writes as u64);
    // Follow-ups land before the task counts as finished, so an idle scheduler has them all.
    let added = shared.follow_ups.extend(channel, &outcome.frontier);
    Counters::bump(&counters.follow_ups, added as u64);
    trace!(
        "{channel} update at {origin} done in {t_total_us}us: {} dirty, {added} follow-ups",
        outcome.dirty.len()
    );
    if let Some(tx) = &shared.reports {
        match tx.try_send(LightUpdateDone::new(outcome, tick, t_total_us)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                Counters::bump(&counters.reports_dropped, 1);
                debug!("completion report for {channel} update at {origin} dropped: backlog full");
            }
            Err(TrySendError::Disconnected(_)) => {
                Counters::bump(&counters.reports_dropped, 1);
            }
        }
    }
    Counters::bump(&counters.completed, 1);
    drop(in_flight);
}
