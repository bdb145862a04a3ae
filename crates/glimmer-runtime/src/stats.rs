use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use glimmer_geom::{LightChannel, VoxelPos};
use glimmer_lighting::LightError;
use hashbrown::HashSet;
use parking_lot::{Condvar, Mutex};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub accepted: u64,
    pub completed: u64,
    pub panicked: u64,
    pub in_flight: u64,
    pub rejected_not_loaded: u64,
    pub rejected_out_of_world: u64,
    pub rejected_duplicate: u64,
    pub rejected_saturated: u64,
    pub truncated: u64,
    pub skipped_writes: u64,
    pub reports_dropped: u64,
    pub follow_ups: u64,
}

#[derive(Default)]
pub(crate) struct Counters {
    pub accepted: AtomicU64,
    pub completed: AtomicU64,
    pub panicked: AtomicU64,
    pub rejected_not_loaded: AtomicU64,
    pub rejected_out_of_world: AtomicU64,
    pub rejected_duplicate: AtomicU64,
    pub rejected_saturated: AtomicU64,
    pub truncated: AtomicU64,
    pub skipped_writes: AtomicU64,
    pub reports_dropped: AtomicU64,
    pub follow_ups: AtomicU64,
}

impl Counters {
    pub fn bump(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_rejection(&self, err: &LightError) {
        let counter = match err {
            LightError::ChunkNotLoaded { .. } => &self.rejected_not_loaded,
            LightError::OutOfWorld { .. } => &self.rejected_out_of_world,
            LightError::AlreadyQueued { .. } => &self.rejected_duplicate,
            LightError::SchedulerSaturated | LightError::StaleSnapshot { .. } => {
                &self.rejected_saturated
            }
        };
        Self::bump(counter, 1);
    }

    pub fn snapshot(&self, in_flight: usize) -> SchedulerStats {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        SchedulerStats {
            accepted: load(&self.accepted),
            completed: load(&self.completed),
            panicked: load(&self.panicked),
            in_flight: in_flight as u64,
            rejected_not_loaded: load(&self.rejected_not_loaded),
            rejected_out_of_world: load(&self.rejected_out_of_world),
            rejected_duplicate: load(&self.rejected_duplicate),
            rejected_saturated: load(&self.rejected_saturated),
            truncated: load(&self.truncated),
            skipped_writes: load(&self.skipped_writes),
            reports_dropped: load(&self.reports_dropped),
            follow_ups: load(&self.follow_ups),
        }
    }
}

/// Positions that finished tasks left unsettled past their spread radius.
/// Deduplicated, so the set never outgrows the loaded voxels.
#[derive(Default)]
pub(crate) struct FollowUps {
    pending: Mutex<HashSet<(VoxelPos, LightChannel)>>,
}

impl FollowUps {
    /// Returns how many positions were new.
    pub fn extend(&self, channel: LightChannel, positions: &[VoxelPos]) -> usize {
        let mut pending = self.pending.lock();
        positions
            .iter()
            .filter(|&&pos| pending.insert((pos, channel)))
            .count()
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn drain(&self) -> Vec<(VoxelPos, LightChannel)> {
        let mut out: Vec<_> = self.pending.lock().drain().collect();
        out.sort_unstable_by_key(|(p, c)| (c.index(), p.y, p.z, p.x));
        out
    }
}

/// Count of accepted-but-unfinished tasks, with a wakeup when it reaches zero.
#[derive(Default)]
pub(crate) struct IdleSignal {
    outstanding: Mutex<usize>,
    cv: Condvar,
}

impl IdleSignal {
    pub fn outstanding(&self) -> usize {
        *self.outstanding.lock()
    }

    pub fn begin(&self) {
        *self.outstanding.lock() += 1;
    }

    pub fn end(&self) {
        let mut n = self.outstanding.lock();
        *n = n.saturating_sub(1);
        if *n == 0 {
            self.cv.notify_all();
        }
    }

    pub fn wait(&self, timeout: Duration) -> bool {
        let mut n = self.outstanding.lock();
        self.cv.wait_while_for(&mut n, |n| *n > 0, timeout);
        *n == 0
    }
}
