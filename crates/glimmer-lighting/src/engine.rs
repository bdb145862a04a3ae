use glimmer_geom::{ChunkCoord, Face, LightChannel, MAX_LIGHT, VoxelPos};
use hashbrown::{HashMap, HashSet};
use log::{debug, trace};

use crate::access::BlockView;
use crate::error::LightError;
use crate::queue::{QueueEntry, WorkQueue};
use crate::snapshot::{Cell, ChunkSnapshotSet};

/// Neighbors are expanded only from voxels closer than this to the origin.
pub const SPREAD_RADIUS: u32 = 17;

#[derive(Clone, Debug)]
pub struct PropagationOutcome {
    pub origin: VoxelPos,
    pub channel: LightChannel,
    /// Voxels whose value differs from what they held before the call.
    pub dirty: Vec<VoxelPos>,
    /// Voxels past the spread radius that still depend on light this call changed.
    /// They need their own update for the region to settle.
    pub frontier: Vec<VoxelPos>,
    pub visited: usize,
    /// The queue filled up and some expansion was dropped.
    pub truncated: bool,
    /// Writes skipped because the target chunk was invalidated.
    pub skipped_writes: usize,
    pub darkened: bool,
    pub brightened: bool,
}

impl PropagationOutcome {
    pub fn new(origin: VoxelPos, channel: LightChannel) -> Self {
        Self {
            origin,
            channel,
            dirty: Vec::new(),
            frontier: Vec::new(),
            visited: 0,
            truncated: false,
            skipped_writes: 0,
            darkened: false,
            brightened: false,
        }
    }
}

/// Light `pos` would hold from first principles given its current neighbors.
pub fn raw_light(
    snapshot: &ChunkSnapshotSet,
    blocks: &dyn BlockView,
    pos: VoxelPos,
    channel: LightChannel,
) -> u8 {
    if channel == LightChannel::Sky && blocks.can_see_sky(pos) {
        return MAX_LIGHT;
    }
    let state = blocks.get_block_state(pos);
    let emission = match channel {
        LightChannel::Block => blocks.get_light_emission(state).min(MAX_LIGHT),
        LightChannel::Sky => 0,
    };
    let mut opacity = blocks.get_light_opacity(state);
    if opacity >= MAX_LIGHT && emission > 0 {
        opacity = 1;
    }
    let opacity = opacity.max(1);
    if opacity >= MAX_LIGHT {
        return 0;
    }
    if emission >= MAX_LIGHT - 1 {
        return emission;
    }
    Face::ALL
        .iter()
        .map(|&f| snapshot.read(pos.step(f), channel).saturating_sub(opacity))
        .fold(emission, u8::max)
}

struct Propagation<'a> {
    snapshot: &'a ChunkSnapshotSet,
    blocks: &'a dyn BlockView,
    queue: &'a mut WorkQueue,
    origin: VoxelPos,
    channel: LightChannel,
    original: HashMap<VoxelPos, u8>,
    frontier: HashSet<VoxelPos>,
    touched: [bool; 9],
    outcome: PropagationOutcome,
}

impl Propagation<'_> {
    #[inline]
    fn stored(&self, pos: VoxelPos) -> u8 {
        self.snapshot.read(pos, self.channel)
    }

    #[inline]
    fn raw(&self, pos: VoxelPos) -> u8 {
        raw_light(self.snapshot, self.blocks, pos, self.channel)
    }

    #[inline]
    fn opacity(&self, pos: VoxelPos) -> u8 {
        self.blocks
            .get_light_opacity(self.blocks.get_block_state(pos))
            .max(1)
    }

    #[inline]
    fn in_reach(&self, pos: VoxelPos) -> bool {
        pos.manhattan(self.origin) < SPREAD_RADIUS
    }

    fn write(&mut self, pos: VoxelPos, value: u8) -> Result<(), LightError> {
        debug_assert!(value <= MAX_LIGHT);
        let Cell::Inside { chunk, index, slot } = self.snapshot.locate(pos) else {
            return Ok(());
        };
        if chunk.is_invalidated() {
            return Err(LightError::StaleSnapshot {
                coord: chunk.coord(),
            });
        }
        let prev = chunk.set_light_index(self.channel, index, value);
        if prev != value {
            self.original.entry(pos).or_insert(prev);
            self.touched[slot] = true;
        }
        Ok(())
    }

    /// False when the write was skipped.
    fn store(&mut self, pos: VoxelPos, value: u8) -> bool {
        match self.write(pos, value) {
            Ok(()) => true,
            Err(err) => {
                trace!("light write at {pos} skipped: {err}");
                self.outcome.skipped_writes += 1;
                false
            }
        }
    }

    fn enqueue(&mut self, pos: VoxelPos, level: u8) {
        match QueueEntry::relative(self.origin, pos, level) {
            Some(entry) if self.queue.push(entry) => {}
            _ => self.outcome.truncated = true,
        }
    }

    /// Level at which neighbor `n` must be darkened after a voxel holding `v` lost it.
    fn darkened_level(&self, n: VoxelPos, v: u8) -> Option<u8> {
        if !self.snapshot.is_writable(n) {
            return None;
        }
        let held = self.stored(n);
        if held == 0 {
            return None;
        }
        let dependent = v.saturating_sub(self.opacity(n));
        if held == dependent {
            Some(dependent)
        } else if held == v && self.raw(n) < v {
            // Equal-level chain, e.g. a sky column cut off from the sky.
            Some(v)
        } else {
            None
        }
    }

    fn darken(&mut self, level: u8) {
        self.outcome.darkened = true;
        self.enqueue(self.origin, level);
        while let Some(entry) = self.queue.pop() {
            self.outcome.visited += 1;
            let pos = entry.position(self.origin);
            let v = entry.level;
            if self.stored(pos) == v {
                self.store(pos, 0);
            }
            if v == 0 {
                continue;
            }
            let expand = self.in_reach(pos);
            for face in Face::ALL {
                let n = pos.step(face);
                match self.darkened_level(n, v) {
                    Some(l) if expand => self.enqueue(n, l),
                    Some(_) => {
                        self.frontier.insert(n);
                    }
                    None => {}
                }
            }
        }
    }

    fn brighten(&mut self) {
        self.outcome.brightened = true;
        while let Some(entry) = self.queue.pop() {
            self.outcome.visited += 1;
            let pos = entry.position(self.origin);
            let current = self.stored(pos);
            let raw = self.raw(pos);
            if raw == current {
                continue;
            }
            if !self.store(pos, raw) || raw < current {
                continue;
            }
            if !self.in_reach(pos) {
                // Only neighbors further out; closer ones are still inside this call's reach.
                for face in Face::ALL {
                    let n = pos.step(face);
                    if self.snapshot.is_writable(n)
                        && !self.in_reach(n)
                        && self.stored(n) < raw.saturating_sub(self.opacity(n))
                    {
                        self.frontier.insert(n);
                    }
                }
                continue;
            }
            if !self.queue.has_room(Face::ALL.len()) {
                self.outcome.truncated = true;
                continue;
            }
            for face in Face::ALL {
                let n = pos.step(face);
                if self.snapshot.is_writable(n) && self.stored(n) < raw {
                    self.enqueue(n, raw);
                }
            }
        }
    }

    fn finish(mut self) -> PropagationOutcome {
        let mut dirty: Vec<VoxelPos> = self
            .original
            .iter()
            .filter(|&(&pos, &before)| self.snapshot.read(pos, self.channel) != before)
            .map(|(&pos, _)| pos)
            .collect();
        dirty.sort_unstable_by_key(|p| (p.y, p.z, p.x));
        let mut frontier: Vec<VoxelPos> = self.frontier.drain().collect();
        frontier.sort_unstable_by_key(|p| (p.y, p.z, p.x));
        for (slot, chunk) in self.snapshot.chunks().iter().enumerate() {
            if self.touched[slot] {
                chunk.bump_revision();
            }
        }
        self.outcome.dirty = dirty;
        self.outcome.frontier = frontier;
        self.outcome
    }
}

/// Recomputes `channel` light around `origin` after its block or neighborhood changed.
/// Reads and writes only go through `snapshot`; `queue` is cleared before use.
pub fn propagate(
    origin: VoxelPos,
    channel: LightChannel,
    snapshot: &ChunkSnapshotSet,
    blocks: &dyn BlockView,
    queue: &mut WorkQueue,
) -> PropagationOutcome {
    queue.clear();
    let mut run = Propagation {
        snapshot,
        blocks,
        queue,
        origin,
        channel,
        original: HashMap::new(),
        frontier: HashSet::new(),
        touched: [false; 9],
        outcome: PropagationOutcome::new(origin, channel),
    };
    if !snapshot.is_writable(origin) {
        debug!("propagation origin {origin} is outside snapshot {}", snapshot.center());
        return run.finish();
    }

    let stored = run.stored(origin);
    let raw = run.raw(origin);
    if raw < stored {
        run.darken(stored);
        run.queue.rewind();
        run.brighten();
    } else if raw > stored {
        run.enqueue(origin, raw);
        run.brighten();
    }

    let outcome = run.finish();
    trace!(
        "{} light at {} settled: {} dirty, {} frontier, {} visited, truncated={}",
        channel,
        origin,
        outcome.dirty.len(),
        outcome.frontier.len(),
        outcome.visited,
        outcome.truncated
    );
    outcome
}

/// Chunks holding at least one dirty voxel of `outcome`.
pub fn dirty_chunks(outcome: &PropagationOutcome) -> Vec<ChunkCoord> {
    let mut coords: Vec<ChunkCoord> = outcome.dirty.iter().map(|p| p.chunk_coord()).collect();
    coords.sort_unstable_by_key(|c| (c.cx, c.cz));
    coords.dedup();
    coords
}
