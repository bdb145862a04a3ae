use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use glimmer_geom::{ChunkCoord, LightChannel, LocalPos, VoxelPos, WorldHeight};
use hashbrown::HashSet;
use parking_lot::Mutex;
use thiserror::Error;

use crate::nibble::NibbleArray;

pub type ChunkRef = Arc<LightChunk>;

/// Ring neighbors as `(dx, dz)`, in resolution order.
pub const NEIGHBOR_OFFSETS: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Slot of `(dx, dz)` in [`NEIGHBOR_OFFSETS`]; `None` for the center or anything farther out.
#[inline]
pub fn neighbor_slot(dx: i32, dz: i32) -> Option<usize> {
    NEIGHBOR_OFFSETS.iter().position(|&o| o == (dx, dz))
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkError {
    #[error("light data for {channel} has {found} values, chunk holds {expected}")]
    LightLength {
        channel: LightChannel,
        expected: usize,
        found: usize,
    },
}

pub struct LightChunk {
    coord: ChunkCoord,
    height: WorldHeight,
    light: [NibbleArray; 2],
    pending_updates: AtomicU32,
    // Packed local positions, indexed by channel.
    queued: Mutex<[HashSet<u32>; 2]>,
    last_light_update_tick: AtomicU64,
    light_revision: AtomicU64,
    neighbors: Mutex<[Weak<LightChunk>; 8]>,
    unloading: AtomicBool,
    invalidated: AtomicBool,
}

impl LightChunk {
    /// Both channels start dark.
    pub fn new(coord: ChunkCoord, height: WorldHeight) -> Self {
        let volume = height.chunk_volume();
        Self {
            coord,
            height,
            light: [NibbleArray::new(volume), NibbleArray::new(volume)],
            pending_updates: AtomicU32::new(0),
            queued: Mutex::new([HashSet::new(), HashSet::new()]),
            last_light_update_tick: AtomicU64::new(0),
            light_revision: AtomicU64::new(0),
            neighbors: Mutex::new(Default::default()),
            unloading: AtomicBool::new(false),
            invalidated: AtomicBool::new(false),
        }
    }

    /// Restores persisted light; each slice holds one value per voxel in local index order.
    pub fn with_light(
        coord: ChunkCoord,
        height: WorldHeight,
        sky: &[u8],
        block: &[u8],
    ) -> Result<Self, ChunkError> {
        let chunk = Self::new(coord, height);
        chunk.import_light(LightChannel::Sky, sky)?;
        chunk.import_light(LightChannel::Block, block)?;
        Ok(chunk)
    }

    #[inline]
    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    #[inline]
    pub fn height(&self) -> WorldHeight {
        self.height
    }

    #[inline]
    pub fn volume(&self) -> usize {
        self.light[0].len()
    }

    // ---- light values ----

    #[inline]
    pub fn get_light(&self, channel: LightChannel, local: LocalPos) -> u8 {
        self.light[channel.index()].get(local.index())
    }

    /// Returns the previous value.
    #[inline]
    pub fn set_light(&self, channel: LightChannel, local: LocalPos, value: u8) -> u8 {
        self.light[channel.index()].set(local.index(), value)
    }

    #[inline]
    pub fn get_light_index(&self, channel: LightChannel, index: usize) -> u8 {
        self.light[channel.index()].get(index)
    }

    #[inline]
    pub fn set_light_index(&self, channel: LightChannel, index: usize, value: u8) -> u8 {
        self.light[channel.index()].set(index, value)
    }

    /// Local index of a world position, if it falls inside this chunk.
    pub fn index_of(&self, pos: VoxelPos) -> Option<usize> {
        if pos.chunk_coord() != self.coord {
            return None;
        }
        pos.local(self.height).map(LocalPos::index)
    }

    /// Light at a world position, if it falls inside this chunk.
    pub fn light_at(&self, channel: LightChannel, pos: VoxelPos) -> Option<u8> {
        self.index_of(pos).map(|i| self.get_light_index(channel, i))
    }

    pub fn fill_light(&self, channel: LightChannel, value: u8) {
        self.light[channel.index()].fill(value);
    }

    pub fn export_light(&self, channel: LightChannel) -> Vec<u8> {
        self.light[channel.index()].to_vec()
    }

    pub fn import_light(&self, channel: LightChannel, values: &[u8]) -> Result<(), ChunkError> {
        let arr = &self.light[channel.index()];
        if values.len() != arr.len() {
            return Err(ChunkError::LightLength {
                channel,
                expected: arr.len(),
                found: values.len(),
            });
        }
        for (i, &v) in values.iter().enumerate() {
            arr.set(i, v.min(glimmer_geom::MAX_LIGHT));
        }
        Ok(())
    }

    // ---- pending-update ledger ----

    #[inline]
    pub fn pending_count(&self) -> u32 {
        self.pending_updates.load(Ordering::Acquire)
    }

    #[inline]
    pub fn increment_pending(&self) -> u32 {
        self.pending_updates.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Saturates at zero; an unmatched decrement is a bug.
    pub fn decrement_pending(&self) -> u32 {
        let prev = self
            .pending_updates
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        match prev {
            Ok(n) => n - 1,
            Err(_) => {
                debug_assert!(false, "pending_updates underflow on chunk {}", self.coord);
                log::error!("pending_updates underflow on chunk {}", self.coord);
                0
            }
        }
    }

    #[inline]
    pub fn is_safe_to_unload(&self) -> bool {
        self.pending_count() == 0
    }

    // ---- dedup ----

    /// Marks `local` as queued on `channel`. Fails with the channel it is already queued on.
    pub fn try_mark_queued(&self, local: LocalPos, channel: LightChannel) -> Result<(), LightChannel> {
        let key = local.pack();
        let mut sets = self.queued.lock();
        for ch in [channel, channel.other()] {
            if sets[ch.index()].contains(&key) {
                return Err(ch);
            }
        }
        sets[channel.index()].insert(key);
        Ok(())
    }

    pub fn clear_queued(&self, local: LocalPos, channel: LightChannel) -> bool {
        self.queued.lock()[channel.index()].remove(&local.pack())
    }

    pub fn is_queued(&self, local: LocalPos, channel: LightChannel) -> bool {
        self.queued.lock()[channel.index()].contains(&local.pack())
    }

    pub fn queued_len(&self) -> usize {
        let sets = self.queued.lock();
        sets[0].len() + sets[1].len()
    }

    // ---- diagnostics ----

    #[inline]
    pub fn record_update_tick(&self, tick: u64) {
        self.last_light_update_tick.store(tick, Ordering::Relaxed);
    }

    #[inline]
    pub fn last_light_update_tick(&self) -> u64 {
        self.last_light_update_tick.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn light_revision(&self) -> u64 {
        self.light_revision.load(Ordering::Acquire)
    }

    #[inline]
    pub fn bump_revision(&self) -> u64 {
        self.light_revision.fetch_add(1, Ordering::AcqRel) + 1
    }

    // ---- lifecycle ----

    #[inline]
    pub fn is_unloading(&self) -> bool {
        self.unloading.load(Ordering::Acquire)
    }

    pub fn set_unloading(&self, unloading: bool) {
        self.unloading.store(unloading, Ordering::Release);
    }

    /// Marks the chunk as structurally released; writes through stale handles are skipped.
    pub fn invalidate(&self) {
        self.invalidated.store(true, Ordering::Release);
        self.clear_neighbor_cache();
    }

    #[inline]
    pub fn is_invalidated(&self) -> bool {
        self.invalidated.load(Ordering::Acquire)
    }

    // ---- neighbor cache ----

    /// Cached ring neighbor in `slot`, if it is still alive and usable.
    pub fn cached_neighbor(&self, slot: usize) -> Option<ChunkRef> {
        let cache = self.neighbors.lock();
        let chunk = cache.get(slot)?.upgrade()?;
        if chunk.is_unloading() || chunk.is_invalidated() {
            return None;
        }
        Some(chunk)
    }

    pub fn cache_neighbor(&self, slot: usize, chunk: &ChunkRef) {
        if let Some(entry) = self.neighbors.lock().get_mut(slot) {
            *entry = Arc::downgrade(chunk);
        }
    }

    pub fn clear_neighbor_cache(&self) {
        *self.neighbors.lock() = Default::default();
    }
}

impl fmt::Debug for LightChunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LightChunk")
            .field("coord", &self.coord)
            .field("height", &self.height)
            .field("pending_updates", &self.pending_count())
            .field("queued", &self.queued_len())
            .field("light_revision", &self.light_revision())
            .field("unloading", &self.is_unloading())
            .field("invalidated", &self.is_invalidated())
            .finish()
    }
}
