use std::collections::VecDeque;
use std::sync::Arc;

use glimmer_blocks::{BlockRegistry, BlockState};
use glimmer_chunk::{ChunkError, ChunkRef, LightChunk};
use glimmer_geom::{CHUNK_SIZE, ChunkCoord, LightChannel, LocalPos, MAX_LIGHT, VoxelPos, WorldHeight};
use glimmer_lighting::{BlockView, GridAccessor, LightError};
use glimmer_runtime::{LightUpdateDone, UpdateScheduler};
use hashbrown::{HashMap, HashSet};
use log::{debug, info};
use parking_lot::{Mutex, RwLock};
use thiserror::Error;

use crate::block_store::BlockStore;
use crate::config::WorldConfig;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorldError {
    #[error("chunk {0} is already loaded")]
    AlreadyLoaded(ChunkCoord),
    #[error("chunk {0} is not loaded")]
    NotLoaded(ChunkCoord),
    #[error("{0} lies outside the world height range")]
    OutOfWorld(VoxelPos),
    #[error("unknown block `{0}`")]
    UnknownBlock(String),
    #[error("block data has {found} entries, chunk holds {expected}")]
    BlockDataLength { expected: usize, found: usize },
    #[error(transparent)]
    Light(#[from] ChunkError),
}

/// Contents of one chunk column as handed over by the loading layer.
#[derive(Clone, Debug, Default)]
pub struct ChunkData {
    /// One state per voxel in local index order; empty means all air.
    pub blocks: Vec<BlockState>,
    /// Persisted light; when absent the chunk is seeded from its heightmap.
    pub sky: Option<Vec<u8>>,
    pub block: Option<Vec<u8>>,
}

impl ChunkData {
    /// `ground` everywhere below `top_y`, air above.
    pub fn flat(height: WorldHeight, top_y: i32, ground: BlockState) -> Self {
        let layer = CHUNK_SIZE * CHUNK_SIZE;
        let solid_layers = (top_y - height.min_y).clamp(0, height.height as i32) as usize;
        let mut blocks = vec![BlockState::AIR; height.chunk_volume()];
        blocks[..solid_layers * layer].fill(ground);
        Self {
            blocks,
            sky: None,
            block: None,
        }
    }
}

/// Summary of one [`VoxelWorld::tick`].
#[derive(Debug, Default)]
pub struct TickReport {
    pub tick: u64,
    pub submitted: usize,
    pub deferred: usize,
    pub dropped: usize,
    /// Follow-up relights queued for the next tick.
    pub follow_ups: usize,
    pub unloaded: Vec<ChunkCoord>,
    pub completed: Vec<LightUpdateDone>,
}

#[derive(Default)]
struct RelightQueue {
    order: VecDeque<(VoxelPos, LightChannel)>,
    members: HashSet<(VoxelPos, LightChannel)>,
}

impl RelightQueue {
    fn push(&mut self, pos: VoxelPos, channel: LightChannel) {
        if self.members.insert((pos, channel)) {
            self.order.push_back((pos, channel));
        }
    }
}

pub struct VoxelWorld {
    height: WorldHeight,
    blocks: Arc<BlockStore>,
    chunks: RwLock<HashMap<ChunkCoord, ChunkRef>>,
    unload_queue: Mutex<Vec<ChunkCoord>>,
    relight: Mutex<RelightQueue>,
}

impl VoxelWorld {
    pub fn new(config: &WorldConfig, reg: Arc<BlockRegistry>) -> Self {
        let height = config.world_height();
        Self {
            height,
            blocks: Arc::new(BlockStore::new(reg, height)),
            chunks: RwLock::new(HashMap::new()),
            unload_queue: Mutex::new(Vec::new()),
            relight: Mutex::new(RelightQueue::default()),
        }
    }

    pub fn height(&self) -> WorldHeight {
        self.height
    }

    pub fn registry(&self) -> &Arc<BlockRegistry> {
        self.blocks.registry()
    }

    pub fn block_store(&self) -> &Arc<BlockStore> {
        &self.blocks
    }

    // ---- chunk lifecycle ----

    pub fn load_chunk(&self, coord: ChunkCoord, data: ChunkData) -> Result<ChunkRef, WorldError> {
        if self.chunks.read().contains_key(&coord) {
            return Err(WorldError::AlreadyLoaded(coord));
        }
        let volume = self.height.chunk_volume();
        let blocks = if data.blocks.is_empty() {
            vec![BlockState::AIR; volume]
        } else if data.blocks.len() == volume {
            data.blocks
        } else {
            return Err(WorldError::BlockDataLength {
                expected: volume,
                found: data.blocks.len(),
            });
        };

        let chunk = LightChunk::new(coord, self.height);
        if let Some(sky) = &data.sky {
            chunk.import_light(LightChannel::Sky, sky)?;
        }
        if let Some(block) = &data.block {
            chunk.import_light(LightChannel::Block, block)?;
        }
        self.blocks.insert(coord, &blocks);
        if data.sky.is_none() {
            self.seed_sky(&chunk);
        }
        if data.block.is_none() {
            self.queue_emitters(coord, &blocks);
        }

        let chunk = Arc::new(chunk);
        self.chunks.write().insert(coord, chunk.clone());
        debug!("loaded chunk {coord}");
        Ok(chunk)
    }

    /// Full sky at and above each column's sky floor.
    fn seed_sky(&self, chunk: &LightChunk) {
        let coord = chunk.coord();
        for z in 0..CHUNK_SIZE as i32 {
            for x in 0..CHUNK_SIZE as i32 {
                let (wx, wz) = (coord.min_x() + x, coord.min_z() + z);
                let floor = self.blocks.sky_floor(wx, wz).unwrap_or(self.height.min_y);
                for y in floor..self.height.max_y() {
                    let local = LocalPos::new(x as u8, (y - self.height.min_y) as u16, z as u8);
                    chunk.set_light(LightChannel::Sky, local, MAX_LIGHT);
                }
            }
        }
    }

    fn queue_emitters(&self, coord: ChunkCoord, blocks: &[BlockState]) {
        let reg = self.registry();
        let mut relight = self.relight.lock();
        for (i, &state) in blocks.iter().enumerate() {
            if reg.emission(state) > 0 {
                let pos = LocalPos::from_index(i).to_world(coord, self.height);
                relight.push(pos, LightChannel::Block);
            }
        }
    }

    pub fn chunk(&self, coord: ChunkCoord) -> Option<ChunkRef> {
        self.chunks.read().get(&coord).cloned()
    }

    pub fn loaded_chunks(&self) -> Vec<ChunkCoord> {
        let mut coords: Vec<ChunkCoord> = self.chunks.read().keys().copied().collect();
        coords.sort_unstable_by_key(|c| (c.cz, c.cx));
        coords
    }

    /// Blocks and light of a loaded chunk, for the storage layer.
    pub fn export_chunk(&self, coord: ChunkCoord) -> Option<ChunkData> {
        let chunk = self.chunk(coord)?;
        Some(ChunkData {
            blocks: self.blocks.export(coord)?,
            sky: Some(chunk.export_light(LightChannel::Sky)),
            block: Some(chunk.export_light(LightChannel::Block)),
        })
    }

    /// Flags a chunk for unloading. It stops accepting light work immediately and is
    /// released by [`Self::process_unloads`] once no task references it.
    pub fn request_unload(&self, coord: ChunkCoord) -> bool {
        let Some(chunk) = self.chunk(coord) else {
            return false;
        };
        if !chunk.is_unloading() {
            chunk.set_unloading(true);
            self.unload_queue.lock().push(coord);
        }
        true
    }

    pub fn is_safe_to_unload(&self, coord: ChunkCoord) -> bool {
        self.chunk(coord).is_none_or(|c| c.is_safe_to_unload())
    }

    /// Releases queued chunks with no pending light work; the rest stay queued.
    pub fn process_unloads(&self) -> Vec<ChunkCoord> {
        let mut queue = self.unload_queue.lock();
        let mut released = Vec::new();
        queue.retain(|&coord| {
            let Some(chunk) = self.chunk(coord) else {
                return false;
            };
            if !chunk.is_safe_to_unload() {
                debug!("unload of {coord} deferred: {} pending", chunk.pending_count());
                return true;
            }
            self.chunks.write().remove(&coord);
            self.blocks.remove(coord);
            chunk.invalidate();
            released.push(coord);
            false
        });
        released
    }

    // ---- blocks ----

    pub fn get_block(&self, pos: VoxelPos) -> BlockState {
        self.blocks.get_block_state(pos)
    }

    /// Replaces a block and queues relights of both channels at it.
    pub fn set_block(&self, pos: VoxelPos, state: BlockState) -> Result<BlockState, WorldError> {
        if !self.height.contains(pos.y) {
            return Err(WorldError::OutOfWorld(pos));
        }
        let coord = pos.chunk_coord();
        match self.chunk(coord) {
            Some(c) if !c.is_unloading() => {}
            _ => return Err(WorldError::NotLoaded(coord)),
        }
        let prev = self
            .blocks
            .set(pos, state)
            .ok_or(WorldError::NotLoaded(coord))?;
        if prev != state {
            let mut relight = self.relight.lock();
            relight.push(pos, LightChannel::Block);
            relight.push(pos, LightChannel::Sky);
        }
        Ok(prev)
    }

    pub fn set_block_by_name(&self, pos: VoxelPos, name: &str) -> Result<BlockState, WorldError> {
        let state = self
            .registry()
            .state_by_name(name)
            .ok_or_else(|| WorldError::UnknownBlock(name.to_string()))?;
        self.set_block(pos, state)
    }

    // ---- light ----

    /// Stored light at `pos`. Unloaded chunks and positions above the world read the
    /// channel default; positions below the world read 0.
    pub fn get_light(&self, pos: VoxelPos, channel: LightChannel) -> u8 {
        if pos.y >= self.height.max_y() {
            return channel.default_level();
        }
        if pos.y < self.height.min_y {
            return 0;
        }
        self.chunk(pos.chunk_coord())
            .and_then(|c| c.light_at(channel, pos))
            .unwrap_or(channel.default_level())
    }

    pub fn queue_relight(&self, pos: VoxelPos, channel: LightChannel) {
        self.relight.lock().push(pos, channel);
    }

    pub fn pending_relights(&self) -> usize {
        self.relight.lock().order.len()
    }

    /// Submits queued relights. Requests blocked by dedup or backpressure stay queued;
    /// ones whose chunks are gone are dropped. Returns (submitted, deferred, dropped).
    pub fn flush_relights(&self, sched: &UpdateScheduler) -> (usize, usize, usize) {
        let mut relight = self.relight.lock();
        let pending = std::mem::take(&mut relight.order);
        let (mut submitted, mut dropped) = (0, 0);
        for (pos, channel) in pending {
            match sched.try_request_light_update(self, pos, channel) {
                Ok(()) => {
                    relight.members.remove(&(pos, channel));
                    submitted += 1;
                }
                Err(LightError::AlreadyQueued { .. } | LightError::SchedulerSaturated)
                    if sched.is_accepting() =>
                {
                    relight.order.push_back((pos, channel));
                }
                Err(err) => {
                    debug!("dropping {channel} relight at {pos}: {err}");
                    relight.members.remove(&(pos, channel));
                    dropped += 1;
                }
            }
        }
        (submitted, relight.order.len(), dropped)
    }

    /// One simulation step: advances the scheduler tick, flushes relights, collects
    /// completions and follow-ups, and releases chunks whose light work has finished.
    pub fn tick(&self, sched: &UpdateScheduler) -> TickReport {
        let tick = sched.advance_tick();
        let (submitted, deferred, dropped) = self.flush_relights(sched);
        let completed = sched.drain_completed();
        let follow_ups = sched.drain_follow_ups();
        if !follow_ups.is_empty() {
            debug!("tick {tick}: {} follow-up relights", follow_ups.len());
            let mut relight = self.relight.lock();
            for &(pos, channel) in &follow_ups {
                relight.push(pos, channel);
            }
        }
        let unloaded = self.process_unloads();
        if !unloaded.is_empty() {
            info!("tick {tick}: unloaded {} chunks", unloaded.len());
        }
        TickReport {
            tick,
            submitted,
            deferred,
            dropped,
            follow_ups: follow_ups.len(),
            unloaded,
            completed,
        }
    }

    /// No relight is queued, none is running and no finished task left follow-ups behind.
    pub fn is_settled(&self, sched: &UpdateScheduler) -> bool {
        // Tasks publish follow-ups before they stop counting as in flight.
        sched.in_flight() == 0 && sched.pending_follow_ups() == 0 && self.pending_relights() == 0
    }
}

impl BlockView for VoxelWorld {
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

impl GridAccessor for VoxelWorld {
    fn get_loaded_chunk(&self, coord: ChunkCoord) -> Option<ChunkRef> {
        self.chunk(coord)
    }

    fn world_height(&self) -> WorldHeight {
        self.height
    }

    fn block_view(&self) -> Arc<dyn BlockView> {
        self.blocks.clone()
    }
}
