use std::sync::Arc;
use std::sync::atomic::{AtomicI32, AtomicU16, Ordering};

use glimmer_blocks::{BlockRegistry, BlockState};
use glimmer_geom::{CHUNK_SIZE, ChunkCoord, LocalPos, VoxelPos, WorldHeight};
use glimmer_lighting::BlockView;
use hashbrown::HashMap;
use parking_lot::RwLock;

/// Blocks of one chunk column plus its sky heightmap.
struct BlockColumn {
    blocks: Box<[AtomicU16]>,
    // Lowest y that sees the sky, per (x, z).
    sky_floor: Box<[AtomicI32]>,
}

#[inline]
fn column_index(x: i32, z: i32) -> usize {
    ((z as usize & (CHUNK_SIZE - 1)) * CHUNK_SIZE) + (x as usize & (CHUNK_SIZE - 1))
}

/// Concurrently readable block storage; the read-only half of the world that light tasks capture.
pub struct BlockStore {
    reg: Arc<BlockRegistry>,
    height: WorldHeight,
    columns: RwLock<HashMap<ChunkCoord, Arc<BlockColumn>>>,
}

impl BlockStore {
    pub fn new(reg: Arc<BlockRegistry>, height: WorldHeight) -> Self {
        Self {
            reg,
            height,
            columns: RwLock::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &Arc<BlockRegistry> {
        &self.reg
    }

    /// `blocks` is in local index order and must match the chunk volume.
    pub(crate) fn insert(&self, coord: ChunkCoord, blocks: &[BlockState]) {
        let blocks: Box<[AtomicU16]> = blocks.iter().map(|b| AtomicU16::new(b.id())).collect();
        let sky_floor = (0..CHUNK_SIZE * CHUNK_SIZE)
            .map(|_| AtomicI32::new(self.height.min_y))
            .collect();
        let column = BlockColumn { blocks, sky_floor };
        for z in 0..CHUNK_SIZE as i32 {
            for x in 0..CHUNK_SIZE as i32 {
                let floor = self.scan_sky_floor(&column, x, z, self.height.max_y() - 1);
                column.sky_floor[column_index(x, z)].store(floor, Ordering::Relaxed);
            }
        }
        self.columns.write().insert(coord, Arc::new(column));
    }

    pub(crate) fn remove(&self, coord: ChunkCoord) {
        self.columns.write().remove(&coord);
    }

    fn column(&self, coord: ChunkCoord) -> Option<Arc<BlockColumn>> {
        self.columns.read().get(&coord).cloned()
    }

    /// First y above the highest light-blocking block at or below `from_y`.
    fn scan_sky_floor(&self, column: &BlockColumn, x: i32, z: i32, from_y: i32) -> i32 {
        let mut y = from_y;
        while y >= self.height.min_y {
            let local = LocalPos::new(x as u8, (y - self.height.min_y) as u16, z as u8);
            let state = BlockState(column.blocks[local.index()].load(Ordering::Relaxed));
            if self.reg.opacity(state) > 0 {
                return y + 1;
            }
            y -= 1;
        }
        self.height.min_y
    }

    /// Stores `state` and keeps the heightmap current. Returns the previous state, or
    /// `None` when the column is not stored or `pos` is outside the world.
    pub(crate) fn set(&self, pos: VoxelPos, state: BlockState) -> Option<BlockState> {
        let local = pos.local(self.height)?;
        let column = self.column(pos.chunk_coord())?;
        let prev = BlockState(column.blocks[local.index()].swap(state.id(), Ordering::AcqRel));
        let cell = &column.sky_floor[column_index(pos.x, pos.z)];
        let floor = cell.load(Ordering::Relaxed);
        if self.reg.opacity(state) > 0 {
            if pos.y >= floor {
                cell.store(pos.y + 1, Ordering::Release);
            }
        } else if pos.y + 1 == floor {
            let lowered = self.scan_sky_floor(&column, local.x as i32, local.z as i32, pos.y - 1);
            cell.store(lowered, Ordering::Release);
        }
        Some(prev)
    }

    pub fn sky_floor(&self, x: i32, z: i32) -> Option<i32> {
        let columns = self.columns.read();
        let column = columns.get(&ChunkCoord::of_voxel(x, z))?;
        Some(column.sky_floor[column_index(x, z)].load(Ordering::Acquire))
    }

    pub(crate) fn export(&self, coord: ChunkCoord) -> Option<Vec<BlockState>> {
        let column = self.column(coord)?;
        Some(
            column
                .blocks
                .iter()
                .map(|b| BlockState(b.load(Ordering::Relaxed)))
                .collect(),
        )
    }
}

impl BlockView for BlockStore {
    fn get_block_state(&self, pos: VoxelPos) -> BlockState {
        let Some(local) = pos.local(self.height) else {
            return BlockState::AIR;
        };
        self.columns
            .read()
            .get(&pos.chunk_coord())
            .map(|c| BlockState(c.blocks[local.index()].load(Ordering::Relaxed)))
            .unwrap_or(BlockState::AIR)
    }

    fn get_light_opacity(&self, state: BlockState) -> u8 {
        self.reg.opacity(state)
    }

    fn get_light_emission(&self, state: BlockState) -> u8 {
        self.reg.emission(state)
    }

    fn can_see_sky(&self, pos: VoxelPos) -> bool {
        match self.sky_floor(pos.x, pos.z) {
            Some(floor) => pos.y >= floor,
            None => true,
        }
    }
}
