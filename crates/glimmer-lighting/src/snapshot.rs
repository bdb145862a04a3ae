use glimmer_chunk::{ChunkRef, LightChunk, NEIGHBOR_OFFSETS};
use glimmer_geom::{ChunkCoord, LightChannel, VoxelPos, WorldHeight};

use crate::access::GridAccessor;

/// Where a world position lands relative to a snapshot.
#[derive(Clone, Copy, Debug)]
pub enum Cell<'a> {
    Inside { chunk: &'a ChunkRef, index: usize, slot: usize },
    Above,
    Below,
    Outside,
}

/// Owner chunk plus its eight ring neighbors, captured on the simulation thread.
#[derive(Clone, Debug)]
pub struct ChunkSnapshotSet {
    center: ChunkCoord,
    height: WorldHeight,
    // Row-major over (dz, dx) in [-1, 1]; the owner sits at CENTER_SLOT.
    chunks: [ChunkRef; 9],
}

const CENTER_SLOT: usize = 4;

#[inline]
fn grid_slot(dx: i32, dz: i32) -> Option<usize> {
    if (-1..=1).contains(&dx) && (-1..=1).contains(&dz) {
        Some(((dz + 1) * 3 + (dx + 1)) as usize)
    } else {
        None
    }
}

impl ChunkSnapshotSet {
    /// `neighbors` must follow [`NEIGHBOR_OFFSETS`] order around `owner`.
    pub fn new(owner: ChunkRef, neighbors: [ChunkRef; 8]) -> Self {
        let center = owner.coord();
        let height = owner.height();
        let [n0, n1, n2, n3, n4, n5, n6, n7] = neighbors;
        debug_assert!(
            [&n0, &n1, &n2, &n3, &n4, &n5, &n6, &n7]
                .iter()
                .zip(NEIGHBOR_OFFSETS)
                .all(|(c, (dx, dz))| c.coord() == center.offset(dx, dz)),
            "neighbors out of order around {center}"
        );
        // NEIGHBOR_OFFSETS is row-major with the center removed.
        let chunks = [n0, n1, n2, n3, owner, n4, n5, n6, n7];
        Self {
            center,
            height,
            chunks,
        }
    }

    #[inline]
    pub fn center(&self) -> ChunkCoord {
        self.center
    }

    #[inline]
    pub fn height(&self) -> WorldHeight {
        self.height
    }

    #[inline]
    pub fn owner(&self) -> &ChunkRef {
        &self.chunks[CENTER_SLOT]
    }

    pub fn chunks(&self) -> &[ChunkRef; 9] {
        &self.chunks
    }

    pub fn locate(&self, pos: VoxelPos) -> Cell<'_> {
        if pos.y >= self.height.max_y() {
            return Cell::Above;
        }
        if pos.y < self.height.min_y {
            return Cell::Below;
        }
        let coord = pos.chunk_coord();
        let Some(slot) = grid_slot(coord.cx - self.center.cx, coord.cz - self.center.cz) else {
            return Cell::Outside;
        };
        match pos.local(self.height) {
            Some(local) => Cell::Inside {
                chunk: &self.chunks[slot],
                index: local.index(),
                slot,
            },
            None => Cell::Outside,
        }
    }

    /// Stored light as the engine sees it: channel default above the world, 0 below it or
    /// outside the snapshot.
    pub fn read(&self, pos: VoxelPos, channel: LightChannel) -> u8 {
        match self.locate(pos) {
            Cell::Inside { chunk, index, .. } => chunk.get_light_index(channel, index),
            Cell::Above => channel.default_level(),
            Cell::Below | Cell::Outside => 0,
        }
    }

    #[inline]
    pub fn is_writable(&self, pos: VoxelPos) -> bool {
        matches!(self.locate(pos), Cell::Inside { .. })
    }
}

/// Resolves the ring around `chunk`, or the first coordinate that is missing.
pub fn try_resolve_neighbors<G>(grid: &G, chunk: &LightChunk) -> Result<[ChunkRef; 8], ChunkCoord>
where
    G: GridAccessor + ?Sized,
{
    let center = chunk.coord();
    let mut ring = Vec::with_capacity(NEIGHBOR_OFFSETS.len());
    for (slot, &(dx, dz)) in NEIGHBOR_OFFSETS.iter().enumerate() {
        let coord = center.offset(dx, dz);
        if let Some(cached) = chunk.cached_neighbor(slot) {
            if !grid.is_chunk_unloading(&cached) {
                ring.push(cached);
                continue;
            }
        }
        match grid.get_loaded_chunk(coord) {
            Some(found) if !grid.is_chunk_unloading(&found) && !found.is_invalidated() => {
                chunk.cache_neighbor(slot, &found);
                ring.push(found);
            }
            _ => return Err(coord),
        }
    }
    ring.try_into().map_err(|_| center)
}

/// Resolves all eight ring neighbors of `chunk`. Simulation thread only.
pub fn resolve_neighbors<G>(grid: &G, chunk: &LightChunk) -> Option<[ChunkRef; 8]>
where
    G: GridAccessor + ?Sized,
{
    try_resolve_neighbors(grid, chunk).ok()
}
