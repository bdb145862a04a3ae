use std::sync::Arc;

use glimmer_blocks::BlockState;
use glimmer_chunk::{ChunkRef, LightChunk};
use glimmer_geom::{ChunkCoord, VoxelPos, WorldHeight};

/// Block properties readable from any thread. Light tasks hold one of these
/// instead of the whole accessor.
pub trait BlockView: Send + Sync {
    fn get_block_state(&self, pos: VoxelPos) -> BlockState;

    /// Opacity in `[0, 15]`.
    fn get_light_opacity(&self, state: BlockState) -> u8;

    /// Emission in `[0, 15]`.
    fn get_light_emission(&self, state: BlockState) -> u8;

    /// Whether nothing opaque sits above `pos` in its column.
    fn can_see_sky(&self, pos: VoxelPos) -> bool;
}

/// World-side capabilities the scheduler consumes. Lookups never load or generate chunks.
pub trait GridAccessor: BlockView {
    fn get_loaded_chunk(&self, coord: ChunkCoord) -> Option<ChunkRef>;

    fn is_chunk_unloading(&self, chunk: &LightChunk) -> bool {
        chunk.is_unloading()
    }

    fn world_height(&self) -> WorldHeight;

    fn block_view(&self) -> Arc<dyn BlockView>;

    fn chunk_coords_of(&self, pos: VoxelPos) -> ChunkCoord {
        pos.chunk_coord()
    }
}
