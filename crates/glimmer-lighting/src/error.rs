use glimmer_geom::{ChunkCoord, LightChannel, VoxelPos};
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LightError {
    #[error("chunk {coord} is not loaded")]
    ChunkNotLoaded { coord: ChunkCoord },
    #[error("light scheduler is saturated or shut down")]
    SchedulerSaturated,
    #[error("snapshot of chunk {coord} is stale")]
    StaleSnapshot { coord: ChunkCoord },
    #[error("{pos} is already queued for a {channel} light update")]
    AlreadyQueued { pos: VoxelPos, channel: LightChannel },
    #[error("{pos} lies outside the world height range")]
    OutOfWorld { pos: VoxelPos },
}
