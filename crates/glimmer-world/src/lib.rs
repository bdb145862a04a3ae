//! In-memory voxel world: block storage, chunk lifecycle and the light read path.
#![forbid(unsafe_code)]

mod block_store;
mod config;
mod world;

pub use block_store::BlockStore;
pub use config::WorldConfig;
pub use world::{ChunkData, TickReport, VoxelWorld, WorldError};
