//! Voxel and chunk coordinates shared by the lighting crates.
#![forbid(unsafe_code)]

mod channel;
mod chunk_coord;
mod face;
mod height;
mod pos;

pub use channel::LightChannel;
pub use chunk_coord::ChunkCoord;
pub use face::Face;
pub use height::WorldHeight;
pub use pos::{LocalPos, VoxelPos};

/// Horizontal edge length of a chunk, in voxels.
pub const CHUNK_SIZE: usize = 16;
pub const CHUNK_SHIFT: i32 = 4;
pub const CHUNK_MASK: i32 = (CHUNK_SIZE as i32) - 1;

/// Brightest value either light channel can hold.
pub const MAX_LIGHT: u8 = 15;
