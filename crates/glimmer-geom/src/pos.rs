use serde::{Deserialize, Serialize};

use crate::{CHUNK_MASK, CHUNK_SIZE, ChunkCoord, Face, WorldHeight};

/// Integer voxel position in world space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VoxelPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl VoxelPos {
    #[inline]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            z: self.z + dz,
        }
    }

    #[inline]
    pub const fn step(self, face: Face) -> Self {
        let (dx, dy, dz) = face.delta();
        self.offset(dx, dy, dz)
    }

    #[inline]
    pub const fn chunk_coord(self) -> ChunkCoord {
        ChunkCoord::of_voxel(self.x, self.z)
    }

    #[inline]
    pub fn manhattan(self, other: VoxelPos) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y) + self.z.abs_diff(other.z)
    }

    /// Position inside the owning chunk, or `None` outside the world height.
    #[inline]
    pub fn local(self, height: WorldHeight) -> Option<LocalPos> {
        let y = height.local_y(self.y)?;
        Some(LocalPos {
            x: (self.x & CHUNK_MASK) as u8,
            y: y as u16,
            z: (self.z & CHUNK_MASK) as u8,
        })
    }
}

impl std::fmt::Display for VoxelPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Voxel position relative to its chunk; `y` counts up from the world floor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LocalPos {
    pub x: u8,
    pub y: u16,
    pub z: u8,
}

impl LocalPos {
    #[inline]
    pub const fn new(x: u8, y: u16, z: u8) -> Self {
        Self { x, y, z }
    }

    /// Flat index into a chunk's voxel arrays, `(y * 16 + z) * 16 + x`.
    #[inline]
    pub const fn index(self) -> usize {
        (self.y as usize * CHUNK_SIZE + self.z as usize) * CHUNK_SIZE + self.x as usize
    }

    #[inline]
    pub const fn from_index(index: usize) -> Self {
        Self {
            x: (index % CHUNK_SIZE) as u8,
            z: ((index / CHUNK_SIZE) % CHUNK_SIZE) as u8,
            y: (index / (CHUNK_SIZE * CHUNK_SIZE)) as u16,
        }
    }

    /// Packed key used by the dedup sets.
    #[inline]
    pub const fn pack(self) -> u32 {
        ((self.y as u32) << 8) | ((self.z as u32) << 4) | self.x as u32
    }

    #[inline]
    pub const fn unpack(packed: u32) -> Self {
        Self {
            x: (packed & 0xF) as u8,
            z: ((packed >> 4) & 0xF) as u8,
            y: (packed >> 8) as u16,
        }
    }

    #[inline]
    pub fn to_world(self, coord: ChunkCoord, height: WorldHeight) -> VoxelPos {
        VoxelPos::new(
            coord.min_x() + i32::from(self.x),
            height.min_y + i32::from(self.y),
            coord.min_z() + i32::from(self.z),
        )
    }
}
