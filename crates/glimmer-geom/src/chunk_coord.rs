use serde::{Deserialize, Serialize};

use crate::CHUNK_SHIFT;

/// Column coordinate of a chunk; chunks span the full world height.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkCoord {
    pub cx: i32,
    pub cz: i32,
}

impl ChunkCoord {
    #[inline]
    pub const fn new(cx: i32, cz: i32) -> Self {
        Self { cx, cz }
    }

    /// Chunk owning the world column `(x, z)`.
    #[inline]
    pub const fn of_voxel(x: i32, z: i32) -> Self {
        Self {
            cx: x >> CHUNK_SHIFT,
            cz: z >> CHUNK_SHIFT,
        }
    }

    #[inline]
    pub fn offset(self, dx: i32, dz: i32) -> Self {
        Self {
            cx: self.cx + dx,
            cz: self.cz + dz,
        }
    }

    #[inline]
    pub const fn min_x(self) -> i32 {
        self.cx << CHUNK_SHIFT
    }

    #[inline]
    pub const fn min_z(self) -> i32 {
        self.cz << CHUNK_SHIFT
    }

    /// Chebyshev distance in chunks; the 8 ring neighbors are at distance 1.
    #[inline]
    pub fn ring_distance(self, other: ChunkCoord) -> i32 {
        (self.cx - other.cx).abs().max((self.cz - other.cz).abs())
    }
}

impl From<(i32, i32)> for ChunkCoord {
    fn from(value: (i32, i32)) -> Self {
        Self::new(value.0, value.1)
    }
}

impl From<ChunkCoord> for (i32, i32) {
    fn from(value: ChunkCoord) -> Self {
        (value.cx, value.cz)
    }
}

impl std::fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.cx, self.cz)
    }
}
