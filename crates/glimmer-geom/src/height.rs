use serde::{Deserialize, Serialize};

/// Vertical extent of the world: `y` ranges over `[min_y, min_y + height)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldHeight {
    pub min_y: i32,
    pub height: usize,
}

impl Default for WorldHeight {
    fn default() -> Self {
        Self {
            min_y: 0,
            height: 256,
        }
    }
}

impl WorldHeight {
    #[inline]
    pub const fn new(min_y: i32, height: usize) -> Self {
        Self { min_y, height }
    }

    /// One past the topmost valid `y`.
    #[inline]
    pub const fn max_y(self) -> i32 {
        self.min_y + self.height as i32
    }

    #[inline]
    pub const fn contains(self, y: i32) -> bool {
        y >= self.min_y && y < self.max_y()
    }

    #[inline]
    pub fn local_y(self, y: i32) -> Option<usize> {
        if self.contains(y) {
            Some((y - self.min_y) as usize)
        } else {
            None
        }
    }

    /// Voxels in one chunk column of this height.
    #[inline]
    pub const fn chunk_volume(self) -> usize {
        crate::CHUNK_SIZE * crate::CHUNK_SIZE * self.height
    }
}
