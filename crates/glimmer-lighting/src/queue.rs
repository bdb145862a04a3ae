use glimmer_geom::VoxelPos;

/// A queued voxel, stored relative to the propagation origin.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueEntry {
    pub dx: i8,
    pub dy: i8,
    pub dz: i8,
    pub level: u8,
}

impl QueueEntry {
    pub const MIN_DELTA: i32 = -32;
    pub const MAX_DELTA: i32 = 31;

    /// `None` when `pos` is outside the delta window around `origin`.
    pub fn relative(origin: VoxelPos, pos: VoxelPos, level: u8) -> Option<Self> {
        let window = Self::MIN_DELTA..=Self::MAX_DELTA;
        let (dx, dy, dz) = (pos.x - origin.x, pos.y - origin.y, pos.z - origin.z);
        if !(window.contains(&dx) && window.contains(&dy) && window.contains(&dz)) {
            return None;
        }
        Some(Self {
            dx: dx as i8,
            dy: dy as i8,
            dz: dz as i8,
            level,
        })
    }

    #[inline]
    pub fn position(self, origin: VoxelPos) -> VoxelPos {
        origin.offset(self.dx as i32, self.dy as i32, self.dz as i32)
    }
}

/// Fixed-capacity FIFO with a rewindable read cursor. Entries are never
/// removed during a propagation, so the brightening pass can re-walk
/// everything the darkening pass queued.
#[derive(Debug)]
pub struct WorkQueue {
    entries: Vec<QueueEntry>,
    capacity: usize,
    read: usize,
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl WorkQueue {
    pub const DEFAULT_CAPACITY: usize = 32_768;

    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
            read: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries written since the last clear, including already-read ones.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries not yet read.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.entries.len() - self.read
    }

    /// True while `n` more entries fit with room to spare.
    #[inline]
    pub fn has_room(&self, n: usize) -> bool {
        self.entries.len() < self.capacity.saturating_sub(n)
    }

    /// Returns false when full.
    #[inline]
    pub fn push(&mut self, entry: QueueEntry) -> bool {
        if self.entries.len() >= self.capacity {
            return false;
        }
        self.entries.push(entry);
        true
    }

    #[inline]
    pub fn pop(&mut self) -> Option<QueueEntry> {
        let entry = self.entries.get(self.read).copied()?;
        self.read += 1;
        Some(entry)
    }

    pub fn rewind(&mut self) {
        self.read = 0;
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.read = 0;
    }
}
