use glimmer_chunk::{ChunkRef, LightChunk};
use glimmer_geom::{LightChannel, LocalPos};

use crate::snapshot::ChunkSnapshotSet;

#[inline]
pub fn pending_count(chunk: &LightChunk) -> u32 {
    chunk.pending_count()
}

#[inline]
pub fn is_safe_to_unload(chunk: &LightChunk) -> bool {
    chunk.is_safe_to_unload()
}

/// Holds one pending increment on every chunk of a snapshot, plus optionally the
/// origin's dedup mark. Dropping the lease releases both, including during unwinding.
#[derive(Debug)]
pub struct PendingLease {
    chunks: Vec<ChunkRef>,
    mark: Option<(ChunkRef, LocalPos, LightChannel)>,
}

impl PendingLease {
    pub fn acquire(snapshot: &ChunkSnapshotSet) -> Self {
        let chunks: Vec<ChunkRef> = snapshot.chunks().to_vec();
        for chunk in &chunks {
            chunk.increment_pending();
        }
        Self { chunks, mark: None }
    }

    /// Takes ownership of a dedup mark already placed on `owner`.
    pub fn with_mark(mut self, owner: ChunkRef, local: LocalPos, channel: LightChannel) -> Self {
        self.mark = Some((owner, local, channel));
        self
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }
}

impl Drop for PendingLease {
    fn drop(&mut self) {
        if let Some((owner, local, channel)) = self.mark.take() {
            owner.clear_queued(local, channel);
        }
        for chunk in self.chunks.drain(..) {
            chunk.decrement_pending();
        }
    }
}
