//! Incremental two-phase light propagation over a 3x3 chunk snapshot.
#![forbid(unsafe_code)]

pub mod access;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod queue;
pub mod snapshot;

pub use access::{BlockView, GridAccessor};
pub use engine::{PropagationOutcome, SPREAD_RADIUS, dirty_chunks, propagate, raw_light};
pub use error::LightError;
pub use ledger::{PendingLease, is_safe_to_unload, pending_count};
pub use queue::{QueueEntry, WorkQueue};
pub use snapshot::{ChunkSnapshotSet, resolve_neighbors, try_resolve_neighbors};
