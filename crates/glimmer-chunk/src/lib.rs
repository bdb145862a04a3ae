//! Per-chunk light state shared between the simulation thread and light workers.
#![forbid(unsafe_code)]

mod light_chunk;
mod nibble;

pub use light_chunk::{ChunkError, ChunkRef, LightChunk, NEIGHBOR_OFFSETS, neighbor_slot};
pub use nibble::NibbleArray;
