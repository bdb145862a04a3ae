//! Block states and their light properties.
#![forbid(unsafe_code)]

pub mod config;
pub mod registry;
pub mod types;

pub use config::{BlockDef, BlocksConfig};
pub use registry::{BlockRegistry, BlockType, BlocksError};
pub use types::{BlockId, BlockState};
