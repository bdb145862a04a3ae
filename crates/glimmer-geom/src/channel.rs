use serde::{Deserialize, Serialize};

use crate::MAX_LIGHT;

/// One of the two independent light fields stored per voxel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightChannel {
    Sky,
    Block,
}

impl LightChannel {
    pub const ALL: [LightChannel; 2] = [LightChannel::Sky, LightChannel::Block];

    #[inline]
    pub const fn index(self) -> usize {
        match self {
            LightChannel::Sky => 0,
            LightChannel::Block => 1,
        }
    }

    /// Value reported where no chunk holds data (unloaded columns, above the world).
    #[inline]
    pub const fn default_level(self) -> u8 {
        match self {
            LightChannel::Sky => MAX_LIGHT,
            LightChannel::Block => 0,
        }
    }

    #[inline]
    pub const fn other(self) -> LightChannel {
        match self {
            LightChannel::Sky => LightChannel::Block,
            LightChannel::Block => LightChannel::Sky,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            LightChannel::Sky => "sky",
            LightChannel::Block => "block",
        }
    }
}

impl std::fmt::Display for LightChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
