use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::config::BlocksConfig;
use super::types::{BlockId, BlockState};

const BUILTIN_BLOCKS: &str = include_str!("../assets/blocks.toml");
const MAX_LEVEL: u8 = 15;

#[derive(Debug, Error)]
pub enum BlocksError {
    #[error("failed to read block table {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse block table: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("duplicate block name `{0}`")]
    DuplicateName(String),
    #[error("block id {id} is used by both `{first}` and `{second}`")]
    DuplicateId {
        id: BlockId,
        first: String,
        second: String,
    },
    #[error("block id 0 must be a transparent `air` block, found `{0}`")]
    InvalidAir(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockType {
    pub id: BlockId,
    pub name: String,
    pub opacity: u8,
    pub emission: u8,
}

impl BlockType {
    /// Stand-in for ids the table does not define: opaque and dark.
    fn placeholder(id: BlockId) -> Self {
        BlockType {
            id,
            name: format!("unknown_{id}"),
            opacity: MAX_LEVEL,
            emission: 0,
        }
    }

    #[inline]
    pub fn is_transparent(&self) -> bool {
        self.opacity == 0
    }
}

#[derive(Clone, Debug, Default)]
pub struct BlockRegistry {
    pub blocks: Vec<BlockType>,
    pub by_name: HashMap<String, BlockId>,
}

impl BlockRegistry {
    /// The table shipped in `assets/blocks.toml`.
    pub fn builtin() -> Result<Self, BlocksError> {
        Self::from_toml_str(BUILTIN_BLOCKS)
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, BlocksError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| BlocksError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, BlocksError> {
        let cfg: BlocksConfig = toml::from_str(text)?;
        Self::from_config(cfg)
    }

    pub fn from_config(cfg: BlocksConfig) -> Result<Self, BlocksError> {
        let mut reg = BlockRegistry::default();
        let mut defined: Vec<bool> = Vec::new();
        for def in cfg.blocks {
            let id = def.id.unwrap_or(reg.blocks.len() as BlockId);
            if reg.by_name.contains_key(&def.name) {
                return Err(BlocksError::DuplicateName(def.name));
            }
            let slot = id as usize;
            if slot >= reg.blocks.len() {
                let start = reg.blocks.len();
                reg.blocks
                    .extend((start..=slot).map(|i| BlockType::placeholder(i as BlockId)));
                defined.resize(slot + 1, false);
            }
            if defined[slot] {
                return Err(BlocksError::DuplicateId {
                    id,
                    first: reg.blocks[slot].name.clone(),
                    second: def.name,
                });
            }
            let ty = BlockType {
                id,
                name: def.name,
                opacity: def.opacity.unwrap_or(MAX_LEVEL).min(MAX_LEVEL),
                emission: def.emission.unwrap_or(0).min(MAX_LEVEL),
            };
            reg.by_name.insert(ty.name.clone(), id);
            reg.blocks[slot] = ty;
            defined[slot] = true;
        }
        match reg.blocks.first() {
            Some(air) if air.name == "air" && air.is_transparent() && air.emission == 0 => {}
            Some(other) => return Err(BlocksError::InvalidAir(other.name.clone())),
            None => return Err(BlocksError::InvalidAir(String::new())),
        }
        Ok(reg)
    }

    #[inline]
    pub fn get(&self, id: BlockId) -> Option<&BlockType> {
        self.blocks.get(id as usize)
    }

    pub fn id_by_name(&self, name: &str) -> Option<BlockId> {
        self.by_name.get(name).copied()
    }

    pub fn state_by_name(&self, name: &str) -> Option<BlockState> {
        self.id_by_name(name).map(BlockState)
    }

    /// Light opacity in `[0, 15]`; unknown states are opaque.
    #[inline]
    pub fn opacity(&self, state: BlockState) -> u8 {
        self.get(state.id()).map(|ty| ty.opacity).unwrap_or(MAX_LEVEL)
    }

    #[inline]
    pub fn emission(&self, state: BlockState) -> u8 {
        self.get(state.id()).map(|ty| ty.emission).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}
