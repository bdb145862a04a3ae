pub type BlockId = u16;

/// Opaque handle for a block as stored in a chunk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct BlockState(pub BlockId);

impl BlockState {
    pub const AIR: BlockState = BlockState(0);

    #[inline]
    pub const fn id(self) -> BlockId {
        self.0
    }

    #[inline]
    pub const fn is_air(self) -> bool {
        self.0 == 0
    }
}
