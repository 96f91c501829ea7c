use std::fmt;

use serde::{Deserialize, Serialize};

/// On-chain ordering position of an event.
///
/// Events are totally ordered by block number, then by log index within the
/// block. The derived `Ord` follows field order, which gives exactly that.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct BlockPosition {
    /// Block height the event was emitted in.
    pub block_number: u64,
    /// Index of the log entry within its block.
    pub log_index: u32,
}

impl BlockPosition {
    pub const fn new(block_number: u64, log_index: u32) -> Self {
        Self {
            block_number,
            log_index,
        }
    }

    /// The genesis position.
    pub const fn zero() -> Self {
        Self::new(0, 0)
    }

    pub fn is_after(&self, other: &Self) -> bool {
        self > other
    }

    pub fn is_before(&self, other: &Self) -> bool {
        self < other
    }
}

impl fmt::Debug for BlockPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockPosition({}:{})", self.block_number, self.log_index)
    }
}

impl fmt::Display for BlockPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}:{}", self.block_number, self.log_index)
    }
}
