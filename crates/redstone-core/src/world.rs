//! The host capability the engine is written against.
//!
//! The engine never stores block identities. It reads and writes them
//! through a [`WorldView`] borrowed for the duration of each call, so the
//! same engine works against any block store the host provides.

use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

use crate::block::Block;
use crate::pos::BlockPos;

/// Flags passed through to the host on every block write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct UpdateFlags(u8);

impl UpdateFlags {
    pub const NONE: UpdateFlags = UpdateFlags(0);
    /// The host should run its own neighbor reactions for this write.
    pub const NOTIFY_NEIGHBORS: UpdateFlags = UpdateFlags(1);
    /// The change should be replicated to observers of the world.
    pub const SEND_TO_CLIENTS: UpdateFlags = UpdateFlags(2);
    pub const DEFAULT: UpdateFlags = UpdateFlags(1 | 2);

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, other: UpdateFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for UpdateFlags {
    type Output = UpdateFlags;

    fn bitor(self, rhs: UpdateFlags) -> UpdateFlags {
        UpdateFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for UpdateFlags {
    fn bitor_assign(&mut self, rhs: UpdateFlags) {
        self.0 |= rhs.0;
    }
}

/// Block storage owned by the host.
pub trait WorldView {
    /// The block at `pos`. Unknown positions report [`Block::Air`].
    fn block(&self, pos: BlockPos) -> Block;

    /// Overwrite the block at `pos`. The engine only writes wire power levels
    /// and the `powered` display bit of gates.
    fn set_block(&mut self, pos: BlockPos, block: Block, flags: UpdateFlags);

    /// Unloaded positions read as empty and are never updated.
    fn is_loaded(&self, _pos: BlockPos) -> bool {
        true
    }

    /// Analog value of a container-like block, read by comparators through
    /// their rear face.
    fn analog_signal(&self, _pos: BlockPos) -> Option<u8> {
        None
    }

    /// A non-redstone block at `pos` saw a neighbor at `from` change. Lamps,
    /// TNT and similar consumers react here, typically by querying
    /// [`crate::engine::RedstoneEngine::has_any_neighbor_signal`].
    fn neighbor_changed(&mut self, _pos: BlockPos, _from: BlockPos) {}
}
