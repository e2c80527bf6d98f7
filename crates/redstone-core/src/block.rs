//! Host-facing block identities.
//!
//! The host owns block storage and reports each position as a [`Block`].
//! Only the handful of categories the propagation engine distinguishes are
//! modelled; everything else maps to [`Block::Solid`] (conducts power) or
//! [`Block::Transparent`] (does not).

use serde::{Deserialize, Serialize};

use crate::pos::Direction;

/// Maximum signal strength.
pub const MAX_SIGNAL: u8 = 15;

/// What occupies a position, as far as signal propagation is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Block {
    Air,
    /// A full cube that conducts power one block further. The payload is an
    /// opaque host identifier (stone, lamp, TNT...).
    Solid(u32),
    /// A block that neither conducts nor emits (glass, slabs...).
    Transparent(u32),
    /// Constant source: weak power 15 toward every face.
    PowerBlock,
    /// Redstone dust carrying `power` (0..=15).
    Wire { power: u8 },
    /// A gate or host-driven source. Its dynamic state is owned by the engine.
    Gate(GateBlock),
}

impl Block {
    pub fn is_conductor(self) -> bool {
        matches!(self, Block::Solid(_))
    }

    pub fn is_wire(self) -> bool {
        matches!(self, Block::Wire { .. })
    }

    pub fn gate(self) -> Option<GateBlock> {
        match self {
            Block::Gate(gate) => Some(gate),
            _ => None,
        }
    }

    /// Whether the block is a repeater or comparator.
    pub fn is_diode(self) -> bool {
        self.gate().is_some_and(|g| g.kind.is_diode())
    }
}

/// A gate as stored by the host. `powered` mirrors the engine's committed
/// output and is rewritten on every commit; it is never read back as input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateBlock {
    pub kind: GateKind,
    /// Direction of the output face. Observers face the block they watch and
    /// emit out of their back.
    pub facing: Direction,
    #[serde(default)]
    pub powered: bool,
}

impl GateBlock {
    pub fn new(kind: GateKind, facing: Direction) -> Self {
        Self {
            kind,
            facing,
            powered: false,
        }
    }

    /// Two gate blocks are the same occupant when kind and facing match.
    /// Configuration (repeater delay, comparator mode) may differ.
    pub fn same_identity(&self, other: &GateBlock) -> bool {
        self.kind.tag() == other.kind.tag() && self.facing == other.facing
    }
}

/// Comparator operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparatorMode {
    Compare,
    Subtract,
}

/// The closed set of gate kinds. Each supplies its own policy callbacks in
/// [`crate::gate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateKind {
    /// Delay setting in redstone ticks (1..=4); two game ticks each.
    Repeater { delay: u8 },
    Comparator { mode: ComparatorMode },
    /// `attached` points from the torch to the block it is mounted on
    /// (`Down` for a standing torch).
    Torch { attached: Direction },
    Observer,
    /// `attached` points to the block the lever is mounted on.
    Lever { attached: Direction },
    /// `attached` points to the block the button is mounted on.
    Button { attached: Direction },
}

/// Discriminant of [`GateKind`] without configuration payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GateTag {
    Repeater,
    Comparator,
    Torch,
    Observer,
    Lever,
    Button,
}

impl GateKind {
    pub fn tag(&self) -> GateTag {
        match self {
            GateKind::Repeater { .. } => GateTag::Repeater,
            GateKind::Comparator { .. } => GateTag::Comparator,
            GateKind::Torch { .. } => GateTag::Torch,
            GateKind::Observer => GateTag::Observer,
            GateKind::Lever { .. } => GateTag::Lever,
            GateKind::Button { .. } => GateTag::Button,
        }
    }

    pub fn is_diode(&self) -> bool {
        matches!(self, GateKind::Repeater { .. } | GateKind::Comparator { .. })
    }
}
