//! Serde data file structs for circuit fixtures.
//!
//! A circuit file names a palette of blocks and places them on the grid.
//! Files are deserialized from RON, JSON, or TOML and then resolved into
//! positioned [`Block`](redstone_core::block::Block)s by the loader.

use redstone_core::block::ComparatorMode;
use redstone_core::pos::Direction;
use serde::Deserialize;

// ===========================================================================
// Blocks
// ===========================================================================

/// A block definition, e.g. `Repeater(facing: east, delay: 2)` in RON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum BlockData {
    Air,
    Solid {
        #[serde(default = "default_solid_id")]
        id: u32,
    },
    Transparent {
        #[serde(default)]
        id: u32,
    },
    PowerBlock,
    Wire,
    Repeater {
        facing: Direction,
        #[serde(default = "default_delay")]
        delay: u8,
    },
    Comparator {
        facing: Direction,
        #[serde(default = "default_mode")]
        mode: ComparatorMode,
    },
    Torch {
        #[serde(default = "default_attached")]
        attached: Direction,
    },
    Observer {
        facing: Direction,
    },
    Lever {
        #[serde(default = "default_attached")]
        attached: Direction,
        #[serde(default)]
        powered: bool,
    },
    Button {
        #[serde(default = "default_attached")]
        attached: Direction,
    },
}

fn default_solid_id() -> u32 {
    1
}

fn default_delay() -> u8 {
    1
}

fn default_mode() -> ComparatorMode {
    ComparatorMode::Compare
}

fn default_attached() -> Direction {
    Direction::Down
}

/// A named block in the circuit's palette.
#[derive(Debug, Clone, Deserialize)]
pub struct PaletteEntry {
    pub name: String,
    pub block: BlockData,
}

// ===========================================================================
// Placements
// ===========================================================================

/// One placement, optionally repeated in a straight run.
#[derive(Debug, Clone, Deserialize)]
pub struct PlacementData {
    /// `[x, y, z]` of the first block.
    pub at: [i32; 3],
    /// Palette name, or one of the built-in names (`stone`, `glass`, `wire`,
    /// `power_block`).
    pub block: String,
    /// Copies placed along `step`, including the first.
    #[serde(default = "default_count")]
    pub count: u32,
    #[serde(default = "default_step")]
    pub step: Direction,
    /// Name for the first position, so tests and hosts can address it.
    #[serde(default)]
    pub label: Option<String>,
}

fn default_count() -> u32 {
    1
}

fn default_step() -> Direction {
    Direction::East
}

/// Host-side analog value (container fullness) read by comparators.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalogData {
    pub at: [i32; 3],
    pub level: u8,
}

// ===========================================================================
// Circuit
// ===========================================================================

/// A circuit fixture file.
#[derive(Debug, Clone, Deserialize)]
pub struct CircuitData {
    pub name: String,
    #[serde(default)]
    pub palette: Vec<PaletteEntry>,
    pub blocks: Vec<PlacementData>,
    #[serde(default)]
    pub analog: Vec<AnalogData>,
}
