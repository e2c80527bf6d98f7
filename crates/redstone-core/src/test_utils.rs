//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use std::collections::{BTreeMap, BTreeSet};

use crate::block::{Block, ComparatorMode, GateBlock, GateKind};
use crate::engine::{EngineError, RedstoneEngine};
use crate::event::RedstoneEvent;
use crate::pos::{BlockPos, Direction};
use crate::world::{UpdateFlags, WorldView};

// ===========================================================================
// GridWorld
// ===========================================================================

/// In-memory block store. Records every `neighbor_changed` call so tests can
/// assert on what consumers heard.
#[derive(Debug, Clone, Default)]
pub struct GridWorld {
    blocks: BTreeMap<BlockPos, Block>,
    analog: BTreeMap<BlockPos, u8>,
    unloaded: BTreeSet<BlockPos>,
    neighbor_log: Vec<(BlockPos, BlockPos)>,
    writes: usize,
}

impl GridWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a block without telling any engine.
    pub fn put(&mut self, pos: BlockPos, block: Block) {
        if block == Block::Air {
            self.blocks.remove(&pos);
        } else {
            self.blocks.insert(pos, block);
        }
    }

    pub fn get(&self, pos: BlockPos) -> Block {
        self.blocks.get(&pos).copied().unwrap_or(Block::Air)
    }

    pub fn wire_power(&self, pos: BlockPos) -> Option<u8> {
        match self.get(pos) {
            Block::Wire { power } => Some(power),
            _ => None,
        }
    }

    pub fn set_analog(&mut self, pos: BlockPos, level: u8) {
        self.analog.insert(pos, level);
    }

    pub fn unload(&mut self, pos: BlockPos) {
        self.unloaded.insert(pos);
    }

    pub fn load(&mut self, pos: BlockPos) {
        self.unloaded.remove(&pos);
    }

    /// `(pos, from)` pairs passed to `neighbor_changed`, oldest first.
    pub fn neighbor_log(&self) -> &[(BlockPos, BlockPos)] {
        &self.neighbor_log
    }

    pub fn clear_neighbor_log(&mut self) {
        self.neighbor_log.clear();
    }

    /// Number of `set_block` calls the engine made.
    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (BlockPos, Block)> + '_ {
        self.blocks.iter().map(|(&pos, &block)| (pos, block))
    }
}

impl WorldView for GridWorld {
    fn block(&self, pos: BlockPos) -> Block {
        self.get(pos)
    }

    fn set_block(&mut self, pos: BlockPos, block: Block, _flags: UpdateFlags) {
        self.writes += 1;
        self.put(pos, block);
    }

    fn is_loaded(&self, pos: BlockPos) -> bool {
        !self.unloaded.contains(&pos)
    }

    fn analog_signal(&self, pos: BlockPos) -> Option<u8> {
        self.analog.get(&pos).copied()
    }

    fn neighbor_changed(&mut self, pos: BlockPos, from: BlockPos) {
        self.neighbor_log.push((pos, from));
    }
}

// ===========================================================================
// Block constructors
// ===========================================================================

pub fn at(x: i32, y: i32, z: i32) -> BlockPos {
    BlockPos::new(x, y, z)
}

pub fn stone() -> Block {
    Block::Solid(1)
}

pub fn glass() -> Block {
    Block::Transparent(20)
}

pub fn wire() -> Block {
    Block::Wire { power: 0 }
}

pub fn repeater(facing: Direction, delay: u8) -> Block {
    Block::Gate(GateBlock::new(GateKind::Repeater { delay }, facing))
}

pub fn comparator(facing: Direction, mode: ComparatorMode) -> Block {
    Block::Gate(GateBlock::new(GateKind::Comparator { mode }, facing))
}

/// A torch mounted on the block in direction `attached`. Standing torches
/// use `Direction::Down`.
pub fn torch(attached: Direction) -> Block {
    let facing = if attached == Direction::Down {
        Direction::Up
    } else {
        attached.opposite()
    };
    Block::Gate(GateBlock::new(GateKind::Torch { attached }, facing))
}

pub fn observer(facing: Direction) -> Block {
    Block::Gate(GateBlock::new(GateKind::Observer, facing))
}

pub fn lever(attached: Direction) -> Block {
    Block::Gate(GateBlock::new(
        GateKind::Lever { attached },
        attached.opposite(),
    ))
}

pub fn button(attached: Direction) -> Block {
    Block::Gate(GateBlock::new(
        GateKind::Button { attached },
        attached.opposite(),
    ))
}

// ===========================================================================
// Engine helpers
// ===========================================================================

/// Write `block` into the world and tell the engine.
pub fn place(
    engine: &mut RedstoneEngine,
    world: &mut GridWorld,
    pos: BlockPos,
    block: Block,
) -> Result<(), EngineError> {
    world.put(pos, block);
    engine.on_block_changed(world, pos)
}

/// Clear `pos` and tell the engine.
pub fn remove(engine: &mut RedstoneEngine, world: &mut GridWorld, pos: BlockPos) {
    world.put(pos, Block::Air);
    engine.on_block_removed(world, pos);
}

/// A lever at `origin` followed by `len` repeaters running in `dir`. Returns
/// the repeater positions in order.
pub fn repeater_line(
    engine: &mut RedstoneEngine,
    world: &mut GridWorld,
    origin: BlockPos,
    dir: Direction,
    len: usize,
    delay: u8,
) -> Result<Vec<BlockPos>, EngineError> {
    place(engine, world, origin, lever(Direction::Down))?;
    let mut positions = Vec::with_capacity(len);
    let mut pos = origin;
    for _ in 0..len {
        pos = pos.offset(dir);
        place(engine, world, pos, repeater(dir, delay))?;
        positions.push(pos);
    }
    Ok(positions)
}

/// A standing torch on a stone block whose output feeds a two-wire loop back
/// into that block. Oscillates every torch delay until it burns out. Returns
/// the torch position.
pub fn torch_loop(
    engine: &mut RedstoneEngine,
    world: &mut GridWorld,
    origin: BlockPos,
) -> Result<BlockPos, EngineError> {
    let block = origin;
    let torch_pos = origin.offset(Direction::East);
    place(engine, world, block, stone())?;
    place(engine, world, origin.offset(Direction::South), wire())?;
    place(engine, world, torch_pos.offset(Direction::South), wire())?;
    place(engine, world, torch_pos, torch(Direction::West))?;
    Ok(torch_pos)
}

/// Committed toggles at `pos` among `events`.
pub fn toggles_at(events: &[RedstoneEvent], pos: BlockPos) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, RedstoneEvent::GateToggled { pos: p, .. } if *p == pos))
        .count()
}

/// Step until `pred` holds or `max_ticks` pass. Returns the tick it held at.
pub fn run_until<F>(
    engine: &mut RedstoneEngine,
    world: &mut GridWorld,
    max_ticks: u64,
    mut pred: F,
) -> Option<u64>
where
    F: FnMut(&RedstoneEngine, &GridWorld) -> bool,
{
    for _ in 0..max_ticks {
        engine.step(world);
        if pred(engine, world) {
            return Some(engine.tick());
        }
    }
    None
}
