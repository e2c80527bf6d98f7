//! Resolution of circuit data into positioned blocks, and instantiation into
//! a host world.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use redstone_core::block::{Block, GateBlock, GateKind};
use redstone_core::config::EngineConfig;
use redstone_core::engine::RedstoneEngine;
use redstone_core::pos::{BlockPos, Direction};
use redstone_core::test_utils::GridWorld;
use redstone_core::world::{UpdateFlags, WorldView};

use crate::loader::{DataLoadError, check_duplicate, resolve_name};
use crate::schema::{BlockData, CircuitData};

/// Placements per entry are capped so a typo in `count` cannot allocate
/// without bound.
const MAX_RUN: u32 = 4096;

/// Names usable in `block` without a palette entry.
const BUILTINS: [(&str, BlockData); 4] = [
    ("stone", BlockData::Solid { id: 1 }),
    ("glass", BlockData::Transparent { id: 0 }),
    ("wire", BlockData::Wire),
    ("power_block", BlockData::PowerBlock),
];

/// Convert a data block into the engine's block type.
pub fn to_block(data: BlockData) -> Block {
    let gate = |kind, facing| Block::Gate(GateBlock::new(kind, facing));
    match data {
        BlockData::Air => Block::Air,
        BlockData::Solid { id } => Block::Solid(id),
        BlockData::Transparent { id } => Block::Transparent(id),
        BlockData::PowerBlock => Block::PowerBlock,
        BlockData::Wire => Block::Wire { power: 0 },
        BlockData::Repeater { facing, delay } => gate(GateKind::Repeater { delay }, facing),
        BlockData::Comparator { facing, mode } => gate(GateKind::Comparator { mode }, facing),
        BlockData::Torch { attached } => {
            let facing = if attached == Direction::Down {
                Direction::Up
            } else {
                attached.opposite()
            };
            gate(GateKind::Torch { attached }, facing)
        }
        BlockData::Observer { facing } => gate(GateKind::Observer, facing),
        BlockData::Lever { attached, powered } => Block::Gate(GateBlock {
            kind: GateKind::Lever { attached },
            facing: attached.opposite(),
            powered,
        }),
        BlockData::Button { attached } => gate(GateKind::Button { attached }, attached.opposite()),
    }
}

fn to_pos(at: [i32; 3]) -> BlockPos {
    BlockPos::new(at[0], at[1], at[2])
}

// ===========================================================================
// ResolvedCircuit
// ===========================================================================

/// A circuit with every name resolved. Later placements overwrite earlier
/// ones at the same position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCircuit {
    pub name: String,
    /// Blocks in placement order.
    pub placements: Vec<(BlockPos, Block)>,
    pub labels: BTreeMap<String, BlockPos>,
    pub analog: BTreeMap<BlockPos, u8>,
}

impl ResolvedCircuit {
    /// Resolve palette and label names. `file` is only used in errors.
    pub fn resolve(data: &CircuitData, file: &Path) -> Result<Self, DataLoadError> {
        let mut palette: HashMap<String, BlockData> = BUILTINS
            .iter()
            .map(|&(name, block)| (name.to_string(), block))
            .collect();
        for entry in &data.palette {
            check_duplicate(&palette, &entry.name, file)?;
            palette.insert(entry.name.clone(), entry.block);
        }

        let mut placements = Vec::new();
        let mut labels: HashMap<String, BlockPos> = HashMap::new();
        for placement in &data.blocks {
            let block = to_block(*resolve_name(&palette, &placement.block, file, "block")?);
            if placement.count > MAX_RUN {
                return Err(DataLoadError::Invalid {
                    file: file.to_path_buf(),
                    detail: format!("run of {} exceeds {MAX_RUN}", placement.count),
                });
            }
            let start = to_pos(placement.at);
            if let Some(label) = &placement.label {
                check_duplicate(&labels, label, file)?;
                labels.insert(label.clone(), start);
            }
            let mut pos = start;
            for _ in 0..placement.count {
                placements.push((pos, block));
                pos = pos.offset(placement.step);
            }
        }

        let mut analog = BTreeMap::new();
        for entry in &data.analog {
            if entry.level > 15 {
                return Err(DataLoadError::Invalid {
                    file: file.to_path_buf(),
                    detail: format!("analog level {} above 15", entry.level),
                });
            }
            analog.insert(to_pos(entry.at), entry.level);
        }

        Ok(Self {
            name: data.name.clone(),
            placements,
            labels: labels.into_iter().collect(),
            analog,
        })
    }

    /// Position registered under `label`.
    pub fn label(&self, label: &str) -> Option<BlockPos> {
        self.labels.get(label).copied()
    }

    /// Write every block into `world` and announce it to `engine`, in file
    /// order. Nothing is stepped.
    pub fn place_into<W: WorldView + ?Sized>(
        &self,
        engine: &mut RedstoneEngine,
        world: &mut W,
    ) -> Result<(), DataLoadError> {
        for &(pos, block) in &self.placements {
            world.set_block(pos, block, UpdateFlags::DEFAULT);
            engine
                .on_block_changed(world, pos)
                .map_err(|source| DataLoadError::Engine {
                    circuit: self.name.clone(),
                    source,
                })?;
        }
        Ok(())
    }

    /// Fresh engine and in-memory world holding this circuit.
    pub fn instantiate(
        &self,
        config: EngineConfig,
    ) -> Result<(RedstoneEngine, GridWorld), DataLoadError> {
        let mut world = GridWorld::new();
        for (&pos, &level) in &self.analog {
            world.set_analog(pos, level);
        }
        let mut engine = RedstoneEngine::with_config(config);
        self.place_into(&mut engine, &mut world)?;
        log::debug!(
            "instantiated '{}': {} gate(s) tracked",
            self.name,
            engine.gate_count()
        );
        Ok((engine, world))
    }
}
