//! Signal graph evaluator.
//!
//! A pure read over the host's block identities and the engine's committed
//! gate outputs. Nothing here is cached: every query recomputes from the
//! current state, so results are always consistent with the last commit.
//!
//! # Power model
//!
//! Every block emits a `(weak, strong)` pair toward each of its faces (see
//! [`SignalEvaluator::emission`]). Solid blocks emit nothing themselves but
//! *conduct*: a solid is strongly powered by the strongest strong emission
//! into it and weakly powered by adjacent wire. Gates and consumers see the
//! larger of the two; wire sees only the strong part, which keeps wire from
//! powering itself back through a block.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::block::{Block, MAX_SIGNAL};
use crate::gate::GateState;
use crate::pos::{BlockPos, Direction};
use crate::world::WorldView;

/// Committed gate state, keyed by position.
pub type GateTable = BTreeMap<BlockPos, GateState>;

/// What a block emits toward one of its faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Emission {
    /// Power seen by a directly adjacent component.
    pub weak: u8,
    /// Power that a solid block on that face will conduct onward.
    pub strong: u8,
}

impl Emission {
    pub const NONE: Emission = Emission { weak: 0, strong: 0 };

    pub fn both(level: u8) -> Self {
        Self {
            weak: level,
            strong: level,
        }
    }

    pub fn weak_only(level: u8) -> Self {
        Self {
            weak: level,
            strong: 0,
        }
    }
}

/// Signal arriving at a position from one face, split by path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SignalSample {
    /// Emitted by the neighbor itself.
    pub direct: u8,
    /// Conducted through the neighbor when it is a powered solid block.
    pub indirect: u8,
}

impl SignalSample {
    pub fn strength(self) -> u8 {
        self.direct.max(self.indirect)
    }
}

/// Read-only view combining host blocks with committed gate outputs.
pub struct SignalEvaluator<'a, W: WorldView + ?Sized> {
    world: &'a W,
    gates: &'a GateTable,
}

impl<'a, W: WorldView + ?Sized> SignalEvaluator<'a, W> {
    pub fn new(world: &'a W, gates: &'a GateTable) -> Self {
        Self { world, gates }
    }

    /// The block at `pos`, or air when the host has not loaded it.
    pub fn block(&self, pos: BlockPos) -> Block {
        if self.world.is_loaded(pos) {
            self.world.block(pos)
        } else {
            Block::Air
        }
    }

    pub fn gate(&self, pos: BlockPos) -> Option<&'a GateState> {
        self.gates.get(&pos)
    }

    // -----------------------------------------------------------------------
    // Emission
    // -----------------------------------------------------------------------

    /// What the block at `pos` emits into `pos.offset(toward)`.
    pub fn emission(&self, pos: BlockPos, toward: Direction) -> Emission {
        match self.block(pos) {
            Block::PowerBlock => Emission::weak_only(MAX_SIGNAL),
            Block::Wire { power } if toward != Direction::Up => {
                Emission::weak_only(power.min(MAX_SIGNAL))
            }
            Block::Gate(_) => self
                .gates
                .get(&pos)
                .map_or(Emission::NONE, |gate| gate.emission(toward)),
            _ => Emission::NONE,
        }
    }

    /// Power held by the solid block at `pos`. Whatever `querier` emits is
    /// left out, so a component never reads its own output back through the
    /// block it powers.
    pub fn conductor_power(&self, pos: BlockPos, querier: Option<BlockPos>) -> Emission {
        let mut strong = 0;
        let mut from_wire = 0;
        for (dir, neighbor) in pos.neighbors() {
            if Some(neighbor) == querier {
                continue;
            }
            let emitted = self.emission(neighbor, dir.opposite());
            strong = strong.max(emitted.strong);
            if self.block(neighbor).is_wire() {
                from_wire = from_wire.max(emitted.weak);
            }
        }
        Emission {
            weak: strong.max(from_wire),
            strong,
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Signal arriving at `pos` from the neighbor in direction `from`.
    pub fn sample(&self, pos: BlockPos, from: Direction) -> SignalSample {
        let neighbor = pos.offset(from);
        let direct = self.emission(neighbor, from.opposite()).weak;
        let indirect = if self.block(neighbor).is_conductor() {
            self.conductor_power(neighbor, Some(pos)).weak
        } else {
            0
        };
        SignalSample { direct, indirect }
    }

    /// Strongest signal arriving at `pos` from `from`, by either path.
    pub fn signal_at(&self, pos: BlockPos, from: Direction) -> u8 {
        self.sample(pos, from).strength()
    }

    /// Strong power only: what the neighbor at `from` would push through a
    /// solid block at `pos`.
    pub fn direct_signal_at(&self, pos: BlockPos, from: Direction) -> u8 {
        self.emission(pos.offset(from), from.opposite()).strong
    }

    /// Whether any face of `pos` receives a signal. Used by simple on/off
    /// consumers.
    pub fn has_any_neighbor_signal(&self, pos: BlockPos) -> bool {
        Direction::ALL
            .into_iter()
            .any(|dir| self.signal_at(pos, dir) > 0)
    }

    /// Strongest side input of a diode at `pos` facing `facing`. The
    /// front/back axis is never consulted. Repeaters pass `diodes_only` and
    /// only see other diodes; comparators also see wire, power blocks and
    /// strong emissions.
    pub fn side_input(&self, pos: BlockPos, facing: Direction, diodes_only: bool) -> u8 {
        facing
            .sides()
            .into_iter()
            .map(|side| {
                let neighbor = pos.offset(side);
                let emitted = self.emission(neighbor, side.opposite());
                match self.block(neighbor) {
                    block if block.is_diode() => emitted.strong,
                    _ if diodes_only => 0,
                    Block::Wire { .. } | Block::PowerBlock => emitted.weak,
                    _ => emitted.strong,
                }
            })
            .max()
            .unwrap_or(0)
    }

    /// Rear input of a comparator: the host's analog value for the block
    /// behind, if it has one, otherwise the ordinary signal.
    pub fn rear_input(&self, pos: BlockPos, facing: Direction) -> u8 {
        let back = facing.opposite();
        let behind = pos.offset(back);
        let analog = if self.world.is_loaded(behind) {
            self.world.analog_signal(behind)
        } else {
            None
        };
        match analog {
            Some(level) => level.min(MAX_SIGNAL),
            None => self.signal_at(pos, back),
        }
    }

    /// Power a wire at `pos` receives from outside its own network.
    pub fn wire_input(&self, pos: BlockPos) -> u8 {
        let mut best = 0;
        for (dir, neighbor) in pos.neighbors() {
            let block = self.block(neighbor);
            let level = if block.is_wire() {
                0
            } else if block.is_conductor() {
                self.conductor_power(neighbor, Some(pos)).strong
            } else {
                self.emission(neighbor, dir.opposite()).weak
            };
            best = best.max(level);
            if best == MAX_SIGNAL {
                break;
            }
        }
        best
    }
}
