//! Redstone wire networks.
//!
//! Wire reacts immediately rather than through the tick queue: when any wire
//! is notified, its whole connected network is re-solved in one pass. Each
//! wire takes the strongest of its outside input and its neighbors' level
//! minus one, computed with a max-first flood from the strongest sources.

use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

use crate::block::Block;
use crate::pos::{BlockPos, Direction};
use crate::signal::SignalEvaluator;
use crate::world::WorldView;

/// One wire whose level changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireChange {
    pub pos: BlockPos,
    pub old: u8,
    pub new: u8,
}

/// Result of re-solving the network containing a wire.
#[derive(Debug, Clone, Default)]
pub struct WireUpdate {
    pub members: BTreeSet<BlockPos>,
    /// Changed wires, in position order.
    pub changes: Vec<WireChange>,
}

fn wire_power(block: Block) -> Option<u8> {
    match block {
        Block::Wire { power } => Some(power),
        _ => None,
    }
}

/// Wires connected to the wire at `pos`: horizontal neighbors on the same
/// level, plus wire one step up or down a staircase when no solid block cuts
/// the diagonal.
pub fn connections<W: WorldView + ?Sized>(
    eval: &SignalEvaluator<'_, W>,
    pos: BlockPos,
) -> Vec<BlockPos> {
    let above_is_solid = eval.block(pos.offset(Direction::Up)).is_conductor();
    let mut out = Vec::new();
    for dir in Direction::HORIZONTAL {
        let side = pos.offset(dir);
        let side_block = eval.block(side);
        if side_block.is_wire() {
            out.push(side);
            continue;
        }
        let up = side.offset(Direction::Up);
        if !above_is_solid && side_block.is_conductor() && eval.block(up).is_wire() {
            out.push(up);
        }
        let down = side.offset(Direction::Down);
        if !side_block.is_conductor() && eval.block(down).is_wire() {
            out.push(down);
        }
    }
    out
}

/// Flood-fill the network containing `start`, visiting at most `limit` wires.
pub fn collect_network<W: WorldView + ?Sized>(
    eval: &SignalEvaluator<'_, W>,
    start: BlockPos,
    limit: usize,
) -> BTreeSet<BlockPos> {
    let mut members = BTreeSet::new();
    if !eval.block(start).is_wire() {
        return members;
    }
    let mut stack = vec![start];
    members.insert(start);
    while let Some(pos) = stack.pop() {
        for next in connections(eval, pos) {
            if members.len() >= limit {
                log::warn!("wire network at {start} exceeds {limit} wires; truncated");
                return members;
            }
            if members.insert(next) {
                stack.push(next);
            }
        }
    }
    members
}

/// Solve the levels of a network given each member's outside input.
pub fn solve_levels<W: WorldView + ?Sized>(
    eval: &SignalEvaluator<'_, W>,
    members: &BTreeSet<BlockPos>,
) -> BTreeMap<BlockPos, u8> {
    let mut levels: BTreeMap<BlockPos, u8> = BTreeMap::new();
    let mut heap = BinaryHeap::new();
    for &pos in members {
        let input = eval.wire_input(pos);
        levels.insert(pos, input);
        if input > 0 {
            heap.push((input, pos));
        }
    }
    while let Some((level, pos)) = heap.pop() {
        if levels.get(&pos).copied().unwrap_or(0) > level || level <= 1 {
            continue;
        }
        let spread = level - 1;
        for next in connections(eval, pos) {
            let Some(current) = levels.get_mut(&next) else {
                continue;
            };
            if *current < spread {
                *current = spread;
                heap.push((spread, next));
            }
        }
    }
    levels
}

/// Re-solve the network containing `start` and report what changed. The
/// caller writes the changes back to the world.
pub fn recompute<W: WorldView + ?Sized>(
    eval: &SignalEvaluator<'_, W>,
    start: BlockPos,
    limit: usize,
) -> WireUpdate {
    let members = collect_network(eval, start, limit);
    let levels = solve_levels(eval, &members);
    let changes = levels
        .iter()
        .filter_map(|(&pos, &new)| {
            let old = wire_power(eval.block(pos))?;
            (old != new).then_some(WireChange { pos, old, new })
        })
        .collect();
    WireUpdate { members, changes }
}
