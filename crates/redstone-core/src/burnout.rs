//! Oscillation guard.
//!
//! Gates that can self-oscillate (torches) record every committed output
//! change here. The history is only consulted when a gate is about to turn
//! on: if the position has toggled too often inside the sliding window it
//! stays off instead, and the engine forces a long cool-down before it may
//! evaluate again.
//!
//! History is owned by the engine instance, one guard per simulated world.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::pos::BlockPos;
use crate::sim::Ticks;

/// Recent toggle timestamps for one position, oldest first. Never longer than
/// the guard's toggle limit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleHistory {
    ticks: VecDeque<Ticks>,
}

impl ToggleHistory {
    fn evict(&mut self, now: Ticks, window: Ticks) {
        while let Some(&oldest) = self.ticks.front() {
            if now.saturating_sub(oldest) > window {
                self.ticks.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    pub fn ticks(&self) -> impl Iterator<Item = Ticks> + '_ {
        self.ticks.iter().copied()
    }
}

/// Per-position toggle histories with lazy eviction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BurnoutGuard {
    histories: BTreeMap<BlockPos, ToggleHistory>,
    window: Ticks,
    limit: usize,
}

impl BurnoutGuard {
    pub fn new(window: Ticks, limit: usize) -> Self {
        Self {
            histories: BTreeMap::new(),
            window,
            limit: limit.max(1),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.toggle_window, config.max_recent_toggles)
    }

    /// Append a toggle at `tick`, evicting entries that fell out of the window.
    pub fn record_toggle(&mut self, pos: BlockPos, tick: Ticks) {
        let history = self.histories.entry(pos).or_default();
        history.evict(tick, self.window);
        history.ticks.push_back(tick);
        while history.ticks.len() > self.limit {
            history.ticks.pop_front();
        }
    }

    /// True once the limit is reached inside the window ending at `now`.
    pub fn is_toggled_too_frequently(&mut self, pos: BlockPos, now: Ticks) -> bool {
        self.recent_toggles(pos, now) >= self.limit
    }

    /// Number of toggles at `pos` still inside the window ending at `now`.
    pub fn recent_toggles(&mut self, pos: BlockPos, now: Ticks) -> usize {
        let Some(history) = self.histories.get_mut(&pos) else {
            return 0;
        };
        history.evict(now, self.window);
        let len = history.len();
        if len == 0 {
            self.histories.remove(&pos);
        }
        len
    }

    pub fn history(&self, pos: BlockPos) -> Option<&ToggleHistory> {
        self.histories.get(&pos)
    }

    /// Drop the history of a removed gate.
    pub fn forget(&mut self, pos: BlockPos) {
        self.histories.remove(&pos);
    }

    /// Evict stale entries everywhere and drop empty histories.
    pub fn prune(&mut self, now: Ticks) {
        let window = self.window;
        self.histories.retain(|_, history| {
            history.evict(now, window);
            !history.is_empty()
        });
    }

    /// Number of positions with a non-empty history.
    pub fn tracked(&self) -> usize {
        self.histories.len()
    }
}

impl Default for BurnoutGuard {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}
