//! Engine tuning knobs.
//!
//! Every field has a default matching vanilla-style redstone timing, and the
//! struct deserializes with `#[serde(default)]` so data files only need to
//! name the values they override.

use serde::{Deserialize, Serialize};

use crate::sim::Ticks;

/// Timing constants and safety limits for one [`crate::engine::RedstoneEngine`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Toggles older than this many ticks no longer count toward burnout.
    pub toggle_window: Ticks,
    /// A guarded gate with this many toggles inside the window burns out.
    pub max_recent_toggles: usize,
    /// Length of the burnout cool-down.
    pub burnout_cooldown: Ticks,
    pub torch_delay: Ticks,
    pub comparator_delay: Ticks,
    /// How long an observer pulse stays on.
    pub observer_pulse: Ticks,
    /// How long a pressed button stays on.
    pub button_press_ticks: Ticks,
    /// Upper bound on neighbor updates processed for a single mutation or
    /// firing. Excess updates are dropped with a warning.
    pub max_chained_updates: usize,
    /// Upper bound on actions fired in one step. The remainder is deferred to
    /// the next step.
    pub max_actions_per_step: usize,
    /// Capacity of the per-step event ring.
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            toggle_window: 60,
            max_recent_toggles: 8,
            burnout_cooldown: 160,
            torch_delay: 2,
            comparator_delay: 2,
            observer_pulse: 2,
            button_press_ticks: 20,
            max_chained_updates: 1_000_000,
            max_actions_per_step: 65_536,
            event_capacity: 4096,
        }
    }
}
