//! Gate state machine and per-kind policy.
//!
//! Each gate kind is a variant of [`GateKind`]; the policy callbacks below
//! (`desired_output`, `is_locked`, `compute_priority`, `delay_for`,
//! `uses_burnout_guard`) dispatch on it. The engine applies the shared
//! transition rule:
//!
//! ```text
//! desired = desired_output(evaluator)
//! if desired != committed and no toggle is pending:
//!     schedule(pos, Toggle, delay, compute_priority())
//! on fire:
//!     re-sample desired, commit, notify neighbors
//! ```

use serde::{Deserialize, Serialize};

use crate::block::{ComparatorMode, GateBlock, GateKind, MAX_SIGNAL};
use crate::config::EngineConfig;
use crate::pos::{BlockPos, Direction};
use crate::schedule::TickPriority;
use crate::signal::{Emission, SignalEvaluator};
use crate::sim::Ticks;
use crate::world::WorldView;

/// Observable phase of a gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GatePhase {
    Off,
    PendingOn,
    On,
    PendingOff,
}

/// Output a gate wants given its current inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Desired {
    pub on: bool,
    pub level: u8,
}

impl Desired {
    pub fn from_on(on: bool) -> Self {
        Self {
            on,
            level: if on { MAX_SIGNAL } else { 0 },
        }
    }

    pub fn from_level(level: u8) -> Self {
        let level = level.min(MAX_SIGNAL);
        Self {
            on: level > 0,
            level,
        }
    }
}

/// Reasons a gate block cannot be placed.
pub fn validate(block: &GateBlock) -> Result<(), String> {
    match block.kind {
        GateKind::Repeater { delay } if !(1..=4).contains(&delay) => {
            Err(format!("repeater delay {delay} outside 1..=4"))
        }
        GateKind::Torch { attached } if attached == Direction::Up => {
            Err("torches cannot hang from a ceiling".to_string())
        }
        _ => Ok(()),
    }
}

/// Game ticks between a gate noticing a change and committing it.
pub fn delay_for(kind: &GateKind, config: &EngineConfig) -> Ticks {
    match *kind {
        GateKind::Repeater { delay } => 2 * Ticks::from(delay.clamp(1, 4)),
        GateKind::Comparator { .. } => config.comparator_delay,
        GateKind::Torch { .. } => config.torch_delay,
        GateKind::Observer => config.observer_pulse,
        GateKind::Lever { .. } | GateKind::Button { .. } => 0,
    }
}

// ---------------------------------------------------------------------------
// GateState
// ---------------------------------------------------------------------------

/// Engine-owned dynamic state of one gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateState {
    pub kind: GateKind,
    pub facing: Direction,
    pub output_on: bool,
    /// 0..=15. Repeaters and torches only use 0 and 15.
    pub output_level: u8,
    pub delay_ticks: Ticks,
    /// Priority of the pending toggle, if one is queued.
    pub pending_priority: Option<TickPriority>,
    /// Set while burnt out. No evaluation happens before this tick.
    pub cooldown_until: Option<Ticks>,
}

impl GateState {
    /// Fresh state for a gate block, output off. The engine computes the real
    /// initial output right after placement.
    pub fn placed(block: GateBlock, config: &EngineConfig) -> Self {
        Self {
            kind: block.kind,
            facing: block.facing,
            output_on: false,
            output_level: 0,
            delay_ticks: delay_for(&block.kind, config),
            pending_priority: None,
            cooldown_until: None,
        }
    }

    /// Take new configuration (repeater delay, comparator mode) from a block
    /// with the same identity. Output and pending work are untouched.
    pub fn reconfigure(&mut self, block: GateBlock, config: &EngineConfig) {
        self.kind = block.kind;
        self.delay_ticks = delay_for(&block.kind, config);
    }

    pub fn set_output(&mut self, on: bool, level: u8) {
        self.output_on = on;
        self.output_level = if on { level.min(MAX_SIGNAL) } else { 0 };
    }

    pub fn output(&self) -> Desired {
        Desired {
            on: self.output_on,
            level: self.output_level,
        }
    }

    pub fn block(&self) -> GateBlock {
        GateBlock {
            kind: self.kind,
            facing: self.facing,
            powered: self.output_on,
        }
    }

    pub fn matches(&self, block: &GateBlock) -> bool {
        self.block().same_identity(block)
    }

    pub fn phase(&self, toggle_pending: bool) -> GatePhase {
        match (self.output_on, toggle_pending) {
            (false, false) => GatePhase::Off,
            (false, true) => GatePhase::PendingOn,
            (true, false) => GatePhase::On,
            (true, true) => GatePhase::PendingOff,
        }
    }

    /// Torches burn out; diodes and sources do not.
    pub fn uses_burnout_guard(&self) -> bool {
        matches!(self.kind, GateKind::Torch { .. })
    }

    /// Repeaters, comparators and torches follow their inputs. Observers and
    /// sources change through their own triggers.
    pub fn is_signal_driven(&self) -> bool {
        matches!(
            self.kind,
            GateKind::Repeater { .. } | GateKind::Comparator { .. } | GateKind::Torch { .. }
        )
    }

    pub fn is_cooling_down(&self, now: Ticks) -> bool {
        self.cooldown_until.is_some_and(|until| now < until)
    }

    /// Position an observer watches.
    pub fn observed(&self, pos: BlockPos) -> Option<BlockPos> {
        matches!(self.kind, GateKind::Observer).then(|| pos.offset(self.facing))
    }

    // -----------------------------------------------------------------------
    // Emission
    // -----------------------------------------------------------------------

    /// What this gate emits toward `toward`, given its committed output.
    pub fn emission(&self, toward: Direction) -> Emission {
        if !self.output_on {
            return Emission::NONE;
        }
        match self.kind {
            GateKind::Repeater { .. } | GateKind::Comparator { .. } => {
                if toward == self.facing {
                    Emission::both(self.output_level)
                } else {
                    Emission::NONE
                }
            }
            GateKind::Observer => {
                if toward == self.facing.opposite() {
                    Emission::both(self.output_level)
                } else {
                    Emission::NONE
                }
            }
            GateKind::Torch { attached } => {
                if toward == attached {
                    Emission::NONE
                } else if toward == Direction::Up {
                    Emission::both(MAX_SIGNAL)
                } else {
                    Emission::weak_only(MAX_SIGNAL)
                }
            }
            GateKind::Lever { attached } | GateKind::Button { attached } => {
                if toward == attached {
                    Emission::both(MAX_SIGNAL)
                } else {
                    Emission::weak_only(MAX_SIGNAL)
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Policy
    // -----------------------------------------------------------------------

    /// The output this gate should have given current inputs. Gates that are
    /// not signal driven keep their committed output.
    pub fn desired_output<W: WorldView + ?Sized>(
        &self,
        pos: BlockPos,
        eval: &SignalEvaluator<'_, W>,
    ) -> Desired {
        match self.kind {
            GateKind::Repeater { .. } => {
                Desired::from_on(eval.signal_at(pos, self.facing.opposite()) > 0)
            }
            GateKind::Comparator { mode } => {
                let rear = eval.rear_input(pos, self.facing);
                let side = eval.side_input(pos, self.facing, false);
                let level = match mode {
                    ComparatorMode::Compare if rear >= side => rear,
                    ComparatorMode::Compare => 0,
                    ComparatorMode::Subtract => rear.saturating_sub(side),
                };
                Desired::from_level(level)
            }
            GateKind::Torch { attached } => Desired::from_on(eval.signal_at(pos, attached) == 0),
            GateKind::Observer | GateKind::Lever { .. } | GateKind::Button { .. } => self.output(),
        }
    }

    /// A repeater is locked while a powered diode feeds either side. Locked
    /// repeaters ignore every input change.
    pub fn is_locked<W: WorldView + ?Sized>(
        &self,
        pos: BlockPos,
        eval: &SignalEvaluator<'_, W>,
    ) -> bool {
        match self.kind {
            GateKind::Repeater { .. } => eval.side_input(pos, self.facing, true) > 0,
            _ => false,
        }
    }

    /// A diode feeding another diode that does not point back into it fires
    /// ahead of the one it feeds.
    fn feeds_diode<W: WorldView + ?Sized>(
        &self,
        pos: BlockPos,
        eval: &SignalEvaluator<'_, W>,
    ) -> bool {
        eval.block(pos.offset(self.facing))
            .gate()
            .is_some_and(|front| front.kind.is_diode() && front.facing != self.facing.opposite())
    }

    pub fn compute_priority<W: WorldView + ?Sized>(
        &self,
        pos: BlockPos,
        eval: &SignalEvaluator<'_, W>,
    ) -> TickPriority {
        match self.kind {
            GateKind::Repeater { .. } => {
                if self.feeds_diode(pos, eval) {
                    TickPriority::ExtremelyHigh
                } else if self.output_on {
                    TickPriority::VeryHigh
                } else {
                    TickPriority::High
                }
            }
            GateKind::Comparator { .. } => {
                if self.feeds_diode(pos, eval) {
                    TickPriority::High
                } else {
                    TickPriority::Normal
                }
            }
            _ => TickPriority::Normal,
        }
    }
}
