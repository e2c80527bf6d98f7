//! Simulation clock and bookkeeping types.
//!
//! The host advances the engine one tick at a time. Every step increments
//! the tick counter first and then fires all actions due at the new tick,
//! so an action scheduled at tick `t` with delay `d` is observable after the
//! step that brings the clock to `t + d`.

use crate::pos::BlockPos;

/// Ticks are the atomic unit of simulation time.
pub type Ticks = u64;

// ---------------------------------------------------------------------------
// Simulation state
// ---------------------------------------------------------------------------

/// Mutable clock state tracked by the engine.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct SimState {
    /// Current tick counter. Incremented by 1 for each step.
    pub tick: Ticks,
}

impl SimState {
    /// Create a new simulation state starting at tick 0.
    pub fn new() -> Self {
        Self { tick: 0 }
    }
}

// ---------------------------------------------------------------------------
// Step report
// ---------------------------------------------------------------------------

/// Result of a `RedstoneEngine::step` or `advance` call.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StepReport {
    /// Number of ticks actually advanced.
    pub steps_run: u64,
    /// Scheduled actions taken off the queue.
    pub actions_fired: usize,
    /// Fired actions that were ignored because their gate was gone.
    pub stale_actions: usize,
    /// Gate outputs that changed.
    pub toggles: usize,
    /// Actions left over because the per-step cap was reached.
    pub deferred: usize,
}

impl StepReport {
    pub(crate) fn merge(&mut self, other: &StepReport) {
        self.steps_run += other.steps_run;
        self.actions_fired += other.actions_fired;
        self.stale_actions += other.stale_actions;
        self.toggles += other.toggles;
        self.deferred = other.deferred;
    }
}

// ---------------------------------------------------------------------------
// State hash
// ---------------------------------------------------------------------------

/// A simple deterministic hash of engine state for desync detection.
///
/// Uses FNV-1a (64-bit) for speed and simplicity. Not cryptographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateHash(pub u64);

impl StateHash {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    /// Start a new hash.
    pub fn new() -> Self {
        Self(Self::FNV_OFFSET)
    }

    /// Feed bytes into the hash.
    pub fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(Self::FNV_PRIME);
        }
    }

    pub fn write_u64(&mut self, v: u64) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_u8(&mut self, v: u8) {
        self.write(&[v]);
    }

    pub fn write_pos(&mut self, pos: BlockPos) {
        self.write(&pos.x.to_le_bytes());
        self.write(&pos.y.to_le_bytes());
        self.write(&pos.z.to_le_bytes());
    }

    /// Finalize and return the hash value.
    pub fn finish(self) -> u64 {
        self.0
    }
}

impl Default for StateHash {
    fn default() -> Self {
        Self::new()
    }
}
