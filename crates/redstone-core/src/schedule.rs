//! Scheduled tick queue.
//!
//! A priority-ordered delayed-action queue keyed by (position, action kind).
//! At most one action per key is pending at a time: scheduling again before
//! the first one fires is a no-op. Actions come out of [`TickQueue::poll`]
//! ordered by due tick, then [`TickPriority`], then insertion order.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use slotmap::{SlotMap, new_key_type};

use crate::pos::BlockPos;
use crate::sim::Ticks;

new_key_type! {
    /// Identifies a pending action inside a [`TickQueue`].
    pub struct ActionId;
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Rejected scheduling requests. These indicate a bug in the caller and are
/// never silently clamped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("negative schedule delay: {0}")]
    NegativeDelay(i64),
    #[error("invalid tick priority: {0} (expected -3..=0)")]
    InvalidPriority(i32),
}

// ---------------------------------------------------------------------------
// Priority and kind
// ---------------------------------------------------------------------------

/// Ordering of actions due on the same tick. Lower fires first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickPriority {
    ExtremelyHigh = -3,
    VeryHigh = -2,
    High = -1,
    Normal = 0,
}

impl TickPriority {
    pub fn value(self) -> i32 {
        self as i32
    }
}

impl TryFrom<i32> for TickPriority {
    type Error = ScheduleError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            -3 => Ok(TickPriority::ExtremelyHigh),
            -2 => Ok(TickPriority::VeryHigh),
            -1 => Ok(TickPriority::High),
            0 => Ok(TickPriority::Normal),
            other => Err(ScheduleError::InvalidPriority(other)),
        }
    }
}

/// What a pending action will do when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Re-sample the gate and commit a new output.
    Toggle,
    /// End of a button press or observer pulse.
    Release,
    /// Burnout cool-down expired.
    Recheck,
}

impl ActionKind {
    pub const ALL: [ActionKind; 3] = [ActionKind::Toggle, ActionKind::Release, ActionKind::Recheck];
}

/// A pending action. Lives in the queue from enqueue until it fires or is
/// cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledAction {
    pub pos: BlockPos,
    pub kind: ActionKind,
    pub due: Ticks,
    pub priority: TickPriority,
    /// Monotonic insertion counter, used to break priority ties.
    pub sequence: u64,
}

// ---------------------------------------------------------------------------
// Scheduler capability
// ---------------------------------------------------------------------------

/// Scheduling capability handed to gate policies. Implemented by the engine,
/// which supplies the current tick.
pub trait TickScheduler {
    /// Schedule `kind` at `pos` after `delay` ticks. Returns `Ok(false)` when
    /// an action for the same key is already pending.
    fn schedule_tick(
        &mut self,
        pos: BlockPos,
        kind: ActionKind,
        delay: i64,
        priority: TickPriority,
    ) -> Result<bool, ScheduleError>;

    /// Whether an action for (pos, kind) is pending.
    fn has_scheduled_tick(&self, pos: BlockPos, kind: ActionKind) -> bool;
}

// ---------------------------------------------------------------------------
// TickQueue
// ---------------------------------------------------------------------------

type OrderKey = (Ticks, TickPriority, u64, ActionId);

/// Pending actions ordered for firing, with per-key deduplication.
#[derive(Debug, Clone, Default)]
pub struct TickQueue {
    actions: SlotMap<ActionId, ScheduledAction>,
    order: BTreeSet<OrderKey>,
    index: BTreeMap<(BlockPos, ActionKind), ActionId>,
    next_sequence: u64,
}

impl TickQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule relative to `now`. Validates the delay, then defers to
    /// [`schedule_at`](Self::schedule_at).
    pub fn schedule(
        &mut self,
        now: Ticks,
        pos: BlockPos,
        kind: ActionKind,
        delay: i64,
        priority: TickPriority,
    ) -> Result<bool, ScheduleError> {
        if delay < 0 {
            return Err(ScheduleError::NegativeDelay(delay));
        }
        Ok(self.schedule_at(pos, kind, now.saturating_add(delay as u64), priority))
    }

    /// Insert an action due at an absolute tick. Returns `false` without
    /// touching the queue when (pos, kind) is already pending.
    pub fn schedule_at(
        &mut self,
        pos: BlockPos,
        kind: ActionKind,
        due: Ticks,
        priority: TickPriority,
    ) -> bool {
        if self.index.contains_key(&(pos, kind)) {
            return false;
        }
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let id = self.actions.insert(ScheduledAction {
            pos,
            kind,
            due,
            priority,
            sequence,
        });
        self.order.insert((due, priority, sequence, id));
        self.index.insert((pos, kind), id);
        true
    }

    /// Remove and return every action due at or before `now`.
    pub fn poll(&mut self, now: Ticks) -> Vec<ScheduledAction> {
        self.poll_limited(now, usize::MAX)
    }

    /// Like [`poll`](Self::poll) but returns at most `max` actions. The rest
    /// stay queued, in order, for the next poll.
    pub fn poll_limited(&mut self, now: Ticks, max: usize) -> Vec<ScheduledAction> {
        let mut fired = Vec::new();
        while fired.len() < max {
            let Some(&(due, _, _, id)) = self.order.first() else {
                break;
            };
            if due > now {
                break;
            }
            self.order.pop_first();
            if let Some(action) = self.actions.remove(id) {
                self.index.remove(&(action.pos, action.kind));
                fired.push(action);
            }
        }
        fired
    }

    pub fn is_scheduled(&self, pos: BlockPos, kind: ActionKind) -> bool {
        self.index.contains_key(&(pos, kind))
    }

    /// The pending action for (pos, kind), if any.
    pub fn pending(&self, pos: BlockPos, kind: ActionKind) -> Option<&ScheduledAction> {
        self.index
            .get(&(pos, kind))
            .and_then(|id| self.actions.get(*id))
    }

    /// Drop a single pending action. Returns whether one existed.
    pub fn cancel(&mut self, pos: BlockPos, kind: ActionKind) -> bool {
        let Some(id) = self.index.remove(&(pos, kind)) else {
            return false;
        };
        if let Some(action) = self.actions.remove(id) {
            self.order
                .remove(&(action.due, action.priority, action.sequence, id));
        }
        true
    }

    /// Drop every pending action at `pos`. Returns how many were removed.
    pub fn cancel_all(&mut self, pos: BlockPos) -> usize {
        ActionKind::ALL
            .into_iter()
            .filter(|&kind| self.cancel(pos, kind))
            .count()
    }

    /// Due tick of the earliest pending action.
    pub fn next_due(&self) -> Option<Ticks> {
        self.order.first().map(|&(due, ..)| due)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Pending actions in firing order.
    pub fn iter(&self) -> impl Iterator<Item = &ScheduledAction> {
        self.order.iter().filter_map(|&(.., id)| self.actions.get(id))
    }
}

// ===========================================================================
// Tests
// ===========================================================================
