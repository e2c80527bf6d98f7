//! Transition records emitted by the engine.
//!
//! Every committed gate output, wire level change, burnout and skipped
//! firing is recorded as a [`RedstoneEvent`]. Events land in an
//! [`EventBuffer`] ring that the engine clears at the start of each step, so
//! after a step it holds exactly what that step (plus any host calls since)
//! did. Passive listeners see every event as it is recorded.
//!
//! Event kinds can be suppressed; suppressed kinds are never buffered or
//! delivered.

use serde::{Deserialize, Serialize};

use crate::block::GateTag;
use crate::pos::BlockPos;
use crate::schedule::ActionKind;
use crate::sim::Ticks;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// Something the engine did. All events carry the tick at which they
/// occurred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RedstoneEvent {
    // -- Gate lifecycle --
    GatePlaced {
        pos: BlockPos,
        gate: GateTag,
        tick: Ticks,
    },
    GateRemoved {
        pos: BlockPos,
        tick: Ticks,
    },

    // -- Output --
    GateToggled {
        pos: BlockPos,
        on: bool,
        level: u8,
        tick: Ticks,
    },
    WireChanged {
        pos: BlockPos,
        old: u8,
        new: u8,
        tick: Ticks,
    },

    // -- Burnout --
    GateBurnedOut {
        pos: BlockPos,
        until: Ticks,
        tick: Ticks,
    },
    CooldownExpired {
        pos: BlockPos,
        tick: Ticks,
    },

    // -- Scheduling --
    StaleActionSkipped {
        pos: BlockPos,
        kind: ActionKind,
        tick: Ticks,
    },
    UpdateLimitReached {
        dropped: usize,
        tick: Ticks,
    },
}

/// Discriminant tag for event types, used for suppression and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    GatePlaced,
    GateRemoved,
    GateToggled,
    WireChanged,
    GateBurnedOut,
    CooldownExpired,
    StaleActionSkipped,
    UpdateLimitReached,
}

const EVENT_KIND_COUNT: usize = 8;

impl RedstoneEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            RedstoneEvent::GatePlaced { .. } => EventKind::GatePlaced,
            RedstoneEvent::GateRemoved { .. } => EventKind::GateRemoved,
            RedstoneEvent::GateToggled { .. } => EventKind::GateToggled,
            RedstoneEvent::WireChanged { .. } => EventKind::WireChanged,
            RedstoneEvent::GateBurnedOut { .. } => EventKind::GateBurnedOut,
            RedstoneEvent::CooldownExpired { .. } => EventKind::CooldownExpired,
            RedstoneEvent::StaleActionSkipped { .. } => EventKind::StaleActionSkipped,
            RedstoneEvent::UpdateLimitReached { .. } => EventKind::UpdateLimitReached,
        }
    }

    pub fn tick(&self) -> Ticks {
        match *self {
            RedstoneEvent::GatePlaced { tick, .. }
            | RedstoneEvent::GateRemoved { tick, .. }
            | RedstoneEvent::GateToggled { tick, .. }
            | RedstoneEvent::WireChanged { tick, .. }
            | RedstoneEvent::GateBurnedOut { tick, .. }
            | RedstoneEvent::CooldownExpired { tick, .. }
            | RedstoneEvent::StaleActionSkipped { tick, .. }
            | RedstoneEvent::UpdateLimitReached { tick, .. } => tick,
        }
    }

    /// Position the event concerns, if any.
    pub fn pos(&self) -> Option<BlockPos> {
        match *self {
            RedstoneEvent::GatePlaced { pos, .. }
            | RedstoneEvent::GateRemoved { pos, .. }
            | RedstoneEvent::GateToggled { pos, .. }
            | RedstoneEvent::WireChanged { pos, .. }
            | RedstoneEvent::GateBurnedOut { pos, .. }
            | RedstoneEvent::CooldownExpired { pos, .. }
            | RedstoneEvent::StaleActionSkipped { pos, .. } => Some(pos),
            RedstoneEvent::UpdateLimitReached { .. } => None,
        }
    }
}

impl EventKind {
    fn index(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// EventBuffer: ring buffer
// ---------------------------------------------------------------------------

/// Fixed-capacity ring buffer. When full, the oldest events are dropped.
#[derive(Debug)]
pub struct EventBuffer {
    events: Vec<Option<RedstoneEvent>>,
    /// Next write position.
    head: usize,
    len: usize,
    /// Total events ever written, including dropped ones.
    total_written: u64,
}

impl EventBuffer {
    /// A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: (0..capacity).map(|_| None).collect(),
            head: 0,
            len: 0,
            total_written: 0,
        }
    }

    pub fn push(&mut self, event: RedstoneEvent) {
        let capacity = self.capacity();
        self.events[self.head] = Some(event);
        self.head = (self.head + 1) % capacity;
        if self.len < capacity {
            self.len += 1;
        }
        self.total_written += 1;
    }

    pub fn capacity(&self) -> usize {
        self.events.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &RedstoneEvent> + '_ {
        let start = if self.len < self.capacity() {
            0
        } else {
            self.head
        };
        let capacity = self.capacity();
        (0..self.len).filter_map(move |offset| self.events[(start + offset) % capacity].as_ref())
    }

    pub fn to_vec(&self) -> Vec<RedstoneEvent> {
        self.iter().cloned().collect()
    }

    /// Empties the buffer. `total_written` keeps counting.
    pub fn clear(&mut self) {
        for slot in &mut self.events {
            *slot = None;
        }
        self.head = 0;
        self.len = 0;
    }
}

// ---------------------------------------------------------------------------
// EventLog
// ---------------------------------------------------------------------------

/// Read-only subscriber.
pub type PassiveListener = Box<dyn FnMut(&RedstoneEvent) + Send>;

/// Buffer plus suppression flags and listeners.
pub struct EventLog {
    buffer: EventBuffer,
    suppressed: [bool; EVENT_KIND_COUNT],
    listeners: Vec<(EventKind, PassiveListener)>,
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog")
            .field("buffer", &self.buffer)
            .field("suppressed", &self.suppressed)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: EventBuffer::new(capacity),
            suppressed: [false; EVENT_KIND_COUNT],
            listeners: Vec::new(),
        }
    }

    pub fn suppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = true;
    }

    pub fn is_suppressed(&self, kind: EventKind) -> bool {
        self.suppressed[kind.index()]
    }

    pub fn on_passive(&mut self, kind: EventKind, listener: PassiveListener) {
        self.listeners.push((kind, listener));
    }

    pub fn record(&mut self, event: RedstoneEvent) {
        let kind = event.kind();
        if self.is_suppressed(kind) {
            return;
        }
        for (listen_kind, listener) in &mut self.listeners {
            if *listen_kind == kind {
                listener(&event);
            }
        }
        self.buffer.push(event);
    }

    pub fn buffer(&self) -> &EventBuffer {
        &self.buffer
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(4096)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
