//! Neighbor notification work list.
//!
//! Notifications are single-level: notifying a position enqueues an update
//! for each of its six neighbors, and each neighbor decides for itself what
//! to do (gates schedule, wire re-solves, other blocks go to the host). A
//! gate never commits from inside a notification, so chains advance one
//! hop per scheduled delay rather than recursively.
//!
//! The list is an explicit FIFO rather than recursion, and the number of
//! updates drained in one batch is capped.

use std::collections::VecDeque;

use crate::pos::{BlockPos, Direction};

/// One pending neighbor update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeighborUpdate {
    /// Position being told about a change.
    pub pos: BlockPos,
    /// Position the change came from.
    pub from: BlockPos,
    /// The block at `from` itself changed, as opposed to power passing
    /// through it. Observers only react to the former.
    pub source_changed: bool,
}

/// FIFO of neighbor updates with a per-batch cap.
#[derive(Debug)]
pub struct NeighborUpdater {
    pending: VecDeque<NeighborUpdate>,
    limit: usize,
    processed: usize,
    dropped: usize,
}

impl NeighborUpdater {
    pub fn new(limit: usize) -> Self {
        Self {
            pending: VecDeque::new(),
            limit,
            processed: 0,
            dropped: 0,
        }
    }

    /// Enqueue updates for the six neighbors of a changed `pos`, in update
    /// order, skipping `exclude`.
    pub fn notify_neighbors(&mut self, pos: BlockPos, exclude: Option<Direction>) {
        for (dir, neighbor) in pos.neighbors() {
            if Some(dir) == exclude {
                continue;
            }
            self.pending.push_back(NeighborUpdate {
                pos: neighbor,
                from: pos,
                source_changed: true,
            });
        }
    }

    /// Enqueue updates for the neighbors of a solid block whose power may
    /// have changed because `source` next to it changed.
    pub fn notify_through(&mut self, conductor: BlockPos, source: BlockPos) {
        for (_, neighbor) in conductor.neighbors() {
            if neighbor == source {
                continue;
            }
            self.pending.push_back(NeighborUpdate {
                pos: neighbor,
                from: conductor,
                source_changed: false,
            });
        }
    }

    /// Next update, or `None` once the list is empty or the cap is hit. On
    /// hitting the cap the remaining updates are discarded and counted.
    pub fn pop(&mut self) -> Option<NeighborUpdate> {
        if self.processed >= self.limit {
            if !self.pending.is_empty() {
                self.dropped += self.pending.len();
                self.pending.clear();
            }
            return None;
        }
        let update = self.pending.pop_front()?;
        self.processed += 1;
        Some(update)
    }

    /// Re-evaluate `pos` itself once the updates queued so far are handled.
    pub fn recheck(&mut self, pos: BlockPos) {
        self.pending.push_back(NeighborUpdate {
            pos,
            from: pos,
            source_changed: false,
        });
    }

    /// Tell `pos` that the block at `from` changed.
    pub fn notify_at(&mut self, pos: BlockPos, from: BlockPos) {
        self.pending.push_back(NeighborUpdate {
            pos,
            from,
            source_changed: true,
        });
    }

    /// End the current batch. Returns the number of updates it dropped.
    pub fn finish_batch(&mut self) -> usize {
        self.processed = 0;
        std::mem::take(&mut self.dropped)
    }

    /// Updates dropped so far in the current batch.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn processed(&self) -> usize {
        self.processed
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
