//! The propagation engine: owns the clock, the tick queue, gate state, the
//! burnout guard and the neighbor work list, and exposes the host API.
//!
//! # Architecture
//!
//! The `RedstoneEngine` owns:
//! - A [`TickQueue`] of pending gate actions
//! - A [`GateTable`] of committed gate outputs, keyed by position
//! - A [`BurnoutGuard`] with per-position toggle history
//! - A [`NeighborUpdater`] work list
//! - An [`EventLog`] of transitions
//!
//! Block identities stay with the host and are passed in as a
//! [`WorldView`] on every call.
//!
//! # Step
//!
//! Each `step()`:
//! 1. Clears the event log and increments the tick counter
//! 2. Takes every action due at the new tick off the queue, in
//!    `(due, priority, sequence)` order, up to `max_actions_per_step`
//! 3. Fires each one: stale actions are skipped, live gates re-sample their
//!    inputs and commit
//! 4. Drains the neighbor updates each commit produced. Gates only schedule,
//!    so nothing else commits until a later firing

use log::{debug, trace, warn};

use crate::block::{Block, GateBlock, GateKind};
use crate::burnout::BurnoutGuard;
use crate::config::EngineConfig;
use crate::event::{EventBuffer, EventKind, EventLog, PassiveListener, RedstoneEvent};
use crate::gate::{self, Desired, GatePhase, GateState};
use crate::pos::{BlockPos, Direction};
use crate::propagate::{NeighborUpdate, NeighborUpdater};
use crate::schedule::{
    ActionKind, ScheduleError, ScheduledAction, TickPriority, TickQueue, TickScheduler,
};
use crate::signal::{GateTable, SignalEvaluator, SignalSample};
use crate::sim::{SimState, StateHash, StepReport, Ticks};
use crate::wire;
use crate::world::{UpdateFlags, WorldView};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    #[error("no gate at {0}")]
    NotAGate(BlockPos),
    #[error("gate at {0} is not a host-driven source")]
    NotASource(BlockPos),
    #[error("invalid gate at {pos}: {reason}")]
    InvalidGate { pos: BlockPos, reason: String },
}

// ---------------------------------------------------------------------------
// RedstoneEngine
// ---------------------------------------------------------------------------

/// One propagation engine per simulated world.
#[derive(Debug)]
pub struct RedstoneEngine {
    pub(crate) config: EngineConfig,

    /// Simulation clock.
    pub sim_state: SimState,

    pub(crate) queue: TickQueue,

    pub(crate) gates: GateTable,

    pub(crate) burnout: BurnoutGuard,

    pub(crate) updates: NeighborUpdater,

    pub(crate) events: EventLog,
}

impl Default for RedstoneEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RedstoneEngine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            queue: TickQueue::new(),
            gates: GateTable::new(),
            burnout: BurnoutGuard::from_config(&config),
            updates: NeighborUpdater::new(config.max_chained_updates),
            events: EventLog::new(config.event_capacity),
            sim_state: SimState::new(),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current tick.
    pub fn tick(&self) -> Ticks {
        self.sim_state.tick
    }

    // -----------------------------------------------------------------------
    // Stepping
    // -----------------------------------------------------------------------

    /// Advance the clock by one tick and fire everything due.
    pub fn step<W: WorldView + ?Sized>(&mut self, world: &mut W) -> StepReport {
        self.events.clear();
        self.sim_state.tick += 1;
        let now = self.sim_state.tick;

        let mut report = StepReport {
            steps_run: 1,
            ..StepReport::default()
        };
        let batch = self
            .queue
            .poll_limited(now, self.config.max_actions_per_step);
        let capped = batch.len() == self.config.max_actions_per_step;
        report.actions_fired = batch.len();
        for action in batch {
            self.fire(world, action, &mut report);
        }

        // Zero-delay actions queued while firing are due now too, but only a
        // full batch means anything was held back by the cap.
        if capped {
            report.deferred = self.queue.iter().take_while(|a| a.due <= now).count();
        }
        if report.deferred > 0 {
            debug!(
                "tick {now}: action cap {} reached, {} deferred",
                self.config.max_actions_per_step, report.deferred
            );
        }
        if now % self.config.toggle_window.max(1) == 0 {
            self.burnout.prune(now);
        }
        report
    }

    /// Run `ticks` steps. Events from earlier steps are cleared as usual, so
    /// [`last_events`](Self::last_events) afterwards covers the final step.
    pub fn advance<W: WorldView + ?Sized>(&mut self, world: &mut W, ticks: u64) -> StepReport {
        let mut total = StepReport::default();
        for _ in 0..ticks {
            let report = self.step(world);
            total.merge(&report);
        }
        total
    }

    // -----------------------------------------------------------------------
    // Host mutations
    // -----------------------------------------------------------------------

    /// The block at `pos` changed in a way the engine does not track itself
    /// (placement, removal, fluid). Notifies the six neighbors, minus
    /// `exclude`.
    pub fn notify<W: WorldView + ?Sized>(
        &mut self,
        world: &mut W,
        pos: BlockPos,
        exclude: Option<Direction>,
    ) {
        self.updates.notify_neighbors(pos, exclude);
        self.drain(world);
    }

    /// The host wrote a new block at `pos`. Gates are created, refreshed or
    /// torn down to match, wire is re-solved, and neighbors are notified.
    pub fn on_block_changed<W: WorldView + ?Sized>(
        &mut self,
        world: &mut W,
        pos: BlockPos,
    ) -> Result<(), EngineError> {
        let block = read_block(world, pos);
        let result = self.sync_gate(world, pos, block);
        if block.is_wire() {
            self.update_wire(world, pos);
        }
        self.updates.notify_neighbors(pos, None);
        self.drain(world);
        result
    }

    /// The host removed whatever was at `pos`. Pending actions there are
    /// purged before anything else runs.
    pub fn on_block_removed<W: WorldView + ?Sized>(&mut self, world: &mut W, pos: BlockPos) {
        self.tear_down(world, pos);
        self.updates.notify_neighbors(pos, None);
        self.drain(world);
    }

    /// Flip a lever. Applies immediately. Returns whether the output changed.
    pub fn set_source<W: WorldView + ?Sized>(
        &mut self,
        world: &mut W,
        pos: BlockPos,
        on: bool,
    ) -> Result<bool, EngineError> {
        self.ensure_gate(world, pos)?;
        let state = self.gates.get(&pos).ok_or(EngineError::NotAGate(pos))?;
        if !matches!(state.kind, GateKind::Lever { .. }) {
            return Err(EngineError::NotASource(pos));
        }
        let mut report = StepReport::default();
        let changed = self.commit(world, pos, Desired::from_on(on), &mut report);
        self.drain(world);
        Ok(changed)
    }

    /// Press a button: on now, released after `button_press_ticks`. Pressing
    /// an already pressed button does nothing.
    pub fn press_button<W: WorldView + ?Sized>(
        &mut self,
        world: &mut W,
        pos: BlockPos,
    ) -> Result<bool, EngineError> {
        self.ensure_gate(world, pos)?;
        let state = self.gates.get(&pos).ok_or(EngineError::NotAGate(pos))?;
        if !matches!(state.kind, GateKind::Button { .. }) {
            return Err(EngineError::NotASource(pos));
        }
        if state.output_on {
            return Ok(false);
        }
        let mut report = StepReport::default();
        self.commit(world, pos, Desired::from_on(true), &mut report);
        let press = self.config.button_press_ticks;
        self.schedule_action(pos, ActionKind::Release, press, TickPriority::Normal)?;
        self.drain(world);
        Ok(true)
    }

    /// Drop every pending action at `pos`.
    pub fn cancel_all(&mut self, pos: BlockPos) -> usize {
        if let Some(state) = self.gates.get_mut(&pos) {
            state.pending_priority = None;
        }
        self.queue.cancel_all(pos)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn gate(&self, pos: BlockPos) -> Option<&GateState> {
        self.gates.get(&pos)
    }

    pub fn gates(&self) -> impl Iterator<Item = (BlockPos, &GateState)> {
        self.gates.iter().map(|(&pos, state)| (pos, state))
    }

    pub fn gate_count(&self) -> usize {
        self.gates.len()
    }

    pub fn gate_phase(&self, pos: BlockPos) -> Option<GatePhase> {
        let state = self.gates.get(&pos)?;
        Some(state.phase(self.queue.is_scheduled(pos, ActionKind::Toggle)))
    }

    /// Committed output of the gate at `pos`; false when there is none.
    pub fn is_powered(&self, pos: BlockPos) -> bool {
        self.gates.get(&pos).is_some_and(|state| state.output_on)
    }

    pub fn queue(&self) -> &TickQueue {
        &self.queue
    }

    pub fn burnout(&self) -> &BurnoutGuard {
        &self.burnout
    }

    pub fn evaluator<'a, W: WorldView + ?Sized>(&'a self, world: &'a W) -> SignalEvaluator<'a, W> {
        SignalEvaluator::new(world, &self.gates)
    }

    pub fn sample<W: WorldView + ?Sized>(&self, world: &W, pos: BlockPos, from: Direction) -> SignalSample {
        self.evaluator(world).sample(pos, from)
    }

    pub fn signal_at<W: WorldView + ?Sized>(&self, world: &W, pos: BlockPos, from: Direction) -> u8 {
        self.evaluator(world).signal_at(pos, from)
    }

    pub fn direct_signal_at<W: WorldView + ?Sized>(
        &self,
        world: &W,
        pos: BlockPos,
        from: Direction,
    ) -> u8 {
        self.evaluator(world).direct_signal_at(pos, from)
    }

    pub fn has_any_neighbor_signal<W: WorldView + ?Sized>(&self, world: &W, pos: BlockPos) -> bool {
        self.evaluator(world).has_any_neighbor_signal(pos)
    }

    /// Events recorded since the start of the last step.
    pub fn last_events(&self) -> Vec<RedstoneEvent> {
        self.events.buffer().to_vec()
    }

    pub fn event_buffer(&self) -> &EventBuffer {
        self.events.buffer()
    }

    pub fn suppress_event(&mut self, kind: EventKind) {
        self.events.suppress(kind);
    }

    pub fn on_passive(&mut self, kind: EventKind, listener: PassiveListener) {
        self.events.on_passive(kind, listener);
    }

    /// Hash of the clock, every gate's committed state and the queue. Two
    /// engines driven identically produce identical hashes.
    pub fn state_hash(&self) -> u64 {
        let mut hasher = StateHash::new();
        hasher.write_u64(self.sim_state.tick);
        hasher.write_u64(self.gates.len() as u64);
        for (&pos, state) in &self.gates {
            hasher.write_pos(pos);
            hasher.write_u8(state.kind.tag() as u8);
            hasher.write_u8(state.facing as u8);
            hasher.write_u8(state.output_on as u8);
            hasher.write_u8(state.output_level);
            hasher.write_u64(state.cooldown_until.unwrap_or(u64::MAX));
        }
        hasher.write_u64(self.queue.len() as u64);
        for action in self.queue.iter() {
            hasher.write_pos(action.pos);
            hasher.write_u8(action.kind as u8);
            hasher.write_u64(action.due);
            hasher.write_u8((action.priority.value() + 3) as u8);
        }
        hasher.finish()
    }

    // -----------------------------------------------------------------------
    // Internal: gate lifecycle
    // -----------------------------------------------------------------------

    /// Bring the gate table in line with the block at `pos`.
    fn sync_gate<W: WorldView + ?Sized>(
        &mut self,
        world: &mut W,
        pos: BlockPos,
        block: Block,
    ) -> Result<(), EngineError> {
        let existing = self
            .gates
            .get(&pos)
            .map(|state| block.gate().is_some_and(|gb| state.matches(&gb)));
        match (block.gate(), existing) {
            (Some(gb), Some(true)) => {
                if let Some(state) = self.gates.get_mut(&pos) {
                    state.reconfigure(gb, &self.config);
                }
                self.updates.recheck(pos);
                Ok(())
            }
            (Some(gb), existing) => {
                if existing.is_some() {
                    self.tear_down(world, pos);
                }
                self.place_gate(world, pos, gb)
            }
            (None, Some(_)) => {
                self.tear_down(world, pos);
                Ok(())
            }
            (None, None) => Ok(()),
        }
    }

    /// Create state for a gate the engine has not tracked yet, if the host
    /// put one at `pos` without telling us.
    fn ensure_gate<W: WorldView + ?Sized>(
        &mut self,
        world: &mut W,
        pos: BlockPos,
    ) -> Result<(), EngineError> {
        let block = read_block(world, pos);
        let Some(gb) = block.gate() else {
            return Err(EngineError::NotAGate(pos));
        };
        if self.gates.get(&pos).is_some_and(|state| state.matches(&gb)) {
            return Ok(());
        }
        self.sync_gate(world, pos, block)
    }

    /// New state for `gb`, with its initial output computed from the inputs
    /// present right now.
    fn place_gate<W: WorldView + ?Sized>(
        &mut self,
        world: &mut W,
        pos: BlockPos,
        gb: GateBlock,
    ) -> Result<(), EngineError> {
        gate::validate(&gb).map_err(|reason| EngineError::InvalidGate { pos, reason })?;
        let now = self.sim_state.tick;
        let mut state = GateState::placed(gb, &self.config);
        let initial = if state.is_signal_driven() {
            let eval = SignalEvaluator::new(&*world, &self.gates);
            state.desired_output(pos, &eval)
        } else if matches!(gb.kind, GateKind::Lever { .. }) {
            Desired::from_on(gb.powered)
        } else {
            Desired::from_on(false)
        };
        state.set_output(initial.on, initial.level);
        let placed = state.block();
        self.gates.insert(pos, state);
        if placed != gb {
            world.set_block(pos, Block::Gate(placed), UpdateFlags::DEFAULT);
        }
        debug!("placed {:?} at {pos}, output {}", gb.kind.tag(), initial.on);
        self.events.record(RedstoneEvent::GatePlaced {
            pos,
            gate: gb.kind.tag(),
            tick: now,
        });
        if initial.on {
            self.notify_output(world, pos);
        }
        Ok(())
    }

    /// Forget the gate at `pos`. Its queue entries go first.
    fn tear_down<W: WorldView + ?Sized>(&mut self, world: &W, pos: BlockPos) {
        let cancelled = self.queue.cancel_all(pos);
        let Some(state) = self.gates.remove(&pos) else {
            return;
        };
        self.burnout.forget(pos);
        debug!("removed gate at {pos}, {cancelled} pending action(s) purged");
        self.events.record(RedstoneEvent::GateRemoved {
            pos,
            tick: self.sim_state.tick,
        });
        if state.output_on {
            self.notify_output(world, pos);
        }
    }

    // -----------------------------------------------------------------------
    // Internal: neighbor updates
    // -----------------------------------------------------------------------

    fn drain<W: WorldView + ?Sized>(&mut self, world: &mut W) {
        while let Some(update) = self.updates.pop() {
            if let Err(err) = self.handle_update(world, update) {
                warn!(
                    "update of {} from {} failed: {err}",
                    update.pos, update.from
                );
            }
        }
        let dropped = self.updates.finish_batch();
        if dropped > 0 {
            warn!(
                "tick {}: update limit of {} reached, {dropped} update(s) dropped",
                self.sim_state.tick, self.config.max_chained_updates
            );
            self.events.record(RedstoneEvent::UpdateLimitReached {
                dropped,
                tick: self.sim_state.tick,
            });
        }
    }

    fn handle_update<W: WorldView + ?Sized>(
        &mut self,
        world: &mut W,
        update: NeighborUpdate,
    ) -> Result<(), EngineError> {
        let pos = update.pos;
        if !world.is_loaded(pos) {
            return Ok(());
        }
        match world.block(pos) {
            Block::Gate(gb) => {
                if !self.gates.get(&pos).is_some_and(|state| state.matches(&gb)) {
                    self.sync_gate(world, pos, Block::Gate(gb))?;
                }
                self.evaluate_gate(world, update)
            }
            Block::Wire { .. } => {
                self.update_wire(world, pos);
                Ok(())
            }
            _ => {
                if self.gates.contains_key(&pos) {
                    self.tear_down(world, pos);
                }
                if update.pos != update.from {
                    world.neighbor_changed(pos, update.from);
                }
                Ok(())
            }
        }
    }

    /// The transition rule: schedule a toggle when the desired output
    /// differs from the committed one and nothing is pending.
    fn evaluate_gate<W: WorldView + ?Sized>(
        &mut self,
        world: &W,
        update: NeighborUpdate,
    ) -> Result<(), EngineError> {
        let pos = update.pos;
        let now = self.sim_state.tick;
        let Some(state) = self.gates.get(&pos) else {
            return Ok(());
        };
        match state.kind {
            GateKind::Lever { .. } | GateKind::Button { .. } => return Ok(()),
            GateKind::Observer => {
                if update.source_changed && state.observed(pos) == Some(update.from) {
                    self.trigger_observer(pos)?;
                }
                return Ok(());
            }
            _ => {}
        }
        if state.is_cooling_down(now) {
            trace!("{pos} is cooling down, update from {} dropped", update.from);
            return Ok(());
        }
        if self.queue.is_scheduled(pos, ActionKind::Toggle) {
            return Ok(());
        }

        let eval = SignalEvaluator::new(world, &self.gates);
        if state.is_locked(pos, &eval) {
            return Ok(());
        }
        let desired = state.desired_output(pos, &eval);
        if desired == state.output() {
            return Ok(());
        }
        let priority = state.compute_priority(pos, &eval);
        let delay = state.delay_ticks;

        self.schedule_action(pos, ActionKind::Toggle, delay, priority)?;
        if let Some(state) = self.gates.get_mut(&pos) {
            state.pending_priority = Some(priority);
        }
        trace!("{pos} scheduled toggle to {} at +{delay} ({priority:?})", desired.on);
        Ok(())
    }

    fn trigger_observer(&mut self, pos: BlockPos) -> Result<(), EngineError> {
        let Some(state) = self.gates.get(&pos) else {
            return Ok(());
        };
        if state.output_on || self.queue.is_scheduled(pos, ActionKind::Toggle) {
            return Ok(());
        }
        let delay = state.delay_ticks;
        self.schedule_action(pos, ActionKind::Toggle, delay, TickPriority::Normal)?;
        if let Some(state) = self.gates.get_mut(&pos) {
            state.pending_priority = Some(TickPriority::Normal);
        }
        Ok(())
    }

    /// Queue updates for everything a gate output at `pos` can reach: the six
    /// neighbors, and the neighbors of any solid block among them.
    fn notify_output<W: WorldView + ?Sized>(&mut self, world: &W, pos: BlockPos) {
        self.updates.notify_neighbors(pos, None);
        for (_, neighbor) in pos.neighbors() {
            if read_block(world, neighbor).is_conductor() {
                self.updates.notify_through(neighbor, pos);
            }
        }
    }

    fn update_wire<W: WorldView + ?Sized>(&mut self, world: &mut W, pos: BlockPos) {
        let now = self.sim_state.tick;
        let update = {
            let eval = SignalEvaluator::new(&*world, &self.gates);
            wire::recompute(&eval, pos, self.config.max_chained_updates)
        };
        for change in &update.changes {
            world.set_block(
                change.pos,
                Block::Wire { power: change.new },
                UpdateFlags::DEFAULT,
            );
            self.events.record(RedstoneEvent::WireChanged {
                pos: change.pos,
                old: change.old,
                new: change.new,
                tick: now,
            });
        }
        for change in &update.changes {
            for (_, neighbor) in change.pos.neighbors() {
                if update.members.contains(&neighbor) {
                    continue;
                }
                self.updates.notify_at(neighbor, change.pos);
                if read_block(&*world, neighbor).is_conductor() {
                    self.updates.notify_through(neighbor, change.pos);
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Internal: firing
    // -----------------------------------------------------------------------

    fn fire<W: WorldView + ?Sized>(
        &mut self,
        world: &mut W,
        action: ScheduledAction,
        report: &mut StepReport,
    ) {
        let pos = action.pos;
        let loaded = world.is_loaded(pos);
        let live = loaded
            && match (self.gates.get(&pos), world.block(pos).gate()) {
                (Some(state), Some(gb)) => state.matches(&gb),
                _ => false,
            };
        if !live {
            report.stale_actions += 1;
            trace!("skipping stale {:?} at {pos}", action.kind);
            self.events.record(RedstoneEvent::StaleActionSkipped {
                pos,
                kind: action.kind,
                tick: self.sim_state.tick,
            });
            if loaded && self.gates.contains_key(&pos) {
                self.tear_down(world, pos);
            }
            self.drain(world);
            return;
        }

        let result = match action.kind {
            ActionKind::Toggle => self.fire_toggle(world, pos, report),
            ActionKind::Release => {
                self.fire_release(world, pos, report);
                Ok(())
            }
            ActionKind::Recheck => self.fire_recheck(world, pos, report),
        };
        if let Err(err) = result {
            warn!("{:?} at {pos} failed: {err}", action.kind);
        }
        self.drain(world);
    }

    fn fire_toggle<W: WorldView + ?Sized>(
        &mut self,
        world: &mut W,
        pos: BlockPos,
        report: &mut StepReport,
    ) -> Result<(), EngineError> {
        let Some(state) = self.gates.get_mut(&pos) else {
            return Ok(());
        };
        state.pending_priority = None;
        let kind = state.kind;
        match kind {
            GateKind::Observer => {
                self.commit(world, pos, Desired::from_on(true), report);
                let pulse = self.config.observer_pulse;
                self.schedule_action(pos, ActionKind::Release, pulse, TickPriority::Normal)?;
                Ok(())
            }
            GateKind::Lever { .. } | GateKind::Button { .. } => Ok(()),
            _ => self.resample(world, pos, report),
        }
    }

    fn fire_release<W: WorldView + ?Sized>(
        &mut self,
        world: &mut W,
        pos: BlockPos,
        report: &mut StepReport,
    ) {
        let releases = self
            .gates
            .get(&pos)
            .is_some_and(|state| matches!(state.kind, GateKind::Observer | GateKind::Button { .. }));
        if releases {
            self.commit(world, pos, Desired::from_on(false), report);
        }
    }

    fn fire_recheck<W: WorldView + ?Sized>(
        &mut self,
        world: &mut W,
        pos: BlockPos,
        report: &mut StepReport,
    ) -> Result<(), EngineError> {
        let Some(state) = self.gates.get_mut(&pos) else {
            return Ok(());
        };
        state.cooldown_until = None;
        debug!("{pos} cool-down expired");
        self.events.record(RedstoneEvent::CooldownExpired {
            pos,
            tick: self.sim_state.tick,
        });
        self.resample(world, pos, report)
    }

    /// Re-read the inputs of a signal-driven gate and commit what they say,
    /// subject to the lock and burnout rules.
    fn resample<W: WorldView + ?Sized>(
        &mut self,
        world: &mut W,
        pos: BlockPos,
        report: &mut StepReport,
    ) -> Result<(), EngineError> {
        let now = self.sim_state.tick;
        let Some(state) = self.gates.get(&pos) else {
            return Ok(());
        };
        if state.is_cooling_down(now) {
            return Ok(());
        }
        let eval = SignalEvaluator::new(&*world, &self.gates);
        if state.is_locked(pos, &eval) {
            return Ok(());
        }
        let desired = state.desired_output(pos, &eval);
        let current = state.output();
        let guarded = state.uses_burnout_guard();

        if guarded
            && desired.on
            && !current.on
            && self.burnout.is_toggled_too_frequently(pos, now)
        {
            return self.burn_out(pos);
        }
        if desired != current {
            self.commit(world, pos, desired, report);
            if guarded {
                self.burnout.record_toggle(pos, now);
            }
        }
        // Inputs may have moved again while this toggle was pending.
        self.updates.recheck(pos);
        Ok(())
    }

    fn burn_out(&mut self, pos: BlockPos) -> Result<(), EngineError> {
        let now = self.sim_state.tick;
        let cooldown = self.config.burnout_cooldown;
        let until = now.saturating_add(cooldown);
        if let Some(state) = self.gates.get_mut(&pos) {
            state.cooldown_until = Some(until);
            state.pending_priority = None;
        }
        self.queue.cancel(pos, ActionKind::Toggle);
        self.schedule_action(pos, ActionKind::Recheck, cooldown, TickPriority::Normal)?;
        debug!("{pos} burnt out until tick {until}");
        self.events.record(RedstoneEvent::GateBurnedOut {
            pos,
            until,
            tick: now,
        });
        Ok(())
    }

    /// Apply a new output, write the display bit back to the host and queue
    /// neighbor updates. Returns false when nothing changed.
    fn commit<W: WorldView + ?Sized>(
        &mut self,
        world: &mut W,
        pos: BlockPos,
        desired: Desired,
        report: &mut StepReport,
    ) -> bool {
        let Some(state) = self.gates.get_mut(&pos) else {
            return false;
        };
        if state.output() == desired {
            return false;
        }
        state.set_output(desired.on, desired.level);
        let block = state.block();
        world.set_block(pos, Block::Gate(block), UpdateFlags::DEFAULT);
        report.toggles += 1;
        trace!("{pos} -> {} ({})", desired.on, desired.level);
        self.events.record(RedstoneEvent::GateToggled {
            pos,
            on: desired.on,
            level: desired.level,
            tick: self.sim_state.tick,
        });
        self.notify_output(&*world, pos);
        true
    }

    fn schedule_action(
        &mut self,
        pos: BlockPos,
        kind: ActionKind,
        delay: Ticks,
        priority: TickPriority,
    ) -> Result<bool, ScheduleError> {
        self.schedule_tick(pos, kind, i64::try_from(delay).unwrap_or(i64::MAX), priority)
    }
}

impl TickScheduler for RedstoneEngine {
    fn schedule_tick(
        &mut self,
        pos: BlockPos,
        kind: ActionKind,
        delay: i64,
        priority: TickPriority,
    ) -> Result<bool, ScheduleError> {
        self.queue
            .schedule(self.sim_state.tick, pos, kind, delay, priority)
    }

    fn has_scheduled_tick(&self, pos: BlockPos, kind: ActionKind) -> bool {
        self.queue.is_scheduled(pos, kind)
    }
}

fn read_block<W: WorldView + ?Sized>(world: &W, pos: BlockPos) -> Block {
    if world.is_loaded(pos) {
        world.block(pos)
    } else {
        Block::Air
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    // -----------------------------------------------------------------------
    // Placement
    // -----------------------------------------------------------------------

    #[test]
    fn placement_computes_initial_output() {
        let mut world = GridWorld::new();
        let mut engine = RedstoneEngine::new();
        world.put(at(-1, 0, 0), Block::PowerBlock);
        place(&mut engine, &mut world, at(0, 0, 0), repeater(Direction::East, 1)).unwrap();
        assert!(engine.is_powered(at(0, 0, 0)));
        assert!(engine.queue().is_empty());
        // The host block mirrors the committed output.
        assert_eq!(world.get(at(0, 0, 0)).gate().map(|g| g.powered), Some(true));
    }

    #[test]
    fn torch_starts_lit_on_unpowered_block() {
        let mut world = GridWorld::new();
        let mut engine = RedstoneEngine::new();
        world.put(at(0, 0, 0), stone());
        place(&mut engine, &mut world, at(0, 1, 0), torch(Direction::Down)).unwrap();
        assert!(engine.is_powered(at(0, 1, 0)));
    }

    #[test]
    fn invalid_repeater_delay_rejected() {
        let mut world = GridWorld::new();
        let mut engine = RedstoneEngine::new();
        let err = place(&mut engine, &mut world, at(0, 0, 0), repeater(Direction::East, 9))
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidGate { .. }));
        assert!(engine.gate(at(0, 0, 0)).is_none());
    }

    #[test]
    fn placing_logs_event() {
        let mut world = GridWorld::new();
        let mut engine = RedstoneEngine::new();
        place(&mut engine, &mut world, at(0, 0, 0), observer(Direction::North)).unwrap();
        assert!(engine.last_events().iter().any(|e| matches!(
            e,
            RedstoneEvent::GatePlaced {
                gate: crate::block::GateTag::Observer,
                ..
            }
        )));
    }

    // -----------------------------------------------------------------------
    // Sources
    // -----------------------------------------------------------------------

    #[test]
    fn lever_applies_immediately() {
        let mut world = GridWorld::new();
        let mut engine = RedstoneEngine::new();
        place(&mut engine, &mut world, at(0, 0, 0), lever(Direction::Down)).unwrap();
        assert_eq!(engine.set_source(&mut world, at(0, 0, 0), true), Ok(true));
        assert!(engine.is_powered(at(0, 0, 0)));
        assert_eq!(engine.set_source(&mut world, at(0, 0, 0), true), Ok(false));
    }

    #[test]
    fn set_source_rejects_non_levers() {
        let mut world = GridWorld::new();
        let mut engine = RedstoneEngine::new();
        place(&mut engine, &mut world, at(0, 0, 0), repeater(Direction::East, 1)).unwrap();
        assert_eq!(
            engine.set_source(&mut world, at(0, 0, 0), true),
            Err(EngineError::NotASource(at(0, 0, 0)))
        );
        assert_eq!(
            engine.set_source(&mut world, at(5, 0, 0), true),
            Err(EngineError::NotAGate(at(5, 0, 0)))
        );
    }

    #[test]
    fn button_releases_after_press_time() {
        let mut world = GridWorld::new();
        let mut engine = RedstoneEngine::new();
        place(&mut engine, &mut world, at(0, 0, 0), button(Direction::Down)).unwrap();
        assert_eq!(engine.press_button(&mut world, at(0, 0, 0)), Ok(true));
        assert_eq!(engine.press_button(&mut world, at(0, 0, 0)), Ok(false));
        engine.advance(&mut world, 19);
        assert!(engine.is_powered(at(0, 0, 0)));
        engine.step(&mut world);
        assert!(!engine.is_powered(at(0, 0, 0)));
    }

    #[test]
    fn lazily_observed_lever() {
        let mut world = GridWorld::new();
        let mut engine = RedstoneEngine::new();
        world.put(at(0, 0, 0), lever(Direction::Down));
        assert_eq!(engine.set_source(&mut world, at(0, 0, 0), true), Ok(true));
        assert_eq!(engine.gate_count(), 1);
    }

    // -----------------------------------------------------------------------
    // Scheduling
    // -----------------------------------------------------------------------

    #[test]
    fn rising_edge_schedules_then_commits() {
        let mut world = GridWorld::new();
        let mut engine = RedstoneEngine::new();
        place(&mut engine, &mut world, at(-1, 0, 0), lever(Direction::Down)).unwrap();
        place(&mut engine, &mut world, at(0, 0, 0), repeater(Direction::East, 2)).unwrap();

        engine.set_source(&mut world, at(-1, 0, 0), true).unwrap();
        assert_eq!(engine.gate_phase(at(0, 0, 0)), Some(GatePhase::PendingOn));
        engine.advance(&mut world, 3);
        assert_eq!(engine.gate_phase(at(0, 0, 0)), Some(GatePhase::PendingOn));
        engine.step(&mut world);
        assert_eq!(engine.gate_phase(at(0, 0, 0)), Some(GatePhase::On));
    }

    #[test]
    fn short_pulse_is_resampled_at_fire_time() {
        let mut world = GridWorld::new();
        let mut engine = RedstoneEngine::new();
        let lever_pos = at(-1, 0, 0);
        place(&mut engine, &mut world, lever_pos, lever(Direction::Down)).unwrap();
        place(&mut engine, &mut world, at(0, 0, 0), repeater(Direction::East, 2)).unwrap();

        engine.set_source(&mut world, lever_pos, true).unwrap();
        engine.step(&mut world);
        engine.set_source(&mut world, lever_pos, false).unwrap();
        let report = engine.advance(&mut world, 5);
        assert_eq!(report.toggles, 0);
        assert!(!engine.is_powered(at(0, 0, 0)));
    }

    #[test]
    fn removal_purges_queue() {
        let mut world = GridWorld::new();
        let mut engine = RedstoneEngine::new();
        place(&mut engine, &mut world, at(-1, 0, 0), lever(Direction::Down)).unwrap();
        place(&mut engine, &mut world, at(0, 0, 0), repeater(Direction::East, 1)).unwrap();
        engine.set_source(&mut world, at(-1, 0, 0), true).unwrap();
        assert!(engine.queue().is_scheduled(at(0, 0, 0), ActionKind::Toggle));

        remove(&mut engine, &mut world, at(0, 0, 0));
        assert!(engine.queue().is_empty());
        assert!(engine.gate(at(0, 0, 0)).is_none());
    }

    #[test]
    fn replacing_with_other_gate_tears_down() {
        let mut world = GridWorld::new();
        let mut engine = RedstoneEngine::new();
        place(&mut engine, &mut world, at(0, 0, 0), repeater(Direction::East, 1)).unwrap();
        place(&mut engine, &mut world, at(0, 0, 0), repeater(Direction::West, 1)).unwrap();
        assert_eq!(engine.gate(at(0, 0, 0)).map(|g| g.facing), Some(Direction::West));
        let removed = engine
            .last_events()
            .iter()
            .filter(|e| matches!(e, RedstoneEvent::GateRemoved { .. }))
            .count();
        assert_eq!(removed, 1);
    }

    #[test]
    fn same_identity_refreshes_configuration() {
        let mut world = GridWorld::new();
        let mut engine = RedstoneEngine::new();
        place(&mut engine, &mut world, at(0, 0, 0), repeater(Direction::East, 1)).unwrap();
        place(&mut engine, &mut world, at(0, 0, 0), repeater(Direction::East, 4)).unwrap();
        assert_eq!(engine.gate(at(0, 0, 0)).map(|g| g.delay_ticks), Some(8));
        assert!(
            !engine
                .last_events()
                .iter()
                .any(|e| matches!(e, RedstoneEvent::GateRemoved { .. }))
        );
    }

    #[test]
    fn consumer_hears_about_output() {
        let mut world = GridWorld::new();
        let mut engine = RedstoneEngine::new();
        let lamp = at(1, 0, 0);
        world.put(lamp, Block::Solid(99));
        place(&mut engine, &mut world, at(0, 0, 0), lever(Direction::Down)).unwrap();
        world.clear_neighbor_log();
        engine.set_source(&mut world, at(0, 0, 0), true).unwrap();
        assert!(world.neighbor_log().contains(&(lamp, at(0, 0, 0))));
        assert!(engine.has_any_neighbor_signal(&world, lamp));
    }

    #[test]
    fn hashes_match_for_identical_runs() {
        let run = || {
            let mut world = GridWorld::new();
            let mut engine = RedstoneEngine::new();
            place(&mut engine, &mut world, at(-1, 0, 0), lever(Direction::Down)).unwrap();
            for x in 0..4 {
                place(&mut engine, &mut world, at(x, 0, 0), repeater(Direction::East, 1)).unwrap();
            }
            engine.set_source(&mut world, at(-1, 0, 0), true).unwrap();
            engine.advance(&mut world, 5);
            engine.state_hash()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn hash_changes_with_state() {
        let mut world = GridWorld::new();
        let mut engine = RedstoneEngine::new();
        place(&mut engine, &mut world, at(0, 0, 0), lever(Direction::Down)).unwrap();
        let before = engine.state_hash();
        engine.set_source(&mut world, at(0, 0, 0), true).unwrap();
        assert_ne!(before, engine.state_hash());
    }

    #[test]
    fn scheduler_trait_rejects_negative_delay() {
        let mut engine = RedstoneEngine::new();
        let err = engine
            .schedule_tick(at(0, 0, 0), ActionKind::Toggle, -2, TickPriority::Normal)
            .unwrap_err();
        assert_eq!(err, ScheduleError::NegativeDelay(-2));
        assert!(!engine.has_scheduled_tick(at(0, 0, 0), ActionKind::Toggle));
    }
}
