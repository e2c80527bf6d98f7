//! Redstone Core -- an engine-agnostic signal propagation and scheduled-tick
//! update protocol.
//!
//! The engine simulates edge-triggered logic gates (repeaters, comparators,
//! torches, observers) and host-driven sources (levers, buttons) connected
//! by wire and conductive blocks. Block storage stays with the host, which
//! the engine reaches only through the [`world::WorldView`] trait.
//!
//! # Tick Model
//!
//! Each call to [`engine::RedstoneEngine::step`] advances the clock by one
//! tick and then:
//!
//! 1. **Poll** -- takes every action due at the new tick off the
//!    [`schedule::TickQueue`], ordered by due tick, priority, insertion.
//! 2. **Fire** -- each gate re-samples its inputs and commits the result.
//!    Stale actions (gate removed or replaced) are skipped.
//! 3. **Notify** -- committed changes fan out to the six neighbors. Gates
//!    only schedule; wire re-solves immediately; other blocks are handed to
//!    the host.
//!
//! A chain of gates therefore advances one hop per gate delay, never
//! recursively within one tick.
//!
//! # Host Pattern
//!
//! ```rust,ignore
//! world.put(pos, repeater(Direction::East, 1));
//! engine.on_block_changed(&mut world, pos)?;
//! engine.set_source(&mut world, lever_pos, true)?;
//! engine.advance(&mut world, 4);
//! assert!(engine.is_powered(pos));
//! ```
//!
//! # Key Types
//!
//! - [`engine::RedstoneEngine`] -- Owns the clock, queue, gate table and
//!   burnout guard; the host-facing API.
//! - [`schedule::TickQueue`] -- Deduplicating priority queue of pending
//!   actions.
//! - [`signal::SignalEvaluator`] -- Pure signal-strength queries.
//! - [`gate::GateState`] -- Per-gate state and per-kind policy.
//! - [`burnout::BurnoutGuard`] -- Toggle-frequency limiter for torches.
//! - [`event::RedstoneEvent`] -- Transition records for the last step.

pub mod block;
pub mod burnout;
pub mod config;
pub mod engine;
pub mod event;
pub mod gate;
pub mod pos;
pub mod propagate;
pub mod schedule;
pub mod signal;
pub mod sim;
pub mod wire;
pub mod world;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
