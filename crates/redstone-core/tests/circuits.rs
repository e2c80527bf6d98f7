//! End-to-end circuit behavior: timing, locking, burnout, teardown and the
//! individual gate kinds, driven through `RedstoneEngine` against an
//! in-memory `GridWorld`.

use redstone_core::block::{Block, ComparatorMode};
use redstone_core::engine::RedstoneEngine;
use redstone_core::event::RedstoneEvent;
use redstone_core::gate::GatePhase;
use redstone_core::pos::Direction;
use redstone_core::schedule::{ActionKind, TickPriority, TickScheduler};
use redstone_core::test_utils::*;

// ===========================================================================
// Repeater timing
// ===========================================================================

#[test]
fn repeater_chain_advances_one_hop_per_delay() {
    let mut world = GridWorld::new();
    let mut engine = RedstoneEngine::new();
    let lever_pos = at(0, 0, 0);
    let gates = repeater_line(&mut engine, &mut world, lever_pos, Direction::East, 3, 1).unwrap();

    engine.set_source(&mut world, lever_pos, true).unwrap();
    assert_eq!(engine.tick(), 0);

    let mut on_at = [None; 3];
    for _ in 0..8 {
        engine.step(&mut world);
        for (i, &pos) in gates.iter().enumerate() {
            if on_at[i].is_none() && engine.is_powered(pos) {
                on_at[i] = Some(engine.tick());
            }
        }
    }
    assert_eq!(on_at, [Some(2), Some(4), Some(6)]);
}

#[test]
fn falling_edge_follows_same_timing() {
    let mut world = GridWorld::new();
    let mut engine = RedstoneEngine::new();
    let lever_pos = at(0, 0, 0);
    let gates = repeater_line(&mut engine, &mut world, lever_pos, Direction::North, 2, 2).unwrap();

    engine.set_source(&mut world, lever_pos, true).unwrap();
    engine.advance(&mut world, 8);
    assert!(gates.iter().all(|&p| engine.is_powered(p)));

    engine.set_source(&mut world, lever_pos, false).unwrap();
    engine.advance(&mut world, 3);
    assert!(engine.is_powered(gates[0]));
    engine.step(&mut world);
    assert!(!engine.is_powered(gates[0]));
    assert!(engine.is_powered(gates[1]));
    engine.advance(&mut world, 4);
    assert!(!engine.is_powered(gates[1]));
}

#[test]
fn repeater_feeding_repeater_gets_top_priority() {
    let mut world = GridWorld::new();
    let mut engine = RedstoneEngine::new();
    let lever_pos = at(0, 0, 0);
    let gates = repeater_line(&mut engine, &mut world, lever_pos, Direction::East, 2, 1).unwrap();
    engine.set_source(&mut world, lever_pos, true).unwrap();
    let pending = engine.queue().pending(gates[0], ActionKind::Toggle).copied();
    assert_eq!(pending.map(|a| a.priority), Some(TickPriority::ExtremelyHigh));
}

// ===========================================================================
// Locking
// ===========================================================================

#[test]
fn locked_repeater_never_toggles() {
    let mut world = GridWorld::new();
    let mut engine = RedstoneEngine::new();
    let rep = at(0, 0, 0);
    let side = at(0, 0, -1);
    let lever_pos = at(-1, 0, 0);

    place(&mut engine, &mut world, at(0, 0, -2), Block::PowerBlock).unwrap();
    place(&mut engine, &mut world, side, repeater(Direction::South, 1)).unwrap();
    assert!(engine.is_powered(side));
    place(&mut engine, &mut world, lever_pos, lever(Direction::Down)).unwrap();
    place(&mut engine, &mut world, rep, repeater(Direction::East, 1)).unwrap();

    for t in 0..20 {
        engine.set_source(&mut world, lever_pos, t % 2 == 0).unwrap();
        engine.step(&mut world);
        assert!(!engine.is_powered(rep));
        assert!(!engine.queue().is_scheduled(rep, ActionKind::Toggle));
        assert_eq!(toggles_at(&engine.last_events(), rep), 0);
    }
}

#[test]
fn unlocking_reevaluates_front_input() {
    let mut world = GridWorld::new();
    let mut engine = RedstoneEngine::new();
    let rep = at(0, 0, 0);
    let side = at(0, 0, -1);
    let side_lever = at(0, 0, -2);
    let front_lever = at(-1, 0, 0);

    place(&mut engine, &mut world, side_lever, lever(Direction::Down)).unwrap();
    place(&mut engine, &mut world, side, repeater(Direction::South, 1)).unwrap();
    place(&mut engine, &mut world, front_lever, lever(Direction::Down)).unwrap();
    place(&mut engine, &mut world, rep, repeater(Direction::East, 1)).unwrap();

    engine.set_source(&mut world, side_lever, true).unwrap();
    engine.advance(&mut world, 2);
    assert!(engine.is_powered(side));

    engine.set_source(&mut world, front_lever, true).unwrap();
    engine.advance(&mut world, 10);
    assert!(!engine.is_powered(rep));

    engine.set_source(&mut world, side_lever, false).unwrap();
    let on_at = run_until(&mut engine, &mut world, 10, |e, _| e.is_powered(rep));
    let unlocked_at = on_at.expect("repeater should turn on once unlocked");
    assert_eq!(unlocked_at, 16);
}

// ===========================================================================
// Burnout
// ===========================================================================

#[test]
fn torch_loop_burns_out_after_eight_toggles() {
    let mut world = GridWorld::new();
    let mut engine = RedstoneEngine::new();
    let torch_pos = torch_loop(&mut engine, &mut world, at(0, 0, 0)).unwrap();
    assert!(engine.is_powered(torch_pos));

    let mut toggles = 0;
    let mut burnt_at = None;
    for _ in 0..40 {
        engine.step(&mut world);
        let events = engine.last_events();
        toggles += toggles_at(&events, torch_pos);
        if events
            .iter()
            .any(|e| matches!(e, RedstoneEvent::GateBurnedOut { pos, .. } if *pos == torch_pos))
        {
            burnt_at = Some(engine.tick());
            break;
        }
    }
    // Nine toggles (2..=18) commit; the relight at 20 is refused.
    assert_eq!(burnt_at, Some(20));
    assert_eq!(toggles, 9);
    assert!(!engine.is_powered(torch_pos));
    assert_eq!(engine.gate(torch_pos).and_then(|g| g.cooldown_until), Some(180));
}

#[test]
fn burnt_out_torch_ignores_inputs_for_cooldown() {
    let mut world = GridWorld::new();
    let mut engine = RedstoneEngine::new();
    let torch_pos = torch_loop(&mut engine, &mut world, at(0, 0, 0)).unwrap();
    engine.advance(&mut world, 20);
    assert!(engine.gate(torch_pos).is_some_and(|g| g.cooldown_until.is_some()));

    for _ in 0..159 {
        engine.step(&mut world);
        // Input says "turn on"; the torch stays dark.
        assert_eq!(engine.signal_at(&world, torch_pos, Direction::West), 0);
        assert!(!engine.is_powered(torch_pos));
        assert_eq!(toggles_at(&engine.last_events(), torch_pos), 0);
    }
    assert_eq!(engine.tick(), 179);

    engine.step(&mut world);
    assert!(engine.is_powered(torch_pos));
    assert!(
        engine
            .last_events()
            .iter()
            .any(|e| matches!(e, RedstoneEvent::CooldownExpired { .. }))
    );
}

#[test]
fn slow_toggling_never_burns_out() {
    let mut world = GridWorld::new();
    let mut engine = RedstoneEngine::new();
    let lever_pos = at(-1, 0, 0);
    let torch_pos = at(0, 1, 0);
    place(&mut engine, &mut world, at(0, 0, 0), stone()).unwrap();
    place(&mut engine, &mut world, lever_pos, lever(Direction::East)).unwrap();
    place(&mut engine, &mut world, torch_pos, torch(Direction::Down)).unwrap();

    // One toggle every 10 ticks: at most 7 inside any 60-tick window.
    for t in 0..300u64 {
        if t % 10 == 0 {
            engine.set_source(&mut world, lever_pos, (t / 10) % 2 == 0).unwrap();
        }
        engine.step(&mut world);
        assert!(engine.gate(torch_pos).is_some_and(|g| g.cooldown_until.is_none()));
    }
}

#[test]
fn turning_off_never_starts_burnout() {
    let mut world = GridWorld::new();
    let mut engine = RedstoneEngine::new();
    let lever_pos = at(-1, 0, 0);
    let torch_pos = at(0, 1, 0);
    place(&mut engine, &mut world, at(0, 0, 0), stone()).unwrap();
    place(&mut engine, &mut world, lever_pos, lever(Direction::East)).unwrap();
    place(&mut engine, &mut world, torch_pos, torch(Direction::Down)).unwrap();

    // Flip every 4 ticks: nine torch toggles at 2, 6, .., 34, the last one off.
    for i in 0..9 {
        engine.set_source(&mut world, lever_pos, i % 2 == 0).unwrap();
        engine.advance(&mut world, 4);
    }
    assert_eq!(engine.tick(), 36);
    assert!(!engine.is_powered(torch_pos));
    assert!(engine.gate(torch_pos).is_some_and(|g| g.cooldown_until.is_none()));
    assert!(!engine.queue().is_scheduled(torch_pos, ActionKind::Recheck));

    // Hold the input long enough for the window to empty, then release.
    engine.advance(&mut world, 70);
    engine.set_source(&mut world, lever_pos, false).unwrap();
    engine.advance(&mut world, 2);
    assert_eq!(engine.tick(), 108);
    assert!(engine.is_powered(torch_pos));
    assert!(engine.gate(torch_pos).is_some_and(|g| g.cooldown_until.is_none()));
}

// ===========================================================================
// Teardown
// ===========================================================================

#[test]
fn removed_gate_action_is_a_no_op() {
    let mut world = GridWorld::new();
    let mut engine = RedstoneEngine::new();
    let rep = at(0, 0, 0);
    place(&mut engine, &mut world, rep, repeater(Direction::East, 1)).unwrap();
    engine
        .schedule_tick(rep, ActionKind::Toggle, 2, TickPriority::Normal)
        .unwrap();

    // The host clears the block without telling the engine.
    world.put(rep, Block::Air);
    let report = engine.advance(&mut world, 3);
    assert_eq!(report.stale_actions, 1);
    assert!(engine.gate(rep).is_none());
    assert!(
        engine.gate_count() == 0,
        "firing a stale action must not re-create gate state"
    );
}

#[test]
fn action_without_gate_is_skipped() {
    let mut world = GridWorld::new();
    let mut engine = RedstoneEngine::new();
    let pos = at(4, 4, 4);
    engine
        .schedule_tick(pos, ActionKind::Toggle, 1, TickPriority::High)
        .unwrap();
    engine.step(&mut world);
    assert!(engine.last_events().iter().any(|e| matches!(
        e,
        RedstoneEvent::StaleActionSkipped {
            kind: ActionKind::Toggle,
            ..
        }
    )));
    assert_eq!(engine.gate_count(), 0);
}

#[test]
fn removing_powered_gate_depowers_neighbors() {
    let mut world = GridWorld::new();
    let mut engine = RedstoneEngine::new();
    let lever_pos = at(0, 0, 0);
    let gates = repeater_line(&mut engine, &mut world, lever_pos, Direction::East, 2, 1).unwrap();
    engine.set_source(&mut world, lever_pos, true).unwrap();
    engine.advance(&mut world, 4);
    assert!(engine.is_powered(gates[1]));

    remove(&mut engine, &mut world, gates[0]);
    assert_eq!(engine.gate_phase(gates[1]), Some(GatePhase::PendingOff));
    engine.advance(&mut world, 2);
    assert!(!engine.is_powered(gates[1]));
}

// ===========================================================================
// Signal reads
// ===========================================================================

#[test]
fn gate_never_reads_its_own_output() {
    let mut world = GridWorld::new();
    let mut engine = RedstoneEngine::new();
    let lever_pos = at(-1, 0, 0);
    let rep = at(0, 0, 0);
    let block = at(1, 0, 0);
    place(&mut engine, &mut world, block, stone()).unwrap();
    place(&mut engine, &mut world, lever_pos, lever(Direction::Down)).unwrap();
    place(&mut engine, &mut world, rep, repeater(Direction::East, 1)).unwrap();
    engine.set_source(&mut world, lever_pos, true).unwrap();
    engine.advance(&mut world, 2);
    assert!(engine.is_powered(rep));

    assert_eq!(engine.signal_at(&world, rep, Direction::East), 0);
    assert_eq!(engine.direct_signal_at(&world, block, Direction::West), 15);
    assert_eq!(engine.signal_at(&world, at(1, 1, 0), Direction::Down), 15);
}

#[test]
fn consumer_sees_strongly_powered_block() {
    let mut world = GridWorld::new();
    let mut engine = RedstoneEngine::new();
    let lamp = at(1, 1, 0);
    world.put(lamp, Block::Solid(50));
    place(&mut engine, &mut world, at(1, 0, 0), stone()).unwrap();
    place(&mut engine, &mut world, at(0, 0, 0), lever(Direction::East)).unwrap();
    assert!(!engine.has_any_neighbor_signal(&world, lamp));
    engine.set_source(&mut world, at(0, 0, 0), true).unwrap();
    assert!(engine.has_any_neighbor_signal(&world, lamp));
    assert!(world.neighbor_log().iter().any(|&(p, _)| p == lamp));
}

// ===========================================================================
// Wire
// ===========================================================================

#[test]
fn wire_decays_over_distance() {
    let mut world = GridWorld::new();
    let mut engine = RedstoneEngine::new();
    place(&mut engine, &mut world, at(0, 0, 0), lever(Direction::Down)).unwrap();
    for x in 1..=16 {
        place(&mut engine, &mut world, at(x, 0, 0), wire()).unwrap();
    }
    engine.set_source(&mut world, at(0, 0, 0), true).unwrap();
    assert_eq!(world.wire_power(at(1, 0, 0)), Some(15));
    assert_eq!(world.wire_power(at(8, 0, 0)), Some(8));
    assert_eq!(world.wire_power(at(15, 0, 0)), Some(1));
    assert_eq!(world.wire_power(at(16, 0, 0)), Some(0));

    engine.set_source(&mut world, at(0, 0, 0), false).unwrap();
    assert!((1..=16).all(|x| world.wire_power(at(x, 0, 0)) == Some(0)));
}

#[test]
fn wire_drives_repeater() {
    let mut world = GridWorld::new();
    let mut engine = RedstoneEngine::new();
    place(&mut engine, &mut world, at(0, 0, 0), lever(Direction::Down)).unwrap();
    for x in 1..=3 {
        place(&mut engine, &mut world, at(x, 0, 0), wire()).unwrap();
    }
    let rep = at(4, 0, 0);
    place(&mut engine, &mut world, rep, repeater(Direction::East, 1)).unwrap();
    engine.set_source(&mut world, at(0, 0, 0), true).unwrap();
    engine.advance(&mut world, 2);
    assert!(engine.is_powered(rep));
    assert_eq!(engine.gate(rep).map(|g| g.output_level), Some(15));
}

// ===========================================================================
// Other gate kinds
// ===========================================================================

#[test]
fn torch_inverts_with_two_tick_delay() {
    let mut world = GridWorld::new();
    let mut engine = RedstoneEngine::new();
    let lever_pos = at(-1, 0, 0);
    let torch_pos = at(0, 1, 0);
    place(&mut engine, &mut world, at(0, 0, 0), stone()).unwrap();
    place(&mut engine, &mut world, lever_pos, lever(Direction::East)).unwrap();
    place(&mut engine, &mut world, torch_pos, torch(Direction::Down)).unwrap();
    assert!(engine.is_powered(torch_pos));

    engine.set_source(&mut world, lever_pos, true).unwrap();
    engine.step(&mut world);
    assert!(engine.is_powered(torch_pos));
    engine.step(&mut world);
    assert!(!engine.is_powered(torch_pos));
}

#[test]
fn observer_emits_two_tick_pulse() {
    let mut world = GridWorld::new();
    let mut engine = RedstoneEngine::new();
    let obs = at(0, 0, 0);
    let out = at(-1, 0, 0);
    place(&mut engine, &mut world, out, wire()).unwrap();
    place(&mut engine, &mut world, obs, observer(Direction::East)).unwrap();

    place(&mut engine, &mut world, at(1, 0, 0), stone()).unwrap();
    let mut powered_ticks = Vec::new();
    for _ in 0..8 {
        engine.step(&mut world);
        if engine.is_powered(obs) {
            powered_ticks.push(engine.tick());
            assert_eq!(world.wire_power(out), Some(15));
        }
    }
    assert_eq!(powered_ticks, vec![2, 3]);
    assert_eq!(world.wire_power(out), Some(0));
}

#[test]
fn observer_ignores_changes_elsewhere() {
    let mut world = GridWorld::new();
    let mut engine = RedstoneEngine::new();
    let obs = at(0, 0, 0);
    place(&mut engine, &mut world, obs, observer(Direction::East)).unwrap();
    place(&mut engine, &mut world, at(0, 1, 0), stone()).unwrap();
    engine.advance(&mut world, 6);
    assert!(!engine.queue().is_scheduled(obs, ActionKind::Toggle));
    assert!(!engine.is_powered(obs));
}

#[test]
fn comparator_subtract_and_compare() {
    let mut world = GridWorld::new();
    let mut engine = RedstoneEngine::new();
    let comp = at(0, 0, 0);
    let container = at(-1, 0, 0);
    world.put(container, stone());
    world.set_analog(container, 15);

    let side_lever = at(0, 0, -4);
    place(&mut engine, &mut world, side_lever, lever(Direction::Down)).unwrap();
    for z in -3..=-1 {
        place(&mut engine, &mut world, at(0, 0, z), wire()).unwrap();
    }
    place(
        &mut engine,
        &mut world,
        comp,
        comparator(Direction::East, ComparatorMode::Subtract),
    )
    .unwrap();
    assert_eq!(engine.gate(comp).map(|g| g.output_level), Some(15));

    engine.set_source(&mut world, side_lever, true).unwrap();
    assert_eq!(world.wire_power(at(0, 0, -1)), Some(13));
    engine.advance(&mut world, 2);
    assert_eq!(engine.gate(comp).map(|g| g.output_level), Some(2));

    place(
        &mut engine,
        &mut world,
        comp,
        comparator(Direction::East, ComparatorMode::Compare),
    )
    .unwrap();
    engine.advance(&mut world, 2);
    assert_eq!(engine.gate(comp).map(|g| g.output_level), Some(15));
}

#[test]
fn comparator_tracks_container_changes() {
    let mut world = GridWorld::new();
    let mut engine = RedstoneEngine::new();
    let comp = at(0, 0, 0);
    let container = at(-1, 0, 0);
    world.put(container, stone());
    place(
        &mut engine,
        &mut world,
        comp,
        comparator(Direction::East, ComparatorMode::Compare),
    )
    .unwrap();
    assert!(!engine.is_powered(comp));

    world.set_analog(container, 7);
    engine.notify(&mut world, container, None);
    engine.advance(&mut world, 2);
    assert_eq!(engine.gate(comp).map(|g| (g.output_on, g.output_level)), Some((true, 7)));
}

#[test]
fn button_pulse_drives_repeater() {
    let mut world = GridWorld::new();
    let mut engine = RedstoneEngine::new();
    let btn = at(0, 0, 0);
    let rep = at(1, 0, 0);
    place(&mut engine, &mut world, btn, button(Direction::Down)).unwrap();
    place(&mut engine, &mut world, rep, repeater(Direction::East, 1)).unwrap();

    engine.press_button(&mut world, btn).unwrap();
    engine.advance(&mut world, 2);
    assert!(engine.is_powered(rep));
    engine.advance(&mut world, 18);
    assert!(!engine.is_powered(btn));
    assert!(engine.is_powered(rep));
    engine.advance(&mut world, 2);
    assert!(!engine.is_powered(rep));
}
