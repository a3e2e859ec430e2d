//! Integration tests for run-source arbitration and segment execution.

use windctl::app::ports::WindPhase;
use windctl::app::service::ControlEngine;
use windctl::config::ControlConfig;
use windctl::control::Phase;
use windctl::fsm::{Reason, RunSource, RunState};
use windctl::model::{Segment, SchedulePeriod, WeekDays, Weekday};
use windctl::schedule::OverlapPolicy;

use crate::mock_hw::{ActuatorCall, MIN, MockHardware, hm, schedule, store_with};

fn engine() -> ControlEngine {
    let mut e = ControlEngine::new(ControlConfig::default());
    e.start(0);
    e
}

fn morning_fixed() -> windctl::model::ScheduleItem {
    schedule(1, hm(7, 0), hm(10, 0), &[Segment::fixed(1, 1, 1, 40.0)])
}

// ── Arbitration ───────────────────────────────────────────────

#[test]
fn absent_schedules_means_no_schedules() {
    let mut e = engine();
    let mut hw = MockHardware::new();
    let store = windctl::adapters::config_store::MemoryConfigStore::new();

    e.tick(0, &store, &mut hw);

    assert_eq!(e.state(), RunState::Idle);
    assert_eq!(e.reason(), Reason::NoSchedules);
    assert!(!hw.running);
}

#[test]
fn empty_schedule_list_means_no_schedules() {
    let mut e = engine();
    let mut hw = MockHardware::new();
    let store = store_with(&[], &[]);

    e.tick(0, &store, &mut hw);

    assert_eq!(e.reason(), Reason::NoSchedules);
}

#[test]
fn active_schedule_runs_first_segment() {
    let mut e = engine();
    let mut hw = MockHardware::new();
    let store = store_with(&[morning_fixed()], &[]);

    e.tick(0, &store, &mut hw);

    assert_eq!(e.state(), RunState::ScheduleRun);
    assert_eq!(e.reason(), Reason::ScheduleActive);
    assert_eq!(e.run_source(), RunSource::Schedule(0));
    assert_eq!(hw.last_call(), Some(&ActuatorCall::SetDuty(40.0)));
    assert_eq!(hw.phase, WindPhase::Fixed);

    let snap = e.context().active;
    assert_eq!(snap.schedule.map(|s| s.sch_no), Some(1));
    assert_eq!(snap.segment.map(|s| s.seg_no), Some(1));
    assert_eq!(snap.profile_no, None);
}

#[test]
fn outside_window_is_no_active_schedule() {
    let mut e = engine();
    let mut hw = MockHardware::new();
    hw.set_time(Weekday::Mon, 11, 0);
    let store = store_with(&[morning_fixed()], &[]);

    e.tick(0, &store, &mut hw);

    assert_eq!(e.state(), RunState::Idle);
    assert_eq!(e.reason(), Reason::NoActiveSchedule);
    assert_eq!(e.run_source(), RunSource::None);
}

#[test]
fn window_end_stops_output() {
    let mut e = engine();
    let mut hw = MockHardware::new();
    hw.set_time(Weekday::Mon, 9, 59);
    let store = store_with(&[morning_fixed()], &[]);

    e.tick(0, &store, &mut hw);
    assert!(hw.running);

    hw.set_time(Weekday::Mon, 10, 0);
    e.tick(1000, &store, &mut hw);

    assert_eq!(e.reason(), Reason::NoActiveSchedule);
    assert!(!hw.running);
    assert_eq!(e.context().active, Default::default());
    assert_eq!(e.schedule_runtime().cursor(), -1);
}

#[test]
fn highest_schedule_number_wins_overlap() {
    let mut e = engine();
    let mut hw = MockHardware::new();
    let low = schedule(2, hm(6, 0), hm(12, 0), &[Segment::fixed(1, 5, 0, 20.0)]);
    let high = schedule(9, hm(7, 30), hm(9, 0), &[Segment::fixed(1, 5, 0, 70.0)]);
    let store = store_with(&[high, low], &[]);

    e.tick(0, &store, &mut hw);

    assert_eq!(e.run_source(), RunSource::Schedule(0));
    assert_eq!(hw.duty, 70.0);
}

#[test]
fn first_match_policy_takes_list_order() {
    let cfg = ControlConfig {
        overlap_policy: OverlapPolicy::FirstMatch,
        ..ControlConfig::default()
    };
    let mut e = ControlEngine::new(cfg);
    let mut hw = MockHardware::new();
    let low = schedule(2, hm(6, 0), hm(12, 0), &[Segment::fixed(1, 5, 0, 20.0)]);
    let high = schedule(9, hm(7, 30), hm(9, 0), &[Segment::fixed(1, 5, 0, 70.0)]);
    let store = store_with(&[low, high], &[]);

    e.tick(0, &store, &mut hw);

    assert_eq!(hw.duty, 20.0);
}

#[test]
fn cross_midnight_uses_previous_day_bit() {
    let mut e = engine();
    let mut hw = MockHardware::new();
    let mut night = schedule(1, hm(22, 0), hm(2, 0), &[Segment::fixed(1, 5, 0, 30.0)]);
    night.period = SchedulePeriod {
        days: WeekDays::NONE.with(Weekday::Mon),
        start: hm(22, 0),
        end: hm(2, 0),
    };
    let store = store_with(&[night], &[]);

    hw.set_time(Weekday::Tue, 1, 0);
    e.tick(0, &store, &mut hw);
    assert_eq!(e.state(), RunState::ScheduleRun);

    hw.set_time(Weekday::Wed, 1, 0);
    e.tick(1000, &store, &mut hw);
    assert_eq!(e.reason(), Reason::NoActiveSchedule);
}

#[test]
fn disabled_schedule_is_ignored() {
    let mut e = engine();
    let mut hw = MockHardware::new();
    let mut item = morning_fixed();
    item.enabled = false;
    let store = store_with(&[item], &[]);

    e.tick(0, &store, &mut hw);

    assert_eq!(e.reason(), Reason::NoActiveSchedule);
}

// ── Time validity ─────────────────────────────────────────────

#[test]
fn invalid_time_holds_then_recovers() {
    let mut e = engine();
    let mut hw = MockHardware::new();
    hw.time_valid = false;
    let store = store_with(&[morning_fixed()], &[]);

    e.tick(0, &store, &mut hw);
    assert_eq!(e.state(), RunState::TimeInvalid);
    assert_eq!(e.reason(), Reason::TimeNotValid);
    assert!(!e.context().ack_required);

    // Time comes back inside the hold window: still held.
    hw.time_valid = true;
    e.tick(1000, &store, &mut hw);
    assert_eq!(e.state(), RunState::TimeInvalid);

    e.tick(3000, &store, &mut hw);
    assert_eq!(e.state(), RunState::ScheduleRun);
    assert_eq!(e.context().hold_until_ms, None);
}

#[test]
fn losing_time_stops_running_schedule() {
    let mut e = engine();
    let mut hw = MockHardware::new();
    let store = store_with(&[morning_fixed()], &[]);

    e.tick(0, &store, &mut hw);
    assert!(hw.running);

    hw.time_valid = false;
    e.tick(1000, &store, &mut hw);

    assert_eq!(e.state(), RunState::TimeInvalid);
    assert!(!hw.running);
    assert_eq!(e.run_source(), RunSource::None);
    // The last schedule stays on show next to the reason it stopped.
    assert_eq!(e.context().active.schedule.map(|s| s.sch_no), Some(1));
    assert_eq!(e.context().active.segment, None);
}

#[test]
fn contended_clock_keeps_cached_time() {
    let mut e = engine();
    let mut hw = MockHardware::new();
    let store = store_with(&[morning_fixed()], &[]);

    e.tick(0, &store, &mut hw);
    assert_eq!(e.state(), RunState::ScheduleRun);

    hw.clock_locked = true;
    hw.time_valid = false;
    e.tick(1000, &store, &mut hw);
    assert_eq!(e.state(), RunState::ScheduleRun);

    hw.clock_locked = false;
    e.tick(2000, &store, &mut hw);
    assert_eq!(e.state(), RunState::TimeInvalid);
}

// ── Tick cadence ──────────────────────────────────────────────

#[test]
fn ticks_closer_than_minimum_are_ignored() {
    let mut e = engine();
    let mut hw = MockHardware::new();
    let store = store_with(&[morning_fixed()], &[]);

    e.tick(1000, &store, &mut hw);
    e.tick(1020, &store, &mut hw);
    e.tick(1039, &store, &mut hw);
    assert_eq!(e.tick_count(), 1);

    e.tick(1040, &store, &mut hw);
    assert_eq!(e.tick_count(), 2);
}

// ── Segment sequencing ────────────────────────────────────────

#[test]
fn segments_alternate_on_and_off() {
    let mut e = engine();
    let mut hw = MockHardware::new();
    let item = schedule(
        1,
        hm(7, 0),
        hm(10, 0),
        &[Segment::fixed(1, 1, 1, 40.0), Segment::fixed(2, 1, 1, 60.0)],
    );
    let store = store_with(&[item], &[]);

    e.tick(0, &store, &mut hw);
    assert_eq!(hw.duty, 40.0);

    e.tick(MIN, &store, &mut hw);
    assert!(!hw.running);
    assert_eq!(e.schedule_runtime().phase(), Phase::Off);
    assert_eq!(e.context().active.segment, None);
    assert_eq!(e.state(), RunState::ScheduleRun);

    e.tick(2 * MIN, &store, &mut hw);
    assert_eq!(hw.duty, 60.0);
    assert_eq!(e.context().active.segment.map(|s| s.seg_no), Some(2));

    e.tick(3 * MIN, &store, &mut hw);
    assert!(!hw.running);

    e.tick(4 * MIN, &store, &mut hw);
    assert_eq!(hw.duty, 40.0);
    assert_eq!(e.schedule_runtime().loop_count(), 1);
}

#[test]
fn preset_segment_resolves_through_dictionary() {
    let mut e = engine();
    let mut hw = MockHardware::new();
    let item = schedule(
        1,
        hm(7, 0),
        hm(10, 0),
        &[Segment::preset(1, 10, 0, "ocean", "CALM")],
    );
    let store = store_with(&[item], &[]);

    e.tick(0, &store, &mut hw);

    assert_eq!(hw.applied_presets(), vec!["OCEAN".to_string()]);
    assert!(hw.sim_ticks > 0);
}

#[test]
fn unknown_preset_leaves_output_unchanged() {
    let mut e = engine();
    let mut hw = MockHardware::new();
    let item = schedule(
        1,
        hm(7, 0),
        hm(10, 0),
        &[Segment::preset(1, 10, 0, "DESERT", "")],
    );
    let store = store_with(&[item], &[]);

    e.tick(0, &store, &mut hw);

    assert_eq!(e.state(), RunState::ScheduleRun);
    assert!(hw.applied_presets().is_empty());
    assert!(!hw.running);
}

#[test]
fn completed_sequence_stays_stopped() {
    let mut e = engine();
    let mut hw = MockHardware::new();
    let mut item = schedule(1, hm(7, 0), hm(10, 0), &[Segment::fixed(1, 1, 0, 50.0)]);
    item.repeat = false;
    let store = store_with(&[item], &[]);

    e.tick(0, &store, &mut hw);
    assert!(hw.running);
    e.tick(MIN, &store, &mut hw);
    assert!(!hw.running);
    assert!(e.schedule_runtime().is_completed());

    e.tick(5 * MIN, &store, &mut hw);
    assert!(!hw.running);
    assert_eq!(e.state(), RunState::ScheduleRun);
}

// ── Motion gating ─────────────────────────────────────────────

#[test]
fn no_presence_blocks_and_resume_reapplies_segment() {
    let mut e = engine();
    let mut hw = MockHardware::new();
    let mut item = morning_fixed();
    item.motion.pir_enabled = true;
    let store = store_with(&[item], &[]);

    hw.presence = false;
    e.tick(0, &store, &mut hw);
    assert_eq!(e.state(), RunState::MotionBlocked);
    assert_eq!(e.reason(), Reason::MotionNoPresence);
    assert_eq!(e.run_source(), RunSource::Schedule(0));
    assert!(!hw.running);

    hw.presence = true;
    e.tick(1000, &store, &mut hw);
    assert_eq!(e.state(), RunState::ScheduleRun);
    assert_eq!(hw.duty, 40.0);

    hw.presence = false;
    e.tick(2000, &store, &mut hw);
    assert_eq!(e.state(), RunState::MotionBlocked);
    assert!(!hw.running);

    hw.clear_calls();
    hw.presence = true;
    e.tick(3000, &store, &mut hw);
    assert_eq!(e.state(), RunState::ScheduleRun);
    assert_eq!(hw.count(&ActuatorCall::SetDuty(40.0)), 1);
    // Source was kept, so the cursor did not restart.
    assert_eq!(e.schedule_runtime().index(), Some(0));
}

#[test]
fn gating_off_ignores_presence() {
    let mut e = engine();
    let mut hw = MockHardware::new();
    hw.presence = false;
    let store = store_with(&[morning_fixed()], &[]);

    e.tick(0, &store, &mut hw);

    assert_eq!(e.state(), RunState::ScheduleRun);
}

// ── Dirty flags ───────────────────────────────────────────────

#[test]
fn actuator_dirty_bits_are_merged() {
    use windctl::broadcast::{Channel, ChannelSet};

    let mut e = engine();
    let mut hw = MockHardware::new();
    let store = store_with(&[morning_fixed()], &[]);
    e.tick(0, &store, &mut hw);
    e.take_dirty();

    hw.actuator_dirty = ChannelSet::of(Channel::Chart);
    e.tick(1000, &store, &mut hw);

    assert!(e.take_dirty().contains(Channel::Chart));
    assert!(hw.actuator_dirty.is_empty());
}

#[test]
fn state_change_marks_status_channels() {
    use windctl::broadcast::Channel;

    let mut e = engine();
    let mut hw = MockHardware::new();
    let store = store_with(&[morning_fixed()], &[]);
    e.take_dirty();

    e.tick(0, &store, &mut hw);
    let dirty = e.take_dirty();
    assert!(dirty.contains(Channel::State));
    assert!(dirty.contains(Channel::Summary));

    // Nothing changes between these ticks.
    e.tick(100, &store, &mut hw);
    assert!(!e.take_dirty().contains(Channel::State));
}
