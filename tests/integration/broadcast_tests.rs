//! Integration tests for the control loop's publication path.

use windctl::app::commands::ControlCommand;
use windctl::app::runtime::{CommandInbox, ControlLoop};
use windctl::broadcast::{BroadcastPolicy, Channel, ChannelPolicy};
use windctl::config::ControlConfig;
use windctl::model::Segment;

use crate::mock_hw::{MockHardware, RecordingSink, hm, schedule, store_with};

fn bound_loop(store: &windctl::adapters::config_store::MemoryConfigStore) -> ControlLoop<RecordingSink> {
    let mut lp = ControlLoop::new(ControlConfig::default());
    lp.begin(0, store);
    lp.bind(RecordingSink::default());
    lp
}

fn sink(lp: &ControlLoop<RecordingSink>) -> &RecordingSink {
    lp.broadcast().sink().unwrap()
}

#[test]
fn channels_go_out_one_per_tick_in_priority_order() {
    let inbox = CommandInbox::new();
    let mut hw = MockHardware::new();
    let store = store_with(
        &[schedule(1, hm(7, 0), hm(10, 0), &[Segment::fixed(1, 30, 0, 40.0)])],
        &[],
    );
    let mut lp = bound_loop(&store);

    assert_eq!(lp.run_once(0, &inbox, &store, &mut hw), Some(Channel::State));
    assert_eq!(lp.run_once(100, &inbox, &store, &mut hw), Some(Channel::Metrics));
    assert_eq!(lp.run_once(200, &inbox, &store, &mut hw), Some(Channel::Chart));
    assert_eq!(lp.run_once(300, &inbox, &store, &mut hw), Some(Channel::Summary));
    assert_eq!(lp.run_once(400, &inbox, &store, &mut hw), None);

    let state = sink(&lp).last_json(Channel::State).unwrap();
    assert_eq!(state["state"], "SCHEDULE_RUN");
    assert_eq!(state["stateCode"], 3);
    assert_eq!(state["reason"], "SCHEDULE_ACTIVE");
    assert_eq!(state["runSource"], "SCHEDULE");
    assert_eq!(state["schedule"]["number"], 1);
    assert_eq!(state["segment"]["number"], 1);
    assert_eq!(state["profile"]["index"], -1);
    assert_eq!(state["time"]["hour"], 8);

    let metrics = sink(&lp).last_json(Channel::Metrics).unwrap();
    assert_eq!(metrics["dutyPercent"], 40.0);
}

#[test]
fn state_payload_reports_channels_still_waiting() {
    let inbox = CommandInbox::new();
    let mut hw = MockHardware::new();
    let store = store_with(
        &[schedule(1, hm(7, 0), hm(10, 0), &[Segment::fixed(1, 30, 0, 40.0)])],
        &[],
    );
    let mut lp = bound_loop(&store);

    assert_eq!(lp.run_once(0, &inbox, &store, &mut hw), Some(Channel::State));
    let state = sink(&lp).last_json(Channel::State).unwrap();
    assert_eq!(state["dirty"]["state"], false);
    assert_eq!(state["dirty"]["metrics"], true);
    assert_eq!(state["dirty"]["chart"], true);
    assert_eq!(state["dirty"]["summary"], true);
    assert_eq!(lp.broadcast().pending().bits(), 0b1110);
}

#[test]
fn state_change_waits_for_channel_interval() {
    let inbox = CommandInbox::new();
    let mut hw = MockHardware::new();
    let store = store_with(&[], &[]);
    let mut lp = bound_loop(&store);

    lp.run_once(0, &inbox, &store, &mut hw);
    inbox
        .post(ControlCommand::OverrideFixed {
            percent: 70.0,
            seconds: 30,
        })
        .unwrap();

    // State is pending from 100 on but its 800 ms interval holds it back.
    assert_eq!(lp.run_once(100, &inbox, &store, &mut hw), Some(Channel::Metrics));
    assert_eq!(lp.run_once(200, &inbox, &store, &mut hw), Some(Channel::Chart));
    assert_eq!(lp.run_once(300, &inbox, &store, &mut hw), Some(Channel::Summary));
    assert_eq!(lp.run_once(400, &inbox, &store, &mut hw), None);
    assert!(lp.broadcast().pending().contains(Channel::State));

    assert_eq!(lp.run_once(800, &inbox, &store, &mut hw), Some(Channel::State));
    let state = sink(&lp).last_json(Channel::State).unwrap();
    assert_eq!(state["state"], "OVERRIDE");
    assert_eq!(state["override"]["active"], true);
    assert_eq!(state["override"]["useFixed"], true);
    assert_eq!(state["override"]["remainingSeconds"], 30);
    assert_eq!(state["override"]["fixedPercent"], 70.0);
}

#[test]
fn unbound_loop_only_accumulates() {
    let inbox = CommandInbox::new();
    let mut hw = MockHardware::new();
    let store = store_with(&[], &[]);
    let mut lp: ControlLoop<RecordingSink> = ControlLoop::new(ControlConfig::default());
    lp.begin(0, &store);

    assert_eq!(lp.run_once(0, &inbox, &store, &mut hw), None);
    assert_eq!(lp.run_once(100, &inbox, &store, &mut hw), None);
    assert!(!lp.broadcast().pending().is_empty());

    lp.bind(RecordingSink::default());
    assert_eq!(lp.run_once(200, &inbox, &store, &mut hw), Some(Channel::State));
}

#[test]
fn live_policy_is_loaded_and_pushed_on_bind() {
    let mut store = store_with(&[], &[]);
    let live = BroadcastPolicy {
        state: ChannelPolicy {
            interval_ms: 200,
            priority: 3,
        },
        summary: ChannelPolicy {
            interval_ms: 1500,
            priority: 0,
        },
        ..BroadcastPolicy::default()
    };
    store.set_broadcast_policy(Some(live));

    let inbox = CommandInbox::new();
    let mut hw = MockHardware::new();
    let mut lp = bound_loop(&store);

    let pushed = sink(&lp).policies.clone();
    assert_eq!(pushed.len(), 1);
    assert_eq!(pushed[0].state.interval_ms, 200);

    // Summary now outranks state.
    assert_eq!(lp.run_once(0, &inbox, &store, &mut hw), Some(Channel::Summary));
}

#[test]
fn cleanup_runs_on_its_own_interval() {
    let inbox = CommandInbox::new();
    let mut hw = MockHardware::new();
    let store = store_with(&[], &[]);
    let mut lp = bound_loop(&store);

    for t in 0..=20u64 {
        lp.run_once(t * 1000, &inbox, &store, &mut hw);
    }

    assert_eq!(sink(&lp).cleanups, 2);
}
