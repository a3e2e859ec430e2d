//! Integration tests for configuration loading and persistence.

use windctl::adapters::config_store::MemoryConfigStore;
use windctl::adapters::nvs::MemoryNvs;
use windctl::app::commands::ControlCommand;
use windctl::app::ports::{ConfigError, ConfigPort};
use windctl::app::service::ControlEngine;
use windctl::config::ControlConfig;
use windctl::fsm::{Reason, RunState};
use windctl::model::Weekday;

use crate::mock_hw::{ActuatorCall, MockHardware};

const DOCUMENT: &str = r#"{
    "schedules": [
        {
            "sch_id": 1, "sch_no": 1, "name": "Weekday morning",
            "period": { "days": [true,true,true,true,true,false,false],
                        "start": "07:00", "end": "09:00" },
            "segments": [
                { "seg_id": 1, "seg_no": 1, "on_minutes": 20, "off_minutes": 5,
                  "output": { "preset": { "code": "OCEAN", "style": "CALM" } } }
            ]
        },
        {
            "sch_id": 2, "sch_no": 2, "name": "Weekend",
            "period": { "days": [false,false,false,false,false,true,true],
                        "start": "10:00", "end": "12:00" },
            "segments": [
                { "seg_id": 1, "seg_no": 1, "on_minutes": 30, "off_minutes": 0,
                  "output": { "fixed": { "duty_percent": 35.0 } } }
            ]
        }
    ],
    "profiles": [
        { "profile_id": 1, "profile_no": 1, "name": "Sleep",
          "segments": [
              { "seg_id": 1, "seg_no": 1, "on_minutes": 10, "off_minutes": 0,
                "output": { "fixed": { "duty_percent": 15.0 } } }
          ] }
    ],
    "wind_dict": {
        "presets": [ { "code": "OCEAN", "name": "Ocean breeze" } ],
        "styles": [ { "code": "CALM", "name": "Calm",
                      "factors": { "intensity": 0.5, "variability": 0.5, "gust": 0.5, "thermal": 1.0 } } ]
    }
}"#;

fn engine() -> ControlEngine {
    let mut e = ControlEngine::new(ControlConfig::default());
    e.start(0);
    e
}

// ── Configuration document ────────────────────────────────────

#[test]
fn document_drives_weekday_and_weekend_schedules() {
    let store = MemoryConfigStore::from_json(DOCUMENT).unwrap();
    let mut e = engine();
    let mut hw = MockHardware::new();

    hw.set_time(Weekday::Wed, 7, 30);
    e.tick(0, &store, &mut hw);
    assert_eq!(e.state(), RunState::ScheduleRun);
    assert_eq!(
        hw.last_call(),
        Some(&ActuatorCall::ApplyWind {
            preset: "OCEAN".into(),
            style: "CALM".into(),
        })
    );

    hw.set_time(Weekday::Sat, 7, 30);
    e.tick(1000, &store, &mut hw);
    assert_eq!(e.reason(), Reason::NoActiveSchedule);
    assert!(!hw.running);

    hw.set_time(Weekday::Sat, 11, 0);
    e.tick(2000, &store, &mut hw);
    assert_eq!(hw.duty, 35.0);
    assert_eq!(e.context().active.schedule.map(|s| s.sch_no), Some(2));
}

#[test]
fn document_profile_can_be_started() {
    let store = MemoryConfigStore::from_json(DOCUMENT).unwrap();
    let mut e = engine();
    let mut hw = MockHardware::new();

    e.start_user_profile(1, &store, &mut hw, 0).unwrap();
    e.tick(0, &store, &mut hw);

    assert_eq!(e.state(), RunState::ProfileRun);
    assert_eq!(hw.duty, 15.0);
}

// ── Persistence ───────────────────────────────────────────────

#[test]
fn runtime_update_is_saved_after_delay() {
    let nvs = MemoryNvs::new();
    let mut e = engine();
    let cfg = ControlConfig {
        metrics_push_interval_ms: 2000,
        autooff_requires_ack: false,
        ..ControlConfig::default()
    };

    e.update_config(cfg.clone(), 1000).unwrap();
    assert!(e.is_config_dirty());

    assert!(!e.auto_save_if_needed(&nvs, 5999));
    assert!(nvs.raw().is_none());

    assert!(e.auto_save_if_needed(&nvs, 6000));
    assert!(!e.is_config_dirty());
    assert_eq!(nvs.load(), Ok(cfg));
}

#[test]
fn explicit_save_flushes_on_next_check() {
    let nvs = MemoryNvs::new();
    let store = MemoryConfigStore::new();
    let mut hw = MockHardware::new();
    let mut e = engine();

    e.handle_command(ControlCommand::SaveConfig, 20_000, &store, &mut hw)
        .unwrap();

    assert!(e.auto_save_if_needed(&nvs, 20_000));
    assert_eq!(nvs.load(), Ok(ControlConfig::default()));
}

#[test]
fn force_save_before_restart() {
    let nvs = MemoryNvs::new();
    let mut e = engine();
    e.mark_config_dirty(0);

    e.force_save_if_dirty(&nvs);

    assert!(!e.is_config_dirty());
    assert!(nvs.raw().is_some());
}

#[test]
fn rejected_update_keeps_running_config() {
    let mut e = engine();
    let store = MemoryConfigStore::new();
    let mut hw = MockHardware::new();
    let bad = ControlConfig {
        temperature_sample_interval_ms: 500,
        ..ControlConfig::default()
    };

    assert!(
        e.handle_command(ControlCommand::UpdateConfig(bad), 0, &store, &mut hw)
            .is_err()
    );
    assert_eq!(e.config(), &ControlConfig::default());
    assert!(!e.is_config_dirty());
}

#[test]
fn corrupted_blob_is_reported_and_defaults_survive() {
    let nvs = MemoryNvs::new();
    nvs.put_raw(vec![0xFF, 0xFF, 0xFF]);

    assert_eq!(nvs.load(), Err(ConfigError::Corrupted));

    let cfg = nvs.load().unwrap_or_default();
    assert!(cfg.validate().is_ok());
}
