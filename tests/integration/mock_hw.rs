//! Mock device and configuration fixtures for integration tests.
//!
//! Records every actuator call so tests can assert on the full command
//! history without a real PWM stage or wind simulation.

use windctl::adapters::config_store::MemoryConfigStore;
use windctl::app::ports::{
    BroadcastSink, ClockPort, LocalTime, MotionPort, TemperaturePort, WindActuator, WindPhase,
};
use windctl::broadcast::{BroadcastPolicy, Channel, ChannelSet};
use windctl::error::{Error, Result};
use windctl::model::{
    MAX_PROFILES, MAX_SCHEDULES, ProfileItem, ScheduleItem, SchedulePeriod, Segment, TimeOfDay,
    WeekDays, Weekday, bounded_str,
};
use windctl::wind::{PresetEntry, ResolvedWind, StyleEntry, StyleFactors, WindBase, WindDict};

// ── Actuator call record ──────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum ActuatorCall {
    ApplyWind { preset: String, style: String },
    SetDuty(f32),
    Stop,
}

// ── MockHardware ──────────────────────────────────────────────

pub struct MockHardware {
    pub calls: Vec<ActuatorCall>,
    pub sim_ticks: u32,
    pub running: bool,
    pub duty: f32,
    pub phase: WindPhase,
    pub presence: bool,
    pub time_valid: bool,
    pub local: Option<LocalTime>,
    pub clock_locked: bool,
    pub temperature_c: f32,
    pub probe_pin: Option<u8>,
    pub temp_reads: u32,
    pub actuator_dirty: ChannelSet,
}

#[allow(dead_code)]
impl MockHardware {
    /// Synchronised clock, Monday 08:00, somebody present.
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            sim_ticks: 0,
            running: false,
            duty: 0.0,
            phase: WindPhase::Stopped,
            presence: true,
            time_valid: true,
            local: Some(at(Weekday::Mon, 8, 0, 100)),
            clock_locked: false,
            temperature_c: 22.0,
            probe_pin: None,
            temp_reads: 0,
            actuator_dirty: ChannelSet::EMPTY,
        }
    }

    pub fn set_time(&mut self, weekday: Weekday, hour: u8, minute: u8) {
        let day = self.local.map_or(100, |t| t.day_of_year);
        self.local = Some(at(weekday, hour, minute, day));
    }

    pub fn set_day(&mut self, day_of_year: u16, weekday: Weekday, hour: u8, minute: u8) {
        self.local = Some(at(weekday, hour, minute, day_of_year));
    }

    pub fn last_call(&self) -> Option<&ActuatorCall> {
        self.calls.last()
    }

    pub fn count(&self, call: &ActuatorCall) -> usize {
        self.calls.iter().filter(|c| *c == call).count()
    }

    pub fn applied_presets(&self) -> Vec<String> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                ActuatorCall::ApplyWind { preset, .. } => Some(preset.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }
}

impl Default for MockHardware {
    fn default() -> Self {
        Self::new()
    }
}

impl WindActuator for MockHardware {
    fn apply_resolved_wind(&mut self, wind: &ResolvedWind) {
        self.calls.push(ActuatorCall::ApplyWind {
            preset: wind.preset_code.as_str().to_string(),
            style: wind.style_code.as_str().to_string(),
        });
        self.running = true;
        self.phase = WindPhase::Normal;
        self.duty = wind.min_fan;
    }

    fn stop(&mut self) {
        self.calls.push(ActuatorCall::Stop);
        self.running = false;
        self.phase = WindPhase::Stopped;
        self.duty = 0.0;
    }

    fn tick(&mut self) {
        self.sim_ticks += 1;
    }

    fn set_duty_percent(&mut self, percent: f32) {
        self.calls.push(ActuatorCall::SetDuty(percent));
        self.running = true;
        self.phase = WindPhase::Fixed;
        self.duty = percent;
    }

    fn duty_percent(&self) -> f32 {
        self.duty
    }

    fn phase(&self) -> WindPhase {
        self.phase
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn current_wind(&self) -> f32 {
        self.duty / 10.0
    }

    fn take_dirty(&mut self) -> ChannelSet {
        core::mem::take(&mut self.actuator_dirty)
    }
}

impl MotionPort for MockHardware {
    fn is_active(&mut self) -> bool {
        self.presence
    }
}

impl ClockPort for MockHardware {
    fn is_time_valid(&self) -> Result<bool> {
        if self.clock_locked {
            return Err(Error::LockTimeout("mock clock"));
        }
        Ok(self.time_valid)
    }

    fn local_time(&self) -> Result<Option<LocalTime>> {
        if self.clock_locked {
            return Err(Error::LockTimeout("mock clock"));
        }
        Ok(if self.time_valid { self.local } else { None })
    }
}

impl TemperaturePort for MockHardware {
    fn begin(&mut self, pin: u8) {
        self.probe_pin = Some(pin);
    }

    fn read_celsius(&mut self) -> f32 {
        self.temp_reads += 1;
        self.temperature_c
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct RecordingSink {
    pub sent: Vec<(Channel, Vec<u8>)>,
    pub policies: Vec<BroadcastPolicy>,
    pub cleanups: u32,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn channels(&self) -> Vec<Channel> {
        self.sent.iter().map(|(c, _)| *c).collect()
    }

    pub fn last_json(&self, channel: Channel) -> Option<serde_json::Value> {
        self.sent
            .iter()
            .rev()
            .find(|(c, _)| *c == channel)
            .and_then(|(_, bytes)| serde_json::from_slice(bytes).ok())
    }
}

impl BroadcastSink for RecordingSink {
    fn broadcast(&mut self, channel: Channel, payload: &[u8]) {
        self.sent.push((channel, payload.to_vec()));
    }

    fn cleanup(&mut self) {
        self.cleanups += 1;
    }

    fn apply_policy(&mut self, policy: &BroadcastPolicy) {
        self.policies.push(*policy);
    }
}

// ── Fixtures ──────────────────────────────────────────────────

#[allow(dead_code)]
pub const MIN: u64 = 60_000;

pub fn at(weekday: Weekday, hour: u8, minute: u8, day_of_year: u16) -> LocalTime {
    LocalTime {
        hour,
        minute,
        weekday,
        day_of_year,
    }
}

#[allow(dead_code)]
pub fn hm(hour: u8, minute: u8) -> TimeOfDay {
    TimeOfDay::hm(hour, minute).unwrap()
}

/// Every-day schedule over `[start, end)`.
#[allow(dead_code)]
pub fn schedule(sch_no: u16, start: TimeOfDay, end: TimeOfDay, segments: &[Segment]) -> ScheduleItem {
    let mut item = ScheduleItem::new(
        sch_no as u8,
        sch_no,
        SchedulePeriod {
            days: WeekDays::EVERY_DAY,
            start,
            end,
        },
    );
    item.name = bounded_str(&format!("Schedule {sch_no}"));
    for seg in segments {
        item.segments.push(seg.clone()).unwrap();
    }
    item
}

#[allow(dead_code)]
pub fn profile(profile_no: u8, segments: &[Segment]) -> ProfileItem {
    let mut item = ProfileItem::new(profile_no, profile_no);
    item.name = bounded_str(&format!("Profile {profile_no}"));
    for seg in segments {
        item.segments.push(seg.clone()).unwrap();
    }
    item
}

/// Dictionary with `OCEAN`, `FOREST` presets and a `CALM` style.
pub fn dict() -> WindDict {
    let mut d = WindDict::default();
    for (code, name) in [("OCEAN", "Ocean breeze"), ("FOREST", "Forest air")] {
        d.presets
            .push(PresetEntry {
                code: bounded_str(code),
                name: bounded_str(name),
                base: WindBase::default(),
            })
            .unwrap();
    }
    d.styles
        .push(StyleEntry {
            code: bounded_str("CALM"),
            name: bounded_str("Calm"),
            factors: StyleFactors::default(),
        })
        .unwrap();
    d
}

#[allow(dead_code)]
pub fn store_with(schedules: &[ScheduleItem], profiles: &[ProfileItem]) -> MemoryConfigStore {
    let mut store = MemoryConfigStore::new();
    let mut s: heapless::Vec<ScheduleItem, MAX_SCHEDULES> = heapless::Vec::new();
    for item in schedules {
        s.push(item.clone()).unwrap();
    }
    let mut p: heapless::Vec<ProfileItem, MAX_PROFILES> = heapless::Vec::new();
    for item in profiles {
        p.push(item.clone()).unwrap();
    }
    store.set_schedules(Some(s));
    store.set_profiles(Some(p));
    store.set_wind_dict(Some(dict()));
    store
}
