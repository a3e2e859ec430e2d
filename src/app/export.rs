//! Broadcast payloads.
//!
//! Every payload is a borrowed view over the engine and the actuator,
//! serialised straight to JSON bytes.  Field names are camelCase.
//!
//! | Channel   | Payload            | Contents                                   |
//! |-----------|--------------------|--------------------------------------------|
//! | `state`   | [`StatePayload`]   | full run context, runtimes, override, AutoOff |
//! | `metrics` | [`MetricsPayload`] | output numbers + compact state             |
//! | `chart`   | [`ChartPayload`]   | output numbers + run context               |
//! | `summary` | [`SummaryPayload`] | smallest view for constrained links        |

use serde::Serialize;

use crate::autooff::{AutoOffRuntime, DayMarker};
use crate::broadcast::{Channel, ChannelSet};
use crate::control::SegmentRuntime;
use crate::error::{Error, Result};
use crate::wind::WindCommand;

use super::ports::{ConfigStore, WindActuator};
use super::service::ControlEngine;

// ───────────────────────────────────────────────────────────────
// State
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatePayload<'a> {
    pub active: bool,
    pub profile_mode: bool,
    pub state: &'static str,
    pub state_code: u8,
    pub reason: &'static str,
    pub reason_code: u8,
    pub run_source: &'static str,
    pub last_decision_ms: u64,
    pub last_state_change_ms: u64,
    pub event: EventInfo,
    pub time: TimeInfo,
    pub schedule: ItemInfo<'a>,
    pub profile: ItemInfo<'a>,
    pub segment: SegmentInfo,
    #[serde(rename = "override")]
    pub override_info: OverrideInfo<'a>,
    pub auto_off: AutoOffInfo,
    pub dirty: DirtyInfo,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventInfo {
    pub ack_required: bool,
    pub hold_remaining_ms: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeInfo {
    pub valid: bool,
    pub hour: Option<u8>,
    pub minute: Option<u8>,
    /// 0 = Monday.
    pub weekday: Option<u8>,
}

/// Active schedule or profile.  `index` is -1 when none.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemInfo<'a> {
    pub index: i16,
    pub id: Option<u8>,
    pub number: Option<u16>,
    pub name: &'a str,
}

impl ItemInfo<'_> {
    const NONE: Self = Self {
        index: -1,
        id: None,
        number: None,
        name: "",
    };
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentInfo {
    pub id: Option<u8>,
    pub number: Option<u16>,
    pub schedule_runtime: SegmentRuntime,
    pub profile_runtime: SegmentRuntime,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideInfo<'a> {
    pub active: bool,
    pub use_fixed: bool,
    pub remaining_seconds: u32,
    pub fixed_percent: Option<f32>,
    pub preset_code: &'a str,
    pub preset_name: &'a str,
    pub style_code: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoOffInfo {
    pub runtime: AutoOffRuntime,
    pub last_clock_trigger: Option<DayMarker>,
}

#[derive(Debug, Serialize)]
pub struct DirtyInfo {
    pub state: bool,
    pub metrics: bool,
    pub chart: bool,
    pub summary: bool,
}

// ───────────────────────────────────────────────────────────────
// Metrics / chart / summary
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsPayload {
    pub duty_percent: f32,
    pub phase: &'static str,
    pub wind: f32,
    pub target: f32,
    pub state: &'static str,
    pub reason: &'static str,
    pub run_source: &'static str,
    pub override_active: bool,
    pub temperature_c: Option<f32>,
    pub tick_count: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartPayload {
    pub time_ms: u64,
    pub duty_percent: f32,
    pub phase: &'static str,
    pub wind: f32,
    pub target: f32,
    pub state: &'static str,
    pub run_source: &'static str,
    pub schedule_number: Option<u16>,
    pub profile_number: Option<u8>,
    pub segment_number: Option<u16>,
    pub override_active: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryPayload {
    pub phase: &'static str,
    pub wind: f32,
    pub schedule_number: Option<u16>,
    pub profile_number: Option<u8>,
    pub segment_number: Option<u16>,
    pub state: &'static str,
    pub reason: &'static str,
}

// ───────────────────────────────────────────────────────────────
// Builders
// ───────────────────────────────────────────────────────────────

impl ControlEngine {
    /// `pending` is the set of channels still waiting to go out.
    pub fn export_state<'a>(
        &'a self,
        pending: ChannelSet,
        now_ms: u64,
        store: &'a impl ConfigStore,
        hw: &impl WindActuator,
    ) -> StatePayload<'a> {
        let ctx = self.context();
        let time = self.time().usable();

        let schedule = self
            .run_source()
            .schedule_index()
            .and_then(|i| store.schedules().and_then(|s| s.get(i)).map(|s| (i, s)))
            .map_or(ItemInfo::NONE, |(i, s)| ItemInfo {
                index: i as i16,
                id: Some(s.sch_id),
                number: Some(s.sch_no),
                name: &s.name,
            });
        let profile = self
            .run_source()
            .profile_index()
            .and_then(|i| store.profiles().and_then(|p| p.get(i)).map(|p| (i, p)))
            .map_or(ItemInfo::NONE, |(i, p)| ItemInfo {
                index: i as i16,
                id: Some(p.profile_id),
                number: Some(u16::from(p.profile_no)),
                name: &p.name,
            });

        let override_info = match self.active_override() {
            None => OverrideInfo {
                active: false,
                use_fixed: false,
                remaining_seconds: 0,
                fixed_percent: None,
                preset_code: "",
                preset_name: "",
                style_code: "",
            },
            Some(ov) => {
                let remaining_seconds = ov.remaining_secs(now_ms).unwrap_or(0);
                match &ov.command {
                    WindCommand::Fixed(p) => OverrideInfo {
                        active: true,
                        use_fixed: true,
                        remaining_seconds,
                        fixed_percent: Some(*p),
                        preset_code: "",
                        preset_name: "",
                        style_code: "",
                    },
                    WindCommand::Resolved(w) => OverrideInfo {
                        active: true,
                        use_fixed: false,
                        remaining_seconds,
                        fixed_percent: None,
                        preset_code: &w.preset_code,
                        preset_name: store
                            .wind_dict()
                            .map_or("", |d| d.preset_name(&w.preset_code)),
                        style_code: &w.style_code,
                    },
                }
            }
        };

        StatePayload {
            active: hw.is_running(),
            profile_mode: self.profile_mode(),
            state: ctx.state.as_str(),
            state_code: ctx.state.code(),
            reason: ctx.reason.as_str(),
            reason_code: ctx.reason.code(),
            run_source: self.run_source().as_str(),
            last_decision_ms: ctx.last_decision_ms,
            last_state_change_ms: ctx.last_state_change_ms,
            event: EventInfo {
                ack_required: ctx.ack_required,
                hold_remaining_ms: self.hold_remaining_ms(now_ms),
            },
            time: TimeInfo {
                valid: time.is_some(),
                hour: time.map(|t| t.hour),
                minute: time.map(|t| t.minute),
                weekday: time.map(|t| t.weekday.index()),
            },
            schedule,
            profile,
            segment: SegmentInfo {
                id: ctx.active.segment.map(|s| s.seg_id),
                number: ctx.active.segment.map(|s| s.seg_no),
                schedule_runtime: *self.schedule_runtime(),
                profile_runtime: *self.profile_runtime(),
            },
            override_info,
            auto_off: AutoOffInfo {
                runtime: *self.auto_off().runtime(),
                last_clock_trigger: self.auto_off().last_clock_trigger(),
            },
            dirty: DirtyInfo {
                state: pending.contains(Channel::State),
                metrics: pending.contains(Channel::Metrics),
                chart: pending.contains(Channel::Chart),
                summary: pending.contains(Channel::Summary),
            },
        }
    }

    pub fn export_metrics(&self, hw: &impl WindActuator) -> MetricsPayload {
        MetricsPayload {
            duty_percent: hw.duty_percent(),
            phase: hw.phase().as_str(),
            wind: hw.current_wind(),
            target: hw.target_wind(),
            state: self.state().as_str(),
            reason: self.reason().as_str(),
            run_source: self.run_source().as_str(),
            override_active: self.active_override().is_some(),
            temperature_c: self.temperature_c(),
            tick_count: self.tick_count(),
        }
    }

    pub fn export_chart(&self, now_ms: u64, hw: &impl WindActuator) -> ChartPayload {
        let active = &self.context().active;
        ChartPayload {
            time_ms: now_ms,
            duty_percent: hw.duty_percent(),
            phase: hw.phase().as_str(),
            wind: hw.current_wind(),
            target: hw.target_wind(),
            state: self.state().as_str(),
            run_source: self.run_source().as_str(),
            schedule_number: active.schedule.map(|s| s.sch_no),
            profile_number: active.profile_no,
            segment_number: active.segment.map(|s| s.seg_no),
            override_active: self.active_override().is_some(),
        }
    }

    pub fn export_summary(&self, hw: &impl WindActuator) -> SummaryPayload {
        let active = &self.context().active;
        SummaryPayload {
            phase: hw.phase().as_str(),
            wind: hw.current_wind(),
            schedule_number: active.schedule.map(|s| s.sch_no),
            profile_number: active.profile_no,
            segment_number: active.segment.map(|s| s.seg_no),
            state: self.state().as_str(),
            reason: self.reason().as_str(),
        }
    }

    /// Serialise one channel's payload to JSON bytes.
    pub fn render_channel(
        &self,
        channel: Channel,
        pending: ChannelSet,
        now_ms: u64,
        store: &impl ConfigStore,
        hw: &impl WindActuator,
    ) -> Result<Vec<u8>> {
        let bytes = match channel {
            Channel::State => serde_json::to_vec(&self.export_state(pending, now_ms, store, hw)),
            Channel::Metrics => serde_json::to_vec(&self.export_metrics(hw)),
            Channel::Chart => serde_json::to_vec(&self.export_chart(now_ms, hw)),
            Channel::Summary => serde_json::to_vec(&self.export_summary(hw)),
        };
        bytes.map_err(|_| Error::Export(channel.as_str()))
    }
}
