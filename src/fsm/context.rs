//! Run context: the single source of truth every exporter reads.
//!
//! Only [`EventStateController`](super::EventStateController) writes
//! `state`/`reason`; other code may only refresh the active-item snapshot.

use serde::Serialize;

use super::{Reason, RunState};

/// Identity of the active schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRef {
    pub sch_id: u8,
    pub sch_no: u16,
}

/// Identity of the segment currently in its On phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentRef {
    pub seg_id: u8,
    pub seg_no: u16,
}

/// What is running, as seen by observers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSnapshot {
    pub schedule: Option<ScheduleRef>,
    pub profile_no: Option<u8>,
    /// Cleared during Off phases; schedule/profile stay set.
    pub segment: Option<SegmentRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunContext {
    pub state: RunState,
    pub reason: Reason,
    pub last_decision_ms: u64,
    pub last_state_change_ms: u64,
    /// End of the current hold window.
    pub hold_until_ms: Option<u64>,
    pub ack_required: bool,
    pub active: ActiveSnapshot,
}

impl RunContext {
    pub fn new(now_ms: u64) -> Self {
        Self {
            state: RunState::Idle,
            reason: Reason::None,
            last_decision_ms: now_ms,
            last_state_change_ms: now_ms,
            hold_until_ms: None,
            ack_required: false,
            active: ActiveSnapshot::default(),
        }
    }
}
