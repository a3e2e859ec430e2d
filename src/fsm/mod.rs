//! Run/event state machine.
//!
//! The decision engine picks a `(state, reason)` pair every tick; the
//! [`EventStateController`] is the only code that writes it into the
//! [`RunContext`].  Per-state behaviour lives in a fixed descriptor table:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  StateTable                                                  │
//! │  ┌─────────────────┬────────────────┬───────────────────┐    │
//! │  │ RunState        │ drives_output  │ hold on enter     │    │
//! │  ├─────────────────┼────────────────┼───────────────────┤    │
//! │  │ Idle            │ no             │ –                 │    │
//! │  │ Override        │ yes            │ –                 │    │
//! │  │ ProfileRun      │ yes            │ –                 │    │
//! │  │ ScheduleRun     │ yes            │ –                 │    │
//! │  │ MotionBlocked   │ no             │ –                 │    │
//! │  │ AutoOffStopped  │ no             │ hold + ack        │    │
//! │  │ TimeInvalid     │ no             │ hold              │    │
//! │  └─────────────────┴────────────────┴───────────────────┘    │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! While a holding state's window is open (or its ack is outstanding)
//! the engine skips arbitration entirely.

pub mod context;
pub mod states;

use log::info;
use serde::Serialize;

use crate::autooff::AutoOffTrigger;
use crate::config::ControlConfig;
use context::{ActiveSnapshot, RunContext};
use states::{StateDescriptor, build_state_table};

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Run/event state.  Codes are stable and exported alongside the name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum RunState {
    #[default]
    Idle = 0,
    Override = 1,
    ProfileRun = 2,
    ScheduleRun = 3,
    MotionBlocked = 4,
    AutoOffStopped = 5,
    TimeInvalid = 6,
}

impl RunState {
    /// Total number of states; sizes the table array.
    pub const COUNT: usize = 7;

    pub const ALL: [Self; Self::COUNT] = [
        Self::Idle,
        Self::Override,
        Self::ProfileRun,
        Self::ScheduleRun,
        Self::MotionBlocked,
        Self::AutoOffStopped,
        Self::TimeInvalid,
    ];

    pub const fn code(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Override => "OVERRIDE",
            Self::ProfileRun => "PROFILE_RUN",
            Self::ScheduleRun => "SCHEDULE_RUN",
            Self::MotionBlocked => "MOTION_BLOCKED",
            Self::AutoOffStopped => "AUTOOFF_STOPPED",
            Self::TimeInvalid => "TIME_INVALID",
        }
    }

    /// A schedule or profile sequence is executing.
    pub const fn is_running(self) -> bool {
        matches!(self, Self::ProfileRun | Self::ScheduleRun)
    }
}

/// Why the engine is in its current state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum Reason {
    #[default]
    None = 0,
    OverrideActive = 1,
    ProfileMode = 2,
    UserProfileActive = 3,
    ScheduleActive = 4,
    NoActiveSchedule = 5,
    NoSchedules = 6,
    TimeNotValid = 7,
    MotionNoPresence = 8,
    AutoOffTimer = 9,
    AutoOffTime = 10,
    AutoOffTemp = 11,
}

impl Reason {
    pub const fn code(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::OverrideActive => "OVERRIDE_ACTIVE",
            Self::ProfileMode => "PROFILE_MODE",
            Self::UserProfileActive => "USER_PROFILE_ACTIVE",
            Self::ScheduleActive => "SCHEDULE_ACTIVE",
            Self::NoActiveSchedule => "NO_ACTIVE_SCHEDULE",
            Self::NoSchedules => "NO_SCHEDULES",
            Self::TimeNotValid => "TIME_NOT_VALID",
            Self::MotionNoPresence => "MOTION_NO_PRESENCE",
            Self::AutoOffTimer => "AUTOOFF_TIMER",
            Self::AutoOffTime => "AUTOOFF_TIME",
            Self::AutoOffTemp => "AUTOOFF_TEMP",
        }
    }
}

impl From<AutoOffTrigger> for Reason {
    fn from(t: AutoOffTrigger) -> Self {
        match t {
            AutoOffTrigger::Timer => Self::AutoOffTimer,
            AutoOffTrigger::ClockTime => Self::AutoOffTime,
            AutoOffTrigger::Temperature => Self::AutoOffTemp,
        }
    }
}

/// Which item owns the output.  Override sits on top without replacing it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RunSource {
    #[default]
    None,
    /// Index into the configured schedule list.
    Schedule(usize),
    /// Index into the configured profile list.
    Profile(usize),
}

impl RunSource {
    pub const fn code(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Schedule(_) => 1,
            Self::Profile(_) => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Schedule(_) => "SCHEDULE",
            Self::Profile(_) => "USER_PROFILE",
        }
    }

    pub fn schedule_index(self) -> Option<usize> {
        match self {
            Self::Schedule(i) => Some(i),
            _ => None,
        }
    }

    pub fn profile_index(self) -> Option<usize> {
        match self {
            Self::Profile(i) => Some(i),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Owns the [`RunContext`] and applies state transitions with their
/// hold/ack side effects.
pub struct EventStateController {
    table: [StateDescriptor; RunState::COUNT],
    ctx: RunContext,
}

impl EventStateController {
    pub fn new(config: &ControlConfig) -> Self {
        Self {
            table: build_state_table(config),
            ctx: RunContext::new(0),
        }
    }

    /// Rebuild the descriptor table after a config change.
    pub fn reconfigure(&mut self, config: &ControlConfig) {
        self.table = build_state_table(config);
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    pub fn state(&self) -> RunState {
        self.ctx.state
    }

    pub fn reason(&self) -> Reason {
        self.ctx.reason
    }

    pub fn descriptor(&self, state: RunState) -> &StateDescriptor {
        &self.table[state as usize]
    }

    /// Observers' view of the active item; not part of the state/reason pair.
    pub fn snapshot_mut(&mut self) -> &mut ActiveSnapshot {
        &mut self.ctx.active
    }

    /// Record a decision.  Returns `true` if state or reason changed.
    pub fn transition(&mut self, next: RunState, reason: Reason, now_ms: u64) -> bool {
        self.ctx.last_decision_ms = now_ms;
        let prev = self.ctx.state;
        if next == prev && reason == self.ctx.reason {
            return false;
        }

        if next != prev {
            info!(
                "Control: transition {} -> {}",
                self.table[prev as usize].name, self.table[next as usize].name
            );
            // Leaving a holding state drops whatever is left of its window.
            self.ctx.hold_until_ms = None;
            self.ctx.ack_required = false;

            self.ctx.state = next;
            if let Some(hold) = self.table[next as usize].hold {
                self.ctx.hold_until_ms = Some(now_ms + hold.hold_ms);
                self.ctx.ack_required = hold.requires_ack;
            }
        }

        self.ctx.reason = reason;
        self.ctx.last_state_change_ms = now_ms;
        true
    }

    /// Whether arbitration must be skipped at `now_ms`.
    pub fn is_holding(&self, now_ms: u64) -> bool {
        if self.table[self.ctx.state as usize].hold.is_none() {
            return false;
        }
        self.ctx.ack_required || self.ctx.hold_until_ms.is_some_and(|t| now_ms < t)
    }

    /// Remaining hold window (0 when none).
    pub fn hold_remaining_ms(&self, now_ms: u64) -> u64 {
        self.ctx
            .hold_until_ms
            .map_or(0, |t| t.saturating_sub(now_ms))
    }

    /// Operator acknowledgment.  Only meaningful in `AUTOOFF_STOPPED`;
    /// the next tick decides what happens next.
    pub fn ack(&mut self) -> bool {
        if self.ctx.state != RunState::AutoOffStopped {
            return false;
        }
        self.ctx.ack_required = false;
        self.ctx.hold_until_ms = None;
        info!("Control: AUTOOFF_STOPPED acknowledged");
        true
    }

    /// Back to a fresh Idle context.
    pub fn reset(&mut self, now_ms: u64) {
        info!(
            "Control: context reset from {}",
            self.table[self.ctx.state as usize].name
        );
        self.ctx = RunContext::new(now_ms);
    }
}
