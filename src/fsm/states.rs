//! State descriptor table.

use crate::config::ControlConfig;

use super::RunState;

/// What entering a state arms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HoldPolicy {
    pub hold_ms: u64,
    pub requires_ack: bool,
}

/// Static descriptor for a single run state.
/// Stored in a fixed-size array indexed by `RunState as usize`.
#[derive(Debug, Clone, Copy)]
pub struct StateDescriptor {
    pub id: RunState,
    pub name: &'static str,
    /// Whether output may be running in this state.  Entering a state
    /// without it stops the actuator.
    pub drives_output: bool,
    /// Hold window armed on entry; `None` for ordinary states.
    pub hold: Option<HoldPolicy>,
}

/// Build the table from the current configuration.
pub fn build_state_table(config: &ControlConfig) -> [StateDescriptor; RunState::COUNT] {
    let hold_ms = u64::from(config.event_hold_ms);
    RunState::ALL.map(|id| {
        let (drives_output, hold) = match id {
            RunState::Override | RunState::ProfileRun | RunState::ScheduleRun => (true, None),
            RunState::Idle | RunState::MotionBlocked => (false, None),
            RunState::AutoOffStopped => (
                false,
                Some(HoldPolicy {
                    hold_ms,
                    requires_ack: config.autooff_requires_ack,
                }),
            ),
            RunState::TimeInvalid => (
                false,
                Some(HoldPolicy {
                    hold_ms,
                    requires_ack: false,
                }),
            ),
        };
        StateDescriptor {
            id,
            name: id.as_str(),
            drives_output,
            hold,
        }
    })
}
