//! Inbound operator commands.
//!
//! These represent actions requested by the outside world (HTTP handlers,
//! WebSocket clients, serial console) that the
//! [`ControlEngine`](super::service::ControlEngine) interprets and acts upon.
//! They usually arrive through the [`CommandInbox`](super::runtime::CommandInbox)
//! and are drained at the start of a tick.

use crate::config::ControlConfig;
use crate::model::{AdjustDelta, Code};
use crate::wind::ResolvedWind;

/// Commands that external adapters can send into the control core.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlCommand {
    /// Hold a fixed duty for `seconds` (0 = until cleared).
    OverrideFixed { percent: f32, seconds: u32 },

    /// Resolve a preset/style pair and run it for `seconds`.
    OverridePreset {
        preset: Code,
        style: Code,
        adjust: AdjustDelta,
        seconds: u32,
    },

    /// Run already-resolved parameters for `seconds`.
    OverrideResolved { wind: ResolvedWind, seconds: u32 },

    /// End the manual override.
    StopOverride,

    /// Switch between schedule arbitration and profile-only operation.
    SetProfileMode(bool),

    /// Start the enabled user profile with this number.
    StartProfile(u8),

    /// Stop the running user profile.
    StopProfile,

    /// Acknowledge an `AUTOOFF_STOPPED` event.
    AckEvent,

    /// Drop every runtime and return to Idle.
    Reload,

    /// Replace the engine configuration (validated first).
    UpdateConfig(ControlConfig),

    /// Persist the current configuration on the next save check.
    SaveConfig,
}
