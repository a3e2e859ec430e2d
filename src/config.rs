//! Control core configuration
//!
//! All tunable parameters of the decision engine and the broadcast
//! scheduler.  Persisted through [`ConfigPort`](crate::app::ports::ConfigPort)
//! and replaceable at runtime with `ControlCommand::UpdateConfig`.

use serde::{Deserialize, Serialize};

use crate::broadcast::BroadcastPolicy;
use crate::error::{Error, Result};
use crate::schedule::OverlapPolicy;

/// Temperature probe wiring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemperatureConfig {
    pub enabled: bool,
    /// GPIO the probe is attached to.
    pub pin: u8,
}

impl Default for TemperatureConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            pin: 4,
        }
    }
}

/// Core engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    // --- Tick ---
    /// Ticks arriving closer together than this are ignored (ms)
    pub min_tick_interval_ms: u32,
    /// Metrics re-publication period, also while an event state holds (ms)
    pub metrics_push_interval_ms: u32,

    // --- Event states ---
    /// Hold window after entering AUTOOFF_STOPPED or TIME_INVALID (ms)
    pub event_hold_ms: u32,
    /// Whether AUTOOFF_STOPPED waits for an operator acknowledgment
    pub autooff_requires_ack: bool,

    // --- Scheduling ---
    /// How overlapping schedule windows are resolved
    pub overlap_policy: OverlapPolicy,

    // --- Temperature ---
    pub temperature: TemperatureConfig,
    /// Minimum spacing between probe reads (ms, at least 2000)
    pub temperature_sample_interval_ms: u32,

    // --- Broadcast ---
    /// Defaults the live system policy is overlaid on
    pub broadcast: BroadcastPolicy,
    /// How often the live policy is re-read (ms)
    pub policy_refresh_ms: u32,

    // --- Persistence ---
    /// Delay between a runtime config change and its auto-save (ms)
    pub autosave_delay_ms: u32,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            min_tick_interval_ms: 40,
            metrics_push_interval_ms: 1500,

            event_hold_ms: 3000,
            autooff_requires_ack: true,

            overlap_policy: OverlapPolicy::HighestNumberWins,

            temperature: TemperatureConfig::default(),
            temperature_sample_interval_ms: 2000,

            broadcast: BroadcastPolicy::default(),
            policy_refresh_ms: 3000,

            autosave_delay_ms: 5000,
        }
    }
}

impl ControlConfig {
    /// Range-check every field.  Out-of-range values are rejected, never clamped.
    pub fn validate(&self) -> Result<()> {
        if !(1..=1000).contains(&self.min_tick_interval_ms) {
            return Err(Error::Config("min_tick_interval_ms out of range (1-1000)"));
        }
        if !(100..=60_000).contains(&self.metrics_push_interval_ms) {
            return Err(Error::Config(
                "metrics_push_interval_ms out of range (100-60000)",
            ));
        }
        if self.event_hold_ms > 60_000 {
            return Err(Error::Config("event_hold_ms out of range (0-60000)"));
        }
        if !(2000..=600_000).contains(&self.temperature_sample_interval_ms) {
            return Err(Error::Config(
                "temperature_sample_interval_ms out of range (2000-600000)",
            ));
        }
        if !(500..=60_000).contains(&self.policy_refresh_ms) {
            return Err(Error::Config("policy_refresh_ms out of range (500-60000)"));
        }
        if self.autosave_delay_ms > 600_000 {
            return Err(Error::Config("autosave_delay_ms out of range (0-600000)"));
        }
        if self.broadcast.chart_throttle_mul > 16 {
            return Err(Error::Config("chart_throttle_mul out of range (0-16)"));
        }
        Ok(())
    }
}
