//! Port traits: the hexagonal boundary between the control core and its collaborators.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ ControlEngine (domain)
//! ```
//!
//! Driven adapters (config store, wind simulation, motion, clock,
//! temperature probe, broadcast transport) implement these traits.  The
//! [`ControlEngine`](super::service::ControlEngine) consumes them via
//! generics, so the domain core never touches hardware or files directly.
//!
//! ## Contracts
//!
//! - Every read here is **non-blocking**.  Anything slow is cached by the
//!   adapter and served from the cache.
//! - The clock must answer "not valid" rather than a default time when it
//!   has not been synchronised.
//! - **ConfigPort** implementations MUST validate before persisting.

use serde::{Deserialize, Serialize};

use crate::broadcast::{BroadcastPolicy, Channel, ChannelSet};
use crate::config::ControlConfig;
use crate::error::{ResolveError, Result};
use crate::model::{AdjustDelta, ProfileItem, ScheduleItem, Weekday};
use crate::wind::{ResolvedWind, WindDict};

// ───────────────────────────────────────────────────────────────
// Config store (read-only configuration)
// ───────────────────────────────────────────────────────────────

/// Read access to the loaded configuration.
///
/// `None` means the section is absent (not loaded, or failed to load).
pub trait ConfigStore {
    fn schedules(&self) -> Option<&[ScheduleItem]>;

    fn profiles(&self) -> Option<&[ProfileItem]>;

    fn wind_dict(&self) -> Option<&WindDict>;

    /// Live broadcast policy from the system section, if any.
    fn broadcast_policy(&self) -> Option<BroadcastPolicy> {
        None
    }

    /// Pure resolver over the wind dictionary.
    fn resolve_wind(
        &self,
        preset: &str,
        style: &str,
        adjust: &AdjustDelta,
    ) -> core::result::Result<ResolvedWind, ResolveError> {
        self.wind_dict()
            .ok_or(ResolveError::NoDictionary)?
            .resolve(preset, style, adjust)
    }
}

// ───────────────────────────────────────────────────────────────
// Wind actuator (simulation + PWM)
// ───────────────────────────────────────────────────────────────

/// Phase the simulation reports for observers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindPhase {
    #[default]
    Stopped,
    Normal,
    Gust,
    Thermal,
    Fixed,
}

impl WindPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "STOPPED",
            Self::Normal => "NORMAL",
            Self::Gust => "GUST",
            Self::Thermal => "THERMAL",
            Self::Fixed => "FIXED",
        }
    }
}

/// The wind simulation and the PWM stage behind it.
///
/// The core performs no physics: it hands over resolved parameters or a
/// clamped duty and calls [`tick`](Self::tick) while output is running.
pub trait WindActuator {
    /// Start (or retarget) the simulation with these parameters.
    fn apply_resolved_wind(&mut self, wind: &ResolvedWind);

    /// Stop the simulation and bring the fan to rest.
    fn stop(&mut self);

    /// Advance the simulation by one step.
    fn tick(&mut self);

    /// Drive the fan at a fixed duty (0–100), bypassing the simulation.
    fn set_duty_percent(&mut self, percent: f32);

    fn duty_percent(&self) -> f32;

    fn phase(&self) -> WindPhase;

    /// Whether the simulation or a fixed duty is currently driving the fan.
    fn is_running(&self) -> bool;

    /// Current simulated wind speed (m/s).
    fn current_wind(&self) -> f32 {
        0.0
    }

    /// Wind speed the simulation is steering towards (m/s).
    fn target_wind(&self) -> f32 {
        0.0
    }

    /// Channels the simulation itself wants republished (consume-once).
    fn take_dirty(&mut self) -> ChannelSet {
        ChannelSet::EMPTY
    }
}

// ───────────────────────────────────────────────────────────────
// Motion, clock, temperature
// ───────────────────────────────────────────────────────────────

/// Debounced PIR/BLE presence.
pub trait MotionPort {
    fn is_active(&mut self) -> bool;
}

/// Local wall-clock reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalTime {
    pub hour: u8,
    pub minute: u8,
    pub weekday: Weekday,
    /// 0-based day of year, used for once-per-day markers.
    pub day_of_year: u16,
}

impl LocalTime {
    pub fn minute_of_day(&self) -> u16 {
        u16::from(self.hour) * 60 + u16::from(self.minute)
    }
}

/// Time-synchronisation status.
///
/// Both calls may fail with [`Error::LockTimeout`](crate::error::Error::LockTimeout)
/// when the value is being written from another context; callers skip and
/// retry on the next tick.
pub trait ClockPort {
    fn is_time_valid(&self) -> Result<bool>;

    /// `Ok(None)` when the clock is not synchronised.
    fn local_time(&self) -> Result<Option<LocalTime>>;
}

/// Raw temperature probe.
pub trait TemperaturePort {
    /// (Re)initialise the probe on `pin`.
    fn begin(&mut self, pin: u8);

    /// One reading in °C; NaN on fault.
    fn read_celsius(&mut self) -> f32;
}

/// Everything the engine needs from the device during a tick.
pub trait DevicePorts: WindActuator + MotionPort + ClockPort + TemperaturePort {}

impl<T: WindActuator + MotionPort + ClockPort + TemperaturePort> DevicePorts for T {}

// ───────────────────────────────────────────────────────────────
// Broadcast sink (domain → WebSocket transport)
// ───────────────────────────────────────────────────────────────

/// Outbound transport for channel payloads.
pub trait BroadcastSink {
    /// Send a serialised payload to every subscriber of `channel`.
    fn broadcast(&mut self, channel: Channel, payload: &[u8]);

    /// Drop dead connections.
    fn cleanup(&mut self);

    /// Push per-channel intervals to the transport's own throttling.
    fn apply_policy(&mut self, policy: &BroadcastPolicy);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (domain ↔ persistent control config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists the engine's [`ControlConfig`].
///
/// Implementations MUST run [`ControlConfig::validate`] before persisting
/// and reject invalid values with [`ConfigError::ValidationFailed`].
pub trait ConfigPort {
    /// Returns [`ControlConfig::default()`] if nothing is stored.
    fn load(&self) -> core::result::Result<ControlConfig, ConfigError>;

    fn save(&self, config: &ControlConfig) -> core::result::Result<(), ConfigError>;
}

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored blob failed to decode.
    Corrupted,
    /// A field failed range validation.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
