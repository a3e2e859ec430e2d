//! Unified error types for the wind control core.
//!
//! A single `Error` enum that every subsystem converts into, so the tick
//! loop can log and resolve every failure the same way.  All variants are
//! `Copy` so they pass through the engine without allocation.
//!
//! None of these ever escape [`ControlEngine::tick`](crate::app::service::ControlEngine::tick):
//! each one is resolved where it occurs and surfaces only as a
//! state/reason pair plus a log line.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the control core funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A configuration section (schedules, profiles, wind dictionary) is absent.
    ConfigMissing(&'static str),
    /// Wall-clock time is not synchronised.
    TimeUnavailable,
    /// A preset/style pair could not be resolved to wind parameters.
    Resolve(ResolveError),
    /// The temperature sensor could not produce a usable reading.
    Sensor(SensorError),
    /// A shared cell was contended; the operation is skipped this tick.
    LockTimeout(&'static str),
    /// No enabled user profile carries the requested number.
    UnknownProfile(u8),
    /// A payload could not be serialised for broadcast.
    Export(&'static str),
    /// A configuration field failed range validation.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigMissing(what) => write!(f, "config missing: {what}"),
            Self::TimeUnavailable => write!(f, "time not synchronised"),
            Self::Resolve(e) => write!(f, "resolve: {e}"),
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::LockTimeout(what) => write!(f, "lock timeout: {what}"),
            Self::UnknownProfile(no) => write!(f, "unknown profile #{no}"),
            Self::Export(msg) => write!(f, "export: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Resolve errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveError {
    /// Preset code not present in the wind dictionary.
    UnknownPreset,
    /// Style code given but not present in the wind dictionary.
    UnknownStyle,
    /// No wind dictionary is loaded.
    NoDictionary,
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownPreset => write!(f, "unknown preset"),
            Self::UnknownStyle => write!(f, "unknown style"),
            Self::NoDictionary => write!(f, "no wind dictionary"),
        }
    }
}

impl From<ResolveError> for Error {
    fn from(e: ResolveError) -> Self {
        Self::Resolve(e)
    }
}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// The probe returned NaN or an infinite value.
    ReadFailed,
    /// The sensor is disabled in configuration.
    NotConfigured,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFailed => write!(f, "read failed"),
            Self::NotConfigured => write!(f, "not configured"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;
