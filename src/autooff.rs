//! AutoOff monitor.
//!
//! Armed from a schedule's or profile's [`AutoOffConfig`] whenever that
//! item becomes the run source, and evaluated every running tick.
//!
//! ## Evaluation order
//!
//! 1. **Timer**: minutes since arming ≥ configured minutes.
//! 2. **Clock time**: local minute-of-day ≥ configured time, at most once
//!    per calendar day (see below).
//! 3. **Temperature**: last sampled reading ≥ configured threshold.
//!
//! The first satisfied condition wins.
//!
//! ## Anti-retrigger
//!
//! The clock-time condition stays true from the threshold until midnight.
//! The monitor remembers the `(day_of_year, minute)` of its last clock
//! trigger and refuses to fire again on the same day.  The marker lives
//! outside the armed runtime, so it survives [`clear`](AutoOffMonitor::clear)
//! and re-arming.

use log::info;
use serde::Serialize;

use crate::app::ports::LocalTime;
use crate::model::{AutoOffConfig, TimeOfDay};

/// Which condition fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoOffTrigger {
    Timer,
    ClockTime,
    Temperature,
}

/// Armed timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerArm {
    pub armed_at_ms: u64,
    pub minutes: u32,
}

/// Conditions armed for the current activation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoOffRuntime {
    pub timer: Option<TimerArm>,
    pub off_time: Option<TimeOfDay>,
    pub off_temp_c: Option<f32>,
}

impl AutoOffRuntime {
    pub fn is_armed(&self) -> bool {
        self.timer.is_some() || self.off_time.is_some() || self.off_temp_c.is_some()
    }
}

/// Day/minute of the last clock-time trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayMarker {
    pub day_of_year: u16,
    pub minute: u16,
}

#[derive(Debug, Default)]
pub struct AutoOffMonitor {
    rt: AutoOffRuntime,
    last_clock_trigger: Option<DayMarker>,
}

impl AutoOffMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm from `cfg`; a zero-minute timer counts as disabled.
    pub fn arm(&mut self, cfg: &AutoOffConfig, now_ms: u64) {
        self.rt = AutoOffRuntime {
            timer: cfg
                .timer_minutes
                .filter(|m| *m > 0)
                .map(|minutes| TimerArm {
                    armed_at_ms: now_ms,
                    minutes,
                }),
            off_time: cfg.off_time,
            off_temp_c: cfg.off_temp_c.filter(|t| t.is_finite()),
        };
    }

    /// Disarm everything.  The clock-time marker is kept.
    pub fn clear(&mut self) {
        self.rt = AutoOffRuntime::default();
    }

    pub fn is_armed(&self) -> bool {
        self.rt.is_armed()
    }

    /// Whether a temperature sample is worth taking this tick.
    pub fn wants_temperature(&self) -> bool {
        self.rt.off_temp_c.is_some()
    }

    pub fn runtime(&self) -> &AutoOffRuntime {
        &self.rt
    }

    pub fn last_clock_trigger(&self) -> Option<DayMarker> {
        self.last_clock_trigger
    }

    /// Evaluate the armed conditions in fixed order.
    ///
    /// `local` is `None` when wall-clock time is unavailable; the clock-time
    /// condition is then skipped.  `temperature_c` is the sampler's cached
    /// reading.
    pub fn check(
        &mut self,
        now_ms: u64,
        local: Option<&LocalTime>,
        temperature_c: Option<f32>,
    ) -> Option<AutoOffTrigger> {
        if let Some(timer) = self.rt.timer {
            let elapsed_min = now_ms.saturating_sub(timer.armed_at_ms) / 60_000;
            if elapsed_min >= u64::from(timer.minutes) {
                info!("AutoOff: timer {} min elapsed", timer.minutes);
                return Some(AutoOffTrigger::Timer);
            }
        }

        if let (Some(off), Some(t)) = (self.rt.off_time, local) {
            let cur = t.minute_of_day();
            let fired_today = self
                .last_clock_trigger
                .is_some_and(|m| m.day_of_year == t.day_of_year);
            if cur >= off.minutes() && !fired_today {
                self.last_clock_trigger = Some(DayMarker {
                    day_of_year: t.day_of_year,
                    minute: cur,
                });
                info!("AutoOff: clock time {} reached (day {})", off, t.day_of_year);
                return Some(AutoOffTrigger::ClockTime);
            }
        }

        if let (Some(limit), Some(temp)) = (self.rt.off_temp_c, temperature_c) {
            if temp >= limit {
                info!("AutoOff: temperature {:.1}C >= {:.1}C", temp, limit);
                return Some(AutoOffTrigger::Temperature);
            }
        }

        None
    }
}
