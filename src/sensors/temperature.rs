//! Rate-limited temperature sampler.
//!
//! Wraps a raw [`TemperaturePort`] so the tick loop can ask for a
//! temperature every cycle without touching the bus more than once per
//! sample interval (never faster than 2 s).
//!
//! - Pin change → the probe is re-initialised and read immediately.
//! - NaN / infinite reading → logged, last good value kept.
//! - Disabled in config → no reading at all.

use log::{info, warn};

use crate::app::ports::TemperaturePort;
use crate::config::TemperatureConfig;
use crate::error::{Error, SensorError};

/// Hard floor for the sample interval.
pub const MIN_SAMPLE_INTERVAL_MS: u64 = 2000;

#[derive(Debug)]
pub struct TemperatureSampler {
    interval_ms: u64,
    pin: Option<u8>,
    last_read_ms: Option<u64>,
    last_good_c: Option<f32>,
}

impl TemperatureSampler {
    pub fn new(interval_ms: u32) -> Self {
        Self {
            interval_ms: u64::from(interval_ms).max(MIN_SAMPLE_INTERVAL_MS),
            pin: None,
            last_read_ms: None,
            last_good_c: None,
        }
    }

    pub fn set_interval_ms(&mut self, interval_ms: u32) {
        self.interval_ms = u64::from(interval_ms).max(MIN_SAMPLE_INTERVAL_MS);
    }

    /// Latest usable reading, polling the probe if the interval has passed.
    pub fn sample(
        &mut self,
        probe: &mut impl TemperaturePort,
        cfg: &TemperatureConfig,
        now_ms: u64,
    ) -> Option<f32> {
        if !cfg.enabled {
            self.pin = None;
            return None;
        }

        if self.pin != Some(cfg.pin) {
            probe.begin(cfg.pin);
            info!("Temperature: probe initialised on pin {}", cfg.pin);
            self.pin = Some(cfg.pin);
            self.last_read_ms = None;
            self.last_good_c = None;
        }

        if let Some(last) = self.last_read_ms {
            if now_ms.saturating_sub(last) < self.interval_ms {
                return self.last_good_c;
            }
        }
        self.last_read_ms = Some(now_ms);

        let raw = probe.read_celsius();
        if raw.is_finite() {
            self.last_good_c = Some(raw);
        } else {
            warn!(
                "Temperature: {} on pin {}, keeping {:?}",
                Error::Sensor(SensorError::ReadFailed),
                cfg.pin,
                self.last_good_c
            );
        }
        self.last_good_c
    }

    /// Cached value without polling.
    pub fn last_good_c(&self) -> Option<f32> {
        self.last_good_c
    }
}
