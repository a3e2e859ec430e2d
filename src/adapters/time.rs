//! Shared time-sync status.
//!
//! The network context (SNTP callback) publishes whether wall-clock time is
//! valid and the current local reading; the control loop reads it through
//! [`ClockPort`].  Both sides go through an `embassy-sync` mutex and use
//! `try_lock`, so a contended read fails with
//! [`Error::LockTimeout`] instead of blocking the tick.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use log::info;

use crate::app::ports::{ClockPort, LocalTime};
use crate::error::{Error, Result};

/// Last value published by the time-sync side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeStatus {
    pub valid: bool,
    pub local: Option<LocalTime>,
}

pub struct SharedTimeStatus {
    inner: Mutex<CriticalSectionRawMutex, TimeStatus>,
}

impl SharedTimeStatus {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(TimeStatus {
                valid: false,
                local: None,
            }),
        }
    }

    /// Publish from an async context, waiting for the lock.
    pub async fn publish(&self, status: TimeStatus) {
        *self.inner.lock().await = status;
    }

    /// Publish without waiting.
    pub fn try_publish(&self, status: TimeStatus) -> Result<()> {
        let mut guard = self
            .inner
            .try_lock()
            .map_err(|_| Error::LockTimeout("time status"))?;
        if guard.valid != status.valid {
            info!(
                "Time: {}",
                if status.valid { "synchronised" } else { "sync lost" }
            );
        }
        *guard = status;
        Ok(())
    }

    fn read(&self) -> Result<TimeStatus> {
        self.inner
            .try_lock()
            .map(|guard| *guard)
            .map_err(|_| Error::LockTimeout("time status"))
    }
}

impl Default for SharedTimeStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockPort for SharedTimeStatus {
    fn is_time_valid(&self) -> Result<bool> {
        self.read().map(|s| s.valid)
    }

    fn local_time(&self) -> Result<Option<LocalTime>> {
        self.read().map(|s| if s.valid { s.local } else { None })
    }
}
