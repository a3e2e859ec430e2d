//! Log-based broadcast sink.
//!
//! Implements [`BroadcastSink`] by writing each published channel to the
//! logger.  Useful on a bench build with no WebSocket server; a real
//! transport implements the same trait.

use log::{debug, info};

use crate::app::ports::BroadcastSink;
use crate::broadcast::{BroadcastPolicy, Channel};

/// Adapter that logs every payload and counts sends per channel.
#[derive(Debug, Default)]
pub struct LogBroadcastSink {
    sent: [u32; Channel::COUNT],
    last_bytes: [usize; Channel::COUNT],
}

impl LogBroadcastSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self, channel: Channel) -> u32 {
        self.sent[channel.index()]
    }

    pub fn last_bytes(&self, channel: Channel) -> usize {
        self.last_bytes[channel.index()]
    }
}

impl BroadcastSink for LogBroadcastSink {
    fn broadcast(&mut self, channel: Channel, payload: &[u8]) {
        let i = channel.index();
        self.sent[i] = self.sent[i].wrapping_add(1);
        self.last_bytes[i] = payload.len();
        match core::str::from_utf8(payload) {
            Ok(text) => debug!("WS | {} | {}", channel.as_str(), text),
            Err(_) => debug!("WS | {} | {} bytes", channel.as_str(), payload.len()),
        }
    }

    fn cleanup(&mut self) {
        debug!("WS | cleanup");
    }

    fn apply_policy(&mut self, policy: &BroadcastPolicy) {
        info!(
            "WS | policy state={}ms metrics={}ms chart={}ms summary={}ms",
            policy.state.interval_ms,
            policy.metrics.interval_ms,
            policy.chart.interval_ms,
            policy.summary.interval_ms
        );
    }
}
