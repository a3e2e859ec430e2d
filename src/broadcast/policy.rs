//! Per-channel send policy.

use log::info;
use serde::{Deserialize, Serialize};

use super::Channel;

/// Minimum interval and priority rank of one channel (lower rank goes first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelPolicy {
    pub interval_ms: u32,
    pub priority: u8,
}

/// Complete broadcast policy, usually read from the live system config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BroadcastPolicy {
    pub state: ChannelPolicy,
    pub metrics: ChannelPolicy,
    pub chart: ChannelPolicy,
    pub summary: ChannelPolicy,
    /// Chart payloads larger than this many bytes slow the chart channel down.
    pub chart_large_bytes: u32,
    /// Interval multiplier applied to the chart channel after a large payload.
    pub chart_throttle_mul: u8,
    /// Interval of the transport's connection cleanup callback.
    pub cleanup_interval_ms: u32,
}

impl Default for BroadcastPolicy {
    fn default() -> Self {
        Self {
            state: ChannelPolicy { interval_ms: 800, priority: 0 },
            metrics: ChannelPolicy { interval_ms: 1500, priority: 1 },
            chart: ChannelPolicy { interval_ms: 1200, priority: 2 },
            summary: ChannelPolicy { interval_ms: 1500, priority: 3 },
            chart_large_bytes: 3500,
            chart_throttle_mul: 2,
            cleanup_interval_ms: 10_000,
        }
    }
}

impl BroadcastPolicy {
    pub fn channel(&self, channel: Channel) -> ChannelPolicy {
        match channel {
            Channel::State => self.state,
            Channel::Metrics => self.metrics,
            Channel::Chart => self.chart,
            Channel::Summary => self.summary,
        }
    }

    fn channel_mut(&mut self, channel: Channel) -> &mut ChannelPolicy {
        match channel {
            Channel::State => &mut self.state,
            Channel::Metrics => &mut self.metrics,
            Channel::Chart => &mut self.chart,
            Channel::Summary => &mut self.summary,
        }
    }

    /// Overlay `live` on top of `self`.  Zero intervals and thresholds in
    /// `live` keep the current value; priorities are always taken.
    #[must_use]
    pub fn merged_with(&self, live: &BroadcastPolicy) -> BroadcastPolicy {
        let mut out = *self;
        for ch in Channel::ALL {
            let src = live.channel(ch);
            let dst = out.channel_mut(ch);
            if src.interval_ms > 0 {
                dst.interval_ms = src.interval_ms;
            }
            dst.priority = src.priority;
        }
        if live.chart_large_bytes > 0 {
            out.chart_large_bytes = live.chart_large_bytes;
        }
        if live.chart_throttle_mul > 0 {
            out.chart_throttle_mul = live.chart_throttle_mul;
        }
        if live.cleanup_interval_ms > 0 {
            out.cleanup_interval_ms = live.cleanup_interval_ms;
        }
        out
    }

    /// Channels sorted by rank; equal ranks keep channel order.
    pub fn priority_order(&self) -> [Channel; Channel::COUNT] {
        let mut order = Channel::ALL;
        order.sort_by_key(|c| self.channel(*c).priority);
        order
    }

    /// Interval actually enforced for `channel`, given the size of the last
    /// chart payload.
    pub fn effective_interval_ms(&self, channel: Channel, chart_last_bytes: usize) -> u64 {
        let base = u64::from(self.channel(channel).interval_ms);
        if channel == Channel::Chart && chart_last_bytes > self.chart_large_bytes as usize {
            let mul = if self.chart_throttle_mul > 0 {
                self.chart_throttle_mul
            } else {
                2
            };
            base * u64::from(mul)
        } else {
            base
        }
    }

    pub(crate) fn log_applied(&self) {
        let order = self.priority_order();
        info!(
            "Broadcast: policy applied itv({}/{}/{}/{}) prio({},{},{},{}) chart({},mul={}) cleanup={}",
            self.state.interval_ms,
            self.metrics.interval_ms,
            self.chart.interval_ms,
            self.summary.interval_ms,
            order[0].as_str(),
            order[1].as_str(),
            order[2].as_str(),
            order[3].as_str(),
            self.chart_large_bytes,
            self.chart_throttle_mul,
            self.cleanup_interval_ms
        );
    }
}
