//! Broadcast scheduler.
//!
//! Each tick:
//!
//! 1. fold freshly taken dirty bits into `pending`;
//! 2. every `policy_refresh_ms`, re-read the live policy and push it to
//!    the transport if it changed;
//! 3. walk channels in priority order and send the **first** pending one
//!    whose interval has elapsed, then stop;
//! 4. run the transport's cleanup callback on its own interval.
//!
//! While no transport is bound the scheduler only accumulates pending bits.

use log::{info, warn};

use crate::app::ports::BroadcastSink;
use crate::error::Result;

use super::{BroadcastPolicy, Channel, ChannelSet};

pub struct BroadcastScheduler<S> {
    sink: Option<S>,
    /// Policy currently enforced.
    policy: BroadcastPolicy,
    /// Policy last pushed to the transport.
    applied: Option<BroadcastPolicy>,
    order: [Channel; Channel::COUNT],
    pending: ChannelSet,
    last_send_ms: [Option<u64>; Channel::COUNT],
    chart_last_bytes: usize,
    last_cleanup_ms: u64,
    last_policy_ms: u64,
    policy_refresh_ms: u64,
}

impl<S: BroadcastSink> BroadcastScheduler<S> {
    pub fn new(defaults: BroadcastPolicy, policy_refresh_ms: u32) -> Self {
        Self {
            sink: None,
            policy: defaults,
            applied: None,
            order: defaults.priority_order(),
            pending: ChannelSet::EMPTY,
            last_send_ms: [None; Channel::COUNT],
            chart_last_bytes: 0,
            last_cleanup_ms: 0,
            last_policy_ms: 0,
            policy_refresh_ms: u64::from(policy_refresh_ms),
        }
    }

    // ── Transport binding ─────────────────────────────────────

    /// Attach a transport and push the current policy to it.
    pub fn bind(&mut self, mut sink: S) {
        sink.apply_policy(&self.policy);
        self.applied = Some(self.policy);
        self.sink = Some(sink);
        info!("Broadcast: transport bound");
    }

    pub fn unbind(&mut self) -> Option<S> {
        self.applied = None;
        self.sink.take()
    }

    pub fn is_bound(&self) -> bool {
        self.sink.is_some()
    }

    pub fn sink(&self) -> Option<&S> {
        self.sink.as_ref()
    }

    pub fn sink_mut(&mut self) -> Option<&mut S> {
        self.sink.as_mut()
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Reset timers and load the live policy.
    pub fn begin(&mut self, now_ms: u64, live: Option<&BroadcastPolicy>) {
        self.refresh_policy(live);
        self.pending = ChannelSet::EMPTY;
        self.last_send_ms = [None; Channel::COUNT];
        self.chart_last_bytes = 0;
        self.last_cleanup_ms = now_ms;
        self.last_policy_ms = now_ms;
        info!(
            "Broadcast: scheduler begin itv(state={} metrics={} chart={} summary={}) cleanup={}",
            self.policy.state.interval_ms,
            self.policy.metrics.interval_ms,
            self.policy.chart.interval_ms,
            self.policy.summary.interval_ms,
            self.policy.cleanup_interval_ms
        );
    }

    /// Run one scheduling pass.  Returns the channel sent, if any.
    ///
    /// `render` serialises a channel's payload and is handed the channels
    /// still waiting behind it.  A failure leaves the channel pending and
    /// the scan moves on.
    pub fn tick<F>(
        &mut self,
        now_ms: u64,
        fresh: ChannelSet,
        live: Option<&BroadcastPolicy>,
        mut render: F,
    ) -> Option<Channel>
    where
        F: FnMut(Channel, ChannelSet) -> Result<Vec<u8>>,
    {
        self.pending = self.pending | fresh;

        if self.sink.is_none() {
            return None;
        }

        if now_ms.saturating_sub(self.last_policy_ms) >= self.policy_refresh_ms {
            self.last_policy_ms = now_ms;
            self.refresh_policy(live);
        }

        let sink = self.sink.as_mut()?;
        let mut sent = None;

        for ch in self.order {
            if !self.pending.contains(ch) {
                continue;
            }
            let interval = self
                .policy
                .effective_interval_ms(ch, self.chart_last_bytes);
            if let Some(last) = self.last_send_ms[ch.index()] {
                if now_ms.saturating_sub(last) < interval {
                    continue;
                }
            }

            let mut backlog = self.pending;
            backlog.remove(ch);
            match render(ch, backlog) {
                Ok(payload) => {
                    if ch == Channel::Chart {
                        self.chart_last_bytes = payload.len();
                    }
                    sink.broadcast(ch, &payload);
                    self.last_send_ms[ch.index()] = Some(now_ms);
                    self.pending.remove(ch);
                    sent = Some(ch);
                    break;
                }
                Err(e) => {
                    warn!("Broadcast: {} render failed: {}", ch.as_str(), e);
                }
            }
        }

        let cleanup = u64::from(self.policy.cleanup_interval_ms);
        if cleanup > 0 && now_ms.saturating_sub(self.last_cleanup_ms) >= cleanup {
            self.last_cleanup_ms = now_ms;
            sink.cleanup();
        }

        sent
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn pending(&self) -> ChannelSet {
        self.pending
    }

    pub fn policy(&self) -> &BroadcastPolicy {
        &self.policy
    }

    pub fn priority_order(&self) -> [Channel; Channel::COUNT] {
        self.order
    }

    pub fn last_send_ms(&self, channel: Channel) -> Option<u64> {
        self.last_send_ms[channel.index()]
    }

    pub fn chart_last_bytes(&self) -> usize {
        self.chart_last_bytes
    }

    // ── Internal ──────────────────────────────────────────────

    fn refresh_policy(&mut self, live: Option<&BroadcastPolicy>) {
        if let Some(live) = live {
            self.policy = self.policy.merged_with(live);
            self.order = self.policy.priority_order();
        }
        if self.applied == Some(self.policy) {
            return;
        }
        if let Some(sink) = self.sink.as_mut() {
            sink.apply_policy(&self.policy);
            self.applied = Some(self.policy);
            self.policy.log_applied();
        }
    }
}
