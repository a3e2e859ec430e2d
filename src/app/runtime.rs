//! Control loop wiring.
//!
//! Bridges the async request side (HTTP / WebSocket handlers) with the
//! synchronous control tick through a bounded `embassy-sync` channel, then
//! hands the tick's dirty set to the broadcast scheduler.
//!
//! ```text
//! ┌──────────────┐ ControlCommand ┌──────────────────────────────┐
//! │ Request task │───────────────▶│ ControlLoop::run_once        │
//! │   (async)    │  CommandInbox  │  drain → tick → broadcast    │──▶ BroadcastSink
//! └──────────────┘                └──────────────────────────────┘
//! ```

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel as Queue, TrySendError};
use log::warn;

use crate::broadcast::{BroadcastScheduler, Channel};
use crate::config::ControlConfig;

use super::commands::ControlCommand;
use super::ports::{BroadcastSink, ConfigStore, DevicePorts};
use super::service::ControlEngine;

/// Channel depth for operator commands.
pub const INBOX_DEPTH: usize = 8;

/// Bounded command queue: request side → control loop.
pub struct CommandInbox {
    queue: Queue<CriticalSectionRawMutex, ControlCommand, INBOX_DEPTH>,
}

impl CommandInbox {
    pub const fn new() -> Self {
        Self {
            queue: Queue::new(),
        }
    }

    /// Queue without waiting.  A full inbox hands the command back.
    pub fn post(&self, cmd: ControlCommand) -> Result<(), ControlCommand> {
        self.queue.try_send(cmd).map_err(|TrySendError::Full(cmd)| cmd)
    }

    /// Queue, waiting for space.
    pub async fn post_async(&self, cmd: ControlCommand) {
        self.queue.send(cmd).await;
    }

    pub fn try_next(&self) -> Option<ControlCommand> {
        self.queue.try_receive().ok()
    }
}

impl Default for CommandInbox {
    fn default() -> Self {
        Self::new()
    }
}

/// One engine plus its broadcast scheduler.
pub struct ControlLoop<S> {
    engine: ControlEngine,
    broadcast: BroadcastScheduler<S>,
}

impl<S: BroadcastSink> ControlLoop<S> {
    pub fn new(config: ControlConfig) -> Self {
        let broadcast = BroadcastScheduler::new(config.broadcast, config.policy_refresh_ms);
        Self {
            engine: ControlEngine::new(config),
            broadcast,
        }
    }

    /// Start the engine and load the initial broadcast policy.
    pub fn begin(&mut self, now_ms: u64, store: &impl ConfigStore) {
        self.engine.start(now_ms);
        let live = store.broadcast_policy();
        self.broadcast.begin(now_ms, live.as_ref());
    }

    /// Attach the transport.
    pub fn bind(&mut self, sink: S) {
        self.broadcast.bind(sink);
    }

    /// Drain commands, tick, publish.  Returns the channel sent, if any.
    pub fn run_once(
        &mut self,
        now_ms: u64,
        inbox: &CommandInbox,
        store: &impl ConfigStore,
        hw: &mut impl DevicePorts,
    ) -> Option<Channel> {
        while let Some(cmd) = inbox.try_next() {
            if let Err(e) = self.engine.handle_command(cmd, now_ms, store, hw) {
                warn!("Control: command rejected: {}", e);
            }
        }

        self.engine.tick(now_ms, store, hw);

        let fresh = self.engine.take_dirty();
        let live = store.broadcast_policy();
        let engine = &self.engine;
        let hw = &*hw;
        self.broadcast.tick(now_ms, fresh, live.as_ref(), |ch, backlog| {
            engine.render_channel(ch, backlog, now_ms, store, hw)
        })
    }

    pub fn engine(&self) -> &ControlEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut ControlEngine {
        &mut self.engine
    }

    pub fn broadcast(&self) -> &BroadcastScheduler<S> {
        &self.broadcast
    }

    pub fn broadcast_mut(&mut self) -> &mut BroadcastScheduler<S> {
        &mut self.broadcast
    }
}
