//! Change publication: dirty flags and the rate-limited broadcast scheduler.
//!
//! ```text
//! ┌──────────────┐ mark()  ┌────────────┐ take()  ┌─────────────────────┐
//! │ ControlEngine│────────▶│ DirtyFlags │────────▶│ BroadcastScheduler  │──▶ BroadcastSink
//! │ WindActuator │         └────────────┘         │ pending · interval  │    (≤ 1 channel/tick)
//! └──────────────┘                                │ priority · throttle │
//!                                                 └─────────────────────┘
//! ```

pub mod policy;
pub mod scheduler;

use core::ops::BitOr;

use serde::{Deserialize, Serialize};

pub use policy::{BroadcastPolicy, ChannelPolicy};
pub use scheduler::BroadcastScheduler;

// ───────────────────────────────────────────────────────────────
// Channels
// ───────────────────────────────────────────────────────────────

/// The four outbound channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Channel {
    State = 0,
    Metrics = 1,
    Chart = 2,
    Summary = 3,
}

impl Channel {
    pub const COUNT: usize = 4;
    pub const ALL: [Self; Self::COUNT] = [Self::State, Self::Metrics, Self::Chart, Self::Summary];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn mask(self) -> u8 {
        1 << self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::State => "state",
            Self::Metrics => "metrics",
            Self::Chart => "chart",
            Self::Summary => "summary",
        }
    }
}

/// A set of channels packed into a bitmask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelSet(u8);

impl ChannelSet {
    pub const EMPTY: Self = Self(0);
    pub const ALL: Self = Self(0b1111);
    /// state + metrics + summary: what every run-context change touches.
    pub const STATUS: Self = Self(
        Channel::State.mask() | Channel::Metrics.mask() | Channel::Summary.mask(),
    );

    pub const fn of(channel: Channel) -> Self {
        Self(channel.mask())
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, channel: Channel) -> bool {
        self.0 & channel.mask() != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn insert(&mut self, channel: Channel) {
        self.0 |= channel.mask();
    }

    pub fn remove(&mut self, channel: Channel) {
        self.0 &= !channel.mask();
    }

    pub fn iter(self) -> impl Iterator<Item = Channel> {
        Channel::ALL.into_iter().filter(move |c| self.contains(*c))
    }
}

impl BitOr for ChannelSet {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl From<Channel> for ChannelSet {
    fn from(channel: Channel) -> Self {
        Self::of(channel)
    }
}

// ───────────────────────────────────────────────────────────────
// Dirty flags
// ───────────────────────────────────────────────────────────────

/// Per-channel "changed since last publish" bits, consumed exactly once.
#[derive(Debug, Default)]
pub struct DirtyFlags {
    bits: ChannelSet,
}

impl DirtyFlags {
    pub const fn new() -> Self {
        Self {
            bits: ChannelSet::EMPTY,
        }
    }

    pub fn mark(&mut self, channel: Channel) {
        self.bits.insert(channel);
    }

    pub fn mark_set(&mut self, set: ChannelSet) {
        self.bits = self.bits | set;
    }

    /// Mark state, metrics and summary.
    pub fn mark_status(&mut self) {
        self.mark_set(ChannelSet::STATUS);
    }

    /// Snapshot without consuming.
    pub fn peek(&self) -> ChannelSet {
        self.bits
    }

    /// Return every marked channel and clear them.
    pub fn take(&mut self) -> ChannelSet {
        core::mem::take(&mut self.bits)
    }
}
