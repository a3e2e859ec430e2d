//! Segment sequencer.
//!
//! One [`SegmentRuntime`] per sequence kind (schedule, profile) walks the
//! owning item's segment list:
//!
//! ```text
//!  not started ──▶ seg[0] On ──on_minutes──▶ seg[0] Off ──off_minutes──▶ seg[1] On ──▶ …
//!                                                                            │
//!          past the last segment: Once → done · Forever → seg[0] · Times(n) → seg[0] until n loops
//! ```
//!
//! A zero-length phase is skipped: a segment with `on_minutes == 0` is
//! entered directly in its Off phase, and an On phase with
//! `off_minutes == 0` advances straight to the next segment.
//!
//! The runtime is pure bookkeeping.  Each tick returns at most one
//! [`SequenceEvent`]; the engine performs the matching output change.

use serde::Serialize;

use crate::model::{RepeatPolicy, Segment};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum Phase {
    #[default]
    On,
    Off,
}

/// Output change requested by a sequencer tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceEvent {
    /// Segment `index` entered its On phase: apply its output.
    EnterOn(usize),
    /// Segment `index` entered its Off phase: stop output.
    EnterOff(usize),
    /// The list ran out; output stops until the sequence is restarted.
    Completed,
    /// There is nothing to run.
    Empty,
}

/// Cursor state of one sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentRuntime {
    index: Option<usize>,
    phase: Phase,
    phase_start_ms: u64,
    loop_count: u8,
    completed: bool,
}

impl SegmentRuntime {
    pub const fn new() -> Self {
        Self {
            index: None,
            phase: Phase::On,
            phase_start_ms: 0,
            loop_count: 0,
            completed: false,
        }
    }

    /// Back to "not started".
    pub fn reset(&mut self, now_ms: u64) {
        *self = Self {
            phase_start_ms: now_ms,
            ..Self::new()
        };
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    /// Index as exported to observers (`-1` = not started).
    pub fn cursor(&self) -> i16 {
        self.index.map_or(-1, |i| i as i16)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn phase_start_ms(&self) -> u64 {
        self.phase_start_ms
    }

    pub fn loop_count(&self) -> u8 {
        self.loop_count
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Segment currently in its On phase, if any.
    pub fn active_on(&self) -> Option<usize> {
        match (self.index, self.phase) {
            (Some(i), Phase::On) => Some(i),
            _ => None,
        }
    }

    /// Advance timing by one tick.
    pub fn tick(
        &mut self,
        segments: &[Segment],
        repeat: RepeatPolicy,
        now_ms: u64,
    ) -> Option<SequenceEvent> {
        if self.completed {
            return None;
        }
        if segments.is_empty() {
            self.finish();
            return Some(SequenceEvent::Empty);
        }

        let Some(i) = self.index else {
            self.loop_count = 0;
            return Some(self.enter(segments, 0, now_ms));
        };
        let Some(seg) = segments.get(i) else {
            // The list shrank underneath the cursor.
            self.finish();
            return Some(SequenceEvent::Completed);
        };

        let elapsed = now_ms.saturating_sub(self.phase_start_ms);
        match self.phase {
            Phase::On if elapsed >= seg.on_ms() => {
                if seg.off_ms() == 0 {
                    Some(self.advance(segments, i, repeat, now_ms))
                } else {
                    self.phase = Phase::Off;
                    self.phase_start_ms = now_ms;
                    Some(SequenceEvent::EnterOff(i))
                }
            }
            Phase::Off if elapsed >= seg.off_ms() => Some(self.advance(segments, i, repeat, now_ms)),
            _ => None,
        }
    }

    // ── Internal ──────────────────────────────────────────────

    fn enter(&mut self, segments: &[Segment], index: usize, now_ms: u64) -> SequenceEvent {
        self.index = Some(index);
        self.phase_start_ms = now_ms;
        if segments[index].on_minutes == 0 {
            self.phase = Phase::Off;
            SequenceEvent::EnterOff(index)
        } else {
            self.phase = Phase::On;
            SequenceEvent::EnterOn(index)
        }
    }

    fn advance(
        &mut self,
        segments: &[Segment],
        index: usize,
        repeat: RepeatPolicy,
        now_ms: u64,
    ) -> SequenceEvent {
        let next = index + 1;
        if next < segments.len() {
            return self.enter(segments, next, now_ms);
        }

        let exhausted = match repeat {
            RepeatPolicy::Once => true,
            RepeatPolicy::Forever => false,
            RepeatPolicy::Times(n) => u16::from(self.loop_count) + 1 >= u16::from(n),
        };
        if exhausted {
            self.finish();
            return SequenceEvent::Completed;
        }

        self.loop_count = self.loop_count.saturating_add(1);
        self.enter(segments, 0, now_ms)
    }

    fn finish(&mut self) {
        self.index = None;
        self.phase = Phase::On;
        self.completed = true;
    }
}
