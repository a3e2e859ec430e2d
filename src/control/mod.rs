//! Output sequencing for schedules and profiles.

pub mod sequencer;

pub use sequencer::{Phase, SegmentRuntime, SequenceEvent};
