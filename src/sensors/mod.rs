//! Sensor subsystem.
//!
//! Only the temperature probe feeds the control core (AutoOff's
//! temperature condition).  Motion presence is debounced by its own
//! collaborator behind [`MotionPort`](crate::app::ports::MotionPort).

pub mod temperature;

pub use temperature::TemperatureSampler;
