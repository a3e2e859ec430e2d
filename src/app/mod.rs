//! Application core: pure domain logic, zero I/O.
//!
//! This module contains the decision engine of the fan controller: run
//! source arbitration, override handling, segment sequencing and the
//! payloads published to observers.  All interaction with devices and
//! configuration happens through **port traits** defined in [`ports`],
//! keeping this layer fully testable without real peripherals.

pub mod commands;
pub mod export;
pub mod ports;
pub mod runtime;
pub mod service;
