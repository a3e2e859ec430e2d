//! Nature-wind fan controller core.
//!
//! Decides every tick what the fan should be doing (manual override, user
//! profile, weekly schedule, or nothing), sequences timed segments, stops
//! on AutoOff conditions, and publishes state to observers through a
//! throttled broadcast scheduler.  Devices and configuration are reached
//! only through the port traits in [`app::ports`].

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod autooff;
pub mod broadcast;
pub mod config;
pub mod control;
pub mod error;
pub mod fsm;
pub mod model;
pub mod schedule;
pub mod sensors;
pub mod wind;
