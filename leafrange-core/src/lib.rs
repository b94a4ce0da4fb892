//! Board-agnostic range engine for the LeafRange cluster display
//!
//! This crate contains everything between the decoded bus values and the
//! chart the display draws:
//!
//! - Telemetry snapshot types and the charge-level glitch filter
//! - Range model (temperature and battery-health compensated)
//! - Driving/Charging session state machine
//! - Fixed-capacity sample log
//! - Non-volatile persistence of counters, session and samples
//! - Chart scaling and coordinate mapping
//! - Text readouts and the diagnostics export
//!
//! The [`engine::Engine`] ties them together behind a single `tick` call.

#![no_std]
#![deny(unsafe_code)]

#[macro_use]
mod fmt;

pub mod chart;
pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod persist;
pub mod range;
pub mod readout;
pub mod samples;
pub mod session;
pub mod telemetry;

pub use engine::{Engine, TickSummary};
