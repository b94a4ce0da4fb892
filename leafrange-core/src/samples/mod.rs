//! Session sample log
//!
//! A bounded, chronologically ordered trajectory of the current session,
//! drawn as the "actual" line on the chart.

pub mod ring;

pub use ring::{AppendOutcome, SampleLog, SampleLogEntry};
