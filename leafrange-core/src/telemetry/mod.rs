//! Telemetry ingestion
//!
//! The bus capture layer decodes frames into a [`TelemetrySnapshot`] once per
//! refresh. The engine only ever sees these decoded values.

pub mod glitch;
pub mod snapshot;

pub use glitch::{GlitchFilter, GlitchVerdict};
pub use snapshot::{ButtonEvent, TelemetryReading, TelemetrySnapshot};

/// Source of decoded bus values
///
/// Implemented by the bus capture layer. Must return within the tick budget;
/// when nothing new arrived since the previous call it returns
/// [`TelemetryReading::NoNewData`].
pub trait TelemetrySource {
    /// Fetch the latest decoded values
    fn read_telemetry(&mut self) -> TelemetryReading;
}
