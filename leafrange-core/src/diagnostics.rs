//! Diagnostics export
//!
//! A read-only view of the engine for the service port. Streaming it never
//! changes engine state; the only side effect is reading the store.

use leafrange_hal::{Eeprom, StoreError, UartTx};
use leafrange_protocol::{
    CountersReport, DiagnosticMessage, FrameError, HealthReport, SessionReport, STORE_CHUNK_SIZE,
};

use crate::persist::{PersistError, PersistentCounters, STORE_VERSION};
use crate::samples::{SampleLog, SampleLogEntry};
use crate::session::{Mode, SessionState, TripMeter};

/// Fault counters since boot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EngineHealth {
    /// Ticks whose snapshot the range model refused
    pub sensor_faults: u32,
    /// Failed store commits and flushes
    pub storage_failures: u32,
    /// Estimates with a value clamped to its floor
    pub clamped_estimates: u32,
    /// Raw charge readings held back by the glitch filter
    pub glitches_rejected: u32,
    /// Ticks without fresh telemetry
    pub stale_ticks: u32,
    /// Most recent storage error
    pub last_store_error: Option<PersistError>,
}

/// Errors while streaming a dump
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DiagnosticsError<U> {
    /// Serial port failed
    Uart(U),
    /// Store could not be read
    Store(StoreError),
    /// Message did not fit a frame
    Frame(FrameError),
}

impl<U> From<StoreError> for DiagnosticsError<U> {
    fn from(e: StoreError) -> Self {
        DiagnosticsError::Store(e)
    }
}

impl<U> From<FrameError> for DiagnosticsError<U> {
    fn from(e: FrameError) -> Self {
        DiagnosticsError::Frame(e)
    }
}

/// Snapshot of everything the dump reports
#[derive(Debug, Clone, Copy)]
pub struct DiagnosticsExport<'a, const N: usize> {
    pub counters: PersistentCounters,
    pub session: SessionState,
    pub trip: TripMeter,
    pub health: EngineHealth,
    pub ticks_since_update: u32,
    pub log: &'a SampleLog<N>,
}

impl<'a, const N: usize> DiagnosticsExport<'a, N> {
    /// Logged samples, oldest first
    pub fn samples(&self) -> impl Iterator<Item = SampleLogEntry> + 'a {
        let log: &'a SampleLog<N> = self.log;
        log.iter()
    }

    fn counters_report(&self) -> CountersReport {
        CountersReport {
            drive_sessions: self.counters.lifetime_drive_sessions,
            charge_sessions: self.counters.lifetime_charge_sessions,
            odometer_km: self.counters.last_odometer_km,
            store_version: self.counters.store_version_tag,
        }
    }

    fn session_report(&self) -> SessionReport {
        SessionReport {
            mode: match self.session.mode {
                Mode::Driving => 0,
                Mode::Charging => 1,
            },
            start_charge_level: self.session.session_start_charge_level,
            start_charge_percent: self.session.session_start_charge_percent,
            odometer_km: self.session.session_odometer_km,
            last_charge_level: self.session.last_charge_level_seen,
            ticks: self.session.session_ticks,
            trip_km: self.trip.distance_km,
        }
    }

    fn health_report(&self) -> HealthReport {
        HealthReport {
            sensor_faults: self.health.sensor_faults,
            storage_failures: self.health.storage_failures,
            clamped_estimates: self.health.clamped_estimates,
            glitches_rejected: self.health.glitches_rejected,
            stale_ticks: self.health.stale_ticks,
            ticks_since_update: self.ticks_since_update,
        }
    }
}

/// Writes frames with a running sequence number
struct FrameSink<'u, U> {
    uart: &'u mut U,
    seq: u8,
    frames: usize,
}

impl<U: UartTx> FrameSink<'_, U> {
    fn send(&mut self, message: &DiagnosticMessage<'_>) -> Result<(), DiagnosticsError<U::Error>> {
        let frame = message.to_frame()?.with_seq(self.seq);
        self.uart
            .write_blocking(&frame.encode_to_vec())
            .map_err(DiagnosticsError::Uart)?;
        self.seq = self.seq.wrapping_add(1);
        self.frames += 1;
        Ok(())
    }
}

/// Stream `export` and the raw store contents over `uart`
///
/// Returns the number of frames sent.
pub fn send_diagnostics<E, U, const N: usize>(
    export: &DiagnosticsExport<'_, N>,
    eeprom: &mut E,
    uart: &mut U,
) -> Result<usize, DiagnosticsError<U::Error>>
where
    E: Eeprom,
    U: UartTx,
{
    let store_bytes = eeprom.capacity().min(u16::MAX as usize) as u16;
    let samples = export.log.len() as u16;
    let mut sink = FrameSink {
        uart,
        seq: 0,
        frames: 0,
    };

    sink.send(&DiagnosticMessage::Hello {
        store_version: STORE_VERSION,
        log_capacity: N as u16,
        store_bytes,
    })?;
    sink.send(&DiagnosticMessage::Counters(export.counters_report()))?;
    sink.send(&DiagnosticMessage::Session(export.session_report()))?;
    sink.send(&DiagnosticMessage::Health(export.health_report()))?;

    for (index, entry) in export.samples().enumerate() {
        sink.send(&DiagnosticMessage::Sample {
            index: index as u16,
            progress: entry.progress,
            charge_percent: entry.charge_level_percent,
        })?;
    }

    let mut chunk = [0u8; STORE_CHUNK_SIZE];
    eeprom.dump_all(&mut chunk, |offset, bytes| {
        sink.send(&DiagnosticMessage::StoreChunk { offset, bytes })
    })?;

    sink.send(&DiagnosticMessage::End {
        samples,
        store_bytes,
    })?;
    sink.uart.flush().map_err(DiagnosticsError::Uart)?;

    debug!("diagnostics dump sent, {} frames", sink.frames);
    Ok(sink.frames)
}
