//! Range engine
//!
//! [`Engine`] owns the [`DeviceState`] and the persistent store and exposes
//! what the display polls once per tick: the estimate, the mode, the chart
//! frame and the readouts.
//!
//! ```text
//! boot ──► load store ──► DeviceState
//!                             │
//!         ┌───────────────────┘
//!         ▼
//!  tick(reading) ──► telemetry ──► button ──► session ──► model
//!                                                           │
//!         chart ◄── flush ◄── sample log ◄──────────────────┘
//! ```

pub mod flush;
pub mod state;
pub mod tick;


use leafrange_hal::{Eeprom, UartTx};

use crate::chart::{render, ChartFrame};
use crate::config::{ConfigError, EngineConfig, SAMPLE_LOG_CAPACITY};
use crate::diagnostics::{self, DiagnosticsError, DiagnosticsExport, EngineHealth};
use crate::persist::{BootReason, PersistentCounters, PersistentStore};
use crate::range::Estimate;
use crate::readout::{DisplayPage, ReadoutContext, Readouts};
use crate::samples::SampleLog;
use crate::session::{Mode, SessionState, TripMeter};
use crate::telemetry::{TelemetryReading, TelemetrySource};

pub use flush::{FlushOutcome, FlushSchedule};
pub use state::DeviceState;
pub use tick::TickSummary;

/// Range engine over a non-volatile store `E` with an `N`-entry sample log
pub struct Engine<E, const N: usize = SAMPLE_LOG_CAPACITY> {
    state: DeviceState<N>,
    store: PersistentStore<E>,
}

impl<E: Eeprom, const N: usize> Engine<E, N> {
    /// Validate `config`, then restore or initialize state from `eeprom`
    pub fn boot(config: EngineConfig, eeprom: E) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut store = PersistentStore::new(eeprom);
        let loaded = store.load::<N>(config.log);
        info!(
            "boot: {:?}, {:?}, drive {} charge {}",
            loaded.reason,
            loaded.record.session.mode,
            loaded.record.counters.lifetime_drive_sessions,
            loaded.record.counters.lifetime_charge_sessions
        );

        Ok(Self {
            state: DeviceState::from_loaded(config, loaded),
            store,
        })
    }

    /// Run one tick
    pub fn tick(&mut self, reading: TelemetryReading) -> TickSummary {
        tick::tick(&mut self.state, &mut self.store, reading)
    }

    /// Read telemetry from `source` and run one tick
    pub fn tick_from<S: TelemetrySource>(&mut self, source: &mut S) -> TickSummary {
        let reading = source.read_telemetry();
        self.tick(reading)
    }

    /// Flush state and samples now, regardless of the schedule
    ///
    /// For use before a controlled shutdown.
    pub fn flush_now(&mut self) -> FlushOutcome {
        tick::flush(&mut self.state, &mut self.store)
    }

    pub fn estimate(&self) -> Estimate {
        self.state.model.current()
    }

    pub fn mode(&self) -> Mode {
        self.state.mode()
    }

    pub fn session(&self) -> &SessionState {
        &self.state.record.session
    }

    pub fn counters(&self) -> &PersistentCounters {
        &self.state.record.counters
    }

    pub fn trip(&self) -> &TripMeter {
        &self.state.record.trip
    }

    pub fn log(&self) -> &SampleLog<N> {
        &self.state.log
    }

    pub fn page(&self) -> DisplayPage {
        self.state.page
    }

    pub fn health(&self) -> &EngineHealth {
        &self.state.health
    }

    pub fn boot_reason(&self) -> BootReason {
        self.state.boot_reason
    }

    /// Ticks since fresh telemetry was last accepted
    pub fn ticks_since_update(&self) -> u32 {
        self.state.ticks_since_update
    }

    pub fn state(&self) -> &DeviceState<N> {
        &self.state
    }

    /// Chart for the current tick, in normalized coordinates
    pub fn chart(&self) -> ChartFrame<N> {
        let state = &self.state;
        render(
            state.axis,
            state.rescaled,
            &state.log,
            &state.record.session,
            &state.model.current().range,
            &state.config.chart,
        )
    }

    /// Text readouts for the current tick
    pub fn readouts(&self) -> Readouts {
        let state = &self.state;
        let estimate = state.model.current();
        let snapshot = state.snapshot.unwrap_or_default();

        Readouts::format(&ReadoutContext {
            page: state.page,
            mode: state.mode(),
            estimate: &estimate,
            has_estimate: state.model.last_good().is_some(),
            snapshot: &snapshot,
            trip: &state.record.trip,
            counters: &state.record.counters,
            ticks_since_update: state.ticks_since_update,
            tick_period_ms: state.config.tick_period_ms,
        })
    }

    /// Read-only diagnostics view
    pub fn diagnostics(&self) -> DiagnosticsExport<'_, N> {
        export(&self.state)
    }

    /// Stream the diagnostics dump over `uart`
    pub fn send_diagnostics<U: UartTx>(
        &mut self,
        uart: &mut U,
    ) -> Result<usize, DiagnosticsError<U::Error>> {
        let export = export(&self.state);
        diagnostics::send_diagnostics(&export, self.store.eeprom(), uart)
    }

    /// Stop the engine and hand back the store
    pub fn into_store(self) -> E {
        self.store.into_inner()
    }
}

fn export<const N: usize>(state: &DeviceState<N>) -> DiagnosticsExport<'_, N> {
    DiagnosticsExport {
        counters: state.record.counters,
        session: state.record.session,
        trip: state.record.trip,
        health: state.health,
        ticks_since_update: state.ticks_since_update,
        log: &state.log,
    }
}
