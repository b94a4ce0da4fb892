//! Device state
//!
//! Everything the engine mutates lives in one struct that the tick
//! function takes by reference. The only other mutable resource is the
//! persistent store.

use crate::chart::{Axis, AxisScaler};
use crate::config::EngineConfig;
use crate::diagnostics::EngineHealth;
use crate::persist::{BootReason, Loaded, StateRecord};
use crate::range::RangeModel;
use crate::readout::DisplayPage;
use crate::samples::SampleLog;
use crate::session::{EventDetector, Mode};
use crate::telemetry::{GlitchFilter, TelemetrySnapshot};

use super::flush::FlushSchedule;

#[derive(Debug, Clone)]
pub struct DeviceState<const N: usize> {
    pub config: EngineConfig,
    /// Counters, session and trip as last committed plus in-RAM progress
    pub record: StateRecord,
    pub log: SampleLog<N>,
    pub model: RangeModel,
    pub detector: EventDetector,
    pub glitch: GlitchFilter,
    pub scaler: AxisScaler,
    pub flush: FlushSchedule,
    /// Most recent accepted snapshot
    pub snapshot: Option<TelemetrySnapshot>,
    /// Axis of the current chart
    pub axis: Axis,
    /// Axis changed on the latest tick
    pub rescaled: bool,
    pub page: DisplayPage,
    pub health: EngineHealth,
    /// Ticks since the last accepted snapshot
    pub ticks_since_update: u32,
    /// `record` differs from what was last committed
    pub dirty: bool,
    /// Session fields must be seeded from the first snapshot
    pub seed_pending: bool,
    pub boot_reason: BootReason,
}

impl<const N: usize> DeviceState<N> {
    /// Build the state from what was recovered at boot
    pub fn from_loaded(config: EngineConfig, loaded: Loaded<N>) -> Self {
        let restored = loaded.is_restored();
        let detector = if restored {
            EventDetector::restored(config.session)
        } else {
            EventDetector::unseeded(config.session)
        };

        let mode = loaded.record.session.mode;
        let span = match mode {
            Mode::Driving => config.chart.min_driving_span_km,
            Mode::Charging => config.chart.min_charging_span_minutes,
        };

        Self {
            config,
            record: loaded.record,
            log: loaded.log,
            model: RangeModel::new(config.model),
            detector,
            glitch: GlitchFilter::new(config.glitch),
            scaler: AxisScaler::new(config.chart),
            flush: FlushSchedule::new(config.flush),
            snapshot: None,
            axis: Axis { mode, span },
            rescaled: true,
            page: DisplayPage::default(),
            health: EngineHealth::default(),
            ticks_since_update: 0,
            dirty: false,
            seed_pending: !restored,
            boot_reason: loaded.reason,
        }
    }

    pub fn mode(&self) -> Mode {
        self.record.session.mode
    }
}
