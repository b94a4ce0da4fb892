//! Session and trip bookkeeping

use serde::{Deserialize, Serialize};

use super::machine::Mode;
use crate::telemetry::TelemetrySnapshot;

/// Current session
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SessionState {
    /// Driving or Charging
    pub mode: Mode,
    /// Raw charge counter when the session began
    pub session_start_charge_level: u16,
    /// State of charge when the session began (%)
    pub session_start_charge_percent: f32,
    /// Distance driven in this session (km)
    pub session_odometer_km: f32,
    /// Raw charge counter at the previous tick
    pub last_charge_level_seen: u16,
    /// Ticks since the session began
    pub session_ticks: u32,
}

impl SessionState {
    /// Start a new session in `mode` from the current snapshot
    pub fn begin(&mut self, mode: Mode, snapshot: &TelemetrySnapshot) {
        *self = Self {
            mode,
            session_start_charge_level: snapshot.charge_level_raw,
            session_start_charge_percent: snapshot.charge_percent(),
            session_odometer_km: 0.0,
            last_charge_level_seen: snapshot.charge_level_raw,
            session_ticks: 0,
        };
    }

    /// Fold one tick into the current session
    pub fn advance(&mut self, snapshot: &TelemetrySnapshot) {
        self.last_charge_level_seen = snapshot.charge_level_raw;
        self.session_ticks = self.session_ticks.saturating_add(1);
        if self.mode.is_driving() {
            self.session_odometer_km += snapshot.odometer_delta();
        }
    }

    /// Position along the chart's x axis
    ///
    /// Kilometres driven for a driving session, minutes on charge for a
    /// charging session.
    pub fn progress(&self, minutes_per_tick: f32) -> f32 {
        match self.mode {
            Mode::Driving => self.session_odometer_km,
            Mode::Charging => self.session_ticks as f32 * minutes_per_tick,
        }
    }
}

/// Driver-resettable trip meter
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TripMeter {
    /// Distance since the last reset (km)
    pub distance_km: f32,
    /// State of charge at the last reset (%)
    pub start_charge_percent: Option<f32>,
}

impl TripMeter {
    /// Charge used below which efficiency is not reported (%)
    const MIN_USED_PERCENT: f32 = 1.0;

    /// Zero the trip at the current charge level
    pub fn reset(&mut self, charge_percent: f32) {
        self.distance_km = 0.0;
        self.start_charge_percent = Some(charge_percent);
    }

    /// Fold one tick into the trip
    pub fn advance(&mut self, snapshot: &TelemetrySnapshot) {
        self.distance_km += snapshot.odometer_delta();
        if self.start_charge_percent.is_none() {
            self.start_charge_percent = Some(snapshot.charge_percent());
        }
    }

    /// Charge used since the reset, 0 if the pack has been charged since (%)
    pub fn charge_used_percent(&self, charge_percent: f32) -> f32 {
        self.start_charge_percent
            .map(|start| (start - charge_percent).max(0.0))
            .unwrap_or(0.0)
    }

    /// Distance per percent of charge used, once enough charge has been used
    pub fn km_per_percent(&self, charge_percent: f32) -> Option<f32> {
        let used = self.charge_used_percent(charge_percent);
        (used >= Self::MIN_USED_PERCENT).then(|| self.distance_km / used)
    }
}
