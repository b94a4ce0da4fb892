//! Decoded telemetry values

/// Button gesture seen since the previous tick
///
/// Debouncing and press-length timing happen in the input layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ButtonEvent {
    #[default]
    None,
    Short,
    Long,
}

/// One refresh worth of decoded bus values
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TelemetrySnapshot {
    /// Raw remaining-energy counter reported by the battery controller
    pub charge_level_raw: u16,
    /// State of charge (%)
    pub charge_level_percent: f32,
    /// Battery pack temperature (°C)
    pub pack_temperature_c: f32,
    /// Pack capacity relative to factory capacity (%)
    pub battery_health_percent: f32,
    /// Distance travelled since the previous snapshot (km)
    pub odometer_delta_km: f32,
    /// Button gesture since the previous snapshot
    pub button: ButtonEvent,
}

impl TelemetrySnapshot {
    /// State of charge clamped to [0, 100]
    ///
    /// A non-finite reading counts as empty.
    pub fn charge_percent(&self) -> f32 {
        let percent = self.charge_level_percent;
        if percent >= 0.0 {
            percent.min(100.0)
        } else {
            0.0
        }
    }

    /// Odometer delta, with negative or non-finite readings treated as 0
    pub fn odometer_delta(&self) -> f32 {
        let delta = self.odometer_delta_km;
        if delta > 0.0 && delta.is_finite() {
            delta
        } else {
            0.0
        }
    }

    /// Same values with the one-shot fields cleared
    ///
    /// Used when a snapshot is reused on a tick without new bus data: the
    /// distance and the button press were already consumed.
    pub fn carried_over(&self) -> Self {
        Self {
            odometer_delta_km: 0.0,
            button: ButtonEvent::None,
            ..*self
        }
    }
}

/// Result of polling the telemetry source
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TelemetryReading {
    /// New values arrived since the last tick
    Fresh(TelemetrySnapshot),
    /// Bus capture had nothing new
    NoNewData,
}
