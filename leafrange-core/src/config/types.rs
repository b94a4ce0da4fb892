//! Configuration type definitions
//!
//! Defaults are tuned for a first-generation 24 kWh pack. A configuration
//! can be shipped as postcard-serialized binary data.

use serde::{Deserialize, Serialize};

/// Number of entries the persisted sample log can hold
pub const SAMPLE_LOG_CAPACITY: usize = 64;

/// Errors found while validating a configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Comfortable temperature band is empty or inverted
    EmptyComfortBand,
    /// An efficiency loss slope is negative
    NegativeSlope,
    /// Efficiency floor is not in (0, 1]
    InvalidEfficiencyFloor,
    /// A model constant that must be positive is not
    NonPositiveConstant,
    /// Sensor sanity limits are inverted, exclude the comfort band, or
    /// admit a negative battery health
    InvalidSensorLimits,
    /// Chart span limits are inconsistent
    InvalidChartLimits,
    /// Flush cadence would never flush
    InvalidFlushCadence,
    /// Tick period is zero
    ZeroTickPeriod,
}

/// Range model constants
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RangeModelConfig {
    /// Usable energy per charge unit of a pack at reference health (Wh)
    pub nominal_wh_per_unit: f32,
    /// Health at which `nominal_wh_per_unit` applies (%)
    pub reference_health_percent: f32,
    /// Charge units held by a full pack
    pub full_charge_units: f32,
    /// Driving efficiency inside the comfortable band (km/kWh)
    pub peak_km_per_kwh: f32,
    /// Lower edge of the comfortable pack temperature band (°C)
    pub comfort_low_c: f32,
    /// Upper edge of the comfortable pack temperature band (°C)
    pub comfort_high_c: f32,
    /// Fraction of efficiency lost per °C below the band
    pub cold_loss_per_c: f32,
    /// Fraction of efficiency lost per °C above the band
    pub hot_loss_per_c: f32,
    /// Efficiency factor never drops below this
    pub min_efficiency_factor: f32,
    /// Health below this is a sensor fault (%)
    pub health_floor_percent: f32,
    /// Health above this is a sensor fault (%)
    pub health_ceiling_percent: f32,
    /// Pack temperatures below this are a sensor fault (°C)
    pub temperature_min_c: f32,
    /// Pack temperatures above this are a sensor fault (°C)
    pub temperature_max_c: f32,
}

impl Default for RangeModelConfig {
    fn default() -> Self {
        Self {
            nominal_wh_per_unit: 80.0,
            reference_health_percent: 100.0,
            full_charge_units: 281.0,
            peak_km_per_kwh: 6.5,
            comfort_low_c: 5.0,
            comfort_high_c: 35.0,
            cold_loss_per_c: 0.015,
            hot_loss_per_c: 0.01,
            min_efficiency_factor: 0.25,
            health_floor_percent: 10.0,
            health_ceiling_percent: 110.0,
            temperature_min_c: -40.0,
            temperature_max_c: 80.0,
        }
    }
}

/// Session detection parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SessionConfig {
    /// Odometer delta above which the vehicle counts as moving (km)
    pub moving_threshold_km: f32,
    /// Raw charge increase that counts as a visible rise (units)
    pub charge_rise_units: u16,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            moving_threshold_km: 0.0,
            charge_rise_units: 1,
        }
    }
}

/// Sample log redundancy filter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SampleLogConfig {
    /// Progress change below which a sample is redundant (km or minutes)
    pub min_progress_step: f32,
    /// Charge change below which a sample is redundant (%)
    pub min_charge_step_percent: f32,
}

impl Default for SampleLogConfig {
    fn default() -> Self {
        Self {
            min_progress_step: 0.5,
            min_charge_step_percent: 0.5,
        }
    }
}

/// Chart scaling parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChartConfig {
    /// Smallest driving x-axis span (km)
    pub min_driving_span_km: f32,
    /// Relative span change needed before the axis is rescaled
    pub hysteresis_fraction: f32,
    /// Range added per minute on charge, for the charging axis (km/min)
    pub charge_rate_km_per_minute: f32,
    /// Smallest charging x-axis span (minutes)
    pub min_charging_span_minutes: f32,
    /// Largest charging x-axis span (minutes)
    pub max_charging_span_minutes: f32,
    /// Charging gridline spacing (minutes)
    pub charging_grid_minutes: f32,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            min_driving_span_km: 20.0,
            hysteresis_fraction: 0.05,
            charge_rate_km_per_minute: 2.0,
            min_charging_span_minutes: 10.0,
            max_charging_span_minutes: 50.0,
            charging_grid_minutes: 10.0,
        }
    }
}

/// Non-volatile flush cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FlushConfig {
    /// Flush at least this often while dirty (ticks)
    pub interval_ticks: u32,
    /// Flush once this many samples are waiting
    pub after_entries: u16,
}

impl Default for FlushConfig {
    fn default() -> Self {
        Self {
            interval_ticks: 60,
            after_entries: 4,
        }
    }
}

/// Raw charge-level glitch rejection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GlitchFilterConfig {
    /// Largest plausible change between two ticks (units)
    pub max_step_units: u16,
    /// Consecutive identical out-of-band readings that confirm a real step
    pub confirm_ticks: u8,
}

impl Default for GlitchFilterConfig {
    fn default() -> Self {
        Self {
            max_step_units: 10,
            confirm_ticks: 3,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EngineConfig {
    /// Range model constants
    pub model: RangeModelConfig,
    /// Session detection
    pub session: SessionConfig,
    /// Sample log filter
    pub log: SampleLogConfig,
    /// Chart scaling
    pub chart: ChartConfig,
    /// Flush cadence
    pub flush: FlushConfig,
    /// Glitch filter
    pub glitch: GlitchFilterConfig,
    /// Time between ticks (ms)
    pub tick_period_ms: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model: RangeModelConfig::default(),
            session: SessionConfig::default(),
            log: SampleLogConfig::default(),
            chart: ChartConfig::default(),
            flush: FlushConfig::default(),
            glitch: GlitchFilterConfig::default(),
            tick_period_ms: 1000,
        }
    }
}

impl EngineConfig {
    /// Check the configuration for values the engine cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let m = &self.model;

        if !(m.comfort_low_c < m.comfort_high_c) {
            return Err(ConfigError::EmptyComfortBand);
        }
        if !(m.cold_loss_per_c >= 0.0 && m.hot_loss_per_c >= 0.0) {
            return Err(ConfigError::NegativeSlope);
        }
        if !(m.min_efficiency_factor > 0.0 && m.min_efficiency_factor <= 1.0) {
            return Err(ConfigError::InvalidEfficiencyFloor);
        }
        if !(m.nominal_wh_per_unit > 0.0
            && m.reference_health_percent > 0.0
            && m.full_charge_units > 0.0
            && m.peak_km_per_kwh > 0.0)
        {
            return Err(ConfigError::NonPositiveConstant);
        }
        if !(m.temperature_min_c <= m.comfort_low_c
            && m.comfort_high_c <= m.temperature_max_c
            && m.health_floor_percent >= 0.0
            && m.health_floor_percent < m.health_ceiling_percent)
        {
            return Err(ConfigError::InvalidSensorLimits);
        }

        let c = &self.chart;
        if !(c.min_driving_span_km > 0.0
            && c.hysteresis_fraction >= 0.0
            && c.charge_rate_km_per_minute > 0.0
            && c.min_charging_span_minutes > 0.0
            && c.min_charging_span_minutes <= c.max_charging_span_minutes
            && c.charging_grid_minutes > 0.0)
        {
            return Err(ConfigError::InvalidChartLimits);
        }

        if self.flush.interval_ticks == 0 || self.flush.after_entries == 0 {
            return Err(ConfigError::InvalidFlushCadence);
        }
        if self.tick_period_ms == 0 {
            return Err(ConfigError::ZeroTickPeriod);
        }

        Ok(())
    }

    /// Minutes represented by one tick
    pub fn minutes_per_tick(&self) -> f32 {
        self.tick_period_ms as f32 / 60_000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use micromath::F32Ext;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(EngineConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_inverted_band_rejected() {
        let mut config = EngineConfig::default();
        config.model.comfort_low_c = 40.0;
        assert_eq!(config.validate(), Err(ConfigError::EmptyComfortBand));
    }

    #[test]
    fn test_nan_constant_rejected() {
        let mut config = EngineConfig::default();
        config.model.peak_km_per_kwh = f32::NAN;
        assert_eq!(config.validate(), Err(ConfigError::NonPositiveConstant));
    }

    #[test]
    fn test_sensor_limits_must_contain_band() {
        let mut config = EngineConfig::default();
        config.model.temperature_max_c = 30.0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidSensorLimits));
    }

    #[test]
    fn test_negative_health_floor_rejected() {
        let mut config = EngineConfig::default();
        config.model.health_floor_percent = -50.0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidSensorLimits));
    }

    #[test]
    fn test_zero_flush_cadence_rejected() {
        let mut config = EngineConfig::default();
        config.flush.after_entries = 0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidFlushCadence));
    }

    #[test]
    fn test_config_postcard_roundtrip() {
        let config = EngineConfig::default();
        let mut buf = [0u8; 256];
        let used = postcard::to_slice(&config, &mut buf).unwrap();
        let decoded: EngineConfig = postcard::from_bytes(used).unwrap();
        assert_eq!(decoded, config);
    }

    #[test]
    fn test_minutes_per_tick() {
        let config = EngineConfig::default();
        assert!((config.minutes_per_tick() - 1.0 / 60.0).abs() < 1e-6);
    }
}
