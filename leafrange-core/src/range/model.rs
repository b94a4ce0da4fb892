//! Range model
//!
//! Efficiency is the peak km/kWh figure scaled by a banded temperature
//! factor: flat inside the comfortable band, falling linearly on either
//! side down to a floor. Energy per charge unit scales linearly with
//! measured battery health.

use crate::config::RangeModelConfig;
use crate::session::SessionState;
use crate::telemetry::TelemetrySnapshot;

/// Derived range figures for one tick
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RangeEstimate {
    /// Distance obtainable per charge unit at current conditions (km)
    pub efficiency_km_per_unit: f32,
    /// Distance the remaining charge should cover (km)
    pub estimated_range_km: f32,
    /// Range that charging to 100% would add (km)
    pub distance_to_full_km: f32,
    /// Range the session's starting charge was worth at current efficiency (km)
    pub session_start_range_km: f32,
}

/// Quality flags attached to an estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EstimateFlags {
    /// Inputs were implausible; value is the last good estimate
    pub stale: bool,
    /// No new telemetry this tick; value was not recomputed
    pub not_updated: bool,
    /// A derived value fell outside its valid range and was clamped
    pub clamped: bool,
}

impl EstimateFlags {
    /// True when the value is fresh and unclamped
    pub fn is_clean(&self) -> bool {
        !(self.stale || self.not_updated || self.clamped)
    }
}

/// Estimate plus its quality flags
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Estimate {
    pub range: RangeEstimate,
    pub flags: EstimateFlags,
}

/// Reasons the model refuses a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ModelFault {
    /// Battery health outside the plausible range
    HealthOutOfRange,
    /// Pack temperature outside the plausible range
    TemperatureOutOfRange,
}

/// Efficiency multiplier for a pack temperature, in [min_efficiency_factor, 1]
pub fn temperature_factor(config: &RangeModelConfig, temperature_c: f32) -> f32 {
    let factor = if temperature_c < config.comfort_low_c {
        1.0 - config.cold_loss_per_c * (config.comfort_low_c - temperature_c)
    } else if temperature_c > config.comfort_high_c {
        1.0 - config.hot_loss_per_c * (temperature_c - config.comfort_high_c)
    } else {
        1.0
    };

    factor.max(config.min_efficiency_factor)
}

/// Usable energy per charge unit for a given battery health (Wh)
pub fn wh_per_unit(config: &RangeModelConfig, health_percent: f32) -> f32 {
    config.nominal_wh_per_unit * health_percent / config.reference_health_percent
}

/// Distance per charge unit at the given conditions (km)
pub fn efficiency_km_per_unit(
    config: &RangeModelConfig,
    temperature_c: f32,
    health_percent: f32,
) -> f32 {
    let km_per_kwh = config.peak_km_per_kwh * temperature_factor(config, temperature_c);
    km_per_kwh * wh_per_unit(config, health_percent) / 1000.0
}

/// Compute a range estimate from a snapshot
///
/// Pure function of its inputs. Returns the estimate and whether any
/// derived value had to be clamped to its floor.
pub fn compute(
    config: &RangeModelConfig,
    snapshot: &TelemetrySnapshot,
    session: &SessionState,
) -> Result<(RangeEstimate, bool), ModelFault> {
    let health = snapshot.battery_health_percent;
    if !(health >= config.health_floor_percent && health <= config.health_ceiling_percent) {
        return Err(ModelFault::HealthOutOfRange);
    }

    let temperature = snapshot.pack_temperature_c;
    if !(temperature >= config.temperature_min_c && temperature <= config.temperature_max_c) {
        return Err(ModelFault::TemperatureOutOfRange);
    }

    let efficiency = efficiency_km_per_unit(config, temperature, health);
    let units_per_percent = config.full_charge_units / 100.0;
    let percent = snapshot.charge_percent();
    let start_percent = clamp_percent(session.session_start_charge_percent);

    let mut clamped = false;
    let mut floor = |value: f32| {
        if value >= 0.0 {
            value
        } else {
            clamped = true;
            0.0
        }
    };

    let estimate = RangeEstimate {
        efficiency_km_per_unit: floor(efficiency),
        estimated_range_km: floor(percent * units_per_percent * efficiency),
        distance_to_full_km: floor((100.0 - percent) * units_per_percent * efficiency),
        session_start_range_km: floor(start_percent * units_per_percent * efficiency),
    };

    Ok((estimate, clamped))
}

fn clamp_percent(percent: f32) -> f32 {
    if percent >= 0.0 {
        percent.min(100.0)
    } else {
        0.0
    }
}

/// Range model with last-known-good memory
///
/// Wraps [`compute`] so a faulty snapshot freezes the output at the last
/// good estimate instead of propagating.
#[derive(Debug, Clone)]
pub struct RangeModel {
    config: RangeModelConfig,
    last_good: Option<RangeEstimate>,
    current: Estimate,
}

impl RangeModel {
    /// Create a model with no estimate yet
    pub fn new(config: RangeModelConfig) -> Self {
        Self {
            config,
            last_good: None,
            current: Estimate::default(),
        }
    }

    /// Recompute from a fresh snapshot
    pub fn update(&mut self, snapshot: &TelemetrySnapshot, session: &SessionState) -> Estimate {
        self.current = match compute(&self.config, snapshot, session) {
            Ok((range, clamped)) => {
                if clamped {
                    warn!("range estimate clamped to floor");
                }
                self.last_good = Some(range);
                Estimate {
                    range,
                    flags: EstimateFlags {
                        clamped,
                        ..Default::default()
                    },
                }
            }
            Err(fault) => {
                warn!("sensor fault {:?}, holding last good estimate", fault);
                Estimate {
                    range: self.last_good.unwrap_or_default(),
                    flags: EstimateFlags {
                        stale: true,
                        ..Default::default()
                    },
                }
            }
        };
        self.current
    }

    /// Keep the previous estimate for a tick without new telemetry
    pub fn hold(&mut self) -> Estimate {
        self.current.flags.not_updated = true;
        self.current
    }

    /// Estimate produced by the most recent tick
    pub fn current(&self) -> Estimate {
        self.current
    }

    /// Last estimate computed from plausible inputs
    pub fn last_good(&self) -> Option<RangeEstimate> {
        self.last_good
    }
}
