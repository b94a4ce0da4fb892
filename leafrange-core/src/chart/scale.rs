//! X-axis span selection with hysteresis

use micromath::F32Ext;

use crate::config::ChartConfig;
use crate::range::RangeEstimate;
use crate::session::{Mode, SessionState};

/// Unit of the x axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AxisUnit {
    Kilometres,
    Minutes,
}

/// Committed x axis, spanning `[0, span]`
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Axis {
    pub mode: Mode,
    pub span: f32,
}

impl Axis {
    pub fn unit(&self) -> AxisUnit {
        match self.mode {
            Mode::Driving => AxisUnit::Kilometres,
            Mode::Charging => AxisUnit::Minutes,
        }
    }
}

/// Span the axis would ideally have this tick
///
/// Driving: distance already covered this session plus estimated range,
/// never less than the configured minimum. Charging: minutes elapsed plus
/// minutes still needed to reach full, rounded up to the grid and clamped.
pub fn target_span(
    config: &ChartConfig,
    session: &SessionState,
    estimate: &RangeEstimate,
    minutes_per_tick: f32,
) -> f32 {
    match session.mode {
        Mode::Driving => {
            let span = session.session_odometer_km + estimate.estimated_range_km;
            if span.is_finite() {
                span.max(config.min_driving_span_km)
            } else {
                config.min_driving_span_km
            }
        }
        Mode::Charging => {
            let elapsed = session.progress(minutes_per_tick);
            let remaining = estimate.distance_to_full_km / config.charge_rate_km_per_minute;
            let raw = elapsed + remaining;
            if !raw.is_finite() {
                return config.min_charging_span_minutes;
            }

            let grid = config.charging_grid_minutes;
            let rounded = (raw / grid).ceil() * grid;
            rounded
                .max(config.min_charging_span_minutes)
                .min(config.max_charging_span_minutes)
        }
    }
}

/// Holds the committed axis and decides when to move it
#[derive(Debug, Clone)]
pub struct AxisScaler {
    config: ChartConfig,
    committed: Option<Axis>,
}

impl AxisScaler {
    pub fn new(config: ChartConfig) -> Self {
        Self {
            config,
            committed: None,
        }
    }

    /// Offer a target span; returns the axis to draw with and whether it changed
    ///
    /// The first offer after a reset, or after the mode changed, always
    /// commits. Otherwise the span only moves when the target differs by
    /// more than the hysteresis fraction.
    pub fn update(&mut self, mode: Mode, target: f32) -> (Axis, bool) {
        let proposed = Axis { mode, span: target };

        let rescale = match self.committed {
            None => true,
            Some(axis) if axis.mode != mode => true,
            Some(axis) => {
                let delta = target - axis.span;
                let limit = axis.span * self.config.hysteresis_fraction;
                delta > limit || delta < -limit
            }
        };

        if rescale {
            debug!("chart axis {:?} span {}", mode, target);
            self.committed = Some(proposed);
        }

        (self.committed.unwrap_or(proposed), rescale)
    }

    /// Forget the committed axis; the next update always rescales
    pub fn reset(&mut self) {
        self.committed = None;
    }

    pub fn committed(&self) -> Option<Axis> {
        self.committed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driving(odometer: f32) -> SessionState {
        SessionState {
            mode: Mode::Driving,
            session_odometer_km: odometer,
            ..Default::default()
        }
    }

    fn estimate(range: f32, to_full: f32) -> RangeEstimate {
        RangeEstimate {
            estimated_range_km: range,
            distance_to_full_km: to_full,
            ..Default::default()
        }
    }

    #[test]
    fn test_driving_span_is_journey_plus_range() {
        let config = ChartConfig::default();
        let span = target_span(&config, &driving(30.0), &estimate(70.0, 50.0), 1.0);
        assert_eq!(span, 100.0);
    }

    #[test]
    fn test_driving_span_minimum() {
        let config = ChartConfig::default();
        let span = target_span(&config, &driving(0.0), &estimate(3.0, 100.0), 1.0);
        assert_eq!(span, config.min_driving_span_km);
    }

    #[test]
    fn test_charging_span_rounded_to_grid() {
        let config = ChartConfig::default();
        let session = SessionState {
            mode: Mode::Charging,
            session_ticks: 5,
            ..Default::default()
        };
        // 5 min elapsed + 44 km / 2 km/min = 27 min, rounded up to 30
        let span = target_span(&config, &session, &estimate(50.0, 44.0), 1.0);
        assert_eq!(span, 30.0);
    }

    #[test]
    fn test_charging_span_clamped() {
        let config = ChartConfig::default();
        let session = SessionState {
            mode: Mode::Charging,
            ..Default::default()
        };
        assert_eq!(
            target_span(&config, &session, &estimate(0.0, 400.0), 1.0),
            config.max_charging_span_minutes
        );
        assert_eq!(
            target_span(&config, &session, &estimate(140.0, 0.0), 1.0),
            config.min_charging_span_minutes
        );
    }

    #[test]
    fn test_first_update_commits() {
        let mut scaler = AxisScaler::new(ChartConfig::default());
        let (axis, rescaled) = scaler.update(Mode::Driving, 80.0);
        assert!(rescaled);
        assert_eq!(axis.span, 80.0);
        assert_eq!(axis.unit(), AxisUnit::Kilometres);
    }

    #[test]
    fn test_small_change_is_absorbed() {
        let mut scaler = AxisScaler::new(ChartConfig::default());
        scaler.update(Mode::Driving, 100.0);

        // 4 % below the committed span: inside the 5 % band
        let (axis, rescaled) = scaler.update(Mode::Driving, 96.0);
        assert!(!rescaled);
        assert_eq!(axis.span, 100.0);
    }

    #[test]
    fn test_large_change_rescales() {
        let mut scaler = AxisScaler::new(ChartConfig::default());
        scaler.update(Mode::Driving, 100.0);

        let (axis, rescaled) = scaler.update(Mode::Driving, 90.0);
        assert!(rescaled);
        assert_eq!(axis.span, 90.0);
    }

    #[test]
    fn test_oscillation_around_boundary_holds_steady() {
        let mut scaler = AxisScaler::new(ChartConfig::default());
        scaler.update(Mode::Driving, 100.0);

        let mut changes = 0;
        for i in 0..50 {
            let target = if i % 2 == 0 { 97.0 } else { 103.0 };
            if scaler.update(Mode::Driving, target).1 {
                changes += 1;
            }
        }
        assert_eq!(changes, 0);
    }

    #[test]
    fn test_mode_change_and_reset_force_rescale() {
        let mut scaler = AxisScaler::new(ChartConfig::default());
        scaler.update(Mode::Driving, 100.0);
        let (axis, rescaled) = scaler.update(Mode::Charging, 100.0);
        assert!(rescaled);
        assert_eq!(axis.unit(), AxisUnit::Minutes);

        scaler.reset();
        assert_eq!(scaler.committed(), None);
        assert!(scaler.update(Mode::Charging, 100.0).1);
    }
}
