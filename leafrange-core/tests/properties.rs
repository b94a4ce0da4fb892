//! Property tests for the range model, sample log and chart scaling

use leafrange_core::chart::{target_span, AxisScaler, ChartPoint, Axis};
use leafrange_core::config::{ChartConfig, RangeModelConfig, SampleLogConfig};
use leafrange_core::range::{compute, temperature_factor};
use leafrange_core::samples::{AppendOutcome, SampleLog, SampleLogEntry};
use leafrange_core::session::{Mode, SessionState};
use leafrange_core::telemetry::TelemetrySnapshot;
use proptest::prelude::*;

fn snapshot(percent: f32, temperature: f32, health: f32) -> TelemetrySnapshot {
    TelemetrySnapshot {
        charge_level_percent: percent,
        pack_temperature_c: temperature,
        battery_health_percent: health,
        ..Default::default()
    }
}

proptest! {
    #[test]
    fn range_non_decreasing_in_charge(
        a in 0.0f32..=100.0,
        b in 0.0f32..=100.0,
        temperature in -40.0f32..=80.0,
        health in 10.0f32..=110.0,
    ) {
        let config = RangeModelConfig::default();
        let session = SessionState::default();
        let (low, high) = if a <= b { (a, b) } else { (b, a) };

        let (at_low, _) = compute(&config, &snapshot(low, temperature, health), &session).unwrap();
        let (at_high, _) = compute(&config, &snapshot(high, temperature, health), &session).unwrap();

        prop_assert!(at_low.estimated_range_km <= at_high.estimated_range_km);
        prop_assert!(at_low.distance_to_full_km >= 0.0);
        prop_assert!(at_high.distance_to_full_km >= 0.0);
    }

    #[test]
    fn charge_outside_range_is_clamped(percent in -1000.0f32..1000.0) {
        let config = RangeModelConfig::default();
        let session = SessionState::default();
        let (estimate, _) = compute(&config, &snapshot(percent, 20.0, 100.0), &session).unwrap();
        let (full, _) = compute(&config, &snapshot(100.0, 20.0, 100.0), &session).unwrap();

        prop_assert!(estimate.estimated_range_km >= 0.0);
        prop_assert!(estimate.estimated_range_km <= full.estimated_range_km);
    }

    #[test]
    fn efficiency_maximal_inside_band(inside in 5.0f32..=35.0, outside in -40.0f32..=80.0) {
        let config = RangeModelConfig::default();
        prop_assert_eq!(temperature_factor(&config, inside), 1.0);
        prop_assert!(temperature_factor(&config, outside) <= 1.0);
    }

    #[test]
    fn efficiency_falls_away_from_band(offset in 0.5f32..20.0, step in 0.5f32..5.0) {
        // Slopes are steep enough that these ranges stay above the floor
        let config = RangeModelConfig::default();

        let cold = config.comfort_low_c - offset;
        let colder = cold - step;
        prop_assert!(temperature_factor(&config, colder) < temperature_factor(&config, cold));
        prop_assert!(temperature_factor(&config, cold) < 1.0);

        let hot = config.comfort_high_c + offset;
        let hotter = hot + step;
        prop_assert!(temperature_factor(&config, hotter) < temperature_factor(&config, hot));
        prop_assert!(temperature_factor(&config, hot) < 1.0);
    }

    #[test]
    fn log_bounded_and_fifo(steps in prop::collection::vec((0.0f32..5.0, 0.0f32..5.0), 0..200)) {
        let mut log = SampleLog::<16>::new(SampleLogConfig::default());
        let mut expected: std::collections::VecDeque<SampleLogEntry> = Default::default();
        let (mut progress, mut charge) = (0.0f32, 100.0f32);

        for (dp, dc) in steps {
            progress += dp;
            charge -= dc;
            let entry = SampleLogEntry::new(progress, charge);

            match log.append(entry) {
                AppendOutcome::Appended => expected.push_back(entry),
                AppendOutcome::Evicted(oldest) => {
                    prop_assert_eq!(expected.pop_front(), Some(oldest));
                    expected.push_back(entry);
                }
                AppendOutcome::Redundant => {}
            }

            prop_assert!(log.len() <= log.capacity());
            prop_assert!(log.iter().eq(expected.iter().copied()));
        }
    }

    #[test]
    fn chart_points_stay_in_unit_square(
        span in 0.1f32..1000.0,
        progress in -100.0f32..2000.0,
        charge in -50.0f32..150.0,
    ) {
        let axis = Axis { mode: Mode::Driving, span };
        let point = ChartPoint::map(&axis, progress, charge);
        prop_assert!((0.0..=1.0).contains(&point.x));
        prop_assert!((0.0..=1.0).contains(&point.y));
    }

    #[test]
    fn charging_span_within_limits(ticks in 0u32..100_000, to_full in 0.0f32..500.0) {
        let config = ChartConfig::default();
        let session = SessionState {
            mode: Mode::Charging,
            session_ticks: ticks,
            ..Default::default()
        };
        let estimate = leafrange_core::range::RangeEstimate {
            distance_to_full_km: to_full,
            ..Default::default()
        };

        let span = target_span(&config, &session, &estimate, 1.0 / 60.0);
        prop_assert!(span >= config.min_charging_span_minutes);
        prop_assert!(span <= config.max_charging_span_minutes);
    }

    #[test]
    fn axis_never_rescales_inside_band(base in 20.0f32..500.0, jitter in prop::collection::vec(-0.049f32..0.049, 1..50)) {
        let mut scaler = AxisScaler::new(ChartConfig::default());
        scaler.update(Mode::Driving, base);

        for j in jitter {
            let (axis, rescaled) = scaler.update(Mode::Driving, base * (1.0 + j));
            prop_assert!(!rescaled);
            prop_assert_eq!(axis.span, base);
        }
    }
}
