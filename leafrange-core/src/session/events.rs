//! Events detected from consecutive snapshots

use crate::config::SessionConfig;
use crate::telemetry::TelemetrySnapshot;

use super::state::SessionState;

/// What a snapshot says about the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionEvent {
    /// Nothing that could end the session
    Steady,
    /// Charge rose since the previous tick while stationary
    ChargeRising,
    /// Odometer advanced
    VehicleMoving,
    /// First tick after boot shows more charge than was stored at shutdown
    ChargedWhileOff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BootCheck {
    /// Compare the first snapshot against the restored session
    Compare,
    /// Restored session is blank; first snapshot only seeds it
    Seed,
    Done,
}

/// Turns snapshots into [`SessionEvent`]s
///
/// The first snapshot after boot is compared against the persisted
/// `last_charge_level_seen` exactly as two consecutive ticks would be, so a
/// charge taken while the device was powered off is still noticed.
#[derive(Debug, Clone)]
pub struct EventDetector {
    config: SessionConfig,
    boot: BootCheck,
}

impl EventDetector {
    /// Detector for a session restored from storage
    pub fn restored(config: SessionConfig) -> Self {
        Self {
            config,
            boot: BootCheck::Compare,
        }
    }

    /// Detector for a freshly initialized session with no reference charge
    pub fn unseeded(config: SessionConfig) -> Self {
        Self {
            config,
            boot: BootCheck::Seed,
        }
    }

    /// Classify a snapshot against the current session
    pub fn detect(&mut self, session: &SessionState, snapshot: &TelemetrySnapshot) -> SessionEvent {
        let boot = core::mem::replace(&mut self.boot, BootCheck::Done);
        let moving = snapshot.odometer_delta() > self.config.moving_threshold_km;
        let rising = self.is_rise(session.last_charge_level_seen, snapshot.charge_level_raw);

        match boot {
            BootCheck::Compare if rising => SessionEvent::ChargedWhileOff,
            BootCheck::Seed if !moving => SessionEvent::Steady,
            _ if moving => SessionEvent::VehicleMoving,
            _ if rising => SessionEvent::ChargeRising,
            _ => SessionEvent::Steady,
        }
    }

    fn is_rise(&self, previous: u16, current: u16) -> bool {
        current > previous && current - previous >= self.config.charge_rise_units.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(raw: u16, delta_km: f32) -> TelemetrySnapshot {
        TelemetrySnapshot {
            charge_level_raw: raw,
            odometer_delta_km: delta_km,
            ..Default::default()
        }
    }

    fn session(last_seen: u16) -> SessionState {
        SessionState {
            last_charge_level_seen: last_seen,
            ..Default::default()
        }
    }

    #[test]
    fn test_rise_while_stationary() {
        let mut detector = EventDetector::restored(SessionConfig::default());
        detector.detect(&session(100), &snapshot(100, 0.0));
        assert_eq!(
            detector.detect(&session(100), &snapshot(101, 0.0)),
            SessionEvent::ChargeRising
        );
    }

    #[test]
    fn test_rise_while_moving_is_movement() {
        let mut detector = EventDetector::restored(SessionConfig::default());
        detector.detect(&session(100), &snapshot(100, 0.0));
        assert_eq!(
            detector.detect(&session(100), &snapshot(102, 0.3)),
            SessionEvent::VehicleMoving
        );
    }

    #[test]
    fn test_falling_charge_is_steady() {
        let mut detector = EventDetector::restored(SessionConfig::default());
        detector.detect(&session(100), &snapshot(100, 0.0));
        assert_eq!(
            detector.detect(&session(100), &snapshot(99, 0.0)),
            SessionEvent::Steady
        );
    }

    #[test]
    fn test_charge_while_off_detected_once() {
        let mut detector = EventDetector::restored(SessionConfig::default());
        assert_eq!(
            detector.detect(&session(90), &snapshot(200, 0.0)),
            SessionEvent::ChargedWhileOff
        );
        assert_eq!(
            detector.detect(&session(200), &snapshot(201, 0.0)),
            SessionEvent::ChargeRising
        );
    }

    #[test]
    fn test_unseeded_first_tick_is_steady() {
        let mut detector = EventDetector::unseeded(SessionConfig::default());
        assert_eq!(
            detector.detect(&session(0), &snapshot(150, 0.0)),
            SessionEvent::Steady
        );
    }

    #[test]
    fn test_rise_threshold() {
        let config = SessionConfig {
            charge_rise_units: 3,
            ..Default::default()
        };
        let mut detector = EventDetector::restored(config);
        detector.detect(&session(100), &snapshot(100, 0.0));
        assert_eq!(
            detector.detect(&session(100), &snapshot(102, 0.0)),
            SessionEvent::Steady
        );
        assert_eq!(
            detector.detect(&session(100), &snapshot(103, 0.0)),
            SessionEvent::ChargeRising
        );
    }
}
