//! Mode and transition table

use serde::{Deserialize, Serialize};

use super::events::SessionEvent;

/// Session mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// Vehicle in use; chart plots charge against distance
    #[default]
    Driving,
    /// Pack charging; chart plots charge against minutes on charge
    Charging,
}

/// A session boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Transition {
    /// Driving → Charging
    StartCharging,
    /// Charging → Driving
    StartDriving,
    /// Charging → Charging after a charge seen across a power cycle
    RestartCharging,
}

impl Transition {
    /// Mode the vehicle is in after this transition
    pub fn target(self) -> Mode {
        match self {
            Transition::StartCharging | Transition::RestartCharging => Mode::Charging,
            Transition::StartDriving => Mode::Driving,
        }
    }

    /// Whether this transition begins a new charge session
    pub fn is_charge_session(self) -> bool {
        self.target() == Mode::Charging
    }
}

impl Mode {
    /// Look up the session boundary an event causes, if any
    ///
    /// `None` means the event is absorbed by the current session.
    pub fn transition(self, event: SessionEvent) -> Option<Transition> {
        use Mode::*;
        use SessionEvent::*;

        match (self, event) {
            (Driving, ChargeRising) => Some(Transition::StartCharging),
            (Driving, ChargedWhileOff) => Some(Transition::StartCharging),
            (Charging, VehicleMoving) => Some(Transition::StartDriving),
            (Charging, ChargedWhileOff) => Some(Transition::RestartCharging),

            // Regen and parked jitter stay in the current session
            _ => None,
        }
    }

    /// Check if this is a driving session
    pub fn is_driving(self) -> bool {
        matches!(self, Mode::Driving)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driving_to_charging() {
        assert_eq!(
            Mode::Driving.transition(SessionEvent::ChargeRising),
            Some(Transition::StartCharging)
        );
    }

    #[test]
    fn test_charging_to_driving() {
        assert_eq!(
            Mode::Charging.transition(SessionEvent::VehicleMoving),
            Some(Transition::StartDriving)
        );
    }

    #[test]
    fn test_rising_charge_while_charging_is_absorbed() {
        assert_eq!(Mode::Charging.transition(SessionEvent::ChargeRising), None);
    }

    #[test]
    fn test_charge_while_off_restarts_charging() {
        assert_eq!(
            Mode::Charging.transition(SessionEvent::ChargedWhileOff),
            Some(Transition::RestartCharging)
        );
        assert_eq!(
            Mode::Driving.transition(SessionEvent::ChargedWhileOff),
            Some(Transition::StartCharging)
        );
    }

    #[test]
    fn test_steady_never_transitions() {
        for mode in [Mode::Driving, Mode::Charging] {
            assert_eq!(mode.transition(SessionEvent::Steady), None);
        }
        assert_eq!(Mode::Driving.transition(SessionEvent::VehicleMoving), None);
    }

    #[test]
    fn test_transitions_alternate() {
        let mut mode = Mode::Driving;
        for event in [
            SessionEvent::ChargeRising,
            SessionEvent::VehicleMoving,
            SessionEvent::ChargeRising,
        ] {
            let transition = mode.transition(event).unwrap();
            assert_ne!(transition.target(), mode);
            mode = transition.target();
        }
        assert_eq!(mode, Mode::Charging);
    }
}
