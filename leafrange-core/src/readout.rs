//! Text readouts for the display
//!
//! Every value is formatted into a fixed-capacity string; a value too long
//! for its field is truncated rather than failing the tick.

use core::fmt::Write;

use heapless::String;

use crate::persist::PersistentCounters;
use crate::range::Estimate;
use crate::session::{Mode, TripMeter};
use crate::telemetry::TelemetrySnapshot;

/// Capacity of each readout field
pub const FIELD_LEN: usize = 12;

/// One formatted readout
pub type Field = String<FIELD_LEN>;

/// Page selected with the cluster button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DisplayPage {
    /// Session chart with range and charge
    #[default]
    Chart,
    /// Trip distance and efficiency
    Trip,
    /// Pack figures and lifetime counters
    Diagnostics,
}

impl DisplayPage {
    /// Page shown after a short press
    pub fn next(self) -> Self {
        match self {
            DisplayPage::Chart => DisplayPage::Trip,
            DisplayPage::Trip => DisplayPage::Diagnostics,
            DisplayPage::Diagnostics => DisplayPage::Chart,
        }
    }
}

/// Inputs the readouts are formatted from
#[derive(Debug, Clone, Copy)]
pub struct ReadoutContext<'a> {
    pub page: DisplayPage,
    pub mode: Mode,
    pub estimate: &'a Estimate,
    /// False until the model has produced one estimate from plausible inputs
    pub has_estimate: bool,
    pub snapshot: &'a TelemetrySnapshot,
    pub trip: &'a TripMeter,
    pub counters: &'a PersistentCounters,
    /// Ticks since the last fresh telemetry
    pub ticks_since_update: u32,
    pub tick_period_ms: u32,
}

/// Formatted readouts for one tick
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Readouts {
    pub page: DisplayPage,
    /// Estimated range, e.g. `123km`
    pub range: Field,
    /// Range still to gain by charging to full, e.g. `+45km`
    pub to_full: Field,
    /// State of charge, e.g. `45.5%`
    pub charge: Field,
    /// Pack temperature, e.g. `12C`
    pub temperature: Field,
    /// Battery health, e.g. `85%`
    pub health: Field,
    /// Trip distance, e.g. `12.3km`
    pub trip_distance: Field,
    /// Trip efficiency, e.g. `1.2km/%`
    pub trip_efficiency: Field,
    /// Lifetime session counts, e.g. `D12 C9`
    pub sessions: Field,
    /// Empty when fresh, `ERR` on a sensor fault, else the data age (`5s`)
    pub status: Field,
}

impl Readouts {
    pub fn format(ctx: &ReadoutContext<'_>) -> Self {
        let range = &ctx.estimate.range;
        let charge = ctx.snapshot.charge_percent();
        let mut out = Readouts {
            page: ctx.page,
            ..Default::default()
        };

        if ctx.has_estimate {
            let _ = write!(out.range, "{:.0}km", range.estimated_range_km);
            let _ = write!(out.to_full, "+{:.0}km", range.distance_to_full_km);
        } else {
            let _ = out.range.push_str("--km");
            let _ = out.to_full.push_str("+--km");
        }

        let _ = write!(out.charge, "{:.1}%", charge);
        let _ = write!(out.temperature, "{:.0}C", ctx.snapshot.pack_temperature_c);
        let _ = write!(out.health, "{:.0}%", ctx.snapshot.battery_health_percent);
        let _ = write!(out.trip_distance, "{:.1}km", ctx.trip.distance_km);

        match ctx.trip.km_per_percent(charge) {
            Some(efficiency) => {
                let _ = write!(out.trip_efficiency, "{:.1}km/%", efficiency);
            }
            None => {
                let _ = out.trip_efficiency.push_str("--km/%");
            }
        }

        let _ = write!(
            out.sessions,
            "D{} C{}",
            ctx.counters.lifetime_drive_sessions, ctx.counters.lifetime_charge_sessions
        );

        if ctx.estimate.flags.stale {
            let _ = out.status.push_str("ERR");
        } else if ctx.ticks_since_update > 0 {
            let seconds = ctx.ticks_since_update as u64 * ctx.tick_period_ms as u64 / 1000;
            let _ = write!(out.status, "{}s", seconds);
        }

        if ctx.mode == Mode::Charging && out.status.is_empty() {
            let _ = out.status.push_str("CHG");
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::{EstimateFlags, RangeEstimate};

    struct Fixture {
        estimate: Estimate,
        snapshot: TelemetrySnapshot,
        trip: TripMeter,
        counters: PersistentCounters,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                estimate: Estimate {
                    range: RangeEstimate {
                        estimated_range_km: 73.2,
                        distance_to_full_km: 44.9,
                        ..Default::default()
                    },
                    flags: EstimateFlags::default(),
                },
                snapshot: TelemetrySnapshot {
                    charge_level_percent: 45.5,
                    pack_temperature_c: 12.0,
                    battery_health_percent: 85.0,
                    ..Default::default()
                },
                trip: TripMeter {
                    distance_km: 12.34,
                    start_charge_percent: Some(55.5),
                },
                counters: PersistentCounters {
                    lifetime_drive_sessions: 12,
                    lifetime_charge_sessions: 9,
                    ..PersistentCounters::fresh()
                },
            }
        }

        fn context(&self) -> ReadoutContext<'_> {
            ReadoutContext {
                page: DisplayPage::Chart,
                mode: Mode::Driving,
                estimate: &self.estimate,
                has_estimate: true,
                snapshot: &self.snapshot,
                trip: &self.trip,
                counters: &self.counters,
                ticks_since_update: 0,
                tick_period_ms: 1000,
            }
        }
    }

    #[test]
    fn test_fresh_readouts() {
        let fixture = Fixture::new();
        let out = Readouts::format(&fixture.context());

        assert_eq!(out.range.as_str(), "73km");
        assert_eq!(out.to_full.as_str(), "+45km");
        assert_eq!(out.charge.as_str(), "45.5%");
        assert_eq!(out.temperature.as_str(), "12C");
        assert_eq!(out.health.as_str(), "85%");
        assert_eq!(out.trip_distance.as_str(), "12.3km");
        assert_eq!(out.trip_efficiency.as_str(), "1.2km/%");
        assert_eq!(out.sessions.as_str(), "D12 C9");
        assert_eq!(out.status.as_str(), "");
    }

    #[test]
    fn test_no_estimate_yet() {
        let fixture = Fixture::new();
        let mut ctx = fixture.context();
        ctx.has_estimate = false;

        let out = Readouts::format(&ctx);
        assert_eq!(out.range.as_str(), "--km");
    }

    #[test]
    fn test_stale_data_shows_age() {
        let fixture = Fixture::new();
        let mut ctx = fixture.context();
        ctx.ticks_since_update = 5;

        assert_eq!(Readouts::format(&ctx).status.as_str(), "5s");
    }

    #[test]
    fn test_sensor_fault_flagged() {
        let mut fixture = Fixture::new();
        fixture.estimate.flags.stale = true;

        let out = Readouts::format(&fixture.context());
        assert_eq!(out.status.as_str(), "ERR");
        // Last good value stays on screen
        assert_eq!(out.range.as_str(), "73km");
    }

    #[test]
    fn test_trip_efficiency_needs_charge_used() {
        let mut fixture = Fixture::new();
        fixture.trip.start_charge_percent = Some(46.0);

        let out = Readouts::format(&fixture.context());
        assert_eq!(out.trip_efficiency.as_str(), "--km/%");
    }

    #[test]
    fn test_charging_status() {
        let fixture = Fixture::new();
        let mut ctx = fixture.context();
        ctx.mode = Mode::Charging;
        assert_eq!(Readouts::format(&ctx).status.as_str(), "CHG");
    }

    #[test]
    fn test_page_cycle() {
        let page = DisplayPage::default();
        assert_eq!(page, DisplayPage::Chart);
        assert_eq!(page.next().next().next(), DisplayPage::Chart);
    }
}
