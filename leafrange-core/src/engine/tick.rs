//! The periodic tick
//!
//! Runs telemetry, button, session, model, log, flush and chart steps in
//! that order. Never fails: every fault is absorbed into flags and health
//! counters so a frame can always be drawn.

use leafrange_hal::Eeprom;

use crate::chart::target_span;
use crate::persist::{LogHeader, PersistError, PersistentStore};
use crate::range::Estimate;
use crate::samples::{AppendOutcome, SampleLogEntry};
use crate::session::{SessionEvent, Transition};
use crate::telemetry::{ButtonEvent, GlitchVerdict, TelemetryReading, TelemetrySnapshot};

use super::flush::FlushOutcome;
use super::state::DeviceState;

/// What happened during one tick
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TickSummary {
    /// A new snapshot was accepted this tick
    pub fresh: bool,
    pub event: SessionEvent,
    pub transition: Option<Transition>,
    pub estimate: Estimate,
    /// Log append result, `None` when no sample was offered
    pub appended: Option<AppendOutcome>,
    pub flush: FlushOutcome,
    /// Chart axis changed
    pub rescaled: bool,
}

/// Advance the device by one tick
pub fn tick<E: Eeprom, const N: usize>(
    state: &mut DeviceState<N>,
    store: &mut PersistentStore<E>,
    reading: TelemetryReading,
) -> TickSummary {
    let accepted = accept(state, reading);
    let fresh = accepted.is_some();

    let snapshot = match accepted.or_else(|| state.snapshot.map(|s| s.carried_over())) {
        Some(snapshot) => snapshot,
        None => {
            // Nothing received since boot; keep drawing the empty chart
            let estimate = state.model.hold();
            refresh_axis(state, &estimate);
            return TickSummary {
                fresh: false,
                event: SessionEvent::Steady,
                transition: None,
                estimate,
                appended: None,
                flush: FlushOutcome::NotDue,
                rescaled: state.rescaled,
            };
        }
    };
    if fresh {
        state.snapshot = Some(snapshot);
    }

    handle_button(state, &snapshot);

    if state.seed_pending {
        let mode = state.record.session.mode;
        state.record.session.begin(mode, &snapshot);
        state.seed_pending = false;
    }

    let event = state.detector.detect(&state.record.session, &snapshot);
    let transition = state.record.session.mode.transition(event);
    if let Some(transition) = transition {
        apply_transition(state, store, transition, &snapshot);
    }

    let changed = snapshot.odometer_delta() != 0.0
        || snapshot.charge_level_raw != state.record.session.last_charge_level_seen
        || state.record.trip.start_charge_percent.is_none();
    state.record.session.advance(&snapshot);
    state.record.trip.advance(&snapshot);
    state.record.counters.last_odometer_km += snapshot.odometer_delta();
    if changed {
        state.dirty = true;
    }

    let estimate = if fresh {
        let estimate = state.model.update(&snapshot, &state.record.session);
        if estimate.flags.stale {
            state.health.sensor_faults = state.health.sensor_faults.saturating_add(1);
        }
        if estimate.flags.clamped {
            state.health.clamped_estimates = state.health.clamped_estimates.saturating_add(1);
        }
        estimate
    } else {
        state.model.hold()
    };

    let appended = fresh.then(|| {
        let minutes_per_tick = state.config.minutes_per_tick();
        state.log.append(SampleLogEntry::new(
            state.record.session.progress(minutes_per_tick),
            snapshot.charge_percent(),
        ))
    });

    let flush = if state.flush.due(state.dirty, state.log.unflushed()) {
        flush(state, store)
    } else {
        FlushOutcome::NotDue
    };

    refresh_axis(state, &estimate);

    TickSummary {
        fresh,
        event,
        transition,
        estimate,
        appended,
        flush,
        rescaled: state.rescaled,
    }
}

/// Commit the state record, then write pending samples
pub fn flush<E: Eeprom, const N: usize>(
    state: &mut DeviceState<N>,
    store: &mut PersistentStore<E>,
) -> FlushOutcome {
    let result = store
        .commit(&mut state.record)
        .and_then(|()| store.flush_log(&mut state.log, state.record.log_epoch));

    match result {
        Ok(entries) => {
            state.dirty = false;
            state.flush.flushed();
            debug!("flushed record {}, {} samples", state.record.sequence, entries);
            FlushOutcome::Flushed { entries }
        }
        Err(e) => {
            storage_failure(state, e);
            state.flush.failed();
            FlushOutcome::Failed(e)
        }
    }
}

/// Run a reading through the glitch filter
fn accept<const N: usize>(
    state: &mut DeviceState<N>,
    reading: TelemetryReading,
) -> Option<TelemetrySnapshot> {
    let accepted = match reading {
        TelemetryReading::Fresh(snapshot) => match state.glitch.check(snapshot.charge_level_raw) {
            GlitchVerdict::Accepted => Some(snapshot),
            GlitchVerdict::Rejected => {
                debug!("raw charge {} held back", snapshot.charge_level_raw);
                state.health.glitches_rejected = state.health.glitches_rejected.saturating_add(1);
                None
            }
        },
        TelemetryReading::NoNewData => None,
    };

    if accepted.is_some() {
        state.ticks_since_update = 0;
    } else {
        state.ticks_since_update = state.ticks_since_update.saturating_add(1);
        state.health.stale_ticks = state.health.stale_ticks.saturating_add(1);
    }
    accepted
}

fn handle_button<const N: usize>(state: &mut DeviceState<N>, snapshot: &TelemetrySnapshot) {
    match snapshot.button {
        ButtonEvent::None => {}
        ButtonEvent::Short => {
            state.page = state.page.next();
            debug!("page {:?}", state.page);
        }
        ButtonEvent::Long => {
            state.record.trip.reset(snapshot.charge_percent());
            state.dirty = true;
            info!("trip reset");
        }
    }
}

/// Start a new session
///
/// The record carrying the new mode, counters and log epoch is committed
/// before the log and chart are touched. The stored log header only moves
/// to the new epoch once that commit has landed.
fn apply_transition<E: Eeprom, const N: usize>(
    state: &mut DeviceState<N>,
    store: &mut PersistentStore<E>,
    transition: Transition,
    snapshot: &TelemetrySnapshot,
) {
    let record = &mut state.record;
    let counters = &mut record.counters;
    if transition.is_charge_session() {
        counters.lifetime_charge_sessions = counters.lifetime_charge_sessions.wrapping_add(1);
    } else {
        counters.lifetime_drive_sessions = counters.lifetime_drive_sessions.wrapping_add(1);
    }
    record.session.begin(transition.target(), snapshot);
    record.log_epoch = record.log_epoch.wrapping_add(1);

    info!(
        "{:?}: drive {} charge {}",
        transition, counters.lifetime_drive_sessions, counters.lifetime_charge_sessions
    );

    let committed = store.commit(record);
    state.log.clear();

    match committed {
        Ok(()) => {
            let header = LogHeader {
                epoch: state.record.log_epoch,
                head: 0,
                len: 0,
            };
            if let Err(e) = store.write_log_header(&header) {
                storage_failure(state, e);
            }
        }
        Err(e) => {
            // The old record and header stay a matching pair until the next
            // flush commits this session
            storage_failure(state, e);
            state.dirty = true;
        }
    }

    state.scaler.reset();
}

fn storage_failure<const N: usize>(state: &mut DeviceState<N>, error: PersistError) {
    warn!("store write failed: {:?}", error);
    state.health.storage_failures = state.health.storage_failures.saturating_add(1);
    state.health.last_store_error = Some(error);
}

fn refresh_axis<const N: usize>(state: &mut DeviceState<N>, estimate: &Estimate) {
    let target = target_span(
        &state.config.chart,
        &state.record.session,
        &estimate.range,
        state.config.minutes_per_tick(),
    );
    let (axis, rescaled) = state.scaler.update(state.record.session.mode, target);
    state.axis = axis;
    state.rescaled = rescaled;
}
