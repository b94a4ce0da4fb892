//! Flush cadence
//!
//! State and samples are written at most every `interval_ticks`, or sooner
//! once `after_entries` samples are waiting. After a failed flush only the
//! interval applies, so a dead store is retried once per interval rather
//! than on every tick.

use crate::config::FlushConfig;
use crate::persist::PersistError;

/// Result of the flush step of a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlushOutcome {
    /// Nothing was due
    #[default]
    NotDue,
    /// State record committed and this many samples written
    Flushed { entries: usize },
    /// Write failed; retried at the next scheduled flush
    Failed(PersistError),
}

#[derive(Debug, Clone)]
pub struct FlushSchedule {
    config: FlushConfig,
    ticks_since_flush: u32,
    backoff: bool,
}

impl FlushSchedule {
    pub fn new(config: FlushConfig) -> Self {
        Self {
            config,
            ticks_since_flush: 0,
            backoff: false,
        }
    }

    /// Count a tick and report whether a flush is due
    pub fn due(&mut self, dirty: bool, pending_entries: usize) -> bool {
        if !dirty && pending_entries == 0 {
            self.ticks_since_flush = 0;
            return false;
        }

        self.ticks_since_flush = self.ticks_since_flush.saturating_add(1);
        if self.ticks_since_flush >= self.config.interval_ticks {
            return true;
        }

        !self.backoff && pending_entries >= self.config.after_entries as usize
    }

    pub fn flushed(&mut self) {
        self.ticks_since_flush = 0;
        self.backoff = false;
    }

    pub fn failed(&mut self) {
        self.ticks_since_flush = 0;
        self.backoff = true;
    }
}
