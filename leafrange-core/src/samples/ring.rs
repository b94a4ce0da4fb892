//! Fixed-capacity sample ring
//!
//! Entries live in an inline array indexed by head/length, so the footprint
//! is fixed at compile time and each physical slot maps one-to-one onto a
//! slot of the persisted log region.

use crate::config::SampleLogConfig;

/// One chart observation
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SampleLogEntry {
    /// Session progress: km driven, or minutes on charge
    pub progress: f32,
    /// State of charge (%)
    pub charge_level_percent: f32,
}

impl SampleLogEntry {
    pub const fn new(progress: f32, charge_level_percent: f32) -> Self {
        Self {
            progress,
            charge_level_percent,
        }
    }
}

/// Result of an append
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AppendOutcome {
    /// Stored in a free slot
    Appended,
    /// Stored after evicting the oldest entry
    Evicted(SampleLogEntry),
    /// Within epsilon of the previous entry on both axes; dropped
    Redundant,
}

/// Bounded FIFO of session samples
#[derive(Debug, Clone)]
pub struct SampleLog<const N: usize> {
    config: SampleLogConfig,
    slots: [SampleLogEntry; N],
    /// Physical index of the oldest entry
    head: usize,
    len: usize,
    /// Entries appended since the last flush
    unflushed: usize,
}

impl<const N: usize> SampleLog<N> {
    /// Create an empty log
    pub const fn new(config: SampleLogConfig) -> Self {
        Self {
            config,
            slots: [SampleLogEntry::new(0.0, 0.0); N],
            head: 0,
            len: 0,
            unflushed: 0,
        }
    }

    /// Create an empty log whose oldest entry will sit in physical slot `head`
    ///
    /// Used when reloading from storage so slot positions stay aligned with
    /// the persisted region.
    pub fn with_head(config: SampleLogConfig, head: usize) -> Self {
        let mut log = Self::new(config);
        log.head = if N == 0 { 0 } else { head % N };
        log
    }

    /// Fixed capacity
    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Physical index of the oldest entry
    pub fn head(&self) -> usize {
        self.head
    }

    /// Newest entry
    pub fn last(&self) -> Option<SampleLogEntry> {
        self.len.checked_sub(1).and_then(|i| self.get(i))
    }

    /// Entry `index` positions after the oldest
    pub fn get(&self, index: usize) -> Option<SampleLogEntry> {
        (index < self.len).then(|| self.slots[self.physical(index)])
    }

    /// Entries oldest first
    pub fn iter(&self) -> impl Iterator<Item = SampleLogEntry> + '_ {
        (0..self.len).map(move |i| self.slots[self.physical(i)])
    }

    /// Append an entry unless it repeats the previous one
    pub fn append(&mut self, entry: SampleLogEntry) -> AppendOutcome {
        if N == 0 {
            return AppendOutcome::Redundant;
        }

        if let Some(previous) = self.last() {
            if self.is_redundant(&previous, &entry) {
                return AppendOutcome::Redundant;
            }
        }

        let outcome = if self.len == N {
            let oldest = self.slots[self.head];
            self.slots[self.head] = entry;
            self.head = (self.head + 1) % N;
            AppendOutcome::Evicted(oldest)
        } else {
            let index = self.physical(self.len);
            self.slots[index] = entry;
            self.len += 1;
            AppendOutcome::Appended
        };

        self.unflushed = (self.unflushed + 1).min(N);
        outcome
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
        self.unflushed = 0;
    }

    /// Put back an entry read from storage, bypassing the redundancy filter
    ///
    /// Returns `false` once the log is full.
    pub fn restore(&mut self, entry: SampleLogEntry) -> bool {
        if self.len == N {
            return false;
        }
        let index = self.physical(self.len);
        self.slots[index] = entry;
        self.len += 1;
        true
    }

    /// Number of entries appended since [`mark_flushed`](Self::mark_flushed)
    pub fn unflushed(&self) -> usize {
        self.unflushed
    }

    /// Physical slots written since the last flush, with their entries
    pub fn unflushed_slots(&self) -> impl Iterator<Item = (usize, SampleLogEntry)> + '_ {
        let first = self.len - self.unflushed.min(self.len);
        (first..self.len).map(move |i| {
            let index = self.physical(i);
            (index, self.slots[index])
        })
    }

    /// Record that everything appended so far is in storage
    pub fn mark_flushed(&mut self) {
        self.unflushed = 0;
    }

    fn physical(&self, index: usize) -> usize {
        (self.head + index) % N
    }

    fn is_redundant(&self, previous: &SampleLogEntry, entry: &SampleLogEntry) -> bool {
        within(
            previous.progress,
            entry.progress,
            self.config.min_progress_step,
        ) && within(
            previous.charge_level_percent,
            entry.charge_level_percent,
            self.config.min_charge_step_percent,
        )
    }
}

fn within(a: f32, b: f32, epsilon: f32) -> bool {
    let delta = a - b;
    delta < epsilon && delta > -epsilon
}
