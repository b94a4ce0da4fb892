//! Raw charge-level glitch filter
//!
//! The battery controller occasionally reports a wild remaining-energy
//! counter for a single frame. A reading that jumps further than a tick can
//! plausibly move is held back until it repeats.

use crate::config::GlitchFilterConfig;

/// Outcome of checking a raw reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GlitchVerdict {
    /// Reading is plausible (or confirmed) and may be used
    Accepted,
    /// Reading looks like a glitch; treat this tick as stale
    Rejected,
}

/// Rejects single-frame jumps in the raw charge counter
#[derive(Debug, Clone)]
pub struct GlitchFilter {
    config: GlitchFilterConfig,
    /// Last accepted raw value
    last_accepted: Option<u16>,
    /// Out-of-band value being confirmed, with its repeat count
    candidate: Option<(u16, u8)>,
}

impl GlitchFilter {
    /// Create a filter that accepts its first reading unconditionally
    pub fn new(config: GlitchFilterConfig) -> Self {
        Self {
            config,
            last_accepted: None,
            candidate: None,
        }
    }

    /// Check a raw reading
    pub fn check(&mut self, raw: u16) -> GlitchVerdict {
        let Some(last) = self.last_accepted else {
            return self.accept(raw);
        };

        if raw.abs_diff(last) <= self.config.max_step_units {
            return self.accept(raw);
        }

        let seen = match self.candidate {
            Some((value, count)) if value == raw => count.saturating_add(1),
            _ => 1,
        };

        if seen >= self.config.confirm_ticks {
            debug!("charge step {} -> {} confirmed", last, raw);
            return self.accept(raw);
        }

        self.candidate = Some((raw, seen));
        GlitchVerdict::Rejected
    }

    /// Last accepted raw value
    pub fn last_accepted(&self) -> Option<u16> {
        self.last_accepted
    }

    fn accept(&mut self, raw: u16) -> GlitchVerdict {
        self.last_accepted = Some(raw);
        self.candidate = None;
        GlitchVerdict::Accepted
    }
}
