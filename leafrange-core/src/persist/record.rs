//! Persisted records
//!
//! A state slot holds `[len][postcard payload][crc32 LE]`, where the CRC
//! covers the length byte and the payload. An erased slot reads `0xFF` as
//! its length, which no valid record can have.

use serde::{Deserialize, Serialize};

use super::crc::crc32;
use super::layout::{LOG_HEADER_SIZE, LOG_SLOT_SIZE, STATE_SLOT_SIZE, STORE_VERSION};
use crate::samples::SampleLogEntry;
use crate::session::{SessionState, TripMeter};

/// Largest postcard payload a slot can carry
pub const MAX_PAYLOAD: usize = STATE_SLOT_SIZE - 1 - 4;

/// Salt mixed into each log entry check byte
const ENTRY_SALT: u8 = 0xA5;

/// Errors decoding a persisted record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RecordError {
    /// Slot was never written or has been invalidated
    Empty,
    /// Checksum mismatch
    Checksum,
    /// Payload is not a valid record
    Malformed,
    /// Record does not fit a slot
    TooLarge,
}

/// Counters that outlive sessions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PersistentCounters {
    /// Driving sessions started since the store was initialized
    pub lifetime_drive_sessions: u32,
    /// Charging sessions started since the store was initialized
    pub lifetime_charge_sessions: u32,
    /// Distance accumulated from odometer deltas (km)
    pub last_odometer_km: f32,
    /// Layout tag the counters were written under
    pub store_version_tag: u16,
}

impl PersistentCounters {
    /// Zeroed counters for the current layout
    pub const fn fresh() -> Self {
        Self {
            lifetime_drive_sessions: 0,
            lifetime_charge_sessions: 0,
            last_odometer_km: 0.0,
            store_version_tag: STORE_VERSION,
        }
    }
}

impl Default for PersistentCounters {
    fn default() -> Self {
        Self::fresh()
    }
}

/// Everything committed together in one state slot
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StateRecord {
    /// Commit number; the valid slot with the greatest sequence wins
    pub sequence: u32,
    pub counters: PersistentCounters,
    pub session: SessionState,
    pub trip: TripMeter,
    /// Sample log generation this record belongs to
    pub log_epoch: u32,
}

impl StateRecord {
    /// Encode into a slot image, returning the number of bytes used
    pub fn encode(&self, slot: &mut [u8; STATE_SLOT_SIZE]) -> Result<usize, RecordError> {
        let len = postcard::to_slice(self, &mut slot[1..1 + MAX_PAYLOAD])
            .map_err(|_| RecordError::TooLarge)?
            .len();
        slot[0] = len as u8;

        let crc = crc32(&slot[..1 + len]);
        slot[1 + len..5 + len].copy_from_slice(&crc.to_le_bytes());
        Ok(5 + len)
    }

    /// Decode a slot image
    pub fn decode(slot: &[u8; STATE_SLOT_SIZE]) -> Result<Self, RecordError> {
        let len = slot[0] as usize;
        if len == 0 || len > MAX_PAYLOAD {
            return Err(RecordError::Empty);
        }

        let mut stored = [0u8; 4];
        stored.copy_from_slice(&slot[1 + len..5 + len]);
        if crc32(&slot[..1 + len]) != u32::from_le_bytes(stored) {
            return Err(RecordError::Checksum);
        }

        postcard::from_bytes(&slot[1..1 + len]).map_err(|_| RecordError::Malformed)
    }
}

/// Position and generation of the persisted sample log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LogHeader {
    /// Must match [`StateRecord::log_epoch`] for the entries to be trusted
    pub epoch: u32,
    /// Physical slot of the oldest entry
    pub head: u16,
    /// Number of entries
    pub len: u16,
}

impl LogHeader {
    pub fn to_bytes(&self) -> [u8; LOG_HEADER_SIZE] {
        let mut bytes = [0u8; LOG_HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.epoch.to_le_bytes());
        bytes[4..6].copy_from_slice(&self.head.to_le_bytes());
        bytes[6..8].copy_from_slice(&self.len.to_le_bytes());
        let crc = crc32(&bytes[..8]);
        bytes[8..12].copy_from_slice(&crc.to_le_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8; LOG_HEADER_SIZE]) -> Result<Self, RecordError> {
        let crc = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
        if crc32(&bytes[..8]) != crc {
            return Err(RecordError::Checksum);
        }

        Ok(Self {
            epoch: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            head: u16::from_le_bytes([bytes[4], bytes[5]]),
            len: u16::from_le_bytes([bytes[6], bytes[7]]),
        })
    }
}

/// Encode a log entry in fixed point, tied to `epoch`
///
/// Progress is stored in tenths and charge in hundredths of a percent;
/// values outside the representable range saturate.
pub fn encode_entry(entry: &SampleLogEntry, epoch: u32) -> [u8; LOG_SLOT_SIZE] {
    let progress = (entry.progress * 10.0 + 0.5) as u16;
    let charge = (entry.charge_level_percent * 100.0 + 0.5) as u16;

    let mut bytes = [0u8; LOG_SLOT_SIZE];
    bytes[0..2].copy_from_slice(&progress.to_le_bytes());
    bytes[2..4].copy_from_slice(&charge.to_le_bytes());
    bytes[4] = entry_check(&bytes[..4], epoch);
    bytes
}

/// Decode a log entry written under `epoch`
pub fn decode_entry(bytes: &[u8; LOG_SLOT_SIZE], epoch: u32) -> Result<SampleLogEntry, RecordError> {
    if bytes[4] != entry_check(&bytes[..4], epoch) {
        return Err(RecordError::Checksum);
    }

    let progress = u16::from_le_bytes([bytes[0], bytes[1]]);
    let charge = u16::from_le_bytes([bytes[2], bytes[3]]);
    if charge > 10_000 {
        return Err(RecordError::Malformed);
    }

    Ok(SampleLogEntry::new(
        progress as f32 / 10.0,
        charge as f32 / 100.0,
    ))
}

fn entry_check(data: &[u8], epoch: u32) -> u8 {
    data.iter().fold(ENTRY_SALT ^ epoch as u8, |acc, &b| acc ^ b)
}
