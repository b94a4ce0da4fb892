//! Persistent store
//!
//! Write ordering is what makes a session transition atomic:
//!
//! 1. The new [`StateRecord`] (mode, counters, bumped `log_epoch`) goes to
//!    the inactive slot. Until its CRC lands the old slot stays in charge.
//! 2. The log header is rewritten for the new epoch. A header left over
//!    from the previous epoch no longer matches and loads as an empty log.
//!
//! Reinitialization invalidates both slots and writes the version tag
//! last, so an interrupted reinitialization simply runs again.

use leafrange_hal::{Eeprom, StoreError};

use super::layout::{
    self, StateSlot, LOG_HEADER_ADDR, LOG_HEADER_SIZE, LOG_SLOT_SIZE, STATE_SLOT_SIZE,
    STORE_VERSION, VERSION_ADDR,
};
use super::record::{decode_entry, encode_entry, LogHeader, RecordError, StateRecord};
use crate::config::SampleLogConfig;
use crate::samples::SampleLog;

/// Errors from the persistence layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PersistError {
    /// Underlying device failed
    Store(StoreError),
    /// Record could not be encoded
    Record(RecordError),
    /// Device is smaller than the layout needs
    TooSmall,
}

impl From<StoreError> for PersistError {
    fn from(e: StoreError) -> Self {
        PersistError::Store(e)
    }
}

impl From<RecordError> for PersistError {
    fn from(e: RecordError) -> Self {
        PersistError::Record(e)
    }
}

/// Why the store was reinitialized at boot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BootReason {
    /// Version tag matched and a valid record was found
    Restored,
    /// Version tag missing or from another layout
    VersionMismatch,
    /// Version tag matched but neither slot held a valid record
    NoValidRecord,
    /// The device could not be read
    Unreadable,
}

/// State recovered at boot
#[derive(Debug, Clone)]
pub struct Loaded<const N: usize> {
    pub record: StateRecord,
    pub log: SampleLog<N>,
    pub reason: BootReason,
}

impl<const N: usize> Loaded<N> {
    /// True when the record came from storage rather than reinitialization
    pub fn is_restored(&self) -> bool {
        self.reason == BootReason::Restored
    }
}

/// Owns the non-volatile device and the slot bookkeeping
#[derive(Debug)]
pub struct PersistentStore<E> {
    eeprom: E,
    /// Slot holding the newest valid record
    active: Option<StateSlot>,
    /// Sequence number of the newest committed record
    sequence: u32,
}

impl<E: Eeprom> PersistentStore<E> {
    pub fn new(eeprom: E) -> Self {
        Self {
            eeprom,
            active: None,
            sequence: 0,
        }
    }

    /// Underlying device
    pub fn eeprom(&mut self) -> &mut E {
        &mut self.eeprom
    }

    /// Release the underlying device
    pub fn into_inner(self) -> E {
        self.eeprom
    }

    /// Recover state, reinitializing the store when nothing usable is found
    ///
    /// Never fails: if the device cannot be read or written the engine
    /// starts from fresh state in RAM and later flushes retry.
    pub fn load<const N: usize>(&mut self, config: SampleLogConfig) -> Loaded<N> {
        if self.eeprom.capacity() < layout::required_capacity(N) {
            warn!(
                "store holds {} bytes, layout needs {}",
                self.eeprom.capacity(),
                layout::required_capacity(N)
            );
            return self.fresh(config, BootReason::Unreadable);
        }

        let reason = match self.read_version() {
            Ok(STORE_VERSION) => match self.find_active() {
                Ok(Some((slot, record))) => {
                    self.active = Some(slot);
                    self.sequence = record.sequence;
                    let log = self.load_log(config, record.log_epoch);
                    info!(
                        "restored record {} from slot {:?}, {} samples",
                        record.sequence,
                        slot,
                        log.len()
                    );
                    return Loaded {
                        record,
                        log,
                        reason: BootReason::Restored,
                    };
                }
                Ok(None) => BootReason::NoValidRecord,
                Err(_) => BootReason::Unreadable,
            },
            Ok(tag) => {
                info!("store version {:#x}, expected {:#x}", tag, STORE_VERSION);
                BootReason::VersionMismatch
            }
            Err(_) => BootReason::Unreadable,
        };

        warn!("reinitializing store: {:?}", reason);
        self.fresh(config, reason)
    }

    fn fresh<const N: usize>(&mut self, config: SampleLogConfig, reason: BootReason) -> Loaded<N> {
        let mut record = StateRecord::default();
        if let Err(e) = self.reinitialize(&mut record) {
            warn!("store reinitialization failed: {:?}", e);
        }
        Loaded {
            record,
            log: SampleLog::new(config),
            reason,
        }
    }

    /// Wipe the store and commit `record` as the first record
    pub fn reinitialize(&mut self, record: &mut StateRecord) -> Result<(), PersistError> {
        if self.eeprom.capacity() < layout::required_capacity(0) {
            return Err(PersistError::TooSmall);
        }

        self.active = None;
        self.sequence = 0;

        self.eeprom.update_byte(StateSlot::A.addr(), 0)?;
        self.eeprom.update_byte(StateSlot::B.addr(), 0)?;
        self.write_log_header(&LogHeader {
            epoch: record.log_epoch,
            head: 0,
            len: 0,
        })?;
        self.eeprom
            .update_from(VERSION_ADDR, &STORE_VERSION.to_le_bytes())?;

        self.commit(record)
    }

    /// Commit `record` to the inactive slot
    ///
    /// Assigns the next sequence number. On failure the previously active
    /// record is untouched and stays authoritative.
    pub fn commit(&mut self, record: &mut StateRecord) -> Result<(), PersistError> {
        let target = self.active.map_or(StateSlot::A, StateSlot::other);
        record.sequence = self.sequence.wrapping_add(1);

        let mut image = [0u8; STATE_SLOT_SIZE];
        let used = record.encode(&mut image)?;

        // Length byte last, so a torn write never looks like a shorter record
        self.eeprom
            .update_from(target.addr() + 1, &image[1..used])?;
        self.eeprom.update_byte(target.addr(), image[0])?;

        self.active = Some(target);
        self.sequence = record.sequence;
        debug!("committed record {} to slot {:?}", record.sequence, target);
        Ok(())
    }

    /// Write the log header
    pub fn write_log_header(&mut self, header: &LogHeader) -> Result<(), PersistError> {
        self.eeprom.update_from(LOG_HEADER_ADDR, &header.to_bytes())?;
        Ok(())
    }

    /// Write entries appended since the last flush, then the header
    ///
    /// Once the ring has wrapped, new entries land in slots the stored
    /// header still lists. The header is first cut back to the entries that
    /// survive, so a power loss between the two header writes reloads an
    /// older but still ordered log.
    ///
    /// Marks the log flushed on success and returns the number of entries
    /// written.
    pub fn flush_log<const N: usize>(
        &mut self,
        log: &mut SampleLog<N>,
        epoch: u32,
    ) -> Result<usize, PersistError> {
        let pending = log.unflushed().min(log.len());
        if pending > 0 {
            self.write_log_header(&LogHeader {
                epoch,
                head: log.head() as u16,
                len: (log.len() - pending) as u16,
            })?;
        }

        let mut count = 0;
        for (index, entry) in log.unflushed_slots() {
            self.eeprom
                .update_from(layout::log_slot_addr(index), &encode_entry(&entry, epoch))?;
            count += 1;
        }

        self.write_log_header(&LogHeader {
            epoch,
            head: log.head() as u16,
            len: log.len() as u16,
        })?;

        log.mark_flushed();
        Ok(count)
    }

    fn read_version(&mut self) -> Result<u16, StoreError> {
        let mut bytes = [0u8; 2];
        self.eeprom.read_into(VERSION_ADDR, &mut bytes)?;
        Ok(u16::from_le_bytes(bytes))
    }

    fn read_slot(&mut self, slot: StateSlot) -> Result<Option<StateRecord>, StoreError> {
        let mut image = [0u8; STATE_SLOT_SIZE];
        self.eeprom.read_into(slot.addr(), &mut image)?;
        Ok(StateRecord::decode(&image).ok())
    }

    fn find_active(&mut self) -> Result<Option<(StateSlot, StateRecord)>, StoreError> {
        let a = self.read_slot(StateSlot::A)?;
        let b = self.read_slot(StateSlot::B)?;

        Ok(match (a, b) {
            (Some(a), Some(b)) if b.sequence > a.sequence => Some((StateSlot::B, b)),
            (Some(a), _) => Some((StateSlot::A, a)),
            (None, Some(b)) => Some((StateSlot::B, b)),
            (None, None) => None,
        })
    }

    /// Read back the sample log for `epoch`, truncating at the first bad entry
    fn load_log<const N: usize>(&mut self, config: SampleLogConfig, epoch: u32) -> SampleLog<N> {
        let mut bytes = [0u8; LOG_HEADER_SIZE];
        let header = match self.eeprom.read_into(LOG_HEADER_ADDR, &mut bytes) {
            Ok(()) => LogHeader::from_bytes(&bytes).ok(),
            Err(_) => None,
        };

        let header = match header {
            Some(h) if h.epoch == epoch && (h.head as usize) < N.max(1) && h.len as usize <= N => h,
            _ => {
                debug!("no sample log for epoch {}", epoch);
                return SampleLog::new(config);
            }
        };

        let mut log = SampleLog::with_head(config, header.head as usize);
        for i in 0..header.len as usize {
            let index = (header.head as usize + i) % N;
            let mut slot = [0u8; LOG_SLOT_SIZE];
            let entry = self
                .eeprom
                .read_into(layout::log_slot_addr(index), &mut slot)
                .ok()
                .and_then(|()| decode_entry(&slot, epoch).ok());

            match entry {
                Some(entry) => {
                    log.restore(entry);
                }
                None => {
                    warn!("sample log truncated at entry {}", i);
                    break;
                }
            }
        }
        log
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::PersistentCounters;
    use crate::samples::SampleLogEntry;
    use crate::session::Mode;
    use leafrange_hal::RamEeprom;

    type Ram = RamEeprom<512>;

    fn boot(eeprom: Ram) -> (PersistentStore<Ram>, Loaded<8>) {
        let mut store = PersistentStore::new(eeprom);
        let loaded = store.load::<8>(SampleLogConfig::default());
        (store, loaded)
    }

    fn reboot(store: PersistentStore<Ram>) -> (PersistentStore<Ram>, Loaded<8>) {
        boot(Ram::from_image(*store.into_inner().image()))
    }

    #[test]
    fn test_blank_store_initializes() {
        let (mut store, loaded) = boot(Ram::new());
        assert_eq!(loaded.reason, BootReason::VersionMismatch);
        assert_eq!(loaded.record.counters, PersistentCounters::fresh());
        assert!(loaded.log.is_empty());

        let mut tag = [0u8; 2];
        store.eeprom().read_into(VERSION_ADDR, &mut tag).unwrap();
        assert_eq!(u16::from_le_bytes(tag), STORE_VERSION);

        let (_, again) = reboot(store);
        assert!(again.is_restored());
    }

    #[test]
    fn test_newest_slot_wins() {
        let (mut store, mut loaded) = boot(Ram::new());
        let record = &mut loaded.record;

        record.counters.lifetime_drive_sessions = 1;
        store.commit(record).unwrap();
        record.counters.lifetime_drive_sessions = 2;
        store.commit(record).unwrap();

        let (_, loaded) = reboot(store);
        assert!(loaded.is_restored());
        assert_eq!(loaded.record.counters.lifetime_drive_sessions, 2);
    }

    #[test]
    fn test_torn_commit_keeps_previous_record() {
        let (mut store, mut loaded) = boot(Ram::new());
        let record = &mut loaded.record;
        record.session.mode = Mode::Charging;
        store.commit(record).unwrap();

        record.session.mode = Mode::Driving;
        record.counters.lifetime_drive_sessions = 9;
        store.eeprom().cut_power_after(1);
        assert!(store.commit(record).is_err());

        let (_, loaded) = reboot(store);
        assert_eq!(loaded.record.session.mode, Mode::Charging);
        assert_eq!(loaded.record.counters.lifetime_drive_sessions, 0);
    }

    #[test]
    fn test_corrupt_slots_reinitialize() {
        let (store, _) = boot(Ram::new());
        let mut eeprom = store.into_inner();
        eeprom.poke(StateSlot::A.addr() as usize + 3, 0x00);
        eeprom.poke(StateSlot::A.addr() as usize + 4, 0x11);
        eeprom.poke(StateSlot::B.addr() as usize, 0);

        let (_, loaded) = boot(eeprom);
        assert_eq!(loaded.reason, BootReason::NoValidRecord);
        assert_eq!(loaded.record.counters, PersistentCounters::fresh());
    }

    #[test]
    fn test_version_mismatch_discards_everything() {
        let (mut store, mut loaded) = boot(Ram::new());
        loaded.record.counters.lifetime_charge_sessions = 40;
        store.commit(&mut loaded.record).unwrap();

        let mut eeprom = store.into_inner();
        eeprom.poke(0, 0x01);

        let (_, loaded) = boot(eeprom);
        assert_eq!(loaded.reason, BootReason::VersionMismatch);
        assert_eq!(loaded.record.counters.lifetime_charge_sessions, 0);
    }

    #[test]
    fn test_log_round_trip() {
        let (mut store, mut loaded) = boot(Ram::new());
        for i in 0..5 {
            loaded.log.append(SampleLogEntry::new(i as f32, 90.0 - i as f32));
        }
        assert_eq!(store.flush_log(&mut loaded.log, 0), Ok(5));
        assert_eq!(loaded.log.unflushed(), 0);

        let (_, restored) = reboot(store);
        assert_eq!(restored.log.len(), 5);
        assert_eq!(restored.log.get(4), Some(SampleLogEntry::new(4.0, 86.0)));
    }

    #[test]
    fn test_log_from_other_epoch_ignored() {
        let (mut store, mut loaded) = boot(Ram::new());
        loaded.log.append(SampleLogEntry::new(1.0, 50.0));
        store.flush_log(&mut loaded.log, 0).unwrap();

        loaded.record.log_epoch = 1;
        store.commit(&mut loaded.record).unwrap();

        let (_, restored) = reboot(store);
        assert!(restored.log.is_empty());
    }

    #[test]
    fn test_log_truncated_at_bad_entry() {
        let (mut store, mut loaded) = boot(Ram::new());
        for i in 0..4 {
            loaded.log.append(SampleLogEntry::new(i as f32, 80.0));
        }
        store.flush_log(&mut loaded.log, 0).unwrap();

        let mut eeprom = store.into_inner();
        eeprom.poke(layout::log_slot_addr(2) as usize, 0x55);

        let (_, restored) = boot(eeprom);
        assert_eq!(restored.log.len(), 2);
    }

    #[test]
    fn test_wrapped_flush_cut_keeps_order() {
        let (mut store, mut loaded) = boot(Ram::new());
        for i in 0..8 {
            loaded.log.append(SampleLogEntry::new(i as f32, 80.0));
        }
        store.flush_log(&mut loaded.log, 0).unwrap();
        let image = *store.into_inner().image();

        let wrap = |log: &mut SampleLog<8>| {
            for i in 8..11 {
                log.append(SampleLogEntry::new(i as f32, 80.0));
            }
        };

        let (mut probe, mut loaded) = boot(Ram::from_image(image));
        wrap(&mut loaded.log);
        probe.flush_log(&mut loaded.log, 0).unwrap();
        let total = probe.eeprom().writes();

        for cut in 0..=total {
            let mut eeprom = Ram::from_image(image);
            eeprom.cut_power_after(cut);
            let (mut store, mut loaded) = boot(eeprom);
            wrap(&mut loaded.log);
            let _ = store.flush_log(&mut loaded.log, 0);

            let (_, restored) = reboot(store);
            let progress: heapless::Vec<f32, 8> =
                restored.log.iter().map(|e| e.progress).collect();
            assert!(
                progress.windows(2).all(|w| w[1] == w[0] + 1.0),
                "cut {}: {:?}",
                cut,
                progress
            );
            if let Some(last) = progress.last() {
                assert!(*last == 7.0 || *last == 10.0, "cut {}: {:?}", cut, progress);
            }
        }

        let (_, restored) = boot(Ram::from_image(*probe.into_inner().image()));
        assert_eq!(restored.log.get(0), Some(SampleLogEntry::new(3.0, 80.0)));
        assert_eq!(restored.log.last(), Some(SampleLogEntry::new(10.0, 80.0)));
    }

    #[test]
    fn test_unchanged_commit_writes_only_sequence() {
        let (mut store, mut loaded) = boot(Ram::new());
        store.commit(&mut loaded.record).unwrap();
        store.commit(&mut loaded.record).unwrap();

        // Slot A again: same payload apart from the sequence and CRC
        let before = store.eeprom().writes();
        store.commit(&mut loaded.record).unwrap();
        assert!(store.eeprom().writes() - before <= 6);
    }

    #[test]
    fn test_write_failure_reported() {
        let (mut store, mut loaded) = boot(Ram::new());
        store.eeprom().set_write_failure(true);
        loaded.record.counters.lifetime_drive_sessions = 3;
        assert_eq!(
            store.commit(&mut loaded.record),
            Err(PersistError::Store(StoreError::Write))
        );
    }

    #[test]
    fn test_undersized_device_starts_fresh() {
        let mut store = PersistentStore::new(RamEeprom::<64>::new());
        let loaded = store.load::<8>(SampleLogConfig::default());
        assert_eq!(loaded.reason, BootReason::Unreadable);
        assert!(loaded.log.is_empty());
    }
}
