//! Non-volatile storage abstractions
//!
//! Provides a byte-addressable store trait modelled on AVR-style EEPROM:
//! single-byte reads and writes that survive power loss, with finite write
//! endurance. Implementations are expected to complete each call within a
//! bounded time; a call that cannot is reported as an error.

/// Errors from non-volatile storage operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StoreError {
    /// Address is beyond the end of the device
    OutOfRange,
    /// Read operation failed
    Read,
    /// Write operation failed
    Write,
    /// Byte read back after a write did not match
    Verify,
    /// Operation did not finish within its time budget
    Timeout,
}

/// Byte-addressable non-volatile store
///
/// Only `capacity`, `read_byte` and `write_byte` are required. The provided
/// methods build on them and should rarely need overriding.
pub trait Eeprom {
    /// Total number of addressable bytes
    fn capacity(&self) -> usize;

    /// Read the byte stored at `address`
    fn read_byte(&mut self, address: u16) -> Result<u8, StoreError>;

    /// Write `value` at `address`
    ///
    /// Each call costs one erase/write cycle of the cell, whether or not the
    /// value changed.
    fn write_byte(&mut self, address: u16, value: u8) -> Result<(), StoreError>;

    /// Write `value` only if it differs from the stored byte, then verify
    ///
    /// Returns `true` if a write was issued.
    fn update_byte(&mut self, address: u16, value: u8) -> Result<bool, StoreError> {
        if self.read_byte(address)? == value {
            return Ok(false);
        }

        self.write_byte(address, value)?;

        if self.read_byte(address)? != value {
            return Err(StoreError::Verify);
        }

        Ok(true)
    }

    /// Fill `buffer` with the bytes starting at `address`
    fn read_into(&mut self, address: u16, buffer: &mut [u8]) -> Result<(), StoreError> {
        for (offset, byte) in buffer.iter_mut().enumerate() {
            *byte = self.read_byte(offset_address(address, offset)?)?;
        }
        Ok(())
    }

    /// Update the bytes starting at `address` with `data`
    ///
    /// Bytes are written in ascending address order and unchanged bytes are
    /// skipped. Returns the number of cells actually written.
    fn update_from(&mut self, address: u16, data: &[u8]) -> Result<usize, StoreError> {
        let mut written = 0;
        for (offset, &byte) in data.iter().enumerate() {
            if self.update_byte(offset_address(address, offset)?, byte)? {
                written += 1;
            }
        }
        Ok(written)
    }

    /// Stream the whole device through `visit`, `chunk.len()` bytes at a time
    ///
    /// `visit` receives each chunk's start address and contents. Returns the
    /// number of bytes visited.
    fn dump_all<F, X>(&mut self, chunk: &mut [u8], mut visit: F) -> Result<usize, X>
    where
        F: FnMut(u16, &[u8]) -> Result<(), X>,
        X: From<StoreError>,
    {
        let total = self.capacity().min(u16::MAX as usize + 1);
        if chunk.is_empty() {
            return Ok(0);
        }

        let mut offset = 0;
        while offset < total {
            let len = chunk.len().min(total - offset);
            let address = offset as u16;
            self.read_into(address, &mut chunk[..len])?;
            visit(address, &chunk[..len])?;
            offset += len;
        }
        Ok(total)
    }
}

fn offset_address(base: u16, offset: usize) -> Result<u16, StoreError> {
    u16::try_from(offset)
        .ok()
        .and_then(|offset| base.checked_add(offset))
        .ok_or(StoreError::OutOfRange)
}

/// Value of an erased EEPROM cell
pub const ERASED: u8 = 0xFF;

/// RAM-backed store
///
/// Behaves like a factory-fresh EEPROM (every cell reads [`ERASED`]) and can
/// inject the faults the engine has to survive: failing writes, a single
/// transient write failure, and a power cut after a given number of byte
/// writes. Once the power is cut every
/// further write is dropped, so the contents freeze exactly as they were at
/// the moment of the cut.
#[derive(Debug, Clone)]
pub struct RamEeprom<const N: usize> {
    cells: [u8; N],
    writes: usize,
    fail_writes: bool,
    fail_once_at: Option<usize>,
    cut_after: Option<usize>,
}

impl<const N: usize> Default for RamEeprom<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> RamEeprom<N> {
    /// Create an erased store
    pub const fn new() -> Self {
        Self {
            cells: [ERASED; N],
            writes: 0,
            fail_writes: false,
            fail_once_at: None,
            cut_after: None,
        }
    }

    /// Create a store holding a previously captured image
    pub const fn from_image(cells: [u8; N]) -> Self {
        Self {
            cells,
            writes: 0,
            fail_writes: false,
            fail_once_at: None,
            cut_after: None,
        }
    }

    /// Current contents
    pub fn image(&self) -> &[u8; N] {
        &self.cells
    }

    /// Number of byte writes that reached the cells
    pub fn writes(&self) -> usize {
        self.writes
    }

    /// Make every write fail until cleared
    pub fn set_write_failure(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    /// Fail a single write once `writes` more have succeeded
    ///
    /// Later writes go through again.
    pub fn fail_once_after(&mut self, writes: usize) {
        self.fail_once_at = Some(self.writes + writes);
    }

    /// Drop every write after `writes` more have succeeded
    pub fn cut_power_after(&mut self, writes: usize) {
        self.cut_after = Some(self.writes + writes);
    }

    /// Whether the simulated power cut has happened
    pub fn is_cut(&self) -> bool {
        matches!(self.cut_after, Some(limit) if self.writes >= limit)
    }

    /// Corrupt a single cell, bypassing write accounting
    pub fn poke(&mut self, address: usize, value: u8) {
        if let Some(cell) = self.cells.get_mut(address) {
            *cell = value;
        }
    }
}

impl<const N: usize> Eeprom for RamEeprom<N> {
    fn capacity(&self) -> usize {
        N
    }

    fn read_byte(&mut self, address: u16) -> Result<u8, StoreError> {
        self.cells
            .get(address as usize)
            .copied()
            .ok_or(StoreError::OutOfRange)
    }

    fn write_byte(&mut self, address: u16, value: u8) -> Result<(), StoreError> {
        let index = address as usize;
        if index >= N {
            return Err(StoreError::OutOfRange);
        }
        if self.fail_writes || self.is_cut() {
            return Err(StoreError::Write);
        }
        if self.fail_once_at == Some(self.writes) {
            self.fail_once_at = None;
            return Err(StoreError::Write);
        }

        self.cells[index] = value;
        self.writes += 1;
        Ok(())
    }
}
