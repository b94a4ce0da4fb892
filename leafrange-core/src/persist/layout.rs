//! Store layout
//!
//! ```text
//! 0x000  version tag (u16 LE) + 2 reserved
//! 0x004  state slot A   [len][postcard StateRecord][crc32]
//! 0x054  state slot B
//! 0x0A4  log header     epoch u32, head u16, len u16, crc32
//! 0x0B0  log slots      progress u16 (x10), charge u16 (x100), check u8
//! ```

/// Tag identifying the current layout; any other value forces reinitialization
pub const STORE_VERSION: u16 = 0x4C52;

/// Address of the version tag
pub const VERSION_ADDR: u16 = 0;

/// Size of each state record slot
pub const STATE_SLOT_SIZE: usize = 80;

/// Address of the log header
pub const LOG_HEADER_ADDR: u16 = 4 + 2 * STATE_SLOT_SIZE as u16;

/// Size of the log header
pub const LOG_HEADER_SIZE: usize = 12;

/// Address of the first log slot
pub const LOG_SLOTS_ADDR: u16 = LOG_HEADER_ADDR + LOG_HEADER_SIZE as u16;

/// Size of each log slot
pub const LOG_SLOT_SIZE: usize = 5;

/// One of the two state record slots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StateSlot {
    A,
    B,
}

impl StateSlot {
    /// First byte of the slot
    pub const fn addr(self) -> u16 {
        match self {
            StateSlot::A => 4,
            StateSlot::B => 4 + STATE_SLOT_SIZE as u16,
        }
    }

    /// The slot the next record goes to
    pub const fn other(self) -> Self {
        match self {
            StateSlot::A => StateSlot::B,
            StateSlot::B => StateSlot::A,
        }
    }
}

/// Address of log slot `index`
pub const fn log_slot_addr(index: usize) -> u16 {
    LOG_SLOTS_ADDR + (index * LOG_SLOT_SIZE) as u16
}

/// Bytes needed for a log of `capacity` entries
pub const fn required_capacity(capacity: usize) -> usize {
    LOG_SLOTS_ADDR as usize + capacity * LOG_SLOT_SIZE
}
