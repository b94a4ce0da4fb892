//! Non-volatile persistence
//!
//! Counters, session state and the sample log survive power cycles in a
//! byte-addressable store. State records alternate between two slots so a
//! write cut short by power loss always leaves the previous record intact.

pub mod crc;
pub mod layout;
pub mod record;
pub mod store;

pub use layout::STORE_VERSION;
pub use record::{LogHeader, PersistentCounters, StateRecord};
pub use store::{BootReason, Loaded, PersistError, PersistentStore};
