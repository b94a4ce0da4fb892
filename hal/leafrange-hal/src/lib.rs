//! LeafRange Hardware Abstraction Layer
//!
//! This crate defines the narrow hardware interfaces the range engine
//! consumes. Board support code implements them for the actual EEPROM and
//! serial port; host tests use the RAM-backed store.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  leafrange-core (range engine)          │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  leafrange-hal (this crate - traits)    │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │ board EEPROM  │       │   RamEeprom   │
//! │  + USART      │       │  (host tests) │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`eeprom::Eeprom`] - Byte-addressable non-volatile storage
//! - [`uart::UartTx`] - Serial transmit for the diagnostics dump

#![no_std]
#![deny(unsafe_code)]

pub mod eeprom;
pub mod uart;

// Re-export key traits at crate root for convenience
pub use eeprom::{Eeprom, RamEeprom, StoreError};
pub use uart::UartTx;
