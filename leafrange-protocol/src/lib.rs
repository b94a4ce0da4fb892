//! LeafRange diagnostics protocol
//!
//! One-way UART stream from the display unit to a service laptop. A dump
//! is a sequence of frames:
//!
//! ```text
//! ┌───────┬────────┬──────┬─────┬─────────────┬──────────┐
//! │ START │ LENGTH │ KIND │ SEQ │ PAYLOAD     │ CHECKSUM │
//! │ 1B    │ 1B     │ 1B   │ 1B  │ 0–96B       │ 1B       │
//! └───────┴────────┴──────┴─────┴─────────────┴──────────┘
//! ```
//!
//! `SEQ` increments per frame so the receiver can tell when a frame was
//! dropped. Multi-byte payload fields are little-endian.

#![no_std]
#![deny(unsafe_code)]

pub mod frame;
pub mod messages;

pub use frame::{Frame, FrameError, FrameParser, FRAME_START, MAX_FRAME_SIZE, MAX_PAYLOAD_SIZE};
pub use messages::{
    CountersReport, DiagnosticMessage, HealthReport, SessionReport, STORE_CHUNK_SIZE,
};
