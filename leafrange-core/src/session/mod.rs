//! Session state machine
//!
//! Classifies each period as Driving or Charging. Mode changes are explicit
//! transitions in a table; everything else is an in-place update of the
//! current session.

pub mod events;
pub mod machine;
pub mod state;

pub use events::{EventDetector, SessionEvent};
pub use machine::{Mode, Transition};
pub use state::{SessionState, TripMeter};
