//! Configuration types
//!
//! Every tunable of the range model, the session detector, the sample log,
//! the chart and the flush cadence. The model constants were tuned on the
//! road rather than derived, so they are configuration, not invariants.

pub mod types;

pub use types::*;
