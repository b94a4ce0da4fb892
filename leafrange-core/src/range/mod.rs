//! Range estimation
//!
//! Turns a telemetry snapshot into an efficiency figure and the distance
//! the remaining charge should cover.

pub mod model;

pub use model::{
    compute, efficiency_km_per_unit, temperature_factor, wh_per_unit, Estimate, EstimateFlags,
    ModelFault, RangeEstimate, RangeModel,
};
