//! Chart scaling and coordinate mapping
//!
//! The x axis is kilometres for a driving session and minutes for a
//! charging session; the y axis is always 0-100 % state of charge. The
//! renderer receives coordinates already normalized to [0, 1].

pub mod map;
pub mod scale;

pub use map::{render, ChartFrame, ChartPoint, MAX_GRIDLINES};
pub use scale::{target_span, Axis, AxisScaler, AxisUnit};
