//! Mapping session data into normalized chart coordinates

use heapless::Vec;

use super::scale::Axis;
use crate::config::ChartConfig;
use crate::range::RangeEstimate;
use crate::samples::SampleLog;
use crate::session::{Mode, SessionState};

/// Most vertical gridlines a frame carries
pub const MAX_GRIDLINES: usize = 8;

/// Horizontal gridlines at 25 / 50 / 75 %
const CHARGE_GRIDLINES: [f32; 3] = [0.25, 0.5, 0.75];

/// Driving gridline spacings tried in order (km)
const DRIVING_STEPS: [f32; 9] = [10.0, 20.0, 25.0, 50.0, 100.0, 200.0, 250.0, 500.0, 1000.0];

/// Most driving gridlines before a coarser step is used
const MAX_DRIVING_LINES: f32 = 6.0;

/// A point in chart space, both coordinates in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChartPoint {
    pub x: f32,
    pub y: f32,
}

impl ChartPoint {
    /// Map a progress / charge pair onto `axis`, clamping into the plot
    pub fn map(axis: &Axis, progress: f32, charge_percent: f32) -> Self {
        Self {
            x: unit(progress / axis.span),
            y: unit(charge_percent / 100.0),
        }
    }
}

/// Everything the display needs to draw one chart
#[derive(Debug, Clone)]
pub struct ChartFrame<const N: usize> {
    pub axis: Axis,
    /// Axis changed since the previous frame; the renderer must redraw
    pub rescaled: bool,
    /// Logged samples, oldest first
    pub samples: Vec<ChartPoint, N>,
    /// Straight-line expectation from the session start, clipped to the plot
    pub expected: Option<[ChartPoint; 2]>,
    /// Height of the session-start charge marker
    pub start_marker_y: f32,
    /// Vertical gridline positions
    pub gridlines_x: Vec<f32, MAX_GRIDLINES>,
    /// Horizontal gridline positions
    pub gridlines_y: [f32; 3],
}

/// Build a chart frame
pub fn render<const N: usize>(
    axis: Axis,
    rescaled: bool,
    log: &SampleLog<N>,
    session: &SessionState,
    estimate: &RangeEstimate,
    config: &ChartConfig,
) -> ChartFrame<N> {
    let mut samples = Vec::new();
    for entry in log.iter() {
        // Capacity equals the log's
        let _ = samples.push(ChartPoint::map(
            &axis,
            entry.progress,
            entry.charge_level_percent,
        ));
    }

    ChartFrame {
        axis,
        rescaled,
        samples,
        expected: expected_curve(&axis, session, estimate, config),
        start_marker_y: unit(session.session_start_charge_percent / 100.0),
        gridlines_x: gridlines(&axis, config),
        gridlines_y: CHARGE_GRIDLINES,
    }
}

/// Expected trajectory from the session start
///
/// Driving: straight down from the starting charge to empty at the range
/// the starting charge was worth. Charging: straight up from the starting
/// charge to full at the configured charge rate.
pub fn expected_curve(
    axis: &Axis,
    session: &SessionState,
    estimate: &RangeEstimate,
    config: &ChartConfig,
) -> Option<[ChartPoint; 2]> {
    let start = session.session_start_charge_percent.max(0.0).min(100.0);

    let end = match axis.mode {
        Mode::Driving => {
            if !(estimate.session_start_range_km > 0.0) {
                return None;
            }
            (estimate.session_start_range_km, 0.0)
        }
        Mode::Charging => {
            let full_range = estimate.estimated_range_km + estimate.distance_to_full_km;
            if !(full_range > 0.0) {
                return None;
            }
            let percent_per_minute = config.charge_rate_km_per_minute * 100.0 / full_range;
            let minutes_to_full = (100.0 - start) / percent_per_minute;
            if minutes_to_full > 0.0 {
                (minutes_to_full, 100.0)
            } else {
                (axis.span, 100.0)
            }
        }
    };

    let (x, y) = clip((0.0, start), end, axis.span);
    Some([
        ChartPoint::map(axis, 0.0, start),
        ChartPoint::map(axis, x, y),
    ])
}

/// Vertical gridline positions for `axis`
///
/// Driving picks the finest round step that yields no more than six
/// lines; charging uses a fixed minute grid.
pub fn gridlines(axis: &Axis, config: &ChartConfig) -> Vec<f32, MAX_GRIDLINES> {
    let step = match axis.mode {
        Mode::Driving => DRIVING_STEPS
            .iter()
            .copied()
            .find(|step| axis.span / step <= MAX_DRIVING_LINES)
            .unwrap_or(DRIVING_STEPS[DRIVING_STEPS.len() - 1]),
        Mode::Charging => config.charging_grid_minutes,
    };

    let mut lines = Vec::new();
    if !(step > 0.0 && axis.span > 0.0) {
        return lines;
    }

    let mut position = step;
    while position < axis.span {
        if lines.push(position / axis.span).is_err() {
            break;
        }
        position += step;
    }
    lines
}

/// End of the segment `start -> end` cut at `x = span`
fn clip(start: (f32, f32), end: (f32, f32), span: f32) -> (f32, f32) {
    if end.0 <= span || end.0 <= start.0 {
        return end;
    }
    let t = (span - start.0) / (end.0 - start.0);
    (span, start.1 + (end.1 - start.1) * t)
}

fn unit(value: f32) -> f32 {
    if value >= 0.0 {
        value.min(1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SampleLogConfig;
    use crate::samples::SampleLogEntry;
    use micromath::F32Ext;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    fn driving_axis(span: f32) -> Axis {
        Axis {
            mode: Mode::Driving,
            span,
        }
    }

    #[test]
    fn test_points_are_clamped() {
        let axis = driving_axis(50.0);
        assert_eq!(
            ChartPoint::map(&axis, 25.0, 40.0),
            ChartPoint { x: 0.5, y: 0.4 }
        );
        assert_eq!(
            ChartPoint::map(&axis, 80.0, 120.0),
            ChartPoint { x: 1.0, y: 1.0 }
        );
        assert_eq!(
            ChartPoint::map(&axis, -3.0, f32::NAN),
            ChartPoint { x: 0.0, y: 0.0 }
        );
    }

    #[test]
    fn test_driving_expectation_reaches_empty() {
        let axis = driving_axis(100.0);
        let session = SessionState {
            session_start_charge_percent: 80.0,
            ..Default::default()
        };
        let estimate = RangeEstimate {
            session_start_range_km: 80.0,
            ..Default::default()
        };

        let [start, end] = expected_curve(&axis, &session, &estimate, &ChartConfig::default()).unwrap();
        assert_eq!(start, ChartPoint { x: 0.0, y: 0.8 });
        assert_eq!(end, ChartPoint { x: 0.8, y: 0.0 });
    }

    #[test]
    fn test_driving_expectation_clipped_to_axis() {
        let axis = driving_axis(50.0);
        let session = SessionState {
            session_start_charge_percent: 100.0,
            ..Default::default()
        };
        let estimate = RangeEstimate {
            session_start_range_km: 100.0,
            ..Default::default()
        };

        let [_, end] = expected_curve(&axis, &session, &estimate, &ChartConfig::default()).unwrap();
        assert_eq!(end.x, 1.0);
        assert!(close(end.y, 0.5));
    }

    #[test]
    fn test_charging_expectation_rises_at_rate() {
        let axis = Axis {
            mode: Mode::Charging,
            span: 50.0,
        };
        let session = SessionState {
            mode: Mode::Charging,
            session_start_charge_percent: 20.0,
            ..Default::default()
        };
        // 200 km full range: 2 km/min is 1 %/min, 80 minutes to full
        let estimate = RangeEstimate {
            estimated_range_km: 40.0,
            distance_to_full_km: 160.0,
            ..Default::default()
        };

        let [start, end] = expected_curve(&axis, &session, &estimate, &ChartConfig::default()).unwrap();
        assert_eq!(start, ChartPoint { x: 0.0, y: 0.2 });
        assert_eq!(end.x, 1.0);
        assert!(close(end.y, 0.7));
    }

    #[test]
    fn test_no_expectation_without_estimate() {
        let axis = driving_axis(20.0);
        let result = expected_curve(
            &axis,
            &SessionState::default(),
            &RangeEstimate::default(),
            &ChartConfig::default(),
        );
        assert_eq!(result, None);
    }

    #[test]
    fn test_driving_gridlines() {
        let config = ChartConfig::default();
        let lines = gridlines(&driving_axis(100.0), &config);
        assert_eq!(lines.len(), 4);
        assert!(close(lines[0], 0.2));
        assert!(close(lines[3], 0.8));

        let lines = gridlines(&driving_axis(20.0), &config);
        assert_eq!(lines.as_slice(), &[0.5]);
    }

    #[test]
    fn test_charging_gridlines_every_ten_minutes() {
        let axis = Axis {
            mode: Mode::Charging,
            span: 40.0,
        };
        let lines = gridlines(&axis, &ChartConfig::default());
        assert_eq!(lines.as_slice(), &[0.25, 0.5, 0.75]);
    }

    #[test]
    fn test_render_maps_log_in_order() {
        let mut log = SampleLog::<8>::new(SampleLogConfig::default());
        log.append(SampleLogEntry::new(0.0, 90.0));
        log.append(SampleLogEntry::new(10.0, 80.0));

        let session = SessionState {
            session_start_charge_percent: 90.0,
            ..Default::default()
        };
        let frame = render(
            driving_axis(40.0),
            true,
            &log,
            &session,
            &RangeEstimate::default(),
            &ChartConfig::default(),
        );

        assert!(frame.rescaled);
        assert_eq!(frame.samples.len(), 2);
        assert_eq!(frame.samples[1], ChartPoint { x: 0.25, y: 0.8 });
        assert_eq!(frame.start_marker_y, 0.9);
        assert_eq!(frame.gridlines_y, [0.25, 0.5, 0.75]);
    }
}
