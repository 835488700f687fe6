//! Scan segmentation into monotonic voltage sweeps.
//!
//! A CV cycle sweeps voltage up and down. Turning points are found from
//! sign changes of the discrete voltage derivative and every monotonic run
//! between them becomes a `Segment`. Adjacent segments share the turning
//! point index.

use serde::{Deserialize, Serialize};

use crate::models::{CvTrace, SweepDirection, MIN_TRACE_POINTS};

use super::types::{AnalysisError, AnalysisResult, Segment};

/// Configuration for scan segmentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Runs with fewer points than this are merged into a neighbour.
    pub min_segment_points: usize,
    /// Voltage steps with magnitude at or below this are treated as flat (V).
    pub voltage_tolerance: f64,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            min_segment_points: 3,
            voltage_tolerance: 0.0,
        }
    }
}

/// Inclusive monotonic run, before conversion to a half-open segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Run {
    start: usize,
    end: usize,
    direction: SweepDirection,
}

impl Run {
    fn points(&self) -> usize {
        self.end - self.start + 1
    }
}

/// Split a trace into monotonic sweep segments.
///
/// Fails only if the trace has fewer than 3 points. A single monotonic
/// ramp yields one segment.
pub fn segment(trace: &CvTrace, config: &SegmentationConfig) -> AnalysisResult<Vec<Segment>> {
    segment_voltage(&trace.voltage, config)
}

/// Split a raw voltage sequence into monotonic sweep segments.
pub fn segment_voltage(
    voltage: &[f64],
    config: &SegmentationConfig,
) -> AnalysisResult<Vec<Segment>> {
    if voltage.len() < MIN_TRACE_POINTS {
        return Err(AnalysisError::InsufficientData {
            points: voltage.len(),
            required: MIN_TRACE_POINTS,
        });
    }

    let mut runs = monotonic_runs(voltage, config.voltage_tolerance);
    let before = runs.len();
    merge_slivers(&mut runs, config.min_segment_points.max(2));

    if runs.len() != before {
        tracing::debug!(
            "Merged {} short sweep run(s) into neighbours",
            before - runs.len()
        );
    }

    let first_direction = runs
        .first()
        .map(|r| r.direction)
        .unwrap_or(SweepDirection::Forward);
    let mut cycle = 0;

    let segments = runs
        .iter()
        .enumerate()
        .map(|(i, run)| {
            if i > 0 && run.direction == first_direction {
                cycle += 1;
            }
            Segment::new(run.start, run.end + 1, run.direction, cycle)
        })
        .collect();

    Ok(segments)
}

/// Trace indices where the sweep direction changes.
pub fn turning_points(segments: &[Segment]) -> Vec<usize> {
    segments
        .iter()
        .skip(1)
        .map(|s| s.start_index)
        .collect()
}

/// Check that segments cover `[0, len)` with only shared boundary points.
pub fn segments_partition(segments: &[Segment], len: usize) -> bool {
    let Some(first) = segments.first() else {
        return len == 0;
    };
    let Some(last) = segments.last() else {
        return false;
    };

    if first.start_index != 0 || last.end_index != len {
        return false;
    }

    segments.iter().all(|s| !s.is_empty())
        && segments
            .windows(2)
            .all(|w| w[1].start_index + 1 == w[0].end_index)
}

/// Find maximal monotonic runs. Flat steps continue the current run.
fn monotonic_runs(voltage: &[f64], tolerance: f64) -> Vec<Run> {
    let mut runs = Vec::new();
    let mut run_start = 0;
    let mut current: Option<SweepDirection> = None;

    for k in 1..voltage.len() {
        let step = voltage[k] - voltage[k - 1];
        if step.abs() <= tolerance {
            continue;
        }

        let direction = if step > 0.0 {
            SweepDirection::Forward
        } else {
            SweepDirection::Reverse
        };

        match current {
            None => current = Some(direction),
            Some(dir) if dir != direction => {
                runs.push(Run {
                    start: run_start,
                    end: k - 1,
                    direction: dir,
                });
                run_start = k - 1;
                current = Some(direction);
            }
            Some(_) => {}
        }
    }

    runs.push(Run {
        start: run_start,
        end: voltage.len() - 1,
        direction: current.unwrap_or(SweepDirection::Forward),
    });

    runs
}

/// Merge runs shorter than `min_points` into their neighbours.
///
/// Runs alternate in direction, so an interior sliver and both of its
/// neighbours collapse into one run with the neighbours' direction.
fn merge_slivers(runs: &mut Vec<Run>, min_points: usize) {
    while runs.len() > 1 {
        let Some(idx) = runs.iter().position(|r| r.points() < min_points) else {
            break;
        };

        if idx == 0 {
            runs[1].start = runs[0].start;
            runs.remove(0);
        } else if idx == runs.len() - 1 {
            runs[idx - 1].end = runs[idx].end;
            runs.remove(idx);
        } else {
            runs[idx - 1].end = runs[idx + 1].end;
            runs.drain(idx..=idx + 1);
        }
    }
}
