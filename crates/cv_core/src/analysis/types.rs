//! Core types for CV analysis.

use serde::{Deserialize, Serialize};

use crate::models::{BaselineMethod, PeakType, SweepDirection};

/// A monotonic voltage sweep within a trace.
///
/// Half-open index range `[start_index, end_index)` over the trace. Adjacent
/// segments share the turning-point index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// First trace index of the segment.
    pub start_index: usize,
    /// One past the last trace index of the segment.
    pub end_index: usize,
    /// Sweep direction.
    pub direction: SweepDirection,
    /// Cycle number (0-based).
    pub cycle: usize,
}

impl Segment {
    /// Create a new segment.
    pub fn new(start_index: usize, end_index: usize, direction: SweepDirection, cycle: usize) -> Self {
        Self {
            start_index,
            end_index,
            direction,
            cycle,
        }
    }

    /// Number of points in the segment.
    pub fn len(&self) -> usize {
        self.end_index.saturating_sub(self.start_index)
    }

    /// Check if the segment has no points.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check whether a trace index lies within the segment.
    pub fn contains(&self, index: usize) -> bool {
        index >= self.start_index && index < self.end_index
    }

    /// Index range of the segment.
    pub fn range(&self) -> std::ops::Range<usize> {
        self.start_index..self.end_index
    }
}

/// Reason a baseline was produced in degraded form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineIssue {
    /// Segment shorter than the minimum regression window.
    InsufficientPoints,
    /// Voltage barely changes in the retained window, regression is unstable.
    DegenerateVoltage,
    /// Currents are implausibly small, likely delivered in the wrong unit.
    CurrentMagnitude,
}

impl std::fmt::Display for BaselineIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BaselineIssue::InsufficientPoints => write!(f, "insufficient points"),
            BaselineIssue::DegenerateVoltage => write!(f, "degenerate voltage window"),
            BaselineIssue::CurrentMagnitude => write!(f, "implausible current magnitude"),
        }
    }
}

/// Background current model for one segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineModel {
    /// Baseline current at each segment point (same length as the segment).
    pub current_at_index: Vec<f64>,
    /// Method that produced the baseline.
    pub method: BaselineMethod,
    /// R² of the fit on the retained points (0.0 - 1.0).
    pub quality_r2: f64,
    /// Slope of the fitted line (µA/V), if a line was fitted.
    pub slope: Option<f64>,
    /// Intercept of the fitted line (µA), if a line was fitted.
    pub intercept: Option<f64>,
    /// Number of points the fit was computed on.
    pub retained_points: usize,
    /// Why the baseline is degraded, if it is.
    pub issue: Option<BaselineIssue>,
}

impl BaselineModel {
    /// Number of baseline points.
    pub fn len(&self) -> usize {
        self.current_at_index.len()
    }

    /// Check if the baseline is empty.
    pub fn is_empty(&self) -> bool {
        self.current_at_index.is_empty()
    }

    /// Baseline value at a trace index, given the owning segment.
    pub fn at_trace_index(&self, segment: &Segment, index: usize) -> Option<f64> {
        if !segment.contains(index) {
            return None;
        }
        self.current_at_index.get(index - segment.start_index).copied()
    }

    /// Whether the fit quality falls below the given threshold.
    pub fn is_suspect(&self, threshold: f64) -> bool {
        self.quality_r2 < threshold
    }
}

/// A candidate extremum produced by a peak detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakCandidate {
    /// Trace index of the apex.
    pub index: usize,
    /// Index of the producing segment in the segment list.
    pub segment_index: usize,
    /// Apex voltage (V).
    pub voltage: f64,
    /// Apex current (µA).
    pub current: f64,
    /// Baseline current at the apex (µA).
    pub baseline_current: f64,
    /// Height relative to baseline (µA, >= 0).
    pub height: f64,
    /// Width at the configured height fraction (V).
    pub width: f64,
    /// Width at the configured height fraction (points).
    pub width_points: f64,
    /// Baseline-subtracted area over the peak span (µA·V).
    pub area: f64,
    /// Prominence of the extremum (µA).
    pub prominence: f64,
    /// Oxidation or reduction.
    pub peak_type: PeakType,
    /// Confidence score (0 - 100).
    pub confidence: f64,
    /// Noise estimate used for the confidence score (µA).
    pub noise: f64,
}

/// A validated peak.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Peak {
    /// Trace index of the apex.
    pub index: usize,
    /// Index of the producing segment.
    pub segment_index: usize,
    /// Apex voltage (V).
    pub voltage: f64,
    /// Apex current (µA).
    pub current: f64,
    /// Baseline current at the apex (µA).
    pub baseline_current: f64,
    /// Height relative to baseline (µA).
    pub height: f64,
    /// Width (V).
    pub width: f64,
    /// Area (µA·V).
    pub area: f64,
    /// Oxidation or reduction.
    pub peak_type: PeakType,
    /// Confidence score (0 - 100).
    pub confidence: f64,
    /// Whether the peak survived dominant-peak reduction.
    pub enabled: bool,
}

impl From<PeakCandidate> for Peak {
    fn from(c: PeakCandidate) -> Self {
        Self {
            index: c.index,
            segment_index: c.segment_index,
            voltage: c.voltage,
            current: c.current,
            baseline_current: c.baseline_current,
            height: c.height,
            width: c.width,
            area: c.area,
            peak_type: c.peak_type,
            confidence: c.confidence,
            enabled: true,
        }
    }
}

/// Result of running the pipeline on one trace.
///
/// Peaks are a flat list across all segments; use `segment_index` to map
/// them back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    /// Sample identifier of the analyzed trace.
    pub sample_id: String,
    /// Canonical name of the strategy used.
    pub strategy: String,
    /// Sweep segments.
    pub segments: Vec<Segment>,
    /// One baseline per segment.
    pub baselines: Vec<BaselineModel>,
    /// Validated peaks in increasing voltage order.
    pub peaks: Vec<Peak>,
}

impl DetectionResult {
    /// Peaks that are enabled.
    pub fn enabled_peaks(&self) -> impl Iterator<Item = &Peak> {
        self.peaks.iter().filter(|p| p.enabled)
    }

    /// Enabled peaks of one polarity.
    pub fn peaks_of_type(&self, peak_type: PeakType) -> impl Iterator<Item = &Peak> {
        self.enabled_peaks().filter(move |p| p.peak_type == peak_type)
    }

    /// Lowest baseline quality across segments (0.0 when there are none).
    pub fn min_baseline_quality(&self) -> f64 {
        self.baselines
            .iter()
            .map(|b| b.quality_r2)
            .reduce(f64::min)
            .unwrap_or(0.0)
    }
}

/// Error types for analysis operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnalysisError {
    /// Too few points for segmentation or regression.
    #[error("Insufficient data: got {points} points, need at least {required}")]
    InsufficientData { points: usize, required: usize },

    /// Trace violates a structural invariant.
    #[error("Invalid trace: {0}")]
    InvalidTrace(String),

    /// Strategy name not recognized.
    #[error("Unknown detection strategy: '{0}'")]
    UnknownStrategy(String),
}

/// Type alias for analysis results.
pub type AnalysisResult<T> = Result<T, AnalysisError>;
