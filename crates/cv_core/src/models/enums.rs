//! Core enums used throughout the analysis pipeline.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::analysis::AnalysisError;

/// Direction of a voltage sweep segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SweepDirection {
    /// Voltage increases along the segment (anodic sweep).
    Forward,
    /// Voltage decreases along the segment (cathodic sweep).
    Reverse,
}

impl SweepDirection {
    /// Get the opposite sweep direction.
    pub fn opposite(&self) -> Self {
        match self {
            Self::Forward => Self::Reverse,
            Self::Reverse => Self::Forward,
        }
    }
}

impl std::fmt::Display for SweepDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SweepDirection::Forward => write!(f, "forward"),
            SweepDirection::Reverse => write!(f, "reverse"),
        }
    }
}

/// Polarity of a redox peak relative to the baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeakType {
    /// Current above baseline (anodic).
    Oxidation,
    /// Current below baseline (cathodic).
    Reduction,
}

impl PeakType {
    /// Classify by comparing current with the baseline at the same index.
    pub fn classify(current: f64, baseline_current: f64) -> Self {
        if current > baseline_current {
            Self::Oxidation
        } else {
            Self::Reduction
        }
    }

    /// Height of a peak of this polarity, clamped to be non-negative.
    pub fn height(&self, current: f64, baseline_current: f64) -> f64 {
        let raw = match self {
            Self::Oxidation => current - baseline_current,
            Self::Reduction => baseline_current - current,
        };
        raw.max(0.0)
    }
}

impl std::fmt::Display for PeakType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PeakType::Oxidation => write!(f, "oxidation"),
            PeakType::Reduction => write!(f, "reduction"),
        }
    }
}

/// Background current model fitted per segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineMethod {
    /// Line fitted on peak-free windows at the segment edges.
    #[default]
    EdgeWindows,
    /// Line fitted on all points with iterative outlier exclusion.
    IterativeExclusion,
    /// Robust mean (median) of the edge windows.
    Constant,
    /// Constant mean current used when regression is not possible.
    ConstantFallback,
}

impl std::fmt::Display for BaselineMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BaselineMethod::EdgeWindows => write!(f, "Edge Windows"),
            BaselineMethod::IterativeExclusion => write!(f, "Iterative Exclusion"),
            BaselineMethod::Constant => write!(f, "Constant"),
            BaselineMethod::ConstantFallback => write!(f, "Constant Fallback"),
        }
    }
}

/// Placement of the baseline regression window inside a segment.
///
/// Leading means the start of the sweep in acquisition order, trailing the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaselineWindow {
    /// Only the first points of the segment.
    Leading,
    /// Only the last points of the segment.
    Trailing,
    /// Both ends of the segment.
    #[default]
    Both,
}

/// Peak detection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionStrategy {
    /// Local extrema filtered by prominence and width.
    #[default]
    Prominence,
    /// Zero crossings of the first derivative.
    Derivative,
    /// Prominence candidates refined by Gaussian peak fitting.
    Gaussian,
}

impl DetectionStrategy {
    /// Canonical name used by the strategy selector.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Prominence => "prominence",
            Self::Derivative => "derivative",
            Self::Gaussian => "gaussian",
        }
    }

    /// Get all available strategies.
    pub fn all() -> &'static [DetectionStrategy] {
        &[Self::Prominence, Self::Derivative, Self::Gaussian]
    }

    /// Resolve a strategy name or alias (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "prominence" | "default" | "peak" => Some(Self::Prominence),
            "derivative" | "deriv" => Some(Self::Derivative),
            "gaussian" | "model" | "model-assisted" => Some(Self::Gaussian),
            _ => None,
        }
    }
}

impl FromStr for DetectionStrategy {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| AnalysisError::UnknownStrategy(s.to_string()))
    }
}

impl std::fmt::Display for DetectionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Smoothing applied to the baseline-subtracted signal before peak search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmoothingMethod {
    /// No smoothing.
    #[default]
    None,
    /// Centered moving average.
    MovingAverage,
    /// Quadratic Savitzky-Golay filter.
    SavitzkyGolay,
}

/// Numeric integration rule for peak areas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationRule {
    /// Trapezoidal rule.
    #[default]
    Trapezoid,
    /// Simpson's rule for non-uniform spacing.
    Simpson,
}

/// How two traces of different length are paired for calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlignmentPolicy {
    /// Keep the first `min(len)` points of each trace.
    #[default]
    Truncate,
    /// Interpolate the longer trace onto the shorter trace's sample positions.
    Resample,
}

impl std::fmt::Display for AlignmentPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlignmentPolicy::Truncate => write!(f, "truncate"),
            AlignmentPolicy::Resample => write!(f, "resample"),
        }
    }
}

/// Descriptive quality band for a calibration fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalibrationQuality {
    /// R² above 0.95.
    Excellent,
    /// R² above 0.8.
    Good,
    /// Anything else.
    Fair,
}

impl CalibrationQuality {
    /// Band an R² value.
    pub fn from_r2(r2: f64) -> Self {
        if r2 > 0.95 {
            Self::Excellent
        } else if r2 > 0.8 {
            Self::Good
        } else {
            Self::Fair
        }
    }
}

impl std::fmt::Display for CalibrationQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CalibrationQuality::Excellent => write!(f, "Excellent"),
            CalibrationQuality::Good => write!(f, "Good"),
            CalibrationQuality::Fair => write!(f, "Fair"),
        }
    }
}

/// Current unit as declared by an instrument export.
///
/// The data loader scales every current column to micro-amperes with
/// these factors before handing traces to the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CurrentUnit {
    /// Amperes.
    Ampere,
    /// Milli-amperes.
    MilliAmpere,
    /// Micro-amperes.
    #[default]
    MicroAmpere,
    /// Nano-amperes.
    NanoAmpere,
}

impl CurrentUnit {
    /// Multiplier converting a value in this unit to micro-amperes.
    pub fn to_microamps_factor(&self) -> f64 {
        match self {
            Self::Ampere => 1e6,
            Self::MilliAmpere => 1e3,
            Self::MicroAmpere => 1.0,
            Self::NanoAmpere => 1e-3,
        }
    }

    /// Scale raw values in this unit to micro-amperes.
    pub fn scale_to_microamps(&self, values: &[f64]) -> Vec<f64> {
        let factor = self.to_microamps_factor();
        values.iter().map(|v| v * factor).collect()
    }

    /// Parse a unit label such as `mA`, `uA`, `µA`, `nA` or `A`.
    pub fn from_label(label: &str) -> Option<Self> {
        let trimmed = label.trim().trim_matches(|c| c == '(' || c == ')' || c == '[' || c == ']');
        match trimmed {
            "A" => return Some(Self::Ampere),
            "mA" => return Some(Self::MilliAmpere),
            "uA" | "µA" | "μA" => return Some(Self::MicroAmpere),
            "nA" => return Some(Self::NanoAmpere),
            _ => {}
        }

        let lower = trimmed.to_lowercase();
        if lower.starts_with("milli") {
            Some(Self::MilliAmpere)
        } else if lower.starts_with("micro") || lower == "ua" {
            Some(Self::MicroAmpere)
        } else if lower.starts_with("nano") || lower == "na" {
            Some(Self::NanoAmpere)
        } else if lower == "a" || lower.starts_with("amp") {
            Some(Self::Ampere)
        } else {
            None
        }
    }
}

impl std::fmt::Display for CurrentUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CurrentUnit::Ampere => write!(f, "A"),
            CurrentUnit::MilliAmpere => write!(f, "mA"),
            CurrentUnit::MicroAmpere => write!(f, "µA"),
            CurrentUnit::NanoAmpere => write!(f, "nA"),
        }
    }
}
