//! CV analysis module: from raw trace to validated redox peaks.
//!
//! # Architecture
//!
//! The analysis pipeline consists of pure functions composed in a fixed
//! order by `pipeline::detect`:
//!
//! 1. **Segmentation** (`segmentation`): Split the scan into monotonic
//!    forward/reverse sweeps at the turning points.
//!
//! 2. **Baseline** (`baseline`): Fit a background-current line per segment
//!    on peak-free windows and extrapolate it over the segment.
//!
//! 3. **Detection** (`detectors`): Find extrema of the baseline-subtracted
//!    current with the selected strategy (prominence, derivative, gaussian).
//!
//! 4. **Validation** (`validation`): Threshold, deduplicate and optionally
//!    reduce to the dominant oxidation/reduction pair.
//!
//! `summary` derives ΔEp, E½ and the current ratio from a result, and
//! `batch` runs many traces in parallel.
//!
//! # Usage
//!
//! ```ignore
//! use cv_core::analysis::{detect, summarize, PipelineConfig};
//!
//! let result = detect(&trace, "prominence", &PipelineConfig::default())?;
//! for peak in result.enabled_peaks() {
//!     println!("{} at {:.3} V, {:.2} µA", peak.peak_type, peak.voltage, peak.height);
//! }
//! let summary = summarize(&result);
//! ```

pub mod baseline;
pub mod batch;
pub mod detectors;
pub mod filtering;
pub mod pipeline;
pub mod regression;
pub mod segmentation;
pub mod summary;
pub mod types;
pub mod validation;

// Re-export main types from types module
pub use types::{
    AnalysisError, AnalysisResult, BaselineIssue, BaselineModel, DetectionResult, Peak,
    PeakCandidate, Segment,
};

// Re-export stage entry points and their configs
pub use baseline::{fit_all_baselines, fit_baseline, subtract_baseline, BaselineConfig};
pub use segmentation::{segment, segment_voltage, turning_points, SegmentationConfig};
pub use validation::{validate, ValidationConfig, VoltageWindow};

// Re-export detector trait, implementations, and factory functions
pub use detectors::{
    available_strategies, create_detector, create_from_enum, DerivativeDetector,
    DetectionConfig, GaussianDetector, PeakDetector, ProminenceDetector,
};

// Re-export pipeline, summary and batch
pub use batch::{process_batch, BatchConfig, BatchError, BatchReport, TraceOutcome};
pub use pipeline::{detect, detect_with, PipelineConfig};
pub use summary::{summarize, RedoxSummary};

// Re-export shared statistics
pub use regression::{linear_regression, LinearFit};
