//! Data models for CV analysis.
//!
//! This module contains the core data structures shared by the pipeline:
//! - Enums for sweep direction, peak polarity, strategies and units
//! - The `CvTrace` input type and its metadata

mod enums;
mod trace;

// Re-export all public types
pub use enums::{
    AlignmentPolicy, BaselineMethod, BaselineWindow, CalibrationQuality, CurrentUnit,
    DetectionStrategy, IntegrationRule, PeakType, SmoothingMethod, SweepDirection,
};
pub use trace::{CvTrace, TraceMetadata, MIN_TRACE_POINTS};
