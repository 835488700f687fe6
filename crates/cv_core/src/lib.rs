//! CV Core - cyclic voltammetry peak analysis
//!
//! This crate turns raw voltage/current sweeps into redox peak measurements:
//! sweep segmentation, per-segment baselines, pluggable peak detectors,
//! validation, batch processing and cross-instrument calibration.
//! It has no I/O beyond config and calibration persistence, so it can sit
//! behind a CLI, a service or a GUI.

pub mod analysis;
pub mod calibration;
pub mod config;
pub mod logging;
pub mod models;

pub use analysis::{detect, AnalysisError, AnalysisResult, DetectionResult, PipelineConfig};
pub use models::{CvTrace, TraceMetadata};

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
