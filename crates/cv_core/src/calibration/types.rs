//! Types for cross-instrument calibration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{AlignmentPolicy, CalibrationQuality};

/// Identifies a calibration: which instrument is corrected onto which,
/// under which measurement condition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CalibrationKey {
    /// Instrument whose readings are the reference.
    pub reference_instrument: String,
    /// Instrument being corrected.
    pub target_instrument: String,
    /// Measurement condition (analyte, electrolyte, scan rate label, ...).
    pub condition: String,
}

impl CalibrationKey {
    /// Create a new key.
    pub fn new(
        reference_instrument: impl Into<String>,
        target_instrument: impl Into<String>,
        condition: impl Into<String>,
    ) -> Self {
        Self {
            reference_instrument: reference_instrument.into(),
            target_instrument: target_instrument.into(),
            condition: condition.into(),
        }
    }

    /// Registry id: `reference|target|condition`.
    pub fn id(&self) -> String {
        format!(
            "{}|{}|{}",
            self.reference_instrument, self.target_instrument, self.condition
        )
    }
}

impl std::fmt::Display for CalibrationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// Samples the calibration was fitted from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleConditions {
    /// Sample id of the reference trace.
    pub reference_sample_id: String,
    /// Sample id of the target trace.
    pub target_sample_id: String,
    /// Reference scan rate (mV/s), if known.
    #[serde(default)]
    pub reference_scan_rate_mv_per_s: Option<f64>,
    /// Target scan rate (mV/s), if known.
    #[serde(default)]
    pub target_scan_rate_mv_per_s: Option<f64>,
}

/// Fitted linear mapping between two instruments.
///
/// The stored coefficients describe the forward direction observed in the
/// data: `target ≈ reference · slope + offset`. Correcting a target trace
/// uses the inverse (`correction_slope`, `correction_offset`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationModel {
    /// Registry key.
    pub key: CalibrationKey,
    /// Current slope (target per reference).
    pub current_slope: f64,
    /// Current offset (µA).
    pub current_offset: f64,
    /// Voltage slope (1.0 if not fitted).
    pub voltage_slope: f64,
    /// Voltage offset (V, 0.0 if not fitted).
    pub voltage_offset: f64,
    /// Whether the voltage mapping was fitted and is applied.
    pub voltage_fitted: bool,
    /// R² of the current fit.
    pub r2: f64,
    /// R² of the voltage fit, if fitted.
    pub voltage_r2: Option<f64>,
    /// Quality band of the current fit.
    pub quality: CalibrationQuality,
    /// Number of aligned points used.
    pub aligned_points: usize,
    /// Alignment policy used.
    pub alignment: AlignmentPolicy,
    /// When the fit was made.
    pub fitted_at: DateTime<Utc>,
    /// Samples the fit came from.
    pub sample_conditions: SampleConditions,
}

impl CalibrationModel {
    /// Registry id of this model.
    pub fn id(&self) -> String {
        self.key.id()
    }

    /// Slope mapping target current back onto the reference.
    pub fn correction_slope(&self) -> f64 {
        1.0 / self.current_slope
    }

    /// Offset mapping target current back onto the reference (µA).
    pub fn correction_offset(&self) -> f64 {
        -self.current_offset / self.current_slope
    }

    /// Voltage correction as (slope, offset); identity when not fitted.
    pub fn voltage_correction(&self) -> (f64, f64) {
        if self.voltage_fitted {
            (
                1.0 / self.voltage_slope,
                -self.voltage_offset / self.voltage_slope,
            )
        } else {
            (1.0, 0.0)
        }
    }
}

/// Options for the calibrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationOptions {
    /// How traces of different length are paired.
    pub alignment: AlignmentPolicy,
    /// Also fit a voltage mapping.
    pub fit_voltage: bool,
    /// Minimum number of aligned points.
    pub min_aligned_points: usize,
    /// Tolerance for the peak pairing check (V).
    pub pairing_tolerance_v: f64,
}

impl Default for CalibrationOptions {
    fn default() -> Self {
        Self {
            alignment: AlignmentPolicy::Truncate,
            fit_voltage: false,
            min_aligned_points: 5,
            pairing_tolerance_v: 0.05,
        }
    }
}

/// Errors that can occur during calibration.
#[derive(Error, Debug)]
pub enum CalibrationError {
    #[error("Insufficient overlap: {aligned} aligned points, need at least {required}")]
    InsufficientOverlap { aligned: usize, required: usize },

    #[error("Degenerate fit: {0}")]
    DegenerateFit(String),

    #[error("Calibration registry I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to (de)serialize calibration registry: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for calibration operations.
pub type CalibrationResult<T> = Result<T, CalibrationError>;
