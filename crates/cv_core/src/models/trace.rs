//! Cyclic voltammetry trace and its acquisition metadata.

use serde::{Deserialize, Serialize};

use crate::analysis::{AnalysisError, AnalysisResult};

/// Minimum number of points for any trace the pipeline accepts.
pub const MIN_TRACE_POINTS: usize = 3;

/// Acquisition metadata carried alongside a trace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraceMetadata {
    /// Sample identifier (e.g., "dopamine_10uM").
    pub sample_id: String,
    /// Instrument identifier (e.g., "palmsens_4").
    pub instrument_id: String,
    /// Scan rate in mV/s, if known.
    #[serde(default)]
    pub scan_rate_mv_per_s: Option<f64>,
    /// Original file name, used when reporting failures.
    #[serde(default)]
    pub source_name: Option<String>,
}

impl TraceMetadata {
    /// Create metadata for a sample measured on an instrument.
    pub fn new(sample_id: impl Into<String>, instrument_id: impl Into<String>) -> Self {
        Self {
            sample_id: sample_id.into(),
            instrument_id: instrument_id.into(),
            scan_rate_mv_per_s: None,
            source_name: None,
        }
    }

    /// Set the scan rate in mV/s.
    pub fn with_scan_rate(mut self, scan_rate_mv_per_s: f64) -> Self {
        self.scan_rate_mv_per_s = Some(scan_rate_mv_per_s);
        self
    }

    /// Set the source file name.
    pub fn with_source_name(mut self, source_name: impl Into<String>) -> Self {
        self.source_name = Some(source_name.into());
        self
    }

    /// Label used in logs and failure reports (file name if known, else sample id).
    pub fn display_name(&self) -> &str {
        self.source_name.as_deref().unwrap_or(&self.sample_id)
    }
}

/// Paired voltage/current sequence of one CV measurement.
///
/// Currents are in micro-amperes; the loader is responsible for scaling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvTrace {
    /// Applied voltage in volts.
    pub voltage: Vec<f64>,
    /// Measured current in µA.
    pub current: Vec<f64>,
    /// Acquisition metadata.
    pub metadata: TraceMetadata,
}

impl CvTrace {
    /// Create a validated trace.
    ///
    /// Fails if lengths differ, fewer than 3 points are given or any value
    /// is not finite.
    pub fn new(
        voltage: Vec<f64>,
        current: Vec<f64>,
        metadata: TraceMetadata,
    ) -> AnalysisResult<Self> {
        let trace = Self {
            voltage,
            current,
            metadata,
        };
        trace.validate()?;
        Ok(trace)
    }

    /// Check the trace invariants.
    pub fn validate(&self) -> AnalysisResult<()> {
        if self.voltage.len() != self.current.len() {
            return Err(AnalysisError::InvalidTrace(format!(
                "voltage has {} points but current has {}",
                self.voltage.len(),
                self.current.len()
            )));
        }

        if self.voltage.len() < MIN_TRACE_POINTS {
            return Err(AnalysisError::InsufficientData {
                points: self.voltage.len(),
                required: MIN_TRACE_POINTS,
            });
        }

        if let Some(idx) = self.voltage.iter().position(|v| !v.is_finite()) {
            return Err(AnalysisError::InvalidTrace(format!(
                "non-finite voltage at index {}",
                idx
            )));
        }

        if let Some(idx) = self.current.iter().position(|c| !c.is_finite()) {
            return Err(AnalysisError::InvalidTrace(format!(
                "non-finite current at index {}",
                idx
            )));
        }

        Ok(())
    }

    /// Get the number of points.
    pub fn len(&self) -> usize {
        self.voltage.len()
    }

    /// Check if the trace has no points.
    pub fn is_empty(&self) -> bool {
        self.voltage.is_empty()
    }

    /// Voltage range as (min, max).
    pub fn voltage_range(&self) -> (f64, f64) {
        min_max(&self.voltage)
    }

    /// Current range as (min, max).
    pub fn current_range(&self) -> (f64, f64) {
        min_max(&self.current)
    }

    /// Same trace with currents replaced.
    pub fn with_current(&self, current: Vec<f64>) -> Self {
        Self {
            voltage: self.voltage.clone(),
            current,
            metadata: self.metadata.clone(),
        }
    }
}

fn min_max(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        })
}
