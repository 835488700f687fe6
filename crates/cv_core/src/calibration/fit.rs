//! Calibration fitting and application.
//!
//! A calibration pairs a reference trace with a target trace of the same
//! sample, fits `target = slope · reference + offset` on the aligned
//! currents (and optionally voltages) and stores the mapping. Applying it
//! inverts the mapping so corrected target readings land on the reference
//! instrument's scale.

use std::sync::Arc;

use chrono::Utc;

use crate::analysis::regression::{linear_regression, std_dev, LinearFit};
use crate::models::{AlignmentPolicy, CalibrationQuality, CvTrace};

use super::registry::CalibrationRegistry;
use super::types::{
    CalibrationError, CalibrationKey, CalibrationModel, CalibrationOptions, CalibrationResult,
    SampleConditions,
};

/// Reference and target samples paired point by point.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlignedPair {
    pub reference_voltage: Vec<f64>,
    pub reference_current: Vec<f64>,
    pub target_voltage: Vec<f64>,
    pub target_current: Vec<f64>,
}

impl AlignedPair {
    /// Number of aligned points.
    pub fn len(&self) -> usize {
        self.reference_current.len()
    }

    /// Check if no points were aligned.
    pub fn is_empty(&self) -> bool {
        self.reference_current.is_empty()
    }
}

/// Pair two traces point by point.
pub fn align(reference: &CvTrace, target: &CvTrace, policy: AlignmentPolicy) -> AlignedPair {
    match policy {
        AlignmentPolicy::Truncate => {
            let n = reference.len().min(target.len());
            AlignedPair {
                reference_voltage: reference.voltage[..n].to_vec(),
                reference_current: reference.current[..n].to_vec(),
                target_voltage: target.voltage[..n].to_vec(),
                target_current: target.current[..n].to_vec(),
            }
        }
        AlignmentPolicy::Resample => {
            if reference.len() >= target.len() {
                let (voltage, current) = resample_onto(reference, target.len());
                AlignedPair {
                    reference_voltage: voltage,
                    reference_current: current,
                    target_voltage: target.voltage.clone(),
                    target_current: target.current.clone(),
                }
            } else {
                let (voltage, current) = resample_onto(target, reference.len());
                AlignedPair {
                    reference_voltage: reference.voltage.clone(),
                    reference_current: reference.current.clone(),
                    target_voltage: voltage,
                    target_current: current,
                }
            }
        }
    }
}

/// Linearly interpolate a trace onto `count` evenly spaced scan-progress
/// positions (index fraction from 0 to 1).
fn resample_onto(trace: &CvTrace, count: usize) -> (Vec<f64>, Vec<f64>) {
    let last = trace.len().saturating_sub(1);
    let interpolate = |values: &[f64], position: f64| {
        let k = (position.floor() as usize).min(last);
        if k >= last {
            return values[last];
        }
        let frac = position - k as f64;
        values[k] + frac * (values[k + 1] - values[k])
    };

    (0..count)
        .map(|j| {
            let position = if count > 1 {
                j as f64 * last as f64 / (count - 1) as f64
            } else {
                0.0
            };
            (
                interpolate(&trace.voltage, position),
                interpolate(&trace.current, position),
            )
        })
        .unzip()
}

/// Fits, applies and stores cross-instrument calibrations.
#[derive(Debug, Clone, Default)]
pub struct Calibrator {
    options: CalibrationOptions,
}

impl Calibrator {
    /// Create a calibrator with the given options.
    pub fn new(options: CalibrationOptions) -> Self {
        Self { options }
    }

    /// Get the options.
    pub fn options(&self) -> &CalibrationOptions {
        &self.options
    }

    /// Fit a calibration mapping `target` onto `reference`.
    ///
    /// Instruments are taken from the traces' metadata.
    pub fn fit(
        &self,
        reference: &CvTrace,
        target: &CvTrace,
        condition: &str,
    ) -> CalibrationResult<CalibrationModel> {
        let aligned = align(reference, target, self.options.alignment);
        if aligned.len() < self.options.min_aligned_points {
            return Err(CalibrationError::InsufficientOverlap {
                aligned: aligned.len(),
                required: self.options.min_aligned_points,
            });
        }

        let current_fit = fit_axis(&aligned.reference_current, &aligned.target_current, "current")?;

        let voltage_fit = if self.options.fit_voltage {
            Some(fit_axis(
                &aligned.reference_voltage,
                &aligned.target_voltage,
                "voltage",
            )?)
        } else {
            None
        };

        let quality = CalibrationQuality::from_r2(current_fit.r_squared);
        let key = CalibrationKey::new(
            reference.metadata.instrument_id.clone(),
            target.metadata.instrument_id.clone(),
            condition,
        );

        tracing::debug!(
            "Calibration {}: slope={:.4}, offset={:.4}, R²={:.4} ({}) over {} points",
            key,
            current_fit.slope,
            current_fit.intercept,
            current_fit.r_squared,
            quality,
            aligned.len()
        );
        if quality == CalibrationQuality::Fair {
            tracing::warn!(
                "Calibration {} has low fit quality (R²={:.3})",
                key,
                current_fit.r_squared
            );
        }

        Ok(CalibrationModel {
            key,
            current_slope: current_fit.slope,
            current_offset: current_fit.intercept,
            voltage_slope: voltage_fit.map_or(1.0, |f| f.slope),
            voltage_offset: voltage_fit.map_or(0.0, |f| f.intercept),
            voltage_fitted: voltage_fit.is_some(),
            r2: current_fit.r_squared,
            voltage_r2: voltage_fit.map(|f| f.r_squared),
            quality,
            aligned_points: aligned.len(),
            alignment: self.options.alignment,
            fitted_at: Utc::now(),
            sample_conditions: SampleConditions {
                reference_sample_id: reference.metadata.sample_id.clone(),
                target_sample_id: target.metadata.sample_id.clone(),
                reference_scan_rate_mv_per_s: reference.metadata.scan_rate_mv_per_s,
                target_scan_rate_mv_per_s: target.metadata.scan_rate_mv_per_s,
            },
        })
    }

    /// Fit a calibration and store it, replacing any model under the same key.
    pub fn fit_and_store(
        &self,
        registry: &CalibrationRegistry,
        reference: &CvTrace,
        target: &CvTrace,
        condition: &str,
    ) -> CalibrationResult<Arc<CalibrationModel>> {
        let model = Arc::new(self.fit(reference, target, condition)?);
        if registry.put_arc(Arc::clone(&model)).is_some() {
            tracing::debug!("Replaced existing calibration {}", model.key);
        }
        Ok(model)
    }

    /// Correct a target trace onto the reference instrument's scale.
    ///
    /// Voltage is corrected only when the model fitted it. The corrected
    /// trace carries the reference instrument id.
    pub fn apply(&self, model: &CalibrationModel, target: &CvTrace) -> CvTrace {
        apply(model, target)
    }
}

/// Correct a target trace with a calibration model.
pub fn apply(model: &CalibrationModel, target: &CvTrace) -> CvTrace {
    let slope = model.correction_slope();
    let offset = model.correction_offset();
    let (v_slope, v_offset) = model.voltage_correction();

    let mut metadata = target.metadata.clone();
    metadata.instrument_id = model.key.reference_instrument.clone();

    CvTrace {
        voltage: target.voltage.iter().map(|v| v * v_slope + v_offset).collect(),
        current: target.current.iter().map(|c| c * slope + offset).collect(),
        metadata,
    }
}

/// OLS of target on reference for one axis, rejecting degenerate inputs.
fn fit_axis(reference: &[f64], target: &[f64], axis: &str) -> CalibrationResult<LinearFit> {
    if std_dev(reference) <= f64::EPSILON {
        return Err(CalibrationError::DegenerateFit(format!(
            "reference {} has no variance",
            axis
        )));
    }

    let fit = linear_regression(reference, target).ok_or_else(|| {
        CalibrationError::DegenerateFit(format!("reference {} has no variance", axis))
    })?;

    let target_scale = target.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    let reference_scale = reference.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    let slope_floor = 1e-9 * target_scale.max(f64::MIN_POSITIVE) / reference_scale.max(f64::MIN_POSITIVE);
    if !fit.slope.is_finite() || fit.slope.abs() <= slope_floor {
        return Err(CalibrationError::DegenerateFit(format!(
            "fitted {} slope is ~0 ({:.3e})",
            axis, fit.slope
        )));
    }

    Ok(fit)
}
