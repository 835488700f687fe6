//! Peak validation: filtering, deduplication and dominant-peak reduction.
//!
//! Validation never invents peaks. It drops candidates that fail the
//! configured thresholds, removes same-polarity duplicates and optionally
//! disables everything but the strongest oxidation/reduction pair.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::models::PeakType;

use super::types::{Peak, PeakCandidate};

/// Inclusive voltage bounds. `None` on either side is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoltageWindow {
    /// Lower bound (V).
    pub min: Option<f64>,
    /// Upper bound (V).
    pub max: Option<f64>,
}

impl VoltageWindow {
    /// Create a bounded window.
    pub fn new(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    /// Check whether a voltage lies in the window.
    pub fn contains(&self, voltage: f64) -> bool {
        self.min.map_or(true, |min| voltage >= min) && self.max.map_or(true, |max| voltage <= max)
    }
}

/// Configuration for peak validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Minimum confidence (0 - 100).
    pub confidence_threshold: f64,
    /// Minimum height (µA).
    pub min_peak_height: f64,
    /// Allowed voltages for oxidation peaks.
    pub oxidation_window: VoltageWindow,
    /// Allowed voltages for reduction peaks.
    pub reduction_window: VoltageWindow,
    /// Same-polarity candidates closer than this are duplicates (V).
    pub dedup_tolerance_v: f64,
    /// Keep only the strongest oxidation and reduction peak enabled.
    pub dominant_only: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 20.0,
            min_peak_height: 0.0,
            oxidation_window: VoltageWindow::default(),
            reduction_window: VoltageWindow::default(),
            dedup_tolerance_v: 0.01,
            dominant_only: false,
        }
    }
}

impl ValidationConfig {
    fn window_for(&self, peak_type: PeakType) -> &VoltageWindow {
        match peak_type {
            PeakType::Oxidation => &self.oxidation_window,
            PeakType::Reduction => &self.reduction_window,
        }
    }
}

/// Validate detector candidates into the final peak list.
///
/// Output is sorted by voltage ascending (ties by index).
pub fn validate(candidates: Vec<PeakCandidate>, config: &ValidationConfig) -> Vec<Peak> {
    let total = candidates.len();

    let passing: Vec<PeakCandidate> = candidates
        .into_iter()
        .filter(|c| c.height > 0.0 && c.height >= config.min_peak_height)
        .filter(|c| c.confidence >= config.confidence_threshold)
        .filter(|c| config.window_for(c.peak_type).contains(c.voltage))
        .collect();
    let filtered = passing.len();

    let kept = deduplicate(passing, config.dedup_tolerance_v);

    let mut peaks: Vec<Peak> = kept.into_iter().map(Peak::from).collect();

    if config.dominant_only && peaks.len() > 2 {
        reduce_to_dominant(&mut peaks);
    }

    peaks.sort_by(|a, b| {
        a.voltage
            .total_cmp(&b.voltage)
            .then(a.index.cmp(&b.index))
    });

    tracing::debug!(
        "Validation: {} candidate(s), {} passed filters, {} after dedup, {} enabled",
        total,
        filtered,
        peaks.len(),
        peaks.iter().filter(|p| p.enabled).count()
    );

    peaks
}

/// Preference order for duplicates: higher confidence, then higher height,
/// then lower index.
fn prefer(a: &PeakCandidate, b: &PeakCandidate) -> Ordering {
    b.confidence
        .total_cmp(&a.confidence)
        .then(b.height.total_cmp(&a.height))
        .then(a.index.cmp(&b.index))
}

/// Remove same-polarity candidates within `tolerance` volts of a preferred one.
///
/// Only candidates from the same segment are compared; later cycles revisit
/// the same potentials and keep their own peaks.
fn deduplicate(mut candidates: Vec<PeakCandidate>, tolerance: f64) -> Vec<PeakCandidate> {
    candidates.sort_by(prefer);

    let mut kept: Vec<PeakCandidate> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let duplicate = kept.iter().any(|k| {
            k.segment_index == candidate.segment_index
                && k.peak_type == candidate.peak_type
                && (k.voltage - candidate.voltage).abs() <= tolerance
        });
        if duplicate {
            tracing::trace!(
                "Dropping duplicate {} candidate at {:.4} V",
                candidate.peak_type,
                candidate.voltage
            );
        } else {
            kept.push(candidate);
        }
    }

    kept
}

/// Keep only the highest oxidation and highest reduction peak enabled.
fn reduce_to_dominant(peaks: &mut [Peak]) {
    let strongest = |peak_type: PeakType, peaks: &[Peak]| {
        peaks
            .iter()
            .filter(|p| p.peak_type == peak_type)
            .min_by(|a, b| b.height.total_cmp(&a.height).then(a.index.cmp(&b.index)))
            .map(|p| p.index)
    };

    let oxidation = strongest(PeakType::Oxidation, peaks);
    let reduction = strongest(PeakType::Reduction, peaks);

    for peak in peaks.iter_mut() {
        let dominant = match peak.peak_type {
            PeakType::Oxidation => oxidation == Some(peak.index),
            PeakType::Reduction => reduction == Some(peak.index),
        };
        peak.enabled = dominant;
    }
}
