//! Redox pair summary derived from a detection result.

use serde::{Deserialize, Serialize};

use crate::models::PeakType;

use super::types::{DetectionResult, Peak};

/// Nernstian peak separation for a one-electron reversible couple at 25 °C (V).
pub const NERNSTIAN_SEPARATION_V: f64 = 0.059;

/// Dominant oxidation/reduction pair and the quantities derived from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedoxSummary {
    /// Highest enabled oxidation peak.
    pub oxidation: Option<Peak>,
    /// Highest enabled reduction peak.
    pub reduction: Option<Peak>,
    /// ΔEp = E(ox) - E(red) (V).
    pub peak_separation_v: Option<f64>,
    /// E½ = (E(ox) + E(red)) / 2 (V).
    pub formal_potential_v: Option<f64>,
    /// Oxidation height over reduction height.
    pub current_ratio: Option<f64>,
}

impl RedoxSummary {
    /// Check if both halves of the couple were found.
    pub fn has_pair(&self) -> bool {
        self.oxidation.is_some() && self.reduction.is_some()
    }

    /// Apparent electron count from the Nernstian separation.
    pub fn apparent_electrons(&self) -> Option<f64> {
        self.peak_separation_v
            .filter(|sep| sep.abs() > f64::EPSILON)
            .map(|sep| NERNSTIAN_SEPARATION_V / sep.abs())
    }
}

/// Highest enabled peak of one polarity; ties go to the lower index.
fn dominant(result: &DetectionResult, peak_type: PeakType) -> Option<Peak> {
    result
        .peaks_of_type(peak_type)
        .min_by(|a, b| b.height.total_cmp(&a.height).then(a.index.cmp(&b.index)))
        .cloned()
}

/// Summarize the dominant redox couple of a detection result.
pub fn summarize(result: &DetectionResult) -> RedoxSummary {
    let oxidation = dominant(result, PeakType::Oxidation);
    let reduction = dominant(result, PeakType::Reduction);

    let (peak_separation_v, formal_potential_v, current_ratio) = match (&oxidation, &reduction) {
        (Some(ox), Some(red)) => (
            Some(ox.voltage - red.voltage),
            Some((ox.voltage + red.voltage) / 2.0),
            (red.height > 0.0).then(|| ox.height / red.height),
        ),
        _ => (None, None, None),
    };

    RedoxSummary {
        oxidation,
        reduction,
        peak_separation_v,
        formal_potential_v,
        current_ratio,
    }
}
