//! Peak pairing sanity check between a reference and a target result.
//!
//! A linear current calibration assumes both traces show the same redox
//! couple at about the same potentials. This compares the dominant peaks of
//! each polarity and reports the shifts. It only warns; it never blocks a fit.

use serde::{Deserialize, Serialize};

use crate::analysis::{summarize, DetectionResult};

/// Dominant peak potential shifts between two results (target - reference).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakPairing {
    /// Oxidation potential shift (V), if both results have one.
    pub oxidation_shift_v: Option<f64>,
    /// Reduction potential shift (V), if both results have one.
    pub reduction_shift_v: Option<f64>,
    /// Tolerance the shifts were checked against (V).
    pub tolerance_v: f64,
}

impl PeakPairing {
    /// Whether every available shift is within tolerance.
    pub fn is_consistent(&self) -> bool {
        [self.oxidation_shift_v, self.reduction_shift_v]
            .iter()
            .flatten()
            .all(|shift| shift.abs() <= self.tolerance_v)
    }

    /// Whether at least one polarity could be paired.
    pub fn has_pairs(&self) -> bool {
        self.oxidation_shift_v.is_some() || self.reduction_shift_v.is_some()
    }
}

/// Compare dominant peak potentials per polarity.
pub fn check_peak_pairing(
    reference: &DetectionResult,
    target: &DetectionResult,
    tolerance_v: f64,
) -> PeakPairing {
    let reference_summary = summarize(reference);
    let target_summary = summarize(target);

    let shift = |r: Option<f64>, t: Option<f64>| match (r, t) {
        (Some(r), Some(t)) => Some(t - r),
        _ => None,
    };

    let pairing = PeakPairing {
        oxidation_shift_v: shift(
            reference_summary.oxidation.as_ref().map(|p| p.voltage),
            target_summary.oxidation.as_ref().map(|p| p.voltage),
        ),
        reduction_shift_v: shift(
            reference_summary.reduction.as_ref().map(|p| p.voltage),
            target_summary.reduction.as_ref().map(|p| p.voltage),
        ),
        tolerance_v,
    };

    if !pairing.has_pairs() {
        tracing::warn!(
            "No peaks to pair between '{}' and '{}'",
            reference.sample_id,
            target.sample_id
        );
    } else if !pairing.is_consistent() {
        tracing::warn!(
            "Peak potentials of '{}' and '{}' differ beyond {:.3} V (ox {:?}, red {:?})",
            reference.sample_id,
            target.sample_id,
            tolerance_v,
            pairing.oxidation_shift_v,
            pairing.reduction_shift_v
        );
    }

    pairing
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Peak;
    use crate::models::PeakType;

    fn result(id: &str, peaks: &[(f64, PeakType)]) -> DetectionResult {
        DetectionResult {
            sample_id: id.to_string(),
            strategy: "prominence".to_string(),
            segments: Vec::new(),
            baselines: Vec::new(),
            peaks: peaks
                .iter()
                .enumerate()
                .map(|(i, &(voltage, peak_type))| Peak {
                    index: i,
                    segment_index: 0,
                    voltage,
                    current: 1.0,
                    baseline_current: 0.0,
                    height: 1.0,
                    width: 0.05,
                    area: 0.05,
                    peak_type,
                    confidence: 90.0,
                    enabled: true,
                })
                .collect(),
        }
    }

    #[test]
    fn consistent_pair_within_tolerance() {
        let reference = result("r", &[(0.15, PeakType::Oxidation), (0.05, PeakType::Reduction)]);
        let target = result("t", &[(0.17, PeakType::Oxidation), (0.04, PeakType::Reduction)]);
        let pairing = check_peak_pairing(&reference, &target, 0.05);

        assert!((pairing.oxidation_shift_v.unwrap() - 0.02).abs() < 1e-12);
        assert!((pairing.reduction_shift_v.unwrap() + 0.01).abs() < 1e-12);
        assert!(pairing.is_consistent());
    }

    #[test]
    fn shifted_peak_is_flagged() {
        let reference = result("r", &[(0.15, PeakType::Oxidation)]);
        let target = result("t", &[(0.30, PeakType::Oxidation)]);
        let pairing = check_peak_pairing(&reference, &target, 0.05);
        assert!(pairing.reduction_shift_v.is_none());
        assert!(!pairing.is_consistent());
    }

    #[test]
    fn missing_peaks_have_no_pairs() {
        let pairing = check_peak_pairing(&result("r", &[]), &result("t", &[]), 0.05);
        assert!(!pairing.has_pairs());
        assert!(pairing.is_consistent());
    }
}
