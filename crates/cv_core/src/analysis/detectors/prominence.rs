//! Prominence-based peak detection.
//!
//! Local maxima of the baseline-subtracted current are oxidation
//! candidates, local minima are reduction candidates. Each extremum must
//! reach the segment threshold above the baseline, stand out from its
//! surrounding valleys by at least that much and be wide enough at the
//! configured height fraction. Of the extrema sharing one lobe only the
//! highest is kept.

use crate::analysis::types::{BaselineModel, PeakCandidate, Segment};
use crate::models::{CvTrace, PeakType};

use super::{
    dominant_per_lobe, local_maxima, prominence, DetectionConfig, PeakDetector, SegmentSignal,
};

/// Detector keyed on prominence and width.
pub struct ProminenceDetector;

impl ProminenceDetector {
    /// Create a new prominence detector.
    pub fn new() -> Self {
        Self
    }
}

impl Default for ProminenceDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// Prominence candidates of one polarity, in index order.
pub(crate) fn prominence_candidates(
    signal: &SegmentSignal<'_>,
    peak_type: PeakType,
    config: &DetectionConfig,
) -> Vec<PeakCandidate> {
    let oriented = signal.oriented(peak_type);
    let threshold = signal.threshold();

    let apexes: Vec<usize> = local_maxima(&oriented)
        .into_iter()
        .filter(|&k| oriented[k] > 0.0 && oriented[k] >= threshold)
        .filter(|&k| prominence(&oriented, k).value >= threshold)
        .collect();

    dominant_per_lobe(&apexes, &oriented, config.width_fraction)
        .into_iter()
        .filter_map(|k| signal.candidate(k, peak_type, &oriented, config))
        .collect()
}

impl PeakDetector for ProminenceDetector {
    fn name(&self) -> &'static str {
        "prominence"
    }

    fn description(&self) -> &str {
        "Local extrema filtered by prominence and width"
    }

    fn detect(
        &self,
        trace: &CvTrace,
        segment: &Segment,
        segment_index: usize,
        baseline: &BaselineModel,
        config: &DetectionConfig,
    ) -> Vec<PeakCandidate> {
        let signal = SegmentSignal::new(trace, segment, segment_index, baseline, config);
        if signal.len() < 3 {
            return Vec::new();
        }

        let mut candidates = prominence_candidates(&signal, PeakType::Oxidation, config);
        candidates.extend(prominence_candidates(&signal, PeakType::Reduction, config));
        candidates.sort_by_key(|c| c.index);

        tracing::debug!(
            "Prominence detector: segment {} produced {} candidate(s)",
            segment_index,
            candidates.len()
        );

        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::forward_segment;
    use super::*;

    #[test]
    fn finds_single_oxidation_peak() {
        let (trace, segment, baseline) = forward_segment(&[(4.0, 0.15, 0.03)]);
        let peaks =
            ProminenceDetector::new().detect(&trace, &segment, 0, &baseline, &DetectionConfig::default());

        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].peak_type, PeakType::Oxidation);
        assert!((peaks[0].voltage - 0.15).abs() < 0.005);
        assert!((peaks[0].height - 4.0).abs() < 0.01);
        assert!(segment.contains(peaks[0].index));
    }

    #[test]
    fn finds_reduction_dip() {
        let (trace, segment, baseline) = forward_segment(&[(-3.0, 0.05, 0.03)]);
        let peaks =
            ProminenceDetector::new().detect(&trace, &segment, 0, &baseline, &DetectionConfig::default());

        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].peak_type, PeakType::Reduction);
        assert!((peaks[0].height - 3.0).abs() < 0.01);
    }

    #[test]
    fn flat_residual_has_no_peaks() {
        let (trace, segment, baseline) = forward_segment(&[]);
        let peaks =
            ProminenceDetector::new().detect(&trace, &segment, 0, &baseline, &DetectionConfig::default());
        assert!(peaks.is_empty());
    }

    #[test]
    fn small_bump_below_relative_threshold_is_ignored() {
        // 0.1 µA shoulder next to a 4 µA peak is under 5% of max|r|
        let (trace, segment, baseline) = forward_segment(&[(4.0, 0.0, 0.03), (0.1, 0.35, 0.01)]);
        let peaks =
            ProminenceDetector::new().detect(&trace, &segment, 0, &baseline, &DetectionConfig::default());
        assert_eq!(peaks.len(), 1);
        assert!((peaks[0].voltage - 0.0).abs() < 0.005);
    }

    #[test]
    fn override_replaces_threshold() {
        let (trace, segment, baseline) = forward_segment(&[(4.0, 0.15, 0.03)]);
        let config = DetectionConfig {
            prominence_override: Some(10.0),
            ..Default::default()
        };
        let peaks = ProminenceDetector::new().detect(&trace, &segment, 0, &baseline, &config);
        assert!(peaks.is_empty());
    }

    #[test]
    fn blip_rising_out_of_a_valley_needs_height() {
        // 0.3 µA blip sitting in a -0.4 µA trough: prominent, but low
        let (mut trace, segment, baseline) = forward_segment(&[(-0.4, 0.2, 0.05)]);
        let blip = [0.1, 0.2, 0.25, 0.3, 0.25, 0.2, 0.1];
        for (offset, bump) in blip.iter().enumerate() {
            trace.current[197 + offset] = 1.0 + bump;
        }
        let config = DetectionConfig {
            prominence_override: Some(0.5),
            ..Default::default()
        };
        let peaks = ProminenceDetector::new().detect(&trace, &segment, 0, &baseline, &config);
        assert!(peaks.iter().all(|p| p.peak_type == PeakType::Reduction), "{:?}", peaks);
    }

    #[test]
    fn unresolved_shoulder_collapses_into_main_peak() {
        // Shoulder maximum near 0.217 V, valley above half its height
        let (trace, segment, baseline) =
            forward_segment(&[(4.0, 0.15, 0.03), (2.5, 0.22, 0.02)]);
        let peaks =
            ProminenceDetector::new().detect(&trace, &segment, 0, &baseline, &DetectionConfig::default());

        assert_eq!(peaks.len(), 1, "{:?}", peaks);
        assert!((peaks[0].voltage - 0.15).abs() < 0.01);
    }

    #[test]
    fn narrow_spike_fails_width_check() {
        let (mut trace, segment, baseline) = forward_segment(&[]);
        trace.current[100] = 6.0;
        let peaks =
            ProminenceDetector::new().detect(&trace, &segment, 0, &baseline, &DetectionConfig::default());
        assert!(peaks.is_empty());
    }
}
