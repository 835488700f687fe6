//! Derivative zero-crossing peak detection.
//!
//! Uses a centred difference of the baseline-subtracted current taken over
//! half the segment's minimum width on each side. The derivative signs are
//! grouped into runs; runs shorter than `ceil(min_width / 2)` are absorbed
//! into their neighbours so noise at the apex neither hides the peak nor
//! splits it in two. A rising run followed by a falling run marks an
//! oxidation apex, the mirrored pattern a reduction apex.

use crate::analysis::types::{BaselineModel, PeakCandidate, Segment};
use crate::models::{CvTrace, PeakType};

use super::{dominant_per_lobe, DetectionConfig, PeakDetector, SegmentSignal};

/// Detector keyed on sign changes of the first derivative.
pub struct DerivativeDetector;

impl DerivativeDetector {
    /// Create a new derivative detector.
    pub fn new() -> Self {
        Self
    }
}

impl Default for DerivativeDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// Centred difference over `half_width` points per side, per index step.
///
/// The stencil is shortened at the ends of the signal.
fn central_difference(data: &[f64], half_width: usize) -> Vec<f64> {
    let n = data.len();
    let h = half_width.max(1);
    (0..n)
        .map(|k| {
            let lo = k.saturating_sub(h);
            let hi = (k + h).min(n - 1);
            if hi == lo {
                0.0
            } else {
                (data[hi] - data[lo]) / (hi - lo) as f64
            }
        })
        .collect()
}

/// Consecutive derivative samples of one sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SignRun {
    rising: bool,
    start: usize,
    end: usize,
}

fn sign_of(x: f64) -> i8 {
    if x > 0.0 {
        1
    } else if x < 0.0 {
        -1
    } else {
        0
    }
}

/// Sign runs at least `sustain` samples long.
///
/// Zero samples and shorter runs are skipped, and runs of the same sign
/// left adjacent by that are merged.
fn sign_runs(d: &[f64], sustain: usize) -> Vec<SignRun> {
    let mut runs: Vec<SignRun> = Vec::new();
    let mut k = 0;

    while k < d.len() {
        let sign = sign_of(d[k]);
        let start = k;
        while k < d.len() && sign_of(d[k]) == sign {
            k += 1;
        }
        if sign == 0 || k - start < sustain {
            continue;
        }

        let rising = sign > 0;
        match runs.last_mut() {
            Some(last) if last.rising == rising => last.end = k - 1,
            _ => runs.push(SignRun {
                rising,
                start,
                end: k - 1,
            }),
        }
    }

    runs
}

/// Apex indices of sustained rising-then-falling stretches.
///
/// The apex is the largest sample from the start of the rising run to the
/// end of the falling run, ties to the lower index.
fn rising_to_falling(oriented: &[f64], half_width: usize, sustain: usize) -> Vec<usize> {
    let d = central_difference(oriented, half_width);

    sign_runs(&d, sustain)
        .windows(2)
        .filter(|pair| pair[0].rising && !pair[1].rising)
        .filter_map(|pair| {
            (pair[0].start..=pair[1].end)
                .max_by(|&a, &b| oriented[a].total_cmp(&oriented[b]).then(b.cmp(&a)))
        })
        .collect()
}

fn derivative_candidates(
    signal: &SegmentSignal<'_>,
    peak_type: PeakType,
    config: &DetectionConfig,
) -> Vec<PeakCandidate> {
    let oriented = signal.oriented(peak_type);
    let min_width = signal.min_width();
    let half_width = (min_width / 2).max(1);
    let sustain = min_width.div_ceil(2).max(1);
    let threshold = signal.threshold();

    let apexes: Vec<usize> = rising_to_falling(&oriented, half_width, sustain)
        .into_iter()
        .filter(|&k| oriented[k] > 0.0 && oriented[k] >= threshold)
        .collect();

    dominant_per_lobe(&apexes, &oriented, config.width_fraction)
        .into_iter()
        .filter_map(|k| signal.candidate(k, peak_type, &oriented, config))
        .collect()
}

impl PeakDetector for DerivativeDetector {
    fn name(&self) -> &'static str {
        "derivative"
    }

    fn description(&self) -> &str {
        "Sustained zero crossings of the first derivative"
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

        let mut candidates = derivative_candidates(&signal, PeakType::Oxidation, config);
        candidates.extend(derivative_candidates(&signal, PeakType::Reduction, config));
        candidates.sort_by_key(|c| c.index);

        tracing::debug!(
            "Derivative detector: segment {} produced {} candidate(s)",
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
    fn central_difference_of_line_is_constant() {
        let data = [0.0, 2.0, 4.0, 6.0, 8.0, 10.0];
        assert_eq!(central_difference(&data, 1), vec![2.0; 6]);
        assert_eq!(central_difference(&data, 2), vec![2.0; 6]);
    }

    #[test]
    fn crossing_requires_sustained_sign() {
        let data = [0.0, 1.0, 2.0, 3.0, 2.0, 1.0, 0.0];
        assert_eq!(rising_to_falling(&data, 1, 2), vec![3]);
        // One-sample wiggle
        let wiggle = [0.0, 0.0, 1.0, 0.0, 0.0];
        assert!(rising_to_falling(&wiggle, 1, 2).is_empty());
    }

    #[test]
    fn sign_runs_absorb_short_flips() {
        // Noisy apex: + + + - + - - -
        let d = [1.0, 1.0, 1.0, -1.0, 1.0, -1.0, -1.0, -1.0];
        let runs = sign_runs(&d, 3);
        assert_eq!(
            runs,
            vec![
                SignRun { rising: true, start: 0, end: 2 },
                SignRun { rising: false, start: 5, end: 7 },
            ]
        );

        // A short dip inside a rise merges the rise back together
        let d = [1.0, 1.0, 1.0, -1.0, 0.0, 1.0, 1.0, 1.0, -1.0, -1.0, -1.0];
        let runs = sign_runs(&d, 3);
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0], SignRun { rising: true, start: 0, end: 7 });
    }

    #[test]
    fn flat_stretch_between_rise_and_fall_keeps_one_apex() {
        let data = [0.0, 1.0, 2.0, 3.0, 3.0, 3.0, 3.0, 2.0, 1.0, 0.0];
        assert_eq!(rising_to_falling(&data, 1, 2), vec![3]);
    }

    #[test]
    fn finds_both_polarities() {
        let (trace, segment, baseline) =
            forward_segment(&[(4.0, 0.25, 0.03), (-3.0, -0.02, 0.03)]);
        let peaks =
            DerivativeDetector::new().detect(&trace, &segment, 0, &baseline, &DetectionConfig::default());

        assert_eq!(peaks.len(), 2, "peaks: {:?}", peaks);
        assert_eq!(peaks[0].peak_type, PeakType::Reduction);
        assert!((peaks[0].voltage + 0.02).abs() < 0.005);
        assert_eq!(peaks[1].peak_type, PeakType::Oxidation);
        assert!((peaks[1].voltage - 0.25).abs() < 0.005);
    }

    #[test]
    fn agrees_with_prominence_on_clean_peak() {
        use super::super::ProminenceDetector;

        let (trace, segment, baseline) = forward_segment(&[(4.0, 0.15, 0.03)]);
        let config = DetectionConfig::default();
        let by_derivative = DerivativeDetector::new().detect(&trace, &segment, 0, &baseline, &config);
        let by_prominence = ProminenceDetector::new().detect(&trace, &segment, 0, &baseline, &config);

        assert_eq!(by_derivative.len(), 1);
        assert_eq!(by_derivative[0].index, by_prominence[0].index);
    }
}
