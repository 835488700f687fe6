//! Peak detection strategies for CV segments.
//!
//! This module defines the `PeakDetector` trait and its implementations.
//! Every detector works on the baseline-subtracted current of one segment
//! and reports candidates with absolute trace indices.
//!
//! Candidates are built through `SegmentSignal`, which owns the shared
//! measurements (noise, threshold, width, area, confidence) so the
//! strategies only differ in how they locate extrema.

mod derivative;
mod gaussian;
mod prominence;

pub use derivative::DerivativeDetector;
pub use gaussian::GaussianDetector;
pub use prominence::ProminenceDetector;

use serde::{Deserialize, Serialize};

use crate::analysis::filtering::smooth;
use crate::analysis::regression::difference_noise;
use crate::analysis::types::{BaselineModel, PeakCandidate, Segment};
use crate::models::{CvTrace, DetectionStrategy, IntegrationRule, PeakType, SmoothingMethod};

/// Configuration shared by all detectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Smoothing applied to the residual before extremum search.
    pub smoothing: SmoothingMethod,
    /// Smoothing window in points (odd).
    pub smoothing_window: usize,
    /// Threshold in multiples of the noise sigma.
    pub noise_multiplier: f64,
    /// Threshold as a fraction of the largest |residual| in the segment.
    pub min_relative_prominence: f64,
    /// Absolute threshold floor (µA).
    pub min_prominence: f64,
    /// Replaces the computed threshold when set (µA).
    pub prominence_override: Option<f64>,
    /// Floor for the minimum number of consecutive points above
    /// `width_fraction` of height.
    pub min_width_points: usize,
    /// Minimum width in volts, converted to points with the segment's mean
    /// voltage step. `0.0` leaves only the point floor.
    pub min_width_v: f64,
    /// Fraction of the height at which width is measured (0.0 - 1.0).
    pub width_fraction: f64,
    /// Integration rule for peak areas.
    pub integration: IntegrationRule,
    /// SNR at which the noise part of the confidence saturates.
    pub snr_saturation: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            smoothing: SmoothingMethod::None,
            smoothing_window: 5,
            noise_multiplier: 3.0,
            min_relative_prominence: 0.05,
            min_prominence: 0.0,
            prominence_override: None,
            min_width_points: 3,
            min_width_v: 0.01,
            width_fraction: 0.5,
            integration: IntegrationRule::Trapezoid,
            snr_saturation: 10.0,
        }
    }
}

/// Trait for peak detection strategies.
///
/// Implementations must only report indices inside `segment` and must be
/// deterministic for identical inputs.
pub trait PeakDetector: Send + Sync {
    /// Canonical strategy name.
    fn name(&self) -> &'static str;

    /// Short description of the strategy.
    fn description(&self) -> &str;

    /// Find peak candidates in one segment.
    ///
    /// Returns an empty vector when no extremum clears the thresholds.
    fn detect(
        &self,
        trace: &CvTrace,
        segment: &Segment,
        segment_index: usize,
        baseline: &BaselineModel,
        config: &DetectionConfig,
    ) -> Vec<PeakCandidate>;
}

/// Factory for creating detectors by name or alias (case-insensitive).
pub fn create_detector(name: &str) -> Option<Box<dyn PeakDetector>> {
    DetectionStrategy::from_name(name).map(create_from_enum)
}

/// Create a detector from the strategy enum.
pub fn create_from_enum(strategy: DetectionStrategy) -> Box<dyn PeakDetector> {
    match strategy {
        DetectionStrategy::Prominence => Box::new(ProminenceDetector::new()),
        DetectionStrategy::Derivative => Box::new(DerivativeDetector::new()),
        DetectionStrategy::Gaussian => Box::new(GaussianDetector::new()),
    }
}

/// Canonical names of the available strategies.
pub fn available_strategies() -> Vec<&'static str> {
    DetectionStrategy::all().iter().map(|s| s.name()).collect()
}

/// Prominence of an extremum and the valleys it is measured from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Prominence {
    pub value: f64,
    pub left_base: usize,
    pub right_base: usize,
}

/// Baseline-subtracted view of one segment.
pub(crate) struct SegmentSignal<'a> {
    trace: &'a CvTrace,
    segment: &'a Segment,
    segment_index: usize,
    baseline: &'a BaselineModel,
    /// Residual after optional smoothing.
    residual: Vec<f64>,
    /// Noise sigma of the unsmoothed residual.
    noise: f64,
    /// Minimum prominence / amplitude for a candidate.
    threshold: f64,
    /// Minimum width in points for this segment.
    min_width: usize,
}

impl<'a> SegmentSignal<'a> {
    pub fn new(
        trace: &'a CvTrace,
        segment: &'a Segment,
        segment_index: usize,
        baseline: &'a BaselineModel,
        config: &DetectionConfig,
    ) -> Self {
        let raw: Vec<f64> = trace.current[segment.range()]
            .iter()
            .zip(&baseline.current_at_index)
            .map(|(c, b)| c - b)
            .collect();

        let noise = difference_noise(&raw);
        let residual = smooth(&raw, config.smoothing, config.smoothing_window);

        let max_abs = residual.iter().fold(0.0_f64, |acc, r| acc.max(r.abs()));
        let threshold = config.prominence_override.unwrap_or_else(|| {
            (config.noise_multiplier * noise)
                .max(config.min_relative_prominence * max_abs)
                .max(config.min_prominence)
        });

        let min_width = min_width_for(&trace.voltage[segment.range()], config);

        tracing::trace!(
            "Segment {}: noise={:.4e} threshold={:.4e} max|r|={:.4e} min_width={}",
            segment_index,
            noise,
            threshold,
            max_abs,
            min_width
        );

        Self {
            trace,
            segment,
            segment_index,
            baseline,
            residual,
            noise,
            threshold,
            min_width,
        }
    }

    pub fn len(&self) -> usize {
        self.residual.len()
    }

    pub fn noise(&self) -> f64 {
        self.noise
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn min_width(&self) -> usize {
        self.min_width
    }

    pub fn voltage(&self) -> &[f64] {
        &self.trace.voltage[self.segment.range()]
    }

    /// Residual flipped so that peaks of `peak_type` point upwards.
    pub fn oriented(&self, peak_type: PeakType) -> Vec<f64> {
        match peak_type {
            PeakType::Oxidation => self.residual.clone(),
            PeakType::Reduction => self.residual.iter().map(|r| -r).collect(),
        }
    }

    /// Voltage at a fractional segment index.
    pub fn voltage_at(&self, position: f64) -> f64 {
        let voltage = self.voltage();
        let last = voltage.len() - 1;
        let position = position.clamp(0.0, last as f64);
        let k = (position.floor() as usize).min(last);
        if k == last {
            return voltage[last];
        }
        let frac = position - k as f64;
        voltage[k] + frac * (voltage[k + 1] - voltage[k])
    }

    /// Measure a candidate at segment-relative index `local`.
    ///
    /// Returns `None` if the raw current does not sit on the expected side
    /// of the baseline or the extremum is narrower than the segment's
    /// minimum width.
    pub fn candidate(
        &self,
        local: usize,
        peak_type: PeakType,
        oriented: &[f64],
        config: &DetectionConfig,
    ) -> Option<PeakCandidate> {
        let index = self.segment.start_index + local;
        let current = self.trace.current[index];
        let baseline_current = self.baseline.current_at_index[local];

        if PeakType::classify(current, baseline_current) != peak_type {
            return None;
        }
        let height = peak_type.height(current, baseline_current);
        let apex = oriented[local];
        if height <= 0.0 || apex <= 0.0 {
            return None;
        }

        let level = config.width_fraction.clamp(0.0, 1.0) * apex;
        let (lo, hi) = width_extent(oriented, local, level);
        if hi - lo + 1 < self.min_width {
            return None;
        }

        let left_ips = interpolate_crossing(oriented, local, level, true);
        let right_ips = interpolate_crossing(oriented, local, level, false);
        let width = (self.voltage_at(right_ips) - self.voltage_at(left_ips)).abs();

        let prominence = prominence(oriented, local);
        let (left, right) = area_bounds(oriented, local, &prominence);
        let area = integrate_abs(
            &self.residual[left..=right],
            &self.voltage()[left..=right],
            config.integration,
        );

        let shape = prominence.value.min(apex) / apex;

        Some(PeakCandidate {
            index,
            segment_index: self.segment_index,
            voltage: self.trace.voltage[index],
            current,
            baseline_current,
            height,
            width,
            width_points: right_ips - left_ips,
            area,
            prominence: prominence.value,
            peak_type,
            confidence: confidence(height, self.noise, shape, config.snr_saturation),
            noise: self.noise,
        })
    }
}

/// Minimum peak width in points for a segment with the given voltages.
///
/// `min_width_v` is converted with the mean step, an active smoothing window
/// widens it, and `min_width_points` is the floor.
pub(crate) fn min_width_for(voltage: &[f64], config: &DetectionConfig) -> usize {
    let mut width = config.min_width_points.max(1);

    if voltage.len() >= 2 && config.min_width_v > 0.0 {
        let step = (voltage[voltage.len() - 1] - voltage[0]).abs() / (voltage.len() - 1) as f64;
        let points = (config.min_width_v / step).round();
        if points.is_finite() {
            width = width.max(points as usize);
        }
    }

    if config.smoothing != SmoothingMethod::None {
        width = width.max(config.smoothing_window);
    }

    width
}

/// Keep the highest apex of each lobe.
///
/// An apex is dropped when a higher apex (or an equal one at a lower index)
/// lies inside its extent at `width_fraction` of its own height. Noise
/// maxima on the cap of a peak collapse into the peak.
pub(crate) fn dominant_per_lobe(
    apexes: &[usize],
    data: &[f64],
    width_fraction: f64,
) -> Vec<usize> {
    let fraction = width_fraction.clamp(0.0, 1.0);
    apexes
        .iter()
        .copied()
        .filter(|&k| {
            let (lo, hi) = width_extent(data, k, fraction * data[k]);
            !apexes.iter().any(|&j| {
                j != k
                    && (lo..=hi).contains(&j)
                    && (data[j] > data[k] || (data[j] == data[k] && j < k))
            })
        })
        .collect()
}

/// Local maxima of a signal, plateaus reported at their midpoint.
///
/// Endpoints are never maxima.
pub(crate) fn local_maxima(data: &[f64]) -> Vec<usize> {
    let mut maxima = Vec::new();
    if data.len() < 3 {
        return maxima;
    }

    let mut i = 1;
    while i < data.len() - 1 {
        if data[i] > data[i - 1] {
            let start = i;
            while i + 1 < data.len() && data[i + 1] == data[i] {
                i += 1;
            }
            if i + 1 < data.len() && data[i + 1] < data[i] {
                maxima.push((start + i) / 2);
            }
        }
        i += 1;
    }

    maxima
}

/// Height of a maximum above the higher of its two surrounding valleys.
pub(crate) fn prominence(data: &[f64], peak: usize) -> Prominence {
    let height = data[peak];

    let mut left_min = height;
    let mut left_base = peak;
    for i in (0..peak).rev() {
        if data[i] > height {
            break;
        }
        if data[i] < left_min {
            left_min = data[i];
            left_base = i;
        }
    }

    let mut right_min = height;
    let mut right_base = peak;
    for (i, &value) in data.iter().enumerate().skip(peak + 1) {
        if value > height {
            break;
        }
        if value < right_min {
            right_min = value;
            right_base = i;
        }
    }

    Prominence {
        value: height - left_min.max(right_min),
        left_base,
        right_base,
    }
}

/// Inclusive index extent of the points at or above `level` around `peak`.
pub(crate) fn width_extent(data: &[f64], peak: usize, level: f64) -> (usize, usize) {
    let mut lo = peak;
    while lo > 0 && data[lo - 1] >= level {
        lo -= 1;
    }
    let mut hi = peak;
    while hi + 1 < data.len() && data[hi + 1] >= level {
        hi += 1;
    }
    (lo, hi)
}

/// Linearly interpolate where the signal crosses a level.
pub(crate) fn interpolate_crossing(data: &[f64], peak: usize, level: f64, go_left: bool) -> f64 {
    if go_left {
        for i in (1..=peak).rev() {
            if data[i - 1] <= level && data[i] > level {
                let frac = (level - data[i - 1]) / (data[i] - data[i - 1]);
                return (i - 1) as f64 + frac;
            }
        }
        0.0
    } else {
        for i in peak..data.len().saturating_sub(1) {
            if data[i] > level && data[i + 1] <= level {
                let frac = (data[i] - level) / (data[i] - data[i + 1]);
                return i as f64 + frac;
            }
        }
        (data.len() - 1) as f64
    }
}

/// Integration bounds: walk out from the apex until the signal returns to
/// the baseline or reaches the prominence valley.
fn area_bounds(data: &[f64], peak: usize, prominence: &Prominence) -> (usize, usize) {
    let mut left = peak;
    while left > prominence.left_base.min(peak) && data[left - 1] > 0.0 {
        left -= 1;
    }
    if left > 0 && left > prominence.left_base && data[left - 1] <= 0.0 {
        left -= 1;
    }

    let mut right = peak;
    while right < prominence.right_base.max(peak) && data[right + 1] > 0.0 {
        right += 1;
    }
    if right + 1 < data.len() && right < prominence.right_base && data[right + 1] <= 0.0 {
        right += 1;
    }

    (left, right)
}

/// Integral of |y| over |dV|.
pub(crate) fn integrate_abs(y: &[f64], voltage: &[f64], rule: IntegrationRule) -> f64 {
    if y.len() < 2 {
        return 0.0;
    }

    let h: Vec<f64> = voltage.windows(2).map(|w| (w[1] - w[0]).abs()).collect();
    let f: Vec<f64> = y.iter().map(|v| v.abs()).collect();
    let trapezoid = |k: usize| 0.5 * h[k] * (f[k] + f[k + 1]);

    match rule {
        IntegrationRule::Trapezoid => (0..h.len()).map(trapezoid).sum(),
        IntegrationRule::Simpson => {
            let mut total = 0.0;
            let mut k = 0;
            while k + 1 < h.len() {
                let (h0, h1) = (h[k], h[k + 1]);
                if h0 <= 0.0 || h1 <= 0.0 {
                    total += trapezoid(k) + trapezoid(k + 1);
                } else {
                    // Non-uniform Simpson over the interval pair
                    let sum = h0 + h1;
                    total += sum / 6.0
                        * ((2.0 - h1 / h0) * f[k]
                            + sum * sum / (h0 * h1) * f[k + 1]
                            + (2.0 - h0 / h1) * f[k + 2]);
                }
                k += 2;
            }
            if k < h.len() {
                total += trapezoid(k);
            }
            total
        }
    }
}

/// Confidence score in [0, 100] from signal-to-noise and a shape score.
///
/// The shape part is scaled by the SNR term, so a well-shaped extremum
/// that barely clears the noise still scores low.
pub(crate) fn confidence(height: f64, noise: f64, shape: f64, snr_saturation: f64) -> f64 {
    let snr_term = if noise <= 1e-12 * height.abs().max(1.0) {
        1.0
    } else {
        let snr = height / noise;
        (snr / snr_saturation.max(f64::MIN_POSITIVE)).clamp(0.0, 1.0)
    };
    (100.0 * snr_term * (0.6 + 0.4 * shape.clamp(0.0, 1.0))).clamp(0.0, 100.0)
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::analysis::types::{BaselineModel, Segment};
    use crate::models::{BaselineMethod, CvTrace, SweepDirection, TraceMetadata};

    pub fn gaussian(x: f64, center: f64, sigma: f64) -> f64 {
        (-(x - center).powi(2) / (2.0 * sigma * sigma)).exp()
    }

    /// Forward sweep with a flat 1 µA baseline and the given bumps.
    pub fn forward_segment(bumps: &[(f64, f64, f64)]) -> (CvTrace, Segment, BaselineModel) {
        let voltage: Vec<f64> = (0..351).map(|i| -0.2 + i as f64 * 0.002).collect();
        let current: Vec<f64> = voltage
            .iter()
            .map(|&v| {
                1.0 + bumps
                    .iter()
                    .map(|&(amp, center, sigma)| amp * gaussian(v, center, sigma))
                    .sum::<f64>()
            })
            .collect();
        let n = voltage.len();
        let trace = CvTrace::new(voltage, current, TraceMetadata::new("t", "inst")).unwrap();
        let segment = Segment::new(0, n, SweepDirection::Forward, 0);
        let baseline = BaselineModel {
            current_at_index: vec![1.0; n],
            method: BaselineMethod::EdgeWindows,
            quality_r2: 1.0,
            slope: Some(0.0),
            intercept: Some(1.0),
            retained_points: n,
            issue: None,
        };
        (trace, segment, baseline)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::forward_segment;
    use super::*;

    #[test]
    fn factory_creates_all_strategies() {
        for name in available_strategies() {
            let detector = create_detector(name).unwrap();
            assert_eq!(detector.name(), name);
        }
        assert_eq!(available_strategies(), vec!["prominence", "derivative", "gaussian"]);
    }

    #[test]
    fn factory_resolves_aliases() {
        assert_eq!(create_detector("DEFAULT").unwrap().name(), "prominence");
        assert_eq!(create_detector("model-assisted").unwrap().name(), "gaussian");
        assert_eq!(create_detector("deriv").unwrap().name(), "derivative");
    }

    #[test]
    fn factory_returns_none_for_unknown() {
        assert!(create_detector("wavelet").is_none());
    }

    #[test]
    fn local_maxima_handles_plateaus() {
        let data = [0.0, 1.0, 3.0, 3.0, 3.0, 1.0, 0.0, 2.0, 0.0];
        assert_eq!(local_maxima(&data), vec![3, 7]);
        // Rising edge into the end is not a maximum
        assert!(local_maxima(&[0.0, 1.0, 2.0]).is_empty());
    }

    #[test]
    fn prominence_uses_higher_valley() {
        let data = [0.0, 5.0, 4.0, 4.5, 0.0];
        let p = prominence(&data, 3);
        assert!((p.value - 0.5).abs() < 1e-12);
        assert_eq!(p.left_base, 2);
        let p = prominence(&data, 1);
        assert!((p.value - 5.0).abs() < 1e-12);
    }

    #[test]
    fn crossing_interpolates_between_samples() {
        let data = [0.0, 2.0, 4.0, 2.0, 0.0];
        assert!((interpolate_crossing(&data, 2, 2.0, true) - 1.0).abs() < 1e-12);
        assert!((interpolate_crossing(&data, 2, 3.0, false) - 2.5).abs() < 1e-12);
    }

    #[test]
    fn trapezoid_and_simpson_agree_on_smooth_curve() {
        let v: Vec<f64> = (0..101).map(|i| i as f64 * 0.01).collect();
        let y: Vec<f64> = v.iter().map(|x| x * x).collect();
        let trap = integrate_abs(&y, &v, IntegrationRule::Trapezoid);
        let simpson = integrate_abs(&y, &v, IntegrationRule::Simpson);
        assert!((simpson - 1.0 / 3.0).abs() < 1e-9);
        assert!((trap - 1.0 / 3.0).abs() < 1e-4);
    }

    #[test]
    fn integration_ignores_sweep_direction() {
        let v: Vec<f64> = (0..11).map(|i| 1.0 - i as f64 * 0.1).collect();
        let y = vec![-2.0; 11];
        let area = integrate_abs(&y, &v, IntegrationRule::Trapezoid);
        assert!((area - 2.0).abs() < 1e-12);
    }

    #[test]
    fn confidence_saturates_without_noise() {
        assert!((confidence(4.0, 0.0, 1.0, 10.0) - 100.0).abs() < 1e-12);
        assert!((confidence(4.0, 1.0, 0.0, 10.0) - 24.0).abs() < 1e-12);
        assert!((confidence(4.0, 0.1, 0.5, 10.0) - 80.0).abs() < 1e-12);
    }

    #[test]
    fn confidence_of_noise_blip_stays_low() {
        // 0.12 µA blip over 0.07 µA noise, full prominence
        let score = confidence(0.12, 0.07, 1.0, 10.0);
        assert!(score < 20.0, "score {}", score);
        // Same shape at SNR 5 is only half way
        assert!((confidence(0.35, 0.07, 1.0, 10.0) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn min_width_follows_point_density() {
        let config = DetectionConfig::default();
        let coarse: Vec<f64> = (0..50).map(|i| i as f64 * 0.01).collect();
        let fine: Vec<f64> = (0..500).map(|i| i as f64 * 0.001).collect();
        // 10 mV is one coarse step, so the floor applies
        assert_eq!(min_width_for(&coarse, &config), 3);
        assert_eq!(min_width_for(&fine, &config), 10);

        let smoothed = DetectionConfig {
            smoothing: SmoothingMethod::MovingAverage,
            smoothing_window: 15,
            ..Default::default()
        };
        assert_eq!(min_width_for(&fine, &smoothed), 15);

        let points_only = DetectionConfig {
            min_width_v: 0.0,
            ..Default::default()
        };
        assert_eq!(min_width_for(&fine, &points_only), 3);
    }

    #[test]
    fn cap_maxima_collapse_into_one_apex() {
        // Two maxima on one cap, one separate peak
        let data = [0.0, 2.0, 3.9, 3.8, 4.0, 2.0, 0.0, 3.0, 0.0];
        assert_eq!(dominant_per_lobe(&[2, 4, 7], &data, 0.5), vec![4, 7]);
        // Resolved at a level just under the apexes
        assert_eq!(dominant_per_lobe(&[2, 4], &data, 0.99), vec![2, 4]);
    }

    #[test]
    fn candidate_measures_gaussian_bump() {
        let (trace, segment, baseline) = forward_segment(&[(4.0, 0.15, 0.03)]);
        let config = DetectionConfig::default();
        let signal = SegmentSignal::new(&trace, &segment, 0, &baseline, &config);
        let oriented = signal.oriented(PeakType::Oxidation);
        let apex = local_maxima(&oriented)[0];

        let c = signal
            .candidate(apex, PeakType::Oxidation, &oriented, &config)
            .unwrap();
        assert!((c.voltage - 0.15).abs() < 1e-9);
        assert!((c.height - 4.0).abs() < 1e-9);
        // FWHM of a Gaussian is 2.3548 sigma
        assert!((c.width - 2.3548 * 0.03).abs() < 0.002);
        // Area of 4 * N(0.15, 0.03) = 4 * 0.03 * sqrt(2 pi)
        assert!((c.area - 4.0 * 0.03 * (2.0 * std::f64::consts::PI).sqrt()).abs() < 0.01);
        assert!(c.confidence > 99.0);
        assert!(signal
            .candidate(apex, PeakType::Reduction, &oriented, &config)
            .is_none());
    }
}
