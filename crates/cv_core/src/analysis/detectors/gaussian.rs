//! Model-assisted peak detection.
//!
//! Starts from the prominence candidates and refines each one with a
//! Gaussian fit. The fit is done as a parabola on the log of the points
//! above `width_fraction` of the apex, so it is closed-form:
//!
//! ```text
//! ln s(x) = a + b·x + c·x²   =>   μ = -b / 2c,  σ² = -1 / 2c,  A = exp(a - b² / 4c)
//! ```
//!
//! The R² of the fitted curve against the samples is the shape score. When
//! the fit is ill-conditioned the discrete apex is kept.

use crate::analysis::types::{BaselineModel, PeakCandidate, Segment};
use crate::models::{CvTrace, PeakType};

use super::prominence::prominence_candidates;
use super::{confidence, width_extent, DetectionConfig, PeakDetector, SegmentSignal};

/// Fitted Gaussian parameters in segment voltage coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
struct GaussianFit {
    center: f64,
    sigma: f64,
    amplitude: f64,
    r_squared: f64,
}

/// Detector refining prominence candidates with Gaussian fits.
pub struct GaussianDetector;

impl GaussianDetector {
    /// Create a new model-assisted detector.
    pub fn new() -> Self {
        Self
    }
}

impl Default for GaussianDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// Least-squares parabola y = a + b·x + c·x² via the normal equations.
fn fit_parabola(x: &[f64], y: &[f64]) -> Option<(f64, f64, f64)> {
    if x.len() < 3 || x.len() != y.len() {
        return None;
    }

    let (mut s0, mut s1, mut s2, mut s3, mut s4) = (0.0, 0.0, 0.0, 0.0, 0.0);
    let (mut t0, mut t1, mut t2) = (0.0, 0.0, 0.0);
    for (&xi, &yi) in x.iter().zip(y) {
        let x2 = xi * xi;
        s0 += 1.0;
        s1 += xi;
        s2 += x2;
        s3 += x2 * xi;
        s4 += x2 * x2;
        t0 += yi;
        t1 += xi * yi;
        t2 += x2 * yi;
    }

    let det3 = |m: [[f64; 3]; 3]| {
        m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
    };

    let m = [[s0, s1, s2], [s1, s2, s3], [s2, s3, s4]];
    let det = det3(m);
    let scale = s0 * s2 * s4;
    if !det.is_finite() || det.abs() <= 1e-12 * scale.abs().max(f64::MIN_POSITIVE) {
        return None;
    }

    // Cramer's rule
    let a = det3([[t0, s1, s2], [t1, s2, s3], [t2, s3, s4]]) / det;
    let b = det3([[s0, t0, s2], [s1, t1, s3], [s2, t2, s4]]) / det;
    let c = det3([[s0, s1, t0], [s1, s2, t1], [s2, s3, t2]]) / det;

    Some((a, b, c))
}

/// Fit a Gaussian to positive samples; `x` is relative to the apex voltage.
fn fit_gaussian(x: &[f64], s: &[f64]) -> Option<GaussianFit> {
    let (xs, logs): (Vec<f64>, Vec<f64>) = x
        .iter()
        .zip(s)
        .filter(|(_, &v)| v > 0.0)
        .map(|(&xi, &v)| (xi, v.ln()))
        .unzip();

    let (a, b, c) = fit_parabola(&xs, &logs)?;
    if c.is_nan() || c >= 0.0 {
        return None;
    }

    let center = -b / (2.0 * c);
    let sigma = (-1.0 / (2.0 * c)).sqrt();
    let amplitude = (a - b * b / (4.0 * c)).exp();

    let lo = xs.iter().cloned().fold(f64::INFINITY, f64::min);
    let hi = xs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if !center.is_finite() || !amplitude.is_finite() || center < lo || center > hi {
        return None;
    }

    let model = |xi: f64| amplitude * (-(xi - center).powi(2) / (2.0 * sigma * sigma)).exp();
    let mean = s.iter().sum::<f64>() / s.len() as f64;
    let ss_res: f64 = x.iter().zip(s).map(|(&xi, &si)| (si - model(xi)).powi(2)).sum();
    let ss_tot: f64 = s.iter().map(|&si| (si - mean).powi(2)).sum();
    let r_squared = if ss_tot > 0.0 {
        (1.0 - ss_res / ss_tot).clamp(0.0, 1.0)
    } else {
        0.0
    };

    Some(GaussianFit {
        center,
        sigma,
        amplitude,
        r_squared,
    })
}

/// Refine a prominence candidate in place. Returns whether the fit was used.
fn refine(
    candidate: &mut PeakCandidate,
    signal: &SegmentSignal<'_>,
    segment: &Segment,
    baseline: &BaselineModel,
    config: &DetectionConfig,
) -> bool {
    let oriented = signal.oriented(candidate.peak_type);
    let local = candidate.index - segment.start_index;
    let fraction = config.width_fraction.clamp(0.0, 1.0);
    let (lo, hi) = width_extent(&oriented, local, fraction * oriented[local]);

    let voltage = signal.voltage();
    let apex_voltage = voltage[local];
    let x: Vec<f64> = voltage[lo..=hi].iter().map(|v| v - apex_voltage).collect();

    let Some(fit) = fit_gaussian(&x, &oriented[lo..=hi]) else {
        tracing::trace!(
            "Gaussian fit ill-conditioned at index {}, keeping discrete apex",
            candidate.index
        );
        return false;
    };

    // Nearest sample to the fitted centre
    let fitted_voltage = apex_voltage + fit.center;
    let nearest = (lo..=hi)
        .min_by(|&a, &b| {
            (voltage[a] - fitted_voltage)
                .abs()
                .total_cmp(&(voltage[b] - fitted_voltage).abs())
                .then(a.cmp(&b))
        })
        .unwrap_or(local);

    let baseline_current = baseline.current_at_index[nearest];
    let sign = match candidate.peak_type {
        PeakType::Oxidation => 1.0,
        PeakType::Reduction => -1.0,
    };

    candidate.index = segment.start_index + nearest;
    candidate.voltage = fitted_voltage;
    candidate.baseline_current = baseline_current;
    candidate.height = fit.amplitude;
    candidate.current = baseline_current + sign * fit.amplitude;

    if fraction > 0.0 && fraction < 1.0 {
        let half_width = fit.sigma * (2.0 * (1.0 / fraction).ln()).sqrt();
        candidate.width = 2.0 * half_width;
        let mean_step = (voltage[hi] - voltage[lo]).abs() / (hi - lo).max(1) as f64;
        if mean_step > 0.0 {
            candidate.width_points = candidate.width / mean_step;
        }
    }

    candidate.confidence = confidence(
        candidate.height,
        signal.noise(),
        fit.r_squared,
        config.snr_saturation,
    );

    true
}

impl PeakDetector for GaussianDetector {
    fn name(&self) -> &'static str {
        "gaussian"
    }

    fn description(&self) -> &str {
        "Prominence candidates refined by Gaussian peak fitting"
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

        let mut refined = 0;
        for candidate in &mut candidates {
            if refine(candidate, &signal, segment, baseline, config) {
                refined += 1;
            }
        }
        candidates.sort_by_key(|c| c.index);

        tracing::debug!(
            "Gaussian detector: segment {} produced {} candidate(s), {} refined by fit",
            segment_index,
            candidates.len(),
            refined
        );

        candidates
    }
}
