//! Least-squares line fitting and robust statistics.
//!
//! Shared by the baseline estimator, the peak detectors (noise estimates)
//! and the calibrator. All functions are pure.

use serde::{Deserialize, Serialize};

/// Scale factor turning a median absolute deviation into a Gaussian sigma.
pub const MAD_TO_SIGMA: f64 = 1.4826;

/// Result of an ordinary least-squares line fit: y = slope * x + intercept.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearFit {
    /// Fitted slope.
    pub slope: f64,
    /// Fitted intercept.
    pub intercept: f64,
    /// Coefficient of determination (0.0 - 1.0).
    pub r_squared: f64,
    /// Number of points used.
    pub points: usize,
}

impl LinearFit {
    /// Evaluate the line at x.
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Simple linear regression: y = slope * x + intercept
///
/// Returns `None` if fewer than two points are given, the lengths differ or
/// x has no usable variance (the slope would be undefined).
pub fn linear_regression(x: &[f64], y: &[f64]) -> Option<LinearFit> {
    if x.len() < 2 || x.len() != y.len() {
        return None;
    }

    let n = x.len() as f64;

    // Calculate means
    let x_mean = x.iter().sum::<f64>() / n;
    let y_mean = y.iter().sum::<f64>() / n;

    // Calculate slope and intercept
    let mut numerator = 0.0;
    let mut denominator = 0.0;

    for (xi, yi) in x.iter().zip(y) {
        let x_diff = xi - x_mean;
        let y_diff = yi - y_mean;
        numerator += x_diff * y_diff;
        denominator += x_diff * x_diff;
    }

    let x_scale = x.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    let x_std = (denominator / n).sqrt();
    if denominator <= 0.0 || x_std <= 1e-12 * x_scale.max(f64::MIN_POSITIVE) {
        return None;
    }

    let slope = numerator / denominator;
    let intercept = y_mean - slope * x_mean;

    Some(LinearFit {
        slope,
        intercept,
        r_squared: r_squared(x, y, slope, intercept),
        points: x.len(),
    })
}

/// R² of a line against data.
///
/// A constant y that the line reproduces exactly counts as a perfect fit.
pub fn r_squared(x: &[f64], y: &[f64], slope: f64, intercept: f64) -> f64 {
    if y.is_empty() {
        return 0.0;
    }

    let y_mean = mean(y);
    let mut ss_res = 0.0; // Residual sum of squares
    let mut ss_tot = 0.0; // Total sum of squares

    for (xi, yi) in x.iter().zip(y) {
        let y_pred = slope * xi + intercept;
        ss_res += (yi - y_pred).powi(2);
        ss_tot += (yi - y_mean).powi(2);
    }

    let y_scale = y.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    let tiny = (1e-12 * y_scale.max(f64::MIN_POSITIVE)).powi(2) * y.len() as f64;

    let r_squared = if ss_tot <= tiny {
        if ss_res <= tiny {
            1.0
        } else {
            0.0
        }
    } else {
        1.0 - (ss_res / ss_tot)
    };

    r_squared.clamp(0.0, 1.0)
}

/// Arithmetic mean (0.0 for empty input).
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (0.0 for fewer than two values).
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Median (0.0 for empty input).
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Median absolute deviation from the median.
pub fn median_abs_deviation(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let center = median(values);
    let deviations: Vec<f64> = values.iter().map(|v| (v - center).abs()).collect();
    median(&deviations)
}

/// Robust sigma estimate: MAD scaled to a Gaussian standard deviation.
pub fn robust_sigma(values: &[f64]) -> f64 {
    median_abs_deviation(values) * MAD_TO_SIGMA
}

/// High-frequency noise estimate of a sampled signal.
///
/// Uses the robust sigma of first differences divided by √2, which is
/// insensitive to slow trends and to isolated peaks.
pub fn difference_noise(signal: &[f64]) -> f64 {
    if signal.len() < 3 {
        return 0.0;
    }
    let diffs: Vec<f64> = signal.windows(2).map(|w| w[1] - w[0]).collect();
    robust_sigma(&diffs) / std::f64::consts::SQRT_2
}
