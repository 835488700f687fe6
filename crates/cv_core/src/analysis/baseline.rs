//! Baseline (background current) estimation per sweep segment.
//!
//! The baseline is a line of current against voltage fitted on parts of the
//! segment that are expected to be free of redox peaks, then extrapolated
//! across the whole segment. Peak heights are measured against it.
//!
//! Degraded inputs never fail: a constant baseline with `quality_r2 = 0` and
//! a `BaselineIssue` is returned instead.

use serde::{Deserialize, Serialize};

use crate::models::{BaselineMethod, BaselineWindow, CvTrace, SweepDirection};

use super::regression::{linear_regression, median, r_squared, robust_sigma, std_dev};
use super::types::{BaselineIssue, BaselineModel, Segment};

/// Upper bound on points used for the Theil-Sen starting fit.
const THEIL_SEN_MAX_POINTS: usize = 200;

/// Configuration for baseline estimation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineConfig {
    /// Fitting method.
    pub method: BaselineMethod,
    /// Fraction of the segment used for each edge window (0.0 - 0.5).
    pub edge_fraction: f64,
    /// Window placement on forward sweeps.
    pub forward_window: BaselineWindow,
    /// Window placement on reverse sweeps.
    pub reverse_window: BaselineWindow,
    /// Minimum number of points for a regression.
    pub min_regression_points: usize,
    /// [Iterative Exclusion] Residual cutoff in robust sigmas.
    pub exclusion_sigma: f64,
    /// [Iterative Exclusion] Maximum refit iterations.
    pub max_iterations: usize,
    /// Minimum voltage standard deviation in the window for a stable slope (V).
    pub min_voltage_span: f64,
    /// Currents whose magnitude never reaches this are flagged (µA).
    pub min_current_magnitude: f64,
    /// Baselines with `quality_r2` below this are reported as suspect.
    pub suspect_r2: f64,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            method: BaselineMethod::EdgeWindows,
            edge_fraction: 0.15,
            forward_window: BaselineWindow::Both,
            reverse_window: BaselineWindow::Both,
            min_regression_points: 5,
            exclusion_sigma: 2.5,
            max_iterations: 10,
            min_voltage_span: 1e-6,
            min_current_magnitude: 1e-3,
            suspect_r2: 0.5,
        }
    }
}

impl BaselineConfig {
    /// Window placement for a sweep direction.
    pub fn window_for(&self, direction: SweepDirection) -> BaselineWindow {
        match direction {
            SweepDirection::Forward => self.forward_window,
            SweepDirection::Reverse => self.reverse_window,
        }
    }
}

/// Fit the baseline of one segment.
///
/// The returned model always has exactly `segment.len()` points.
pub fn fit_baseline(trace: &CvTrace, segment: &Segment, config: &BaselineConfig) -> BaselineModel {
    let voltage = &trace.voltage[segment.range()];
    let current = &trace.current[segment.range()];
    let n = voltage.len();

    if n < config.min_regression_points.max(2) {
        tracing::debug!(
            "Segment {}..{} has {} points, using constant baseline",
            segment.start_index,
            segment.end_index,
            n
        );
        return constant_model(
            n,
            mean_or_zero(current),
            BaselineMethod::ConstantFallback,
            0.0,
            n,
            Some(BaselineIssue::InsufficientPoints),
        );
    }

    let mut model = match config.method {
        BaselineMethod::EdgeWindows => {
            let indices = edge_window_indices(n, config.window_for(segment.direction), config);
            fit_on_indices(voltage, current, &indices, BaselineMethod::EdgeWindows, config)
        }
        BaselineMethod::IterativeExclusion => iterative_fit(voltage, current, config),
        BaselineMethod::Constant | BaselineMethod::ConstantFallback => {
            let indices = edge_window_indices(n, config.window_for(segment.direction), config);
            constant_on_indices(voltage, current, &indices, config.method)
        }
    };

    let max_abs = current.iter().fold(0.0_f64, |acc, c| acc.max(c.abs()));
    let (lo, hi) = min_max(current);
    // Absolute floor only; range relative to the current level is not checked.
    if max_abs < config.min_current_magnitude && hi - lo < config.min_current_magnitude {
        tracing::warn!(
            "Segment {}..{} currents never exceed {:.3e} µA (max {:.3e}); check the current unit scaling",
            segment.start_index,
            segment.end_index,
            config.min_current_magnitude,
            max_abs
        );
        model.quality_r2 = 0.0;
        model.issue = Some(BaselineIssue::CurrentMagnitude);
    }

    model
}

/// Fit baselines for every segment of a trace, in segment order.
pub fn fit_all_baselines(
    trace: &CvTrace,
    segments: &[Segment],
    config: &BaselineConfig,
) -> Vec<BaselineModel> {
    segments
        .iter()
        .map(|segment| fit_baseline(trace, segment, config))
        .collect()
}

/// Baseline-subtracted current over a segment.
pub fn subtract_baseline(trace: &CvTrace, segment: &Segment, baseline: &BaselineModel) -> Vec<f64> {
    trace.current[segment.range()]
        .iter()
        .zip(&baseline.current_at_index)
        .map(|(c, b)| c - b)
        .collect()
}

/// Segment-relative indices of the peak-free windows.
fn edge_window_indices(n: usize, placement: BaselineWindow, config: &BaselineConfig) -> Vec<usize> {
    let fraction = config.edge_fraction.clamp(0.0, 1.0);
    let width = ((n as f64 * fraction).ceil() as usize)
        .max(config.min_regression_points)
        .min(n);

    match placement {
        BaselineWindow::Leading => (0..width).collect(),
        BaselineWindow::Trailing => (n - width..n).collect(),
        BaselineWindow::Both => {
            if 2 * width >= n {
                (0..n).collect()
            } else {
                (0..width).chain(n - width..n).collect()
            }
        }
    }
}

/// Fit a line on the selected points and extrapolate it over the segment.
fn fit_on_indices(
    voltage: &[f64],
    current: &[f64],
    indices: &[usize],
    method: BaselineMethod,
    config: &BaselineConfig,
) -> BaselineModel {
    let xs: Vec<f64> = indices.iter().map(|&k| voltage[k]).collect();
    let ys: Vec<f64> = indices.iter().map(|&k| current[k]).collect();

    if std_dev(&xs) < config.min_voltage_span {
        return degenerate_model(voltage.len(), &ys);
    }

    match linear_regression(&xs, &ys) {
        Some(fit) => BaselineModel {
            current_at_index: voltage.iter().map(|&v| fit.predict(v)).collect(),
            method,
            quality_r2: fit.r_squared,
            slope: Some(fit.slope),
            intercept: Some(fit.intercept),
            retained_points: indices.len(),
            issue: None,
        },
        None => degenerate_model(voltage.len(), &ys),
    }
}

/// Constant baseline at the median of the selected points.
fn constant_on_indices(
    voltage: &[f64],
    current: &[f64],
    indices: &[usize],
    method: BaselineMethod,
) -> BaselineModel {
    let xs: Vec<f64> = indices.iter().map(|&k| voltage[k]).collect();
    let ys: Vec<f64> = indices.iter().map(|&k| current[k]).collect();
    let level = median(&ys);
    let quality = r_squared(&xs, &ys, 0.0, level);

    constant_model(voltage.len(), level, method, quality, indices.len(), None)
}

/// Line fit with iterative exclusion of points far from the current fit.
///
/// Starts from a Theil-Sen estimate so the first residuals are not skewed
/// by the peaks themselves.
fn iterative_fit(voltage: &[f64], current: &[f64], config: &BaselineConfig) -> BaselineModel {
    let n = voltage.len();
    let min_points = config.min_regression_points.max(2);

    if std_dev(voltage) < config.min_voltage_span {
        return degenerate_model(n, current);
    }

    let Some((mut slope, mut intercept)) = theil_sen(voltage, current) else {
        return degenerate_model(n, current);
    };

    // Floor for noise-free input
    let (lo, hi) = min_max(current);
    let sigma_floor = 1e-3 * (hi - lo);

    let mut keep: Vec<usize> = (0..n).collect();

    for iteration in 0..config.max_iterations {
        let residuals: Vec<f64> = keep
            .iter()
            .map(|&k| current[k] - (slope * voltage[k] + intercept))
            .collect();
        let sigma = robust_sigma(&residuals).max(sigma_floor);
        if sigma <= 0.0 {
            break;
        }

        let cutoff = config.exclusion_sigma * sigma;
        let next: Vec<usize> = keep
            .iter()
            .zip(&residuals)
            .filter(|(_, r)| r.abs() <= cutoff)
            .map(|(&k, _)| k)
            .collect();

        if next.len() < min_points || next.len() == keep.len() {
            break;
        }

        tracing::trace!(
            "Baseline iteration {}: kept {} of {} points",
            iteration,
            next.len(),
            keep.len()
        );
        keep = next;

        let xs: Vec<f64> = keep.iter().map(|&k| voltage[k]).collect();
        let ys: Vec<f64> = keep.iter().map(|&k| current[k]).collect();
        match linear_regression(&xs, &ys) {
            Some(fit) => {
                slope = fit.slope;
                intercept = fit.intercept;
            }
            None => break,
        }
    }

    fit_on_indices(
        voltage,
        current,
        &keep,
        BaselineMethod::IterativeExclusion,
        config,
    )
}

/// Theil-Sen line estimate (median of pairwise slopes).
fn theil_sen(x: &[f64], y: &[f64]) -> Option<(f64, f64)> {
    let stride = (x.len() / THEIL_SEN_MAX_POINTS).max(1);
    let xs: Vec<f64> = x.iter().step_by(stride).copied().collect();
    let ys: Vec<f64> = y.iter().step_by(stride).copied().collect();

    let mut slopes = Vec::with_capacity(xs.len() * xs.len() / 2);
    for i in 0..xs.len() {
        for j in (i + 1)..xs.len() {
            let dx = xs[j] - xs[i];
            if dx.abs() > f64::EPSILON {
                slopes.push((ys[j] - ys[i]) / dx);
            }
        }
    }

    if slopes.is_empty() {
        return None;
    }

    let slope = median(&slopes);
    let offsets: Vec<f64> = x.iter().zip(y).map(|(xi, yi)| yi - slope * xi).collect();
    Some((slope, median(&offsets)))
}

/// Constant median baseline used when the window voltage barely moves.
fn degenerate_model(n: usize, window_current: &[f64]) -> BaselineModel {
    constant_model(
        n,
        median(window_current),
        BaselineMethod::ConstantFallback,
        0.0,
        window_current.len(),
        Some(BaselineIssue::DegenerateVoltage),
    )
}

fn constant_model(
    n: usize,
    level: f64,
    method: BaselineMethod,
    quality_r2: f64,
    retained_points: usize,
    issue: Option<BaselineIssue>,
) -> BaselineModel {
    BaselineModel {
        current_at_index: vec![level; n],
        method,
        quality_r2,
        slope: None,
        intercept: None,
        retained_points,
        issue,
    }
}

fn min_max(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
}

fn mean_or_zero(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
