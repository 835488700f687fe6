//! Signal smoothing before extremum search.
//!
//! Provides a centered moving average and a quadratic Savitzky-Golay filter.
//! Both shrink the window symmetrically near the edges so the output has the
//! same length as the input and the first/last samples are kept as-is.

use crate::models::SmoothingMethod;

/// Apply the configured smoothing to a signal.
///
/// Windows are forced odd; a window below 3 returns the signal unchanged.
pub fn smooth(signal: &[f64], method: SmoothingMethod, window: usize) -> Vec<f64> {
    match method {
        SmoothingMethod::None => signal.to_vec(),
        SmoothingMethod::MovingAverage => moving_average(signal, window),
        SmoothingMethod::SavitzkyGolay => savitzky_golay(signal, window),
    }
}

/// Centered moving average.
pub fn moving_average(signal: &[f64], window: usize) -> Vec<f64> {
    let half = half_width(window);
    if half == 0 || signal.len() < 3 {
        return signal.to_vec();
    }

    (0..signal.len())
        .map(|k| {
            let m = half.min(k).min(signal.len() - 1 - k);
            let slice = &signal[k - m..=k + m];
            slice.iter().sum::<f64>() / slice.len() as f64
        })
        .collect()
}

/// Quadratic Savitzky-Golay smoothing.
///
/// Preserves peak height and position better than a moving average of the
/// same window.
pub fn savitzky_golay(signal: &[f64], window: usize) -> Vec<f64> {
    let half = half_width(window);
    if half == 0 || signal.len() < 3 {
        return signal.to_vec();
    }

    // Coefficient tables for every half-width needed at the edges
    let tables: Vec<Vec<f64>> = (0..=half).map(sg_coefficients).collect();

    (0..signal.len())
        .map(|k| {
            let m = half.min(k).min(signal.len() - 1 - k);
            let coeffs = &tables[m];
            coeffs
                .iter()
                .enumerate()
                .map(|(i, c)| c * signal[k + i - m])
                .sum()
        })
        .collect()
}

/// Half-width of an odd window (`window = 2 * half + 1`).
fn half_width(window: usize) -> usize {
    if window < 3 {
        0
    } else {
        window / 2
    }
}

/// Quadratic/cubic Savitzky-Golay smoothing coefficients for half-width m.
fn sg_coefficients(m: usize) -> Vec<f64> {
    if m == 0 {
        return vec![1.0];
    }

    let mf = m as f64;
    let norm = (2.0 * mf - 1.0) * (2.0 * mf + 1.0) * (2.0 * mf + 3.0);

    (0..=2 * m)
        .map(|i| {
            let j = i as f64 - mf;
            3.0 * (3.0 * mf * mf + 3.0 * mf - 1.0 - 5.0 * j * j) / norm
        })
        .collect()
}
