//! Descriptive statistics over return samples.
//!
//! Conventions: `sample_std` divides by `n - 1` and is the estimator used for
//! historical series; `population_std` divides by `n` and is used for
//! simulated outcome distributions. Percentiles interpolate linearly between
//! order statistics.

/// Arithmetic mean, 0.0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator).
///
/// Returns `None` when fewer than two observations are available.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values);
    let variance =
        values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

/// Population standard deviation (n denominator), 0.0 for an empty slice.
pub fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Percentile of an already sorted slice, `q` in [0, 1].
pub fn percentile_sorted(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            let frac = rank - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * frac
        }
    }
}

/// Percentile of an unsorted slice, `q` in [0, 1].
pub fn percentile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    percentile_sorted(&sorted, q)
}

/// Divide, returning 0.0 when the denominator is zero, tiny, or undefined.
pub(crate) fn ratio_or_zero(numerator: f64, denominator: Option<f64>) -> f64 {
    match denominator {
        Some(d) if d.is_finite() && d > 1e-15 => numerator / d,
        _ => 0.0,
    }
}
