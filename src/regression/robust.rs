// ABOUTME: Robust statistics kernels: quartiles, IQR outlier gate, Huber IRLS line fit
// ABOUTME: Deterministic, allocation-light building blocks shared by both model families
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Formline Contributors

//! Robust statistics primitives.
//!
//! The fit pipeline is two-staged: an interquartile-range gate drops gross
//! outliers on the metric axis, then a Huber-loss line fit (quadratic near
//! the center, linear in the tails) bounds the influence of whatever
//! survives the gate. Everything here is deterministic for a fixed input.

use crate::config::HuberConfig;
use crate::models::Sample;

/// Normal-consistency constant for the median absolute deviation.
const MAD_NORMALIZATION: f64 = 0.674_489_75;

/// Relative variance below which the regressor axis is considered flat.
const DEGENERATE_VARIANCE: f64 = 1e-12;

/// Fitted line in whatever coordinate space the caller chose.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct LineFit {
    pub intercept: f64,
    pub slope: f64,
}

/// Interpolated percentile of a sorted slice (R-7 / linear interpolation).
fn percentile_sorted(sorted: &[f64], q: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    if sorted.len() == 1 {
        return sorted[0];
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    (sorted[upper] - sorted[lower]).mul_add(frac, sorted[lower])
}

/// Median of a sorted slice.
pub(crate) fn median_sorted(sorted: &[f64]) -> f64 {
    percentile_sorted(sorted, 0.5)
}

/// First, second, and third quartiles. `None` for an empty input.
pub(crate) fn quartiles(values: &[f64]) -> Option<(f64, f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    Some((
        percentile_sorted(&sorted, 0.25),
        median_sorted(&sorted),
        percentile_sorted(&sorted, 0.75),
    ))
}

/// Drop samples whose metric value falls outside
/// `[Q1 - multiplier*IQR, Q3 + multiplier*IQR]`, along with anything
/// non-finite on either axis.
pub(crate) fn iqr_filter(samples: &[Sample], multiplier: f64) -> Vec<Sample> {
    let finite: Vec<Sample> = samples
        .iter()
        .copied()
        .filter(|s| s.speed_mps.is_finite() && s.value.is_finite())
        .collect();

    let values: Vec<f64> = finite.iter().map(|s| s.value).collect();
    let Some((q1, _, q3)) = quartiles(&values) else {
        return finite;
    };
    let iqr = q3 - q1;
    let lower = multiplier.mul_add(-iqr, q1);
    let upper = multiplier.mul_add(iqr, q3);

    finite
        .into_iter()
        .filter(|s| s.value >= lower && s.value <= upper)
        .collect()
}

/// Weighted least-squares line through `(xs, ys)`. `None` when the
/// weighted x-variance vanishes and no slope is identifiable.
fn weighted_line_fit(xs: &[f64], ys: &[f64], weights: &[f64]) -> Option<LineFit> {
    let mut sw = 0.0;
    let mut sx = 0.0;
    let mut sy = 0.0;
    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for ((&x, &y), &w) in xs.iter().zip(ys).zip(weights) {
        sw += w;
        sx = w.mul_add(x, sx);
        sy = w.mul_add(y, sy);
        sxx = (w * x).mul_add(x, sxx);
        sxy = (w * x).mul_add(y, sxy);
    }
    if sw <= 0.0 {
        return None;
    }
    let mean_x = sx / sw;
    let var_x = sxx / sw - mean_x * mean_x;
    if !var_x.is_finite() || var_x <= DEGENERATE_VARIANCE * mean_x.mul_add(mean_x, 1.0) {
        return None;
    }
    let slope = (sxy / sw - mean_x * (sy / sw)) / var_x;
    let intercept = slope.mul_add(-mean_x, sy / sw);
    Some(LineFit { intercept, slope })
}

/// Huber-loss line fit via iteratively reweighted least squares.
///
/// Starts from the ordinary least-squares solution, then reweights by
/// `min(1, k*s / |r|)` where `s` is the MAD residual scale, until the
/// coefficients stop moving or the iteration budget is spent. `None` when
/// the regressor axis is degenerate.
pub(crate) fn huber_line_fit(xs: &[f64], ys: &[f64], config: &HuberConfig) -> Option<LineFit> {
    debug_assert_eq!(xs.len(), ys.len());
    let mut weights = vec![1.0; xs.len()];
    let mut fit = weighted_line_fit(xs, ys, &weights)?;

    for _ in 0..config.max_iterations {
        let mut abs_residuals: Vec<f64> = xs
            .iter()
            .zip(ys)
            .map(|(&x, &y)| (y - fit.slope.mul_add(x, fit.intercept)).abs())
            .collect();
        abs_residuals.sort_by(f64::total_cmp);
        let scale = median_sorted(&abs_residuals) / MAD_NORMALIZATION;
        if scale < config.convergence_epsilon {
            // Residuals are essentially zero; the fit is already exact.
            break;
        }

        let threshold = config.tuning_constant * scale;
        for (weight, (&x, &y)) in weights.iter_mut().zip(xs.iter().zip(ys)) {
            let residual = (y - fit.slope.mul_add(x, fit.intercept)).abs();
            *weight = if residual <= threshold {
                1.0
            } else {
                threshold / residual
            };
        }

        let next = weighted_line_fit(xs, ys, &weights)?;
        let movement =
            (next.intercept - fit.intercept).abs() + (next.slope - fit.slope).abs();
        fit = next;
        if movement < config.convergence_epsilon {
            break;
        }
    }
    Some(fit)
}
