// ABOUTME: Regression model family: power-law and linear fits behind one fit/predict contract
// ABOUTME: IQR-filtered, Huber-robust fitting with monotonicity sign enforcement
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Formline Contributors

//! Regression model family.
//!
//! Two interchangeable model shapes, both fit through [`fit_baseline`] and
//! both predicted through [`Coefficients::predict`]:
//!
//! - **Power-law** — fits `ln(speed) = alpha + exponent * ln(metric)`,
//!   equivalent to `speed = exp(alpha) * metric^exponent`. Used for metrics
//!   that shrink multiplicatively with pace (ground contact time).
//! - **Linear** — fits `metric = intercept + slope * speed` directly.
//!
//! Both run the same robust pipeline: IQR outlier gate on the metric axis,
//! then a Huber-loss fit. An unconstrained fit whose pace-sensitivity
//! coefficient violates the metric's configured sign is rejected, not
//! silently accepted.

mod robust;

use crate::config::FittingConfig;
use crate::errors::FitError;
use crate::models::{Coefficients, MetricModelSpec, ModelFamily, Sample, SpeedRange};
use tracing::debug;

/// Exponents closer to zero than this cannot be meaningfully inverted.
const MIN_EXPONENT_MAGNITUDE: f64 = 1e-9;

/// Result of a successful robust fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitOutcome {
    /// Fitted coefficients
    pub coefficients: Coefficients,
    /// Root-mean-square prediction error in metric units over retained samples
    pub rmse: f64,
    /// Samples retained by the robust pipeline
    pub sample_count: usize,
    /// Speed range of retained samples
    pub speed_range: SpeedRange,
}

impl Coefficients {
    /// Expected metric value at a given speed — the model's inverse mapping,
    /// used by the evaluator.
    ///
    /// Strictly decreasing in speed for power-law models with a negative
    /// exponent, which the trainer guarantees for published baselines.
    #[must_use]
    pub fn predict(&self, speed_mps: f64) -> f64 {
        match self {
            Self::PowerLaw { alpha, exponent } => {
                ((speed_mps.ln() - alpha) / exponent).exp()
            }
            Self::Linear { intercept, slope } => slope.mul_add(speed_mps, *intercept),
        }
    }
}

/// Fit a baseline model for one metric from a window of samples.
///
/// # Errors
///
/// - [`FitError::InsufficientSamples`] when fewer than the configured
///   minimum valid points remain after outlier filtering.
/// - [`FitError::MonotonicityViolation`] when the fitted pace-sensitivity
///   coefficient has the wrong sign for the metric.
/// - [`FitError::DegenerateFit`] when the retained samples carry no usable
///   variance along the regressor axis.
pub fn fit_baseline(
    spec: &MetricModelSpec,
    samples: &[Sample],
    config: &FittingConfig,
) -> Result<FitOutcome, FitError> {
    let mut retained = robust::iqr_filter(samples, config.iqr_multiplier);
    if spec.model_family == ModelFamily::PowerLaw {
        // Log transform needs strictly positive values on both axes.
        retained.retain(|s| s.speed_mps > 0.0 && s.value > 0.0);
    }

    if retained.len() < samples.len() {
        debug!(
            metric_id = %spec.metric_id,
            provided = samples.len(),
            retained = retained.len(),
            "outlier gate dropped samples before fit"
        );
    }
    if retained.len() < config.min_samples {
        return Err(FitError::InsufficientSamples {
            required: config.min_samples,
            actual: retained.len(),
        });
    }

    let coefficients = match spec.model_family {
        ModelFamily::PowerLaw => fit_power_law(spec, &retained, config)?,
        ModelFamily::Linear => fit_linear(spec, &retained, config)?,
    };

    let rmse = prediction_rmse(coefficients, &retained);
    let speed_range = speed_range_of(&retained);

    Ok(FitOutcome {
        coefficients,
        rmse,
        sample_count: retained.len(),
        speed_range,
    })
}

fn fit_power_law(
    spec: &MetricModelSpec,
    retained: &[Sample],
    config: &FittingConfig,
) -> Result<Coefficients, FitError> {
    let xs: Vec<f64> = retained.iter().map(|s| s.value.ln()).collect();
    let ys: Vec<f64> = retained.iter().map(|s| s.speed_mps.ln()).collect();
    let fit = robust::huber_line_fit(&xs, &ys, &config.huber).ok_or(FitError::DegenerateFit {
        reason: "no variance in metric values after filtering",
    })?;

    if fit.slope.abs() < MIN_EXPONENT_MAGNITUDE {
        return Err(FitError::DegenerateFit {
            reason: "fitted exponent is indistinguishable from zero",
        });
    }
    if !spec.monotonic_sign.permits(fit.slope) {
        return Err(FitError::MonotonicityViolation {
            metric_id: spec.metric_id.clone(),
            expected: spec.monotonic_sign,
            coefficient: fit.slope,
        });
    }
    Ok(Coefficients::PowerLaw {
        alpha: fit.intercept,
        exponent: fit.slope,
    })
}

fn fit_linear(
    spec: &MetricModelSpec,
    retained: &[Sample],
    config: &FittingConfig,
) -> Result<Coefficients, FitError> {
    let xs: Vec<f64> = retained.iter().map(|s| s.speed_mps).collect();
    let ys: Vec<f64> = retained.iter().map(|s| s.value).collect();
    let fit = robust::huber_line_fit(&xs, &ys, &config.huber).ok_or(FitError::DegenerateFit {
        reason: "no variance in speeds after filtering",
    })?;

    if !spec.monotonic_sign.permits(fit.slope) {
        return Err(FitError::MonotonicityViolation {
            metric_id: spec.metric_id.clone(),
            expected: spec.monotonic_sign,
            coefficient: fit.slope,
        });
    }
    Ok(Coefficients::Linear {
        intercept: fit.intercept,
        slope: fit.slope,
    })
}

/// RMSE of `predict(speed)` against the observed values, in metric units.
fn prediction_rmse(coefficients: Coefficients, retained: &[Sample]) -> f64 {
    let sum_sq: f64 = retained
        .iter()
        .map(|s| {
            let residual = coefficients.predict(s.speed_mps) - s.value;
            residual * residual
        })
        .sum();
    (sum_sq / retained.len() as f64).sqrt()
}

fn speed_range_of(retained: &[Sample]) -> SpeedRange {
    let mut min_mps = f64::INFINITY;
    let mut max_mps = f64::NEG_INFINITY;
    for s in retained {
        min_mps = min_mps.min(s.speed_mps);
        max_mps = max_mps.max(s.speed_mps);
    }
    SpeedRange { min_mps, max_mps }
}
