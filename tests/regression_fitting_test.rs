// ABOUTME: Tests for the robust regression model family (power-law and linear fits)
// ABOUTME: Validates monotonicity enforcement, outlier filtering, and sample minimums
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Formline Contributors

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use formline::config::FittingConfig;
use formline::models::metric_ids;
use formline::{
    fit_baseline, FitError, MetricModelSpec, MetricPolarity, MetricRegistry, ModelFamily,
    MonotonicSign, Sample,
};

fn spec(metric_id: &str) -> MetricModelSpec {
    MetricRegistry::default().get(metric_id).cloned().unwrap()
}

/// Ground-contact-time-like samples following `value = 280 * (speed/3)^-0.394`,
/// so the value at 4.0 m/s is 250 ms. Deterministic sub-percent jitter.
fn gct_samples(count: usize) -> Vec<Sample> {
    (0..count)
        .map(|i| {
            let speed_mps = 3.0 + 1.5 * (i as f64) / (count.max(2) - 1) as f64;
            let clean = 280.0 * (speed_mps / 3.0).powf(-0.394);
            let jitter = 1.0 + 0.003 * (i as f64).sin();
            Sample {
                speed_mps,
                value: clean * jitter,
            }
        })
        .collect()
}

#[test]
fn test_power_law_fit_has_negative_exponent() {
    let outcome = fit_baseline(
        &spec(metric_ids::GROUND_CONTACT_TIME),
        &gct_samples(10),
        &FittingConfig::default(),
    )
    .unwrap();

    assert!(outcome.coefficients.pace_sensitivity() < 0.0);
    assert_eq!(outcome.sample_count, 10);
    assert!(outcome.speed_range.min_mps >= 3.0);
    assert!(outcome.speed_range.max_mps <= 4.5);
}

#[test]
fn test_power_law_predicts_known_scenario_within_rmse() {
    let outcome = fit_baseline(
        &spec(metric_ids::GROUND_CONTACT_TIME),
        &gct_samples(10),
        &FittingConfig::default(),
    )
    .unwrap();

    let predicted = outcome.coefficients.predict(4.0);
    assert!(
        (predicted - 250.0).abs() <= outcome.rmse.max(1.0),
        "predict(4.0) = {predicted}, rmse = {}",
        outcome.rmse
    );
}

#[test]
fn test_power_law_predict_is_strictly_decreasing_in_speed() {
    let outcome = fit_baseline(
        &spec(metric_ids::GROUND_CONTACT_TIME),
        &gct_samples(12),
        &FittingConfig::default(),
    )
    .unwrap();

    let mut last = f64::INFINITY;
    for step in 0..30 {
        let speed = 3.0 + 0.05 * f64::from(step);
        let predicted = outcome.coefficients.predict(speed);
        assert!(predicted < last, "prediction not decreasing at {speed} m/s");
        last = predicted;
    }
}

#[test]
fn test_power_law_rejects_flipped_sign() {
    // Metric grows with speed, which contradicts the configured negative sign.
    let samples: Vec<Sample> = (0..12)
        .map(|i| {
            let speed_mps = 3.0 + 0.12 * f64::from(i);
            Sample {
                speed_mps,
                value: 200.0 * (speed_mps / 3.0).powf(0.4),
            }
        })
        .collect();

    let err = fit_baseline(
        &spec(metric_ids::GROUND_CONTACT_TIME),
        &samples,
        &FittingConfig::default(),
    )
    .unwrap_err();

    match err {
        FitError::MonotonicityViolation {
            metric_id,
            expected,
            coefficient,
        } => {
            assert_eq!(metric_id, metric_ids::GROUND_CONTACT_TIME);
            assert_eq!(expected, MonotonicSign::Negative);
            assert!(coefficient > 0.0);
        }
        other => panic!("expected monotonicity violation, got {other:?}"),
    }
}

#[test]
fn test_linear_fit_recovers_slope_with_correct_sign() {
    // Vertical oscillation rises gently with speed: value = 6 + 0.8 * speed.
    let samples: Vec<Sample> = (0..14)
        .map(|i| {
            let speed_mps = 2.8 + 0.12 * f64::from(i);
            Sample {
                speed_mps,
                value: 0.8f64.mul_add(speed_mps, 6.0) + 0.02 * f64::from(i % 3),
            }
        })
        .collect();

    let outcome = fit_baseline(
        &spec(metric_ids::VERTICAL_OSCILLATION),
        &samples,
        &FittingConfig::default(),
    )
    .unwrap();

    let slope = outcome.coefficients.pace_sensitivity();
    assert!((slope - 0.8).abs() < 0.1, "slope {slope}");
    assert!(outcome.rmse < 0.1);
}

#[test]
fn test_linear_rejects_flipped_sign() {
    let samples: Vec<Sample> = (0..14)
        .map(|i| {
            let speed_mps = 2.8 + 0.12 * f64::from(i);
            Sample {
                speed_mps,
                value: (-0.8f64).mul_add(speed_mps, 12.0),
            }
        })
        .collect();

    let err = fit_baseline(
        &spec(metric_ids::VERTICAL_OSCILLATION),
        &samples,
        &FittingConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, FitError::MonotonicityViolation { .. }));
}

#[test]
fn test_insufficient_samples_after_filtering() {
    let err = fit_baseline(
        &spec(metric_ids::GROUND_CONTACT_TIME),
        &gct_samples(6),
        &FittingConfig::default(),
    )
    .unwrap_err();

    assert_eq!(
        err,
        FitError::InsufficientSamples {
            required: 10,
            actual: 6
        }
    );
}

#[test]
fn test_iqr_gate_drops_gross_outliers_before_fit() {
    let mut samples = gct_samples(14);
    samples.push(Sample {
        speed_mps: 3.7,
        value: 900.0,
    });
    samples.push(Sample {
        speed_mps: 3.9,
        value: 40.0,
    });

    let outcome = fit_baseline(
        &spec(metric_ids::GROUND_CONTACT_TIME),
        &samples,
        &FittingConfig::default(),
    )
    .unwrap();

    assert_eq!(outcome.sample_count, 14);
    let predicted = outcome.coefficients.predict(4.0);
    assert!((predicted - 250.0).abs() < 5.0, "predict(4.0) = {predicted}");
}

#[test]
fn test_fit_is_deterministic() {
    let samples = gct_samples(20);
    let config = FittingConfig::default();
    let first = fit_baseline(&spec(metric_ids::GROUND_CONTACT_TIME), &samples, &config).unwrap();
    let second = fit_baseline(&spec(metric_ids::GROUND_CONTACT_TIME), &samples, &config).unwrap();
    assert_eq!(first.coefficients, second.coefficients);
    assert!((first.rmse - second.rmse).abs() < f64::EPSILON);
}

#[test]
fn test_custom_minimum_sample_threshold() {
    let config = FittingConfig {
        min_samples: 5,
        ..FittingConfig::default()
    };
    let outcome = fit_baseline(
        &spec(metric_ids::GROUND_CONTACT_TIME),
        &gct_samples(6),
        &config,
    );
    assert!(outcome.is_ok());

    let spec_custom = MetricModelSpec {
        metric_id: "cadence_drift".to_owned(),
        display_name: "cadence drift".to_owned(),
        unit: "spm".to_owned(),
        model_family: ModelFamily::Linear,
        monotonic_sign: MonotonicSign::Positive,
        polarity: MetricPolarity::LowerIsBetter,
        condition_group: "flat_road".to_owned(),
    };
    let samples: Vec<Sample> = (0..6)
        .map(|i| Sample {
            speed_mps: 3.0 + 0.2 * f64::from(i),
            value: 1.5f64.mul_add(f64::from(i), 2.0),
        })
        .collect();
    assert!(fit_baseline(&spec_custom, &samples, &config).is_ok());
}
