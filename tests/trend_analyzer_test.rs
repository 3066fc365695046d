// ABOUTME: Tests for baseline trend analysis across snapshot history
// ABOUTME: Covers polarity-aware direction, stability band, and missing-snapshot behavior
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Formline Contributors

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use formline::models::metric_ids;
use formline::{
    BaselineKey, BaselineSnapshot, BaselineStore, Coefficients, InMemoryBaselineStore,
    MetricRegistry, SpeedRange, TimeWindow, TrendAnalyzer, TrendConfig, TrendDirection,
};
use uuid::Uuid;

const CONDITION: &str = "flat_road";

fn date(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
}

fn previous_period() -> TimeWindow {
    TimeWindow {
        start: date(2024, 1, 1),
        end: date(2024, 3, 1),
    }
}

fn current_period() -> TimeWindow {
    TimeWindow {
        start: date(2024, 3, 1),
        end: date(2024, 5, 1),
    }
}

fn snapshot(
    user_id: Uuid,
    metric_id: &str,
    period: TimeWindow,
    coefficients: Coefficients,
) -> BaselineSnapshot {
    BaselineSnapshot {
        key: BaselineKey::new(user_id, CONDITION, metric_id),
        period,
        coefficients,
        rmse: 2.0,
        sample_count: 24,
        speed_range: SpeedRange {
            min_mps: 3.0,
            max_mps: 4.0,
        },
    }
}

fn analyzer(store: &InMemoryBaselineStore) -> TrendAnalyzer<&InMemoryBaselineStore> {
    TrendAnalyzer::new(store, MetricRegistry::default(), TrendConfig::default())
}

#[test]
fn test_lower_is_better_metric_dropping_is_improving() {
    // Flat linear models so the predicted value at the reference speed is
    // just the intercept: 8.0 cm then, 7.5 cm now.
    let user_id = Uuid::new_v4();
    let store = InMemoryBaselineStore::new();
    store
        .append_snapshot(snapshot(
            user_id,
            metric_ids::VERTICAL_OSCILLATION,
            previous_period(),
            Coefficients::Linear {
                intercept: 8.0,
                slope: 0.0,
            },
        ))
        .unwrap();
    store
        .append_snapshot(snapshot(
            user_id,
            metric_ids::VERTICAL_OSCILLATION,
            current_period(),
            Coefficients::Linear {
                intercept: 7.5,
                slope: 0.0,
            },
        ))
        .unwrap();

    let result = analyzer(&store)
        .trend(
            user_id,
            CONDITION,
            metric_ids::VERTICAL_OSCILLATION,
            date(2024, 4, 15),
            Duration::days(60),
        )
        .unwrap()
        .unwrap();

    assert_eq!(result.direction, TrendDirection::Improving);
    assert!((result.reference_speed_mps - 3.5).abs() < 1e-9);
    assert!((result.previous_expected - 8.0).abs() < 1e-9);
    assert!((result.current_expected - 7.5).abs() < 1e-9);
    assert!((result.predicted_delta_pct + 0.0625).abs() < 1e-9);
    assert_eq!(result.current_period, current_period());
    assert_eq!(result.previous_period, previous_period());
}

#[test]
fn test_lower_is_better_metric_rising_is_regressing() {
    let user_id = Uuid::new_v4();
    let store = InMemoryBaselineStore::new();
    store
        .append_snapshot(snapshot(
            user_id,
            metric_ids::VERTICAL_OSCILLATION,
            previous_period(),
            Coefficients::Linear {
                intercept: 7.5,
                slope: 0.0,
            },
        ))
        .unwrap();
    store
        .append_snapshot(snapshot(
            user_id,
            metric_ids::VERTICAL_OSCILLATION,
            current_period(),
            Coefficients::Linear {
                intercept: 8.2,
                slope: 0.0,
            },
        ))
        .unwrap();

    let result = analyzer(&store)
        .trend(
            user_id,
            CONDITION,
            metric_ids::VERTICAL_OSCILLATION,
            date(2024, 4, 15),
            Duration::days(60),
        )
        .unwrap()
        .unwrap();

    assert_eq!(result.direction, TrendDirection::Regressing);
    assert!(result.predicted_delta_pct > 0.0);
}

#[test]
fn test_delta_inside_stability_band_is_stable() {
    // 0.5% movement sits inside the default 1% stability band.
    let user_id = Uuid::new_v4();
    let store = InMemoryBaselineStore::new();
    store
        .append_snapshot(snapshot(
            user_id,
            metric_ids::VERTICAL_OSCILLATION,
            previous_period(),
            Coefficients::Linear {
                intercept: 8.0,
                slope: 0.0,
            },
        ))
        .unwrap();
    store
        .append_snapshot(snapshot(
            user_id,
            metric_ids::VERTICAL_OSCILLATION,
            current_period(),
            Coefficients::Linear {
                intercept: 8.04,
                slope: 0.0,
            },
        ))
        .unwrap();

    let result = analyzer(&store)
        .trend(
            user_id,
            CONDITION,
            metric_ids::VERTICAL_OSCILLATION,
            date(2024, 4, 15),
            Duration::days(60),
        )
        .unwrap()
        .unwrap();

    assert_eq!(result.direction, TrendDirection::Stable);
}

#[test]
fn test_power_law_trend_compares_predictions_not_coefficients() {
    // Both snapshots predict at the shared reference speed 3.5 m/s; the
    // newer one predicts a lower ground contact time there, so the trend
    // improves even though the exponent moved toward zero.
    let exponent_then: f64 = -2.5;
    let exponent_now: f64 = -2.4;
    let user_id = Uuid::new_v4();
    let store = InMemoryBaselineStore::new();
    store
        .append_snapshot(snapshot(
            user_id,
            metric_ids::GROUND_CONTACT_TIME,
            previous_period(),
            Coefficients::PowerLaw {
                alpha: exponent_then.mul_add(-260.0f64.ln(), 3.5f64.ln()),
                exponent: exponent_then,
            },
        ))
        .unwrap();
    store
        .append_snapshot(snapshot(
            user_id,
            metric_ids::GROUND_CONTACT_TIME,
            current_period(),
            Coefficients::PowerLaw {
                alpha: exponent_now.mul_add(-250.0f64.ln(), 3.5f64.ln()),
                exponent: exponent_now,
            },
        ))
        .unwrap();

    let result = analyzer(&store)
        .trend(
            user_id,
            CONDITION,
            metric_ids::GROUND_CONTACT_TIME,
            date(2024, 4, 15),
            Duration::days(60),
        )
        .unwrap()
        .unwrap();

    assert_eq!(result.direction, TrendDirection::Improving);
    assert!((result.previous_expected - 260.0).abs() < 1e-6);
    assert!((result.current_expected - 250.0).abs() < 1e-6);
    assert!((result.coefficient_delta - 0.1).abs() < 1e-9);
}

#[test]
fn test_missing_previous_snapshot_yields_none() {
    let user_id = Uuid::new_v4();
    let store = InMemoryBaselineStore::new();
    store
        .append_snapshot(snapshot(
            user_id,
            metric_ids::VERTICAL_OSCILLATION,
            current_period(),
            Coefficients::Linear {
                intercept: 7.5,
                slope: 0.0,
            },
        ))
        .unwrap();

    let result = analyzer(&store)
        .trend(
            user_id,
            CONDITION,
            metric_ids::VERTICAL_OSCILLATION,
            date(2024, 4, 15),
            Duration::days(60),
        )
        .unwrap();
    assert!(result.is_none());
}

#[test]
fn test_no_snapshots_at_all_yields_none() {
    let store = InMemoryBaselineStore::new();
    let result = analyzer(&store)
        .trend(
            Uuid::new_v4(),
            CONDITION,
            metric_ids::GROUND_CONTACT_TIME,
            date(2024, 4, 15),
            Duration::days(60),
        )
        .unwrap();
    assert!(result.is_none());
}

#[test]
fn test_unregistered_metric_yields_none() {
    let store = InMemoryBaselineStore::new();
    let result = analyzer(&store)
        .trend(
            Uuid::new_v4(),
            CONDITION,
            "stride_angle",
            date(2024, 4, 15),
            Duration::days(60),
        )
        .unwrap();
    assert!(result.is_none());
}

#[test]
fn test_reference_speed_falls_back_to_current_midpoint_without_overlap() {
    // Disjoint speed bands: the previous fit never saw the current range,
    // so the comparison uses the current band's midpoint.
    let user_id = Uuid::new_v4();
    let store = InMemoryBaselineStore::new();
    let mut previous = snapshot(
        user_id,
        metric_ids::VERTICAL_OSCILLATION,
        previous_period(),
        Coefficients::Linear {
            intercept: 8.0,
            slope: 0.0,
        },
    );
    previous.speed_range = SpeedRange {
        min_mps: 2.0,
        max_mps: 2.8,
    };
    store.append_snapshot(previous).unwrap();
    let mut current = snapshot(
        user_id,
        metric_ids::VERTICAL_OSCILLATION,
        current_period(),
        Coefficients::Linear {
            intercept: 7.0,
            slope: 0.0,
        },
    );
    current.speed_range = SpeedRange {
        min_mps: 3.2,
        max_mps: 4.2,
    };
    store.append_snapshot(current).unwrap();

    let result = analyzer(&store)
        .trend(
            user_id,
            CONDITION,
            metric_ids::VERTICAL_OSCILLATION,
            date(2024, 4, 15),
            Duration::days(60),
        )
        .unwrap()
        .unwrap();
    assert!((result.reference_speed_mps - 3.7).abs() < 1e-9);
    assert_eq!(result.direction, TrendDirection::Improving);
}
