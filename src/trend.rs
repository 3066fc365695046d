// ABOUTME: Trend analyzer comparing baseline snapshots at a fixed representative speed
// ABOUTME: Advisory by design: missing snapshots yield None, never a hard failure
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Formline Contributors

//! Baseline trend analysis.
//!
//! Compares the snapshot covering a reference date with the snapshot
//! covering `reference - lookback`. A more extreme pace-sensitivity
//! coefficient is not itself "better"; improvement means the *predicted*
//! metric value at a fixed representative speed moved favorably between
//! the two snapshots. Trend is informational: a missing snapshot on either
//! side yields `None` rather than an error.

use crate::config::{MetricRegistry, TrendConfig};
use crate::errors::StoreError;
use crate::models::{BaselineKey, BaselineSnapshot, MetricPolarity, TrendDirection, TrendResult};
use crate::storage::BaselineStore;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

/// Compares baseline snapshots across training windows.
pub struct TrendAnalyzer<B> {
    store: B,
    registry: MetricRegistry,
    config: TrendConfig,
}

impl<B: BaselineStore> TrendAnalyzer<B> {
    /// Build an analyzer over a baseline store.
    pub const fn new(store: B, registry: MetricRegistry, config: TrendConfig) -> Self {
        Self {
            store,
            registry,
            config,
        }
    }

    /// Trend of one metric's baseline between the snapshot covering
    /// `as_of` and the one covering `as_of - lookback`.
    ///
    /// Returns `Ok(None)` when either snapshot is missing or the metric is
    /// unregistered — trend is advisory and never a hard failure.
    ///
    /// # Errors
    ///
    /// Store failures are still propagated unchanged.
    pub fn trend(
        &self,
        user_id: Uuid,
        condition_group: &str,
        metric_id: &str,
        as_of: DateTime<Utc>,
        lookback: Duration,
    ) -> Result<Option<TrendResult>, StoreError> {
        let Some(spec) = self.registry.get(metric_id) else {
            debug!(metric_id, "no model spec registered, no trend");
            return Ok(None);
        };

        let key = BaselineKey::new(user_id, condition_group, metric_id);
        let Some(current) = self.store.snapshot_covering(&key, as_of)? else {
            debug!(metric_id, %as_of, "no snapshot covers reference date");
            return Ok(None);
        };
        let earlier = as_of - lookback;
        let Some(previous) = self.store.snapshot_covering(&key, earlier)? else {
            debug!(metric_id, %earlier, "no snapshot covers lookback date");
            return Ok(None);
        };

        Ok(compare_snapshots(
            spec.polarity,
            &current,
            &previous,
            self.config.stability_threshold_pct,
        ))
    }
}

/// Compare two snapshots of the same logical model at a representative
/// speed inside the band both were fit on.
fn compare_snapshots(
    polarity: MetricPolarity,
    current: &BaselineSnapshot,
    previous: &BaselineSnapshot,
    stability_threshold_pct: f64,
) -> Option<TrendResult> {
    let reference_speed_mps = current
        .speed_range
        .overlap(&previous.speed_range)
        .map_or_else(|| current.speed_range.midpoint(), |band| band.midpoint());

    let current_expected = current.coefficients.predict(reference_speed_mps);
    let previous_expected = previous.coefficients.predict(reference_speed_mps);
    if !current_expected.is_finite()
        || !previous_expected.is_finite()
        || previous_expected.abs() < f64::EPSILON
    {
        warn!(
            metric_id = %current.key.metric_id,
            reference_speed_mps,
            "snapshot predictions unusable at reference speed, no trend"
        );
        return None;
    }

    let predicted_delta_pct = (current_expected - previous_expected) / previous_expected;
    let direction = if predicted_delta_pct.abs() <= stability_threshold_pct {
        TrendDirection::Stable
    } else {
        let decreased = current_expected < previous_expected;
        let improving = match polarity {
            MetricPolarity::LowerIsBetter => decreased,
            MetricPolarity::HigherIsBetter => !decreased,
        };
        if improving {
            TrendDirection::Improving
        } else {
            TrendDirection::Regressing
        }
    };

    Some(TrendResult {
        metric_id: current.key.metric_id.clone(),
        reference_speed_mps,
        previous_expected,
        current_expected,
        predicted_delta_pct,
        coefficient_delta: current.coefficients.pace_sensitivity()
            - previous.coefficients.pace_sensitivity(),
        direction,
        current_period: current.period,
        previous_period: previous.period,
    })
}
