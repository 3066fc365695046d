// ABOUTME: Domain types for pace-corrected baseline modeling and activity evaluation
// ABOUTME: Metric specs, coefficient tagged union, baselines, snapshots, evaluations, trends
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Formline Contributors

//! Domain model for the baseline engine.
//!
//! Every tracked running-form metric is strongly pace-dependent, so the
//! central object here is the [`Baseline`]: the current best-fit regression
//! mapping speed to the expected metric value for one
//! `(user, condition group, metric)` key. [`BaselineSnapshot`] is its
//! append-only, time-boxed history used for trend comparison, and
//! [`Evaluation`] is the self-contained per-activity verdict.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Well-known metric identifiers served by the default registry.
pub mod metric_ids {
    /// Ground contact time in milliseconds. Shrinks with speed.
    pub const GROUND_CONTACT_TIME: &str = "ground_contact_time";
    /// Vertical oscillation in centimeters.
    pub const VERTICAL_OSCILLATION: &str = "vertical_oscillation";
    /// Vertical ratio (oscillation over stride length) in percent.
    pub const VERTICAL_RATIO: &str = "vertical_ratio";
    /// Power-to-speed ratio in watt-seconds per meter per kilogram.
    pub const POWER_SPEED_RATIO: &str = "power_speed_ratio";
}

/// Regression model shape used for one metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    /// `speed = exp(alpha) * metric^exponent`, fit in log-log space.
    /// For metrics that shrink multiplicatively with pace (ground contact time).
    PowerLaw,
    /// `metric = intercept + slope * speed`. For metrics with a gentle
    /// additive relationship to pace (vertical oscillation, power ratios).
    Linear,
}

/// Required sign of the fitted pace-sensitivity coefficient.
///
/// A fit whose coefficient violates this sign is rejected rather than
/// published; the constraint encodes the metric's physical meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonotonicSign {
    /// Coefficient must be strictly negative (metric falls as speed rises).
    Negative,
    /// Coefficient must be strictly positive (metric rises with speed).
    Positive,
}

impl MonotonicSign {
    /// Whether a fitted coefficient satisfies this sign constraint.
    #[must_use]
    pub fn permits(self, coefficient: f64) -> bool {
        match self {
            Self::Negative => coefficient < 0.0,
            Self::Positive => coefficient > 0.0,
        }
    }
}

/// Which direction of deviation from expectation is unfavorable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricPolarity {
    /// Smaller actual values are favorable (ground contact time).
    LowerIsBetter,
    /// Larger actual values are favorable.
    HigherIsBetter,
}

impl MetricPolarity {
    /// Whether a signed relative deviation lies on the unfavorable side.
    #[must_use]
    pub fn is_unfavorable(self, deviation_pct: f64) -> bool {
        match self {
            Self::LowerIsBetter => deviation_pct > 0.0,
            Self::HigherIsBetter => deviation_pct < 0.0,
        }
    }
}

/// Immutable description of how one metric is modeled.
///
/// Defined by configuration (see
/// [`MetricRegistry`](crate::config::MetricRegistry)), never learned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricModelSpec {
    /// Stable metric identifier (see [`metric_ids`])
    pub metric_id: String,
    /// Human-readable name used in evaluation text
    pub display_name: String,
    /// Display unit used in evaluation text
    pub unit: String,
    /// Regression shape fit for this metric
    pub model_family: ModelFamily,
    /// Required sign of the pace-sensitivity coefficient
    pub monotonic_sign: MonotonicSign,
    /// Which deviation direction is unfavorable when scoring
    pub polarity: MetricPolarity,
    /// Terrain/surface partition this spec applies to. Opaque key supplied
    /// by the sample provider; no classification happens in this crate.
    pub condition_group: String,
}

/// Natural key of a baseline: one live model per triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BaselineKey {
    /// Athlete the model belongs to
    pub user_id: Uuid,
    /// Terrain/surface partition the model was trained on
    pub condition_group: String,
    /// Metric the model predicts
    pub metric_id: String,
}

impl BaselineKey {
    /// Build a key from its parts.
    #[must_use]
    pub fn new(user_id: Uuid, condition_group: &str, metric_id: &str) -> Self {
        Self {
            user_id,
            condition_group: condition_group.to_owned(),
            metric_id: metric_id.to_owned(),
        }
    }
}

/// Model-family-specific fitted coefficients.
///
/// Closed tagged union dispatched through a single fit/predict contract;
/// see [`crate::regression`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum Coefficients {
    /// `ln(speed) = alpha + exponent * ln(metric)`
    PowerLaw {
        /// Log-space intercept
        alpha: f64,
        /// Pace-sensitivity exponent; negative for shrink-with-speed metrics
        exponent: f64,
    },
    /// `metric = intercept + slope * speed`
    Linear {
        /// Metric value extrapolated to zero speed
        intercept: f64,
        /// Pace-sensitivity slope
        slope: f64,
    },
}

impl Coefficients {
    /// The pace-sensitivity coefficient the monotonicity constraint applies
    /// to: the exponent for power-law models, the slope for linear ones.
    #[must_use]
    pub const fn pace_sensitivity(&self) -> f64 {
        match self {
            Self::PowerLaw { exponent, .. } => *exponent,
            Self::Linear { slope, .. } => *slope,
        }
    }
}

/// Speed range the model was trained on, in meters per second.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedRange {
    /// Slowest retained training sample
    pub min_mps: f64,
    /// Fastest retained training sample
    pub max_mps: f64,
}

impl SpeedRange {
    /// Midpoint of the range.
    #[must_use]
    pub fn midpoint(&self) -> f64 {
        (self.min_mps + self.max_mps) / 2.0
    }

    /// Intersection with another range, if the two overlap.
    #[must_use]
    pub fn overlap(&self, other: &Self) -> Option<Self> {
        let min_mps = self.min_mps.max(other.min_mps);
        let max_mps = self.max_mps.min(other.max_mps);
        (min_mps <= max_mps).then_some(Self { min_mps, max_mps })
    }
}

/// One historical training observation: speed and the metric value
/// produced at that speed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Activity speed in meters per second
    pub speed_mps: f64,
    /// Metric value observed at that speed
    pub value: f64,
}

/// Closed time window `[start, end]` used for training and snapshot
/// periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Inclusive window start
    pub start: DateTime<Utc>,
    /// Inclusive window end
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Whether a date falls inside the window.
    #[must_use]
    pub fn contains(&self, date: DateTime<Utc>) -> bool {
        date >= self.start && date <= self.end
    }
}

/// The current best-fit model for one baseline key.
///
/// Exactly one live baseline exists per key; training replaces it by
/// natural-key upsert and never appends. A baseline is only ever published
/// with a pace-sensitivity coefficient satisfying the metric's
/// [`MonotonicSign`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    /// Natural key of the model
    #[serde(flatten)]
    pub key: BaselineKey,
    /// Fitted model coefficients
    pub coefficients: Coefficients,
    /// Root-mean-square error in metric units over retained samples
    pub rmse: f64,
    /// Number of samples retained by the robust fit
    pub sample_count: usize,
    /// Speed range of retained samples
    pub speed_range: SpeedRange,
    /// When this model was trained
    pub trained_at: DateTime<Utc>,
}

/// Immutable, time-boxed copy of a baseline's coefficients.
///
/// Appended every time training succeeds; never mutated or deleted. Used
/// exclusively for trend comparison across training windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineSnapshot {
    /// Natural key of the underlying model
    #[serde(flatten)]
    pub key: BaselineKey,
    /// Training window this snapshot covers
    pub period: TimeWindow,
    /// Coefficients as of this window
    pub coefficients: Coefficients,
    /// Fit quality as of this window
    pub rmse: f64,
    /// Retained sample count as of this window
    pub sample_count: usize,
    /// Speed range the model was fit on; bounds the representative speed
    /// used by trend comparison
    pub speed_range: SpeedRange,
}

impl BaselineSnapshot {
    /// Whether this snapshot's window covers a date.
    #[must_use]
    pub fn covers(&self, date: DateTime<Utc>) -> bool {
        self.period.contains(date)
    }
}

/// One metric reading from a single activity: the value and the speed at
/// which it was produced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricObservation {
    /// Actual metric value
    pub value: f64,
    /// Activity speed in meters per second
    pub speed_mps: f64,
}

/// Per-activity metric snapshot handed to the evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivitySnapshot {
    /// Provider-scoped activity identifier
    pub activity_id: String,
    /// Athlete the activity belongs to
    pub user_id: Uuid,
    /// Condition group the activity was classified into upstream
    pub condition_group: String,
    /// Observed metrics; ordered map so evaluation output is deterministic
    pub metrics: BTreeMap<String, MetricObservation>,
}

/// Evaluation verdict for one metric of one activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricEvaluation {
    /// Pace-adjusted expectation from the baseline in force
    pub expected_value: f64,
    /// Value the activity actually produced
    pub actual_value: f64,
    /// Signed relative deviation `(actual - expected) / expected`
    pub deviation_pct: f64,
    /// Continuous quality score, 0.0-5.0
    pub score: f64,
    /// Score quantized to the nearest half star for display
    pub star_rating: f64,
    /// Whether the deviation exceeds 5% on the unfavorable side
    pub needs_improvement: bool,
    /// Templated sentence with actual/expected/deviation filled in
    pub evaluation_text: String,
}

/// Evaluation record for one activity, keyed uniquely by `activity_id`.
///
/// Self-contained: stores the resolved expected values rather than a
/// reference to the baseline, so later retraining never changes an
/// existing record. Re-evaluating replaces the record in place. Carries no
/// wall-clock field so identical inputs serialize byte-identically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Provider-scoped activity identifier (unique key)
    pub activity_id: String,
    /// Athlete the activity belongs to
    pub user_id: Uuid,
    /// Condition group the activity was evaluated under
    pub condition_group: String,
    /// Per-metric verdicts; `None` marks a metric with no trained baseline
    pub metrics: BTreeMap<String, Option<MetricEvaluation>>,
    /// Unweighted mean of present per-metric scores; `None` when no metric
    /// could be evaluated
    pub overall_score: Option<f64>,
}

/// Success payload of one training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    /// Key the baseline was published under
    #[serde(flatten)]
    pub key: BaselineKey,
    /// Published coefficients
    pub coefficients: Coefficients,
    /// Fit RMSE in metric units
    pub rmse: f64,
    /// Samples retained by the robust fit
    pub sample_count: usize,
    /// Speed range of retained samples
    pub speed_range: SpeedRange,
    /// Training window the model was fit on
    pub window: TimeWindow,
    /// Publication timestamp
    pub trained_at: DateTime<Utc>,
}

/// Direction of a baseline trend between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    /// Predicted metric moved in the favorable direction
    Improving,
    /// Predicted metric moved less than the stability threshold
    Stable,
    /// Predicted metric moved in the unfavorable direction
    Regressing,
}

/// Trend comparison between two baseline snapshots of the same metric.
///
/// Improvement is defined at a fixed representative speed: the predicted
/// metric value moving favorably between the two snapshots. A more extreme
/// pace-sensitivity coefficient is not by itself better, which is why the
/// raw coefficient delta is reported separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendResult {
    /// Metric the trend describes
    pub metric_id: String,
    /// Speed at which both models were compared
    pub reference_speed_mps: f64,
    /// Predicted metric value under the earlier snapshot
    pub previous_expected: f64,
    /// Predicted metric value under the later snapshot
    pub current_expected: f64,
    /// Relative change of the prediction, `(current - previous) / previous`
    pub predicted_delta_pct: f64,
    /// Signed change of the pace-sensitivity coefficient
    pub coefficient_delta: f64,
    /// Classification of the change under the metric's polarity
    pub direction: TrendDirection,
    /// Window of the later snapshot
    pub current_period: TimeWindow,
    /// Window of the earlier snapshot
    pub previous_period: TimeWindow,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;

    #[test]
    fn monotonic_sign_permits() {
        assert!(MonotonicSign::Negative.permits(-0.4));
        assert!(!MonotonicSign::Negative.permits(0.4));
        assert!(!MonotonicSign::Negative.permits(0.0));
        assert!(MonotonicSign::Positive.permits(0.4));
        assert!(!MonotonicSign::Positive.permits(0.0));
    }

    #[test]
    fn polarity_unfavorable_side() {
        assert!(MetricPolarity::LowerIsBetter.is_unfavorable(0.06));
        assert!(!MetricPolarity::LowerIsBetter.is_unfavorable(-0.06));
        assert!(MetricPolarity::HigherIsBetter.is_unfavorable(-0.06));
        assert!(!MetricPolarity::HigherIsBetter.is_unfavorable(0.06));
    }

    #[test]
    fn speed_range_overlap_midpoint() {
        let a = SpeedRange {
            min_mps: 3.0,
            max_mps: 4.0,
        };
        let b = SpeedRange {
            min_mps: 3.5,
            max_mps: 4.5,
        };
        let overlap = a.overlap(&b).unwrap();
        assert!((overlap.min_mps - 3.5).abs() < f64::EPSILON);
        assert!((overlap.max_mps - 4.0).abs() < f64::EPSILON);
        assert!((overlap.midpoint() - 3.75).abs() < f64::EPSILON);

        let disjoint = SpeedRange {
            min_mps: 5.0,
            max_mps: 6.0,
        };
        assert!(a.overlap(&disjoint).is_none());
    }
}
