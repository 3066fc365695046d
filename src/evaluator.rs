// ABOUTME: Activity evaluator: pace-adjusted expectations, tiered deviation scoring, stars
// ABOUTME: Degrades gracefully per metric and upserts one idempotent record per activity
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Formline Contributors

//! Activity evaluation.
//!
//! For each metric in an activity's snapshot the evaluator looks up the
//! baseline in force, computes the pace-adjusted expectation, and converts
//! the relative deviation into a tiered 0-5 quality score. A metric with
//! no trained baseline yields a `None` entry and never affects the
//! remaining metrics; the overall score averages only what was actually
//! evaluated. Evaluation is a pure function of (snapshot, baselines,
//! config), so repeating it with the same inputs produces byte-identical
//! output, and the write is an upsert keyed by activity id.

use crate::config::{EngineConfig, MetricRegistry, ScoringConfig};
use crate::errors::EvaluationError;
use crate::models::{
    ActivitySnapshot, Baseline, BaselineKey, Evaluation, MetricEvaluation, MetricModelSpec,
    MetricObservation,
};
use crate::providers::SampleProvider;
use crate::storage::{BaselineStore, EvaluationStore};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Score for deviations within the ideal band.
const IDEAL_SCORE: f64 = 5.0;
/// Score for deviations within the good band.
const GOOD_SCORE: f64 = 4.0;
/// Score for deviations within the fair band, and for large favorable ones.
const FAIR_SCORE: f64 = 3.0;
/// Score for unfavorable deviations within the poor band.
const POOR_SCORE: f64 = 2.0;
/// Score for unfavorable deviations beyond the poor band.
const LOWEST_SCORE: f64 = 1.0;

/// Expected values closer to zero than this cannot anchor a relative
/// deviation.
const MIN_EXPECTED_MAGNITUDE: f64 = 1e-9;

/// Quantize a continuous 0-5 score to the nearest half star for display.
/// The continuous score stays untouched for aggregation.
#[must_use]
pub fn quantize_half_star(score: f64) -> f64 {
    (score * 2.0).round() / 2.0
}

/// Evaluates activities against the baselines in force.
pub struct ActivityEvaluator<P, B, E> {
    provider: P,
    baselines: B,
    evaluations: E,
    registry: MetricRegistry,
    config: EngineConfig,
}

impl<P, B, E> ActivityEvaluator<P, B, E>
where
    P: SampleProvider,
    B: BaselineStore,
    E: EvaluationStore,
{
    /// Build an evaluator over a provider and stores.
    pub const fn new(
        provider: P,
        baselines: B,
        evaluations: E,
        registry: MetricRegistry,
        config: EngineConfig,
    ) -> Self {
        Self {
            provider,
            baselines,
            evaluations,
            registry,
            config,
        }
    }

    /// Invocation-surface entry point: fetch the activity's metric
    /// snapshot from the provider and evaluate it.
    ///
    /// # Errors
    ///
    /// [`EvaluationError::SnapshotUnavailable`] when the provider has no
    /// snapshot for the activity; provider/store failures propagated
    /// unchanged.
    pub fn evaluate_activity(&self, activity_id: &str) -> Result<Evaluation, EvaluationError> {
        let snapshot = self.provider.activity_snapshot(activity_id)?.ok_or_else(|| {
            EvaluationError::SnapshotUnavailable {
                activity_id: activity_id.to_owned(),
            }
        })?;
        self.evaluate_snapshot(&snapshot)
    }

    /// Evaluate a metric snapshot against the baselines in force and
    /// upsert the resulting record by activity id.
    ///
    /// # Errors
    ///
    /// Store failures propagated unchanged. A metric without a baseline is
    /// not an error; it becomes a `None` entry.
    pub fn evaluate_snapshot(
        &self,
        snapshot: &ActivitySnapshot,
    ) -> Result<Evaluation, EvaluationError> {
        let mut metrics: BTreeMap<String, Option<MetricEvaluation>> = BTreeMap::new();
        let mut scores: Vec<f64> = Vec::with_capacity(snapshot.metrics.len());

        for (metric_id, observation) in &snapshot.metrics {
            let entry = self.evaluate_metric(snapshot, metric_id, *observation)?;
            if let Some(metric_evaluation) = &entry {
                scores.push(metric_evaluation.score);
            }
            metrics.insert(metric_id.clone(), entry);
        }

        let overall_score =
            (!scores.is_empty()).then(|| scores.iter().sum::<f64>() / scores.len() as f64);

        let evaluation = Evaluation {
            activity_id: snapshot.activity_id.clone(),
            user_id: snapshot.user_id,
            condition_group: snapshot.condition_group.clone(),
            metrics,
            overall_score,
        };
        self.evaluations.upsert_evaluation(evaluation.clone())?;
        Ok(evaluation)
    }

    /// Evaluate one metric, or `None` when no verdict is possible for it.
    fn evaluate_metric(
        &self,
        snapshot: &ActivitySnapshot,
        metric_id: &str,
        observation: MetricObservation,
    ) -> Result<Option<MetricEvaluation>, EvaluationError> {
        let Some(spec) = self.registry.get(metric_id) else {
            debug!(
                activity_id = %snapshot.activity_id,
                metric_id,
                "snapshot metric has no registered model spec, skipping"
            );
            return Ok(None);
        };

        let key = BaselineKey::new(snapshot.user_id, &snapshot.condition_group, metric_id);
        let Some(baseline) = self.baselines.current_baseline(&key)? else {
            debug!(
                activity_id = %snapshot.activity_id,
                metric_id,
                "no baseline trained yet, metric left unevaluated"
            );
            return Ok(None);
        };

        Ok(score_observation(
            spec,
            &baseline,
            observation,
            &self.config.scoring,
        ))
    }
}

/// Score one observation against a baseline. `None` when the expectation
/// is unusable (non-finite or too close to zero for a relative deviation).
fn score_observation(
    spec: &MetricModelSpec,
    baseline: &Baseline,
    observation: MetricObservation,
    scoring: &ScoringConfig,
) -> Option<MetricEvaluation> {
    let expected = baseline.coefficients.predict(observation.speed_mps);
    if !expected.is_finite() || expected.abs() < MIN_EXPECTED_MAGNITUDE {
        warn!(
            metric_id = %spec.metric_id,
            speed_mps = observation.speed_mps,
            expected,
            "baseline produced unusable expectation, metric left unevaluated"
        );
        return None;
    }

    let deviation_pct = (observation.value - expected) / expected;
    if !deviation_pct.is_finite() {
        return None;
    }

    let unfavorable = spec.polarity.is_unfavorable(deviation_pct);
    let score = score_deviation(deviation_pct.abs(), unfavorable, scoring);
    let needs_improvement = unfavorable && deviation_pct.abs() > scoring.good_deviation_pct;

    let direction = if deviation_pct < 0.0 { "below" } else { "above" };
    let evaluation_text = format!(
        "{name} {actual:.1} {unit} against an expected {expected:.1} {unit} at this pace \
         ({magnitude:.1}% {direction} baseline)",
        name = spec.display_name,
        actual = observation.value,
        unit = spec.unit,
        magnitude = deviation_pct.abs() * 100.0,
    );

    Some(MetricEvaluation {
        expected_value: expected,
        actual_value: observation.value,
        deviation_pct,
        score,
        star_rating: quantize_half_star(score),
        needs_improvement,
        evaluation_text,
    })
}

/// Map a direction-adjusted deviation magnitude to the tiered score.
///
/// Boundaries are closed on the better side: a deviation exactly at a tier
/// threshold takes the better score. Beyond the fair band only unfavorable
/// deviations fall into the poor tiers; a large favorable deviation stays
/// fair, since it usually signals a condition or data anomaly rather than
/// a breakthrough.
fn score_deviation(magnitude: f64, unfavorable: bool, scoring: &ScoringConfig) -> f64 {
    if magnitude <= scoring.ideal_deviation_pct {
        IDEAL_SCORE
    } else if magnitude <= scoring.good_deviation_pct {
        GOOD_SCORE
    } else if magnitude <= scoring.fair_deviation_pct || !unfavorable {
        FAIR_SCORE
    } else if magnitude <= scoring.poor_deviation_pct {
        POOR_SCORE
    } else {
        LOWEST_SCORE
    }
}
