// ABOUTME: Baseline trainer: windowed robust fitting, publish-or-abort, snapshot history
// ABOUTME: Rayon batch fan-out over independent metric keys; failures stay local to one key
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Formline Contributors

//! Baseline training orchestration.
//!
//! The trainer owns write access to baseline state. Each run pulls samples
//! for one `(user, condition group, metric)` key over a caller-supplied
//! rolling window, fits the metric's configured model family, and either
//! publishes (upsert the live baseline, append one history snapshot) or
//! aborts with a typed failure leaving the previous baseline untouched.
//! Scheduling is an external concern; the trainer holds no periodicity
//! logic.

use crate::config::{EngineConfig, MetricRegistry};
use crate::errors::{FitError, TrainingError};
use crate::models::{
    Baseline, BaselineKey, BaselineSnapshot, TimeWindow, TrainingReport,
};
use crate::providers::SampleProvider;
use crate::regression::fit_baseline;
use crate::storage::BaselineStore;
use chrono::{DateTime, Months, Utc};
use rayon::prelude::*;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Invocation-surface request: a rolling window of whole months ending at
/// `end_date`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingRequest {
    /// Athlete to train for
    pub user_id: Uuid,
    /// Condition group partition to train on
    pub condition_group: String,
    /// Metric to train
    pub metric_id: String,
    /// End of the rolling window (typically "now")
    pub end_date: DateTime<Utc>,
    /// Window length in calendar months (typically 2)
    pub window_months: u32,
}

/// Fits and publishes per-metric baselines.
///
/// Holds the sample provider, baseline store, registry, and configuration
/// by handle. Concurrent training runs for *different* keys never
/// conflict; serializing runs for the *same* key is the caller's job.
pub struct BaselineTrainer<P, B> {
    provider: P,
    store: B,
    registry: MetricRegistry,
    config: EngineConfig,
}

impl<P: SampleProvider, B: BaselineStore> BaselineTrainer<P, B> {
    /// Build a trainer over a provider and store.
    pub const fn new(provider: P, store: B, registry: MetricRegistry, config: EngineConfig) -> Self {
        Self {
            provider,
            store,
            registry,
            config,
        }
    }

    /// Train one `(user, condition group, metric)` key over a window.
    ///
    /// On success the live baseline is replaced and one snapshot is
    /// appended for the window. On any failure the previous baseline is
    /// left byte-identical to before the call.
    ///
    /// # Errors
    ///
    /// [`TrainingError::UnknownMetric`] for unregistered metrics,
    /// [`TrainingError::Fit`] for rejected fits, and provider/store
    /// failures propagated unchanged.
    pub fn train(
        &self,
        user_id: Uuid,
        condition_group: &str,
        metric_id: &str,
        window: TimeWindow,
    ) -> Result<TrainingReport, TrainingError> {
        let spec = self
            .registry
            .get(metric_id)
            .ok_or_else(|| TrainingError::UnknownMetric {
                metric_id: metric_id.to_owned(),
            })?;

        let samples =
            self.provider
                .training_samples(user_id, condition_group, metric_id, window)?;
        debug!(
            %user_id,
            condition_group,
            metric_id,
            sample_count = samples.len(),
            "pulled training samples"
        );

        let outcome = match fit_baseline(spec, &samples, &self.config.fitting) {
            Ok(outcome) => outcome,
            Err(err) => {
                match &err {
                    FitError::MonotonicityViolation { coefficient, .. } => {
                        // Usually a condition-group misclassification
                        // upstream; operators watch for this signal.
                        warn!(
                            %user_id,
                            condition_group,
                            metric_id,
                            coefficient,
                            "fit rejected for wrong coefficient sign, previous baseline stands"
                        );
                    }
                    FitError::InsufficientSamples { required, actual } => {
                        debug!(
                            %user_id,
                            condition_group,
                            metric_id,
                            required,
                            actual,
                            "not enough valid samples, previous baseline stands"
                        );
                    }
                    FitError::DegenerateFit { reason } => {
                        warn!(
                            %user_id,
                            condition_group,
                            metric_id,
                            reason,
                            "degenerate fit, previous baseline stands"
                        );
                    }
                }
                return Err(err.into());
            }
        };

        let key = BaselineKey::new(user_id, condition_group, metric_id);
        let trained_at = Utc::now();
        self.store.upsert_baseline(Baseline {
            key: key.clone(),
            coefficients: outcome.coefficients,
            rmse: outcome.rmse,
            sample_count: outcome.sample_count,
            speed_range: outcome.speed_range,
            trained_at,
        })?;
        self.store.append_snapshot(BaselineSnapshot {
            key: key.clone(),
            period: window,
            coefficients: outcome.coefficients,
            rmse: outcome.rmse,
            sample_count: outcome.sample_count,
            speed_range: outcome.speed_range,
        })?;

        info!(
            %user_id,
            condition_group,
            metric_id,
            rmse = outcome.rmse,
            sample_count = outcome.sample_count,
            "published baseline"
        );

        Ok(TrainingReport {
            key,
            coefficients: outcome.coefficients,
            rmse: outcome.rmse,
            sample_count: outcome.sample_count,
            speed_range: outcome.speed_range,
            window,
            trained_at,
        })
    }

    /// Train over a rolling window of whole calendar months ending at
    /// `request.end_date`.
    ///
    /// # Errors
    ///
    /// [`TrainingError::InvalidWindow`] when the window is empty or the
    /// month arithmetic underflows, plus everything [`Self::train`] raises.
    pub fn train_window(&self, request: &TrainingRequest) -> Result<TrainingReport, TrainingError> {
        if request.window_months == 0 {
            return Err(TrainingError::InvalidWindow {
                reason: "window must span at least one month",
            });
        }
        let start = request
            .end_date
            .checked_sub_months(Months::new(request.window_months))
            .ok_or(TrainingError::InvalidWindow {
                reason: "window start is out of representable range",
            })?;
        self.train(
            request.user_id,
            &request.condition_group,
            &request.metric_id,
            TimeWindow {
                start,
                end: request.end_date,
            },
        )
    }

    /// Train several metrics over the same window in parallel.
    ///
    /// One key's failure never halts the others; results are returned per
    /// metric in input order.
    pub fn train_batch(
        &self,
        user_id: Uuid,
        condition_group: &str,
        metric_ids: &[String],
        window: TimeWindow,
    ) -> Vec<(String, Result<TrainingReport, TrainingError>)>
    where
        P: Sync,
        B: Sync,
    {
        metric_ids
            .par_iter()
            .map(|metric_id| {
                (
                    metric_id.clone(),
                    self.train(user_id, condition_group, metric_id, window),
                )
            })
            .collect()
    }
}
