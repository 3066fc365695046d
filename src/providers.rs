// ABOUTME: Sample provider seam supplying historical training samples and activity snapshots
// ABOUTME: Includes a deterministic in-memory provider for tests, benches, and embedders
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Formline Contributors

//! Sample provider interface.
//!
//! Raw data acquisition is an external concern; the engine only consumes a
//! tabular `(speed, value, timestamp)` feed per metric and a per-activity
//! metric snapshot. Timeouts, retries, and cancellation belong to the
//! provider, not to this crate.

use crate::errors::ProviderError;
use crate::models::{ActivitySnapshot, Sample, TimeWindow};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

/// One historical observation with its recording time, as stored by a
/// provider backend. The trainer only sees the window-filtered
/// [`Sample`]s.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedSample {
    /// Activity speed in meters per second
    pub speed_mps: f64,
    /// Metric value observed at that speed
    pub value: f64,
    /// When the observation was recorded
    pub recorded_at: DateTime<Utc>,
}

impl TimedSample {
    /// Strip the timestamp for fitting.
    #[must_use]
    pub const fn sample(&self) -> Sample {
        Sample {
            speed_mps: self.speed_mps,
            value: self.value,
        }
    }
}

/// Supplies historical training samples and per-activity metric snapshots.
///
/// Implementations are synchronous; a caller wanting overlap runs
/// independent calls on separate threads.
pub trait SampleProvider: Send + Sync {
    /// Historical `(speed, value)` pairs for one metric, restricted to a
    /// condition group and time window.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the backing source cannot serve the
    /// request; propagated unchanged by the trainer.
    fn training_samples(
        &self,
        user_id: Uuid,
        condition_group: &str,
        metric_id: &str,
        window: TimeWindow,
    ) -> Result<Vec<Sample>, ProviderError>;

    /// The metric snapshot recorded for one activity, if any.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the backing source cannot serve the
    /// request; propagated unchanged by the evaluator.
    fn activity_snapshot(
        &self,
        activity_id: &str,
    ) -> Result<Option<ActivitySnapshot>, ProviderError>;
}

impl<T: SampleProvider + ?Sized> SampleProvider for &T {
    fn training_samples(
        &self,
        user_id: Uuid,
        condition_group: &str,
        metric_id: &str,
        window: TimeWindow,
    ) -> Result<Vec<Sample>, ProviderError> {
        (**self).training_samples(user_id, condition_group, metric_id, window)
    }

    fn activity_snapshot(
        &self,
        activity_id: &str,
    ) -> Result<Option<ActivitySnapshot>, ProviderError> {
        (**self).activity_snapshot(activity_id)
    }
}

/// Deterministic in-memory provider.
///
/// Backs tests and benchmarks, and serves embedders that already hold the
/// sample feed in memory. Populated up front through `&mut` methods, then
/// shared immutably with the trainer and evaluator.
#[derive(Debug, Default)]
pub struct StaticSampleProvider {
    samples: HashMap<(Uuid, String, String), Vec<TimedSample>>,
    snapshots: HashMap<String, ActivitySnapshot>,
}

impl StaticSampleProvider {
    /// Empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append timed samples for one `(user, condition group, metric)` feed.
    pub fn push_samples(
        &mut self,
        user_id: Uuid,
        condition_group: &str,
        metric_id: &str,
        samples: impl IntoIterator<Item = TimedSample>,
    ) {
        self.samples
            .entry((user_id, condition_group.to_owned(), metric_id.to_owned()))
            .or_default()
            .extend(samples);
    }

    /// Store (or replace) the metric snapshot for one activity.
    pub fn put_snapshot(&mut self, snapshot: ActivitySnapshot) {
        self.snapshots.insert(snapshot.activity_id.clone(), snapshot);
    }
}

impl SampleProvider for StaticSampleProvider {
    fn training_samples(
        &self,
        user_id: Uuid,
        condition_group: &str,
        metric_id: &str,
        window: TimeWindow,
    ) -> Result<Vec<Sample>, ProviderError> {
        let key = (user_id, condition_group.to_owned(), metric_id.to_owned());
        Ok(self
            .samples
            .get(&key)
            .map(|feed| {
                feed.iter()
                    .filter(|s| window.contains(s.recorded_at))
                    .map(TimedSample::sample)
                    .collect()
            })
            .unwrap_or_default())
    }

    fn activity_snapshot(
        &self,
        activity_id: &str,
    ) -> Result<Option<ActivitySnapshot>, ProviderError> {
        Ok(self.snapshots.get(activity_id).cloned())
    }
}
