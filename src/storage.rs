// ABOUTME: Baseline and evaluation store traits plus in-memory reference implementations
// ABOUTME: Upsert-by-natural-key for live state, append-only history for snapshots
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Formline Contributors

//! Storage seams for baseline state and evaluation records.
//!
//! The engine never owns a process-wide singleton: stores are explicit
//! handles passed into the trainer and evaluator, which keeps tests
//! isolated and lets embedders plug in their own persistence. The
//! in-memory implementations here are the reference semantics — exactly
//! one live [`Baseline`] per natural key (upsert), append-only
//! [`BaselineSnapshot`] history, and one [`Evaluation`] per activity
//! (replaced on re-evaluation).

use crate::errors::StoreError;
use crate::models::{Baseline, BaselineKey, BaselineSnapshot, Evaluation};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

/// Read/write access to baseline state and its snapshot history.
pub trait BaselineStore: Send + Sync {
    /// The live baseline for a key, if one was ever published.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure; propagated unchanged.
    fn current_baseline(&self, key: &BaselineKey) -> Result<Option<Baseline>, StoreError>;

    /// Replace (or create) the live baseline for its natural key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure; propagated unchanged.
    fn upsert_baseline(&self, baseline: Baseline) -> Result<(), StoreError>;

    /// Append one immutable snapshot to the key's history.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure; propagated unchanged.
    fn append_snapshot(&self, snapshot: BaselineSnapshot) -> Result<(), StoreError>;

    /// The snapshot whose window covers `date`. With overlapping rolling
    /// windows several may qualify; the one with the latest `period_start`
    /// wins.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure; propagated unchanged.
    fn snapshot_covering(
        &self,
        key: &BaselineKey,
        date: DateTime<Utc>,
    ) -> Result<Option<BaselineSnapshot>, StoreError>;
}

/// Write/read access to per-activity evaluation records.
pub trait EvaluationStore: Send + Sync {
    /// Insert or replace the evaluation keyed by its `activity_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure; propagated unchanged.
    fn upsert_evaluation(&self, evaluation: Evaluation) -> Result<(), StoreError>;

    /// The stored evaluation for an activity, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure; propagated unchanged.
    fn evaluation(&self, activity_id: &str) -> Result<Option<Evaluation>, StoreError>;
}

impl<T: BaselineStore + ?Sized> BaselineStore for &T {
    fn current_baseline(&self, key: &BaselineKey) -> Result<Option<Baseline>, StoreError> {
        (**self).current_baseline(key)
    }

    fn upsert_baseline(&self, baseline: Baseline) -> Result<(), StoreError> {
        (**self).upsert_baseline(baseline)
    }

    fn append_snapshot(&self, snapshot: BaselineSnapshot) -> Result<(), StoreError> {
        (**self).append_snapshot(snapshot)
    }

    fn snapshot_covering(
        &self,
        key: &BaselineKey,
        date: DateTime<Utc>,
    ) -> Result<Option<BaselineSnapshot>, StoreError> {
        (**self).snapshot_covering(key, date)
    }
}

impl<T: EvaluationStore + ?Sized> EvaluationStore for &T {
    fn upsert_evaluation(&self, evaluation: Evaluation) -> Result<(), StoreError> {
        (**self).upsert_evaluation(evaluation)
    }

    fn evaluation(&self, activity_id: &str) -> Result<Option<Evaluation>, StoreError> {
        (**self).evaluation(activity_id)
    }
}

/// In-memory baseline store: a keyed map for live state and a keyed
/// append-only vector for history.
#[derive(Debug, Default)]
pub struct InMemoryBaselineStore {
    baselines: RwLock<HashMap<BaselineKey, Baseline>>,
    snapshots: RwLock<HashMap<BaselineKey, Vec<BaselineSnapshot>>>,
}

impl InMemoryBaselineStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live baselines across all keys.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::LockPoisoned`] if a writer panicked.
    pub fn baseline_count(&self) -> Result<usize, StoreError> {
        Ok(self
            .baselines
            .read()
            .map_err(|_| StoreError::LockPoisoned {
                operation: "baseline_count",
            })?
            .len())
    }

    /// Number of snapshots recorded for one key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::LockPoisoned`] if a writer panicked.
    pub fn snapshot_count(&self, key: &BaselineKey) -> Result<usize, StoreError> {
        Ok(self
            .snapshots
            .read()
            .map_err(|_| StoreError::LockPoisoned {
                operation: "snapshot_count",
            })?
            .get(key)
            .map_or(0, Vec::len))
    }
}

impl BaselineStore for InMemoryBaselineStore {
    fn current_baseline(&self, key: &BaselineKey) -> Result<Option<Baseline>, StoreError> {
        Ok(self
            .baselines
            .read()
            .map_err(|_| StoreError::LockPoisoned {
                operation: "current_baseline",
            })?
            .get(key)
            .cloned())
    }

    fn upsert_baseline(&self, baseline: Baseline) -> Result<(), StoreError> {
        self.baselines
            .write()
            .map_err(|_| StoreError::LockPoisoned {
                operation: "upsert_baseline",
            })?
            .insert(baseline.key.clone(), baseline);
        Ok(())
    }

    fn append_snapshot(&self, snapshot: BaselineSnapshot) -> Result<(), StoreError> {
        self.snapshots
            .write()
            .map_err(|_| StoreError::LockPoisoned {
                operation: "append_snapshot",
            })?
            .entry(snapshot.key.clone())
            .or_default()
            .push(snapshot);
        Ok(())
    }

    fn snapshot_covering(
        &self,
        key: &BaselineKey,
        date: DateTime<Utc>,
    ) -> Result<Option<BaselineSnapshot>, StoreError> {
        Ok(self
            .snapshots
            .read()
            .map_err(|_| StoreError::LockPoisoned {
                operation: "snapshot_covering",
            })?
            .get(key)
            .and_then(|history| {
                history
                    .iter()
                    .filter(|snapshot| snapshot.covers(date))
                    .max_by_key(|snapshot| snapshot.period.start)
                    .cloned()
            }))
    }
}

/// In-memory evaluation store keyed by activity id.
#[derive(Debug, Default)]
pub struct InMemoryEvaluationStore {
    evaluations: RwLock<HashMap<String, Evaluation>>,
}

impl InMemoryEvaluationStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored evaluation records.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::LockPoisoned`] if a writer panicked.
    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self
            .evaluations
            .read()
            .map_err(|_| StoreError::LockPoisoned { operation: "len" })?
            .len())
    }

    /// Whether the store holds no records.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::LockPoisoned`] if a writer panicked.
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

impl EvaluationStore for InMemoryEvaluationStore {
    fn upsert_evaluation(&self, evaluation: Evaluation) -> Result<(), StoreError> {
        self.evaluations
            .write()
            .map_err(|_| StoreError::LockPoisoned {
                operation: "upsert_evaluation",
            })?
            .insert(evaluation.activity_id.clone(), evaluation);
        Ok(())
    }

    fn evaluation(&self, activity_id: &str) -> Result<Option<Evaluation>, StoreError> {
        Ok(self
            .evaluations
            .read()
            .map_err(|_| StoreError::LockPoisoned {
                operation: "evaluation",
            })?
            .get(activity_id)
            .cloned())
    }
}
