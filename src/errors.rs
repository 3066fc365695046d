// ABOUTME: Typed failure taxonomy for baseline fitting, training, evaluation, and storage
// ABOUTME: Training failures are local to one key; store/provider errors propagate unchanged
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Formline Contributors

//! Error types for the baseline engine.
//!
//! The taxonomy mirrors the propagation policy: fit rejections
//! ([`FitError`]) abort a single training run and leave the previous
//! baseline untouched; provider and store failures are external I/O and
//! pass through unchanged (never retried, never suppressed). Nothing in
//! this crate panics on a data-quality problem.

use crate::models::MonotonicSign;

/// Failures raised while fitting a regression model to a sample window.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FitError {
    /// Fewer valid samples than the configured minimum remained after
    /// outlier filtering. Routine for sparsely-tracked metrics.
    #[error("insufficient samples after outlier filtering: {actual} remaining, {required} required")]
    InsufficientSamples {
        /// Configured minimum number of samples
        required: usize,
        /// Valid samples remaining after filtering
        actual: usize,
    },

    /// The fitted pace-sensitivity coefficient has the wrong sign for the
    /// metric's physical meaning. Usually indicates a condition-group
    /// misclassification upstream; surfaced to operators via `warn!`.
    #[error("monotonicity violation for '{metric_id}': fitted coefficient {coefficient} does not match expected sign {expected:?}")]
    MonotonicityViolation {
        /// Metric whose fit was rejected
        metric_id: String,
        /// Sign the coefficient was required to have
        expected: MonotonicSign,
        /// Coefficient the unconstrained fit produced
        coefficient: f64,
    },

    /// The sample window has no usable variance along the regressor axis,
    /// so no line can be fit through it.
    #[error("degenerate fit: {reason}")]
    DegenerateFit {
        /// Why the fit could not be produced
        reason: &'static str,
    },
}

/// Failures raised by a [`SampleProvider`](crate::providers::SampleProvider).
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The provider could not serve the request.
    #[error("sample provider failure during {operation}: {message}")]
    Unavailable {
        /// Provider operation that failed
        operation: &'static str,
        /// Backend-specific failure description
        message: String,
    },
}

/// Failures raised by a baseline or evaluation store.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The storage backend failed; propagated to the caller unchanged.
    #[error("storage backend failure during {operation}: {message}")]
    Backend {
        /// Store operation that failed
        operation: &'static str,
        /// Backend-specific failure description
        message: String,
    },

    /// An in-memory store lock was poisoned by a panicking writer.
    #[error("store lock poisoned during {operation}")]
    LockPoisoned {
        /// Store operation that observed the poisoned lock
        operation: &'static str,
    },
}

/// Failures of a single training run for one `(user, condition group,
/// metric, window)` key. A batch run reports these per key and keeps going.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TrainingError {
    /// The metric has no entry in the model registry.
    #[error("no model spec registered for metric '{metric_id}'")]
    UnknownMetric {
        /// Metric that is not configured
        metric_id: String,
    },

    /// The requested training window could not be resolved.
    #[error("invalid training window: {reason}")]
    InvalidWindow {
        /// Why the window is unusable
        reason: &'static str,
    },

    /// The fit was rejected; the previous baseline stands.
    #[error(transparent)]
    Fit(#[from] FitError),

    /// The sample provider failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The baseline store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failures of a whole-activity evaluation. A single metric lacking a
/// baseline is not an error — it degrades to a `None` entry instead.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvaluationError {
    /// The provider has no metric snapshot for this activity.
    #[error("no metric snapshot available for activity '{activity_id}'")]
    SnapshotUnavailable {
        /// Activity with no snapshot
        activity_id: String,
    },

    /// The sample provider failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The baseline or evaluation store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}
