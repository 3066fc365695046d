// ABOUTME: Pace-corrected baseline modeling and evaluation engine for running form metrics
// ABOUTME: Fits robust per-metric regressions and scores activities against pace-adjusted expectations
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Formline Contributors

#![deny(unsafe_code)]

//! # Formline
//!
//! Raw thresholds are useless for running-form metrics: every tracked
//! value (ground contact time, vertical oscillation, vertical ratio,
//! power-to-speed ratio) is strongly pace-dependent, so a number that is
//! excellent at a jog is mediocre at tempo pace. Formline answers the
//! question that actually matters — *is this measurement good, given the
//! pace at which it was produced?* — by fitting pace-corrected expectation
//! models per metric, keeping a rolling history of them, and converting
//! "actual vs. expected" into a stable, explainable quality score.
//!
//! ## Components
//!
//! - **[`regression`]**: the model family — power-law and linear fits with
//!   IQR outlier filtering, Huber loss, and monotonicity sign enforcement
//! - **[`trainer`]**: windowed training that publishes a live [`Baseline`]
//!   per `(user, condition group, metric)` key and appends an immutable
//!   [`BaselineSnapshot`] to history, or aborts leaving the previous
//!   baseline untouched
//! - **[`evaluator`]**: per-activity scoring against the baseline in
//!   force, with tiered deviation scores, half-star ratings, and graceful
//!   degradation for untrained metrics
//! - **[`trend`]**: snapshot-vs-snapshot comparison at a representative
//!   speed, classified by each metric's polarity
//! - **[`providers`]** / **[`storage`]**: the external seams — sample
//!   feeds in, baseline state and evaluation records out
//!
//! Training and evaluation are synchronous, bounded-time computations;
//! callers wanting parallelism run independent keys on separate threads
//! (the trainer's batch entry point does exactly that with rayon).

/// Typed failure taxonomy for fitting, training, evaluation, and storage
pub mod errors;

/// Domain types: metric specs, baselines, snapshots, evaluations, trends
pub mod models;

/// Engine configuration and the per-metric model registry
pub mod config;

/// Regression model family: robust power-law and linear fits
pub mod regression;

/// Sample provider seam and in-memory reference provider
pub mod providers;

/// Baseline and evaluation store seams and in-memory implementations
pub mod storage;

/// Baseline training orchestration
pub mod trainer;

/// Activity evaluation and deviation scoring
pub mod evaluator;

/// Baseline trend analysis across snapshots
pub mod trend;

pub use config::{EngineConfig, FittingConfig, MetricRegistry, ScoringConfig, TrendConfig};
pub use errors::{EvaluationError, FitError, ProviderError, StoreError, TrainingError};
pub use evaluator::ActivityEvaluator;
pub use models::{
    ActivitySnapshot, Baseline, BaselineKey, BaselineSnapshot, Coefficients, Evaluation,
    MetricEvaluation, MetricModelSpec, MetricObservation, MetricPolarity, ModelFamily,
    MonotonicSign, Sample, SpeedRange, TimeWindow, TrainingReport, TrendDirection, TrendResult,
};
pub use providers::{SampleProvider, StaticSampleProvider, TimedSample};
pub use regression::{fit_baseline, FitOutcome};
pub use storage::{
    BaselineStore, EvaluationStore, InMemoryBaselineStore, InMemoryEvaluationStore,
};
pub use trainer::{BaselineTrainer, TrainingRequest};
pub use trend::TrendAnalyzer;
