// ABOUTME: Engine configuration for robust fitting, deviation scoring, and trend analysis
// ABOUTME: Nested config structs with explicit defaults plus the per-metric model registry
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Formline Contributors

//! Engine Configuration
//!
//! Provides configuration for the robust fitting pipeline (minimum sample
//! counts, IQR outlier gate, Huber loss), the deviation scoring tiers, and
//! trend stability, plus the [`MetricRegistry`] describing how each metric
//! is modeled. No global singleton: configuration is passed by handle into
//! the trainer and evaluator so tests run with isolated instances.

use crate::models::{metric_ids, MetricModelSpec, MetricPolarity, ModelFamily, MonotonicSign};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Robust fitting settings
    pub fitting: FittingConfig,
    /// Deviation scoring tier thresholds
    pub scoring: ScoringConfig,
    /// Trend classification settings
    pub trend: TrendConfig,
}

/// Configuration for the robust regression pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittingConfig {
    /// Minimum valid samples required after outlier filtering
    pub min_samples: usize,
    /// IQR multiplier for the outlier gate on the metric axis
    pub iqr_multiplier: f64,
    /// Huber loss settings
    pub huber: HuberConfig,
}

impl Default for FittingConfig {
    fn default() -> Self {
        Self {
            min_samples: 10,
            iqr_multiplier: 1.5,
            huber: HuberConfig::default(),
        }
    }
}

/// Huber loss settings for the iteratively reweighted least-squares fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HuberConfig {
    /// Transition point between quadratic core and linear tails, in units
    /// of the robust (MAD) residual scale. 1.345 gives 95% efficiency
    /// under Gaussian noise.
    pub tuning_constant: f64,
    /// Upper bound on reweighting iterations
    pub max_iterations: usize,
    /// Stop when coefficients move less than this between iterations
    pub convergence_epsilon: f64,
}

impl Default for HuberConfig {
    fn default() -> Self {
        Self {
            tuning_constant: 1.345,
            max_iterations: 50,
            convergence_epsilon: 1e-10,
        }
    }
}

/// Deviation scoring tier thresholds, as fractions of the expected value.
///
/// Boundaries are closed on the better side: a deviation exactly at a
/// threshold maps to the better adjacent tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Deviations up to this magnitude score 5.0 (ideal)
    pub ideal_deviation_pct: f64,
    /// Deviations up to this magnitude score 4.0 (good)
    pub good_deviation_pct: f64,
    /// Deviations up to this magnitude score 3.0 (fair)
    pub fair_deviation_pct: f64,
    /// Unfavorable deviations up to this magnitude score 2.0; beyond it 1.0
    pub poor_deviation_pct: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            ideal_deviation_pct: 0.02,
            good_deviation_pct: 0.05,
            fair_deviation_pct: 0.10,
            poor_deviation_pct: 0.20,
        }
    }
}

/// Trend classification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendConfig {
    /// Relative change of the predicted metric below which the trend is
    /// classified as stable
    pub stability_threshold_pct: f64,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            stability_threshold_pct: 0.01,
        }
    }
}

/// Registry of model specs, one per metric.
///
/// Specs are configuration, not learned state. The default registry covers
/// the four pace-sensitive running-form metrics on flat road.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricRegistry {
    specs: HashMap<String, MetricModelSpec>,
}

impl MetricRegistry {
    /// Empty registry.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            specs: HashMap::new(),
        }
    }

    /// Registry built from an explicit spec list; later duplicates replace
    /// earlier ones.
    #[must_use]
    pub fn from_specs(specs: Vec<MetricModelSpec>) -> Self {
        Self {
            specs: specs
                .into_iter()
                .map(|spec| (spec.metric_id.clone(), spec))
                .collect(),
        }
    }

    /// Register or replace a spec.
    pub fn register(&mut self, spec: MetricModelSpec) {
        self.specs.insert(spec.metric_id.clone(), spec);
    }

    /// Look up the spec for a metric.
    #[must_use]
    pub fn get(&self, metric_id: &str) -> Option<&MetricModelSpec> {
        self.specs.get(metric_id)
    }

    /// Identifiers of all registered metrics.
    pub fn metric_ids(&self) -> impl Iterator<Item = &str> {
        self.specs.keys().map(String::as_str)
    }

    /// Number of registered metrics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

impl Default for MetricRegistry {
    fn default() -> Self {
        let flat_road = "flat_road";
        Self::from_specs(vec![
            MetricModelSpec {
                metric_id: metric_ids::GROUND_CONTACT_TIME.to_owned(),
                display_name: "ground contact time".to_owned(),
                unit: "ms".to_owned(),
                model_family: ModelFamily::PowerLaw,
                monotonic_sign: MonotonicSign::Negative,
                polarity: MetricPolarity::LowerIsBetter,
                condition_group: flat_road.to_owned(),
            },
            MetricModelSpec {
                metric_id: metric_ids::VERTICAL_OSCILLATION.to_owned(),
                display_name: "vertical oscillation".to_owned(),
                unit: "cm".to_owned(),
                model_family: ModelFamily::Linear,
                monotonic_sign: MonotonicSign::Positive,
                polarity: MetricPolarity::LowerIsBetter,
                condition_group: flat_road.to_owned(),
            },
            MetricModelSpec {
                metric_id: metric_ids::VERTICAL_RATIO.to_owned(),
                display_name: "vertical ratio".to_owned(),
                unit: "%".to_owned(),
                model_family: ModelFamily::Linear,
                monotonic_sign: MonotonicSign::Negative,
                polarity: MetricPolarity::LowerIsBetter,
                condition_group: flat_road.to_owned(),
            },
            MetricModelSpec {
                metric_id: metric_ids::POWER_SPEED_RATIO.to_owned(),
                display_name: "power-to-speed ratio".to_owned(),
                unit: "W·s/m/kg".to_owned(),
                model_family: ModelFamily::Linear,
                monotonic_sign: MonotonicSign::Positive,
                polarity: MetricPolarity::LowerIsBetter,
                condition_group: flat_road.to_owned(),
            },
        ])
    }
}
