// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Confidence scoring strategies.
//!
//! Three interchangeable implementations of [`ConfidenceScorer`]:
//! - [`WeightedScorer`]: fixed configured weights (rules phase)
//! - [`AdaptiveScorer`]: weights nudged online by reported outcomes (learned phase)
//! - [`HeuristicScorer`]: pattern complexity and history only, for deployments
//!   without a similarity model
//!
//! [`build_scorer`] picks one at construction time. Missing optional
//! features drop out of the weighted mean instead of counting as zero.

use std::sync::{Arc, Mutex};

use strata_config::model::{ScorerConfig, ScoringPhase};
use strata_core::{ConfidenceFeatures, ConfidenceScorer};
use tracing::debug;

/// Lower bound for adaptive weights so no signal is ever switched off for good.
const MIN_ADAPTIVE_WEIGHT: f64 = 0.01;

/// Which optional signals the deployment can produce.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScorerCapabilities {
    /// An embedding model is available to compute `embedding_similarity`.
    pub embedding_similarity: bool,
}

/// Weights over the three confidence signals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalWeights {
    pub pattern: f64,
    pub similarity: f64,
    pub history: f64,
}

impl From<&ScorerConfig> for SignalWeights {
    fn from(config: &ScorerConfig) -> Self {
        Self {
            pattern: config.pattern_weight,
            similarity: config.similarity_weight,
            history: config.history_weight,
        }
    }
}

impl SignalWeights {
    /// Weighted mean of the available signals, in `[0, 1]`.
    ///
    /// The pattern signal enters as `1 - complexity`: a simple request is a
    /// confident one. With no usable weight at all the score is `0`, which
    /// routes to the deepest tier.
    pub fn combine(&self, features: &ConfidenceFeatures) -> f64 {
        let mut total = 0.0;
        let mut weight = 0.0;
        for (w, value) in self.terms(features) {
            if let Some(value) = value {
                total += w * value;
                weight += w;
            }
        }
        if weight > 0.0 {
            unit(total / weight)
        } else {
            0.0
        }
    }

    fn terms(&self, features: &ConfidenceFeatures) -> [(f64, Option<f64>); 3] {
        [
            (self.pattern, Some(1.0 - complexity(features.pattern_complexity))),
            (self.similarity, features.embedding_similarity.map(unit)),
            (self.history, features.historical_success.map(unit)),
        ]
    }

    fn normalized(mut self) -> Self {
        let sum = self.pattern + self.similarity + self.history;
        if sum > 0.0 {
            self.pattern /= sum;
            self.similarity /= sum;
            self.history /= sum;
        }
        self
    }
}

/// Fixed-weight scorer.
#[derive(Debug, Clone)]
pub struct WeightedScorer {
    weights: SignalWeights,
}

impl WeightedScorer {
    pub fn new(weights: SignalWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> SignalWeights {
        self.weights
    }
}

impl ConfidenceScorer for WeightedScorer {
    fn name(&self) -> &str {
        "weighted"
    }

    fn score(&self, features: &ConfidenceFeatures) -> f64 {
        self.weights.combine(features)
    }
}

/// Online-learning scorer.
///
/// After each outcome the weights take a gradient step toward predicting
/// it (`1` for success, `0` for failure), then are floored at a small
/// positive value and renormalized to sum to `1`.
#[derive(Debug)]
pub struct AdaptiveScorer {
    weights: Mutex<SignalWeights>,
    learning_rate: f64,
}

impl AdaptiveScorer {
    pub fn new(initial: SignalWeights, learning_rate: f64) -> Self {
        Self {
            weights: Mutex::new(initial.normalized()),
            learning_rate,
        }
    }

    /// Current weights.
    pub fn weights(&self) -> SignalWeights {
        *self.weights.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ConfidenceScorer for AdaptiveScorer {
    fn name(&self) -> &str {
        "adaptive"
    }

    fn score(&self, features: &ConfidenceFeatures) -> f64 {
        self.weights().combine(features)
    }

    fn record_outcome(&self, features: &ConfidenceFeatures, success: bool) {
        let mut weights = self.weights.lock().unwrap_or_else(|e| e.into_inner());
        let predicted = weights.combine(features);
        let target = if success { 1.0 } else { 0.0 };
        let error = target - predicted;

        let [(_, pattern), (_, similarity), (_, history)] = weights.terms(features);
        let step = |w: f64, x: Option<f64>| match x {
            Some(x) => (w + self.learning_rate * error * x).max(MIN_ADAPTIVE_WEIGHT),
            None => w,
        };
        let updated = SignalWeights {
            pattern: step(weights.pattern, pattern),
            similarity: step(weights.similarity, similarity),
            history: step(weights.history, history),
        }
        .normalized();
        *weights = updated;

        debug!(
            success,
            predicted,
            pattern = weights.pattern,
            similarity = weights.similarity,
            history = weights.history,
            "scorer weights updated"
        );
    }
}

/// Scorer for deployments with no embedding model.
///
/// Ignores `embedding_similarity` even when a caller supplies one.
#[derive(Debug, Clone)]
pub struct HeuristicScorer {
    weights: SignalWeights,
}

impl HeuristicScorer {
    pub fn new(pattern_weight: f64, history_weight: f64) -> Self {
        Self {
            weights: SignalWeights {
                pattern: pattern_weight,
                similarity: 0.0,
                history: history_weight,
            },
        }
    }
}

impl ConfidenceScorer for HeuristicScorer {
    fn name(&self) -> &str {
        "heuristic"
    }

    fn score(&self, features: &ConfidenceFeatures) -> f64 {
        let features = ConfidenceFeatures {
            embedding_similarity: None,
            ..features.clone()
        };
        self.weights.combine(&features)
    }
}

/// Choose the scorer for this deployment once, at construction.
///
/// Without a similarity capability the heuristic scorer is used whatever
/// the phase; otherwise the phase picks fixed or adaptive weights.
pub fn build_scorer(
    config: &ScorerConfig,
    capabilities: ScorerCapabilities,
) -> Arc<dyn ConfidenceScorer> {
    let scorer: Arc<dyn ConfidenceScorer> = if !capabilities.embedding_similarity {
        Arc::new(HeuristicScorer::new(
            config.pattern_weight,
            config.history_weight,
        ))
    } else {
        match config.phase {
            ScoringPhase::Rules => Arc::new(WeightedScorer::new(SignalWeights::from(config))),
            ScoringPhase::Learned => Arc::new(AdaptiveScorer::new(
                SignalWeights::from(config),
                config.learning_rate,
            )),
        }
    };
    debug!(scorer = scorer.name(), phase = ?config.phase, "confidence scorer selected");
    scorer
}

/// Clamp a complexity to `[0, 1]`. Non-finite values count as hardest.
fn complexity(value: f64) -> f64 {
    if value.is_finite() { value.clamp(0.0, 1.0) } else { 1.0 }
}

/// Clamp to `[0, 1]`, mapping NaN to `0`.
pub(crate) fn unit(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}
