// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Confidence scorer trait.
//!
//! Scorers combine externally computed signals into the single confidence
//! value the router thresholds on. The signals themselves are opaque inputs.

use serde::{Deserialize, Serialize};

/// Signals available for one request. Every value is expected in `[0, 1]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceFeatures {
    /// How intricate the request looks; higher means harder.
    pub pattern_complexity: f64,
    /// Similarity to requests the fast tier handled well, when a similarity model exists.
    pub embedding_similarity: Option<f64>,
    /// Recent success rate for comparable requests, when known.
    pub historical_success: Option<f64>,
}

/// Turns request features into a confidence score in `[0, 1]`.
pub trait ConfidenceScorer: Send + Sync {
    /// Short identifier used in logs and decisions.
    fn name(&self) -> &str;

    /// Combine the features into a confidence score.
    fn score(&self, features: &ConfidenceFeatures) -> f64;

    /// Feed back whether the tier chosen for these features succeeded.
    ///
    /// Fixed-weight scorers ignore this.
    fn record_outcome(&self, _features: &ConfidenceFeatures, _success: bool) {}
}
