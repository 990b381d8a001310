// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Confidence-tiered routing for the Strata model pool.
//!
//! This crate provides:
//! - [`ConfidenceRouter`]: maps a confidence score to one of three tiers,
//!   with a forced-escalation override and per-session hysteresis
//! - [`build_scorer`] and the [`WeightedScorer`], [`AdaptiveScorer`] and
//!   [`HeuristicScorer`] strategies that turn request features into a score
//! - [`PatternAnalyzer`]: rule-based pattern complexity from request text
//!
//! The router decides which logical model should serve a request; the
//! pool decides how that model is loaded.

pub mod pattern;
pub mod router;
pub mod scorer;
mod session;

pub use pattern::{PatternAnalyzer, PatternScore};
pub use router::{ConfidenceRouter, FORCED_ESCALATION, RoutingDecision};
pub use scorer::{
    AdaptiveScorer, HeuristicScorer, ScorerCapabilities, SignalWeights, WeightedScorer,
    build_scorer,
};
