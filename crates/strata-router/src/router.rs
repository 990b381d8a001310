// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Confidence-tiered routing with per-session hysteresis.
//!
//! Orchestrates tier selection: escalation signal > session hysteresis > raw thresholds.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use strata_config::model::RoutingConfig;
use strata_core::{
    ConfidenceFeatures, ConfidenceScorer, SessionId, TelemetryEvent, TelemetrySink, Tier,
};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::scorer::unit;
use crate::session::SessionTable;

/// Recorded as the escalation reason when the escalation signal forces Tier 3.
pub const FORCED_ESCALATION: &str = "forced";

/// Where a request should be served and why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutingDecision {
    /// Tier actually chosen.
    pub tier: Tier,
    /// Confidence after sanitizing, in `[0, 1]`.
    pub confidence: f64,
    /// Set when something other than the score decided the tier.
    pub escalation_reason: Option<String>,
    /// Tier the thresholds alone would pick.
    pub raw_tier: Tier,
    /// Logical model configured for `tier`.
    pub logical_model: String,
    /// Hysteresis held the session's previous tier instead of `raw_tier`.
    pub sticky: bool,
}

/// Maps a confidence score onto one of three tiers.
///
/// The router never fails: any input produces a decision. Non-finite
/// confidence counts as `0` and out-of-range values are clamped.
pub struct ConfidenceRouter {
    config: RoutingConfig,
    scorer: Arc<dyn ConfidenceScorer>,
    telemetry: Arc<dyn TelemetrySink>,
    sessions: Mutex<SessionTable>,
}

impl ConfidenceRouter {
    pub fn new(
        config: RoutingConfig,
        scorer: Arc<dyn ConfidenceScorer>,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        let sessions = SessionTable::new(
            config.max_sessions,
            Duration::from_secs(config.session_ttl_secs),
        );
        Self {
            config,
            scorer,
            telemetry,
            sessions: Mutex::new(sessions),
        }
    }

    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    pub fn scorer(&self) -> &Arc<dyn ConfidenceScorer> {
        &self.scorer
    }

    /// Route one request.
    ///
    /// Priority order:
    /// 1. `escalate` forces Tier 3
    /// 2. With a session, the previous tier is kept unless the confidence is
    ///    more than `hysteresis_margin` past the boundary being crossed
    /// 3. Otherwise the raw thresholds decide
    pub fn route(
        &self,
        confidence: f64,
        escalate: bool,
        session: Option<&SessionId>,
    ) -> RoutingDecision {
        let confidence = unit(confidence);
        let raw_tier = self.raw_tier(confidence);
        let now = Instant::now();

        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        let previous = session.and_then(|id| sessions.previous(id, now));

        let (tier, escalation_reason) = if escalate {
            (Tier::Deep, Some(FORCED_ESCALATION.to_string()))
        } else if let Some(previous) = previous {
            (self.hysteretic_tier(confidence, previous), None)
        } else {
            (raw_tier, None)
        };

        if let Some(id) = session {
            sessions.remember(id, tier, now);
        }
        drop(sessions);

        let sticky = !escalate && tier != raw_tier;
        if let Some(previous) = previous.filter(|p| *p != tier) {
            info!(
                session = session.map(|s| s.0.as_str()),
                from = %previous,
                to = %tier,
                confidence,
                escalated = escalate,
                "session changed tier"
            );
        }
        debug!(
            tier = %tier,
            raw_tier = %raw_tier,
            confidence,
            sticky,
            escalated = escalate,
            "routed"
        );
        self.telemetry.emit(TelemetryEvent::Routed {
            tier,
            escalated: escalate,
            sticky,
        });

        RoutingDecision {
            tier,
            confidence,
            escalation_reason,
            raw_tier,
            logical_model: self.model_for_tier(tier).to_string(),
            sticky,
        }
    }

    /// Score `features` with the configured scorer, then [`route`](Self::route).
    pub fn route_features(
        &self,
        features: &ConfidenceFeatures,
        escalate: bool,
        session: Option<&SessionId>,
    ) -> RoutingDecision {
        let confidence = self.scorer.score(features);
        debug!(scorer = self.scorer.name(), confidence, "features scored");
        self.route(confidence, escalate, session)
    }

    /// Feed back whether the tier chosen for `features` handled the request.
    pub fn record_outcome(&self, features: &ConfidenceFeatures, success: bool) {
        self.scorer.record_outcome(features, success);
    }

    /// Drop a session's remembered tier. Returns whether it was known.
    pub fn forget_session(&self, session: &SessionId) -> bool {
        self.sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .forget(session)
    }

    pub fn session_count(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn model_for_tier(&self, tier: Tier) -> &str {
        match tier {
            Tier::Fast => &self.config.fast_model,
            Tier::Balanced => &self.config.balanced_model,
            Tier::Deep => &self.config.deep_model,
        }
    }

    /// Tier from the thresholds alone.
    pub fn raw_tier(&self, confidence: f64) -> Tier {
        if confidence >= self.config.tier1_threshold {
            Tier::Fast
        } else if confidence >= self.config.tier2_threshold {
            Tier::Balanced
        } else {
            Tier::Deep
        }
    }

    /// Tier with each boundary pushed `margin` away from `previous`.
    ///
    /// A boundary the previous tier sits above must be undershot by more
    /// than the margin to move down; one it sits below must be overshot by
    /// more than the margin to move up.
    fn hysteretic_tier(&self, confidence: f64, previous: Tier) -> Tier {
        let margin = self.config.hysteresis_margin;
        let stays_above = |threshold: f64, above: Tier| {
            if previous <= above {
                confidence >= threshold - margin
            } else {
                confidence > threshold + margin
            }
        };

        if stays_above(self.config.tier1_threshold, Tier::Fast) {
            Tier::Fast
        } else if stays_above(self.config.tier2_threshold, Tier::Balanced) {
            Tier::Balanced
        } else {
            Tier::Deep
        }
    }
}

impl std::fmt::Debug for ConfidenceRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfidenceRouter")
            .field("scorer", &self.scorer.name())
            .field("sessions", &self.session_count())
            .finish_non_exhaustive()
    }
}
