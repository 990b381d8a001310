// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-shot `check`, `route` and `select` commands.

use std::fmt::Write as _;
use std::sync::Arc;

use serde::Serialize;
use strata_config::StrataConfig;
use strata_core::{ConfidenceFeatures, NoopTelemetry, SessionId, StrataError};
use strata_quant::{QuantizationDecision, QuantizationSelector, SelectionRequest};
use strata_router::{
    build_scorer, ConfidenceRouter, PatternAnalyzer, RoutingDecision, ScorerCapabilities,
};

/// Inputs for `strata route`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RouteRequest<'a> {
    pub confidence: Option<f64>,
    pub text: Option<&'a str>,
    pub escalate: bool,
    pub session: Option<&'a str>,
}

/// Human-readable registry summary for `strata check`.
pub fn check_summary(config: &StrataConfig) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "config ok: {} model(s), capacity {} MB",
        config.models.len(),
        config.pool.capacity_mb
    );
    for model in &config.models {
        let levels: Vec<String> = model.levels().iter().map(|l| l.to_string()).collect();
        let _ = write!(out, "  {} ({})", model.name, model.backend);
        if !levels.is_empty() {
            let _ = write!(out, " levels=[{}]", levels.join(", "));
        }
        if !model.context_buckets.is_empty() {
            let _ = write!(out, " contexts={:?}", model.sorted_buckets());
        }
        if !model.fallback.is_empty() {
            let _ = write!(out, " fallback={}", model.fallback.join(" -> "));
        }
        out.push('\n');
    }
    let routing = &config.routing;
    let _ = writeln!(
        out,
        "tiers: fast={} balanced={} deep={}",
        routing.fast_model, routing.balanced_model, routing.deep_model
    );
    out
}

/// Route one request with a fresh router.
///
/// With `text`, the pattern analyzer supplies the complexity feature and the
/// configured scorer turns it into a confidence.
pub fn route(config: &StrataConfig, request: &RouteRequest<'_>) -> RoutingDecision {
    let scorer = build_scorer(&config.routing.scorer, ScorerCapabilities::default());
    let router = ConfidenceRouter::new(config.routing.clone(), scorer, Arc::new(NoopTelemetry));
    let session = request.session.map(SessionId::from);

    match (request.confidence, request.text) {
        (Some(confidence), _) => router.route(confidence, request.escalate, session.as_ref()),
        (None, text) => {
            let pattern = PatternAnalyzer::new().analyze(text.unwrap_or_default(), &[]);
            let features = ConfidenceFeatures {
                pattern_complexity: pattern.complexity,
                embedding_similarity: None,
                historical_success: None,
            };
            router.route_features(&features, request.escalate, session.as_ref())
        }
    }
}

/// Quantization decision for a registered model.
pub fn select(
    config: &StrataConfig,
    model: &str,
    prompt_tokens: u32,
    complexity: f64,
    available_mb: u64,
) -> Result<QuantizationDecision, StrataError> {
    let descriptor = config
        .models
        .iter()
        .find(|d| d.name == model)
        .ok_or_else(|| StrataError::InvalidLogicalName {
            name: model.to_string(),
        })?;
    let selector = QuantizationSelector::new(config.quantization.clone());
    selector.select(&SelectionRequest {
        descriptor,
        prompt_tokens,
        task_complexity: complexity,
        available_memory_mb: available_mb,
    })
}

pub fn print_json<T: Serialize>(value: &T) -> Result<(), StrataError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| StrataError::Internal(format!("cannot serialize output: {e}")))?;
    println!("{text}");
    Ok(())
}
