// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade so any recorder (Prometheus, statsd, etc.)
//! can collect these metrics.

use metrics::{describe_counter, describe_gauge, describe_histogram};
use strata_core::TelemetryEvent;

/// Register all Strata metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!("strata_cache_hits_total", "Acquires served from a ready instance");
    describe_counter!("strata_cache_misses_total", "Acquires that started a load");
    describe_counter!("strata_loads_started_total", "Model loads started");
    describe_counter!("strata_load_failures_total", "Model loads that failed or timed out");
    describe_counter!("strata_evictions_total", "Instances detached for unloading");
    describe_counter!("strata_evicted_mb_total", "Memory released by evictions in MB");
    describe_counter!("strata_fallbacks_total", "Acquires served by a fallback model");
    describe_counter!("strata_degraded_total", "Quantization decisions below the justified level");
    describe_counter!("strata_routed_total", "Routing decisions by tier");
    describe_histogram!("strata_load_latency_seconds", "Model load latency in seconds");
    describe_gauge!("strata_pool_used_mb", "Memory charged against pool capacity in MB");
    describe_gauge!("strata_pool_capacity_mb", "Configured pool capacity in MB");
    describe_gauge!("strata_pool_ready_entries", "Ready instances in the pool");
}

/// Record one telemetry event.
pub fn record_event(event: &TelemetryEvent) {
    match event {
        TelemetryEvent::CacheHit { model } => {
            metrics::counter!("strata_cache_hits_total", "model" => model.clone()).increment(1);
        }
        TelemetryEvent::CacheMiss { model } => {
            metrics::counter!("strata_cache_misses_total", "model" => model.clone()).increment(1);
        }
        TelemetryEvent::LoadStarted { model, .. } => {
            metrics::counter!("strata_loads_started_total", "model" => model.clone()).increment(1);
        }
        TelemetryEvent::LoadCompleted { model, latency, .. } => {
            metrics::histogram!("strata_load_latency_seconds", "model" => model.clone())
                .record(latency.as_secs_f64());
        }
        TelemetryEvent::LoadFailed { model, .. } => {
            metrics::counter!("strata_load_failures_total", "model" => model.clone()).increment(1);
        }
        TelemetryEvent::Evicted {
            model,
            freed_mb,
            reason,
            ..
        } => {
            metrics::counter!(
                "strata_evictions_total",
                "model" => model.clone(),
                "reason" => reason.to_string()
            )
            .increment(1);
            metrics::counter!("strata_evicted_mb_total", "model" => model.clone())
                .increment(*freed_mb);
        }
        TelemetryEvent::FallbackUsed {
            requested,
            served_by,
        } => {
            metrics::counter!(
                "strata_fallbacks_total",
                "requested" => requested.clone(),
                "served_by" => served_by.clone()
            )
            .increment(1);
        }
        TelemetryEvent::Degraded { model, level } => {
            metrics::counter!(
                "strata_degraded_total",
                "model" => model.clone(),
                "level" => level.to_string()
            )
            .increment(1);
        }
        TelemetryEvent::Routed {
            tier,
            escalated,
            sticky,
        } => {
            metrics::counter!(
                "strata_routed_total",
                "tier" => tier.to_string(),
                "escalated" => escalated.to_string(),
                "sticky" => sticky.to_string()
            )
            .increment(1);
        }
    }
}

/// Set the pool memory gauges.
pub fn set_pool_memory(used_mb: u64, capacity_mb: u64) {
    metrics::gauge!("strata_pool_used_mb").set(used_mb as f64);
    metrics::gauge!("strata_pool_capacity_mb").set(capacity_mb as f64);
}

/// Set the number of ready pool instances.
pub fn set_ready_entries(count: usize) {
    metrics::gauge!("strata_pool_ready_entries").set(count as f64);
}
