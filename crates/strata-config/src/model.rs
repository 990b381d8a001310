// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Strata model pool.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};
use strata_core::ModelDescriptor;

/// Top-level Strata configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StrataConfig {
    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,

    /// Resource pool capacity, working-set and timeout settings.
    #[serde(default)]
    pub pool: PoolConfig,

    /// Quantization selector settings.
    #[serde(default)]
    pub quantization: QuantizationConfig,

    /// Confidence router settings.
    #[serde(default)]
    pub routing: RoutingConfig,

    /// Telemetry export settings.
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Model registry: one descriptor per logical model.
    #[serde(default)]
    pub models: Vec<ModelDescriptor>,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Resource pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PoolConfig {
    /// Total memory the pool may hold in READY and LOADING entries, in MB.
    #[serde(default = "default_capacity_mb")]
    pub capacity_mb: u64,

    /// Sliding access window used for working-set classification.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Accesses within the window needed for HOT.
    #[serde(default = "default_hot_min_accesses")]
    pub hot_min_accesses: usize,

    /// A single access younger than this keeps an entry WARM.
    #[serde(default = "default_warm_recency_secs")]
    pub warm_recency_secs: u64,

    /// Idle time before a HOT entry becomes eviction-eligible.
    #[serde(default = "default_hot_ttl_secs")]
    pub hot_ttl_secs: u64,

    /// Idle time before a WARM entry becomes eviction-eligible.
    #[serde(default = "default_warm_ttl_secs")]
    pub warm_ttl_secs: u64,

    /// Idle time before a COLD entry becomes eviction-eligible.
    #[serde(default = "default_cold_ttl_secs")]
    pub cold_ttl_secs: u64,

    /// Deadline for a single load before it is aborted.
    #[serde(default = "default_load_timeout_secs")]
    pub load_timeout_secs: u64,

    /// Maximum number of models tried per acquire, primary included.
    #[serde(default = "default_max_fallback_attempts")]
    pub max_fallback_attempts: usize,

    /// Interval of the background sweep. `None` disables it; reclamation
    /// still happens on every acquire and release.
    #[serde(default)]
    pub sweep_interval_secs: Option<u64>,

    /// Models warmed when the pool starts.
    #[serde(default)]
    pub prefetch: Vec<String>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity_mb: default_capacity_mb(),
            window_secs: default_window_secs(),
            hot_min_accesses: default_hot_min_accesses(),
            warm_recency_secs: default_warm_recency_secs(),
            hot_ttl_secs: default_hot_ttl_secs(),
            warm_ttl_secs: default_warm_ttl_secs(),
            cold_ttl_secs: default_cold_ttl_secs(),
            load_timeout_secs: default_load_timeout_secs(),
            max_fallback_attempts: default_max_fallback_attempts(),
            sweep_interval_secs: None,
            prefetch: Vec::new(),
        }
    }
}

fn default_capacity_mb() -> u64 {
    8192
}

fn default_window_secs() -> u64 {
    300
}

fn default_hot_min_accesses() -> usize {
    3
}

fn default_warm_recency_secs() -> u64 {
    60
}

fn default_hot_ttl_secs() -> u64 {
    300
}

fn default_warm_ttl_secs() -> u64 {
    45
}

fn default_cold_ttl_secs() -> u64 {
    15
}

fn default_load_timeout_secs() -> u64 {
    120
}

fn default_max_fallback_attempts() -> usize {
    3
}

/// Quantization selector configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QuantizationConfig {
    /// Smoothing factor for the per-level success EMA.
    #[serde(default = "default_ema_alpha")]
    pub ema_alpha: f64,

    /// Task complexity at or above which the highest level is forced.
    #[serde(default = "default_force_quality_threshold")]
    pub force_quality_threshold: f64,

    /// Headroom kept free when checking whether a level fits.
    #[serde(default = "default_safety_margin_mb")]
    pub safety_margin_mb: u64,

    /// Prompts shorter than this are "short".
    #[serde(default = "default_short_prompt_tokens")]
    pub short_prompt_tokens: u32,

    /// Prompts shorter than this (and not short) are "medium"; the rest are "long".
    #[serde(default = "default_medium_prompt_tokens")]
    pub medium_prompt_tokens: u32,

    /// Weight of the prompt-length bucket in the quality target.
    #[serde(default = "default_bucket_weight")]
    pub bucket_weight: f64,

    /// Weight of task complexity in the quality target.
    #[serde(default = "default_complexity_weight")]
    pub complexity_weight: f64,

    /// Levels whose success EMA falls below this are stepped over.
    #[serde(default = "default_success_floor")]
    pub success_floor: f64,

    /// Outcomes needed before a level's EMA is trusted.
    #[serde(default = "default_min_history_samples")]
    pub min_history_samples: u32,

    /// Tokens reserved for generation on top of the prompt when sizing context.
    #[serde(default = "default_generation_reserve_tokens")]
    pub generation_reserve_tokens: u32,

    /// Context used for local models that declare no buckets.
    #[serde(default = "default_context_tokens")]
    pub default_context_tokens: u32,
}

impl Default for QuantizationConfig {
    fn default() -> Self {
        Self {
            ema_alpha: default_ema_alpha(),
            force_quality_threshold: default_force_quality_threshold(),
            safety_margin_mb: default_safety_margin_mb(),
            short_prompt_tokens: default_short_prompt_tokens(),
            medium_prompt_tokens: default_medium_prompt_tokens(),
            bucket_weight: default_bucket_weight(),
            complexity_weight: default_complexity_weight(),
            success_floor: default_success_floor(),
            min_history_samples: default_min_history_samples(),
            generation_reserve_tokens: default_generation_reserve_tokens(),
            default_context_tokens: default_context_tokens(),
        }
    }
}

fn default_ema_alpha() -> f64 {
    0.2
}

fn default_force_quality_threshold() -> f64 {
    0.9
}

fn default_safety_margin_mb() -> u64 {
    512
}

fn default_short_prompt_tokens() -> u32 {
    200
}

fn default_medium_prompt_tokens() -> u32 {
    800
}

fn default_bucket_weight() -> f64 {
    0.4
}

fn default_complexity_weight() -> f64 {
    0.6
}

fn default_success_floor() -> f64 {
    0.6
}

fn default_min_history_samples() -> u32 {
    5
}

fn default_generation_reserve_tokens() -> u32 {
    512
}

fn default_context_tokens() -> u32 {
    4096
}

/// Confidence router configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RoutingConfig {
    /// Confidence at or above which Tier 1 is chosen.
    #[serde(default = "default_tier1_threshold")]
    pub tier1_threshold: f64,

    /// Confidence at or above which Tier 2 is chosen (below: Tier 3).
    #[serde(default = "default_tier2_threshold")]
    pub tier2_threshold: f64,

    /// Distance past a boundary required before a session switches tiers.
    #[serde(default = "default_hysteresis_margin")]
    pub hysteresis_margin: f64,

    /// Idle time after which a session's remembered tier is forgotten.
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,

    /// Upper bound on remembered sessions.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Logical model served for Tier 1.
    #[serde(default = "default_fast_model")]
    pub fast_model: String,

    /// Logical model served for Tier 2.
    #[serde(default = "default_balanced_model")]
    pub balanced_model: String,

    /// Logical model served for Tier 3.
    #[serde(default = "default_deep_model")]
    pub deep_model: String,

    /// Confidence scorer settings.
    #[serde(default)]
    pub scorer: ScorerConfig,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            tier1_threshold: default_tier1_threshold(),
            tier2_threshold: default_tier2_threshold(),
            hysteresis_margin: default_hysteresis_margin(),
            session_ttl_secs: default_session_ttl_secs(),
            max_sessions: default_max_sessions(),
            fast_model: default_fast_model(),
            balanced_model: default_balanced_model(),
            deep_model: default_deep_model(),
            scorer: ScorerConfig::default(),
        }
    }
}

fn default_tier1_threshold() -> f64 {
    0.6
}

fn default_tier2_threshold() -> f64 {
    0.3
}

fn default_hysteresis_margin() -> f64 {
    0.05
}

fn default_session_ttl_secs() -> u64 {
    1800
}

fn default_max_sessions() -> usize {
    10_000
}

fn default_fast_model() -> String {
    "tiny".to_string()
}

fn default_balanced_model() -> String {
    "expert_short".to_string()
}

fn default_deep_model() -> String {
    "expert_long".to_string()
}

/// Which scoring strategy phase is active.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringPhase {
    /// Fixed, configured weights.
    #[default]
    Rules,
    /// Weights adjusted online from reported outcomes.
    Learned,
}

/// Confidence scorer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ScorerConfig {
    /// Active strategy phase.
    #[serde(default)]
    pub phase: ScoringPhase,

    /// Weight of (1 - pattern complexity).
    #[serde(default = "default_pattern_weight")]
    pub pattern_weight: f64,

    /// Weight of embedding similarity.
    #[serde(default = "default_similarity_weight")]
    pub similarity_weight: f64,

    /// Weight of historical success.
    #[serde(default = "default_history_weight")]
    pub history_weight: f64,

    /// Step size for the learned phase.
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            phase: ScoringPhase::default(),
            pattern_weight: default_pattern_weight(),
            similarity_weight: default_similarity_weight(),
            history_weight: default_history_weight(),
            learning_rate: default_learning_rate(),
        }
    }
}

fn default_pattern_weight() -> f64 {
    0.4
}

fn default_similarity_weight() -> f64 {
    0.35
}

fn default_history_weight() -> f64 {
    0.25
}

fn default_learning_rate() -> f64 {
    0.05
}

/// Telemetry export configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TelemetryConfig {
    /// Install the Prometheus recorder and export pool/router metrics.
    #[serde(default)]
    pub prometheus: bool,
}
