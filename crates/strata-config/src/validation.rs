// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes:
//! threshold ordering, probability ranges, and registry cross-references.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::StrataConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &StrataConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    validate_pool(config, &mut errors);
    validate_quantization(config, &mut errors);
    validate_routing(config, &mut errors);
    validate_registry(config, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn in_unit_range(value: f64) -> bool {
    (0.0..=1.0).contains(&value)
}

fn validate_pool(config: &StrataConfig, errors: &mut Vec<ConfigError>) {
    let pool = &config.pool;

    if pool.capacity_mb == 0 {
        errors.push(ConfigError::validation("pool.capacity_mb must be positive"));
    }

    if pool.window_secs == 0 {
        errors.push(ConfigError::validation("pool.window_secs must be positive"));
    }

    if pool.hot_min_accesses < 2 {
        errors.push(ConfigError::validation(format!(
            "pool.hot_min_accesses must be at least 2, got {}",
            pool.hot_min_accesses
        )));
    }

    if pool.max_fallback_attempts == 0 {
        errors.push(ConfigError::validation(
            "pool.max_fallback_attempts must be at least 1",
        ));
    }

    if pool.load_timeout_secs == 0 {
        errors.push(ConfigError::validation(
            "pool.load_timeout_secs must be positive",
        ));
    }

    if let Some(0) = pool.sweep_interval_secs {
        errors.push(ConfigError::validation(
            "pool.sweep_interval_secs must be positive when set",
        ));
    }

    // A HOT entry must never be reclaimed sooner than a COLD one.
    if !(pool.cold_ttl_secs <= pool.warm_ttl_secs && pool.warm_ttl_secs <= pool.hot_ttl_secs) {
        errors.push(ConfigError::validation(format!(
            "pool TTLs must satisfy cold <= warm <= hot, got {}/{}/{}",
            pool.cold_ttl_secs, pool.warm_ttl_secs, pool.hot_ttl_secs
        )));
    }
}

fn validate_quantization(config: &StrataConfig, errors: &mut Vec<ConfigError>) {
    let quant = &config.quantization;

    if !(quant.ema_alpha > 0.0 && quant.ema_alpha <= 1.0) {
        errors.push(ConfigError::validation(format!(
            "quantization.ema_alpha must be in (0, 1], got {}",
            quant.ema_alpha
        )));
    }

    for (key, value) in [
        ("force_quality_threshold", quant.force_quality_threshold),
        ("success_floor", quant.success_floor),
        ("bucket_weight", quant.bucket_weight),
        ("complexity_weight", quant.complexity_weight),
    ] {
        if !in_unit_range(value) {
            errors.push(ConfigError::validation(format!(
                "quantization.{key} must be in [0, 1], got {value}"
            )));
        }
    }

    if quant.short_prompt_tokens >= quant.medium_prompt_tokens {
        errors.push(ConfigError::validation(format!(
            "quantization.short_prompt_tokens ({}) must be below medium_prompt_tokens ({})",
            quant.short_prompt_tokens, quant.medium_prompt_tokens
        )));
    }

    if quant.default_context_tokens == 0 {
        errors.push(ConfigError::validation(
            "quantization.default_context_tokens must be positive",
        ));
    }
}

fn validate_routing(config: &StrataConfig, errors: &mut Vec<ConfigError>) {
    let routing = &config.routing;

    for (key, value) in [
        ("tier1_threshold", routing.tier1_threshold),
        ("tier2_threshold", routing.tier2_threshold),
    ] {
        if !in_unit_range(value) {
            errors.push(ConfigError::validation(format!(
                "routing.{key} must be in [0, 1], got {value}"
            )));
        }
    }

    if routing.tier2_threshold >= routing.tier1_threshold {
        errors.push(ConfigError::validation(format!(
            "routing.tier2_threshold ({}) must be below tier1_threshold ({})",
            routing.tier2_threshold, routing.tier1_threshold
        )));
    }

    if !(routing.hysteresis_margin >= 0.0 && routing.hysteresis_margin < 0.5) {
        errors.push(ConfigError::validation(format!(
            "routing.hysteresis_margin must be in [0, 0.5), got {}",
            routing.hysteresis_margin
        )));
    }

    if routing.max_sessions == 0 {
        errors.push(ConfigError::validation(
            "routing.max_sessions must be at least 1",
        ));
    }

    let scorer = &routing.scorer;
    for (key, value) in [
        ("pattern_weight", scorer.pattern_weight),
        ("similarity_weight", scorer.similarity_weight),
        ("history_weight", scorer.history_weight),
    ] {
        if !(value.is_finite() && value >= 0.0) {
            errors.push(ConfigError::validation(format!(
                "routing.scorer.{key} must be non-negative, got {value}"
            )));
        }
    }
    if scorer.pattern_weight + scorer.similarity_weight + scorer.history_weight <= 0.0 {
        errors.push(ConfigError::validation(
            "routing.scorer weights must not all be zero",
        ));
    }
    if !(scorer.learning_rate > 0.0 && scorer.learning_rate < 1.0) {
        errors.push(ConfigError::validation(format!(
            "routing.scorer.learning_rate must be in (0, 1), got {}",
            scorer.learning_rate
        )));
    }
}

fn validate_registry(config: &StrataConfig, errors: &mut Vec<ConfigError>) {
    let mut seen = HashSet::new();
    for (i, model) in config.models.iter().enumerate() {
        if model.name.trim().is_empty() {
            errors.push(ConfigError::validation(format!(
                "models[{i}].name must not be empty"
            )));
        }
        if !seen.insert(model.name.as_str()) {
            errors.push(ConfigError::validation(format!(
                "duplicate model name `{}` in [[models]] array",
                model.name
            )));
        }
        if model.is_local() && model.footprints_mb.is_empty() {
            errors.push(ConfigError::validation(format!(
                "local model `{}` must declare at least one footprints_mb entry",
                model.name
            )));
        }
        if model.context_buckets.contains(&0) {
            errors.push(ConfigError::validation(format!(
                "model `{}` has a zero-sized context bucket",
                model.name
            )));
        }
    }

    for model in &config.models {
        for target in &model.fallback {
            if target == &model.name {
                errors.push(ConfigError::validation(format!(
                    "model `{}` lists itself as a fallback",
                    model.name
                )));
            } else if !seen.contains(target.as_str()) {
                errors.push(ConfigError::validation(format!(
                    "model `{}` falls back to unknown model `{target}`",
                    model.name
                )));
            }
        }
    }

    // An empty registry is allowed for `route`/`check` dry runs.
    if config.models.is_empty() {
        return;
    }
    let routing = &config.routing;
    for (key, name) in [
        ("fast_model", &routing.fast_model),
        ("balanced_model", &routing.balanced_model),
        ("deep_model", &routing.deep_model),
    ] {
        if !seen.contains(name.as_str()) {
            errors.push(ConfigError::validation(format!(
                "routing.{key} `{name}` is not in the model registry"
            )));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use strata_core::{BackendKind, ModelDescriptor, QuantLevel};

    use super::*;

    fn local(name: &str, fallback: &[&str]) -> ModelDescriptor {
        ModelDescriptor {
            name: name.to_string(),
            backend: BackendKind::LocalQuantized,
            footprints_mb: BTreeMap::from([(QuantLevel::Q4KM, 1000)]),
            kv_mb_per_1k_tokens: 64,
            context_buckets: vec![2048],
            fallback: fallback.iter().map(|s| s.to_string()).collect(),
            weights_path: None,
            endpoint: None,
        }
    }

    fn has_message(errors: &[ConfigError], needle: &str) -> bool {
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains(needle)))
    }

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&StrataConfig::default()).is_ok());
    }

    #[test]
    fn inverted_tier_thresholds_fail() {
        let mut config = StrataConfig::default();
        config.routing.tier1_threshold = 0.2;
        config.routing.tier2_threshold = 0.5;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "tier2_threshold"));
    }

    #[test]
    fn zero_alpha_and_capacity_are_both_reported() {
        let mut config = StrataConfig::default();
        config.quantization.ema_alpha = 0.0;
        config.pool.capacity_mb = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "ema_alpha"));
        assert!(has_message(&errors, "capacity_mb"));
    }

    #[test]
    fn unresolved_fallback_fails() {
        let mut config = StrataConfig::default();
        config.models = vec![
            local("tiny", &[]),
            local("expert_short", &["ghost"]),
            local("expert_long", &["expert_short"]),
        ];
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "unknown model `ghost`"));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn duplicate_model_names_fail() {
        let mut config = StrataConfig::default();
        config.models = vec![
            local("tiny", &[]),
            local("tiny", &[]),
            local("expert_short", &[]),
            local("expert_long", &[]),
        ];
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "duplicate model name `tiny`"));
    }

    #[test]
    fn tier_models_must_exist_when_registry_present() {
        let mut config = StrataConfig::default();
        config.models = vec![local("tiny", &[])];
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "routing.balanced_model"));
        assert!(has_message(&errors, "routing.deep_model"));
        assert!(!has_message(&errors, "routing.fast_model"));
    }

    #[test]
    fn local_model_without_footprints_fails() {
        let mut config = StrataConfig::default();
        let mut bare = local("tiny", &[]);
        bare.footprints_mb.clear();
        config.models = vec![bare, local("expert_short", &[]), local("expert_long", &[])];
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "footprints_mb"));
    }

    #[test]
    fn remote_model_without_footprints_is_fine() {
        let mut config = StrataConfig::default();
        let mut remote = local("expert_long", &[]);
        remote.backend = BackendKind::RemoteApi;
        remote.footprints_mb.clear();
        config.models = vec![local("tiny", &[]), local("expert_short", &[]), remote];
        assert!(validate_config(&config).is_ok());
    }
}
