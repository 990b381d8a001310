// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./strata.toml` > `~/.config/strata/strata.toml` > `/etc/strata/strata.toml`
//! with environment variable overrides via `STRATA_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::StrataConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/strata/strata.toml` (system-wide)
/// 3. `~/.config/strata/strata.toml` (user XDG config)
/// 4. `./strata.toml` (local directory)
/// 5. `STRATA_*` environment variables
pub fn load_config() -> Result<StrataConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<StrataConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(StrataConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<StrataConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(StrataConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading (exposed for diagnostic use).
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(StrataConfig::default()))
        .merge(Toml::file("/etc/strata/strata.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("strata/strata.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("strata.toml"))
        .merge(env_provider())
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` because keys contain
/// underscores: `STRATA_POOL_CAPACITY_MB` must map to `pool.capacity_mb`,
/// not `pool.capacity.mb`.
fn env_provider() -> Env {
    Env::prefixed("STRATA_").map(|key| map_env_key(key.as_str()).into())
}

/// Map a lowercased, prefix-stripped env key to its dotted config path.
pub(crate) fn map_env_key(key: &str) -> String {
    key.replacen("log_", "log.", 1)
        .replacen("pool_", "pool.", 1)
        .replacen("quantization_", "quantization.", 1)
        .replacen("routing_scorer_", "routing.scorer.", 1)
        .replacen("routing_", "routing.", 1)
        .replacen("telemetry_", "telemetry.", 1)
}
