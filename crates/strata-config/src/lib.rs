// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the Strata model pool and tiered router.
//!
//! Provides TOML configuration parsing with strict validation (`deny_unknown_fields`),
//! XDG file hierarchy lookup, environment variable overrides, diagnostic
//! error rendering with typo suggestions, and a file watcher for registry hot reload.
//!
//! # Usage
//!
//! ```no_run
//! use strata_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("pool capacity: {} MB", config.pool.capacity_mb);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;
pub mod watcher;

use std::path::Path;

pub use diagnostic::{render_errors, ConfigError};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::{
    LogConfig, PoolConfig, QuantizationConfig, RoutingConfig, ScorerConfig, ScoringPhase,
    StrataConfig, TelemetryConfig,
};
pub use watcher::RegistryWatcher;

/// Load configuration from the XDG hierarchy and validate it.
///
/// On a Figment error the TOML sources are re-read so diagnostics can point
/// at the offending key.
pub fn load_and_validate() -> Result<StrataConfig, Vec<ConfigError>> {
    match loader::load_config() {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => {
            let toml_sources = collect_toml_sources();
            Err(diagnostic::figment_to_config_errors(err, &toml_sources))
        }
    }
}

/// Load configuration from a TOML string and validate it.
pub fn load_and_validate_str(toml_content: &str) -> Result<StrataConfig, Vec<ConfigError>> {
    match loader::load_config_from_str(toml_content) {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => {
            let sources = vec![("<inline>".to_string(), toml_content.to_string())];
            Err(diagnostic::figment_to_config_errors(err, &sources))
        }
    }
}

/// Load configuration from an explicit file (plus env overrides) and validate it.
///
/// This is the entry point used by `strata --config <path>` and by the
/// registry watcher on every reload.
pub fn load_and_validate_path(path: &Path) -> Result<StrataConfig, Vec<ConfigError>> {
    if !path.is_file() {
        return Err(vec![ConfigError::Other(format!(
            "config file `{}` does not exist",
            path.display()
        ))]);
    }
    match loader::load_config_from_path(path) {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => {
            let sources = std::fs::read_to_string(path)
                .map(|content| vec![(path.display().to_string(), content)])
                .unwrap_or_default();
            Err(diagnostic::figment_to_config_errors(err, &sources))
        }
    }
}

/// Collect TOML source file contents for error span resolution.
fn collect_toml_sources() -> Vec<(String, String)> {
    let mut candidates = Vec::new();

    match std::env::current_dir() {
        Ok(dir) => candidates.push(dir.join("strata.toml")),
        Err(_) => candidates.push("strata.toml".into()),
    }
    if let Some(config_dir) = dirs::config_dir() {
        candidates.push(config_dir.join("strata/strata.toml"));
    }
    candidates.push("/etc/strata/strata.toml".into());

    candidates
        .into_iter()
        .filter_map(|path| {
            std::fs::read_to_string(&path)
                .ok()
                .map(|content| (path.display().to_string(), content))
        })
        .collect()
}
