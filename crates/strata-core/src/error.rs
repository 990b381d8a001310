// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Strata model pool and router.

use std::time::Duration;

use thiserror::Error;

/// The primary error type used across the pool, the loaders, and the adapter traits.
#[derive(Debug, Error)]
pub enum StrataError {
    /// Configuration errors (invalid registry entries, out-of-range thresholds).
    #[error("configuration error: {0}")]
    Config(String),

    /// The requested logical model name has no descriptor in the registry.
    #[error("no model named `{name}` in the registry")]
    InvalidLogicalName { name: String },

    /// A load did not finish within the configured deadline and was aborted.
    #[error("loading `{name}` timed out after {timeout:?}")]
    LoadTimeout { name: String, timeout: Duration },

    /// No evictable memory was left to admit the model, even after an eviction pass.
    #[error(
        "cannot admit `{name}`: needs {required_mb} MB, {pinned_mb} MB of {capacity_mb} MB is pinned by busy models"
    )]
    CapacityExceeded {
        name: String,
        required_mb: u64,
        capacity_mb: u64,
        pinned_mb: u64,
    },

    /// The primary model and every fallback-chain entry failed to load.
    #[error("all fallbacks exhausted (attempted: {}): {last_cause}", attempted.join(" -> "))]
    AllFallbacksExhausted {
        attempted: Vec<String>,
        last_cause: Box<StrataError>,
    },

    /// The in-flight load this caller was waiting on failed.
    #[error("in-flight load of `{name}` was aborted: {reason}")]
    ConcurrentLoadAborted { name: String, reason: String },

    /// Backend loader errors (missing weights, unreachable endpoint, unsupported backend).
    #[error("backend error: {message}")]
    Backend {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl StrataError {
    /// Shorthand for a backend error without an underlying source.
    pub fn backend(message: impl Into<String>) -> Self {
        StrataError::Backend {
            message: message.into(),
            source: None,
        }
    }

    /// Whether this error came out of a load attempt and should advance the fallback chain.
    pub fn is_load_failure(&self) -> bool {
        matches!(
            self,
            StrataError::LoadTimeout { .. }
                | StrataError::CapacityExceeded { .. }
                | StrataError::ConcurrentLoadAborted { .. }
                | StrataError::Backend { .. }
                | StrataError::InvalidLogicalName { .. }
        )
    }
}
