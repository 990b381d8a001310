// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the pool, the selector, the router, and the adapters.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Identifier for a caller session, used by the router's hysteresis table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        SessionId(value.to_string())
    }
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter plugged into the pool.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Loader,
    Telemetry,
    Scorer,
}

/// Which family of backend serves a logical model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum BackendKind {
    /// Weights loaded into local memory at a chosen quantization level.
    LocalQuantized,
    /// A hosted API; nothing is loaded locally beyond a client handle.
    RemoteApi,
}

/// Quantization levels for local weights, ordered from lowest to highest quality.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, Serialize,
    Deserialize,
)]
#[serde(try_from = "String", into = "String")]
#[strum(ascii_case_insensitive)]
pub enum QuantLevel {
    #[strum(serialize = "q2_k")]
    Q2K,
    #[strum(serialize = "q3_k_m")]
    Q3KM,
    #[strum(serialize = "q4_k_m")]
    Q4KM,
    #[strum(serialize = "q5_k_m")]
    Q5KM,
    #[strum(serialize = "q6_k")]
    Q6K,
    #[strum(serialize = "q8_0")]
    Q8_0,
    #[strum(serialize = "f16")]
    F16,
}

impl TryFrom<String> for QuantLevel {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        QuantLevel::from_str(&value).map_err(|_| format!("unknown quantization level `{value}`"))
    }
}

impl From<QuantLevel> for String {
    fn from(value: QuantLevel) -> Self {
        value.to_string()
    }
}

/// Static description of a logical model, loaded from the registry at startup.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ModelDescriptor {
    /// Unique logical name.
    pub name: String,

    /// Backend family that serves this model.
    pub backend: BackendKind,

    /// Approximate weight footprint in MB per quantization level.
    #[serde(default)]
    pub footprints_mb: BTreeMap<QuantLevel, u64>,

    /// KV-cache cost in MB per 1000 tokens of context.
    #[serde(default)]
    pub kv_mb_per_1k_tokens: u64,

    /// Supported context sizes in tokens.
    #[serde(default)]
    pub context_buckets: Vec<u32>,

    /// Ordered alternatives tried when this model fails to load.
    #[serde(default)]
    pub fallback: Vec<String>,

    /// Weight file for local backends.
    #[serde(default)]
    pub weights_path: Option<PathBuf>,

    /// API endpoint for remote backends.
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl ModelDescriptor {
    /// Whether this model is loaded locally and therefore quantized.
    pub fn is_local(&self) -> bool {
        self.backend == BackendKind::LocalQuantized
    }

    /// Available quantization levels, lowest quality first.
    pub fn levels(&self) -> Vec<QuantLevel> {
        self.footprints_mb.keys().copied().collect()
    }

    /// Weight footprint for a level, if the model ships that level.
    pub fn footprint_mb(&self, level: QuantLevel) -> Option<u64> {
        self.footprints_mb.get(&level).copied()
    }

    /// Estimated resident memory for a level at a given context size.
    pub fn estimated_mb(&self, level: QuantLevel, context_tokens: u32) -> Option<u64> {
        let weights = self.footprint_mb(level)?;
        let kv = (u64::from(context_tokens) * self.kv_mb_per_1k_tokens).div_ceil(1000);
        Some(weights + kv)
    }

    /// Memory charged for a remote model: the smallest declared footprint, or nothing.
    pub fn remote_estimate_mb(&self) -> u64 {
        self.footprints_mb.values().copied().min().unwrap_or(0)
    }

    /// Context buckets sorted ascending without duplicates.
    pub fn sorted_buckets(&self) -> Vec<u32> {
        let mut buckets = self.context_buckets.clone();
        buckets.sort_unstable();
        buckets.dedup();
        buckets
    }
}

/// The three escalating inference tiers, cheapest first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Tier {
    /// Tier 1: fast local model.
    Fast,
    /// Tier 2: mid-cost remote model.
    Balanced,
    /// Tier 3: expensive deep-reasoning model.
    Deep,
}

impl Tier {
    /// Numeric tier (1, 2 or 3).
    pub fn level(self) -> u8 {
        match self {
            Tier::Fast => 1,
            Tier::Balanced => 2,
            Tier::Deep => 3,
        }
    }
}

/// Why a handle left the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EvictionReason {
    /// Idle past its working-set TTL.
    Expired,
    /// Displaced to make room for another load.
    Pressure,
    /// Pool shutdown.
    Shutdown,
}

/// Structured events handed to the external telemetry sink.
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryEvent {
    CacheHit {
        model: String,
    },
    CacheMiss {
        model: String,
    },
    LoadStarted {
        model: String,
        context_tokens: u32,
    },
    LoadCompleted {
        model: String,
        context_tokens: u32,
        latency: Duration,
    },
    LoadFailed {
        model: String,
        reason: String,
    },
    Evicted {
        model: String,
        context_tokens: u32,
        freed_mb: u64,
        reason: EvictionReason,
    },
    FallbackUsed {
        requested: String,
        served_by: String,
    },
    Degraded {
        model: String,
        level: QuantLevel,
    },
    Routed {
        tier: Tier,
        escalated: bool,
        sticky: bool,
    },
}
