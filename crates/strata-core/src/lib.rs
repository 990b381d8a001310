// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Strata model pool and tiered router.
//!
//! This crate provides the foundational trait definitions, error types, and
//! common types used throughout the Strata workspace. Backend loaders,
//! telemetry sinks and confidence scorers implement traits defined here.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::StrataError;
pub use types::{
    AdapterType, BackendKind, EvictionReason, HealthStatus, ModelDescriptor, QuantLevel,
    SessionId, TelemetryEvent, Tier,
};

pub use traits::{
    ConfidenceFeatures, ConfidenceScorer, LoadRequest, LoadedModel, ModelLoader, NoopTelemetry,
    PluginAdapter, TelemetrySink,
};
