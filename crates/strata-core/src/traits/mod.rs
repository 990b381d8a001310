// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions.
//!
//! Loaders extend the [`PluginAdapter`] base trait and use `#[async_trait]`
//! for dynamic dispatch compatibility.

pub mod adapter;
pub mod loader;
pub mod scorer;
pub mod telemetry;

pub use adapter::PluginAdapter;
pub use loader::{LoadRequest, LoadedModel, ModelLoader};
pub use scorer::{ConfidenceFeatures, ConfidenceScorer};
pub use telemetry::{NoopTelemetry, TelemetrySink};
