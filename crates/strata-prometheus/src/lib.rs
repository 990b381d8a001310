// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prometheus telemetry for the Strata model pool.
//!
//! Uses the metrics-rs facade with the Prometheus exporter.
//! [`PrometheusSink`] turns pool and router telemetry events into metrics;
//! [`PrometheusAdapter`] installs the recorder and renders Prometheus text format.

pub mod recording;

use async_trait::async_trait;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use strata_core::traits::adapter::PluginAdapter;
use strata_core::traits::telemetry::TelemetrySink;
use strata_core::types::{AdapterType, HealthStatus, TelemetryEvent};
use strata_core::StrataError;

pub use recording::{record_event, register_metrics, set_pool_memory, set_ready_entries};

/// Prometheus metrics adapter.
///
/// Installs the Prometheus recorder and exposes a handle for rendering
/// metrics in Prometheus text format.
pub struct PrometheusAdapter {
    handle: PrometheusHandle,
}

impl PrometheusAdapter {
    /// Create a new PrometheusAdapter.
    ///
    /// Installs the Prometheus recorder globally. Only one recorder can be
    /// installed per process. Returns an error if a recorder is already installed.
    pub fn new() -> Result<Self, StrataError> {
        let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
            StrataError::Internal(format!("failed to install Prometheus recorder: {e}"))
        })?;

        recording::register_metrics();

        tracing::info!("prometheus metrics recorder installed");

        Ok(Self { handle })
    }

    /// Get a reference to the Prometheus handle for rendering.
    pub fn handle(&self) -> &PrometheusHandle {
        &self.handle
    }

    /// Render all collected metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// A sink that records into whichever recorder is installed.
    pub fn sink(&self) -> PrometheusSink {
        PrometheusSink
    }
}

#[async_trait]
impl PluginAdapter for PrometheusAdapter {
    fn name(&self) -> &str {
        "prometheus"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Telemetry
    }

    async fn health_check(&self) -> Result<HealthStatus, StrataError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), StrataError> {
        Ok(())
    }
}

/// Telemetry sink backed by the metrics facade.
///
/// Emitting without an installed recorder is a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrometheusSink;

impl TelemetrySink for PrometheusSink {
    fn emit(&self, event: TelemetryEvent) {
        recording::record_event(&event);
    }
}
