// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telemetry sink trait for cache, load, eviction and routing events.

use crate::types::TelemetryEvent;

/// Receives structured events from the pool and the router.
///
/// `emit` is called from inside bookkeeping paths (including `Drop`), so
/// implementations must not block: buffer, forward to a channel, or record
/// into a lock-free facade.
pub trait TelemetrySink: Send + Sync {
    /// Records a telemetry event.
    fn emit(&self, event: TelemetryEvent);
}

/// Sink that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTelemetry;

impl TelemetrySink for NoopTelemetry {
    fn emit(&self, _event: TelemetryEvent) {}
}
