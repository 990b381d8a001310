// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Strata integration tests.
//!
//! Provides mock adapters and fixtures for fast, deterministic tests
//! without weight files or remote endpoints.
//!
//! # Components
//!
//! - [`MockLoader`] - Mock model loader with scripted delays and failures
//! - [`RecordingTelemetry`] - Telemetry sink that keeps every event
//! - [`fixtures`] - Descriptors matching the example registry

pub mod fixtures;
pub mod mock_loader;
pub mod recording_telemetry;

pub use fixtures::{local_model, remote_model, with_fallback};
pub use mock_loader::{LoadRecord, MockLoader, MockModel};
pub use recording_telemetry::RecordingTelemetry;
