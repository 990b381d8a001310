// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Backend loader trait: the uniform boundary in front of every inference engine.
//!
//! The pool never knows how a backend tokenizes, maps weights, or talks to a
//! network. It asks a [`ModelLoader`] for a [`LoadedModel`] and hands the
//! instance back when the entry is evicted.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StrataError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{BackendKind, ModelDescriptor, QuantLevel};

/// Everything a loader needs to materialize one instance.
#[derive(Debug, Clone)]
pub struct LoadRequest {
    /// Descriptor snapshot taken when the load was scheduled.
    pub descriptor: Arc<ModelDescriptor>,
    /// Quantization chosen by the selector; `None` for remote backends.
    pub quantization: Option<QuantLevel>,
    /// Context window to allocate; `0` means the backend default.
    pub context_tokens: u32,
}

/// A loaded, usable model instance.
pub trait LoadedModel: Debug + Send + Sync {
    /// Logical name this instance serves.
    fn name(&self) -> &str;

    /// Backend family of this instance.
    fn backend(&self) -> BackendKind;

    /// Active quantization level, if the backend quantizes.
    fn quantization(&self) -> Option<QuantLevel>;

    /// Active context size in tokens.
    fn context_tokens(&self) -> u32;

    /// Identifier unique to this instance, stable for its lifetime.
    fn instance_id(&self) -> &str;
}

/// Loads and unloads model instances for one backend family.
#[async_trait]
pub trait ModelLoader: PluginAdapter {
    /// The backend family this loader serves.
    fn backend(&self) -> BackendKind;

    /// Materialize an instance. May be slow; the pool calls it outside its lock.
    async fn load(&self, request: &LoadRequest) -> Result<Arc<dyn LoadedModel>, StrataError>;

    /// Release an instance's resources. The pool only calls this for unreferenced entries.
    async fn unload(&self, model: Arc<dyn LoadedModel>) -> Result<(), StrataError>;
}
