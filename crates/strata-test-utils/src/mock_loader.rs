// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock model loader for deterministic testing.
//!
//! `MockLoader` implements `ModelLoader` with scripted per-model delays,
//! failures and hangs, and records every load and unload it sees so tests
//! can assert on single-flight behaviour and eviction order.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use strata_core::traits::adapter::PluginAdapter;
use strata_core::traits::loader::{LoadRequest, LoadedModel, ModelLoader};
use strata_core::types::{AdapterType, BackendKind, HealthStatus, QuantLevel};
use strata_core::StrataError;

/// One call to [`MockLoader::load`].
#[derive(Debug, Clone, PartialEq)]
pub struct LoadRecord {
    pub name: String,
    pub context_tokens: u32,
    pub quantization: Option<QuantLevel>,
    pub started: Instant,
    /// `None` while running, or if the load was cancelled.
    pub finished: Option<Instant>,
    /// Set when the load produced an instance.
    pub instance_id: Option<String>,
}

/// Instance produced by [`MockLoader`].
#[derive(Debug)]
pub struct MockModel {
    name: String,
    backend: BackendKind,
    quantization: Option<QuantLevel>,
    context_tokens: u32,
    instance_id: String,
}

impl LoadedModel for MockModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn backend(&self) -> BackendKind {
        self.backend
    }

    fn quantization(&self) -> Option<QuantLevel> {
        self.quantization
    }

    fn context_tokens(&self) -> u32 {
        self.context_tokens
    }

    fn instance_id(&self) -> &str {
        &self.instance_id
    }
}

#[derive(Default)]
struct Script {
    delays: HashMap<String, Duration>,
    failures: HashMap<String, String>,
    hangs: HashSet<String>,
    loads: Vec<LoadRecord>,
    unloads: Vec<String>,
    active: HashMap<String, usize>,
    max_active: HashMap<String, usize>,
}

/// A mock loader for one backend family.
pub struct MockLoader {
    backend: BackendKind,
    default_delay: Duration,
    script: Mutex<Script>,
}

impl MockLoader {
    /// Create a mock loader that loads instantly.
    pub fn new(backend: BackendKind) -> Self {
        Self {
            backend,
            default_delay: Duration::ZERO,
            script: Mutex::new(Script::default()),
        }
    }

    /// Shorthand for a mock local-quantized loader.
    pub fn local() -> Self {
        Self::new(BackendKind::LocalQuantized)
    }

    /// Shorthand for a mock remote-API loader.
    pub fn remote() -> Self {
        Self::new(BackendKind::RemoteApi)
    }

    /// Delay every load by `delay` unless a per-model delay is set.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    pub fn set_delay(&self, name: &str, delay: Duration) {
        self.script().delays.insert(name.to_string(), delay);
    }

    /// Make every load of `name` fail with `message`.
    pub fn fail(&self, name: &str, message: &str) {
        self.script()
            .failures
            .insert(name.to_string(), message.to_string());
    }

    /// Make every load of `name` block forever.
    pub fn hang(&self, name: &str) {
        self.script().hangs.insert(name.to_string());
    }

    /// Undo [`fail`](Self::fail) and [`hang`](Self::hang) for `name`.
    pub fn heal(&self, name: &str) {
        let mut script = self.script();
        script.failures.remove(name);
        script.hangs.remove(name);
    }

    pub fn loads(&self) -> Vec<LoadRecord> {
        self.script().loads.clone()
    }

    pub fn load_count(&self, name: &str) -> usize {
        self.script().loads.iter().filter(|r| r.name == name).count()
    }

    /// Instance ids passed to `unload`, in call order.
    pub fn unloads(&self) -> Vec<String> {
        self.script().unloads.clone()
    }

    /// Most loads of `name` that were ever running at the same time.
    pub fn max_concurrent(&self, name: &str) -> usize {
        self.script().max_active.get(name).copied().unwrap_or(0)
    }

    /// Instances loaded and not yet unloaded.
    pub fn resident(&self) -> usize {
        let script = self.script();
        let loaded = script
            .loads
            .iter()
            .filter(|r| r.instance_id.is_some())
            .count();
        loaded.saturating_sub(script.unloads.len())
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Keeps the active-load count right when a load future is dropped mid-flight.
struct ActiveLoad<'a> {
    loader: &'a MockLoader,
    name: String,
}

impl Drop for ActiveLoad<'_> {
    fn drop(&mut self) {
        if let Some(active) = self.loader.script().active.get_mut(&self.name) {
            *active = active.saturating_sub(1);
        }
    }
}

#[async_trait]
impl PluginAdapter for MockLoader {
    fn name(&self) -> &str {
        "mock-loader"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Loader
    }

    async fn health_check(&self) -> Result<HealthStatus, StrataError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), StrataError> {
        Ok(())
    }
}

#[async_trait]
impl ModelLoader for MockLoader {
    fn backend(&self) -> BackendKind {
        self.backend
    }

    async fn load(&self, request: &LoadRequest) -> Result<Arc<dyn LoadedModel>, StrataError> {
        let name = request.descriptor.name.clone();
        let (index, delay, failure, hangs) = {
            let mut script = self.script();
            let index = script.loads.len();
            script.loads.push(LoadRecord {
                name: name.clone(),
                context_tokens: request.context_tokens,
                quantization: request.quantization,
                started: Instant::now(),
                finished: None,
                instance_id: None,
            });
            let active = script.active.entry(name.clone()).or_insert(0);
            *active += 1;
            let now_active = *active;
            let peak = script.max_active.entry(name.clone()).or_insert(0);
            *peak = (*peak).max(now_active);
            (
                index,
                script.delays.get(&name).copied().unwrap_or(self.default_delay),
                script.failures.get(&name).cloned(),
                script.hangs.contains(&name),
            )
        };
        let _active = ActiveLoad {
            loader: self,
            name: name.clone(),
        };

        if hangs {
            std::future::pending::<()>().await;
        }
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut script = self.script();
        script.loads[index].finished = Some(Instant::now());
        if let Some(message) = failure {
            tracing::debug!(model = name.as_str(), "mock load failing");
            return Err(StrataError::backend(message));
        }

        let instance_id = uuid::Uuid::new_v4().to_string();
        script.loads[index].instance_id = Some(instance_id.clone());
        Ok(Arc::new(MockModel {
            name,
            backend: self.backend,
            quantization: request.quantization,
            context_tokens: request.context_tokens,
            instance_id,
        }))
    }

    async fn unload(&self, model: Arc<dyn LoadedModel>) -> Result<(), StrataError> {
        self.script().unloads.push(model.instance_id().to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::remote_model;

    fn request(name: &str) -> LoadRequest {
        LoadRequest {
            descriptor: Arc::new(remote_model(name, 100)),
            quantization: None,
            context_tokens: 0,
        }
    }

    #[tokio::test]
    async fn records_loads_and_unloads() {
        let loader = MockLoader::remote();
        let model = loader.load(&request("tiny")).await.unwrap();
        assert_eq!(loader.load_count("tiny"), 1);
        assert_eq!(loader.resident(), 1);

        loader.unload(model.clone()).await.unwrap();
        assert_eq!(loader.unloads(), vec![model.instance_id().to_string()]);
        assert_eq!(loader.resident(), 0);
    }

    #[tokio::test]
    async fn scripted_failure_then_heal() {
        let loader = MockLoader::remote();
        loader.fail("tiny", "weights missing");
        let err = loader.load(&request("tiny")).await.unwrap_err();
        assert!(err.to_string().contains("weights missing"));

        loader.heal("tiny");
        assert!(loader.load(&request("tiny")).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_load_is_no_longer_active() {
        let loader = Arc::new(MockLoader::remote());
        loader.hang("tiny");
        let result =
            tokio::time::timeout(Duration::from_secs(1), loader.load(&request("tiny"))).await;
        assert!(result.is_err());
        assert_eq!(loader.max_concurrent("tiny"), 1);
        assert_eq!(loader.script().active.get("tiny"), Some(&0));
        assert_eq!(loader.loads()[0].finished, None);
    }
}
