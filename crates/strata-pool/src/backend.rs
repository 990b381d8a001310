// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Backend loaders and the set the pool dispatches through.
//!
//! Two built-in loaders ship with the pool:
//! - [`LocalWeightsLoader`]: validates the weight file and shares one
//!   [`WeightFile`] across every context bucket loaded from it
//! - [`RemoteApiLoader`]: binds a lightweight client handle to an endpoint
//!
//! Real inference engines plug in by implementing [`ModelLoader`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Weak};

use async_trait::async_trait;
use strata_core::{
    AdapterType, BackendKind, HealthStatus, LoadRequest, LoadedModel, ModelLoader, PluginAdapter,
    QuantLevel, StrataError,
};
use tracing::{debug, info, warn};

/// Loaders keyed by the backend family they serve.
#[derive(Clone, Default)]
pub struct BackendSet {
    loaders: HashMap<BackendKind, Arc<dyn ModelLoader>>,
}

impl std::fmt::Debug for BackendSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<String> = self.loaders.keys().map(|k| k.to_string()).collect();
        kinds.sort();
        f.debug_struct("BackendSet").field("loaders", &kinds).finish()
    }
}

impl BackendSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The local-weights and remote-API loaders.
    pub fn builtin() -> Self {
        Self::new()
            .with(Arc::new(LocalWeightsLoader::new()))
            .with(Arc::new(RemoteApiLoader::new()))
    }

    /// Register a loader, replacing any previous loader for its backend.
    pub fn with(mut self, loader: Arc<dyn ModelLoader>) -> Self {
        self.register(loader);
        self
    }

    pub fn register(&mut self, loader: Arc<dyn ModelLoader>) {
        if let Some(previous) = self.loaders.insert(loader.backend(), loader) {
            debug!(replaced = previous.name(), "backend loader replaced");
        }
    }

    pub fn get(&self, kind: BackendKind) -> Result<Arc<dyn ModelLoader>, StrataError> {
        self.loaders
            .get(&kind)
            .cloned()
            .ok_or_else(|| StrataError::backend(format!("no loader registered for backend `{kind}`")))
    }

    /// Health of every registered loader, keyed by loader name.
    pub async fn health_check_all(&self) -> Vec<(String, Result<HealthStatus, StrataError>)> {
        let mut report = Vec::with_capacity(self.loaders.len());
        for loader in self.loaders.values() {
            report.push((loader.name().to_string(), loader.health_check().await));
        }
        report.sort_by(|a, b| a.0.cmp(&b.0));
        report
    }

    /// Shut every loader down, logging failures.
    pub async fn shutdown_all(&self) {
        for loader in self.loaders.values() {
            if let Err(e) = loader.shutdown().await {
                warn!(loader = loader.name(), error = %e, "loader shutdown failed");
            }
        }
    }
}

/// One weight file on disk, shared by every instance loaded from it.
#[derive(Debug)]
pub struct WeightFile {
    path: PathBuf,
    size_bytes: u64,
}

impl WeightFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }
}

/// A locally resident, quantized instance.
#[derive(Debug)]
pub struct LocalModel {
    name: String,
    quantization: Option<QuantLevel>,
    context_tokens: u32,
    instance_id: String,
    weights: Arc<WeightFile>,
}

impl LocalModel {
    pub fn weights(&self) -> &Arc<WeightFile> {
        &self.weights
    }
}

impl LoadedModel for LocalModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn backend(&self) -> BackendKind {
        BackendKind::LocalQuantized
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

/// Loads local weight files.
///
/// Instances of the same file at different context sizes share one
/// [`WeightFile`]; the file reference is released when the last instance
/// using it is unloaded.
#[derive(Debug, Default)]
pub struct LocalWeightsLoader {
    open: Mutex<HashMap<PathBuf, Weak<WeightFile>>>,
}

impl LocalWeightsLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of weight files currently referenced by live instances.
    pub fn open_weight_files(&self) -> usize {
        let mut open = self.open.lock().unwrap_or_else(|e| e.into_inner());
        open.retain(|_, weak| weak.strong_count() > 0);
        open.len()
    }

    fn shared(&self, path: &Path) -> Option<Arc<WeightFile>> {
        let open = self.open.lock().unwrap_or_else(|e| e.into_inner());
        open.get(path).and_then(Weak::upgrade)
    }

    async fn open_file(&self, path: &Path) -> Result<Arc<WeightFile>, StrataError> {
        if let Some(file) = self.shared(path) {
            debug!(path = %path.display(), "reusing shared weight file");
            return Ok(file);
        }

        let metadata = tokio::fs::metadata(path).await.map_err(|e| StrataError::Backend {
            message: format!("cannot open weights `{}`", path.display()),
            source: Some(Box::new(e)),
        })?;
        if !metadata.is_file() {
            return Err(StrataError::backend(format!(
                "weights path `{}` is not a file",
                path.display()
            )));
        }

        let mut open = self.open.lock().unwrap_or_else(|e| e.into_inner());
        // Another load may have opened the same file while we awaited metadata.
        if let Some(file) = open.get(path).and_then(Weak::upgrade) {
            return Ok(file);
        }
        let file = Arc::new(WeightFile {
            path: path.to_path_buf(),
            size_bytes: metadata.len(),
        });
        open.insert(path.to_path_buf(), Arc::downgrade(&file));
        Ok(file)
    }
}

#[async_trait]
impl PluginAdapter for LocalWeightsLoader {
    fn name(&self) -> &str {
        "local-weights"
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
        let live = self.open_weight_files();
        if live > 0 {
            warn!(live, "local loader shutting down with weight files still referenced");
        }
        Ok(())
    }
}

#[async_trait]
impl ModelLoader for LocalWeightsLoader {
    fn backend(&self) -> BackendKind {
        BackendKind::LocalQuantized
    }

    async fn load(&self, request: &LoadRequest) -> Result<Arc<dyn LoadedModel>, StrataError> {
        let descriptor = &request.descriptor;
        let path = descriptor.weights_path.as_deref().ok_or_else(|| {
            StrataError::backend(format!("model `{}` has no weights_path", descriptor.name))
        })?;
        let weights = self.open_file(path).await?;

        info!(
            model = descriptor.name.as_str(),
            path = %path.display(),
            quantization = ?request.quantization,
            context_tokens = request.context_tokens,
            "local weights mapped"
        );

        Ok(Arc::new(LocalModel {
            name: descriptor.name.clone(),
            quantization: request.quantization,
            context_tokens: request.context_tokens,
            instance_id: uuid::Uuid::new_v4().to_string(),
            weights,
        }))
    }

    async fn unload(&self, model: Arc<dyn LoadedModel>) -> Result<(), StrataError> {
        debug!(
            model = model.name(),
            instance = model.instance_id(),
            "local instance unloaded"
        );
        drop(model);
        self.open
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|_, weak| weak.strong_count() > 0);
        Ok(())
    }
}

/// A client handle bound to a hosted model endpoint.
#[derive(Debug)]
pub struct RemoteModel {
    name: String,
    endpoint: String,
    instance_id: String,
}

impl RemoteModel {
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl LoadedModel for RemoteModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn backend(&self) -> BackendKind {
        BackendKind::RemoteApi
    }

    fn quantization(&self) -> Option<QuantLevel> {
        None
    }

    fn context_tokens(&self) -> u32 {
        0
    }

    fn instance_id(&self) -> &str {
        &self.instance_id
    }
}

/// Produces client handles for hosted models. Nothing is resident locally.
#[derive(Debug, Default)]
pub struct RemoteApiLoader;

impl RemoteApiLoader {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PluginAdapter for RemoteApiLoader {
    fn name(&self) -> &str {
        "remote-api"
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
impl ModelLoader for RemoteApiLoader {
    fn backend(&self) -> BackendKind {
        BackendKind::RemoteApi
    }

    async fn load(&self, request: &LoadRequest) -> Result<Arc<dyn LoadedModel>, StrataError> {
        let descriptor = &request.descriptor;
        let endpoint = descriptor
            .endpoint
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| {
                StrataError::backend(format!("model `{}` has no endpoint", descriptor.name))
            })?;

        debug!(model = descriptor.name.as_str(), endpoint, "remote client bound");
        Ok(Arc::new(RemoteModel {
            name: descriptor.name.clone(),
            endpoint: endpoint.to_string(),
            instance_id: uuid::Uuid::new_v4().to_string(),
        }))
    }

    async fn unload(&self, model: Arc<dyn LoadedModel>) -> Result<(), StrataError> {
        debug!(model = model.name(), "remote client released");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use strata_core::ModelDescriptor;

    use super::*;

    fn local_request(path: Option<PathBuf>, context_tokens: u32) -> LoadRequest {
        LoadRequest {
            descriptor: Arc::new(ModelDescriptor {
                name: "expert_short".into(),
                backend: BackendKind::LocalQuantized,
                footprints_mb: BTreeMap::from([(QuantLevel::Q4KM, 4100)]),
                kv_mb_per_1k_tokens: 128,
                context_buckets: vec![2048, 8192],
                fallback: vec![],
                weights_path: path,
                endpoint: None,
            }),
            quantization: Some(QuantLevel::Q4KM),
            context_tokens,
        }
    }

    #[tokio::test]
    async fn context_buckets_share_one_weight_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("expert_short.q4_k_m.gguf");
        std::fs::write(&path, b"weights").unwrap();

        let loader = LocalWeightsLoader::new();
        let small = loader.load(&local_request(Some(path.clone()), 2048)).await.unwrap();
        let large = loader.load(&local_request(Some(path.clone()), 8192)).await.unwrap();

        assert_ne!(small.instance_id(), large.instance_id());
        assert_eq!(small.context_tokens(), 2048);
        assert_eq!(large.context_tokens(), 8192);
        assert_eq!(loader.open_weight_files(), 1);

        loader.unload(small).await.unwrap();
        assert_eq!(loader.open_weight_files(), 1);
        loader.unload(large).await.unwrap();
        assert_eq!(loader.open_weight_files(), 0);
    }

    #[tokio::test]
    async fn missing_weights_are_a_backend_error() {
        let loader = LocalWeightsLoader::new();
        let err = loader
            .load(&local_request(Some(PathBuf::from("/nonexistent/w.gguf")), 2048))
            .await
            .unwrap_err();
        assert!(matches!(err, StrataError::Backend { source: Some(_), .. }));

        let err = loader.load(&local_request(None, 2048)).await.unwrap_err();
        assert!(err.to_string().contains("no weights_path"));
    }

    #[tokio::test]
    async fn remote_loader_requires_endpoint() {
        let loader = RemoteApiLoader::new();
        let mut request = local_request(None, 0);
        let descriptor = Arc::make_mut(&mut request.descriptor);
        descriptor.backend = BackendKind::RemoteApi;
        assert!(loader.load(&request).await.is_err());

        Arc::make_mut(&mut request.descriptor).endpoint = Some("https://api.example.net".into());
        let model = loader.load(&request).await.unwrap();
        assert_eq!(model.backend(), BackendKind::RemoteApi);
        assert_eq!(model.quantization(), None);
    }

    #[tokio::test]
    async fn backend_set_dispatches_by_kind() {
        let set = BackendSet::new().with(Arc::new(RemoteApiLoader::new()));
        assert!(set.get(BackendKind::RemoteApi).is_ok());
        let err = set.get(BackendKind::LocalQuantized).err().unwrap();
        assert!(err.to_string().contains("local-quantized"));

        let health = BackendSet::builtin().health_check_all().await;
        assert_eq!(health.len(), 2);
        assert!(health.iter().all(|(_, h)| matches!(h, Ok(HealthStatus::Healthy))));
    }
}
