// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Model descriptors for tests.

use strata_core::types::{BackendKind, ModelDescriptor, QuantLevel};

/// A local-quantized model with the given footprints and context buckets.
pub fn local_model(
    name: &str,
    footprints: &[(QuantLevel, u64)],
    kv_mb_per_1k_tokens: u64,
    context_buckets: &[u32],
) -> ModelDescriptor {
    ModelDescriptor {
        name: name.to_string(),
        backend: BackendKind::LocalQuantized,
        footprints_mb: footprints.iter().copied().collect(),
        kv_mb_per_1k_tokens,
        context_buckets: context_buckets.to_vec(),
        fallback: Vec::new(),
        weights_path: None,
        endpoint: None,
    }
}

/// A remote-API model charged `charged_mb` against pool capacity.
pub fn remote_model(name: &str, charged_mb: u64) -> ModelDescriptor {
    ModelDescriptor {
        name: name.to_string(),
        backend: BackendKind::RemoteApi,
        footprints_mb: [(QuantLevel::F16, charged_mb)].into_iter().collect(),
        kv_mb_per_1k_tokens: 0,
        context_buckets: Vec::new(),
        fallback: Vec::new(),
        weights_path: None,
        endpoint: Some(format!("https://{name}.example.net/v1")),
    }
}

/// Set the fallback chain of a descriptor.
pub fn with_fallback(mut descriptor: ModelDescriptor, chain: &[&str]) -> ModelDescriptor {
    descriptor.fallback = chain.iter().map(|s| s.to_string()).collect();
    descriptor
}
