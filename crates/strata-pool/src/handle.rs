// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Leased model handles.

use std::fmt;
use std::sync::Arc;

use strata_core::{LoadedModel, QuantLevel};

use crate::entry::CacheKey;
use crate::pool::PoolInner;

/// A borrowed, ref-counted lease on a READY pool entry.
///
/// The entry cannot be evicted while any lease on it is outstanding. The
/// lease is returned exactly once: explicitly through
/// [`ResourcePool::release`](crate::ResourcePool::release) or
/// [`ModelHandle::release`], or implicitly when the handle is dropped,
/// which covers early returns and panics in the caller.
pub struct ModelHandle {
    pool: Arc<PoolInner>,
    key: CacheKey,
    token: u64,
    model: Arc<dyn LoadedModel>,
    requested: String,
    quantization: Option<QuantLevel>,
    degraded: bool,
    released: bool,
}

impl ModelHandle {
    pub(crate) fn new(
        pool: Arc<PoolInner>,
        key: CacheKey,
        token: u64,
        model: Arc<dyn LoadedModel>,
        requested: &str,
        quantization: Option<QuantLevel>,
        degraded: bool,
    ) -> Self {
        Self {
            pool,
            key,
            token,
            model,
            requested: requested.to_string(),
            quantization,
            degraded,
            released: false,
        }
    }

    /// The loaded instance.
    pub fn model(&self) -> &Arc<dyn LoadedModel> {
        &self.model
    }

    /// Logical name of the model actually serving this lease.
    pub fn name(&self) -> &str {
        &self.key.name
    }

    /// Logical name the caller asked for.
    pub fn requested(&self) -> &str {
        &self.requested
    }

    /// Whether a fallback-chain entry is serving instead of the requested model.
    pub fn is_fallback(&self) -> bool {
        self.key.name != self.requested
    }

    /// Context bucket of the instance; `0` for remote models.
    pub fn context_tokens(&self) -> u32 {
        self.key.context_tokens
    }

    pub fn quantization(&self) -> Option<QuantLevel> {
        self.quantization
    }

    /// The quantization was chosen under memory pressure or forced past the budget.
    pub fn degraded(&self) -> bool {
        self.degraded
    }

    pub fn instance_id(&self) -> &str {
        self.model.instance_id()
    }

    pub(crate) fn key(&self) -> &CacheKey {
        &self.key
    }

    pub(crate) fn token(&self) -> u64 {
        self.token
    }

    /// Return the lease now instead of at drop.
    pub fn release(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if !self.released {
            self.released = true;
            self.pool.release_lease(&self.key, self.token);
        }
    }
}

impl Drop for ModelHandle {
    fn drop(&mut self) {
        self.release_once();
    }
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle")
            .field("key", &self.key)
            .field("token", &self.token)
            .field("requested", &self.requested)
            .field("instance", &self.model.instance_id())
            .field("quantization", &self.quantization)
            .field("degraded", &self.degraded)
            .finish()
    }
}
