// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cache entries and their lifecycle state.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use strata_core::{LoadedModel, ModelDescriptor, QuantLevel};
use strum::Display;
use tokio::time::Instant;

use crate::working_set::{AccessWindow, WorkingSetClass, WorkingSetPolicy};

/// A logical model at one context size. Remote models always use context `0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    pub name: String,
    pub context_tokens: u32,
}

impl CacheKey {
    pub fn new(name: impl Into<String>, context_tokens: u32) -> Self {
        Self {
            name: name.into(),
            context_tokens,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.context_tokens == 0 {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}@{}", self.name, self.context_tokens)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum EntryState {
    /// Memory reserved, load task running.
    Loading,
    /// Usable; may be leased.
    Ready,
    /// Detached from the cache, waiting for its backend to unload it.
    Evicting,
}

/// One cached instance plus the bookkeeping the pool keeps about it.
#[derive(Debug)]
pub(crate) struct Entry {
    pub key: CacheKey,
    pub descriptor: Arc<ModelDescriptor>,
    pub state: EntryState,
    pub model: Option<Arc<dyn LoadedModel>>,
    pub quantization: Option<QuantLevel>,
    pub degraded: bool,
    pub estimated_mb: u64,
    pub loaded_at: Option<Instant>,
    /// Last successful acquire; drives LRU ordering.
    pub last_access: Instant,
    /// Later of last acquire and last release; TTLs count from here.
    pub idle_since: Instant,
    pub window: AccessWindow,
    /// Outstanding lease tokens. The refcount is their number.
    pub leases: HashSet<u64>,
}

impl Entry {
    pub fn loading(
        key: CacheKey,
        descriptor: Arc<ModelDescriptor>,
        quantization: Option<QuantLevel>,
        degraded: bool,
        estimated_mb: u64,
        now: Instant,
    ) -> Self {
        Self {
            key,
            descriptor,
            state: EntryState::Loading,
            model: None,
            quantization,
            degraded,
            estimated_mb,
            loaded_at: None,
            last_access: now,
            idle_since: now,
            window: AccessWindow::default(),
            leases: HashSet::new(),
        }
    }

    pub fn refcount(&self) -> usize {
        self.leases.len()
    }

    pub fn is_ready(&self) -> bool {
        self.state == EntryState::Ready
    }

    /// Counts against capacity: READY and LOADING do, EVICTING does not.
    pub fn is_charged(&self) -> bool {
        matches!(self.state, EntryState::Ready | EntryState::Loading)
    }

    /// READY with no outstanding leases.
    pub fn is_evictable(&self) -> bool {
        self.is_ready() && self.leases.is_empty()
    }

    /// Live class; accesses age out of the window while the entry idles.
    pub fn class(&self, policy: &WorkingSetPolicy, now: Instant) -> WorkingSetClass {
        policy.classify(&self.window, now)
    }

    /// TTL earned by the class as of the last access.
    pub fn ttl(&self, policy: &WorkingSetPolicy) -> Duration {
        policy.ttl(policy.classify(&self.window, self.last_access))
    }

    pub fn idle(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.idle_since)
    }

    /// Evictable and idle for at least its TTL.
    pub fn is_expired(&self, policy: &WorkingSetPolicy, now: Instant) -> bool {
        self.is_evictable() && self.idle(now) >= self.ttl(policy)
    }

    /// Record a successful acquire.
    pub fn touch(&mut self, policy: &WorkingSetPolicy, now: Instant) {
        self.window.record(now, policy.window);
        self.last_access = now;
        self.idle_since = now;
    }
}
