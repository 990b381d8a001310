// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The resource pool: cached instances, single-flight loading, and reclamation.
//!
//! One mutex guards the bookkeeping (lookup, victim choice, lease counts,
//! state transitions). Loading and unloading run outside it in a spawned
//! task, with the entry marked LOADING so concurrent callers coalesce onto
//! the running load instead of starting another. A caller that gives up
//! waiting does not cancel the load; only the deadline does.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use strata_config::model::PoolConfig;
use strata_core::{
    BackendKind, EvictionReason, LoadRequest, LoadedModel, ModelDescriptor, StrataError,
    TelemetryEvent, TelemetrySink,
};
use strata_quant::{QuantizationSelector, SelectionRequest};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::BackendSet;
use crate::entry::{CacheKey, Entry, EntryState};
use crate::eviction;
use crate::handle::ModelHandle;
use crate::registry::ModelRegistry;
use crate::stats::{Counters, EntrySnapshot, PoolSnapshot};
use crate::working_set::WorkingSetPolicy;

/// Lookup rounds before a caller gives up on an entry that keeps being
/// evicted between its load finishing and the caller leasing it.
const MAX_LEASE_ROUNDS: usize = 4;

/// What the caller knows about the request it is about to serve.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SizeHint {
    /// Estimated prompt length in tokens; sizes the context bucket.
    pub prompt_tokens: u32,
    /// Task complexity in `[0, 1]`; drives the quantization level.
    pub task_complexity: f64,
}

impl SizeHint {
    pub fn new(prompt_tokens: u32, task_complexity: f64) -> Self {
        Self {
            prompt_tokens,
            task_complexity,
        }
    }
}

/// Shared cache of loaded model instances.
///
/// Cheap to clone; every clone refers to the same pool. Construct one per
/// process and pass it to every call site.
#[derive(Clone)]
pub struct ResourcePool {
    inner: Arc<PoolInner>,
}

impl std::fmt::Debug for ResourcePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourcePool")
            .field("capacity_mb", &self.inner.capacity_mb)
            .field("backends", &self.inner.backends)
            .finish_non_exhaustive()
    }
}

pub(crate) struct PoolInner {
    capacity_mb: u64,
    load_timeout: Duration,
    max_fallback_attempts: usize,
    policy: WorkingSetPolicy,
    registry: Arc<ModelRegistry>,
    selector: Arc<QuantizationSelector>,
    backends: BackendSet,
    telemetry: Arc<dyn TelemetrySink>,
    state: Mutex<PoolState>,
    counters: Counters,
}

#[derive(Default)]
struct PoolState {
    entries: HashMap<CacheKey, Entry>,
    /// Detached entries whose backend unload has not finished yet.
    evicting: HashMap<u64, Entry>,
    /// At most one running load per logical name.
    inflight: HashMap<String, InFlight>,
    next_token: u64,
    next_detach: u64,
    closed: bool,
}

struct InFlight {
    key: CacheKey,
    outcome: watch::Receiver<Option<LoadOutcome>>,
}

#[derive(Debug, Clone)]
enum LoadOutcome {
    Ready,
    TimedOut(Duration),
    Failed(String),
}

/// An entry detached from the cache, on its way to its backend's `unload`.
struct Victim {
    id: u64,
    key: CacheKey,
    backend: BackendKind,
    model: Option<Arc<dyn LoadedModel>>,
}

struct LoadJob {
    key: CacheKey,
    descriptor: Arc<ModelDescriptor>,
    request: LoadRequest,
    victims: Vec<Victim>,
}

enum Begin {
    Leased(ModelHandle),
    Wait {
        outcome: watch::Receiver<Option<LoadOutcome>>,
        originator: bool,
    },
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Acquire,
    Prefetch,
}

impl ResourcePool {
    pub fn new(
        config: &PoolConfig,
        registry: Arc<ModelRegistry>,
        selector: Arc<QuantizationSelector>,
        backends: BackendSet,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        info!(
            capacity_mb = config.capacity_mb,
            models = registry.len(),
            "resource pool created"
        );
        Self {
            inner: Arc::new(PoolInner {
                capacity_mb: config.capacity_mb,
                load_timeout: Duration::from_secs(config.load_timeout_secs),
                max_fallback_attempts: config.max_fallback_attempts.max(1),
                policy: WorkingSetPolicy::from(config),
                registry,
                selector,
                backends,
                telemetry,
                state: Mutex::new(PoolState::default()),
                counters: Counters::default(),
            }),
        }
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.inner.registry
    }

    pub fn selector(&self) -> &Arc<QuantizationSelector> {
        &self.inner.selector
    }

    pub fn backends(&self) -> &BackendSet {
        &self.inner.backends
    }

    /// Lease a READY instance of `name`, loading it if needed.
    ///
    /// On a load failure the descriptor's fallback chain is tried in order,
    /// up to `max_fallback_attempts` models in total. A failure of the
    /// primary alone is returned as-is; once a fallback was tried the error
    /// is [`StrataError::AllFallbacksExhausted`].
    pub async fn acquire(&self, name: &str, hint: SizeHint) -> Result<ModelHandle, StrataError> {
        let primary = self
            .inner
            .registry
            .get(name)
            .ok_or_else(|| StrataError::InvalidLogicalName {
                name: name.to_string(),
            })?;

        let mut chain = vec![name.to_string()];
        for alternative in &primary.fallback {
            if !chain.contains(alternative) {
                chain.push(alternative.clone());
            }
        }
        chain.truncate(self.inner.max_fallback_attempts);

        let mut attempted = Vec::with_capacity(chain.len());
        let mut last_cause = None;
        for (i, candidate) in chain.into_iter().enumerate() {
            let descriptor = if i == 0 {
                Some(primary.clone())
            } else {
                self.inner.registry.get(&candidate)
            };
            attempted.push(candidate.clone());

            let result = match descriptor {
                Some(descriptor) => self.inner.acquire_from(descriptor, name, hint).await,
                None => Err(StrataError::InvalidLogicalName {
                    name: candidate.clone(),
                }),
            };
            match result {
                Ok(handle) => {
                    if i > 0 {
                        info!(requested = name, served_by = candidate.as_str(), "fallback model used");
                        self.inner.telemetry.emit(TelemetryEvent::FallbackUsed {
                            requested: name.to_string(),
                            served_by: candidate,
                        });
                    }
                    return Ok(handle);
                }
                Err(e) if e.is_load_failure() => {
                    warn!(model = candidate.as_str(), error = %e, "acquire attempt failed");
                    last_cause = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        let last_cause = last_cause
            .unwrap_or_else(|| StrataError::Internal("empty fallback chain".to_string()));
        if attempted.len() == 1 {
            Err(last_cause)
        } else {
            Err(StrataError::AllFallbacksExhausted {
                attempted,
                last_cause: Box::new(last_cause),
            })
        }
    }

    /// Return a lease. Never blocks and never fails.
    pub fn release(&self, handle: ModelHandle) {
        debug!(model = %handle.key(), token = handle.token(), "release");
        handle.release();
    }

    /// Warm `name` in the background.
    ///
    /// Uses the same single-flight machinery as [`acquire`](Self::acquire)
    /// but never takes a lease, never walks the fallback chain, and only
    /// reclaims expired entries to make room. An unused prefetched entry is
    /// COLD and expires on its own.
    pub fn prefetch(&self, name: &str) -> JoinHandle<()> {
        let inner = self.inner.clone();
        let name = name.to_string();
        tokio::spawn(async move {
            let Some(descriptor) = inner.registry.get(&name) else {
                warn!(model = name.as_str(), "prefetch of unknown model ignored");
                return;
            };
            let hint = SizeHint::default();
            match inner.begin(descriptor, &name, hint, false, Mode::Prefetch) {
                Ok(Begin::Wait { mut outcome, .. }) => {
                    let outcome = wait_outcome(&mut outcome).await;
                    debug!(model = name.as_str(), ?outcome, "prefetch finished");
                }
                Ok(_) => debug!(model = name.as_str(), "prefetch not needed"),
                Err(e) => warn!(model = name.as_str(), error = %e, "prefetch failed"),
            }
        })
    }

    /// Read-only view of the cache.
    pub fn stats(&self) -> PoolSnapshot {
        self.inner.snapshot()
    }

    /// Feed a post-inference outcome back into the quantization history.
    pub fn report_outcome(&self, handle: &ModelHandle, success: bool) {
        if let Some(level) = handle.quantization() {
            self.inner
                .selector
                .record_outcome(handle.name(), level, success);
        }
    }

    /// Reclaim every expired, unreferenced entry now. Returns how many were evicted.
    pub async fn sweep(&self) -> usize {
        let victims = {
            let mut state = self.inner.lock();
            self.inner.reclaim_expired(&mut state, Instant::now())
        };
        let count = victims.len();
        self.inner.unload_all(victims).await;
        count
    }

    /// Run [`sweep`](Self::sweep) every `interval` until `cancel` fires.
    ///
    /// Acquire and release already reclaim expired entries, so the sweeper
    /// only shortens how long idle memory stays resident between calls.
    pub fn spawn_sweeper(&self, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let pool = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let evicted = pool.sweep().await;
                        if evicted > 0 {
                            debug!(evicted, "sweep reclaimed expired models");
                        }
                    }
                }
            }
            debug!("sweeper stopped");
        })
    }

    /// Stop admitting acquires and unload every unreferenced entry.
    ///
    /// Leased entries are unloaded when their last lease is returned; loads
    /// still running are unloaded as soon as they finish.
    pub async fn shutdown(&self) -> usize {
        let (victims, busy) = {
            let mut state = self.inner.lock();
            state.closed = true;
            let mut keys: Vec<CacheKey> = state
                .entries
                .values()
                .filter(|e| e.is_evictable())
                .map(|e| e.key.clone())
                .collect();
            keys.sort();
            let victims: Vec<Victim> = keys
                .iter()
                .filter_map(|key| self.inner.detach(&mut state, key, EvictionReason::Shutdown))
                .collect();
            (victims, state.entries.len())
        };

        let count = victims.len();
        info!(unloading = count, still_busy = busy, "resource pool shutting down");
        self.inner.unload_all(victims).await;
        self.inner.backends.shutdown_all().await;
        count
    }
}

impl PoolInner {
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Context bucket a request for `descriptor` must be served from.
    fn target_context(&self, descriptor: &ModelDescriptor, hint: SizeHint) -> u32 {
        if descriptor.is_local() {
            self.selector
                .context_bucket(descriptor, hint.prompt_tokens)
        } else {
            0
        }
    }

    /// Acquire one specific model, without fallback.
    async fn acquire_from(
        self: &Arc<Self>,
        descriptor: Arc<ModelDescriptor>,
        requested: &str,
        hint: SizeHint,
    ) -> Result<ModelHandle, StrataError> {
        let name = descriptor.name.clone();
        let mut waited = false;

        for _ in 0..MAX_LEASE_ROUNDS {
            let (mut outcome, originator) =
                match self.begin(descriptor.clone(), requested, hint, waited, Mode::Acquire)? {
                    Begin::Leased(handle) => return Ok(handle),
                    Begin::Wait {
                        outcome,
                        originator,
                    } => (outcome, originator),
                    Begin::Skipped => {
                        return Err(StrataError::Internal(format!(
                            "acquire of `{name}` was skipped"
                        )));
                    }
                };

            match wait_outcome(&mut outcome).await {
                LoadOutcome::Ready => waited = true,
                LoadOutcome::TimedOut(timeout) => {
                    return Err(StrataError::LoadTimeout { name, timeout });
                }
                LoadOutcome::Failed(reason) if originator => {
                    return Err(StrataError::backend(reason));
                }
                LoadOutcome::Failed(reason) => {
                    return Err(StrataError::ConcurrentLoadAborted { name, reason });
                }
            }
        }

        Err(StrataError::ConcurrentLoadAborted {
            name,
            reason: "instance was evicted before it could be leased".to_string(),
        })
    }

    /// The locked half of acquire and prefetch: lease, join, or start a load.
    fn begin(
        self: &Arc<Self>,
        descriptor: Arc<ModelDescriptor>,
        requested: &str,
        hint: SizeHint,
        waited: bool,
        mode: Mode,
    ) -> Result<Begin, StrataError> {
        let now = Instant::now();
        let target = self.target_context(&descriptor, hint);
        let name = descriptor.name.clone();
        let mut state = self.lock();
        if state.closed {
            return Err(StrataError::Internal("resource pool is shut down".to_string()));
        }

        let mut reclaimed = self.reclaim_expired(&mut state, now);
        let result = self.begin_locked(&mut state, descriptor, requested, hint, target, mode, now);
        drop(state);

        match result {
            Ok((begin, Some(mut job), tx)) => {
                // Unload everything displaced before the new weights come in.
                job.victims.append(&mut reclaimed);
                if let Some(tx) = tx {
                    tokio::spawn(self.clone().run_load(job, tx));
                }
                Ok(begin)
            }
            Ok((begin, None, _)) => {
                self.spawn_unloads(reclaimed);
                if matches!(begin, Begin::Leased(_)) && !waited {
                    Counters::bump(&self.counters.hits);
                    self.telemetry.emit(TelemetryEvent::CacheHit { model: name });
                }
                Ok(begin)
            }
            Err(e) => {
                self.spawn_unloads(reclaimed);
                Err(e)
            }
        }
    }

    #[allow(clippy::too_many_arguments, clippy::type_complexity)]
    fn begin_locked(
        self: &Arc<Self>,
        state: &mut PoolState,
        descriptor: Arc<ModelDescriptor>,
        requested: &str,
        hint: SizeHint,
        target: u32,
        mode: Mode,
        now: Instant,
    ) -> Result<
        (
            Begin,
            Option<LoadJob>,
            Option<watch::Sender<Option<LoadOutcome>>>,
        ),
        StrataError,
    > {
        let name = descriptor.name.as_str();

        if let Some(key) = find_ready(&state.entries, name, target) {
            if mode == Mode::Prefetch {
                return Ok((Begin::Skipped, None, None));
            }
            return match self.lease(state, &key, requested, now) {
                Some(handle) => Ok((Begin::Leased(handle), None, None)),
                None => Err(StrataError::Internal(format!(
                    "READY entry `{key}` has no instance"
                ))),
            };
        }

        if let Some(inflight) = state.inflight.get(name) {
            if mode == Mode::Prefetch {
                return Ok((Begin::Skipped, None, None));
            }
            Counters::bump(&self.counters.coalesced);
            debug!(model = name, loading = %inflight.key, "joining in-flight load");
            return Ok((
                Begin::Wait {
                    outcome: inflight.outcome.clone(),
                    originator: false,
                },
                None,
                None,
            ));
        }

        let used = eviction::used_mb(&state.entries);
        // An acquire may evict idle entries, so only pinned memory is off limits.
        let unavailable = match mode {
            Mode::Acquire => eviction::pinned_mb(&state.entries),
            Mode::Prefetch => used,
        };
        let (quantization, degraded, estimated_mb) = if descriptor.is_local() {
            let decision = self.selector.select(&SelectionRequest {
                descriptor: &descriptor,
                prompt_tokens: hint.prompt_tokens,
                task_complexity: hint.task_complexity,
                available_memory_mb: self.capacity_mb.saturating_sub(unavailable),
            })?;
            (Some(decision.level), decision.degraded, decision.estimated_mb)
        } else {
            (None, false, descriptor.remote_estimate_mb())
        };
        let key = CacheKey::new(name, target);

        let allow_pressure = mode == Mode::Acquire;
        let plan = match eviction::plan(
            &state.entries,
            &self.policy,
            now,
            self.capacity_mb,
            estimated_mb,
            allow_pressure,
        ) {
            Ok(plan) => plan,
            Err(shortfall) if mode == Mode::Prefetch => {
                debug!(
                    model = %key,
                    required_mb = estimated_mb,
                    pinned_mb = shortfall.pinned_mb,
                    "prefetch skipped, no idle memory"
                );
                return Ok((Begin::Skipped, None, None));
            }
            Err(shortfall) => {
                Counters::bump(&self.counters.load_failures);
                let err = StrataError::CapacityExceeded {
                    name: name.to_string(),
                    required_mb: estimated_mb,
                    capacity_mb: self.capacity_mb,
                    pinned_mb: shortfall.pinned_mb,
                };
                warn!(model = %key, error = %err, "cannot admit model");
                self.telemetry.emit(TelemetryEvent::LoadFailed {
                    model: name.to_string(),
                    reason: err.to_string(),
                });
                return Err(err);
            }
        };

        if !plan.is_empty() {
            debug!(
                model = %key,
                expired = plan.expired.len(),
                pressure = plan.pressure.len(),
                "making room"
            );
        }
        let mut victims = Vec::new();
        for victim in &plan.expired {
            victims.extend(self.detach(state, victim, EvictionReason::Expired));
        }
        for victim in &plan.pressure {
            victims.extend(self.detach(state, victim, EvictionReason::Pressure));
        }

        if mode == Mode::Acquire {
            Counters::bump(&self.counters.misses);
            self.telemetry.emit(TelemetryEvent::CacheMiss {
                model: name.to_string(),
            });
        }
        if let (true, Some(level)) = (degraded, quantization) {
            self.telemetry.emit(TelemetryEvent::Degraded {
                model: name.to_string(),
                level,
            });
        }

        state.entries.insert(
            key.clone(),
            Entry::loading(
                key.clone(),
                descriptor.clone(),
                quantization,
                degraded,
                estimated_mb,
                now,
            ),
        );
        let (tx, rx) = watch::channel(None);
        state.inflight.insert(
            name.to_string(),
            InFlight {
                key: key.clone(),
                outcome: rx.clone(),
            },
        );
        debug!(
            model = %key,
            estimated_mb,
            used_mb = used,
            victims = victims.len(),
            "load scheduled"
        );

        let job = LoadJob {
            key: key.clone(),
            request: LoadRequest {
                descriptor: descriptor.clone(),
                quantization,
                context_tokens: key.context_tokens,
            },
            descriptor,
            victims,
        };
        Ok((
            Begin::Wait {
                outcome: rx,
                originator: true,
            },
            Some(job),
            Some(tx),
        ))
    }

    fn lease(
        self: &Arc<Self>,
        state: &mut PoolState,
        key: &CacheKey,
        requested: &str,
        now: Instant,
    ) -> Option<ModelHandle> {
        let token = state.next_token;
        state.next_token += 1;

        let entry = state.entries.get_mut(key)?;
        let model = entry.model.clone()?;
        entry.touch(&self.policy, now);
        entry.leases.insert(token);
        debug!(
            model = %key,
            refcount = entry.refcount(),
            class = %entry.class(&self.policy, now),
            "lease granted"
        );

        Some(ModelHandle::new(
            self.clone(),
            key.clone(),
            token,
            model,
            requested,
            entry.quantization,
            entry.degraded,
        ))
    }

    /// Return one lease. Unknown tokens are logged and otherwise ignored.
    pub(crate) fn release_lease(self: &Arc<Self>, key: &CacheKey, token: u64) {
        let now = Instant::now();
        let victims = {
            let mut state = self.lock();
            let closed = state.closed;
            let mut drained = false;
            match state.entries.get_mut(key) {
                Some(entry) => {
                    if entry.leases.remove(&token) {
                        entry.idle_since = now;
                        drained = entry.is_evictable();
                        debug!(model = %key, refcount = entry.refcount(), "lease returned");
                    } else {
                        warn!(model = %key, token, "release of unknown lease ignored");
                    }
                }
                None => warn!(model = %key, token, "release for unknown entry ignored"),
            }

            let mut victims = self.reclaim_expired(&mut state, now);
            if closed && drained {
                victims.extend(self.detach(&mut state, key, EvictionReason::Shutdown));
            }
            victims
        };
        self.spawn_unloads(victims);
    }

    fn reclaim_expired(&self, state: &mut PoolState, now: Instant) -> Vec<Victim> {
        eviction::expired(&state.entries, &self.policy, now)
            .iter()
            .filter_map(|key| self.detach(state, key, EvictionReason::Expired))
            .collect()
    }

    /// Move an entry out of the cache into the EVICTING set.
    fn detach(&self, state: &mut PoolState, key: &CacheKey, reason: EvictionReason) -> Option<Victim> {
        let mut entry = state.entries.remove(key)?;
        debug_assert!(entry.leases.is_empty(), "leased entry detached");
        entry.state = EntryState::Evicting;

        let id = state.next_detach;
        state.next_detach += 1;
        let victim = Victim {
            id,
            key: key.clone(),
            backend: entry.descriptor.backend,
            model: entry.model.take(),
        };

        Counters::bump(&self.counters.evictions);
        info!(
            model = %key,
            reason = %reason,
            freed_mb = entry.estimated_mb,
            "evicting model"
        );
        self.telemetry.emit(TelemetryEvent::Evicted {
            model: key.name.clone(),
            context_tokens: key.context_tokens,
            freed_mb: entry.estimated_mb,
            reason,
        });
        state.evicting.insert(id, entry);
        Some(victim)
    }

    async fn unload_all(&self, victims: Vec<Victim>) {
        for victim in victims {
            if let Some(model) = victim.model {
                match self.backends.get(victim.backend) {
                    Ok(loader) => {
                        if let Err(e) = loader.unload(model).await {
                            warn!(model = %victim.key, error = %e, "unload failed");
                        }
                    }
                    Err(e) => warn!(model = %victim.key, error = %e, "no loader to unload with"),
                }
            }
            self.lock().evicting.remove(&victim.id);
        }
    }

    /// Unload in the background so release and acquire never wait on I/O.
    fn spawn_unloads(self: &Arc<Self>, victims: Vec<Victim>) {
        if victims.is_empty() {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let inner = self.clone();
                runtime.spawn(async move { inner.unload_all(victims).await });
            }
            Err(_) => {
                warn!(
                    count = victims.len(),
                    "no async runtime, dropping evicted instances without unload"
                );
                let mut state = self.lock();
                for victim in victims {
                    state.evicting.remove(&victim.id);
                }
            }
        }
    }

    async fn run_load(self: Arc<Self>, mut job: LoadJob, tx: watch::Sender<Option<LoadOutcome>>) {
        let guard = LoadGuard {
            inner: self.clone(),
            key: job.key.clone(),
            tx: Some(tx),
        };

        self.unload_all(std::mem::take(&mut job.victims)).await;

        let name = job.key.name.clone();
        info!(
            model = %job.key,
            quantization = ?job.request.quantization,
            "loading model"
        );
        self.telemetry.emit(TelemetryEvent::LoadStarted {
            model: name.clone(),
            context_tokens: job.key.context_tokens,
        });

        let started = Instant::now();
        let result = match self.backends.get(job.descriptor.backend) {
            Err(e) => Err(LoadOutcome::Failed(e.to_string())),
            Ok(loader) => match tokio::time::timeout(self.load_timeout, loader.load(&job.request)).await {
                Ok(Ok(model)) => Ok(model),
                Ok(Err(e)) => Err(LoadOutcome::Failed(e.to_string())),
                Err(_) => Err(LoadOutcome::TimedOut(self.load_timeout)),
            },
        };

        match result {
            Ok(model) => {
                let leftover = guard.complete(model, started.elapsed());
                self.unload_all(leftover).await;
            }
            Err(outcome) => guard.fail(outcome),
        }
    }

    fn snapshot(&self) -> PoolSnapshot {
        let now = Instant::now();
        let state = self.lock();
        let mut entries: Vec<EntrySnapshot> = state
            .entries
            .values()
            .chain(state.evicting.values())
            .map(|entry| {
                let class = entry.class(&self.policy, now);
                EntrySnapshot {
                    name: entry.key.name.clone(),
                    context_tokens: entry.key.context_tokens,
                    backend: entry.descriptor.backend,
                    state: entry.state,
                    quantization: entry.quantization,
                    degraded: entry.degraded,
                    estimated_mb: entry.estimated_mb,
                    refcount: entry.refcount(),
                    class,
                    accesses_in_window: entry.window.count_within(now, self.policy.window),
                    ttl_secs: entry.ttl(&self.policy).as_secs(),
                    idle_secs: entry.idle(now).as_secs_f64(),
                    uptime_secs: entry
                        .loaded_at
                        .map(|at| now.saturating_duration_since(at).as_secs_f64()),
                    expired: entry.is_expired(&self.policy, now),
                }
            })
            .collect();
        entries.sort_by(|a, b| {
            a.name
                .cmp(&b.name)
                .then(a.context_tokens.cmp(&b.context_tokens))
        });

        let reserved_mb = state
            .entries
            .values()
            .filter(|e| e.state == EntryState::Loading)
            .map(|e| e.estimated_mb)
            .sum();
        PoolSnapshot {
            capacity_mb: self.capacity_mb,
            used_mb: eviction::used_mb(&state.entries),
            reserved_mb,
            entries,
            counters: self.counters.snapshot(),
        }
    }
}

/// Clears the LOADING slot however the load task ends, panics included.
struct LoadGuard {
    inner: Arc<PoolInner>,
    key: CacheKey,
    tx: Option<watch::Sender<Option<LoadOutcome>>>,
}

impl LoadGuard {
    /// Promote the entry to READY. Returns instances that must be unloaded
    /// instead because the pool shut down meanwhile.
    fn complete(mut self, model: Arc<dyn LoadedModel>, latency: Duration) -> Vec<Victim> {
        let inner = self.inner.clone();
        let mut leftover = Vec::new();
        {
            let mut state = inner.lock();
            state.inflight.remove(&self.key.name);
            let closed = state.closed;
            let now = Instant::now();
            match state.entries.get_mut(&self.key) {
                Some(entry) => {
                    entry.state = EntryState::Ready;
                    entry.model = Some(model);
                    entry.loaded_at = Some(now);
                    entry.idle_since = now;
                    entry.last_access = now;
                }
                None => {
                    warn!(model = %self.key, "loaded model lost its slot");
                    leftover.push(Victim {
                        id: u64::MAX,
                        key: self.key.clone(),
                        backend: model.backend(),
                        model: Some(model),
                    });
                }
            }
            if closed {
                leftover.extend(inner.detach(&mut state, &self.key, EvictionReason::Shutdown));
            }
        }

        Counters::bump(&inner.counters.loads);
        info!(
            model = %self.key,
            latency_ms = latency.as_millis() as u64,
            "model loaded"
        );
        inner.telemetry.emit(TelemetryEvent::LoadCompleted {
            model: self.key.name.clone(),
            context_tokens: self.key.context_tokens,
            latency,
        });
        self.notify(LoadOutcome::Ready);
        leftover
    }

    fn fail(mut self, outcome: LoadOutcome) {
        let reason = match &outcome {
            LoadOutcome::TimedOut(timeout) => format!("timed out after {timeout:?}"),
            LoadOutcome::Failed(reason) => reason.clone(),
            LoadOutcome::Ready => "ready".to_string(),
        };
        self.abandon(&reason);
        self.notify(outcome);
    }

    fn abandon(&self, reason: &str) {
        {
            let mut state = self.inner.lock();
            state.inflight.remove(&self.key.name);
            state.entries.remove(&self.key);
        }
        Counters::bump(&self.inner.counters.load_failures);
        warn!(model = %self.key, reason, "model load failed");
        self.inner.telemetry.emit(TelemetryEvent::LoadFailed {
            model: self.key.name.clone(),
            reason: reason.to_string(),
        });
    }

    fn notify(&mut self, outcome: LoadOutcome) {
        if let Some(tx) = self.tx.take() {
            // Every waiter may have given up already.
            let _ = tx.send(Some(outcome));
        }
    }
}

impl Drop for LoadGuard {
    fn drop(&mut self) {
        if self.tx.is_some() {
            self.abandon("load task ended before reporting");
            self.notify(LoadOutcome::Failed(
                "load task ended before reporting".to_string(),
            ));
        }
    }
}

async fn wait_outcome(outcome: &mut watch::Receiver<Option<LoadOutcome>>) -> LoadOutcome {
    match outcome.wait_for(Option::is_some).await {
        Ok(value) => value
            .clone()
            .unwrap_or_else(|| LoadOutcome::Failed("empty load outcome".to_string())),
        Err(_) => LoadOutcome::Failed("load task ended before reporting".to_string()),
    }
}

/// Smallest READY context bucket of `name` that is at least `target`.
fn find_ready(entries: &HashMap<CacheKey, Entry>, name: &str, target: u32) -> Option<CacheKey> {
    entries
        .values()
        .filter(|e| e.is_ready() && e.key.name == name && e.key.context_tokens >= target)
        .min_by_key(|e| e.key.context_tokens)
        .map(|e| e.key.clone())
}
