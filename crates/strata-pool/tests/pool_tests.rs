// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the resource pool against a scripted loader.

use std::sync::Arc;
use std::time::Duration;

use strata_config::model::{PoolConfig, QuantizationConfig};
use strata_core::{
    EvictionReason, ModelDescriptor, ModelLoader, QuantLevel, StrataError, TelemetryEvent,
};
use strata_pool::{
    BackendSet, EntryState, ModelRegistry, ResourcePool, SizeHint, WorkingSetClass,
};
use strata_quant::QuantizationSelector;
use strata_test_utils::{
    local_model, remote_model, with_fallback, MockLoader, RecordingTelemetry,
};

struct Fixture {
    pool: ResourcePool,
    loader: Arc<MockLoader>,
    telemetry: Arc<RecordingTelemetry>,
}

fn fixture(config: PoolConfig, models: Vec<ModelDescriptor>, loader: MockLoader) -> Fixture {
    let loader = Arc::new(loader);
    let telemetry = Arc::new(RecordingTelemetry::new());
    let dyn_loader: Arc<dyn ModelLoader> = loader.clone();
    let pool = ResourcePool::new(
        &config,
        Arc::new(ModelRegistry::new(models)),
        Arc::new(QuantizationSelector::new(QuantizationConfig::default())),
        BackendSet::new().with(dyn_loader),
        telemetry.clone(),
    );
    Fixture {
        pool,
        loader,
        telemetry,
    }
}

fn capacity(capacity_mb: u64) -> PoolConfig {
    PoolConfig {
        capacity_mb,
        ..PoolConfig::default()
    }
}

/// The three-model registry most tests use, all remote so sizes are exact.
fn remote_registry() -> Vec<ModelDescriptor> {
    vec![
        remote_model("tiny", 100),
        with_fallback(remote_model("expert_short", 300), &["tiny"]),
        with_fallback(remote_model("expert_long", 500), &["expert_short", "tiny"]),
    ]
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

#[tokio::test(start_paused = true)]
async fn miss_on_empty_pool_loads_and_leases() {
    let f = fixture(capacity(1000), remote_registry(), MockLoader::remote());

    let handle = f.pool.acquire("tiny", SizeHint::default()).await.unwrap();
    assert_eq!(handle.name(), "tiny");
    assert!(!handle.is_fallback());

    let stats = f.pool.stats();
    assert_eq!(stats.entries.len(), 1);
    let entry = stats.entry("tiny").unwrap();
    assert_eq!(entry.state, EntryState::Ready);
    assert_eq!(entry.refcount, 1);
    assert_eq!(stats.used_mb, 100);
    assert_eq!(stats.counters.misses, 1);
    assert_eq!(stats.counters.hits, 0);
    assert_eq!(f.loader.load_count("tiny"), 1);
    assert_eq!(
        f.telemetry.count(|e| matches!(e, TelemetryEvent::LoadCompleted { .. })),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn concurrent_acquires_share_one_load() {
    let f = fixture(
        capacity(1000),
        remote_registry(),
        MockLoader::remote().with_delay(Duration::from_secs(2)),
    );

    let (a, b) = tokio::join!(
        f.pool.acquire("expert_long", SizeHint::default()),
        f.pool.acquire("expert_long", SizeHint::default()),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(f.loader.load_count("expert_long"), 1);
    assert_eq!(f.loader.max_concurrent("expert_long"), 1);
    assert_eq!(a.instance_id(), b.instance_id());
    let stats = f.pool.stats();
    assert_eq!(stats.entry("expert_long").unwrap().refcount, 2);
    assert_eq!(stats.counters.misses, 1);
    assert_eq!(stats.counters.coalesced, 1);
}

#[tokio::test(start_paused = true)]
async fn many_waiters_never_overlap_loads() {
    let f = fixture(
        capacity(1000),
        remote_registry(),
        MockLoader::remote().with_delay(Duration::from_secs(1)),
    );

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let pool = f.pool.clone();
        tasks.push(tokio::spawn(async move {
            pool.acquire("expert_short", SizeHint::default()).await
        }));
    }
    let mut handles = Vec::new();
    for task in tasks {
        handles.push(task.await.unwrap().unwrap());
    }

    assert_eq!(f.loader.load_count("expert_short"), 1);
    assert_eq!(f.loader.max_concurrent("expert_short"), 1);
    assert_eq!(f.pool.stats().entry("expert_short").unwrap().refcount, 8);
    drop(handles);
    assert_eq!(f.pool.stats().entry("expert_short").unwrap().refcount, 0);
}

#[tokio::test(start_paused = true)]
async fn hot_entry_keeps_five_minute_ttl_then_expires() {
    let f = fixture(capacity(1000), remote_registry(), MockLoader::remote());

    for _ in 0..3 {
        let handle = f.pool.acquire("expert_short", SizeHint::default()).await.unwrap();
        f.pool.release(handle);
        tokio::time::advance(Duration::from_secs(10)).await;
    }
    let entry = f.pool.stats().entry("expert_short").cloned().unwrap();
    assert_eq!(entry.class, WorkingSetClass::Hot);
    assert_eq!(entry.ttl_secs, 300);
    assert!(!entry.expired);

    tokio::time::advance(Duration::from_secs(301)).await;
    assert!(f.pool.stats().entry("expert_short").unwrap().expired);

    let _tiny = f.pool.acquire("tiny", SizeHint::default()).await.unwrap();
    assert!(f.pool.stats().entry("expert_short").is_none());
    assert_eq!(f.loader.unloads().len(), 1);
    assert_eq!(
        f.telemetry.count(|e| matches!(
            e,
            TelemetryEvent::Evicted {
                reason: EvictionReason::Expired,
                ..
            }
        )),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn spread_accesses_earn_the_full_hot_ttl() {
    let f = fixture(capacity(1000), remote_registry(), MockLoader::remote());

    for _ in 0..3 {
        drop(f.pool.acquire("expert_short", SizeHint::default()).await.unwrap());
        tokio::time::advance(Duration::from_secs(40)).await;
    }
    // Idle since the third access at t=80. The first access has left the
    // window, but the entry keeps the TTL it earned while HOT.
    tokio::time::advance(Duration::from_secs(190)).await;
    let entry = f.pool.stats().entry("expert_short").cloned().unwrap();
    assert_eq!(entry.class, WorkingSetClass::Warm);
    assert_eq!(entry.ttl_secs, 300);
    assert!(!entry.expired);
    assert_eq!(f.pool.sweep().await, 0);

    tokio::time::advance(Duration::from_secs(70)).await;
    assert_eq!(f.pool.sweep().await, 1);
    assert!(f.pool.stats().entry("expert_short").is_none());
}

#[tokio::test(start_paused = true)]
async fn sweep_reclaims_cold_entries() {
    let f = fixture(capacity(1000), remote_registry(), MockLoader::remote());
    let handle = f.pool.acquire("tiny", SizeHint::default()).await.unwrap();
    drop(handle);

    tokio::time::advance(Duration::from_secs(10)).await;
    assert_eq!(f.pool.sweep().await, 0);

    // Accessed once, 70s ago: COLD now, past the 45s WARM TTL it earned.
    tokio::time::advance(Duration::from_secs(60)).await;
    assert_eq!(
        f.pool.stats().entry("tiny").unwrap().class,
        WorkingSetClass::Cold
    );
    assert_eq!(f.pool.sweep().await, 1);
    assert!(f.pool.stats().entries.is_empty());
    assert_eq!(f.loader.resident(), 0);
}

#[tokio::test(start_paused = true)]
async fn leased_entries_survive_ttl_and_pressure() {
    let f = fixture(
        capacity(1000),
        vec![remote_model("a", 600), remote_model("b", 600)],
        MockLoader::remote(),
    );

    let held = f.pool.acquire("a", SizeHint::default()).await.unwrap();
    tokio::time::advance(Duration::from_secs(3600)).await;
    assert_eq!(f.pool.sweep().await, 0);

    let err = f.pool.acquire("b", SizeHint::default()).await.unwrap_err();
    match err {
        StrataError::CapacityExceeded {
            required_mb,
            capacity_mb,
            pinned_mb,
            ..
        } => {
            assert_eq!(required_mb, 600);
            assert_eq!(capacity_mb, 1000);
            assert_eq!(pinned_mb, 600);
        }
        other => panic!("expected CapacityExceeded, got {other}"),
    }
    assert_eq!(f.pool.stats().entry("a").unwrap().refcount, 1);
    assert_eq!(f.loader.load_count("b"), 0);
    drop(held);
}

#[tokio::test(start_paused = true)]
async fn pressure_evicts_least_recently_used_idle_entry() {
    let f = fixture(
        capacity(1000),
        vec![
            remote_model("a", 400),
            remote_model("b", 400),
            remote_model("c", 400),
        ],
        MockLoader::remote(),
    );

    let a = f.pool.acquire("a", SizeHint::default()).await.unwrap();
    let a_instance = a.instance_id().to_string();
    drop(a);
    tokio::time::advance(Duration::from_secs(1)).await;
    drop(f.pool.acquire("b", SizeHint::default()).await.unwrap());
    tokio::time::advance(Duration::from_secs(1)).await;

    let _c = f.pool.acquire("c", SizeHint::default()).await.unwrap();
    let stats = f.pool.stats();
    assert!(stats.entry("a").is_none());
    assert!(stats.entry("b").is_some());
    assert!(stats.used_mb <= stats.capacity_mb);
    assert_eq!(f.loader.unloads(), vec![a_instance]);
    assert_eq!(
        f.telemetry.count(|e| matches!(
            e,
            TelemetryEvent::Evicted {
                reason: EvictionReason::Pressure,
                ..
            }
        )),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn used_memory_never_exceeds_capacity() {
    let models: Vec<_> = (0..6)
        .map(|i| remote_model(&format!("m{i}"), 150 + 50 * i))
        .collect();
    let f = fixture(capacity(1000), models, MockLoader::remote());

    for round in 0..30u64 {
        let name = format!("m{}", (round * 7) % 6);
        let handle = f.pool.acquire(&name, SizeHint::default()).await.unwrap();
        let stats = f.pool.stats();
        assert!(
            stats.used_mb <= stats.capacity_mb,
            "round {round}: {} > {}",
            stats.used_mb,
            stats.capacity_mb
        );
        drop(handle);
        tokio::time::advance(Duration::from_secs(1)).await;
    }
}

#[tokio::test(start_paused = true)]
async fn failed_primary_falls_back_in_order() {
    let f = fixture(capacity(1000), remote_registry(), MockLoader::remote());
    f.loader.fail("expert_long", "endpoint unreachable");

    let handle = f.pool.acquire("expert_long", SizeHint::default()).await.unwrap();
    assert_eq!(handle.name(), "expert_short");
    assert_eq!(handle.requested(), "expert_long");
    assert!(handle.is_fallback());
    assert!(f.pool.stats().entry("expert_long").is_none());
    assert!(f.telemetry.events().contains(&TelemetryEvent::FallbackUsed {
        requested: "expert_long".into(),
        served_by: "expert_short".into(),
    }));
}

#[tokio::test(start_paused = true)]
async fn exhausted_chain_reports_every_attempt() {
    let f = fixture(capacity(1000), remote_registry(), MockLoader::remote());
    for name in ["expert_long", "expert_short", "tiny"] {
        f.loader.fail(name, "down");
    }

    let err = f.pool.acquire("expert_long", SizeHint::default()).await.unwrap_err();
    match err {
        StrataError::AllFallbacksExhausted {
            attempted,
            last_cause,
        } => {
            assert_eq!(attempted, vec!["expert_long", "expert_short", "tiny"]);
            assert!(matches!(*last_cause, StrataError::Backend { .. }));
        }
        other => panic!("expected AllFallbacksExhausted, got {other}"),
    }
    assert_eq!(f.pool.stats().counters.load_failures, 3);
    assert!(f.pool.stats().entries.is_empty());
}

#[tokio::test(start_paused = true)]
async fn fallback_attempts_are_capped() {
    let config = PoolConfig {
        max_fallback_attempts: 2,
        ..capacity(1000)
    };
    let f = fixture(config, remote_registry(), MockLoader::remote());
    f.loader.fail("expert_long", "down");
    f.loader.fail("expert_short", "down");

    let err = f.pool.acquire("expert_long", SizeHint::default()).await.unwrap_err();
    assert!(matches!(
        err,
        StrataError::AllFallbacksExhausted { ref attempted, .. } if attempted.len() == 2
    ));
    assert_eq!(f.loader.load_count("tiny"), 0);
}

#[tokio::test(start_paused = true)]
async fn primary_without_fallback_returns_raw_error() {
    let f = fixture(capacity(1000), remote_registry(), MockLoader::remote());
    f.loader.fail("tiny", "weights corrupt");

    let err = f.pool.acquire("tiny", SizeHint::default()).await.unwrap_err();
    assert!(
        matches!(err, StrataError::Backend { ref message, .. } if message.contains("weights corrupt"))
    );

    f.loader.heal("tiny");
    assert!(f.pool.acquire("tiny", SizeHint::default()).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn hung_load_times_out_and_falls_back() {
    let config = PoolConfig {
        load_timeout_secs: 5,
        ..capacity(1000)
    };
    let f = fixture(config, remote_registry(), MockLoader::remote());
    f.loader.hang("tiny");
    f.loader.hang("expert_long");

    let err = f.pool.acquire("tiny", SizeHint::default()).await.unwrap_err();
    assert!(matches!(err, StrataError::LoadTimeout { ref name, timeout }
        if name == "tiny" && timeout == Duration::from_secs(5)));

    let handle = f.pool.acquire("expert_long", SizeHint::default()).await.unwrap();
    assert_eq!(handle.name(), "expert_short");
    assert!(f.pool.stats().entry("expert_long").is_none());
}

#[tokio::test(start_paused = true)]
async fn coalesced_waiters_see_the_load_abort() {
    let loader = MockLoader::remote().with_delay(Duration::from_secs(1));
    loader.fail("tiny", "out of file descriptors");
    let f = fixture(capacity(1000), remote_registry(), loader);

    let (a, b) = tokio::join!(
        f.pool.acquire("tiny", SizeHint::default()),
        f.pool.acquire("tiny", SizeHint::default()),
    );
    let errors = [a.unwrap_err(), b.unwrap_err()];
    assert!(errors.iter().any(|e| matches!(e, StrataError::Backend { .. })));
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, StrataError::ConcurrentLoadAborted { .. }))
    );
    assert_eq!(f.loader.load_count("tiny"), 1);
}

#[tokio::test(start_paused = true)]
async fn abandoned_caller_does_not_cancel_the_load() {
    let f = fixture(
        capacity(1000),
        remote_registry(),
        MockLoader::remote().with_delay(Duration::from_secs(10)),
    );

    let pool = f.pool.clone();
    let caller = tokio::spawn(async move { pool.acquire("tiny", SizeHint::default()).await });
    tokio::time::sleep(Duration::from_secs(1)).await;
    caller.abort();
    assert_eq!(
        f.pool.stats().entry("tiny").unwrap().state,
        EntryState::Loading
    );

    tokio::time::sleep(Duration::from_secs(10)).await;
    let entry = f.pool.stats().entry("tiny").cloned().unwrap();
    assert_eq!(entry.state, EntryState::Ready);
    assert_eq!(entry.refcount, 0);
    assert_eq!(f.loader.load_count("tiny"), 1);
}

#[tokio::test(start_paused = true)]
async fn larger_context_loads_a_separate_entry() {
    let expert = local_model(
        "expert_short",
        &[
            (QuantLevel::Q2K, 2600),
            (QuantLevel::Q4KM, 4100),
            (QuantLevel::Q8_0, 7700),
        ],
        128,
        &[2048, 8192],
    );
    let f = fixture(capacity(16384), vec![expert], MockLoader::local());

    let short = f
        .pool
        .acquire("expert_short", SizeHint::new(100, 0.0))
        .await
        .unwrap();
    assert_eq!(short.context_tokens(), 2048);
    assert_eq!(short.quantization(), Some(QuantLevel::Q2K));

    let long = f
        .pool
        .acquire("expert_short", SizeHint::new(4000, 0.0))
        .await
        .unwrap();
    assert_eq!(long.context_tokens(), 8192);
    assert_eq!(long.quantization(), Some(QuantLevel::Q4KM));
    assert_ne!(short.instance_id(), long.instance_id());
    assert_eq!(f.loader.load_count("expert_short"), 2);

    // A mid-sized prompt reuses the smallest bucket that fits it.
    let mid = f
        .pool
        .acquire("expert_short", SizeHint::new(1000, 0.0))
        .await
        .unwrap();
    assert_eq!(mid.context_tokens(), 2048);
    assert_eq!(mid.instance_id(), short.instance_id());

    let stats = f.pool.stats();
    assert_eq!(stats.ready(), 2);
    assert_eq!(stats.used_mb, 2600 + 263 + 4100 + 1049);
}

#[tokio::test(start_paused = true)]
async fn degraded_selection_is_reported() {
    let expert = local_model(
        "expert_short",
        &[(QuantLevel::Q4KM, 4100), (QuantLevel::F16, 14000)],
        0,
        &[4096],
    );
    let f = fixture(capacity(8192), vec![expert], MockLoader::local());

    let handle = f
        .pool
        .acquire("expert_short", SizeHint::new(100, 0.7))
        .await
        .unwrap();
    assert_eq!(handle.quantization(), Some(QuantLevel::Q4KM));
    assert!(handle.degraded());
    assert_eq!(
        f.telemetry.count(|e| matches!(e, TelemetryEvent::Degraded { .. })),
        1
    );
}

/// A 10 GB pool with one local model and one remote model of `remote_mb`.
fn mixed_fixture(remote: &str, remote_mb: u64) -> (Fixture, Arc<MockLoader>) {
    let local = Arc::new(MockLoader::local());
    let local_dyn: Arc<dyn ModelLoader> = local.clone();
    let remote_loader = Arc::new(MockLoader::remote());
    let remote_dyn: Arc<dyn ModelLoader> = remote_loader.clone();
    let telemetry = Arc::new(RecordingTelemetry::new());
    let expert = local_model(
        "expert",
        &[(QuantLevel::Q2K, 1000), (QuantLevel::F16, 5000)],
        0,
        &[4096],
    );
    let pool = ResourcePool::new(
        &capacity(10000),
        Arc::new(ModelRegistry::new(vec![remote_model(remote, remote_mb), expert])),
        Arc::new(QuantizationSelector::new(QuantizationConfig::default())),
        BackendSet::new().with(local_dyn).with(remote_dyn),
        telemetry.clone(),
    );
    let fixture = Fixture {
        pool,
        loader: local,
        telemetry,
    };
    (fixture, remote_loader)
}

#[tokio::test(start_paused = true)]
async fn idle_memory_is_reclaimed_before_quality_drops() {
    let (f, remote) = mixed_fixture("idle", 6000);

    drop(f.pool.acquire("idle", SizeHint::default()).await.unwrap());
    tokio::time::advance(Duration::from_secs(1)).await;

    let handle = f.pool.acquire("expert", SizeHint::new(900, 0.8)).await.unwrap();
    assert_eq!(handle.quantization(), Some(QuantLevel::F16));
    assert!(!handle.degraded());
    assert!(f.pool.stats().entry("idle").is_none());
    assert_eq!(remote.unloads().len(), 1);
    assert_eq!(f.loader.load_count("expert"), 1);
    assert_eq!(
        f.telemetry.count(|e| matches!(e, TelemetryEvent::Degraded { .. })),
        0
    );
    assert_eq!(
        f.telemetry.count(|e| matches!(
            e,
            TelemetryEvent::Evicted {
                reason: EvictionReason::Pressure,
                ..
            }
        )),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn leased_memory_still_limits_quality() {
    let (f, _remote) = mixed_fixture("busy", 6000);

    let _busy = f.pool.acquire("busy", SizeHint::default()).await.unwrap();
    let handle = f.pool.acquire("expert", SizeHint::new(900, 0.8)).await.unwrap();
    assert_eq!(handle.quantization(), Some(QuantLevel::Q2K));
    assert!(handle.degraded());
    assert_eq!(f.pool.stats().entry("busy").unwrap().refcount, 1);
}

#[tokio::test(start_paused = true)]
async fn outcomes_feed_quantization_history() {
    let tiny = local_model("tiny", &[(QuantLevel::Q4KM, 900)], 16, &[2048]);
    let f = fixture(capacity(4096), vec![tiny], MockLoader::local());

    let handle = f.pool.acquire("tiny", SizeHint::default()).await.unwrap();
    f.pool.report_outcome(&handle, true);
    f.pool.report_outcome(&handle, false);

    let history = f.pool.selector().history("tiny");
    let stats = history.get(&QuantLevel::Q4KM).unwrap();
    assert_eq!(stats.samples, 2);
    assert!(stats.ema < 1.0);
}

#[tokio::test(start_paused = true)]
async fn prefetch_warms_without_leasing() {
    let f = fixture(capacity(1000), remote_registry(), MockLoader::remote());

    f.pool.prefetch("tiny").await.unwrap();
    let entry = f.pool.stats().entry("tiny").cloned().unwrap();
    assert_eq!(entry.state, EntryState::Ready);
    assert_eq!(entry.refcount, 0);
    assert_eq!(entry.class, WorkingSetClass::Cold);
    assert_eq!(f.pool.stats().counters.misses, 0);

    let _handle = f.pool.acquire("tiny", SizeHint::default()).await.unwrap();
    let stats = f.pool.stats();
    assert_eq!(stats.counters.hits, 1);
    assert_eq!(f.loader.load_count("tiny"), 1);
}

#[tokio::test(start_paused = true)]
async fn prefetch_never_evicts_live_entries() {
    let f = fixture(
        capacity(1000),
        vec![remote_model("big", 900), remote_model("small", 300)],
        MockLoader::remote(),
    );
    drop(f.pool.acquire("big", SizeHint::default()).await.unwrap());

    f.pool.prefetch("small").await.unwrap();
    assert_eq!(f.loader.load_count("small"), 0);
    assert!(f.pool.stats().entry("big").is_some());

    f.pool.prefetch("unknown").await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn unused_prefetch_expires_quickly() {
    let f = fixture(capacity(1000), remote_registry(), MockLoader::remote());
    f.pool.prefetch("tiny").await.unwrap();

    tokio::time::advance(Duration::from_secs(16)).await;
    assert_eq!(f.pool.sweep().await, 1);
    assert!(f.pool.stats().entries.is_empty());
}

#[tokio::test(start_paused = true)]
async fn registry_reload_admits_new_models() {
    let f = fixture(capacity(1000), vec![remote_model("tiny", 100)], MockLoader::remote());
    assert!(matches!(
        f.pool.acquire("fresh", SizeHint::default()).await,
        Err(StrataError::InvalidLogicalName { .. })
    ));

    let diff = f
        .pool
        .registry()
        .reload(vec![remote_model("tiny", 100), remote_model("fresh", 50)]);
    assert_eq!(diff.added, vec!["fresh"]);
    assert!(f.pool.acquire("fresh", SizeHint::default()).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn shutdown_unloads_idle_now_and_leased_on_release() {
    let f = fixture(capacity(1000), remote_registry(), MockLoader::remote());
    drop(f.pool.acquire("tiny", SizeHint::default()).await.unwrap());
    let held = f.pool.acquire("expert_short", SizeHint::default()).await.unwrap();

    assert_eq!(f.pool.shutdown().await, 1);
    assert_eq!(f.loader.unloads().len(), 1);
    assert!(f.pool.acquire("tiny", SizeHint::default()).await.is_err());

    drop(held);
    settle().await;
    assert_eq!(f.loader.unloads().len(), 2);
    assert_eq!(f.loader.resident(), 0);
    assert!(f.pool.stats().entries.is_empty());
}

#[tokio::test(start_paused = true)]
async fn sweeper_runs_until_cancelled() {
    let f = fixture(capacity(1000), remote_registry(), MockLoader::remote());
    let cancel = tokio_util::sync::CancellationToken::new();
    let sweeper = f.pool.spawn_sweeper(Duration::from_secs(5), cancel.clone());

    drop(f.pool.acquire("tiny", SizeHint::default()).await.unwrap());
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(f.pool.stats().entry("tiny").is_some());

    // Past the WARM recency window the entry is COLD and long expired.
    tokio::time::sleep(Duration::from_secs(40)).await;
    assert!(f.pool.stats().entries.is_empty());

    cancel.cancel();
    sweeper.await.unwrap();
}
