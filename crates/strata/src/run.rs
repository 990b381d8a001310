// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `strata run` command implementation.
//!
//! Assembles the pool and router from configuration, warms the configured
//! prefetch list, starts the sweeper and registry watcher, and logs pool
//! statistics until a shutdown signal arrives.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use strata_config::watcher::DEFAULT_DEBOUNCE;
use strata_config::{RegistryWatcher, StrataConfig};
use strata_core::{NoopTelemetry, StrataError, TelemetrySink, Tier};
use strata_pool::{BackendSet, ModelRegistry, ResourcePool};
use strata_quant::QuantizationSelector;
use strata_router::{build_scorer, ConfidenceRouter, ScorerCapabilities};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::shutdown;

/// How often pool statistics are logged and exported.
const STATS_INTERVAL: Duration = Duration::from_secs(30);

/// The pool and router built from one configuration.
pub struct Runtime {
    pub pool: ResourcePool,
    pub router: ConfidenceRouter,
}

/// Build the pool and router.
pub fn assemble(
    config: &StrataConfig,
    backends: BackendSet,
    telemetry: Arc<dyn TelemetrySink>,
) -> Runtime {
    let registry = Arc::new(ModelRegistry::new(config.models.clone()));
    let selector = Arc::new(QuantizationSelector::new(config.quantization.clone()));
    let pool = ResourcePool::new(&config.pool, registry, selector, backends, telemetry.clone());

    let scorer = build_scorer(&config.routing.scorer, ScorerCapabilities::default());
    let router = ConfidenceRouter::new(config.routing.clone(), scorer, telemetry);

    Runtime { pool, router }
}

/// Run the pool until SIGINT/SIGTERM, then shut it down.
pub async fn run(config: StrataConfig, config_path: Option<PathBuf>) -> Result<(), StrataError> {
    info!("starting strata run");

    #[cfg(feature = "prometheus")]
    let prometheus = if config.telemetry.prometheus {
        Some(strata_prometheus::PrometheusAdapter::new()?)
    } else {
        None
    };
    #[cfg(feature = "prometheus")]
    let telemetry: Arc<dyn TelemetrySink> = match &prometheus {
        Some(adapter) => {
            info!("prometheus metrics enabled");
            Arc::new(adapter.sink())
        }
        None => Arc::new(NoopTelemetry),
    };
    #[cfg(not(feature = "prometheus"))]
    let telemetry: Arc<dyn TelemetrySink> = {
        if config.telemetry.prometheus {
            warn!("telemetry.prometheus is set but this build has no prometheus support");
        }
        Arc::new(NoopTelemetry)
    };

    let Runtime { pool, router } = assemble(&config, BackendSet::builtin(), telemetry);
    info!(
        fast = router.model_for_tier(Tier::Fast),
        balanced = router.model_for_tier(Tier::Balanced),
        deep = router.model_for_tier(Tier::Deep),
        scorer = router.scorer().name(),
        "router ready"
    );

    let cancel = shutdown::install_signal_handler();

    for name in &config.pool.prefetch {
        pool.prefetch(name);
    }
    if !config.pool.prefetch.is_empty() {
        info!(models = ?config.pool.prefetch, "prefetch started");
    }

    let sweeper = config.pool.sweep_interval_secs.map(|secs| {
        info!(interval_secs = secs, "expiry sweeper started");
        pool.spawn_sweeper(Duration::from_secs(secs), cancel.child_token())
    });

    // Dropping the watcher stops it, so keep it for the whole run.
    let _watcher = match config_path {
        Some(path) => Some(watch_registry(&pool, path, cancel.child_token())?),
        None => {
            info!("no --config given, registry hot reload disabled");
            None
        }
    };

    let mut ticker = tokio::time::interval(STATS_INTERVAL);
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => log_stats(&pool),
        }
    }

    if let Some(sweeper) = sweeper {
        let _ = sweeper.await;
    }
    let unloaded = pool.shutdown().await;
    info!(
        unloaded,
        sessions = router.session_count(),
        "strata run shutdown complete"
    );

    #[cfg(feature = "prometheus")]
    if let Some(adapter) = &prometheus {
        // No HTTP exporter is served; the final scrape goes to stdout.
        print!("{}", adapter.render());
    }

    Ok(())
}

/// Apply every validated config reload to the pool's registry.
fn watch_registry(
    pool: &ResourcePool,
    path: PathBuf,
    cancel: CancellationToken,
) -> Result<RegistryWatcher, StrataError> {
    let (watcher, mut reloads) = RegistryWatcher::spawn(path, DEFAULT_DEBOUNCE)
        .map_err(|e| StrataError::Config(e.to_string()))?;

    let registry = pool.registry().clone();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                reload = reloads.recv() => match reload {
                    Ok(config) => {
                        let diff = registry.reload(config.models.clone());
                        if diff.is_empty() {
                            debug!("config reloaded without registry changes");
                        } else {
                            info!(
                                added = ?diff.added,
                                removed = ?diff.removed,
                                changed = ?diff.changed,
                                "model registry reloaded"
                            );
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "registry reloads skipped, applying the latest");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
        debug!("registry reload task stopped");
    });

    Ok(watcher)
}

fn log_stats(pool: &ResourcePool) {
    let stats = pool.stats();
    let ready = stats.ready();
    info!(
        used_mb = stats.used_mb,
        reserved_mb = stats.reserved_mb,
        capacity_mb = stats.capacity_mb,
        ready,
        hits = stats.counters.hits,
        misses = stats.counters.misses,
        evictions = stats.counters.evictions,
        heap_mb = heap_allocated_mb(),
        "pool stats"
    );

    #[cfg(feature = "prometheus")]
    {
        strata_prometheus::set_pool_memory(stats.used_mb, stats.capacity_mb);
        strata_prometheus::set_ready_entries(ready);
    }
}

/// Process heap reported by jemalloc, in MB.
#[cfg(not(target_env = "msvc"))]
fn heap_allocated_mb() -> Option<u64> {
    // Stats are cached until the epoch advances.
    tikv_jemalloc_ctl::epoch::advance().ok()?;
    let allocated = tikv_jemalloc_ctl::stats::allocated::read().ok()?;
    Some(allocated as u64 / (1024 * 1024))
}

#[cfg(target_env = "msvc")]
fn heap_allocated_mb() -> Option<u64> {
    None
}

#[cfg(test)]
mod tests {
    use strata_config::RoutingConfig;
    use strata_core::QuantLevel;
    use strata_pool::SizeHint;
    use strata_test_utils::{local_model, remote_model, MockLoader, RecordingTelemetry};

    use super::*;

    fn config() -> StrataConfig {
        StrataConfig {
            models: vec![
                local_model("tiny", &[(QuantLevel::Q4KM, 700)], 64, &[2048]),
                remote_model("expert_short", 300),
                remote_model("expert_long", 500),
            ],
            routing: RoutingConfig {
                fast_model: "tiny".into(),
                balanced_model: "expert_short".into(),
                deep_model: "expert_long".into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn assembled_router_picks_models_the_pool_can_serve() {
        let local = Arc::new(MockLoader::local());
        let remote = Arc::new(MockLoader::remote());
        let telemetry = Arc::new(RecordingTelemetry::new());
        let backends = BackendSet::new().with(local.clone()).with(remote.clone());
        let Runtime { pool, router } = assemble(&config(), backends, telemetry.clone());

        let decision = router.route(0.8, false, None);
        let handle = pool
            .acquire(&decision.logical_model, SizeHint::new(100, 0.2))
            .await
            .unwrap();
        assert_eq!(handle.name(), "tiny");
        assert_eq!(local.load_count("tiny"), 1);
        drop(handle);

        let deep = router.route(0.8, true, None);
        let handle = pool.acquire(&deep.logical_model, SizeHint::default()).await.unwrap();
        assert_eq!(handle.name(), "expert_long");
        assert_eq!(remote.load_count("expert_long"), 1);
        drop(handle);

        assert_eq!(pool.shutdown().await, 2);
        assert!(!telemetry.events().is_empty());
    }

    #[test]
    fn heap_stats_are_readable() {
        #[cfg(not(target_env = "msvc"))]
        assert!(heap_allocated_mb().is_some());
    }
}
