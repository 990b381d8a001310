// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-only pool snapshots for telemetry collectors.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use strata_core::{BackendKind, QuantLevel};

use crate::entry::EntryState;
use crate::working_set::WorkingSetClass;

/// Monotonic pool counters.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub coalesced: AtomicU64,
    pub loads: AtomicU64,
    pub load_failures: AtomicU64,
    pub evictions: AtomicU64,
}

impl Counters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            load_failures: self.load_failures.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    /// Acquires served from a READY entry.
    pub hits: u64,
    /// Acquires that started a load.
    pub misses: u64,
    /// Acquires that waited on another caller's load.
    pub coalesced: u64,
    /// Loads that completed.
    pub loads: u64,
    /// Loads that failed or timed out.
    pub load_failures: u64,
    /// Entries detached for unloading, for any reason.
    pub evictions: u64,
}

/// One cached entry as seen at snapshot time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntrySnapshot {
    pub name: String,
    pub context_tokens: u32,
    pub backend: BackendKind,
    pub state: EntryState,
    pub quantization: Option<QuantLevel>,
    pub degraded: bool,
    pub estimated_mb: u64,
    pub refcount: usize,
    pub class: WorkingSetClass,
    pub accesses_in_window: usize,
    pub ttl_secs: u64,
    pub idle_secs: f64,
    /// Seconds since the load completed; `None` while loading.
    pub uptime_secs: Option<f64>,
    /// Idle past its TTL and unreferenced; reclaimed on the next acquire, release or sweep.
    pub expired: bool,
}

/// Point-in-time view of the pool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolSnapshot {
    pub capacity_mb: u64,
    /// Memory charged by READY and LOADING entries.
    pub used_mb: u64,
    /// Portion of `used_mb` reserved by loads still running.
    pub reserved_mb: u64,
    /// Entries sorted by name then context size.
    pub entries: Vec<EntrySnapshot>,
    pub counters: CounterSnapshot,
}

impl PoolSnapshot {
    /// Number of READY entries.
    pub fn ready(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.state == EntryState::Ready)
            .count()
    }

    pub fn entry(&self, name: &str) -> Option<&EntrySnapshot> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Memory held by READY entries only.
    pub fn ready_mb(&self) -> u64 {
        self.entries
            .iter()
            .filter(|e| e.state == EntryState::Ready)
            .map(|e| e.estimated_mb)
            .sum()
    }
}
