// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Working-set classification from a sliding access window.
//!
//! Classification is derived on demand, never stored, so it always reflects
//! the window as of the moment it is asked for.

use std::collections::VecDeque;
use std::time::Duration;

use serde::Serialize;
use strata_config::model::PoolConfig;
use strum::Display;
use tokio::time::Instant;

/// How hot an entry is, which decides how long it may idle before reclamation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, Serialize)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum WorkingSetClass {
    Cold,
    Warm,
    Hot,
}

/// Window size, thresholds and TTLs, taken from `[pool]`.
#[derive(Debug, Clone)]
pub struct WorkingSetPolicy {
    pub window: Duration,
    pub hot_min_accesses: usize,
    pub warm_recency: Duration,
    pub hot_ttl: Duration,
    pub warm_ttl: Duration,
    pub cold_ttl: Duration,
}

impl From<&PoolConfig> for WorkingSetPolicy {
    fn from(config: &PoolConfig) -> Self {
        Self {
            window: Duration::from_secs(config.window_secs),
            hot_min_accesses: config.hot_min_accesses,
            warm_recency: Duration::from_secs(config.warm_recency_secs),
            hot_ttl: Duration::from_secs(config.hot_ttl_secs),
            warm_ttl: Duration::from_secs(config.warm_ttl_secs),
            cold_ttl: Duration::from_secs(config.cold_ttl_secs),
        }
    }
}

impl WorkingSetPolicy {
    /// Classify a window as of `now`.
    ///
    /// HOT needs `hot_min_accesses` inside the window. Two accesses, or a
    /// single one younger than `warm_recency`, make an entry WARM.
    pub fn classify(&self, window: &AccessWindow, now: Instant) -> WorkingSetClass {
        let count = window.count_within(now, self.window);
        if count >= self.hot_min_accesses {
            WorkingSetClass::Hot
        } else if count >= 2 {
            WorkingSetClass::Warm
        } else if count == 1
            && window
                .latest()
                .is_some_and(|at| now.saturating_duration_since(at) <= self.warm_recency)
        {
            WorkingSetClass::Warm
        } else {
            WorkingSetClass::Cold
        }
    }

    pub fn ttl(&self, class: WorkingSetClass) -> Duration {
        match class {
            WorkingSetClass::Hot => self.hot_ttl,
            WorkingSetClass::Warm => self.warm_ttl,
            WorkingSetClass::Cold => self.cold_ttl,
        }
    }
}

/// Timestamps of recent successful acquires, oldest first.
#[derive(Debug, Clone, Default)]
pub struct AccessWindow {
    stamps: VecDeque<Instant>,
}

impl AccessWindow {
    /// Record an access and drop stamps that fell out of the window.
    pub fn record(&mut self, now: Instant, window: Duration) {
        self.prune(now, window);
        self.stamps.push_back(now);
    }

    pub fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(&oldest) = self.stamps.front() {
            if now.saturating_duration_since(oldest) > window {
                self.stamps.pop_front();
            } else {
                break;
            }
        }
    }

    /// Accesses no older than `window` as of `now`, without mutating.
    pub fn count_within(&self, now: Instant, window: Duration) -> usize {
        self.stamps
            .iter()
            .rev()
            .take_while(|&&at| now.saturating_duration_since(at) <= window)
            .count()
    }

    pub fn latest(&self) -> Option<Instant> {
        self.stamps.back().copied()
    }
}
