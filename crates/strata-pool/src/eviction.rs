// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Victim selection.
//!
//! Only READY entries without leases are ever candidates. TTL-lapsed
//! candidates go first, least recently used first; if that does not free
//! enough, live candidates follow in LRU order. When even that is not
//! enough, nothing is chosen and the caller reports the shortfall.

use std::collections::HashMap;

use tokio::time::Instant;

use crate::entry::{CacheKey, Entry};
use crate::working_set::WorkingSetPolicy;

/// Why a plan could not make room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Shortfall {
    /// Memory held by leased or loading entries, which cannot be reclaimed.
    pub pinned_mb: u64,
}

/// Victims to detach, in the order they were chosen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct EvictionPlan {
    pub expired: Vec<CacheKey>,
    pub pressure: Vec<CacheKey>,
}

impl EvictionPlan {
    pub fn is_empty(&self) -> bool {
        self.expired.is_empty() && self.pressure.is_empty()
    }
}

/// Memory charged against capacity right now.
pub(crate) fn used_mb(entries: &HashMap<CacheKey, Entry>) -> u64 {
    entries
        .values()
        .filter(|e| e.is_charged())
        .map(|e| e.estimated_mb)
        .sum()
}

/// Memory held by leased or loading entries, which no plan can reclaim.
pub(crate) fn pinned_mb(entries: &HashMap<CacheKey, Entry>) -> u64 {
    entries
        .values()
        .filter(|e| e.is_charged() && !e.is_evictable())
        .map(|e| e.estimated_mb)
        .sum()
}

/// Every expired, unreferenced entry, least recently used first.
pub(crate) fn expired(
    entries: &HashMap<CacheKey, Entry>,
    policy: &WorkingSetPolicy,
    now: Instant,
) -> Vec<CacheKey> {
    let mut keys: Vec<&Entry> = entries
        .values()
        .filter(|e| e.is_expired(policy, now))
        .collect();
    keys.sort_by(|a, b| a.last_access.cmp(&b.last_access).then_with(|| a.key.cmp(&b.key)));
    keys.into_iter().map(|e| e.key.clone()).collect()
}

/// Choose victims so that `required_mb` more fits within `capacity_mb`.
///
/// With `allow_pressure` false only expired entries are considered.
pub(crate) fn plan(
    entries: &HashMap<CacheKey, Entry>,
    policy: &WorkingSetPolicy,
    now: Instant,
    capacity_mb: u64,
    required_mb: u64,
    allow_pressure: bool,
) -> Result<EvictionPlan, Shortfall> {
    let used = used_mb(entries);
    let mut plan = EvictionPlan::default();
    if used.saturating_add(required_mb) <= capacity_mb {
        return Ok(plan);
    }

    let mut candidates: Vec<&Entry> = entries.values().filter(|e| e.is_evictable()).collect();
    candidates.sort_by(|a, b| {
        let a_live = !a.is_expired(policy, now);
        let b_live = !b.is_expired(policy, now);
        a_live
            .cmp(&b_live)
            .then_with(|| a.last_access.cmp(&b.last_access))
            .then_with(|| a.key.cmp(&b.key))
    });

    let mut remaining = used;
    for entry in &candidates {
        if remaining.saturating_add(required_mb) <= capacity_mb {
            break;
        }
        if entry.is_expired(policy, now) {
            plan.expired.push(entry.key.clone());
        } else if allow_pressure {
            plan.pressure.push(entry.key.clone());
        } else {
            break;
        }
        remaining = remaining.saturating_sub(entry.estimated_mb);
    }

    if remaining.saturating_add(required_mb) <= capacity_mb {
        Ok(plan)
    } else {
        Err(Shortfall {
            pinned_mb: pinned_mb(entries),
        })
    }
}
