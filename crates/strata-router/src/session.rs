// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-session tier memory for hysteresis.

use std::collections::HashMap;
use std::time::Duration;

use strata_core::{SessionId, Tier};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
struct Remembered {
    tier: Tier,
    last_seen: Instant,
}

/// Last tier served per session, bounded in size and age.
///
/// Entries idle longer than `ttl` are forgotten; when the table is full
/// the least recently seen session makes room.
#[derive(Debug)]
pub(crate) struct SessionTable {
    sessions: HashMap<SessionId, Remembered>,
    capacity: usize,
    ttl: Duration,
}

impl SessionTable {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            sessions: HashMap::new(),
            capacity: capacity.max(1),
            ttl,
        }
    }

    /// The tier last served to `session`, unless it has gone stale.
    pub fn previous(&mut self, session: &SessionId, now: Instant) -> Option<Tier> {
        let remembered = self.sessions.get(session).copied()?;
        if now.saturating_duration_since(remembered.last_seen) > self.ttl {
            self.sessions.remove(session);
            return None;
        }
        Some(remembered.tier)
    }

    pub fn remember(&mut self, session: &SessionId, tier: Tier, now: Instant) {
        if !self.sessions.contains_key(session) && self.sessions.len() >= self.capacity {
            self.prune(now);
            if self.sessions.len() >= self.capacity {
                self.evict_oldest();
            }
        }
        self.sessions.insert(
            session.clone(),
            Remembered {
                tier,
                last_seen: now,
            },
        );
    }

    pub fn forget(&mut self, session: &SessionId) -> bool {
        self.sessions.remove(session).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    fn prune(&mut self, now: Instant) {
        let ttl = self.ttl;
        self.sessions
            .retain(|_, r| now.saturating_duration_since(r.last_seen) <= ttl);
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .sessions
            .iter()
            .min_by_key(|(_, r)| r.last_seen)
            .map(|(id, _)| id.clone());
        if let Some(id) = oldest {
            self.sessions.remove(&id);
        }
    }
}
