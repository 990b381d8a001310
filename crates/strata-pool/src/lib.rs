// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Strata model resource pool.
//!
//! This crate provides:
//! - [`ResourcePool`]: the shared cache. Acquire leases a READY instance,
//!   loading it on a miss with at most one load per logical name in flight
//! - [`ModelHandle`]: the lease, returned explicitly or on drop
//! - [`ModelRegistry`]: hot-swappable logical-name to descriptor map
//! - [`BackendSet`]: the loaders the pool dispatches through, with the
//!   built-in [`LocalWeightsLoader`] and [`RemoteApiLoader`]
//!
//! Idle entries are reclaimed by working-set class: HOT entries keep their
//! memory for minutes, COLD ones for seconds. When memory runs short the
//! least recently used unleased entries are evicted first. A leased entry
//! is never evicted.

pub mod backend;
pub mod entry;
mod eviction;
pub mod handle;
pub mod pool;
pub mod registry;
pub mod stats;
pub mod working_set;

pub use backend::{BackendSet, LocalModel, LocalWeightsLoader, RemoteApiLoader, RemoteModel, WeightFile};
pub use entry::{CacheKey, EntryState};
pub use handle::ModelHandle;
pub use pool::{ResourcePool, SizeHint};
pub use registry::{ModelRegistry, RegistryDiff};
pub use stats::{CounterSnapshot, EntrySnapshot, PoolSnapshot};
pub use working_set::{AccessWindow, WorkingSetClass, WorkingSetPolicy};
