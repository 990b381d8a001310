// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Model registry with lock-free reads and atomic hot reload.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use strata_core::ModelDescriptor;
use tracing::info;

type Descriptors = HashMap<String, Arc<ModelDescriptor>>;

/// Names that changed between two registry generations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub changed: Vec<String>,
}

impl RegistryDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

/// Descriptor lookup by logical name.
///
/// Readers get an `Arc` snapshot of one descriptor; a reload swaps the whole
/// map at once, so a lookup never observes a half-applied reload. Pool
/// entries keep the descriptor they were loaded with.
#[derive(Debug)]
pub struct ModelRegistry {
    descriptors: ArcSwap<Descriptors>,
}

impl ModelRegistry {
    pub fn new(models: impl IntoIterator<Item = ModelDescriptor>) -> Self {
        Self {
            descriptors: ArcSwap::from_pointee(index(models)),
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<ModelDescriptor>> {
        self.descriptors.load().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.descriptors.load().contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.descriptors.load().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.descriptors.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replace every descriptor atomically and report what changed.
    pub fn reload(&self, models: impl IntoIterator<Item = ModelDescriptor>) -> RegistryDiff {
        let next = index(models);
        let previous = self.descriptors.swap(Arc::new(next.clone()));

        let mut diff = RegistryDiff::default();
        for (name, descriptor) in &next {
            match previous.get(name) {
                None => diff.added.push(name.clone()),
                Some(old) if old != descriptor => diff.changed.push(name.clone()),
                Some(_) => {}
            }
        }
        diff.removed = previous
            .keys()
            .filter(|name| !next.contains_key(*name))
            .cloned()
            .collect();
        diff.added.sort();
        diff.changed.sort();
        diff.removed.sort();

        info!(
            models = next.len(),
            added = diff.added.len(),
            changed = diff.changed.len(),
            removed = diff.removed.len(),
            "model registry reloaded"
        );
        diff
    }
}

fn index(models: impl IntoIterator<Item = ModelDescriptor>) -> Descriptors {
    models
        .into_iter()
        .map(|m| (m.name.clone(), Arc::new(m)))
        .collect()
}
