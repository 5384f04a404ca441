//! Concurrency-safe container table.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{Container, ContainerEvent, ContainerState, EvictionPolicy};

/// In-memory table of containers keyed by container ID.
///
/// Cloning is cheap and every clone shares the same table. All operations
/// are total: a missing container is reported as `None`/`false`, never as an
/// error.
#[derive(Debug, Clone, Default)]
pub struct ContainerStore {
    containers: Arc<RwLock<HashMap<String, Container>>>,
    eviction: EvictionPolicy,
}

impl ContainerStore {
    /// Create an empty store with the given eviction policy.
    pub fn new(eviction: EvictionPolicy) -> Self {
        Self {
            containers: Arc::default(),
            eviction,
        }
    }

    /// Insert or overwrite the record for `id`. Last writer wins.
    pub fn upsert(&self, id: &str, state: ContainerState, pid: i32) {
        self.apply(&ContainerEvent::new(id, state).with_pid(pid));
    }

    /// Apply a lifecycle event.
    ///
    /// Returns `false` when the event was dropped because it is older than
    /// the record it would replace.
    pub fn apply(&self, event: &ContainerEvent) -> bool {
        let mut containers = self.write();
        let existing = containers.get(&event.id);

        if let Some(existing) = existing
            && let (Some(new), Some(old)) = (event.observed_at, existing.observed_at)
            && new < old
        {
            return false;
        }

        if event.state == ContainerState::Destroyed
            && self.eviction == EvictionPolicy::EvictDestroyed
        {
            containers.remove(&event.id);
            return true;
        }

        let pid = event
            .pid
            .or_else(|| existing.map(|c| c.pid))
            .unwrap_or_default();
        let last_action = existing.and_then(|c| c.last_action);
        let observed_at = event
            .observed_at
            .or_else(|| existing.and_then(|c| c.observed_at));

        containers.insert(
            event.id.clone(),
            Container {
                id: event.id.clone(),
                state: event.state,
                pid,
                last_action,
                observed_at,
            },
        );
        true
    }

    /// Point lookup. `None` means the container is unknown.
    pub fn get(&self, id: &str) -> Option<Container> {
        self.read().get(id).cloned()
    }

    /// Visit a copy of every record taken at call time.
    ///
    /// The lock is released before the first call to `visitor`, so concurrent
    /// writers are never blocked by the visitor and never observed by it.
    pub fn for_each<F>(&self, visitor: F)
    where
        F: FnMut(&Container),
    {
        self.snapshot().iter().for_each(visitor);
    }

    /// Copy of every record, in no particular order.
    pub fn snapshot(&self) -> Vec<Container> {
        self.read().values().cloned().collect()
    }

    /// Record (or clear) the time of the last control action.
    ///
    /// Returns `false` if the container is unknown.
    pub fn set_last_action(&self, id: &str, at: Option<DateTime<Utc>>) -> bool {
        match self.write().get_mut(id) {
            Some(container) => {
                container.last_action = at;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // Every mutation is a single insert/remove, so a poisoned lock still
    // guards a consistent table.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Container>> {
        self.containers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Container>> {
        self.containers.write().unwrap_or_else(PoisonError::into_inner)
    }
}
