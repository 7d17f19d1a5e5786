//! Worker table owned by the supervisor loop.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::supervisor::state::{WorkerHandle, WorkerState};
use crate::worker::{WorkerId, WorkerRole};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("a singleton worker is already live")]
    SingletonTaken,
    #[error("{0} is already registered")]
    Duplicate(WorkerId),
}

/// Live and exiting workers keyed by id. Dead workers are removed.
#[derive(Debug, Default)]
pub struct WorkerPool {
    workers: BTreeMap<WorkerId, WorkerHandle>,
    next_id: u64,
}

impl WorkerPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh worker id.
    pub fn next_id(&mut self) -> WorkerId {
        let id = WorkerId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Add a worker. At most one singleton may be registered at a time.
    pub fn insert(&mut self, handle: WorkerHandle) -> Result<(), PoolError> {
        if handle.role == WorkerRole::Singleton && self.singleton().is_some() {
            return Err(PoolError::SingletonTaken);
        }
        if self.workers.contains_key(&handle.id) {
            return Err(PoolError::Duplicate(handle.id));
        }
        self.workers.insert(handle.id, handle);
        Ok(())
    }

    pub fn get(&self, id: WorkerId) -> Option<&WorkerHandle> {
        self.workers.get(&id)
    }

    /// Record `starting → online`. Returns false for unknown or non-starting workers.
    pub fn mark_online(&mut self, id: WorkerId) -> bool {
        match self.workers.get_mut(&id) {
            Some(handle) if handle.state == WorkerState::Starting => {
                handle.state = WorkerState::Online;
                true
            }
            _ => false,
        }
    }

    /// Mark every live worker as exiting.
    pub fn mark_exiting(&mut self) {
        for handle in self.workers.values_mut() {
            if handle.state.is_live() {
                handle.state = WorkerState::Exiting;
            }
        }
    }

    /// Drop a dead worker from the table.
    pub fn remove(&mut self, id: WorkerId) -> Option<WorkerHandle> {
        let mut handle = self.workers.remove(&id)?;
        handle.state = WorkerState::Dead;
        Some(handle)
    }

    pub fn singleton(&self) -> Option<&WorkerHandle> {
        self.workers
            .values()
            .find(|handle| handle.role == WorkerRole::Singleton)
    }

    /// Workers that are starting or online.
    pub fn live(&self) -> impl Iterator<Item = &WorkerHandle> {
        self.workers.values().filter(|handle| handle.state.is_live())
    }

    pub fn live_count(&self) -> usize {
        self.live().count()
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;

    fn handle(pool: &mut WorkerPool, role: WorkerRole) -> WorkerHandle {
        let (tx, _rx) = mpsc::unbounded_channel();
        WorkerHandle::new(pool.next_id(), None, role, tx)
    }

    #[test]
    fn only_one_singleton() {
        let mut pool = WorkerPool::new();
        let first = handle(&mut pool, WorkerRole::Singleton);
        let second = handle(&mut pool, WorkerRole::Singleton);

        pool.insert(first).unwrap();
        assert_eq!(pool.insert(second), Err(PoolError::SingletonTaken));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn singleton_slot_frees_on_removal() {
        let mut pool = WorkerPool::new();
        let first = handle(&mut pool, WorkerRole::Singleton);
        let id = first.id;
        pool.insert(first).unwrap();

        let removed = pool.remove(id).unwrap();
        assert_eq!(removed.state, WorkerState::Dead);
        let replacement = handle(&mut pool, WorkerRole::Singleton);
        pool.insert(replacement).unwrap();
        assert_eq!(pool.singleton().unwrap().id, WorkerId(1));
    }

    #[test]
    fn online_and_exiting_transitions() {
        let mut pool = WorkerPool::new();
        let worker = handle(&mut pool, WorkerRole::Normal);
        let id = worker.id;
        pool.insert(worker).unwrap();

        assert!(pool.mark_online(id));
        assert!(!pool.mark_online(id));
        assert_eq!(pool.get(id).unwrap().state, WorkerState::Online);

        pool.mark_exiting();
        assert_eq!(pool.live_count(), 0);
        assert_eq!(pool.len(), 1);
    }
}
