//! Handle given to lifecycle hooks.

use crate::ipc::{BroadcastMessage, Broadcaster, IpcError};
use crate::worker::identity::{WorkerId, WorkerRole};

/// What lifecycle hooks know about the worker they run in.
#[derive(Debug, Clone)]
pub struct WorkerContext {
    pub id: WorkerId,
    pub role: WorkerRole,
    broadcaster: Broadcaster,
}

impl WorkerContext {
    pub fn new(id: WorkerId, role: WorkerRole, broadcaster: Broadcaster) -> Self {
        Self {
            id,
            role,
            broadcaster,
        }
    }

    pub fn is_singleton(&self) -> bool {
        self.role == WorkerRole::Singleton
    }

    /// Publish a message to every live worker through the primary.
    pub fn broadcast(&self, message: BroadcastMessage) -> Result<(), IpcError> {
        self.broadcaster.broadcast(message)
    }
}
