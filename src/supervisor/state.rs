//! Supervisor and worker states, and the events that move them.

use std::net::SocketAddr;
use std::time::Instant;

use serde_json::Value;
use tokio::sync::mpsc;

use crate::ipc::PrimaryMessage;
use crate::worker::{WorkerId, WorkerRole};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// Serving; crashed workers are replaced.
    Running,
    /// A shutdown signal was relayed; no respawns.
    Draining,
    /// Every worker has exited.
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Starting,
    Online,
    /// Told to shut down.
    Exiting,
    Dead,
}

impl WorkerState {
    pub fn is_live(self) -> bool {
        matches!(self, WorkerState::Starting | WorkerState::Online)
    }
}

/// The primary's record of one worker.
#[derive(Debug)]
pub struct WorkerHandle {
    pub id: WorkerId,
    pub pid: Option<u32>,
    pub role: WorkerRole,
    pub state: WorkerState,
    pub spawned_at: Instant,
    pub(crate) outbox: mpsc::UnboundedSender<PrimaryMessage>,
}

impl WorkerHandle {
    pub fn new(
        id: WorkerId,
        pid: Option<u32>,
        role: WorkerRole,
        outbox: mpsc::UnboundedSender<PrimaryMessage>,
    ) -> Self {
        Self {
            id,
            pid,
            role,
            state: WorkerState::Starting,
            spawned_at: Instant::now(),
            outbox,
        }
    }

    /// Queue a frame for the worker; false if its link is gone.
    pub fn send(&self, message: PrimaryMessage) -> bool {
        self.outbox.send(message).is_ok()
    }
}

/// What the spawner's per-worker tasks report to the supervisor loop.
#[derive(Debug, Clone, PartialEq)]
pub enum SupervisorEvent {
    Online {
        id: WorkerId,
    },
    Listening {
        id: WorkerId,
        address: SocketAddr,
    },
    Broadcast {
        from: WorkerId,
        payload: Value,
    },
    Exited {
        id: WorkerId,
        code: Option<i32>,
        signal: Option<i32>,
    },
    /// A delayed replacement is due.
    RespawnDue {
        role: WorkerRole,
    },
}

/// Notification published to external listeners.
#[derive(Debug, Clone, PartialEq)]
pub enum ClusterEvent {
    Online {
        id: WorkerId,
        pid: Option<u32>,
    },
    Listening {
        id: WorkerId,
        address: SocketAddr,
    },
    Exit {
        id: WorkerId,
        role: WorkerRole,
        code: Option<i32>,
        signal: Option<i32>,
    },
}
