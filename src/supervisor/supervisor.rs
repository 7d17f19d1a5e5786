//! The primary's event loop.
//!
//! The worker table is touched only by [`Supervisor::run`]; spawner tasks
//! talk to it through one event channel.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::{broadcast, mpsc};

use crate::config::{ClusterConfig, RespawnPolicy};
use crate::ipc::PrimaryMessage;
use crate::lifecycle::{PidFile, ShutdownSignal};
use crate::observability::metrics;
use crate::resilience::CrashBackoff;
use crate::supervisor::pool::{PoolError, WorkerPool};
use crate::supervisor::spawner::{SpawnError, Spawner};
use crate::supervisor::state::{ClusterEvent, SupervisorEvent, SupervisorState, WorkerHandle};
use crate::worker::{WorkerId, WorkerIdentity, WorkerRole};

const NOTIFICATION_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error(transparent)]
    Spawn(#[from] SpawnError),
    #[error(transparent)]
    Pool(#[from] PoolError),
}

/// How the primary's loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorExit {
    /// Every worker exited after a relayed signal.
    Graceful,
    /// A second signal arrived while draining.
    Forced,
}

impl SupervisorExit {
    pub fn code(self) -> i32 {
        match self {
            SupervisorExit::Graceful => 0,
            SupervisorExit::Forced => 1,
        }
    }
}

/// Owns the worker pool and reacts to its lifecycle events.
pub struct Supervisor<S> {
    config: ClusterConfig,
    singleton: bool,
    port: Option<u16>,
    spawner: S,
    pool: WorkerPool,
    state: SupervisorState,
    backoff: Option<CrashBackoff>,
    pid_file: Option<PidFile>,
    events_tx: mpsc::UnboundedSender<SupervisorEvent>,
    events_rx: mpsc::UnboundedReceiver<SupervisorEvent>,
    notifications: broadcast::Sender<ClusterEvent>,
}

impl<S: Spawner> Supervisor<S> {
    /// `singleton` adds one singleton worker on top of the normal ones.
    pub fn new(config: ClusterConfig, singleton: bool, spawner: S) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        let backoff = match config.workers.respawn {
            RespawnPolicy::Immediate => None,
            RespawnPolicy::Backoff {
                base_ms,
                max_ms,
                stable_secs,
            } => Some(CrashBackoff::new(base_ms, max_ms, stable_secs)),
        };
        Self {
            config,
            singleton,
            port: None,
            spawner,
            pool: WorkerPool::new(),
            state: SupervisorState::Running,
            backoff,
            pid_file: None,
            events_tx,
            events_rx,
            notifications,
        }
    }

    /// Port every worker binds instead of the configured one.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Receive `online`, `listening` and `exit` notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<ClusterEvent> {
        self.notifications.subscribe()
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Write the PID file and fork the pool, singleton first.
    pub fn start(&mut self) -> Result<(), SupervisorError> {
        if let Some(path) = self.config.workers.pid_file.clone() {
            match PidFile::write(&path, std::process::id()) {
                Ok(pid_file) => self.pid_file = Some(pid_file),
                Err(error) => {
                    tracing::warn!(path = %path.display(), %error, "Failed to write PID file");
                }
            }
        }

        let count = self.config.workers.effective_count();
        tracing::info!(
            workers = count,
            singleton = self.singleton,
            port = self.port.unwrap_or(self.config.listener.port),
            "Starting worker pool"
        );
        if self.singleton {
            self.spawn_worker(WorkerRole::Singleton)?;
        }
        for _ in 0..count {
            self.spawn_worker(WorkerRole::Normal)?;
        }
        Ok(())
    }

    /// Process events until every worker is gone after a shutdown signal.
    pub async fn run(
        mut self,
        mut signals: mpsc::Receiver<ShutdownSignal>,
    ) -> Result<SupervisorExit, SupervisorError> {
        let mut signals_open = true;
        loop {
            if self.state == SupervisorState::Draining && self.pool.is_empty() {
                self.state = SupervisorState::Stopped;
                tracing::info!("All workers exited");
                return Ok(SupervisorExit::Graceful);
            }

            tokio::select! {
                received = signals.recv(), if signals_open => match received {
                    Some(signal) => {
                        if self.state != SupervisorState::Running {
                            tracing::warn!(%signal, "Repeated shutdown signal; exiting now");
                            return Ok(SupervisorExit::Forced);
                        }
                        self.begin_shutdown(signal);
                    }
                    None => signals_open = false,
                },
                Some(event) = self.events_rx.recv() => self.handle_event(event),
            }
        }
    }

    fn handle_event(&mut self, event: SupervisorEvent) {
        match event {
            SupervisorEvent::Online { id } => {
                if self.pool.mark_online(id) {
                    let pid = self.pool.get(id).and_then(|handle| handle.pid);
                    tracing::info!(worker = %id, pid = ?pid, "Worker online");
                    self.notify(ClusterEvent::Online { id, pid });
                }
            }
            SupervisorEvent::Listening { id, address } => {
                tracing::info!(worker = %id, %address, "Worker listening");
                self.notify(ClusterEvent::Listening { id, address });
            }
            SupervisorEvent::Broadcast { from, payload } => {
                let mut delivered = 0;
                for worker in self.pool.live() {
                    if worker.send(PrimaryMessage::Ipm {
                        payload: payload.clone(),
                    }) {
                        delivered += 1;
                    }
                }
                tracing::debug!(from = %from, delivered, "Broadcast relayed");
            }
            SupervisorEvent::Exited { id, code, signal } => self.reap(id, code, signal),
            SupervisorEvent::RespawnDue { role } => {
                if self.state == SupervisorState::Running {
                    self.respawn_now(role);
                }
            }
        }
    }

    fn reap(&mut self, id: WorkerId, code: Option<i32>, signal: Option<i32>) {
        let Some(handle) = self.pool.remove(id) else {
            return;
        };
        metrics::set_live_workers(self.pool.live_count());
        self.notify(ClusterEvent::Exit {
            id,
            role: handle.role,
            code,
            signal,
        });

        if self.state != SupervisorState::Running {
            tracing::info!(worker = %id, ?code, ?signal, "Worker exited");
            return;
        }

        tracing::warn!(worker = %id, role = %handle.role, ?code, ?signal, "Worker died; replacing");
        let lived = handle.spawned_at.elapsed();
        let delay = match self.backoff.as_mut() {
            Some(backoff) => backoff.next_delay(lived),
            None => Duration::ZERO,
        };
        if delay.is_zero() {
            self.respawn_now(handle.role);
            return;
        }

        tracing::info!(role = %handle.role, delay_ms = delay.as_millis() as u64, "Delaying respawn");
        let events = self.events_tx.clone();
        let role = handle.role;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(SupervisorEvent::RespawnDue { role });
        });
    }

    fn respawn_now(&mut self, role: WorkerRole) {
        match self.spawn_worker(role) {
            Ok(()) => metrics::record_worker_respawn(role.as_str()),
            Err(error) => tracing::error!(%role, %error, "Failed to respawn worker"),
        }
    }

    fn spawn_worker(&mut self, role: WorkerRole) -> Result<(), SupervisorError> {
        if role == WorkerRole::Singleton && self.pool.singleton().is_some() {
            return Err(PoolError::SingletonTaken.into());
        }
        let id = self.pool.next_id();
        let identity = WorkerIdentity::new(id, role, self.port);
        let spawned = self.spawner.spawn(&identity, self.events_tx.clone())?;
        self.pool
            .insert(WorkerHandle::new(id, spawned.pid, role, spawned.outbox))?;
        metrics::set_live_workers(self.pool.live_count());
        Ok(())
    }

    /// Stop respawning, drop the PID file and relay `signal` to every worker.
    fn begin_shutdown(&mut self, signal: ShutdownSignal) {
        tracing::info!(%signal, workers = self.pool.live_count(), "Shutting down worker pool");
        self.state = SupervisorState::Draining;
        if let Some(pid_file) = self.pid_file.take() {
            pid_file.remove();
        }
        for worker in self.pool.live() {
            if let Err(error) = self.spawner.signal(worker, signal) {
                tracing::warn!(worker = %worker.id, %error, "Failed to signal worker");
            }
        }
        self.pool.mark_exiting();
    }

    fn notify(&self, event: ClusterEvent) {
        // No subscribers is fine.
        let _ = self.notifications.send(event);
    }
}
