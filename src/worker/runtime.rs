//! Worker process main loop.
//!
//! # Lifecycle
//! ```text
//! IPC up → Online → start hook → bind → Listening → serve + relay IPM
//!     first signal → stop accepting → drain connections → stop hook → exit 0
//!     grace timer expiry or repeated SIGINT → exit 1
//! ```
//!
//! A signal that arrives while the start hook runs skips the bind: the hook
//! is allowed to finish, then the stop hook runs, both under the grace timer.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::app::{Application, SavedState, SingletonPhase};
use crate::config::ClusterConfig;
use crate::http::HttpServer;
use crate::ipc::{spawn_writer, BroadcastMessage, Broadcaster, IpcError, IpcReader};
use crate::ipc::{PrimaryMessage, WorkerMessage};
use crate::lifecycle::{Shutdown, ShutdownSignal};
use crate::net::{ConnectionTracker, Listener, ListenerError};
use crate::pipeline::Pipeline;
use crate::worker::context::WorkerContext;
use crate::worker::identity::{WorkerIdentity, WorkerRole};

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Listener(#[from] ListenerError),
    #[error(transparent)]
    Ipc(#[from] IpcError),
}

/// How a worker ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// Drained and ran its stop hook.
    Graceful,
    /// The grace timer fired before draining finished.
    GraceExpired,
    /// A repeated interrupt cut the shutdown short.
    Forced,
}

impl WorkerExit {
    pub fn code(self) -> i32 {
        match self {
            WorkerExit::Graceful => 0,
            WorkerExit::GraceExpired | WorkerExit::Forced => 1,
        }
    }
}

/// Owns one listener and one pipeline.
pub struct WorkerRuntime {
    config: ClusterConfig,
    app: Arc<Application>,
    identity: WorkerIdentity,
}

impl WorkerRuntime {
    pub fn new(config: ClusterConfig, app: Arc<Application>, identity: WorkerIdentity) -> Self {
        Self {
            config,
            app,
            identity,
        }
    }

    /// Run until shutdown. `ipc_in`/`ipc_out` are the link to the primary.
    pub async fn run<R, W>(
        self,
        ipc_in: R,
        ipc_out: W,
        mut signals: mpsc::Receiver<ShutdownSignal>,
    ) -> Result<WorkerExit, WorkerError>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let outbox = spawn_writer::<W, WorkerMessage>(ipc_out);
        outbox
            .send(WorkerMessage::Online)
            .map_err(|_| IpcError::Closed)?;

        let broadcaster = Broadcaster::new(outbox.clone());
        let ctx = WorkerContext::new(self.identity.id, self.identity.role, broadcaster.clone());
        let mut signals_open = true;

        let start = self.start(ctx.clone());
        tokio::pin!(start);
        let interrupted = loop {
            tokio::select! {
                saved = &mut start => break Ok(saved),
                received = signals.recv(), if signals_open => match received {
                    Some(signal) => break Err(signal),
                    None => signals_open = false,
                },
            }
        };
        let saved = match interrupted {
            Ok(saved) => saved,
            Err(signal) => {
                tracing::info!(worker = %self.identity.id, %signal, "Shutdown requested during start-up");
                let stop = async {
                    let saved = start.await;
                    self.stop(ctx, saved).await;
                };
                return Ok(self.within_grace(stop, &mut signals, signals_open).await);
            }
        };

        let port = self.identity.port.unwrap_or(self.config.listener.port);
        let listener = Listener::bind(&self.config.listener, port).await?;
        let address = listener.local_addr().map_err(ListenerError::Bind)?;
        outbox
            .send(WorkerMessage::Listening { address })
            .map_err(|_| IpcError::Closed)?;
        tracing::info!(worker = %self.identity.id, role = %self.identity.role, %address, "Worker listening");

        let pipeline = Arc::new(Pipeline::new(
            Arc::clone(&self.app),
            &self.config.pipeline,
            broadcaster,
        ));
        let shutdown = Shutdown::new();
        let tracker = ConnectionTracker::new();
        let server = HttpServer::new(pipeline, &self.config.listener);
        let server_task = tokio::spawn(server.run(listener, tracker.clone(), shutdown.subscribe()));

        let mut ipc = IpcReader::<R, PrimaryMessage>::new(ipc_in);
        let first = loop {
            tokio::select! {
                received = signals.recv(), if signals_open => match received {
                    Some(signal) => break signal,
                    None => signals_open = false,
                },
                frame = ipc.recv() => match frame {
                    Some(Ok(PrimaryMessage::Ipm { payload })) => self.deliver(payload),
                    Some(Err(e)) => tracing::warn!(error = %e, "Dropping malformed IPC frame"),
                    None => {
                        tracing::warn!(worker = %self.identity.id, "IPC link closed; shutting down");
                        break ShutdownSignal::Terminate;
                    }
                },
            }
        };

        tracing::info!(worker = %self.identity.id, signal = %first, "Worker shutting down");
        let drain = self.drain(shutdown, server_task, tracker, ctx, saved);
        Ok(self.within_grace(drain, &mut signals, signals_open).await)
    }

    /// Run `work` to completion unless the grace timer or a repeated
    /// interrupt cuts it short.
    async fn within_grace<F>(
        &self,
        work: F,
        signals: &mut mpsc::Receiver<ShutdownSignal>,
        signals_open: bool,
    ) -> WorkerExit
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(work);
        let grace = tokio::time::sleep(Duration::from_secs(self.config.shutdown.grace_secs));
        tokio::pin!(grace);

        loop {
            tokio::select! {
                () = &mut work => return WorkerExit::Graceful,
                () = &mut grace => {
                    tracing::warn!(
                        worker = %self.identity.id,
                        grace_secs = self.config.shutdown.grace_secs,
                        "Grace period expired; exiting"
                    );
                    return WorkerExit::GraceExpired;
                }
                Some(signal) = signals.recv(), if signals_open => match signal {
                    ShutdownSignal::Interrupt => {
                        tracing::warn!(worker = %self.identity.id, "Repeated interrupt; forcing exit");
                        return WorkerExit::Forced;
                    }
                    ShutdownSignal::Terminate => {
                        tracing::debug!(worker = %self.identity.id, "Shutdown already in progress");
                    }
                },
            }
        }
    }

    async fn start(&self, ctx: WorkerContext) -> SavedState {
        match (self.identity.role, &self.app.singleton) {
            (WorkerRole::Singleton, Some(hook)) => hook.call(ctx, SingletonPhase::Starting).await,
            _ => match &self.app.init {
                Some(hook) => hook.start(ctx).await,
                None => None,
            },
        }
    }

    async fn stop(&self, ctx: WorkerContext, saved: SavedState) {
        match (self.identity.role, &self.app.singleton) {
            (WorkerRole::Singleton, Some(hook)) => {
                hook.call(ctx, SingletonPhase::Stopping(saved)).await;
            }
            _ => {
                if let Some(hook) = &self.app.shutdown {
                    hook.stop(ctx, saved).await;
                }
            }
        }
    }

    async fn drain(
        &self,
        shutdown: Shutdown,
        server: JoinHandle<Result<(), ListenerError>>,
        tracker: ConnectionTracker,
        ctx: WorkerContext,
        saved: SavedState,
    ) {
        shutdown.trigger();
        match server.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "HTTP server failed"),
            Err(e) => tracing::error!(error = %e, "HTTP server task failed"),
        }
        tracker.wait_for_idle().await;
        tracing::debug!(worker = %self.identity.id, "Connections drained");
        self.stop(ctx, saved).await;
    }

    /// Hand a relayed broadcast to the `IPM` handler without blocking the loop.
    fn deliver(&self, payload: Value) {
        match &self.app.ipm {
            Some(handler) => {
                let handler = Arc::clone(handler);
                tokio::spawn(async move {
                    handler
                        .on_message(BroadcastMessage::from_payload(payload))
                        .await;
                });
            }
            None => tracing::error!(worker = %self.identity.id, "IPM is not supported."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_graceful_exit_is_zero() {
        assert_eq!(WorkerExit::Graceful.code(), 0);
        assert_eq!(WorkerExit::GraceExpired.code(), 1);
        assert_eq!(WorkerExit::Forced.code(), 1);
    }
}
