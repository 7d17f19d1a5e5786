//! Startup orchestration.
//!
//! # Responsibilities
//! - Decide once whether this process is the primary or a worker
//! - Worker: run the runtime on the stdin/stdout IPC link
//! - Primary: metrics exporter, shared port, supervisor
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The metrics exporter starts before any worker is forked
//! - A reserved port stays held until the supervisor returns

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;

use crate::app::Application;
use crate::config::ClusterConfig;
use crate::lifecycle::signals;
use crate::net::{ListenerError, PortReservation};
use crate::observability::metrics;
use crate::supervisor::{ProcessSpawner, Supervisor, SupervisorError};
use crate::worker::{WorkerError, WorkerIdentity, WorkerRuntime};

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("failed to install signal handlers: {0}")]
    Signals(#[source] io::Error),
    #[error("failed to locate the current executable: {0}")]
    Executable(#[source] io::Error),
    #[error("invalid metrics address {address}")]
    MetricsAddress { address: String },
    #[error("failed to install metrics exporter: {0}")]
    Metrics(String),
    #[error(transparent)]
    Listener(#[from] ListenerError),
    #[error(transparent)]
    Worker(#[from] WorkerError),
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
}

/// Run the cluster and return the process exit code.
///
/// In the primary this forks the worker pool and supervises it; in a
/// worker (identity present in the environment) it serves HTTP.
pub async fn launch(config: ClusterConfig, app: Application) -> Result<i32, LaunchError> {
    match WorkerIdentity::from_env() {
        Some(identity) => run_worker(config, app, identity).await,
        None => run_primary(config, app).await,
    }
}

async fn run_worker(
    config: ClusterConfig,
    app: Application,
    identity: WorkerIdentity,
) -> Result<i32, LaunchError> {
    let signals = signals::listen().map_err(LaunchError::Signals)?;
    tracing::debug!(worker = %identity.id, role = %identity.role, "Worker starting");

    let runtime = WorkerRuntime::new(config, Arc::new(app), identity);
    let exit = runtime
        .run(tokio::io::stdin(), tokio::io::stdout(), signals)
        .await?;
    Ok(exit.code())
}

async fn run_primary(config: ClusterConfig, app: Application) -> Result<i32, LaunchError> {
    let signals = signals::listen().map_err(LaunchError::Signals)?;
    tracing::info!(pid = std::process::id(), "Primary starting");

    if config.observability.metrics_enabled {
        let address: SocketAddr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|_| LaunchError::MetricsAddress {
                address: config.observability.metrics_address.clone(),
            })?;
        metrics::init_metrics(address).map_err(|e| LaunchError::Metrics(e.to_string()))?;
    }

    let reservation = if config.listener.port == 0 {
        Some(PortReservation::acquire(&config.listener).await?)
    } else {
        None
    };

    let singleton = config.workers.singleton || app.has_singleton();
    let spawner = ProcessSpawner::current().map_err(LaunchError::Executable)?;
    let mut supervisor = Supervisor::new(config, singleton, spawner);
    if let Some(reservation) = &reservation {
        supervisor = supervisor.with_port(reservation.port());
    }

    supervisor.start()?;
    let exit = supervisor.run(signals).await?;
    drop(reservation);

    tracing::info!(?exit, "Primary stopped");
    Ok(exit.code())
}
