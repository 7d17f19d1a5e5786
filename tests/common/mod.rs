//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::DuplexStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use http_cluster::config::ClusterConfig;
use http_cluster::ipc::{spawn_writer, IpcReader, PrimaryMessage, WorkerMessage};
use http_cluster::lifecycle::ShutdownSignal;
use http_cluster::worker::{
    WorkerError, WorkerExit, WorkerId, WorkerIdentity, WorkerRole, WorkerRuntime,
};
use http_cluster::Application;

pub const TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration bound to loopback on an ephemeral port.
pub fn local_config() -> ClusterConfig {
    let mut config = ClusterConfig::default();
    config.listener.hostname = Some("127.0.0.1".to_string());
    config.listener.port = 0;
    config
}

/// An in-process worker with the primary's side of its IPC link.
pub struct WorkerHarness {
    /// Set once the worker reported `listening`.
    pub address: Option<SocketAddr>,
    pub signals: mpsc::Sender<ShutdownSignal>,
    pub to_worker: Option<mpsc::UnboundedSender<PrimaryMessage>>,
    pub from_worker: IpcReader<DuplexStream, WorkerMessage>,
    pub task: JoinHandle<Result<WorkerExit, WorkerError>>,
}

impl WorkerHarness {
    /// Start a worker and wait until it listens.
    pub async fn start(app: Application, config: ClusterConfig, role: WorkerRole) -> Self {
        let mut worker = Self::boot(app, config, role).await;
        match worker.next_frame().await {
            WorkerMessage::Listening { address } => worker.address = Some(address),
            other => panic!("expected listening, got {other:?}"),
        }
        worker
    }

    /// Start a worker and return as soon as it reports online, which is
    /// before its start hook has finished.
    pub async fn boot(app: Application, config: ClusterConfig, role: WorkerRole) -> Self {
        let (primary_out, worker_in) = tokio::io::duplex(64 * 1024);
        let (worker_out, primary_in) = tokio::io::duplex(64 * 1024);
        let (signals, signal_rx) = mpsc::channel(8);

        let identity = WorkerIdentity::new(WorkerId(1), role, None);
        let runtime = WorkerRuntime::new(config, Arc::new(app), identity);
        let task = tokio::spawn(runtime.run(worker_in, worker_out, signal_rx));

        let to_worker = spawn_writer::<_, PrimaryMessage>(primary_out);
        let mut from_worker = IpcReader::<_, WorkerMessage>::new(primary_in);

        assert_eq!(next_frame(&mut from_worker).await, WorkerMessage::Online);

        Self {
            address: None,
            signals,
            to_worker: Some(to_worker),
            from_worker,
            task,
        }
    }

    pub fn address(&self) -> SocketAddr {
        self.address.expect("worker is not listening")
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}/{}", self.address(), path.trim_start_matches('/'))
    }

    pub fn send(&self, message: PrimaryMessage) {
        self.to_worker
            .as_ref()
            .expect("link already closed")
            .send(message)
            .unwrap();
    }

    /// Drop the primary's end of the link, as if the primary died.
    pub fn close_link(&mut self) {
        self.to_worker = None;
    }

    pub async fn signal(&self, signal: ShutdownSignal) {
        self.signals.send(signal).await.unwrap();
    }

    pub async fn next_frame(&mut self) -> WorkerMessage {
        next_frame(&mut self.from_worker).await
    }

    /// Wait for the runtime to return.
    pub async fn exit(self) -> WorkerExit {
        tokio::time::timeout(TIMEOUT, self.task)
            .await
            .expect("worker did not exit in time")
            .unwrap()
            .unwrap()
    }
}

async fn next_frame(reader: &mut IpcReader<DuplexStream, WorkerMessage>) -> WorkerMessage {
    tokio::time::timeout(TIMEOUT, reader.recv())
        .await
        .expect("no IPC frame in time")
        .expect("IPC link closed")
        .expect("malformed IPC frame")
}

/// HTTP client that never goes through a proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// Receive one value or fail the test.
pub async fn recv<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(TIMEOUT, rx.recv())
        .await
        .expect("nothing received in time")
        .expect("channel closed")
}
