//! Starting and signalling worker processes.
//!
//! A worker is the current executable re-run with a worker identity in its
//! environment. Its stdin and stdout carry the IPC link; stderr is shared
//! with the primary for logging.

use std::ffi::OsString;
use std::io;
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::Stdio;

use nix::sys::signal::kill;
use nix::unistd::Pid;
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::mpsc;

use crate::ipc::{spawn_writer, IpcReader, PrimaryMessage, WorkerMessage};
use crate::lifecycle::ShutdownSignal;
use crate::supervisor::state::{SupervisorEvent, WorkerHandle};
use crate::worker::WorkerIdentity;

#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("failed to launch worker {program}: {source}")]
    Launch {
        program: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("worker {0} pipe was not captured")]
    MissingPipe(&'static str),
    #[error("failed to signal worker process {pid}: {source}")]
    Signal {
        pid: u32,
        #[source]
        source: nix::errno::Errno,
    },
}

/// A started worker as seen by the supervisor.
#[derive(Debug)]
pub struct SpawnedWorker {
    pub pid: Option<u32>,
    pub outbox: mpsc::UnboundedSender<PrimaryMessage>,
}

/// Starts workers and delivers signals to them.
///
/// Implementations report everything a worker does (online, listening,
/// broadcasts, exit) as [`SupervisorEvent`]s on `events`.
pub trait Spawner: Send + 'static {
    fn spawn(
        &mut self,
        identity: &WorkerIdentity,
        events: mpsc::UnboundedSender<SupervisorEvent>,
    ) -> Result<SpawnedWorker, SpawnError>;

    fn signal(&mut self, worker: &WorkerHandle, signal: ShutdownSignal) -> Result<(), SpawnError>;
}

/// Spawns workers as child processes.
#[derive(Debug, Clone)]
pub struct ProcessSpawner {
    program: PathBuf,
    args: Vec<OsString>,
}

impl ProcessSpawner {
    pub fn new(program: PathBuf, args: Vec<OsString>) -> Self {
        Self { program, args }
    }

    /// Re-run the current executable with the current arguments.
    pub fn current() -> io::Result<Self> {
        Ok(Self::new(
            std::env::current_exe()?,
            std::env::args_os().skip(1).collect(),
        ))
    }
}

impl Spawner for ProcessSpawner {
    fn spawn(
        &mut self,
        identity: &WorkerIdentity,
        events: mpsc::UnboundedSender<SupervisorEvent>,
    ) -> Result<SpawnedWorker, SpawnError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .envs(identity.env_vars())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            // Terminal signals reach only the primary, which relays them.
            .process_group(0);

        let mut child = command.spawn().map_err(|source| SpawnError::Launch {
            program: self.program.clone(),
            source,
        })?;
        let pid = child.id();
        let stdin = child.stdin.take().ok_or(SpawnError::MissingPipe("stdin"))?;
        let stdout = child.stdout.take().ok_or(SpawnError::MissingPipe("stdout"))?;

        let id = identity.id;
        let outbox = spawn_writer::<_, PrimaryMessage>(stdin);

        let frames = events.clone();
        let reader = tokio::spawn(async move {
            let mut reader = IpcReader::<_, WorkerMessage>::new(stdout);
            while let Some(frame) = reader.recv().await {
                let event = match frame {
                    Ok(WorkerMessage::Online) => SupervisorEvent::Online { id },
                    Ok(WorkerMessage::Listening { address }) => {
                        SupervisorEvent::Listening { id, address }
                    }
                    Ok(WorkerMessage::Broadcast { payload }) => {
                        SupervisorEvent::Broadcast { from: id, payload }
                    }
                    Err(e) => {
                        tracing::warn!(worker = %id, error = %e, "Dropping malformed IPC frame");
                        continue;
                    }
                };
                if frames.send(event).is_err() {
                    break;
                }
            }
        });

        tokio::spawn(async move {
            let status = child.wait().await;
            // Deliver the worker's last frames before its exit.
            let _ = reader.await;
            let (code, signal) = match status {
                Ok(status) => (status.code(), status.signal()),
                Err(e) => {
                    tracing::warn!(worker = %id, error = %e, "Failed to wait for worker");
                    (None, None)
                }
            };
            let _ = events.send(SupervisorEvent::Exited { id, code, signal });
        });

        tracing::debug!(worker = %id, role = %identity.role, pid = ?pid, "Worker spawned");
        Ok(SpawnedWorker { pid, outbox })
    }

    fn signal(&mut self, worker: &WorkerHandle, signal: ShutdownSignal) -> Result<(), SpawnError> {
        let Some(pid) = worker.pid else {
            return Ok(());
        };
        kill(Pid::from_raw(pid as i32), signal.as_nix())
            .map_err(|source| SpawnError::Signal { pid, source })
    }
}
