//! Process supervisor: the primary side of the cluster.
//!
//! # Data Flow
//! ```text
//! launch() in the primary
//!     → supervisor.rs (start: PID file, singleton first, then N workers)
//!     → spawner.rs (re-run current_exe with a worker identity, IPC pipes)
//!     → per-worker tasks report SupervisorEvents
//!     → supervisor.rs loop: respawn, broadcast fan-out, notifications
//!     → shutdown signal: relay once, stop respawning, wait for exits
//! ```
//!
//! # Design Decisions
//! - One event loop owns the pool; no locks around worker state
//! - Spawning sits behind a trait so the loop is testable in-process
//! - A worker's broadcast is relayed to every live worker, sender included

pub mod pool;
pub mod spawner;
#[allow(clippy::module_inception)]
pub mod supervisor;
pub mod state;

pub use pool::{PoolError, WorkerPool};
pub use spawner::{ProcessSpawner, SpawnError, SpawnedWorker, Spawner};
pub use state::{ClusterEvent, SupervisorEvent, SupervisorState, WorkerHandle, WorkerState};
pub use supervisor::{Supervisor, SupervisorError, SupervisorExit};
