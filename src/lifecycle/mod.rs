//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     launch() → worker identity in env? → WorkerRuntime
//!                                  else → metrics, port, Supervisor
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain connections → Exit
//!
//! Signals (signals.rs):
//!     SIGINT  → graceful once, forced when repeated
//!     SIGTERM → graceful, bounded by the grace timer
//! ```
//!
//! # Design Decisions
//! - The role is decided once, from the environment, at launch
//! - Shutdown has timeout: forced exit after deadline
//! - The PID file is written at start and removed when draining begins

pub mod pid_file;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use pid_file::PidFile;
pub use shutdown::{Shutdown, ShutdownListener};
pub use signals::ShutdownSignal;
pub use startup::{launch, LaunchError};
