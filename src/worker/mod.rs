//! Worker side of the cluster.
//!
//! # Data Flow
//! ```text
//! launch() sees a worker identity in the environment
//!     → identity.rs (role, id, shared port)
//!     → runtime.rs (bind, serve, relay IPM, drain on signal)
//!     → context.rs (what lifecycle hooks receive)
//! ```

pub mod context;
pub mod identity;
pub mod runtime;

pub use context::WorkerContext;
pub use identity::{WorkerId, WorkerIdentity, WorkerRole};
pub use runtime::{WorkerError, WorkerExit, WorkerRuntime};
