//! Inter-process messaging between the primary and its workers.
//!
//! # Data Flow
//! ```text
//! Worker (handler / hook)
//!     → Broadcaster → stdout (one JSON frame per line)
//!     → Supervisor reader task → event loop
//!     → relayed to every live worker's stdin
//!     → worker runtime → IPM handler
//! ```
//!
//! # Design Decisions
//! - Workers log to stderr; stdout belongs to the link
//! - Malformed frames are dropped, never fatal
//! - Delivery is at-most-once; a dead peer just loses the frame

pub mod link;
pub mod message;

pub use link::{spawn_writer, Broadcaster, IpcError, IpcReader};
pub use message::{BroadcastMessage, PrimaryMessage, WorkerMessage};
