//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Primary (port 0 only)
//!     → listener.rs PortReservation (bind, never listen)
//!
//! Worker
//!     → listener.rs (SO_REUSEPORT bind, accept loop, connection limits)
//!     → connection.rs (TrackedStream, ConnectionHandle, drain tracking)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - Every worker binds the same port; the kernel spreads connections
//! - Bounded accept queue prevents resource exhaustion
//! - Each connection tracked for graceful shutdown

pub mod connection;
pub mod listener;

pub use connection::{ConnectionHandle, ConnectionTracker, TrackedStream};
pub use listener::{Listener, ListenerError, PortReservation};
