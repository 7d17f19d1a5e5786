//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Worker exits while the cluster is running:
//!     → RespawnPolicy::Immediate: replace now
//!     → RespawnPolicy::Backoff: backoff.rs picks the delay
//! ```
//!
//! # Design Decisions
//! - Respawn is unconditional by default; backoff is opt-in
//! - Jitter keeps a crashing pool from restarting in lockstep

pub mod backoff;

pub use backoff::CrashBackoff;
