//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events (logging.rs installs the stderr subscriber)
//!     → metrics.rs (worker gauge, respawn counter)
//!
//! Consumers:
//!     → Log aggregation (stderr of primary and workers)
//!     → Metrics endpoint (Prometheus scrape, primary only)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows from the HTTP layer into pipeline logs
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
