//! Multi-process HTTP service framework.
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌──────────────────── primary ────────────────────┐
//!   SIGINT/TERM ──▶│ supervisor: pool, respawn, broadcast fan-out    │
//!                  └──────┬──────────────┬──────────────┬────────────┘
//!                   IPC   │ (stdin/out)  │              │
//!                  ┌──────▼─────┐ ┌──────▼─────┐ ┌──────▼─────┐
//!   clients ──────▶│ worker 0   │ │ worker 1   │ │ singleton  │  (SO_REUSEPORT)
//!                  │ net → http │ │ net → http │ │ net → http │
//!                  │ → pipeline │ │ → pipeline │ │ → pipeline │
//!                  └────────────┘ └────────────┘ └────────────┘
//! ```
//!
//! Build an [`Application`], then hand it to [`launch`] together with a
//! [`ClusterConfig`]. The same binary runs as primary and as worker.

// Core subsystems
pub mod app;
pub mod config;
pub mod http;
pub mod ipc;
pub mod net;
pub mod pipeline;

// Processes
pub mod supervisor;
pub mod worker;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use app::{Application, ApplicationBuilder};
pub use config::ClusterConfig;
pub use http::HttpServer;
pub use lifecycle::{launch, LaunchError, Shutdown};
