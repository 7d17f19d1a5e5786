//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ClusterConfig (validated, immutable)
//!     → CLI overrides applied once in main
//!     → cloned into the supervisor and every worker runtime
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; every process re-reads the same file
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    ClusterConfig, ListenerConfig, LogFormat, ObservabilityConfig, PipelineConfig,
    RespawnPolicy, ShutdownConfig, WorkersConfig,
};
pub use validation::{validate_config, ValidationError};
