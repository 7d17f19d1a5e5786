//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the cluster.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the cluster.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ClusterConfig {
    /// Listener configuration (hostname, port, limits).
    pub listener: ListenerConfig,

    /// Worker pool settings.
    pub workers: WorkersConfig,

    /// Graceful shutdown settings.
    pub shutdown: ShutdownConfig,

    /// Request pipeline settings.
    pub pipeline: PipelineConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Hostname or IP to bind. Binds every interface when unset.
    pub hostname: Option<String>,

    /// Port to bind (0 = OS-assigned, shared by the whole pool).
    pub port: u16,

    /// Maximum concurrent connections per worker (backpressure).
    pub max_connections: usize,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            hostname: None,
            port: 10_000,
            max_connections: 10_000,
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

impl ListenerConfig {
    /// Host part used for binding.
    pub fn host(&self) -> &str {
        self.hostname.as_deref().unwrap_or("0.0.0.0")
    }
}

/// Worker pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct WorkersConfig {
    /// Number of normal workers. Defaults to the CPU count.
    pub count: Option<usize>,

    /// Fork one extra singleton worker.
    pub singleton: bool,

    /// Optional PID file written by the primary.
    pub pid_file: Option<PathBuf>,

    /// What to do when a worker exits unexpectedly.
    pub respawn: RespawnPolicy,
}

impl WorkersConfig {
    /// Effective number of normal workers (never below 1).
    pub fn effective_count(&self) -> usize {
        self.count
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
            .max(1)
    }
}

/// Respawn policy for crashed workers.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum RespawnPolicy {
    /// Replace the worker as soon as its exit is observed.
    #[default]
    Immediate,

    /// Delay replacements of workers that keep crashing.
    Backoff {
        /// Base delay for exponential backoff in milliseconds.
        #[serde(default = "default_backoff_base_ms")]
        base_ms: u64,

        /// Maximum delay in milliseconds.
        #[serde(default = "default_backoff_max_ms")]
        max_ms: u64,

        /// A worker alive this long resets the crash counter.
        #[serde(default = "default_stable_secs")]
        stable_secs: u64,
    },
}

fn default_backoff_base_ms() -> u64 {
    100
}

fn default_backoff_max_ms() -> u64 {
    5_000
}

fn default_stable_secs() -> u64 {
    10
}

/// Shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Grace period before a draining worker is forced to exit, in seconds.
    pub grace_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self { grace_secs: 15 }
    }
}

/// Request pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Status code used when a request body cannot be decoded.
    pub decode_error_status: u16,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            decode_error_status: 500,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable the Prometheus endpoint in the primary.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config: ClusterConfig = toml::from_str("").unwrap();
        assert_eq!(config, ClusterConfig::default());
        assert_eq!(config.shutdown.grace_secs, 15);
        assert_eq!(config.workers.respawn, RespawnPolicy::Immediate);
    }

    #[test]
    fn backoff_policy_parses_with_partial_fields() {
        let config: ClusterConfig = toml::from_str(
            r#"
            [workers]
            count = 2
            singleton = true

            [workers.respawn]
            strategy = "backoff"
            base_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.workers.count, Some(2));
        assert!(config.workers.singleton);
        assert_eq!(
            config.workers.respawn,
            RespawnPolicy::Backoff {
                base_ms: 250,
                max_ms: 5_000,
                stable_secs: 10
            }
        );
    }

    #[test]
    fn worker_count_is_at_least_one() {
        let workers = WorkersConfig {
            count: Some(0),
            ..WorkersConfig::default()
        };
        assert_eq!(workers.effective_count(), 1);
        assert!(WorkersConfig::default().effective_count() >= 1);
    }
}
