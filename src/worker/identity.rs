//! Who a process is: the primary or one of its workers.
//!
//! The primary passes a worker's identity through environment variables at
//! spawn time. They are read exactly once, by the launcher.

use std::collections::HashMap;
use std::fmt;

/// Marks the process as a worker and carries its role.
pub const ROLE_VAR: &str = "HTTP_CLUSTER_WORKER_ROLE";
/// Internal worker id assigned by the primary.
pub const ID_VAR: &str = "HTTP_CLUSTER_WORKER_ID";
/// Port reserved by the primary when the configured port is 0.
pub const PORT_VAR: &str = "HTTP_CLUSTER_PORT";

/// Internal id of a worker, unique for the primary's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorkerId(pub u64);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerRole {
    Normal,
    Singleton,
}

impl WorkerRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerRole::Normal => "normal",
            WorkerRole::Singleton => "singleton",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "normal" => Some(WorkerRole::Normal),
            "singleton" => Some(WorkerRole::Singleton),
            _ => None,
        }
    }
}

impl fmt::Display for WorkerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerIdentity {
    pub id: WorkerId,
    pub role: WorkerRole,
    /// Port to bind instead of the configured one.
    pub port: Option<u16>,
}

impl WorkerIdentity {
    pub fn new(id: WorkerId, role: WorkerRole, port: Option<u16>) -> Self {
        Self { id, role, port }
    }

    /// Identity of the current process; `None` in the primary.
    pub fn from_env() -> Option<Self> {
        let vars: HashMap<String, String> = [ROLE_VAR, ID_VAR, PORT_VAR]
            .into_iter()
            .filter_map(|name| std::env::var(name).ok().map(|v| (name.to_string(), v)))
            .collect();
        Self::from_vars(&vars)
    }

    /// Parse an identity from a variable map.
    ///
    /// An unknown role value is treated as not being a worker.
    pub fn from_vars(vars: &HashMap<String, String>) -> Option<Self> {
        let role = WorkerRole::parse(vars.get(ROLE_VAR)?)?;
        let id = vars
            .get(ID_VAR)
            .and_then(|v| v.parse().ok())
            .map(WorkerId)
            .unwrap_or(WorkerId(0));
        let port = vars.get(PORT_VAR).and_then(|v| v.parse().ok());
        Some(Self { id, role, port })
    }

    /// Variables to set on the spawned process.
    pub fn env_vars(&self) -> Vec<(&'static str, String)> {
        let mut vars = vec![
            (ROLE_VAR, self.role.as_str().to_string()),
            (ID_VAR, self.id.0.to_string()),
        ];
        if let Some(port) = self.port {
            vars.push((PORT_VAR, port.to_string()));
        }
        vars
    }
}
