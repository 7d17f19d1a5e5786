//! http-cluster demo server.
//!
//! Runs a small application on the cluster: `POST` echoes the decoded
//! body, `GET` answers with the requested path, `OPTIONS` lists the
//! registered methods. The singleton worker broadcasts a greeting that
//! every worker logs.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use serde_json::{json, Value};

use http_cluster::app::SingletonPhase;
use http_cluster::config::{load_config, validate_config, ClusterConfig, ConfigError};
use http_cluster::ipc::BroadcastMessage;
use http_cluster::observability::logging;
use http_cluster::pipeline::{HandlerError, HandlerResult, MethodTable, RequestContext};
use http_cluster::worker::WorkerContext;
use http_cluster::{launch, Application};

#[derive(Debug, Parser)]
#[command(name = "http-cluster", version, about = "Multi-process HTTP service")]
struct Cli {
    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Port to listen on (0 picks one port for the whole pool).
    #[arg(long)]
    port: Option<u16>,

    /// Number of normal workers.
    #[arg(long)]
    workers: Option<usize>,

    /// Write the primary's PID to this file.
    #[arg(long)]
    pid_file: Option<PathBuf>,

    /// Run one extra singleton worker.
    #[arg(long)]
    singleton: bool,
}

impl Cli {
    fn into_config(self) -> Result<ClusterConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => ClusterConfig::default(),
        };
        if let Some(port) = self.port {
            config.listener.port = port;
        }
        if let Some(count) = self.workers {
            config.workers.count = Some(count);
        }
        if let Some(pid_file) = self.pid_file {
            config.workers.pid_file = Some(pid_file);
        }
        if self.singleton {
            config.workers.singleton = true;
        }
        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Cli::parse().into_config()?;
    logging::init(&config.observability)?;

    match launch(config, demo_app()).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            std::process::exit(1);
        }
    }
}

fn demo_app() -> Application {
    Application::builder()
        .post(|data: Value, ctx: Arc<RequestContext>| async move {
            tracing::info!(request_id = %ctx.request_id, remote = %ctx.remote_address, "POST");
            Ok::<_, HandlerError>(HandlerResult::ok(json!({ "test": 1, "data": data })))
        })
        .get(|data: Value, _ctx: Arc<RequestContext>| async move {
            Ok::<_, HandlerError>(HandlerResult::ok(json!({ "path": data })))
        })
        .options(
            |_data: Value, _ctx: Arc<RequestContext>, methods: Arc<MethodTable>| async move {
                let verbs: Vec<String> = methods.verbs().iter().map(ToString::to_string).collect();
                Ok::<_, HandlerError>(HandlerResult::ok(json!(verbs)))
            },
        )
        .init(|ctx: WorkerContext| async move {
            tracing::info!(worker = %ctx.id, "Worker initialised");
            Some(json!({ "test": 1 }))
        })
        .shutdown(|ctx: WorkerContext, saved: Option<Value>| async move {
            tracing::info!(worker = %ctx.id, ?saved, "Worker stopping");
        })
        .singleton(|ctx: WorkerContext, phase: SingletonPhase| async move {
            match phase {
                SingletonPhase::Starting => {
                    if let Err(e) = ctx.broadcast(BroadcastMessage::tagged("hello", json!(ctx.id.0))) {
                        tracing::warn!(error = %e, "Greeting not sent");
                    }
                    Some(json!({ "test": 1 }))
                }
                SingletonPhase::Stopping(saved) => {
                    tracing::info!(?saved, "Singleton stopping");
                    None
                }
            }
        })
        .ipm(|message: BroadcastMessage| async move {
            tracing::info!(?message, "Broadcast received");
        })
        .build()
}
