//! HTTP server setup for one worker.
//!
//! # Responsibilities
//! - Build the Axum router: one fallback that feeds the request pipeline
//! - Wire up middleware (request ID, tracing, body limit)
//! - Accept connections from the shared listener and serve them with hyper
//! - Close idle keep-alive connections once shutdown is triggered
//!
//! # Design Decisions
//! - Connections are served with hyper's HTTP/1 builder directly so each one
//!   can be asked to shut down gracefully; malformed framing is answered
//!   with `400` by hyper before the pipeline sees anything
//! - The peer address and a [`ConnectionHandle`] are attached to every
//!   request as extensions
//! - Each request runs the pipeline in its own task, so a client that
//!   hangs up mid-request does not cancel its handler; the pipeline notices
//!   the closed connection when it comes to write

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, Extension, State},
    http::{Request, Response, StatusCode},
    Router,
};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use tower::Service;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::ListenerConfig;
use crate::lifecycle::ShutdownListener;
use crate::net::{ConnectionHandle, ConnectionTracker, Listener, ListenerError, TrackedStream};
use crate::pipeline::Pipeline;

/// HTTP front end of a worker.
#[derive(Debug, Clone)]
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(pipeline: Arc<Pipeline>, config: &ListenerConfig) -> Self {
        Self {
            router: Self::build_router(pipeline, config),
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(pipeline: Arc<Pipeline>, config: &ListenerConfig) -> Router {
        Router::new()
            .fallback(pipeline_handler)
            .with_state(pipeline)
            .layer(RequestBodyLimitLayer::new(config.max_body_size))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Accept connections until `shutdown` fires.
    ///
    /// Returns once the listener is closed; connections already accepted
    /// keep draining in their own tasks and are counted by `tracker`.
    pub async fn run(
        self,
        listener: Listener,
        tracker: ConnectionTracker,
        mut shutdown: ShutdownListener,
    ) -> Result<(), ListenerError> {
        let addr = listener.local_addr().map_err(ListenerError::Bind)?;
        tracing::info!(address = %addr, "HTTP server starting");

        loop {
            let accepted = tokio::select! {
                _ = shutdown.triggered() => break,
                accepted = listener.accept() => accepted,
            };
            let (stream, peer, permit) = match accepted {
                Ok(accepted) => accepted,
                Err(ListenerError::Closed) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to accept connection");
                    continue;
                }
            };

            let guard = tracker.track();
            let handle = ConnectionHandle::new(guard.id());
            let io = TokioIo::new(TrackedStream::new(stream, handle.clone()));
            let router = self.router.clone();
            let mut connection_shutdown = shutdown.clone();

            tokio::spawn(async move {
                let _permit = permit;
                let _guard = guard;

                let service = hyper::service::service_fn(move |mut request: Request<Incoming>| {
                    request.extensions_mut().insert(ConnectInfo(peer));
                    request.extensions_mut().insert(handle.clone());
                    router.clone().call(request)
                });

                let conn = http1::Builder::new().serve_connection(io, service);
                tokio::pin!(conn);
                let mut draining = false;
                loop {
                    tokio::select! {
                        result = conn.as_mut() => {
                            if let Err(e) = result {
                                tracing::debug!(peer_addr = %peer, error = %e, "Connection error");
                            }
                            break;
                        }
                        _ = connection_shutdown.triggered(), if !draining => {
                            draining = true;
                            conn.as_mut().graceful_shutdown();
                        }
                    }
                }
            });
        }

        tracing::info!(address = %addr, "HTTP server stopped accepting");
        Ok(())
    }
}

/// Single entry point for every method and path.
async fn pipeline_handler(
    State(pipeline): State<Arc<Pipeline>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Extension(connection): Extension<ConnectionHandle>,
    request: Request<Body>,
) -> Response<Body> {
    let task = tokio::spawn(async move { pipeline.process(request, peer, connection).await });
    match task.await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(peer_addr = %peer, error = %e, "Pipeline task failed");
            let mut response = Response::new(Body::empty());
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        }
    }
}
