//! The per-request state machine.
//!
//! ```text
//! Receiving → Decoding → Loading → Validating → Dispatching → Responding → Done
//!                 │          │          │             │
//!                 └──────────┴──────────┴─────────────┴──▶ Responding (error)
//! ```
//!
//! Stages run strictly in sequence for one request. Any stage failure
//! skips straight to Responding with a [`PipelineError`].

use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use futures_util::FutureExt;
use serde_json::Value;

use crate::app::Application;
use crate::config::PipelineConfig;
use crate::http::{request, response};
use crate::ipc::Broadcaster;
use crate::net::ConnectionHandle;
use crate::pipeline::context::RequestContext;
use crate::pipeline::error::PipelineError;
use crate::pipeline::handler::HandlerResult;
use crate::pipeline::method::Route;

/// Pipeline position of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Receiving,
    Decoding,
    Loading,
    Validating,
    Dispatching,
    Responding,
    Done,
}

type Outcome = Result<HandlerResult, PipelineError>;

/// Drives requests through the user's collaborators.
#[derive(Debug, Clone)]
pub struct Pipeline {
    app: Arc<Application>,
    decode_error_status: StatusCode,
    broadcaster: Broadcaster,
}

impl Pipeline {
    pub fn new(app: Arc<Application>, config: &PipelineConfig, broadcaster: Broadcaster) -> Self {
        let decode_error_status = StatusCode::from_u16(config.decode_error_status)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self {
            app,
            decode_error_status,
            broadcaster,
        }
    }

    /// Receive the whole body, then run the remaining stages.
    pub async fn process(
        &self,
        request: Request<Body>,
        peer: SocketAddr,
        connection: ConnectionHandle,
    ) -> Response<Body> {
        let (parts, body) = request.into_parts();
        // The body limit layer has already bounded the stream.
        let raw = match axum::body::to_bytes(body, usize::MAX).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::debug!(error = %e, "Failed to receive request body");
                let mut response = Response::new(Body::empty());
                *response.status_mut() = StatusCode::BAD_REQUEST;
                return response;
            }
        };
        let ctx = request::build_context(parts, raw, peer, connection, self.broadcaster.clone());
        self.handle(ctx).await
    }

    /// Run Decoding through Done for a received request.
    pub async fn handle(&self, mut ctx: RequestContext) -> Response<Body> {
        let started = Instant::now();
        let mut stage = Stage::Receiving;

        let outcome = self.run_stages(&mut ctx, &mut stage).await;
        advance(&mut stage, Stage::Responding, &ctx);

        if let Err(err) = &outcome {
            tracing::warn!(
                request_id = %ctx.request_id,
                method = %ctx.method,
                path = %ctx.path,
                kind = ?err.kind(),
                status = err.status().as_u16(),
                error = %err,
                "Request failed"
            );
        }

        let response = self.respond(outcome, &ctx);
        advance(&mut stage, Stage::Done, &ctx);
        tracing::debug!(
            request_id = %ctx.request_id,
            method = %ctx.method,
            status = response.status().as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Request completed"
        );
        response
    }

    async fn run_stages(&self, ctx: &mut RequestContext, stage: &mut Stage) -> Outcome {
        advance(stage, Stage::Decoding, ctx);
        let data = self.decode(ctx)?;
        ctx.set_decoded(data.clone());

        if let Some(loader) = &self.app.loader {
            advance(stage, Stage::Loading, ctx);
            let method = ctx.method.clone();
            let raw = ctx.raw_body.clone();
            loader
                .load(&method, &raw, ctx)
                .await
                .map_err(PipelineError::loader)?;
        }

        if let Some(validator) = &self.app.validator {
            advance(stage, Stage::Validating, ctx);
            validator
                .validate(&ctx.method, &ctx.raw_body, ctx)
                .await
                .map_err(PipelineError::validation)?;
        }

        advance(stage, Stage::Dispatching, ctx);
        self.dispatch(data, ctx).await
    }

    /// Empty bodies decode to the request path.
    fn decode(&self, ctx: &RequestContext) -> Result<Value, PipelineError> {
        if ctx.raw_body.is_empty() {
            return Ok(Value::String(ctx.path.clone()));
        }
        self.app
            .codecs
            .decode(ctx.content_type.as_deref(), &ctx.raw_body)
            .map_err(|e| PipelineError::decode(&e, self.decode_error_status))
    }

    async fn dispatch(&self, data: Value, ctx: &RequestContext) -> Outcome {
        let shared = Arc::new(ctx.clone());
        let call = match self.app.methods.route(&ctx.method) {
            Route::Method(handler) => handler.call(data, shared),
            Route::Options(handler) => handler.call(data, shared, Arc::clone(&self.app.methods)),
            Route::Unsupported => return Err(PipelineError::unsupported(&ctx.method)),
        };

        match AssertUnwindSafe(call).catch_unwind().await {
            Ok(result) => result.map_err(PipelineError::handler),
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                tracing::error!(request_id = %ctx.request_id, panic = %reason, "Handler panicked");
                Err(PipelineError::dispatch(format!("Handler panicked: {reason}")))
            }
        }
    }

    fn respond(&self, outcome: Outcome, ctx: &RequestContext) -> Response<Body> {
        if let Some(responder) = &self.app.responder {
            return responder.respond(outcome, ctx);
        }
        if ctx.connection().is_closed() {
            tracing::warn!(
                request_id = %ctx.request_id,
                connection_id = %ctx.connection().id(),
                "Connection closed before the response; write skipped"
            );
            return Response::new(Body::empty());
        }
        match outcome {
            Ok(result) => response::encode_result(result, &ctx.method),
            Err(err) => response::encode_error(&err, &ctx.method),
        }
    }
}

fn advance(stage: &mut Stage, next: Stage, ctx: &RequestContext) {
    tracing::trace!(request_id = %ctx.request_id, from = ?*stage, to = ?next, "Pipeline stage");
    *stage = next;
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
