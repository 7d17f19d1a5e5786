//! Collaborator contracts called by the pipeline.
//!
//! Method, `OPTIONS` and message handlers are also implemented for plain
//! async closures with the matching argument list.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Response, StatusCode};
use bytes::Bytes;
use serde_json::Value;

use crate::ipc::BroadcastMessage;
use crate::pipeline::context::RequestContext;
use crate::pipeline::error::{PipelineError, StageError};
use crate::pipeline::method::{MethodTable, Verb};

/// Failure reported by a method handler (503 unless a status is set).
pub type HandlerError = StageError;

/// Payload of a successful handler call.
#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    Empty,
    Text(String),
    Json(Value),
}

impl From<Value> for Answer {
    fn from(value: Value) -> Self {
        Answer::Json(value)
    }
}

impl From<String> for Answer {
    fn from(text: String) -> Self {
        Answer::Text(text)
    }
}

impl From<&str> for Answer {
    fn from(text: &str) -> Self {
        Answer::Text(text.to_string())
    }
}

/// What a method handler produced.
#[derive(Debug, Clone)]
pub struct HandlerResult {
    pub status: StatusCode,
    pub answer: Answer,
    pub headers: HeaderMap,
}

impl HandlerResult {
    pub fn new(status: StatusCode, answer: impl Into<Answer>) -> Self {
        Self {
            status,
            answer: answer.into(),
            headers: HeaderMap::new(),
        }
    }

    /// `200 OK` with `answer`.
    pub fn ok(answer: impl Into<Answer>) -> Self {
        Self::new(StatusCode::OK, answer)
    }

    /// `200 OK` with no payload.
    pub fn empty() -> Self {
        Self::new(StatusCode::OK, Answer::Empty)
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// Handler for one HTTP verb.
#[async_trait]
pub trait MethodHandler: Send + Sync + 'static {
    async fn call(
        &self,
        data: Value,
        ctx: Arc<RequestContext>,
    ) -> Result<HandlerResult, HandlerError>;
}

#[async_trait]
impl<F, Fut> MethodHandler for F
where
    F: Fn(Value, Arc<RequestContext>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<HandlerResult, HandlerError>> + Send + 'static,
{
    async fn call(
        &self,
        data: Value,
        ctx: Arc<RequestContext>,
    ) -> Result<HandlerResult, HandlerError> {
        (self)(data, ctx).await
    }
}

/// `OPTIONS` handler; also receives the handler table for introspection.
#[async_trait]
pub trait OptionsHandler: Send + Sync + 'static {
    async fn call(
        &self,
        data: Value,
        ctx: Arc<RequestContext>,
        methods: Arc<MethodTable>,
    ) -> Result<HandlerResult, HandlerError>;
}

#[async_trait]
impl<F, Fut> OptionsHandler for F
where
    F: Fn(Value, Arc<RequestContext>, Arc<MethodTable>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<HandlerResult, HandlerError>> + Send + 'static,
{
    async fn call(
        &self,
        data: Value,
        ctx: Arc<RequestContext>,
        methods: Arc<MethodTable>,
    ) -> Result<HandlerResult, HandlerError> {
        (self)(data, ctx, methods).await
    }
}

/// Runs before validation; may attach data to the context or reject.
#[async_trait]
pub trait Loader: Send + Sync + 'static {
    async fn load(
        &self,
        method: &Verb,
        raw: &Bytes,
        ctx: &mut RequestContext,
    ) -> Result<(), StageError>;
}

/// Accepts or rejects a request before dispatch.
#[async_trait]
pub trait Validator: Send + Sync + 'static {
    async fn validate(
        &self,
        method: &Verb,
        raw: &Bytes,
        ctx: &RequestContext,
    ) -> Result<(), StageError>;
}

/// Replaces the default response encoding entirely.
pub trait ResponseHandler: Send + Sync + 'static {
    fn respond(
        &self,
        outcome: Result<HandlerResult, PipelineError>,
        ctx: &RequestContext,
    ) -> Response<Body>;
}

impl<F> ResponseHandler for F
where
    F: Fn(Result<HandlerResult, PipelineError>, &RequestContext) -> Response<Body>
        + Send
        + Sync
        + 'static,
{
    fn respond(
        &self,
        outcome: Result<HandlerResult, PipelineError>,
        ctx: &RequestContext,
    ) -> Response<Body> {
        (self)(outcome, ctx)
    }
}

/// Receives broadcasts relayed by the primary (the `IPM` method).
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    async fn on_message(&self, message: BroadcastMessage);
}

#[async_trait]
impl<F, Fut> MessageHandler for F
where
    F: Fn(BroadcastMessage) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn on_message(&self, message: BroadcastMessage) {
        (self)(message).await
    }
}
