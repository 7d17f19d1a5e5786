//! Worker lifecycle hooks.
//!
//! A start hook returns the worker's saved state; the matching stop hook
//! gets it back at shutdown. Normal workers run `init`/`shutdown`, the
//! singleton worker runs its singleton hook twice instead.

use std::future::Future;

use async_trait::async_trait;
use serde_json::Value;

use crate::worker::WorkerContext;

/// Opaque value handed from a start hook to the matching stop hook.
pub type SavedState = Option<Value>;

/// Phase passed to the singleton hook.
#[derive(Debug, Clone, PartialEq)]
pub enum SingletonPhase {
    Starting,
    Stopping(SavedState),
}

#[async_trait]
pub trait StartHook: Send + Sync + 'static {
    async fn start(&self, ctx: WorkerContext) -> SavedState;
}

#[async_trait]
impl<F, Fut> StartHook for F
where
    F: Fn(WorkerContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = SavedState> + Send + 'static,
{
    async fn start(&self, ctx: WorkerContext) -> SavedState {
        (self)(ctx).await
    }
}

#[async_trait]
pub trait StopHook: Send + Sync + 'static {
    async fn stop(&self, ctx: WorkerContext, saved: SavedState);
}

#[async_trait]
impl<F, Fut> StopHook for F
where
    F: Fn(WorkerContext, SavedState) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn stop(&self, ctx: WorkerContext, saved: SavedState) {
        (self)(ctx, saved).await
    }
}

/// Runs on the singleton worker only. The value returned for
/// [`SingletonPhase::Starting`] becomes the saved state; the value returned
/// when stopping is ignored.
#[async_trait]
pub trait SingletonHook: Send + Sync + 'static {
    async fn call(&self, ctx: WorkerContext, phase: SingletonPhase) -> SavedState;
}

#[async_trait]
impl<F, Fut> SingletonHook for F
where
    F: Fn(WorkerContext, SingletonPhase) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = SavedState> + Send + 'static,
{
    async fn call(&self, ctx: WorkerContext, phase: SingletonPhase) -> SavedState {
        (self)(ctx, phase).await
    }
}
