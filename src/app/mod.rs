//! User application: handlers, pipeline stages and lifecycle hooks.
//!
//! # Data Flow
//! ```text
//! main()
//!     → Application::builder() registers collaborators
//!     → launch(config, app)
//!         primary: only asks whether a singleton hook exists
//!         worker:  Arc<Application> shared by the pipeline and runtime
//! ```

pub mod hooks;

use std::fmt;
use std::sync::Arc;

use crate::pipeline::codec::{Codec, CodecRegistry};
use crate::pipeline::handler::{
    Loader, MessageHandler, MethodHandler, OptionsHandler, ResponseHandler, Validator,
};
use crate::pipeline::method::{MethodTable, Verb};

pub use hooks::{SavedState, SingletonHook, SingletonPhase, StartHook, StopHook};

/// Everything the user plugs into the cluster.
#[derive(Clone, Default)]
pub struct Application {
    pub(crate) methods: Arc<MethodTable>,
    pub(crate) loader: Option<Arc<dyn Loader>>,
    pub(crate) validator: Option<Arc<dyn Validator>>,
    pub(crate) responder: Option<Arc<dyn ResponseHandler>>,
    pub(crate) codecs: CodecRegistry,
    pub(crate) init: Option<Arc<dyn StartHook>>,
    pub(crate) shutdown: Option<Arc<dyn StopHook>>,
    pub(crate) singleton: Option<Arc<dyn SingletonHook>>,
    pub(crate) ipm: Option<Arc<dyn MessageHandler>>,
}

impl Application {
    pub fn builder() -> ApplicationBuilder {
        ApplicationBuilder::default()
    }

    pub fn methods(&self) -> &Arc<MethodTable> {
        &self.methods
    }

    /// True when a singleton hook is registered.
    pub fn has_singleton(&self) -> bool {
        self.singleton.is_some()
    }
}

impl fmt::Debug for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Application")
            .field("methods", &self.methods)
            .field("loader", &self.loader.is_some())
            .field("validator", &self.validator.is_some())
            .field("responder", &self.responder.is_some())
            .field("codecs", &self.codecs)
            .field("init", &self.init.is_some())
            .field("shutdown", &self.shutdown.is_some())
            .field("singleton", &self.singleton.is_some())
            .field("ipm", &self.ipm.is_some())
            .finish()
    }
}

/// Builder for [`Application`].
#[derive(Default)]
pub struct ApplicationBuilder {
    methods: MethodTable,
    app: Application,
}

impl ApplicationBuilder {
    /// Register `handler` for `verb`. Verbs without a handler slot are ignored
    /// with a warning.
    pub fn method(mut self, verb: Verb, handler: impl MethodHandler) -> Self {
        if !self.methods.set(verb.clone(), Arc::new(handler)) {
            tracing::warn!(method = %verb, "No handler slot for method; registration ignored");
        }
        self
    }

    pub fn get(self, handler: impl MethodHandler) -> Self {
        self.method(Verb::Get, handler)
    }

    pub fn head(self, handler: impl MethodHandler) -> Self {
        self.method(Verb::Head, handler)
    }

    pub fn post(self, handler: impl MethodHandler) -> Self {
        self.method(Verb::Post, handler)
    }

    pub fn put(self, handler: impl MethodHandler) -> Self {
        self.method(Verb::Put, handler)
    }

    pub fn patch(self, handler: impl MethodHandler) -> Self {
        self.method(Verb::Patch, handler)
    }

    pub fn delete(self, handler: impl MethodHandler) -> Self {
        self.method(Verb::Delete, handler)
    }

    pub fn options(mut self, handler: impl OptionsHandler) -> Self {
        self.methods.set_options(Arc::new(handler));
        self
    }

    pub fn loader(mut self, loader: impl Loader) -> Self {
        self.app.loader = Some(Arc::new(loader));
        self
    }

    pub fn validate(mut self, validator: impl Validator) -> Self {
        self.app.validator = Some(Arc::new(validator));
        self
    }

    pub fn response_handler(mut self, responder: impl ResponseHandler) -> Self {
        self.app.responder = Some(Arc::new(responder));
        self
    }

    /// Register a body codec for a media type.
    pub fn codec(mut self, media_type: &str, codec: impl Codec) -> Self {
        self.app.codecs.register(media_type, Arc::new(codec));
        self
    }

    pub fn init(mut self, hook: impl StartHook) -> Self {
        self.app.init = Some(Arc::new(hook));
        self
    }

    pub fn shutdown(mut self, hook: impl StopHook) -> Self {
        self.app.shutdown = Some(Arc::new(hook));
        self
    }

    pub fn singleton(mut self, hook: impl SingletonHook) -> Self {
        self.app.singleton = Some(Arc::new(hook));
        self
    }

    /// Handler for broadcasts relayed by the primary.
    pub fn ipm(mut self, handler: impl MessageHandler) -> Self {
        self.app.ipm = Some(Arc::new(handler));
        self
    }

    pub fn build(self) -> Application {
        Application {
            methods: Arc::new(self.methods),
            ..self.app
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::Value;

    use super::*;
    use crate::pipeline::context::RequestContext;
    use crate::pipeline::handler::{HandlerError, HandlerResult};
    use crate::worker::WorkerContext;

    async fn ok(_: Value, _: Arc<RequestContext>) -> Result<HandlerResult, HandlerError> {
        Ok(HandlerResult::empty())
    }

    #[test]
    fn builder_collects_collaborators() {
        let app = Application::builder()
            .get(ok)
            .post(ok)
            .singleton(|_ctx: WorkerContext, _phase: SingletonPhase| async { None::<Value> })
            .build();

        assert_eq!(app.methods().verbs(), vec![Verb::Get, Verb::Post]);
        assert!(app.has_singleton());
        assert!(app.loader.is_none());
    }

    #[test]
    fn unsupported_verbs_are_not_registered() {
        let app = Application::builder()
            .method(Verb::Unsupported("TRACE".into()), ok)
            .build();
        assert!(app.methods().verbs().is_empty());
    }
}
