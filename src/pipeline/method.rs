//! HTTP verbs and the per-verb handler table.

use std::fmt;
use std::sync::Arc;

use axum::http::Method;

use crate::pipeline::handler::{MethodHandler, OptionsHandler};

/// Request method as seen by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
    /// Any method without a handler slot (TRACE, CONNECT, extensions).
    Unsupported(String),
}

impl Verb {
    pub fn as_str(&self) -> &str {
        match self {
            Verb::Get => "GET",
            Verb::Head => "HEAD",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Patch => "PATCH",
            Verb::Delete => "DELETE",
            Verb::Options => "OPTIONS",
            Verb::Unsupported(name) => name,
        }
    }
}

impl From<&Method> for Verb {
    fn from(method: &Method) -> Self {
        match *method {
            Method::GET => Verb::Get,
            Method::HEAD => Verb::Head,
            Method::POST => Verb::Post,
            Method::PUT => Verb::Put,
            Method::PATCH => Verb::Patch,
            Method::DELETE => Verb::Delete,
            Method::OPTIONS => Verb::Options,
            ref other => Verb::Unsupported(other.as_str().to_string()),
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handler selected for a request.
pub enum Route<'a> {
    Method(&'a Arc<dyn MethodHandler>),
    Options(&'a Arc<dyn OptionsHandler>),
    Unsupported,
}

/// Registered method handlers, one slot per supported verb.
#[derive(Default, Clone)]
pub struct MethodTable {
    get: Option<Arc<dyn MethodHandler>>,
    head: Option<Arc<dyn MethodHandler>>,
    post: Option<Arc<dyn MethodHandler>>,
    put: Option<Arc<dyn MethodHandler>>,
    patch: Option<Arc<dyn MethodHandler>>,
    delete: Option<Arc<dyn MethodHandler>>,
    options: Option<Arc<dyn OptionsHandler>>,
}

impl MethodTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `handler` for `verb`.
    ///
    /// Returns `false` for verbs without a plain handler slot (`OPTIONS`
    /// uses [`MethodTable::set_options`]; unsupported verbs have none).
    pub fn set(&mut self, verb: Verb, handler: Arc<dyn MethodHandler>) -> bool {
        let slot = match verb {
            Verb::Get => &mut self.get,
            Verb::Head => &mut self.head,
            Verb::Post => &mut self.post,
            Verb::Put => &mut self.put,
            Verb::Patch => &mut self.patch,
            Verb::Delete => &mut self.delete,
            Verb::Options | Verb::Unsupported(_) => return false,
        };
        *slot = Some(handler);
        true
    }

    pub fn set_options(&mut self, handler: Arc<dyn OptionsHandler>) {
        self.options = Some(handler);
    }

    /// Select the handler for `verb`.
    pub fn route(&self, verb: &Verb) -> Route<'_> {
        let slot = match verb {
            Verb::Get => &self.get,
            Verb::Head => &self.head,
            Verb::Post => &self.post,
            Verb::Put => &self.put,
            Verb::Patch => &self.patch,
            Verb::Delete => &self.delete,
            Verb::Options => {
                return self
                    .options
                    .as_ref()
                    .map_or(Route::Unsupported, Route::Options)
            }
            Verb::Unsupported(_) => return Route::Unsupported,
        };
        slot.as_ref().map_or(Route::Unsupported, Route::Method)
    }

    /// Verbs with a registered handler, in a stable order.
    pub fn verbs(&self) -> Vec<Verb> {
        [
            (Verb::Get, self.get.is_some()),
            (Verb::Head, self.head.is_some()),
            (Verb::Post, self.post.is_some()),
            (Verb::Put, self.put.is_some()),
            (Verb::Patch, self.patch.is_some()),
            (Verb::Delete, self.delete.is_some()),
            (Verb::Options, self.options.is_some()),
        ]
        .into_iter()
        .filter_map(|(verb, registered)| registered.then_some(verb))
        .collect()
    }
}

impl fmt::Debug for MethodTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.verbs()).finish()
    }
}
