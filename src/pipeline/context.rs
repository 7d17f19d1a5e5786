//! Per-request record shared by every pipeline stage.

use axum::http::HeaderMap;
use bytes::Bytes;
use serde_json::{Map, Value};

use crate::ipc::{BroadcastMessage, Broadcaster, IpcError};
use crate::net::ConnectionHandle;
use crate::pipeline::method::Verb;

/// Everything known about one request once its body has been received.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Value of `x-request-id`.
    pub request_id: String,
    pub method: Verb,
    /// Path and query with the leading `/` removed.
    pub path: String,
    pub headers: HeaderMap,
    pub raw_body: Bytes,
    pub content_type: Option<String>,
    /// First `x-forwarded-for` entry, else the peer address.
    pub remote_address: String,
    decoded: Option<Value>,
    locals: Map<String, Value>,
    connection: ConnectionHandle,
    broadcaster: Broadcaster,
}

impl RequestContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        request_id: String,
        method: Verb,
        path: String,
        headers: HeaderMap,
        raw_body: Bytes,
        remote_address: String,
        connection: ConnectionHandle,
        broadcaster: Broadcaster,
    ) -> Self {
        let content_type = headers
            .get(axum::http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Self {
            request_id,
            method,
            path,
            headers,
            raw_body,
            content_type,
            remote_address,
            decoded: None,
            locals: Map::new(),
            connection,
            broadcaster,
        }
    }

    /// Decoded body; `None` until the decoding stage ran.
    pub fn decoded(&self) -> Option<&Value> {
        self.decoded.as_ref()
    }

    pub(crate) fn set_decoded(&mut self, value: Value) {
        self.decoded = Some(value);
    }

    /// Attach side-channel data (typically from a loader).
    pub fn insert_local(&mut self, key: impl Into<String>, value: Value) {
        self.locals.insert(key.into(), value);
    }

    pub fn local(&self, key: &str) -> Option<&Value> {
        self.locals.get(key)
    }

    pub fn locals(&self) -> &Map<String, Value> {
        &self.locals
    }

    pub fn connection(&self) -> &ConnectionHandle {
        &self.connection
    }

    /// Publish a message to every live worker through the primary.
    pub fn broadcast(&self, message: BroadcastMessage) -> Result<(), IpcError> {
        self.broadcaster.broadcast(message)
    }
}
