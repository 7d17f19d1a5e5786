//! Request-side helpers for the Receiving stage.
//!
//! # Responsibilities
//! - Resolve the client address (first `x-forwarded-for` entry, else peer)
//! - Strip the leading `/` from the path while keeping the query string
//! - Build the [`RequestContext`] once the body is complete
//!
//! # Design Decisions
//! - Request ID is assigned by `SetRequestIdLayer` before the pipeline runs
//! - Forwarded headers are trusted as-is; the cluster is meant to sit
//!   behind a proxy it controls

use std::net::SocketAddr;

use axum::http::request::Parts;
use axum::http::{HeaderMap, Uri};
use bytes::Bytes;

use crate::ipc::Broadcaster;
use crate::net::ConnectionHandle;
use crate::pipeline::context::RequestContext;
use crate::pipeline::method::Verb;

/// Header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// First `x-forwarded-for` entry when present, else the peer IP.
pub fn remote_address(headers: &HeaderMap, peer: SocketAddr) -> String {
    headers
        .get(X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| peer.ip().to_string())
}

/// Path and query with the leading `/` removed.
pub fn request_path(uri: &Uri) -> String {
    let full = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());
    full.strip_prefix('/').unwrap_or(full).to_string()
}

pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

/// Assemble the per-request context from the received parts and body.
pub fn build_context(
    parts: Parts,
    body: Bytes,
    peer: SocketAddr,
    connection: ConnectionHandle,
    broadcaster: Broadcaster,
) -> RequestContext {
    let remote = remote_address(&parts.headers, peer);
    RequestContext::new(
        request_id(&parts.headers),
        Verb::from(&parts.method),
        request_path(&parts.uri),
        parts.headers,
        body,
        remote,
        connection,
        broadcaster,
    )
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderValue, Request};

    use super::*;

    fn peer() -> SocketAddr {
        "10.0.0.9:5123".parse().unwrap()
    }

    #[test]
    fn forwarded_for_wins_over_peer() {
        let mut headers = HeaderMap::new();
        headers.insert(
            X_FORWARDED_FOR,
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        assert_eq!(remote_address(&headers, peer()), "203.0.113.7");
        assert_eq!(remote_address(&HeaderMap::new(), peer()), "10.0.0.9");
    }

    #[test]
    fn path_keeps_query_without_leading_slash() {
        let uri: Uri = "/users/42?full=1".parse().unwrap();
        assert_eq!(request_path(&uri), "users/42?full=1");
        assert_eq!(request_path(&"/".parse().unwrap()), "");
    }

    #[test]
    fn context_carries_request_parts() {
        let request = Request::builder()
            .method("PATCH")
            .uri("/items/1")
            .header(X_REQUEST_ID, "abc")
            .header("content-type", "text/plain")
            .body(())
            .unwrap();
        let (parts, _) = request.into_parts();

        let ctx = build_context(
            parts,
            Bytes::from_static(b"hi"),
            peer(),
            ConnectionHandle::detached(),
            Broadcaster::detached(),
        );
        assert_eq!(ctx.request_id, "abc");
        assert_eq!(ctx.method, Verb::Patch);
        assert_eq!(ctx.path, "items/1");
        assert_eq!(ctx.content_type.as_deref(), Some("text/plain"));
        assert_eq!(ctx.raw_body, Bytes::from_static(b"hi"));
    }
}
