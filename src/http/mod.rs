//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Shared listener (SO_REUSEPORT)
//!     → server.rs (hyper HTTP/1, Axum middleware, request ID)
//!     → request.rs (remote address, path, RequestContext)
//!     → pipeline (decode, load, validate, dispatch)
//!     → response.rs (default encoding) or the user's ResponseHandler
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::HttpServer;
