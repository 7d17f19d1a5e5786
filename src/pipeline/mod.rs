//! Request pipeline subsystem.
//!
//! # Data Flow
//! ```text
//! hyper connection
//!     → driver.rs (Receiving: buffer body, build RequestContext)
//!     → codec.rs (Decoding by content type)
//!     → Loader / Validator (handler.rs contracts)
//!     → method.rs (closed match on Verb → handler slot)
//!     → ResponseHandler override, or http::response encoding
//! ```
//!
//! # Design Decisions
//! - One canonical stage signature: `(method, raw body, context)`
//! - Every stage failure becomes a PipelineError with a default status
//! - Handler panics are caught; they never take the worker down

pub mod codec;
pub mod context;
pub mod driver;
pub mod error;
pub mod handler;
pub mod method;

pub use codec::{Codec, CodecRegistry, DecodeError};
pub use context::RequestContext;
pub use driver::{Pipeline, Stage};
pub use error::{ErrorKind, PipelineError, StageError};
pub use handler::{
    Answer, HandlerError, HandlerResult, Loader, MessageHandler, MethodHandler, OptionsHandler,
    ResponseHandler, Validator,
};
pub use method::{MethodTable, Route, Verb};
