//! Pipeline failures and their default status codes.

use axum::http::StatusCode;
use thiserror::Error;

use crate::pipeline::codec::DecodeError;
use crate::pipeline::method::Verb;

/// Failure reported by a loader, validator or method handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct StageError {
    pub message: String,
    pub status: Option<StatusCode>,
}

impl StageError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }
}

/// Where in the pipeline a request failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Decode,
    Loader,
    Validation,
    UnsupportedMethod,
    Dispatch,
    Handler,
}

impl ErrorKind {
    fn default_status(self) -> StatusCode {
        match self {
            ErrorKind::Loader | ErrorKind::Validation => StatusCode::FORBIDDEN,
            ErrorKind::Handler => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Decode | ErrorKind::UnsupportedMethod | ErrorKind::Dispatch => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Terminal error of one request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct PipelineError {
    kind: ErrorKind,
    message: String,
    status: Option<StatusCode>,
}

impl PipelineError {
    pub fn decode(err: &DecodeError, status: StatusCode) -> Self {
        Self {
            kind: ErrorKind::Decode,
            message: err.to_string(),
            status: Some(status),
        }
    }

    pub fn loader(err: StageError) -> Self {
        Self::from_stage(ErrorKind::Loader, err)
    }

    pub fn validation(err: StageError) -> Self {
        Self::from_stage(ErrorKind::Validation, err)
    }

    pub fn handler(err: StageError) -> Self {
        Self::from_stage(ErrorKind::Handler, err)
    }

    pub fn unsupported(verb: &Verb) -> Self {
        Self {
            kind: ErrorKind::UnsupportedMethod,
            message: format!("{verb} is not supported."),
            status: None,
        }
    }

    /// Handler panicked or otherwise failed without reporting.
    pub fn dispatch(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Dispatch,
            message: message.into(),
            status: None,
        }
    }

    fn from_stage(kind: ErrorKind, err: StageError) -> Self {
        Self {
            kind,
            message: err.message,
            status: err.status,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Explicit status if one was set, else the default for the stage.
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or_else(|| self.kind.default_status())
    }
}
