//! Error vocabulary shared by every stage of the dispatch pipeline.
//!
//! [`DispatchError`] is what the Dispatch Core records in the request context
//! and hands to `on_error` hooks. Handlers return [`HandlerError`]; the binder
//! returns [`BindingError`]. Each converts into exactly one `DispatchError`.

use http::StatusCode;
use thiserror::Error;
use tracing::warn;

/// Failure to bind request data onto a handler's input slots.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    /// A value was present for `slot` but could not be coerced to its type.
    #[error("cannot bind `{slot}`: {reason}")]
    Coercion { slot: String, reason: String },
    /// The request body as a whole was rejected (size limits, malformed multipart).
    #[error("request body rejected: {0}")]
    Body(String),
}

impl BindingError {
    pub(crate) fn coercion(slot: &str, reason: impl Into<String>) -> Self {
        Self::Coercion {
            slot: slot.to_string(),
            reason: reason.into(),
        }
    }

    /// Name of the slot that failed, if the failure is slot-specific.
    #[must_use]
    pub fn slot(&self) -> Option<&str> {
        match self {
            Self::Coercion { slot, .. } => Some(slot),
            Self::Body(_) => None,
        }
    }
}

/// Failure raised by a handler routine.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// A domain failure carrying its own status and message.
    #[error("{message}")]
    Business { status: u16, message: String },
    /// Anything unexpected.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl HandlerError {
    /// Domain failure with an explicit status code.
    ///
    /// Statuses outside 400..=599 are written as 500.
    pub fn business(status: u16, message: impl Into<String>) -> Self {
        Self::Business {
            status: business_status(status),
            message: message.into(),
        }
    }

    /// Unexpected failure with a plain message.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(anyhow::anyhow!(message.into()))
    }
}

impl From<BindingError> for HandlerError {
    fn from(err: BindingError) -> Self {
        Self::business(StatusCode::BAD_REQUEST.as_u16(), err.to_string())
    }
}

fn business_status(status: u16) -> u16 {
    if (400..=599).contains(&status) {
        status
    } else {
        warn!(status, "Business failure status is not an error status; using 500");
        StatusCode::INTERNAL_SERVER_ERROR.as_u16()
    }
}

/// Result type returned by handler routines.
pub type HandlerResult<T = crate::response::Response> = Result<T, HandlerError>;

/// Coarse classification of a [`DispatchError`], used by audit and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Unauthorized,
    BadRequest,
    Business,
    Internal,
}

/// Every way a single request can fail.
///
/// A verb mismatch against a registered operation is reported as
/// [`DispatchError::NotFound`]; no alternate verb is ever advertised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("no route for {method} {path}")]
    NotFound { method: String, path: String },
    #[error("unauthorized: {reason}")]
    Unauthorized { reason: String },
    #[error(transparent)]
    Binding(#[from] BindingError),
    #[error("{message}")]
    Business { status: u16, message: String },
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl DispatchError {
    pub fn not_found(method: impl ToString, path: impl Into<String>) -> Self {
        Self::NotFound {
            method: method.to_string(),
            path: path.into(),
        }
    }

    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized {
            reason: reason.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::Binding(_) => ErrorKind::BadRequest,
            Self::Business { .. } => ErrorKind::Business,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// HTTP status written for this failure.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND.as_u16(),
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED.as_u16(),
            Self::Binding(_) => StatusCode::BAD_REQUEST.as_u16(),
            Self::Business { status, .. } => *status,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
        }
    }

    /// Message safe to show the caller. Internal details stay in the logs.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Internal { .. } => "Internal Server Error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<HandlerError> for DispatchError {
    fn from(err: HandlerError) -> Self {
        match err {
            HandlerError::Business { status, message } => Self::Business {
                status: business_status(status),
                message,
            },
            HandlerError::Internal(e) => Self::Internal {
                message: format!("{e:#}"),
            },
        }
    }
}
