//! Unified error type.

use crate::status::Status;

/// Boxed error accepted by [`Error::other`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Shorthand used by every fallible operation in ply.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The error type returned by middleware and by ply's own fallible operations.
///
/// Whatever a middleware returns ends up at the error boundary, which turns it
/// into an HTTP response. [`Error::status`] decides the status code; anything
/// without a declared status becomes `500 Internal Server Error`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The resolved status code is not a registered HTTP status.
    #[error("invalid status code: {0}")]
    InvalidStatusCode(u16),

    /// A `Next` was run more than once.
    #[error("next() called multiple times")]
    DuplicateNextInvocation,

    /// The client closed the connection before a response was produced.
    #[error("connection closed before the response was sent")]
    ConnectionClosed,

    /// Headers were modified after they had been flushed.
    #[error("cannot modify headers after they are sent")]
    HeadersSent,

    /// A failure carrying the status the client should see.
    #[error("{message}")]
    Http { status: u16, message: String },

    /// Rendering a view failed or no view engine is installed.
    #[error("view: {0}")]
    View(String),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(BoxError),
}

impl Error {
    /// A failure that should be answered with `status`.
    ///
    /// `message` is only shown to clients in development mode.
    pub fn http(status: Status, message: impl Into<String>) -> Self {
        Self::Http { status: status.into(), message: message.into() }
    }

    /// Wraps any error type.
    pub fn other(err: impl Into<BoxError>) -> Self {
        Self::Other(err.into())
    }

    /// The status code this failure declares, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Full diagnostic text: the message followed by every `source()` in the chain.
    pub(crate) fn diagnostic(&self) -> String {
        let mut out = format!("{self}");
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            out.push_str("\n  caused by: ");
            out.push_str(&cause.to_string());
            source = cause.source();
        }
        out
    }
}
