//! Reasons a connection stops serving requests.

use docket_wire::WireError;
use thiserror::Error;

use crate::cancel::CancelCause;
use crate::router::RouteError;

/// Terminal outcome of a connection; every run ends with one.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The client closed the connection between messages.
    #[error("client closed the connection")]
    Closed,
    /// Reading a request failed or the frame was malformed.
    #[error("failed to read request: {0}")]
    Read(#[source] WireError),
    /// Writing a response failed.
    #[error("failed to write response: {0}")]
    Write(#[source] WireError),
    /// A response asked for the connection to be closed.
    #[error("response to request {request_id} closed the connection")]
    CloseRequested {
        /// Identifier of the request that triggered the close.
        request_id: i32,
    },
    /// The connection token was cancelled.
    #[error("connection cancelled: {cause}")]
    Cancelled {
        /// Cancellation cause.
        cause: CancelCause,
    },
    /// Routing failed in a way that ends the connection.
    #[error(transparent)]
    Route(#[from] RouteError),
    /// Request handling panicked.
    #[error("request handling panicked: {message}")]
    Panic {
        /// Panic payload text.
        message: String,
    },
}

impl ConnectionError {
    /// Whether the client ended the connection cleanly.
    #[must_use]
    pub const fn is_clean_eof(&self) -> bool {
        matches!(self, Self::Closed)
    }
}
