//! Error types for request routing.

use docket_config::Mode;
use docket_wire::WireError;
use thiserror::Error;

use crate::mirror::MirrorError;

/// Errors raised while building a router for a new connection.
#[derive(Debug, Error)]
pub enum RouterError {
    /// The mode relays to a mirror but none was configured.
    #[error("mode '{mode}' requires a mirror endpoint")]
    MirrorRequired {
        /// Requested mode.
        mode: Mode,
    },
    /// The mirror connection could not be opened.
    #[error(transparent)]
    Mirror(#[from] MirrorError),
}

/// Errors that end the connection a request arrived on.
#[derive(Debug, Error)]
pub enum RouteError {
    /// Relaying to the mirror failed; the comparison partner is gone.
    #[error("mirror relay failed: {0}")]
    Mirror(#[from] MirrorError),
    /// The mirror answered with a frame that could not be decoded.
    #[error("mirror sent an undecodable response: {0}")]
    MirrorFrame(#[source] WireError),
}
