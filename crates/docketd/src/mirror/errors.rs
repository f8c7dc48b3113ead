//! Error types for the mirror connection.

use std::io;

use camino::Utf8PathBuf;
use docket_wire::WireError;
use thiserror::Error;

use crate::cancel::CancelCause;

/// Errors raised while connecting to or relaying through the mirror.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// The TCP connection could not be established.
    #[error("failed to connect to mirror {addr}: {source}")]
    Connect {
        /// Mirror address.
        addr: String,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },
    /// A PEM file could not be read.
    #[error("failed to read PEM file '{path}': {source}")]
    Pem {
        /// File that failed to load.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The key file holds no private key.
    #[error("no private key found in '{path}'")]
    MissingKey {
        /// File that was searched.
        path: Utf8PathBuf,
    },
    /// The mirror host is not a valid TLS server name.
    #[error("invalid TLS server name '{host}'")]
    InvalidServerName {
        /// Offending host.
        host: String,
    },
    /// TLS configuration was rejected.
    #[error("TLS configuration failed: {0}")]
    Tls(#[from] rustls::Error),
    /// The TLS handshake failed.
    #[error("TLS handshake with mirror failed: {source}")]
    Handshake {
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Sending the request or reading the response failed.
    #[error("mirror relay failed: {0}")]
    Relay(#[source] WireError),
    /// The request deadline passed before or during the relay.
    #[error("mirror relay exceeded the request deadline")]
    DeadlineExceeded,
    /// The request was cancelled before the relay.
    #[error("mirror relay cancelled: {cause}")]
    Cancelled {
        /// Cancellation cause.
        cause: CancelCause,
    },
    /// The client was closed, or broken by an earlier failure.
    #[error("mirror connection is closed")]
    Closed,
}
