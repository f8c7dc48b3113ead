//! Client relaying raw requests to a mirror server.
//!
//! A [`MirrorClient`] owns one persistent connection, optionally secured with
//! TLS, and carries one request at a time. The first relay failure breaks the
//! client for good: there is no reconnect, so a connection in a dual mode
//! never silently loses its comparison partner.
//!
//! A relay blocked on a silent mirror is released through a
//! [`MirrorInterrupt`] taken before the connection starts serving.

mod errors;
mod tls;

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

use docket_config::MirrorEndpoint;
use docket_wire::{WireError, read_frame};
use tracing::{debug, warn};

pub use self::errors::MirrorError;
use self::tls::TlsStream;
use crate::cancel::CancellationToken;

pub(crate) const MIRROR_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::mirror");

enum MirrorStream {
    Plain(TcpStream),
    Tls(Box<TlsStream>),
}

impl MirrorStream {
    fn tcp(&self) -> &TcpStream {
        match self {
            Self::Plain(stream) => stream,
            Self::Tls(stream) => &stream.sock,
        }
    }

    fn set_timeouts(&self, timeout: Option<Duration>) -> io::Result<()> {
        let tcp = self.tcp();
        tcp.set_read_timeout(timeout)?;
        tcp.set_write_timeout(timeout)
    }
}

impl Read for MirrorStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Plain(stream) => stream.read(buf),
            Self::Tls(stream) => stream.read(buf),
        }
    }
}

impl Write for MirrorStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(stream) => stream.write(buf),
            Self::Tls(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(stream) => stream.flush(),
            Self::Tls(stream) => stream.flush(),
        }
    }
}

/// Persistent connection to the mirror server.
pub struct MirrorClient {
    addr: String,
    stream: Option<MirrorStream>,
}

impl std::fmt::Debug for MirrorClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MirrorClient")
            .field("addr", &self.addr)
            .field("open", &self.stream.is_some())
            .finish()
    }
}

impl MirrorClient {
    /// Connects to `endpoint`, completing the TLS handshake when configured.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError`] when the socket cannot be opened or TLS setup fails.
    pub fn connect(endpoint: &MirrorEndpoint) -> Result<Self, MirrorError> {
        let tcp = TcpStream::connect(endpoint.addr.as_str()).map_err(|source| {
            MirrorError::Connect {
                addr: endpoint.addr.clone(),
                source,
            }
        })?;
        tcp.set_nodelay(true).map_err(|source| MirrorError::Connect {
            addr: endpoint.addr.clone(),
            source,
        })?;

        let stream = match &endpoint.tls {
            Some(settings) => {
                MirrorStream::Tls(Box::new(tls::handshake(endpoint.host(), settings, tcp)?))
            }
            None => MirrorStream::Plain(tcp),
        };
        debug!(
            target: MIRROR_TARGET,
            addr = %endpoint.addr,
            tls = endpoint.tls.is_some(),
            "connected to mirror"
        );
        Ok(Self {
            addr: endpoint.addr.clone(),
            stream: Some(stream),
        })
    }

    /// Address of the mirror.
    #[must_use]
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Whether the client can still relay.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Returns a handle that aborts a relay blocked on this connection.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::Closed`] for a closed client, or the socket
    /// error when the handle cannot be cloned.
    pub fn interrupt_handle(&self) -> Result<MirrorInterrupt, MirrorError> {
        let stream = self.stream.as_ref().ok_or(MirrorError::Closed)?;
        let socket = stream
            .tcp()
            .try_clone()
            .map_err(|error| MirrorError::Relay(WireError::Io(error)))?;
        Ok(MirrorInterrupt {
            addr: self.addr.clone(),
            socket,
        })
    }

    /// Sends one raw frame and returns the mirror's raw response frame.
    ///
    /// The token's remaining time bounds both the write and the read. A relay
    /// aborted through a [`MirrorInterrupt`] after the token was cancelled
    /// reports [`MirrorError::Cancelled`].
    ///
    /// # Errors
    ///
    /// Any failure is returned once and closes the client; later calls fail
    /// with [`MirrorError::Closed`].
    pub fn relay(&mut self, token: &CancellationToken, raw: &[u8]) -> Result<Vec<u8>, MirrorError> {
        if let Some(cause) = token.cause() {
            return Err(MirrorError::Cancelled { cause });
        }
        let Some(stream) = self.stream.as_mut() else {
            return Err(MirrorError::Closed);
        };

        let result = exchange(stream, token.remaining(), raw).map_err(|error| {
            token
                .cause()
                .map_or(error, |cause| MirrorError::Cancelled { cause })
        });
        if let Err(error) = &result {
            warn!(
                target: MIRROR_TARGET,
                addr = %self.addr,
                error = %error,
                "mirror relay failed; closing mirror connection"
            );
            self.close();
        }
        result
    }

    /// Releases the connection. Calling it again does nothing.
    pub fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(error) = stream.tcp().shutdown(Shutdown::Both)
                && error.kind() != io::ErrorKind::NotConnected
            {
                debug!(
                    target: MIRROR_TARGET,
                    addr = %self.addr,
                    error = %error,
                    "mirror socket shutdown failed"
                );
            }
        }
    }
}

impl Drop for MirrorClient {
    fn drop(&mut self) {
        self.close();
    }
}

/// Shuts the mirror socket down from another thread.
#[derive(Debug)]
pub struct MirrorInterrupt {
    addr: String,
    socket: TcpStream,
}

impl MirrorInterrupt {
    /// Unblocks any pending relay; the client fails every later relay.
    pub fn interrupt(&self) {
        if let Err(error) = self.socket.shutdown(Shutdown::Both)
            && error.kind() != io::ErrorKind::NotConnected
        {
            debug!(
                target: MIRROR_TARGET,
                addr = %self.addr,
                error = %error,
                "mirror socket interrupt failed"
            );
        }
    }
}

fn exchange(
    stream: &mut MirrorStream,
    remaining: Option<Duration>,
    raw: &[u8],
) -> Result<Vec<u8>, MirrorError> {
    if remaining.is_some_and(|left| left.is_zero()) {
        return Err(MirrorError::DeadlineExceeded);
    }
    stream.set_timeouts(remaining).map_err(relay_error)?;
    stream.write_all(raw).map_err(relay_error)?;
    stream.flush().map_err(relay_error)?;
    read_frame(stream).map_err(|error| match error {
        WireError::Io(source) => relay_error(source),
        other => MirrorError::Relay(other),
    })
}

fn relay_error(error: io::Error) -> MirrorError {
    match error.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => MirrorError::DeadlineExceeded,
        _ => MirrorError::Relay(WireError::Io(error)),
    }
}
