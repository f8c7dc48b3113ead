//! Per-connection request loop.
//!
//! A [`Connection`] reads one request, resolves one response through its
//! [`ModeRouter`], writes it, and repeats until the client disconnects, a
//! response asks to close, the token is cancelled, or handling panics.
//!
//! Cancellation unblocks the pending read from a watcher thread that shuts
//! down the read half of the socket and interrupts any mirror relay in
//! progress. Panics are contained here and nowhere else, so a faulty handler
//! ends its own connection without taking the server down.

mod capture;
mod errors;
mod trace;

use std::io::{BufReader, BufWriter, Read, Write};
use std::panic::{self, AssertUnwindSafe};
use std::thread;

use camino::{Utf8Path, Utf8PathBuf};
use docket_wire::{WireError, read_frame, write_message};
use tracing::{Level, debug, error, warn};

use self::capture::CaptureReader;
pub use self::errors::ConnectionError;
use crate::cancel::{CancelCause, CancellationToken};
use crate::message::{ConnectionInfo, Request, ResponseIds};
use crate::mirror::MirrorInterrupt;
use crate::protocol_error::panic_message;
use crate::router::ModeRouter;
use crate::transport::ConnectionStream;

pub(crate) const CONN_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::conn");

/// One client connection and its routing state.
#[derive(Debug)]
pub struct Connection {
    stream: ConnectionStream,
    router: ModeRouter,
    info: ConnectionInfo,
    ids: ResponseIds,
    capture_dir: Option<Utf8PathBuf>,
}

impl Connection {
    /// Prepares a connection; nothing is read until [`Connection::run`].
    #[must_use]
    pub fn new(
        stream: ConnectionStream,
        router: ModeRouter,
        info: ConnectionInfo,
        capture_dir: Option<&Utf8Path>,
    ) -> Self {
        Self {
            stream,
            router,
            info,
            ids: ResponseIds::default(),
            capture_dir: capture_dir.map(Utf8Path::to_path_buf),
        }
    }

    /// Serves requests until the connection ends and returns why it ended.
    ///
    /// The stream is released when the connection is dropped.
    pub fn run(mut self, token: &CancellationToken) -> ConnectionError {
        let watch = token.child_token();
        let mirror = self.router.mirror_interrupt();
        let outcome = thread::scope(|scope| {
            match self.stream.try_clone() {
                Ok(waker) => {
                    let watch = &watch;
                    scope.spawn(move || unblock_on_cancel(watch, token, &waker, mirror.as_ref()));
                }
                Err(error) => warn!(
                    target: CONN_TARGET,
                    connection_id = self.info.connection_id,
                    error = %error,
                    "cannot watch for cancellation"
                ),
            }
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.serve(token)));
            watch.cancel(CancelCause::ConnectionFinished);
            outcome
        });
        self.router.close();

        let outcome = outcome.unwrap_or_else(|payload| {
            let message = panic_message(payload.as_ref());
            error!(
                target: CONN_TARGET,
                connection_id = self.info.connection_id,
                panic = true,
                message = %message,
                "request handling panicked; closing connection"
            );
            ConnectionError::Panic { message }
        });
        debug!(
            target: CONN_TARGET,
            connection_id = self.info.connection_id,
            reason = %outcome,
            "connection finished"
        );
        outcome
    }

    fn serve(&mut self, token: &CancellationToken) -> ConnectionError {
        let reader = match self.stream.try_clone() {
            Ok(reader) => reader,
            Err(error) => return ConnectionError::Read(WireError::Io(error)),
        };
        let mut reader = BufReader::new(CaptureReader::new(reader, self.capture_dir.as_deref()));
        let Self {
            stream,
            router,
            info,
            ids,
            ..
        } = self;
        let mut writer = BufWriter::new(stream);

        let outcome = loop {
            if let Err(error) = process_message(token, &mut reader, &mut writer, router, info, ids)
            {
                break error;
            }
        };
        reader.into_inner().finish(outcome.is_clean_eof());
        outcome
    }
}

/// Reads, routes, and answers exactly one request.
fn process_message<R: Read, W: Write>(
    token: &CancellationToken,
    reader: &mut R,
    writer: &mut W,
    router: &mut ModeRouter,
    info: &ConnectionInfo,
    ids: &mut ResponseIds,
) -> Result<(), ConnectionError> {
    if let Some(cause) = token.cause() {
        return Err(ConnectionError::Cancelled { cause });
    }
    let frame = read_frame(reader).map_err(|error| read_failure(token, error))?;
    let request = Request::decode(frame).map_err(ConnectionError::Read)?;

    let span = trace::request_span(&request);
    let _entered = span.enter();
    if tracing::enabled!(target: CONN_TARGET, Level::DEBUG) {
        let body = match &request.body {
            Ok(body) => body.render(),
            Err(error) => format!("<undecodable: {error}>"),
        };
        debug!(target: CONN_TARGET, header = %request.header, "request:\n{body}");
    }

    let response = router
        .route(token, info, &request, ids)
        .map_err(|error| match token.cause() {
            Some(cause) => ConnectionError::Cancelled { cause },
            None => error.into(),
        })?;
    if let Some(body) = &response.body {
        write_message(writer, &response.header, body).map_err(ConnectionError::Write)?;
        writer
            .flush()
            .map_err(|error| ConnectionError::Write(WireError::Io(error)))?;
    }
    if response.close_connection {
        return Err(ConnectionError::CloseRequested {
            request_id: request.header.request_id,
        });
    }
    Ok(())
}

fn read_failure(token: &CancellationToken, error: WireError) -> ConnectionError {
    if let Some(cause) = token.cause() {
        ConnectionError::Cancelled { cause }
    } else if error.is_zero_read() {
        ConnectionError::Closed
    } else {
        ConnectionError::Read(error)
    }
}

fn unblock_on_cancel(
    watch: &CancellationToken,
    token: &CancellationToken,
    waker: &ConnectionStream,
    mirror: Option<&MirrorInterrupt>,
) {
    watch.wait();
    if !token.is_cancelled() {
        return;
    }
    if let Err(error) = waker.shutdown_read() {
        warn!(
            target: CONN_TARGET,
            error = %error,
            "failed to unblock connection read"
        );
    }
    if let Some(mirror) = mirror {
        mirror.interrupt();
    }
}

#[cfg(all(test, unix))]
mod tests;
