//! Connection handler wiring the listener to the request loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use camino::Utf8PathBuf;
use docket_config::{MirrorEndpoint, Mode};
use tracing::{debug, info, warn};

use crate::cancel::CancellationToken;
use crate::conn::{CONN_TARGET, Connection};
use crate::dispatch::CommandTable;
use crate::message::ConnectionInfo;
use crate::metrics::ConnMetrics;
use crate::router::ModeRouter;
use crate::transport::{ConnectionHandler, ConnectionStream};

/// Serves every accepted connection with its own router and request loop.
#[derive(Debug)]
pub struct ServerHandler {
    mode: Mode,
    mirror: Option<MirrorEndpoint>,
    table: Arc<CommandTable>,
    metrics: Arc<ConnMetrics>,
    capture_dir: Option<Utf8PathBuf>,
    next_connection_id: AtomicI64,
}

impl ServerHandler {
    /// Builds a handler sharing `table` and `metrics` across connections.
    #[must_use]
    pub fn new(
        mode: Mode,
        mirror: Option<MirrorEndpoint>,
        table: Arc<CommandTable>,
        metrics: Arc<ConnMetrics>,
    ) -> Self {
        Self {
            mode,
            mirror,
            table,
            metrics,
            capture_dir: None,
            next_connection_id: AtomicI64::new(1),
        }
    }

    /// Enables raw capture of client bytes into `dir`.
    #[must_use]
    pub fn with_capture_dir(mut self, dir: Option<Utf8PathBuf>) -> Self {
        self.capture_dir = dir;
        self
    }
}

impl ConnectionHandler for ServerHandler {
    fn handle(&self, stream: ConnectionStream, token: &CancellationToken) {
        let info = ConnectionInfo {
            connection_id: self.next_connection_id.fetch_add(1, Ordering::SeqCst),
            peer: stream.peer_addr(),
        };
        let router = match ModeRouter::new(
            self.mode,
            self.mirror.as_ref(),
            Arc::clone(&self.table),
            Arc::clone(&self.metrics),
        ) {
            Ok(router) => router,
            Err(error) => {
                warn!(
                    target: CONN_TARGET,
                    connection_id = info.connection_id,
                    error = %error,
                    "failed to prepare routing; dropping connection"
                );
                return;
            }
        };

        debug!(
            target: CONN_TARGET,
            connection_id = info.connection_id,
            peer = ?info.peer,
            mode = %self.mode,
            "connection accepted"
        );
        let connection_id = info.connection_id;
        let outcome =
            Connection::new(stream, router, info, self.capture_dir.as_deref()).run(token);
        if !outcome.is_clean_eof() {
            info!(
                target: CONN_TARGET,
                connection_id,
                reason = %outcome,
                "connection closed"
            );
        }
    }
}
