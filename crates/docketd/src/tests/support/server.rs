//! In-process server bound to an ephemeral loopback port.

use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use camino::Utf8PathBuf;
use docket_config::{MirrorEndpoint, Mode, SocketEndpoint};

use crate::dispatch::CommandTable;
use crate::metrics::ConnMetrics;
use crate::operation::OperationRegistry;
use crate::process::{ShutdownError, ShutdownSignal};
use crate::server::ServerHandler;
use crate::transport::{ListenerHandle, SocketListener};

const CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Listener serving one handler configuration.
pub struct TestServer {
    pub metrics: Arc<ConnMetrics>,
    addr: SocketAddr,
    handle: Option<ListenerHandle>,
}

impl TestServer {
    /// Starts serving in `mode`.
    pub fn start(mode: Mode, mirror: Option<MirrorEndpoint>) -> Self {
        Self::start_with_capture(mode, mirror, None)
    }

    /// Starts serving in `mode`, capturing client bytes into `capture_dir`.
    pub fn start_with_capture(
        mode: Mode,
        mirror: Option<MirrorEndpoint>,
        capture_dir: Option<Utf8PathBuf>,
    ) -> Self {
        let registry = Arc::new(OperationRegistry::new());
        let table = Arc::new(CommandTable::with_builtins(Arc::clone(&registry)));
        let metrics = Arc::new(ConnMetrics::new());
        let handler = ServerHandler::new(mode, mirror, table, Arc::clone(&metrics))
            .with_capture_dir(capture_dir);
        let listener =
            SocketListener::bind(&SocketEndpoint::tcp("127.0.0.1", 0)).expect("bind test server");
        let addr = listener.local_addr().expect("test server address");
        let handle = listener
            .start(Arc::new(handler))
            .expect("start test server");
        Self {
            metrics,
            addr,
            handle: Some(handle),
        }
    }

    /// Opens a client connection with a read timeout.
    pub fn connect(&self) -> TcpStream {
        let stream = TcpStream::connect(self.addr).expect("connect to test server");
        stream
            .set_read_timeout(Some(CLIENT_TIMEOUT))
            .expect("set client read timeout");
        stream
    }

    /// Stops accepting, cancels open connections, and waits for them.
    pub fn shutdown(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.shutdown();
            handle.join().expect("join test server");
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.shutdown();
            let _ = handle.join();
        }
    }
}

/// Shutdown signal that fires as soon as it is awaited.
#[derive(Debug, Default)]
pub struct ImmediateShutdown;

impl ShutdownSignal for ImmediateShutdown {
    fn wait(&self) -> Result<(), ShutdownError> {
        Ok(())
    }
}
