//! Default values shared by the configuration layers.

use crate::logging::LogFormat;
use crate::socket::SocketEndpoint;

/// Conventional port for document database servers.
pub const DEFAULT_PORT: u16 = 27017;

/// Default log filter expression.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default logging format.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Loopback TCP endpoint on the conventional port.
#[must_use]
pub fn default_listen_endpoint() -> SocketEndpoint {
    SocketEndpoint::tcp("127.0.0.1", DEFAULT_PORT)
}
