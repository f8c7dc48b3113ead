//! Wire-protocol server core for a document database.
//!
//! `docketd` accepts client connections speaking the document-database wire
//! protocol, decodes each framed message, and answers it according to the
//! configured [`Mode`](docket_config::Mode):
//!
//! - `local-only` answers from the in-process [`CommandTable`];
//! - `mirror-only` relays every request to an upstream mirror and returns its
//!   answer verbatim;
//! - the two dual modes send each request to both sides, return the preferred
//!   answer, and log a [`DiffReport`] whenever the two answers disagree.
//!
//! Every running command is tracked in the [`OperationRegistry`] so that
//! `currentOp` can list it and `killOp` can cancel it. Failures are translated
//! into protocol errors (`ok: 0`, `code`, `codeName`) before they reach the
//! client; only framing failures and explicit close requests end a connection.
//!
//! ## Lifecycle
//!
//! [`bootstrap_with`] loads configuration, installs telemetry, and prepares the
//! listen socket. [`Daemon::serve`] then binds the listener, serves until a
//! [`ShutdownSignal`] fires, cancels every open connection, and closes the
//! registry.

mod bootstrap;
mod cancel;
mod conn;
mod dispatch;
mod health;
mod message;
mod metrics;
mod mirror;
mod operation;
mod process;
mod protocol_error;
mod router;
mod server;
mod telemetry;
mod transport;

pub use bootstrap::{
    BootstrapError, ConfigLoader, Daemon, StaticConfigLoader, SystemConfigLoader, bootstrap_with,
};
pub use cancel::{CancelCause, CancellationToken};
pub use conn::{Connection, ConnectionError};
pub use dispatch::{Command, CommandContext, CommandTable, HandlerError, HandlerFn};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use message::{ConnectionInfo, Request, Response, ResponseIds};
pub use metrics::{ConnMetrics, MetricsSnapshot, RequestLabels, ResponseLabels};
pub use mirror::{MirrorClient, MirrorError, MirrorInterrupt};
pub use operation::{Operation, OperationRegistry};
pub use process::{LaunchError, ShutdownError, ShutdownSignal, SystemShutdownSignal, run_server};
pub use protocol_error::{ErrorCode, ProtocolError, panic_message, translate};
pub use router::{DiffReport, ModeRouter, RouteError, RouterError};
pub use server::ServerHandler;
pub use telemetry::{TelemetryError, TelemetryHandle};
pub use transport::{
    ConnectionHandler, ConnectionStream, ListenerError, ListenerHandle, SocketListener,
};

#[cfg(test)]
mod tests;
