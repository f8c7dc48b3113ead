//! Socket listener for client endpoints.
//!
//! The transport module binds the configured endpoint, accepts connections in
//! a background thread and hands each one to a [`ConnectionHandler`] on its
//! own thread, together with a token that is cancelled on shutdown.

mod errors;
mod handler;
mod listener;
#[cfg(test)]
mod test_utils;

pub use self::errors::ListenerError;
pub use self::handler::{ConnectionHandler, ConnectionStream};
pub use self::listener::{ListenerHandle, SocketListener};
#[cfg(test)]
pub(crate) use self::test_utils::{CountingHandler, ParkingHandler};

const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
