//! Test helpers for the transport module.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use super::{ConnectionHandler, ConnectionStream};
use crate::cancel::{CancelCause, CancellationToken};

/// Counts accepted connections and drops them immediately.
pub(crate) struct CountingHandler {
    count: Arc<AtomicUsize>,
}

impl CountingHandler {
    pub(crate) fn new() -> (Arc<AtomicUsize>, Arc<Self>) {
        let count = Arc::new(AtomicUsize::new(0));
        let handler = Arc::new(Self {
            count: Arc::clone(&count),
        });
        (count, handler)
    }
}

impl ConnectionHandler for CountingHandler {
    fn handle(&self, _stream: ConnectionStream, _token: &CancellationToken) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

/// Holds each connection until its token is cancelled, counting shutdowns.
pub(crate) struct ParkingHandler {
    cancelled: Arc<AtomicUsize>,
}

impl ParkingHandler {
    pub(crate) fn new() -> (Arc<AtomicUsize>, Arc<Self>) {
        let cancelled = Arc::new(AtomicUsize::new(0));
        let handler = Arc::new(Self {
            cancelled: Arc::clone(&cancelled),
        });
        (cancelled, handler)
    }
}

impl ConnectionHandler for ParkingHandler {
    fn handle(&self, _stream: ConnectionStream, token: &CancellationToken) {
        if token.wait() == CancelCause::Shutdown {
            self.cancelled.fetch_add(1, Ordering::SeqCst);
        }
    }
}
