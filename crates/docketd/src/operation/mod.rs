//! Registry of in-flight operations.
//!
//! Each operation gets a process-unique identifier and its own cancellation
//! token derived from the caller's. Administrative commands list the registry
//! and kill entries by identifier; killing cancels only that operation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::{Duration, Instant};

use bson::Document;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::cancel::{CancelCause, CancellationToken};

pub(crate) const OPERATION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::operation");

/// Snapshot of one registered operation.
#[derive(Debug, Clone)]
pub struct Operation {
    /// Registry-assigned identifier, never zero.
    pub op_id: i32,
    /// Operation kind, e.g. `query` or `command`.
    pub kind: String,
    /// Target database, once known.
    pub db: String,
    /// Target collection, once known.
    pub collection: String,
    /// Copy of the command document, once known.
    pub command: Option<Document>,
    /// When the operation was registered.
    pub started_at: Instant,
    token: CancellationToken,
}

impl Operation {
    /// Whether the operation's token has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Time elapsed since registration.
    #[must_use]
    pub fn running_for(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// `db.collection` namespace, or just the database when no collection is set.
    #[must_use]
    pub fn namespace(&self) -> String {
        if self.collection.is_empty() {
            self.db.clone()
        } else {
            format!("{}.{}", self.db, self.collection)
        }
    }
}

/// Thread-safe registry of in-flight operations.
#[derive(Debug)]
pub struct OperationRegistry {
    next_id: AtomicI32,
    operations: RwLock<Option<HashMap<i32, Operation>>>,
}

impl Default for OperationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationRegistry {
    /// Creates an empty, open registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicI32::new(0),
            operations: RwLock::new(Some(HashMap::new())),
        }
    }

    /// Registers an operation and returns its token and identifier.
    ///
    /// The returned token is a child of `parent`. After [`OperationRegistry::close`]
    /// the token comes back already cancelled and nothing is recorded.
    pub fn start(&self, parent: &CancellationToken, kind: &str) -> (CancellationToken, i32) {
        let token = parent.child_token();
        let mut operations = self.operations.write();
        let op_id = self.allocate_id();
        let Some(operations) = operations.as_mut() else {
            token.cancel(CancelCause::RegistryClosed);
            warn!(target: OPERATION_TARGET, op_id, kind, "operation started after registry close");
            return (token, op_id);
        };
        operations.insert(
            op_id,
            Operation {
                op_id,
                kind: kind.to_owned(),
                db: String::new(),
                collection: String::new(),
                command: None,
                started_at: Instant::now(),
                token: token.clone(),
            },
        );
        debug!(target: OPERATION_TARGET, op_id, kind, "operation started");
        (token, op_id)
    }

    fn allocate_id(&self) -> i32 {
        loop {
            let id = self
                .next_id
                .fetch_add(1, Ordering::Relaxed)
                .wrapping_add(1);
            if id > 0 {
                return id;
            }
            self.next_id.store(0, Ordering::Relaxed);
        }
    }

    /// Records the target and command of a registered operation; no-op when absent.
    pub fn update(&self, op_id: i32, db: &str, collection: &str, command: Document) {
        let mut operations = self.operations.write();
        if let Some(operation) = operations
            .as_mut()
            .and_then(|operations| operations.get_mut(&op_id))
        {
            db.clone_into(&mut operation.db);
            collection.clone_into(&mut operation.collection);
            operation.command = Some(command);
        }
    }

    /// Unregisters an operation and cancels its token; no-op when absent.
    pub fn stop(&self, op_id: i32) {
        let mut operations = self.operations.write();
        if let Some(operation) = operations
            .as_mut()
            .and_then(|operations| operations.remove(&op_id))
        {
            operation.token.cancel(CancelCause::OperationFinished);
            debug!(
                target: OPERATION_TARGET,
                op_id,
                elapsed_ms = operation.running_for().as_millis(),
                "operation stopped"
            );
        }
    }

    /// Cancels an operation without unregistering it; returns whether it existed.
    pub fn kill(&self, op_id: i32) -> bool {
        let operations = self.operations.read();
        let Some(operation) = operations
            .as_ref()
            .and_then(|operations| operations.get(&op_id))
        else {
            return false;
        };
        operation.token.cancel(CancelCause::Killed { op_id });
        debug!(target: OPERATION_TARGET, op_id, "operation killed");
        true
    }

    /// Copies every registered operation, ordered by identifier.
    #[must_use]
    pub fn operations(&self) -> Vec<Operation> {
        let operations = self.operations.read();
        let mut snapshot: Vec<Operation> = operations
            .iter()
            .flat_map(HashMap::values)
            .cloned()
            .collect();
        snapshot.sort_by_key(|operation| operation.op_id);
        snapshot
    }

    /// Cancels every operation and refuses further registrations.
    pub fn close(&self) {
        let drained = self.operations.write().take();
        for operation in drained.into_iter().flat_map(HashMap::into_values) {
            operation.token.cancel(CancelCause::RegistryClosed);
        }
    }
}

#[cfg(test)]
mod tests;
