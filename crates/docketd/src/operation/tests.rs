//! Unit tests for the operation registry.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use bson::doc;
use rstest::{fixture, rstest};

use super::*;

#[fixture]
fn registry() -> OperationRegistry {
    OperationRegistry::new()
}

#[rstest]
fn identifiers_start_at_one_and_increase(registry: OperationRegistry) {
    let root = CancellationToken::new();
    let ids: Vec<i32> = (0..3).map(|_| registry.start(&root, "query").1).collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[rstest]
fn concurrent_starts_receive_distinct_identifiers(registry: OperationRegistry) {
    let registry = Arc::new(registry);
    let root = CancellationToken::new();
    let workers: Vec<_> = (0..8)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let root = root.clone();
            thread::spawn(move || {
                (0..50)
                    .map(|_| registry.start(&root, "command").1)
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut seen = HashSet::new();
    for worker in workers {
        for id in worker.join().expect("join worker") {
            assert_ne!(id, 0);
            assert!(seen.insert(id), "duplicate operation id {id}");
        }
    }
    assert_eq!(seen.len(), 400);
    assert_eq!(registry.operations().len(), 400);
}

#[rstest]
fn update_records_target_and_command(registry: OperationRegistry) {
    let (_token, op_id) = registry.start(&CancellationToken::new(), "query");

    registry.update(op_id, "shelf", "books", doc! { "find": "books" });

    let operations = registry.operations();
    assert_eq!(operations.len(), 1);
    assert_eq!(operations[0].namespace(), "shelf.books");
    assert_eq!(operations[0].command, Some(doc! { "find": "books" }));
}

#[rstest]
fn update_of_unknown_operation_is_ignored(registry: OperationRegistry) {
    registry.update(42, "shelf", "books", doc! {});
    assert!(registry.operations().is_empty());
}

#[rstest]
fn stop_removes_and_cancels(registry: OperationRegistry) {
    let (token, op_id) = registry.start(&CancellationToken::new(), "query");

    registry.stop(op_id);

    assert!(registry.operations().is_empty());
    assert_eq!(token.cause(), Some(CancelCause::OperationFinished));
    registry.stop(op_id);
}

#[rstest]
fn kill_cancels_only_the_target(registry: OperationRegistry) {
    let root = CancellationToken::new();
    let (first, first_id) = registry.start(&root, "query");
    let (second, _) = registry.start(&root, "query");

    assert!(registry.kill(first_id));

    assert_eq!(first.cause(), Some(CancelCause::Killed { op_id: first_id }));
    assert!(!second.is_cancelled());
    assert!(!root.is_cancelled());
    let remaining = registry.operations();
    assert_eq!(remaining.len(), 2, "kill must not unregister");
    assert!(remaining[0].is_cancelled());
}

#[rstest]
fn kill_of_unknown_operation_reports_absence(registry: OperationRegistry) {
    assert!(!registry.kill(7));
}

#[rstest]
fn snapshot_is_sorted_and_detached(registry: OperationRegistry) {
    let root = CancellationToken::new();
    let ids: Vec<i32> = (0..5).map(|_| registry.start(&root, "command").1).collect();
    registry.stop(ids[2]);

    let snapshot = registry.operations();
    registry.stop(ids[0]);

    let listed: Vec<i32> = snapshot.iter().map(|operation| operation.op_id).collect();
    assert_eq!(listed, vec![ids[0], ids[1], ids[3], ids[4]]);
}

#[rstest]
fn parent_cancellation_reaches_operations(registry: OperationRegistry) {
    let root = CancellationToken::new();
    let (token, _) = registry.start(&root, "query");

    root.cancel(CancelCause::Shutdown);

    assert_eq!(token.cause(), Some(CancelCause::Shutdown));
}

#[rstest]
fn close_cancels_everything_and_refuses_new_work(registry: OperationRegistry) {
    let root = CancellationToken::new();
    let (token, _) = registry.start(&root, "query");

    registry.close();

    assert_eq!(token.cause(), Some(CancelCause::RegistryClosed));
    assert!(registry.operations().is_empty());
    let (late, late_id) = registry.start(&root, "query");
    assert!(late.is_cancelled());
    assert!(late_id > 0);
    assert!(registry.operations().is_empty());
}
