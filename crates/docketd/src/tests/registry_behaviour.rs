//! Behavioural tests for the operation registry.

use std::cell::RefCell;
use std::collections::HashMap;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

use crate::cancel::{CancelCause, CancellationToken};
use crate::operation::OperationRegistry;

type StepResult = Result<(), String>;

struct RegistryWorld {
    registry: OperationRegistry,
    root: CancellationToken,
    tokens: HashMap<i32, CancellationToken>,
    started: Vec<i32>,
}

impl RegistryWorld {
    fn new() -> Self {
        Self {
            registry: OperationRegistry::new(),
            root: CancellationToken::new(),
            tokens: HashMap::new(),
            started: Vec::new(),
        }
    }

    fn listed(&self) -> Vec<i32> {
        self.registry
            .operations()
            .iter()
            .map(|operation| operation.op_id)
            .collect()
    }

    fn token(&self, op_id: i32) -> Result<&CancellationToken, String> {
        self.tokens
            .get(&op_id)
            .ok_or_else(|| format!("operation {op_id} was never started"))
    }
}

#[fixture]
fn world() -> RefCell<RegistryWorld> {
    RefCell::new(RegistryWorld::new())
}

#[given("{count} running {kind} operations")]
fn given_running_operations(world: &RefCell<RegistryWorld>, count: usize, kind: String) {
    let mut world = world.borrow_mut();
    for _ in 0..count {
        let (token, op_id) = world.registry.start(&world.root, &kind);
        world.tokens.insert(op_id, token);
        world.started.push(op_id);
    }
}

#[when("operation {op_id} is stopped")]
fn when_operation_stopped(world: &RefCell<RegistryWorld>, op_id: i32) {
    world.borrow().registry.stop(op_id);
}

#[when("operation {op_id} is killed")]
fn when_operation_killed(world: &RefCell<RegistryWorld>, op_id: i32) {
    world.borrow().registry.kill(op_id);
}

#[when("the registry is closed")]
fn when_registry_closed(world: &RefCell<RegistryWorld>) {
    world.borrow().registry.close();
}

#[then("the operations were numbered {first} and {second}")]
fn then_numbered(world: &RefCell<RegistryWorld>, first: i32, second: i32) {
    assert_eq!(world.borrow().started, vec![first, second]);
}

#[then("the registry lists operations {first} and {second}")]
fn then_lists_two(world: &RefCell<RegistryWorld>, first: i32, second: i32) {
    assert_eq!(world.borrow().listed(), vec![first, second]);
}

#[then("the registry lists only operation {op_id}")]
fn then_lists_one(world: &RefCell<RegistryWorld>, op_id: i32) {
    assert_eq!(world.borrow().listed(), vec![op_id]);
}

#[then("the registry lists nothing")]
fn then_lists_nothing(world: &RefCell<RegistryWorld>) {
    let listed = world.borrow().listed();
    assert!(listed.is_empty(), "unexpected operations: {listed:?}");
}

#[then("operation {op_id} was killed")]
fn then_killed(world: &RefCell<RegistryWorld>, op_id: i32) -> StepResult {
    let world = world.borrow();
    let cause = world.token(op_id)?.cause();
    if cause == Some(CancelCause::Killed { op_id }) {
        Ok(())
    } else {
        Err(format!("operation {op_id} ended with {cause:?}"))
    }
}

#[then("operation {op_id} is still running")]
fn then_running(world: &RefCell<RegistryWorld>, op_id: i32) -> StepResult {
    let world = world.borrow();
    match world.token(op_id)?.cause() {
        None => Ok(()),
        Some(cause) => Err(format!("operation {op_id} was cancelled: {cause}")),
    }
}

#[then("every operation was cancelled by the registry closing")]
fn then_all_closed(world: &RefCell<RegistryWorld>) {
    let world = world.borrow();
    for (op_id, token) in &world.tokens {
        assert_eq!(
            token.cause(),
            Some(CancelCause::RegistryClosed),
            "operation {op_id}"
        );
    }
}

#[scenario(
    path = "tests/features/operation_registry.feature",
    name = "Operations are numbered and listed in order"
)]
fn numbered_in_order(world: RefCell<RegistryWorld>) {
    let _ = world;
}

#[scenario(
    path = "tests/features/operation_registry.feature",
    name = "Stopped operations disappear"
)]
fn stopped_disappear(world: RefCell<RegistryWorld>) {
    let _ = world;
}

#[scenario(
    path = "tests/features/operation_registry.feature",
    name = "Killed operations stay listed until stopped"
)]
fn killed_stay_listed(world: RefCell<RegistryWorld>) {
    let _ = world;
}

#[scenario(
    path = "tests/features/operation_registry.feature",
    name = "Killing an absent operation does nothing"
)]
fn kill_absent(world: RefCell<RegistryWorld>) {
    let _ = world;
}

#[scenario(
    path = "tests/features/operation_registry.feature",
    name = "Closing the registry cancels everything"
)]
fn close_cancels(world: RefCell<RegistryWorld>) {
    let _ = world;
}
