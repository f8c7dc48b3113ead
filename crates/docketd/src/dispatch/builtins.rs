//! Built-in command handlers.

use std::time::Duration;

use bson::{Bson, Document, doc};
use docket_wire::OpMsg;
use tracing::debug;

use super::{Command, CommandContext, DISPATCH_TARGET, HandlerError};
use crate::protocol_error::ProtocolError;

const MAX_BSON_OBJECT_SIZE: i32 = 16 * 1024 * 1024;
const MAX_MESSAGE_SIZE_BYTES: i32 = 48_000_000;
const MAX_WRITE_BATCH_SIZE: i32 = 100_000;
const MIN_WIRE_VERSION: i32 = 0;
const MAX_WIRE_VERSION: i32 = 21;
const DEFAULT_SLEEP: Duration = Duration::from_millis(100);

pub(super) const COMMANDS: &[Command] = &[
    Command {
        name: "buildInfo",
        help: "Returns the server version.",
        handler: build_info,
    },
    Command {
        name: "currentOp",
        help: "Lists in-progress operations.",
        handler: current_op,
    },
    Command {
        name: "hello",
        help: "Returns the role and limits of this server.",
        handler: hello,
    },
    Command {
        name: "isMaster",
        help: "Legacy alias of hello.",
        handler: is_master,
    },
    Command {
        name: "killOp",
        help: "Cancels the operation identified by op.",
        handler: kill_op,
    },
    Command {
        name: "listCommands",
        help: "Lists every supported command.",
        handler: list_commands,
    },
    Command {
        name: "ping",
        help: "Checks that the server is responsive.",
        handler: ping,
    },
    Command {
        name: "sleep",
        help: "Blocks for millis milliseconds or until the operation is killed.",
        handler: sleep,
    },
    Command {
        name: "whatsmyuri",
        help: "Returns the client address as seen by the server.",
        handler: whats_my_uri,
    },
];

fn ok(mut document: Document) -> Result<OpMsg, HandlerError> {
    document.insert("ok", 1.0);
    Ok(OpMsg::new(document))
}

fn ping(_context: &CommandContext<'_>, _msg: &OpMsg) -> Result<OpMsg, HandlerError> {
    ok(Document::new())
}

fn handshake(context: &CommandContext<'_>, role_field: &str) -> Document {
    let mut document = Document::new();
    document.insert(role_field, true);
    let limits = doc! {
        "maxBsonObjectSize": MAX_BSON_OBJECT_SIZE,
        "maxMessageSizeBytes": MAX_MESSAGE_SIZE_BYTES,
        "maxWriteBatchSize": MAX_WRITE_BATCH_SIZE,
        "localTime": bson::DateTime::now(),
        "logicalSessionTimeoutMinutes": 30,
        "connectionId": context.connection.connection_id,
        "minWireVersion": MIN_WIRE_VERSION,
        "maxWireVersion": MAX_WIRE_VERSION,
        "readOnly": false,
    };
    for (key, value) in limits {
        document.insert(key, value);
    }
    document
}

fn hello(context: &CommandContext<'_>, _msg: &OpMsg) -> Result<OpMsg, HandlerError> {
    ok(handshake(context, "isWritablePrimary"))
}

fn is_master(context: &CommandContext<'_>, _msg: &OpMsg) -> Result<OpMsg, HandlerError> {
    ok(handshake(context, "ismaster"))
}

fn build_info(_context: &CommandContext<'_>, _msg: &OpMsg) -> Result<OpMsg, HandlerError> {
    let version = env!("CARGO_PKG_VERSION");
    let version_array: Vec<Bson> = version
        .split('.')
        .map(|part| Bson::Int32(part.parse().unwrap_or_default()))
        .collect();
    ok(doc! {
        "version": version,
        "gitVersion": "",
        "versionArray": version_array,
        "bits": 64,
        "maxBsonObjectSize": MAX_BSON_OBJECT_SIZE,
    })
}

fn whats_my_uri(context: &CommandContext<'_>, _msg: &OpMsg) -> Result<OpMsg, HandlerError> {
    let you = context
        .connection
        .peer
        .map_or_else(|| "unknown".to_owned(), |peer| peer.to_string());
    ok(doc! { "you": you })
}

fn list_commands(context: &CommandContext<'_>, _msg: &OpMsg) -> Result<OpMsg, HandlerError> {
    let mut commands = Document::new();
    for command in context.table.commands() {
        commands.insert(command.name, doc! { "help": command.help });
    }
    ok(doc! { "commands": commands })
}

fn current_op(context: &CommandContext<'_>, _msg: &OpMsg) -> Result<OpMsg, HandlerError> {
    let in_progress: Vec<Bson> = context
        .registry
        .operations()
        .into_iter()
        .map(|operation| {
            let running = operation.running_for();
            Bson::Document(doc! {
                "opid": operation.op_id,
                "active": true,
                "op": operation.kind.as_str(),
                "ns": operation.namespace(),
                "command": operation.command.clone().unwrap_or_default(),
                "secs_running": i64::try_from(running.as_secs()).unwrap_or(i64::MAX),
                "microsecs_running": i64::try_from(running.as_micros()).unwrap_or(i64::MAX),
                "killPending": operation.is_cancelled(),
            })
        })
        .collect();
    ok(doc! { "inprog": in_progress })
}

fn kill_op(context: &CommandContext<'_>, msg: &OpMsg) -> Result<OpMsg, HandlerError> {
    let target = match msg.document().get("op") {
        Some(Bson::Int32(op)) => Some(*op),
        Some(Bson::Int64(op)) => i32::try_from(*op).ok(),
        Some(Bson::Double(op)) => whole_i32(*op),
        _ => None,
    };
    let Some(op_id) = target else {
        return Err(ProtocolError::bad_value("op", "killOp requires a numeric \"op\" field").into());
    };
    let found = context.registry.kill(op_id);
    debug!(target: DISPATCH_TARGET, op_id, found, "killOp requested");
    ok(doc! { "info": "attempting to kill op" })
}

/// Converts a double that holds an exact `i32` value.
#[expect(
    clippy::cast_possible_truncation,
    reason = "the value is integral and within i32 range"
)]
fn whole_i32(value: f64) -> Option<i32> {
    let in_range = (f64::from(i32::MIN)..=f64::from(i32::MAX)).contains(&value);
    (in_range && value.fract() == 0.0).then(|| value as i32)
}

fn sleep(context: &CommandContext<'_>, msg: &OpMsg) -> Result<OpMsg, HandlerError> {
    let duration = match msg.document().get("millis") {
        None => DEFAULT_SLEEP,
        Some(Bson::Int32(millis)) => Duration::from_millis(u64::try_from(*millis).unwrap_or_default()),
        Some(Bson::Int64(millis)) => Duration::from_millis(u64::try_from(*millis).unwrap_or_default()),
        Some(_) => {
            return Err(ProtocolError::bad_value("millis", "millis must be an integer").into());
        }
    };
    if let Some(cause) = context.token.wait_timeout(duration) {
        return Err(ProtocolError::interrupted(&cause).into());
    }
    ok(Document::new())
}
