//! Command dispatch table.
//!
//! Commands are registered once at startup under their lower-cased names. Each
//! invocation is registered with the [`OperationRegistry`] for its duration so
//! it can be listed and killed by administrative commands.

mod builtins;
mod legacy;

use std::collections::BTreeMap;
use std::error::Error;
use std::sync::Arc;

use docket_wire::OpMsg;

use crate::cancel::CancellationToken;
use crate::message::ConnectionInfo;
use crate::operation::OperationRegistry;
use crate::protocol_error::ProtocolError;

pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Error returned by command handlers; translated before reaching the client.
pub type HandlerError = Box<dyn Error + Send + Sync + 'static>;

/// Signature shared by every command handler.
pub type HandlerFn = fn(&CommandContext<'_>, &OpMsg) -> Result<OpMsg, HandlerError>;

/// Everything a handler may consult while running.
pub struct CommandContext<'a> {
    /// Token of this operation; cancelled when the operation is killed.
    pub token: &'a CancellationToken,
    /// Identifier of this operation in the registry.
    pub op_id: i32,
    /// Shared operation registry.
    pub registry: &'a OperationRegistry,
    /// Table the command was found in.
    pub table: &'a CommandTable,
    /// Connection the request arrived on.
    pub connection: &'a ConnectionInfo,
}

/// A registered command.
#[derive(Debug, Clone, Copy)]
pub struct Command {
    /// Canonical command name.
    pub name: &'static str,
    /// One-line description for `listCommands`.
    pub help: &'static str,
    /// Handler invoked for the command.
    pub handler: HandlerFn,
}

/// Map from lower-cased command name to handler.
#[derive(Debug)]
pub struct CommandTable {
    commands: BTreeMap<String, Command>,
    registry: Arc<OperationRegistry>,
}

impl CommandTable {
    /// Creates an empty table bound to `registry`.
    #[must_use]
    pub fn new(registry: Arc<OperationRegistry>) -> Self {
        Self {
            commands: BTreeMap::new(),
            registry,
        }
    }

    /// Creates a table holding the built-in commands.
    #[must_use]
    pub fn with_builtins(registry: Arc<OperationRegistry>) -> Self {
        let mut table = Self::new(registry);
        for command in builtins::COMMANDS {
            table.register(*command);
        }
        table
    }

    /// Adds or replaces a command.
    pub fn register(&mut self, command: Command) {
        self.commands
            .insert(command.name.to_ascii_lowercase(), command);
    }

    /// Looks a command up by name, ignoring case.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Command> {
        self.commands.get(&name.to_ascii_lowercase())
    }

    /// Registered commands ordered by lower-cased name.
    pub fn commands(&self) -> impl Iterator<Item = &Command> {
        self.commands.values()
    }

    /// Registry receiving one entry per running command.
    #[must_use]
    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    /// Runs the command named by the first key of `msg`.
    ///
    /// Unknown names yield `CommandNotFound`; handler errors are returned unchanged.
    pub fn handle_msg(
        &self,
        token: &CancellationToken,
        connection: &ConnectionInfo,
        msg: &OpMsg,
    ) -> Result<OpMsg, HandlerError> {
        let name = msg.command_name().unwrap_or_default();
        let command = self
            .get(name)
            .ok_or_else(|| ProtocolError::command_not_found(name))?;

        let (op_token, op_id) = self.registry.start(token, operation_kind(name));
        let _running = RunningOperation {
            registry: &self.registry,
            op_id,
        };
        let collection = msg.document().get_str(name).unwrap_or_default();
        self.registry.update(
            op_id,
            msg.database().unwrap_or_default(),
            collection,
            msg.document().clone(),
        );

        let context = CommandContext {
            token: &op_token,
            op_id,
            registry: &self.registry,
            table: self,
            connection,
        };
        (command.handler)(&context, msg)
    }
}

/// Unregisters the operation even when the handler unwinds.
struct RunningOperation<'a> {
    registry: &'a OperationRegistry,
    op_id: i32,
}

impl Drop for RunningOperation<'_> {
    fn drop(&mut self) {
        self.registry.stop(self.op_id);
    }
}

fn operation_kind(command: &str) -> &'static str {
    match command.to_ascii_lowercase().as_str() {
        "find" | "aggregate" | "count" | "distinct" => "query",
        "insert" => "insert",
        "update" | "findandmodify" => "update",
        "delete" => "remove",
        "getmore" => "getmore",
        _ => "command",
    }
}
