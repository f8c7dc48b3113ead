//! Legacy `OP_QUERY` handling.
//!
//! Only the connection handshake is accepted through `OP_QUERY`; every other
//! command must use `OP_MSG`.

use bson::{Bson, Document};
use docket_wire::{OpMsg, OpQuery, OpReply};

use super::{CommandTable, HandlerError};
use crate::cancel::CancellationToken;
use crate::message::ConnectionInfo;
use crate::protocol_error::{ErrorCode, ProtocolError};

const HANDSHAKE_COMMANDS: [&str; 2] = ["hello", "ismaster"];

impl CommandTable {
    /// Answers an `OP_QUERY` against `<db>.$cmd`.
    pub fn handle_query(
        &self,
        token: &CancellationToken,
        connection: &ConnectionInfo,
        query: &OpQuery,
    ) -> Result<OpReply, HandlerError> {
        let (db, collection) = query.namespace();
        let command = unwrap_query(&query.query);
        let name = command.keys().next().map(String::as_str).unwrap_or_default();

        if collection != "$cmd" || !HANDSHAKE_COMMANDS.contains(&name.to_ascii_lowercase().as_str())
        {
            return Err(ProtocolError::new(
                ErrorCode::UnsupportedOpQueryCommand,
                format!(
                    "Unsupported OP_QUERY command: {name}. The client driver may require an upgrade."
                ),
            )
            .into());
        }

        let mut document = command.clone();
        if !document.contains_key("$db") {
            document.insert("$db", db);
        }
        let reply = self.handle_msg(token, connection, &OpMsg::new(document))?;
        Ok(OpReply::new(reply.into_document()))
    }
}

/// Older drivers wrap the command as `{$query: {...}, $readPreference: ...}`.
fn unwrap_query(query: &Document) -> &Document {
    match query.get("$query") {
        Some(Bson::Document(inner)) => inner,
        _ => query,
    }
}
