//! Op-code specific message bodies.

use std::fmt::Write as _;

use crate::error::WireError;
use crate::header::OpCode;
use crate::legacy::{OpQuery, OpReply};
use crate::msg::OpMsg;
use crate::render_document;

/// Decoded payload of a message.
#[derive(Debug, Clone, PartialEq)]
pub enum MsgBody {
    /// `OP_MSG` payload.
    Msg(OpMsg),
    /// `OP_QUERY` payload.
    Query(OpQuery),
    /// `OP_REPLY` payload.
    Reply(OpReply),
    /// Payload of an op-code the codec does not interpret.
    Raw {
        /// Header op-code the payload belongs to.
        op_code: OpCode,
        /// Payload bytes.
        payload: Vec<u8>,
    },
}

impl MsgBody {
    /// Op-code a header carrying this body must use.
    #[must_use]
    pub const fn op_code(&self) -> OpCode {
        match self {
            Self::Msg(_) => OpCode::Msg,
            Self::Query(_) => OpCode::Query,
            Self::Reply(_) => OpCode::Reply,
            Self::Raw { op_code, .. } => *op_code,
        }
    }

    /// Serialises the payload without the header.
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        let mut out = Vec::new();
        match self {
            Self::Msg(msg) => msg.encode(&mut out)?,
            Self::Query(query) => query.encode(&mut out)?,
            Self::Reply(reply) => reply.encode(&mut out)?,
            Self::Raw { payload, .. } => out.extend_from_slice(payload),
        }
        Ok(out)
    }

    pub(crate) fn decode(op_code: OpCode, payload: &[u8]) -> Result<Self, WireError> {
        Ok(match op_code {
            OpCode::Msg => Self::Msg(OpMsg::decode(payload)?),
            OpCode::Query => Self::Query(OpQuery::decode(payload)?),
            OpCode::Reply => Self::Reply(OpReply::decode(payload)?),
            other => Self::Raw {
                op_code: other,
                payload: payload.to_vec(),
            },
        })
    }

    /// Multi-line human readable rendering with indented documents.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        match self {
            Self::Msg(msg) => {
                let _ = writeln!(out, "flags: {:#x}", msg.flags());
                let _ = writeln!(out, "section 0:\n{}", render_document(msg.document()));
                for sequence in msg.sequences() {
                    let _ = writeln!(out, "section 1 ({}):", sequence.identifier);
                    for document in &sequence.documents {
                        let _ = writeln!(out, "{}", render_document(document));
                    }
                }
            }
            Self::Query(query) => {
                let _ = writeln!(out, "flags: {:#x}", query.flags);
                let _ = writeln!(out, "collection: {}", query.full_collection_name);
                let _ = writeln!(out, "skip: {}", query.number_to_skip);
                let _ = writeln!(out, "return: {}", query.number_to_return);
                let _ = writeln!(out, "query:\n{}", render_document(&query.query));
                if let Some(selector) = &query.return_fields_selector {
                    let _ = writeln!(out, "selector:\n{}", render_document(selector));
                }
            }
            Self::Reply(reply) => {
                let _ = writeln!(out, "flags: {:#x}", reply.flags);
                let _ = writeln!(out, "cursor_id: {}", reply.cursor_id);
                let _ = writeln!(out, "starting_from: {}", reply.starting_from);
                let _ = writeln!(out, "documents:");
                for document in &reply.documents {
                    let _ = writeln!(out, "{}", render_document(document));
                }
            }
            Self::Raw { op_code, payload } => {
                let _ = writeln!(out, "{op_code} payload: {} bytes", payload.len());
            }
        }
        out
    }
}
