//! Framing and body codecs for the document database wire protocol.
//!
//! Every message starts with a sixteen byte little-endian header followed by
//! an op-code specific payload. The server core only interprets `OP_MSG`,
//! `OP_QUERY` and `OP_REPLY` payloads; every other op-code keeps its payload
//! as opaque bytes so it can still be relayed verbatim.
//!
//! Documents are represented with [`bson::Document`].

mod body;
mod error;
mod frame;
mod header;
mod legacy;
mod msg;
mod payload;

pub use body::MsgBody;
pub use error::WireError;
pub use frame::{decode_body, decode_frame, decode_header, read_frame, write_message};
pub use header::{MAX_MESSAGE_LEN, MSG_HEADER_LEN, MsgHeader, OpCode};
pub use legacy::{OpQuery, OpReply, REPLY_QUERY_FAILURE};
pub use msg::{DocumentSequence, OpMsg, is_ok_response};

/// Renders a document as indented relaxed extended JSON.
#[must_use]
pub fn render_document(document: &bson::Document) -> String {
    let value = bson::Bson::Document(document.clone()).into_relaxed_extjson();
    serde_json::to_string_pretty(&value).unwrap_or_else(|_| document.to_string())
}
