//! Request and response values exchanged between the connection loop and the router.

use std::net::SocketAddr;

use docket_wire::{MsgBody, MsgHeader, OpCode, WireError, decode_body, decode_header, is_ok_response};
use tracing::Level;

/// One decoded client message.
///
/// The raw frame is kept alongside the decoded body so the mirror receives
/// exactly the bytes the client sent.
#[derive(Debug)]
pub struct Request {
    /// Decoded header.
    pub header: MsgHeader,
    /// Decoded body, or the reason it could not be decoded.
    pub body: Result<MsgBody, WireError>,
    /// Complete frame as read from the client.
    pub raw: Vec<u8>,
}

impl Request {
    /// Decodes a frame read from the client.
    ///
    /// Only a malformed header is an error; body failures are kept on the
    /// request so they can be answered.
    pub fn decode(frame: Vec<u8>) -> Result<Self, WireError> {
        let header = decode_header(&frame)?;
        let body = decode_body(&header, &frame);
        Ok(Self {
            header,
            body,
            raw: frame,
        })
    }

    /// Command name for `OP_MSG` and `OP_QUERY` requests.
    #[must_use]
    pub fn command_name(&self) -> Option<&str> {
        match &self.body {
            Ok(MsgBody::Msg(msg)) => msg.command_name(),
            Ok(MsgBody::Query(query)) => query.query.keys().next().map(String::as_str),
            _ => None,
        }
    }

    /// Client-supplied `comment` of an `OP_MSG` request.
    #[must_use]
    pub fn comment(&self) -> Option<&str> {
        match &self.body {
            Ok(MsgBody::Msg(msg)) => msg.comment(),
            _ => None,
        }
    }
}

/// One answer to a request.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Header to send.
    pub header: MsgHeader,
    /// Body to send; absent when the request cannot be answered.
    pub body: Option<MsgBody>,
    /// Terminate the connection after this response.
    pub close_connection: bool,
}

impl Response {
    /// Whether an `OP_MSG` body reports success; other bodies count as ok.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        match &self.body {
            Some(MsgBody::Msg(msg)) if self.header.op_code == OpCode::Msg => {
                is_ok_response(msg.document())
            }
            _ => true,
        }
    }

    /// Log level describing this response: error when closing, warn when not ok.
    #[must_use]
    pub fn log_level(&self) -> Level {
        if self.close_connection {
            Level::ERROR
        } else if self.is_ok() {
            Level::DEBUG
        } else {
            Level::WARN
        }
    }
}

/// Per-connection source of response identifiers.
#[derive(Debug, Default)]
pub struct ResponseIds {
    last: i32,
}

impl ResponseIds {
    /// Returns the next identifier; the first is 1.
    pub fn next_id(&mut self) -> i32 {
        self.last = self.last.checked_add(1).unwrap_or(1);
        self.last
    }
}

/// Facts about the client connection available to handlers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// Server-assigned connection number.
    pub connection_id: i64,
    /// Remote address for TCP clients.
    pub peer: Option<SocketAddr>,
}
