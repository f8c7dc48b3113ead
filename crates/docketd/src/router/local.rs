//! Local handling of one request through the command table.

use docket_wire::{MsgBody, MsgHeader, OpCode, WireError};
use tracing::{Span, debug, error};

use super::ROUTER_TARGET;
use crate::cancel::CancellationToken;
use crate::dispatch::{CommandTable, HandlerError};
use crate::message::{ConnectionInfo, Request, Response};
use crate::metrics::ConnMetrics;
use crate::protocol_error::{ProtocolError, translate};

const UNKNOWN: &str = "unknown";

/// Outcome labels recorded for every local response.
struct Outcome {
    result: &'static str,
    argument: String,
}

impl Outcome {
    fn ok() -> Self {
        Self {
            result: "ok",
            argument: UNKNOWN.to_owned(),
        }
    }

    fn failed(error: &ProtocolError) -> Self {
        let (result, argument) = error.labels();
        Self {
            result,
            argument: argument.to_owned(),
        }
    }

    fn closing(result: &'static str) -> Self {
        Self {
            result,
            argument: UNKNOWN.to_owned(),
        }
    }
}

pub(super) struct LocalRoute<'a> {
    pub(super) table: &'a CommandTable,
    pub(super) metrics: &'a ConnMetrics,
}

impl LocalRoute<'_> {
    /// Answers `request` locally.
    ///
    /// Requests whose op-code cannot carry an error reply produce a response
    /// without a body that closes the connection.
    pub(super) fn handle(
        &self,
        token: &CancellationToken,
        connection: &ConnectionInfo,
        request: &Request,
        response_id: i32,
    ) -> Response {
        let command = request.command_name().unwrap_or(UNKNOWN).to_owned();
        let request_op = request.header.op_code;
        self.metrics.record_request(request_op.name(), &command);

        let (reply, outcome) = match &request.body {
            Ok(MsgBody::Msg(msg)) => {
                let (body, outcome) = match self.table.handle_msg(token, connection, msg) {
                    Ok(reply) => (reply, Outcome::ok()),
                    Err(error) => {
                        let protocol = failure(&command, &error);
                        (protocol.to_msg(), Outcome::failed(&protocol))
                    }
                };
                (Some((OpCode::Msg, MsgBody::Msg(body))), outcome)
            }
            Ok(MsgBody::Query(query)) => {
                let (body, outcome) = match self.table.handle_query(token, connection, query) {
                    Ok(reply) => (reply, Outcome::ok()),
                    Err(error) => {
                        let protocol = failure(&command, &error);
                        (protocol.to_reply(), Outcome::failed(&protocol))
                    }
                };
                (Some((OpCode::Reply, MsgBody::Reply(body))), outcome)
            }
            Err(decode_error) => malformed(request_op, decode_error),
            Ok(other) => {
                let result = match other.op_code() {
                    OpCode::Unknown(_) => "unexpected",
                    _ => "unhandled",
                };
                error!(
                    target: ROUTER_TARGET,
                    opcode = %request_op,
                    request_id = request.header.request_id,
                    "no handler for op-code; closing connection"
                );
                (None, Outcome::closing(result))
            }
        };

        let response = match reply {
            Some((op_code, body)) => Response {
                header: sized_header(
                    MsgHeader::response(op_code, response_id, request.header.request_id),
                    &body,
                ),
                body: Some(body),
                close_connection: false,
            },
            None => Response {
                header: MsgHeader::response(request_op, 0, request.header.request_id),
                body: None,
                close_connection: true,
            },
        };

        self.metrics.record_response(
            response.header.op_code.name(),
            &command,
            &outcome.argument,
            outcome.result,
        );
        let span = Span::current();
        span.record("result", outcome.result);
        span.record("argument", outcome.argument.as_str());
        response
    }
}

/// Header carrying the length `body` has on the wire.
///
/// A body that fails to encode keeps the unsized header; the write reports
/// the encoding error.
fn sized_header(header: MsgHeader, body: &MsgBody) -> MsgHeader {
    body.encode()
        .and_then(|payload| header.with_payload_len(payload.len()))
        .unwrap_or(header)
}

fn failure(command: &str, error: &HandlerError) -> ProtocolError {
    let protocol = translate(&**error);
    debug!(
        target: ROUTER_TARGET,
        command,
        code = protocol.code().code(),
        error = %error,
        "command failed"
    );
    protocol
}

/// A frame whose body did not decode is answered in the family of its op-code.
fn malformed(
    op_code: OpCode,
    decode_error: &WireError,
) -> (Option<(OpCode, MsgBody)>, Outcome) {
    let protocol = translate(decode_error);
    let outcome = Outcome::failed(&protocol);
    debug!(
        target: ROUTER_TARGET,
        opcode = %op_code,
        error = %decode_error,
        "request body could not be decoded"
    );
    match op_code {
        OpCode::Msg => (Some((OpCode::Msg, MsgBody::Msg(protocol.to_msg()))), outcome),
        OpCode::Query => (
            Some((OpCode::Reply, MsgBody::Reply(protocol.to_reply()))),
            outcome,
        ),
        _ => (None, Outcome::closing("unhandled")),
    }
}
