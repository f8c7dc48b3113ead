//! Client-side helpers for exchanging frames with a server under test.

use std::io::{Read, Write};

use bson::Document;
use docket_wire::{
    MsgBody, MsgHeader, OpCode, OpMsg, OpQuery, decode_frame, read_frame, write_message,
};

/// Encodes an `OP_MSG` request frame.
pub fn msg_frame(request_id: i32, document: Document) -> Vec<u8> {
    let mut frame = Vec::new();
    let header = MsgHeader::response(OpCode::Msg, request_id, 0);
    write_message(&mut frame, &header, &MsgBody::Msg(OpMsg::new(document)))
        .expect("encode OP_MSG frame");
    frame
}

/// Encodes an `OP_QUERY` request frame.
pub fn query_frame(request_id: i32, namespace: &str, document: Document) -> Vec<u8> {
    let mut frame = Vec::new();
    let header = MsgHeader::response(OpCode::Query, request_id, 0);
    let body = MsgBody::Query(OpQuery::new(namespace, document));
    write_message(&mut frame, &header, &body).expect("encode OP_QUERY frame");
    frame
}

/// Encodes a frame with an opaque payload for `op_code`.
pub fn raw_frame(request_id: i32, op_code: OpCode, payload: Vec<u8>) -> Vec<u8> {
    let mut frame = Vec::new();
    let header = MsgHeader::response(op_code, request_id, 0);
    write_message(&mut frame, &header, &MsgBody::Raw { op_code, payload })
        .expect("encode raw frame");
    frame
}

/// Sends `frame` and reads one decoded response.
pub fn exchange<S: Read + Write>(stream: &mut S, frame: &[u8]) -> (MsgHeader, MsgBody) {
    stream.write_all(frame).expect("write request");
    stream.flush().expect("flush request");
    let response = read_frame(stream).expect("read response");
    decode_frame(&response).expect("decode response")
}

/// Document of an `OP_MSG` body.
pub fn msg_document(body: &MsgBody) -> &Document {
    match body {
        MsgBody::Msg(msg) => msg.document(),
        other => panic!("expected OP_MSG body, got {other:?}"),
    }
}
