//! Frame-level reading and writing.

use std::io::{self, Read, Write};

use crate::body::MsgBody;
use crate::error::WireError;
use crate::header::{MAX_MESSAGE_LEN, MSG_HEADER_LEN, MsgHeader, OpCode};

/// Reads one complete frame, header included.
///
/// Returns [`WireError::ZeroRead`] when the stream ends before any header
/// byte, which callers treat as a clean disconnect.
pub fn read_frame<R: Read + ?Sized>(reader: &mut R) -> Result<Vec<u8>, WireError> {
    let mut header = [0_u8; MSG_HEADER_LEN];
    let mut filled = 0;
    while filled < MSG_HEADER_LEN {
        let Some(buffer) = header.get_mut(filled..) else {
            break;
        };
        match reader.read(buffer) {
            Ok(0) if filled == 0 => return Err(WireError::ZeroRead),
            Ok(0) => return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into()),
            Ok(read) => filled += read,
            Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
            Err(error) => return Err(error.into()),
        }
    }

    let length = declared_length(&header)?;
    let mut frame = Vec::with_capacity(length);
    frame.extend_from_slice(&header);
    frame.resize(length, 0);
    if let Some(payload) = frame.get_mut(MSG_HEADER_LEN..) {
        reader.read_exact(payload)?;
    }
    Ok(frame)
}

fn declared_length(header: &[u8; MSG_HEADER_LEN]) -> Result<usize, WireError> {
    let [b0, b1, b2, b3, ..] = *header;
    let raw = i32::from_le_bytes([b0, b1, b2, b3]);
    usize::try_from(raw)
        .ok()
        .filter(|length| (MSG_HEADER_LEN..=MAX_MESSAGE_LEN).contains(length))
        .ok_or(WireError::InvalidLength {
            length: i64::from(raw),
        })
}

/// Decodes the header at the start of `frame` and checks it against the frame size.
pub fn decode_header(frame: &[u8]) -> Result<MsgHeader, WireError> {
    let bytes: [u8; MSG_HEADER_LEN] = frame
        .get(..MSG_HEADER_LEN)
        .and_then(|slice| slice.try_into().ok())
        .ok_or(WireError::Truncated {
            context: "message header",
        })?;
    let length = declared_length(&bytes)?;
    if length != frame.len() {
        return Err(WireError::InvalidLength {
            length: i64::try_from(length).unwrap_or(i64::MAX),
        });
    }
    let mut fields = [0_i32; 4];
    for (field, chunk) in fields.iter_mut().zip(bytes.chunks_exact(4)) {
        if let Ok(chunk) = <[u8; 4]>::try_from(chunk) {
            *field = i32::from_le_bytes(chunk);
        }
    }
    let [message_length, request_id, response_to, op_code] = fields;
    Ok(MsgHeader {
        message_length,
        request_id,
        response_to,
        op_code: OpCode::from_i32(op_code),
    })
}

/// Decodes the payload that follows `header` in `frame`.
pub fn decode_body(header: &MsgHeader, frame: &[u8]) -> Result<MsgBody, WireError> {
    let payload = frame.get(MSG_HEADER_LEN..).unwrap_or_default();
    MsgBody::decode(header.op_code, payload)
}

/// Decodes a complete frame.
pub fn decode_frame(frame: &[u8]) -> Result<(MsgHeader, MsgBody), WireError> {
    let header = decode_header(frame)?;
    let body = decode_body(&header, frame)?;
    Ok((header, body))
}

/// Writes `header` and `body`, recomputing the message length from the body.
pub fn write_message<W: Write + ?Sized>(
    writer: &mut W,
    header: &MsgHeader,
    body: &MsgBody,
) -> Result<(), WireError> {
    let payload = body.encode()?;
    let header = header.with_payload_len(payload.len())?;
    writer.write_all(&header.to_bytes())?;
    writer.write_all(&payload)?;
    Ok(())
}
