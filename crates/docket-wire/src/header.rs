//! Message header and op-code definitions.

use std::fmt;

use crate::error::WireError;

/// Size of the fixed message header in bytes.
pub const MSG_HEADER_LEN: usize = 16;

/// Largest message accepted from a peer, header included.
pub const MAX_MESSAGE_LEN: usize = 48_000_000;

/// Operation codes carried in the message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    /// Legacy reply to `OP_QUERY`.
    Reply,
    /// Legacy update.
    Update,
    /// Legacy insert.
    Insert,
    /// Reserved op-code 2003.
    GetByOid,
    /// Legacy query, still used for driver handshakes.
    Query,
    /// Legacy cursor continuation.
    GetMore,
    /// Legacy delete.
    Delete,
    /// Legacy cursor release.
    KillCursors,
    /// Compressed wrapper around another message.
    Compressed,
    /// Extensible message format used by modern drivers.
    Msg,
    /// Any value this codec does not recognise.
    Unknown(i32),
}

impl OpCode {
    /// Maps a raw header value to an op-code.
    #[must_use]
    pub const fn from_i32(value: i32) -> Self {
        match value {
            1 => Self::Reply,
            2001 => Self::Update,
            2002 => Self::Insert,
            2003 => Self::GetByOid,
            2004 => Self::Query,
            2005 => Self::GetMore,
            2006 => Self::Delete,
            2007 => Self::KillCursors,
            2012 => Self::Compressed,
            2013 => Self::Msg,
            other => Self::Unknown(other),
        }
    }

    /// Returns the raw header value.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        match self {
            Self::Reply => 1,
            Self::Update => 2001,
            Self::Insert => 2002,
            Self::GetByOid => 2003,
            Self::Query => 2004,
            Self::GetMore => 2005,
            Self::Delete => 2006,
            Self::KillCursors => 2007,
            Self::Compressed => 2012,
            Self::Msg => 2013,
            Self::Unknown(value) => value,
        }
    }

    /// Returns the conventional upper-case name, used as a metrics label.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Reply => "OP_REPLY",
            Self::Update => "OP_UPDATE",
            Self::Insert => "OP_INSERT",
            Self::GetByOid => "OP_GET_BY_OID",
            Self::Query => "OP_QUERY",
            Self::GetMore => "OP_GET_MORE",
            Self::Delete => "OP_DELETE",
            Self::KillCursors => "OP_KILL_CURSORS",
            Self::Compressed => "OP_COMPRESSED",
            Self::Msg => "OP_MSG",
            Self::Unknown(_) => "OP_UNKNOWN",
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(value) => write!(formatter, "OP_UNKNOWN({value})"),
            known => formatter.write_str(known.name()),
        }
    }
}

/// Fixed header preceding every message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MsgHeader {
    /// Total message length including this header.
    pub message_length: i32,
    /// Sender-assigned identifier.
    pub request_id: i32,
    /// Identifier of the request this message answers, or zero.
    pub response_to: i32,
    /// Payload kind.
    pub op_code: OpCode,
}

impl MsgHeader {
    /// Builds a response header; the length is filled in by [`MsgHeader::with_payload_len`].
    #[must_use]
    pub const fn response(op_code: OpCode, request_id: i32, response_to: i32) -> Self {
        Self {
            message_length: 0,
            request_id,
            response_to,
            op_code,
        }
    }

    /// Returns a copy whose length describes a payload of `payload_len` bytes.
    pub fn with_payload_len(self, payload_len: usize) -> Result<Self, WireError> {
        let total = payload_len.saturating_add(MSG_HEADER_LEN);
        if total > MAX_MESSAGE_LEN {
            return Err(WireError::InvalidLength {
                length: i64::try_from(total).unwrap_or(i64::MAX),
            });
        }
        let message_length = i32::try_from(total).map_err(|_| WireError::InvalidLength {
            length: i64::try_from(total).unwrap_or(i64::MAX),
        })?;
        Ok(Self {
            message_length,
            ..self
        })
    }

    pub(crate) fn to_bytes(self) -> [u8; MSG_HEADER_LEN] {
        let mut bytes = [0_u8; MSG_HEADER_LEN];
        let fields = [
            self.message_length,
            self.request_id,
            self.response_to,
            self.op_code.as_i32(),
        ];
        for (chunk, field) in bytes.chunks_exact_mut(4).zip(fields) {
            chunk.copy_from_slice(&field.to_le_bytes());
        }
        bytes
    }
}

/// Renders one field per line so line-oriented diffs name the field that differs.
impl fmt::Display for MsgHeader {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(formatter, "length: {}", self.message_length)?;
        writeln!(formatter, "id: {}", self.request_id)?;
        writeln!(formatter, "response_to: {}", self.response_to)?;
        write!(formatter, "opcode: {}", self.op_code)
    }
}
