//! Error types raised while reading, decoding, or encoding messages.

use std::io;

use thiserror::Error;

/// Errors surfaced by the wire codec.
#[derive(Debug, Error)]
pub enum WireError {
    /// The peer closed the stream before the first header byte arrived.
    #[error("connection closed before a message header was read")]
    ZeroRead,
    /// Reading or writing the underlying stream failed.
    #[error("wire I/O failed: {0}")]
    Io(#[from] io::Error),
    /// The header declared a length outside the accepted range.
    #[error("invalid message length {length}")]
    InvalidLength {
        /// Declared message length.
        length: i64,
    },
    /// A payload ended before a field could be read.
    #[error("truncated {context}")]
    Truncated {
        /// Field or structure being decoded.
        context: &'static str,
    },
    /// A payload carried bytes after its last field.
    #[error("{count} unexpected trailing bytes after {context}")]
    TrailingBytes {
        /// Structure that was fully decoded.
        context: &'static str,
        /// Number of leftover bytes.
        count: usize,
    },
    /// A C string was not valid UTF-8.
    #[error("invalid UTF-8 in {context}")]
    InvalidCString {
        /// Field being decoded.
        context: &'static str,
    },
    /// A document declared an impossible length.
    #[error("invalid document length {length}")]
    InvalidDocumentLength {
        /// Declared document length.
        length: i32,
    },
    /// `OP_MSG` set a required flag bit this codec does not understand.
    #[error("unknown required OP_MSG flag bits {flags:#010x}")]
    UnknownRequiredFlags {
        /// Offending flag word.
        flags: u32,
    },
    /// `OP_MSG` used a section kind other than 0 or 1.
    #[error("invalid OP_MSG section kind {kind}")]
    InvalidSectionKind {
        /// Offending section kind byte.
        kind: u8,
    },
    /// `OP_MSG` carried no kind-0 section.
    #[error("OP_MSG has no body section")]
    MissingBodySection,
    /// `OP_MSG` carried more than one kind-0 section.
    #[error("OP_MSG has more than one body section")]
    DuplicateBodySection,
    /// A document failed to decode.
    #[error("failed to decode document: {0}")]
    Decode(#[from] bson::de::Error),
    /// A document failed to encode.
    #[error("failed to encode document: {0}")]
    Encode(#[from] bson::ser::Error),
}

impl WireError {
    /// Returns true when the stream ended cleanly between messages.
    #[must_use]
    pub fn is_zero_read(&self) -> bool {
        matches!(self, Self::ZeroRead)
    }
}
