//! `OP_MSG` payloads.

use bson::{Bson, Document};

use crate::error::WireError;
use crate::payload::{PayloadReader, put_cstring, put_document};

/// A CRC-32C checksum trails the sections.
pub const CHECKSUM_PRESENT: u32 = 1;
/// The sender will not wait for a reply.
pub const MORE_TO_COME: u32 = 1 << 1;
/// The client accepts multiple replies to one request.
pub const EXHAUST_ALLOWED: u32 = 1 << 16;

const REQUIRED_BITS: u32 = 0xFFFF;
const KNOWN_REQUIRED_BITS: u32 = CHECKSUM_PRESENT | MORE_TO_COME;
const CHECKSUM_LEN: usize = 4;

/// Kind-1 section: a named run of documents.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSequence {
    /// Command argument the documents belong to, e.g. `documents`.
    pub identifier: String,
    /// The documents in wire order.
    pub documents: Vec<Document>,
}

/// An `OP_MSG` body: flag bits, one body document, optional sequences.
#[derive(Debug, Clone, PartialEq)]
pub struct OpMsg {
    flags: u32,
    document: Document,
    sequences: Vec<DocumentSequence>,
}

impl OpMsg {
    /// Wraps a single body document.
    #[must_use]
    pub const fn new(document: Document) -> Self {
        Self {
            flags: 0,
            document,
            sequences: Vec::new(),
        }
    }

    /// Appends a kind-1 section.
    #[must_use]
    pub fn with_sequence(mut self, identifier: impl Into<String>, documents: Vec<Document>) -> Self {
        self.sequences.push(DocumentSequence {
            identifier: identifier.into(),
            documents,
        });
        self
    }

    /// Flag bits as received; the checksum bit is never re-emitted.
    #[must_use]
    pub const fn flags(&self) -> u32 {
        self.flags
    }

    /// The kind-0 body document.
    #[must_use]
    pub const fn document(&self) -> &Document {
        &self.document
    }

    /// Consumes the message and returns its body document.
    #[must_use]
    pub fn into_document(self) -> Document {
        self.document
    }

    /// Kind-1 sections in wire order.
    #[must_use]
    pub fn sequences(&self) -> &[DocumentSequence] {
        &self.sequences
    }

    /// Name of the command: the first key of the body document.
    #[must_use]
    pub fn command_name(&self) -> Option<&str> {
        self.document.keys().next().map(String::as_str)
    }

    /// Free-form `comment` attached by the client, when it is a string.
    #[must_use]
    pub fn comment(&self) -> Option<&str> {
        self.document.get_str("comment").ok()
    }

    /// Target database from `$db`.
    #[must_use]
    pub fn database(&self) -> Option<&str> {
        self.document.get_str("$db").ok()
    }

    pub(crate) fn decode(payload: &[u8]) -> Result<Self, WireError> {
        let mut reader = PayloadReader::new(payload);
        let flags = reader.u32("OP_MSG flags")?;
        if flags & REQUIRED_BITS & !KNOWN_REQUIRED_BITS != 0 {
            return Err(WireError::UnknownRequiredFlags { flags });
        }
        let sections_len = if flags & CHECKSUM_PRESENT == 0 {
            reader.remaining()
        } else {
            reader
                .remaining()
                .checked_sub(CHECKSUM_LEN)
                .ok_or(WireError::Truncated {
                    context: "OP_MSG checksum",
                })?
        };
        let mut sections = PayloadReader::new(reader.take(sections_len, "OP_MSG sections")?);

        let mut document = None;
        let mut sequences = Vec::new();
        while !sections.is_empty() {
            match sections.u8("OP_MSG section kind")? {
                0 => {
                    if document.is_some() {
                        return Err(WireError::DuplicateBodySection);
                    }
                    document = Some(sections.document("OP_MSG body section")?);
                }
                1 => sequences.push(decode_sequence(&mut sections)?),
                kind => return Err(WireError::InvalidSectionKind { kind }),
            }
        }

        let document = document.ok_or(WireError::MissingBodySection)?;
        Ok(Self {
            flags: flags & !CHECKSUM_PRESENT,
            document,
            sequences,
        })
    }

    pub(crate) fn encode(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        out.extend_from_slice(&(self.flags & !CHECKSUM_PRESENT).to_le_bytes());
        out.push(0);
        put_document(out, &self.document)?;
        for sequence in &self.sequences {
            let mut section = Vec::new();
            put_cstring(&mut section, &sequence.identifier);
            for document in &sequence.documents {
                put_document(&mut section, document)?;
            }
            let size = i32::try_from(section.len().saturating_add(4)).map_err(|_| {
                WireError::InvalidLength {
                    length: i64::try_from(section.len()).unwrap_or(i64::MAX),
                }
            })?;
            out.push(1);
            out.extend_from_slice(&size.to_le_bytes());
            out.extend_from_slice(&section);
        }
        Ok(())
    }
}

fn decode_sequence(sections: &mut PayloadReader<'_>) -> Result<DocumentSequence, WireError> {
    let size = sections.i32("OP_MSG sequence size")?;
    let body_len = usize::try_from(size)
        .ok()
        .and_then(|size| size.checked_sub(4))
        .ok_or(WireError::InvalidLength {
            length: i64::from(size),
        })?;
    let mut sequence = PayloadReader::new(sections.take(body_len, "OP_MSG sequence")?);
    let identifier = sequence.cstring("OP_MSG sequence identifier")?;
    let mut documents = Vec::new();
    while !sequence.is_empty() {
        documents.push(sequence.document("OP_MSG sequence document")?);
    }
    Ok(DocumentSequence {
        identifier,
        documents,
    })
}

/// Reports whether a response document carries `ok: 1`.
#[must_use]
pub fn is_ok_response(document: &Document) -> bool {
    match document.get("ok") {
        Some(Bson::Double(value)) => (*value - 1.0).abs() < f64::EPSILON,
        Some(Bson::Int32(value)) => *value == 1,
        Some(Bson::Int64(value)) => *value == 1,
        Some(Bson::Boolean(value)) => *value,
        _ => false,
    }
}
