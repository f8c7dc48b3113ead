//! Legacy `OP_QUERY` and `OP_REPLY` payloads.
//!
//! Drivers still open connections with an `OP_QUERY` handshake against the
//! `$cmd` pseudo-collection, so the server must understand these two.

use bson::Document;

use crate::error::WireError;
use crate::payload::{PayloadReader, put_cstring, put_document};

/// `OP_REPLY` flag marking the single returned document as an error.
pub const REPLY_QUERY_FAILURE: i32 = 1 << 1;

/// An `OP_QUERY` body.
#[derive(Debug, Clone, PartialEq)]
pub struct OpQuery {
    /// Query flag bits.
    pub flags: i32,
    /// `<database>.<collection>` namespace.
    pub full_collection_name: String,
    /// Documents to skip.
    pub number_to_skip: i32,
    /// Batch size hint.
    pub number_to_return: i32,
    /// Query or command document.
    pub query: Document,
    /// Optional projection.
    pub return_fields_selector: Option<Document>,
}

impl OpQuery {
    /// Builds a query against `namespace` with default flags.
    #[must_use]
    pub fn new(namespace: impl Into<String>, query: Document) -> Self {
        Self {
            flags: 0,
            full_collection_name: namespace.into(),
            number_to_skip: 0,
            number_to_return: -1,
            query,
            return_fields_selector: None,
        }
    }

    /// Splits the namespace into database and collection.
    #[must_use]
    pub fn namespace(&self) -> (&str, &str) {
        self.full_collection_name
            .split_once('.')
            .unwrap_or((self.full_collection_name.as_str(), ""))
    }

    pub(crate) fn decode(payload: &[u8]) -> Result<Self, WireError> {
        let mut reader = PayloadReader::new(payload);
        let flags = reader.i32("OP_QUERY flags")?;
        let full_collection_name = reader.cstring("OP_QUERY collection name")?;
        let number_to_skip = reader.i32("OP_QUERY skip")?;
        let number_to_return = reader.i32("OP_QUERY return count")?;
        let query = reader.document("OP_QUERY query")?;
        let return_fields_selector = if reader.is_empty() {
            None
        } else {
            Some(reader.document("OP_QUERY field selector")?)
        };
        reader.finish("OP_QUERY")?;
        Ok(Self {
            flags,
            full_collection_name,
            number_to_skip,
            number_to_return,
            query,
            return_fields_selector,
        })
    }

    pub(crate) fn encode(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        out.extend_from_slice(&self.flags.to_le_bytes());
        put_cstring(out, &self.full_collection_name);
        out.extend_from_slice(&self.number_to_skip.to_le_bytes());
        out.extend_from_slice(&self.number_to_return.to_le_bytes());
        put_document(out, &self.query)?;
        if let Some(selector) = &self.return_fields_selector {
            put_document(out, selector)?;
        }
        Ok(())
    }
}

/// An `OP_REPLY` body.
#[derive(Debug, Clone, PartialEq)]
pub struct OpReply {
    /// Response flag bits.
    pub flags: i32,
    /// Open cursor, or zero.
    pub cursor_id: i64,
    /// Position of the first document in the cursor.
    pub starting_from: i32,
    /// Returned documents.
    pub documents: Vec<Document>,
}

impl OpReply {
    /// Builds a successful single-document reply.
    #[must_use]
    pub fn new(document: Document) -> Self {
        Self {
            flags: 0,
            cursor_id: 0,
            starting_from: 0,
            documents: vec![document],
        }
    }

    /// Builds a reply flagged as a query failure.
    #[must_use]
    pub fn failure(document: Document) -> Self {
        Self {
            flags: REPLY_QUERY_FAILURE,
            ..Self::new(document)
        }
    }

    /// Whether the query-failure flag is set.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        self.flags & REPLY_QUERY_FAILURE != 0
    }

    /// First returned document.
    #[must_use]
    pub fn document(&self) -> Option<&Document> {
        self.documents.first()
    }

    pub(crate) fn decode(payload: &[u8]) -> Result<Self, WireError> {
        let mut reader = PayloadReader::new(payload);
        let flags = reader.i32("OP_REPLY flags")?;
        let cursor_id = reader.i64("OP_REPLY cursor id")?;
        let starting_from = reader.i32("OP_REPLY starting from")?;
        let number_returned = reader.i32("OP_REPLY document count")?;
        let count = usize::try_from(number_returned).map_err(|_| WireError::InvalidLength {
            length: i64::from(number_returned),
        })?;
        let mut documents = Vec::new();
        for _ in 0..count {
            documents.push(reader.document("OP_REPLY document")?);
        }
        reader.finish("OP_REPLY")?;
        Ok(Self {
            flags,
            cursor_id,
            starting_from,
            documents,
        })
    }

    pub(crate) fn encode(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        let count = i32::try_from(self.documents.len()).map_err(|_| WireError::InvalidLength {
            length: i64::try_from(self.documents.len()).unwrap_or(i64::MAX),
        })?;
        out.extend_from_slice(&self.flags.to_le_bytes());
        out.extend_from_slice(&self.cursor_id.to_le_bytes());
        out.extend_from_slice(&self.starting_from.to_le_bytes());
        out.extend_from_slice(&count.to_le_bytes());
        for document in &self.documents {
            put_document(out, document)?;
        }
        Ok(())
    }
}
