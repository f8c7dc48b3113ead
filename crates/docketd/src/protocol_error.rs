//! Translation of internal failures into protocol-level error payloads.
//!
//! Every failure that reaches a client is first turned into a [`ProtocolError`]
//! with a numeric code and name. The payload shape then depends on the
//! response op-code: `OP_MSG` answers carry an error document with `ok: 0`,
//! legacy `OP_REPLY` answers carry `$err` and the query-failure flag.

use std::any::Any;
use std::error::Error;

use bson::{Document, doc};
use docket_wire::{OpMsg, OpReply, WireError};
use strum::IntoStaticStr;
use thiserror::Error;

use crate::cancel::CancelCause;

/// Error codes understood by drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr)]
pub enum ErrorCode {
    /// Unexpected server failure.
    InternalError,
    /// An argument has an invalid value.
    BadValue,
    /// A document could not be parsed.
    FailedToParse,
    /// An argument has the wrong type.
    TypeMismatch,
    /// The message violates the wire protocol.
    ProtocolError,
    /// The operation is not allowed in the current state.
    IllegalOperation,
    /// A document is not valid BSON.
    #[strum(serialize = "InvalidBSON")]
    InvalidBson,
    /// The command is not registered.
    CommandNotFound,
    /// A generic operation failure.
    OperationFailed,
    /// The feature is not implemented.
    NotImplemented,
    /// A legacy `OP_QUERY` command that is no longer accepted.
    UnsupportedOpQueryCommand,
    /// The operation was cancelled.
    Interrupted,
}

impl ErrorCode {
    /// Numeric code sent to clients.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::InternalError => 1,
            Self::BadValue => 2,
            Self::FailedToParse => 9,
            Self::TypeMismatch => 14,
            Self::ProtocolError => 17,
            Self::IllegalOperation => 20,
            Self::InvalidBson => 22,
            Self::CommandNotFound => 59,
            Self::OperationFailed => 96,
            Self::NotImplemented => 238,
            Self::UnsupportedOpQueryCommand => 352,
            Self::Interrupted => 11601,
        }
    }

    /// Code name sent to clients and used as the `result` metrics label.
    #[must_use]
    pub fn name(self) -> &'static str {
        self.into()
    }
}

/// A failure expressed in protocol terms.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ProtocolError {
    code: ErrorCode,
    message: String,
    argument: Option<String>,
}

impl ProtocolError {
    /// Builds an error with no offending argument.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            argument: None,
        }
    }

    /// Names the argument that caused the error.
    #[must_use]
    pub fn with_argument(mut self, argument: impl Into<String>) -> Self {
        self.argument = Some(argument.into());
        self
    }

    /// Unknown command.
    #[must_use]
    pub fn command_not_found(command: &str) -> Self {
        Self::new(
            ErrorCode::CommandNotFound,
            format!("no such command: '{command}'"),
        )
    }

    /// Invalid argument value.
    #[must_use]
    pub fn bad_value(argument: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadValue, message).with_argument(argument)
    }

    /// Operation cancelled for `cause`.
    #[must_use]
    pub fn interrupted(cause: &CancelCause) -> Self {
        Self::new(
            ErrorCode::Interrupted,
            format!("operation was interrupted: {cause}"),
        )
    }

    /// Error code.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        self.code
    }

    /// Human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Offending argument, if known.
    #[must_use]
    pub fn argument(&self) -> Option<&str> {
        self.argument.as_deref()
    }

    /// `(result, argument)` labels for the `responses_total` counter and the request span.
    #[must_use]
    pub fn labels(&self) -> (&'static str, &str) {
        (self.code.name(), self.argument().unwrap_or("unknown"))
    }

    /// `OP_MSG` error document.
    #[must_use]
    pub fn to_msg(&self) -> OpMsg {
        OpMsg::new(self.msg_document())
    }

    fn msg_document(&self) -> Document {
        doc! {
            "ok": 0.0,
            "errmsg": self.message.as_str(),
            "code": self.code.code(),
            "codeName": self.code.name(),
        }
    }

    /// `OP_REPLY` error with the query-failure flag set.
    #[must_use]
    pub fn to_reply(&self) -> OpReply {
        OpReply::failure(doc! {
            "$err": self.message.as_str(),
            "errmsg": self.message.as_str(),
            "code": self.code.code(),
            "codeName": self.code.name(),
            "ok": 0.0,
        })
    }
}

/// Maps any error to a [`ProtocolError`].
///
/// Known shapes keep their meaning; anything else becomes `InternalError`
/// carrying the error's display text.
#[must_use]
pub fn translate(error: &(dyn Error + 'static)) -> ProtocolError {
    if let Some(protocol) = error.downcast_ref::<ProtocolError>() {
        return protocol.clone();
    }
    if let Some(wire) = error.downcast_ref::<WireError>() {
        let code = match wire {
            WireError::Decode(_) | WireError::InvalidDocumentLength { .. } => ErrorCode::InvalidBson,
            _ => ErrorCode::ProtocolError,
        };
        return ProtocolError::new(code, wire.to_string());
    }
    if let Some(decode) = error.downcast_ref::<bson::de::Error>() {
        return ProtocolError::new(ErrorCode::InvalidBson, decode.to_string());
    }
    if let Some(access) = error.downcast_ref::<bson::document::ValueAccessError>() {
        return ProtocolError::new(ErrorCode::TypeMismatch, access.to_string());
    }
    ProtocolError::new(ErrorCode::InternalError, error.to_string())
}

/// Extracts the message from a panic payload.
#[must_use]
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
