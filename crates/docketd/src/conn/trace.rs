//! Request spans and W3C trace context carried in `comment`.
//!
//! A valid `traceparent` is recorded on the request span as the
//! `remote_trace_id` and `remote_span_id` correlation fields. The span itself
//! stays a root span: no exporter is wired in that could link it to the
//! caller's trace.

use tracing::{Span, field, info_span};

use super::CONN_TARGET;
use crate::message::Request;

/// Parsed `traceparent` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TraceParent<'a> {
    pub(crate) trace_id: &'a str,
    pub(crate) parent_span_id: &'a str,
    pub(crate) flags: u8,
}

impl<'a> TraceParent<'a> {
    /// Parses `00-<32 hex>-<16 hex>-<2 hex>`; ids of all zeros are invalid.
    pub(crate) fn parse(value: &'a str) -> Option<Self> {
        let mut parts = value.trim().split('-');
        let version = parts.next()?;
        let trace_id = parts.next()?;
        let parent_span_id = parts.next()?;
        let flags = parts.next()?;
        if parts.next().is_some()
            || version != "00"
            || !is_hex_id(trace_id, 32)
            || !is_hex_id(parent_span_id, 16)
            || flags.len() != 2
        {
            return None;
        }
        let flags = u8::from_str_radix(flags, 16).ok()?;
        Some(Self {
            trace_id,
            parent_span_id,
            flags,
        })
    }
}

fn is_hex_id(value: &str, len: usize) -> bool {
    value.len() == len
        && value
            .bytes()
            .all(|byte| byte.is_ascii_digit() || (b'a'..=b'f').contains(&byte))
        && value.bytes().any(|byte| byte != b'0')
}

/// Opens the span covering one request and its response.
///
/// `result` and `argument` are filled in by the router once the outcome is known.
pub(super) fn request_span(request: &Request) -> Span {
    let span = info_span!(
        target: CONN_TARGET,
        parent: None,
        "request",
        command = request.command_name().unwrap_or("unknown"),
        opcode = %request.header.op_code,
        request_id = request.header.request_id,
        remote_trace_id = field::Empty,
        remote_span_id = field::Empty,
        result = field::Empty,
        argument = field::Empty,
    );
    if let Some(parent) = request.comment().and_then(TraceParent::parse) {
        span.record("remote_trace_id", parent.trace_id);
        span.record("remote_span_id", parent.parent_span_id);
    }
    span
}
