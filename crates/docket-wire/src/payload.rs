//! Cursor over a message payload with bounds-checked primitive readers.

use bson::Document;

use crate::error::WireError;

/// Smallest valid encoded document: length prefix plus terminator.
const MIN_DOCUMENT_LEN: i32 = 5;

pub(crate) struct PayloadReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> PayloadReader<'a> {
    pub(crate) const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.offset)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub(crate) fn finish(&self, context: &'static str) -> Result<(), WireError> {
        match self.remaining() {
            0 => Ok(()),
            count => Err(WireError::TrailingBytes { context, count }),
        }
    }

    pub(crate) fn take(&mut self, len: usize, context: &'static str) -> Result<&'a [u8], WireError> {
        let end = self
            .offset
            .checked_add(len)
            .ok_or(WireError::Truncated { context })?;
        let slice = self
            .bytes
            .get(self.offset..end)
            .ok_or(WireError::Truncated { context })?;
        self.offset = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self, context: &'static str) -> Result<[u8; N], WireError> {
        let mut out = [0_u8; N];
        out.copy_from_slice(self.take(N, context)?);
        Ok(out)
    }

    pub(crate) fn u8(&mut self, context: &'static str) -> Result<u8, WireError> {
        Ok(u8::from_le_bytes(self.array(context)?))
    }

    pub(crate) fn i32(&mut self, context: &'static str) -> Result<i32, WireError> {
        Ok(i32::from_le_bytes(self.array(context)?))
    }

    pub(crate) fn u32(&mut self, context: &'static str) -> Result<u32, WireError> {
        Ok(u32::from_le_bytes(self.array(context)?))
    }

    pub(crate) fn i64(&mut self, context: &'static str) -> Result<i64, WireError> {
        Ok(i64::from_le_bytes(self.array(context)?))
    }

    pub(crate) fn cstring(&mut self, context: &'static str) -> Result<String, WireError> {
        let rest = self.bytes.get(self.offset..).unwrap_or_default();
        let nul = rest
            .iter()
            .position(|byte| *byte == 0)
            .ok_or(WireError::Truncated { context })?;
        let raw = self.take(nul, context)?;
        self.offset = self.offset.saturating_add(1);
        std::str::from_utf8(raw)
            .map(str::to_owned)
            .map_err(|_| WireError::InvalidCString { context })
    }

    pub(crate) fn document(&mut self, context: &'static str) -> Result<Document, WireError> {
        let prefix = self
            .bytes
            .get(self.offset..self.offset.saturating_add(4))
            .and_then(|slice| <[u8; 4]>::try_from(slice).ok())
            .ok_or(WireError::Truncated { context })?;
        let length = i32::from_le_bytes(prefix);
        let declared = usize::try_from(length)
            .ok()
            .filter(|_| length >= MIN_DOCUMENT_LEN)
            .ok_or(WireError::InvalidDocumentLength { length })?;
        let raw = self.take(declared, context)?;
        Ok(bson::from_slice(raw)?)
    }
}

pub(crate) fn put_cstring(out: &mut Vec<u8>, value: &str) {
    out.extend_from_slice(value.as_bytes());
    out.push(0);
}

pub(crate) fn put_document(out: &mut Vec<u8>, document: &Document) -> Result<(), WireError> {
    document.to_writer(out)?;
    Ok(())
}
