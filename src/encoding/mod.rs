//! Image Encoding/Decoding Module
//!
//! This module provides the low-level decoding primitives for device image files.
//! Every read goes through a bounds-checked [`ByteCursor`], so malformed input
//! surfaces as an [`EncodingError`] instead of a read past the end of the buffer.
//!
//! # Overview
//!
//! The encoding module is responsible for:
//! - Walking raw image bytes with explicit position tracking
//! - Decoding the tag-length header region (see [`header`])
//! - Reporting the exact offset and shortfall of any failed read
//!
//! # Example
//!
//! ```
//! use bacnet_imagetool::encoding::ByteCursor;
//!
//! let data = [0x00, 0x05, 0xAA];
//! let mut cursor = ByteCursor::new(&data);
//! assert_eq!(cursor.read_u16_be().unwrap(), 5);
//! assert!(cursor.read_bytes(5).is_err());
//! ```

pub mod header;

pub use header::{
    decode_field, decode_header, decode_header_tag, FieldName, FieldQuery, FieldValue,
    HeaderField, HeaderTag, HEADER_OFFSET,
};

use thiserror::Error;

/// Result type for encoding operations
pub type Result<T> = std::result::Result<T, EncodingError>;

/// Errors that can occur during decoding operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    /// A read needed more bytes than the buffer holds
    #[error("unexpected end of data at offset {offset}: need {needed} bytes, {available} available")]
    UnexpectedEndOfData {
        offset: usize,
        needed: usize,
        available: usize,
    },
    /// Extended length byte cannot describe a character set plus content
    #[error("invalid extended length byte {length_byte:#04X} at offset {offset}")]
    InvalidLength { offset: usize, length_byte: u8 },
    /// A boolean tag appeared where a character string field is expected
    #[error("boolean tag {tag:#04X} at offset {offset} where {field} expects a character string")]
    UnexpectedBoolean {
        offset: usize,
        tag: u8,
        field: FieldName,
    },
}

/// Bounds-checked reader over a borrowed byte slice
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    /// Create a cursor positioned at the start of `data`
    pub fn new(data: &'a [u8]) -> Self {
        Self::at(data, 0)
    }

    /// Create a cursor positioned at `pos`.
    ///
    /// A position past the end is allowed; the cursor is then simply empty.
    pub fn at(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Number of unread bytes
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn ensure(&self, needed: usize) -> Result<()> {
        let available = self.remaining();
        if needed > available || self.pos > self.data.len() {
            return Err(EncodingError::UnexpectedEndOfData {
                offset: self.pos,
                needed,
                available,
            });
        }
        Ok(())
    }

    /// Read one byte without advancing
    pub fn peek_u8(&self) -> Result<u8> {
        self.ensure(1)?;
        Ok(self.data[self.pos])
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let byte = self.peek_u8()?;
        self.pos += 1;
        Ok(byte)
    }

    /// Read a big-endian unsigned 16-bit value
    pub fn read_u16_be(&mut self) -> Result<u16> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Borrow the next `len` bytes and advance past them
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.ensure(len)?;
        let bytes = self
            .data
            .get(self.pos..self.pos + len)
            .ok_or(EncodingError::UnexpectedEndOfData {
                offset: self.pos,
                needed: len,
                available: 0,
            })?;
        self.pos += len;
        Ok(bytes)
    }

    pub fn skip(&mut self, len: usize) -> Result<()> {
        self.ensure(len)?;
        self.pos += len;
        Ok(())
    }
}
