//! Image Header Tag Decoding
//!
//! The image header holds four fields encoded with a compact tag scheme starting
//! at byte offset [`HEADER_OFFSET`]:
//!
//! | Tag byte `T`          | Layout                                              |
//! |-----------------------|-----------------------------------------------------|
//! | `T - 113 == 4`        | `T`, length byte `N + 1`, 2 marker bytes, `N` bytes |
//! | `T - 113` in `0..`    | `T`, 2 marker bytes, `T - 113` bytes                |
//! | `T < 113`             | boolean, `T == 16` means true                       |
//!
//! The marker bytes carry the character set and are not interpreted. Content is
//! rendered as single-byte ASCII.

use std::fmt;

use log::debug;

use super::{ByteCursor, EncodingError, Result};

/// Offset of the first header tag within an image
pub const HEADER_OFFSET: usize = 3;

/// Tag byte value that encodes a zero-length string
const TAG_BASE: u8 = 113;

/// `T - TAG_BASE` value announcing an explicit length byte
const EXTENDED_LENGTH: u8 = 4;

/// Character set marker following the tag (and extended length byte)
const CHARSET_MARKER_LEN: usize = 2;

/// Boolean tag value meaning true
const BOOLEAN_TRUE: u8 = 16;

/// Header fields in the order they are stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldName {
    ModelName,
    MinScriptVersion,
    MinFbVersion,
    Type,
}

impl FieldName {
    /// All fields in storage order
    pub const ALL: [FieldName; 4] = [
        FieldName::ModelName,
        FieldName::MinScriptVersion,
        FieldName::MinFbVersion,
        FieldName::Type,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldName::ModelName => "Model_Name",
            FieldName::MinScriptVersion => "Min_Script_Version",
            FieldName::MinFbVersion => "Min_FB_Version",
            FieldName::Type => "Type",
        }
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which header fields a caller wants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldQuery {
    All,
    Single(FieldName),
}

/// Decoded field value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Flag(bool),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(text) => f.write_str(text),
            FieldValue::Flag(true) => f.write_str("True"),
            FieldValue::Flag(false) => f.write_str("False"),
        }
    }
}

/// One decoded header field, displayed as `<Name>: <Value>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderField {
    pub name: FieldName,
    pub value: FieldValue,
}

impl HeaderField {
    pub fn new(name: FieldName, value: FieldValue) -> Self {
        Self { name, value }
    }
}

impl fmt::Display for HeaderField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.value)
    }
}

/// A raw header tag as found in the image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderTag<'a> {
    /// Character string content, marker bytes already skipped
    CharacterString(&'a [u8]),
    /// Boolean tag; the payload is the tag byte itself
    Boolean(u8),
}

/// Decode the tag at the cursor.
///
/// String tags consume the tag byte, the optional extended length byte, the
/// character set marker and the content. Boolean tags consume only the tag byte.
pub fn decode_header_tag<'a>(cursor: &mut ByteCursor<'a>) -> Result<HeaderTag<'a>> {
    let tag = cursor.read_u8()?;
    if tag < TAG_BASE {
        return Ok(HeaderTag::Boolean(tag));
    }

    let mut length = (tag - TAG_BASE) as usize;
    if tag - TAG_BASE == EXTENDED_LENGTH {
        let offset = cursor.position();
        let length_byte = cursor.read_u8()?;
        if length_byte == 0 {
            return Err(EncodingError::InvalidLength {
                offset,
                length_byte,
            });
        }
        length = length_byte as usize - 1;
    }

    cursor.skip(CHARSET_MARKER_LEN)?;
    Ok(HeaderTag::CharacterString(cursor.read_bytes(length)?))
}

/// Decode the field stored at the cursor.
///
/// [`FieldName::Type`] is always read as a single boolean byte; every other
/// field must be a character string tag.
pub fn decode_field(cursor: &mut ByteCursor<'_>, name: FieldName) -> Result<HeaderField> {
    let offset = cursor.position();

    let value = if name == FieldName::Type {
        FieldValue::Flag(cursor.read_u8()? == BOOLEAN_TRUE)
    } else {
        match decode_header_tag(cursor)? {
            HeaderTag::CharacterString(content) => FieldValue::Text(ascii_lossy(content)),
            HeaderTag::Boolean(tag) => {
                return Err(EncodingError::UnexpectedBoolean {
                    offset,
                    tag,
                    field: name,
                })
            }
        }
    };

    debug!(
        "Decoded {} at offset {} ({} bytes)",
        name,
        offset,
        cursor.position() - offset
    );
    Ok(HeaderField::new(name, value))
}

/// Decode the requested header fields from a whole image.
///
/// A single-field query stops as soon as that field is decoded, so malformed
/// tags after it are never read.
pub fn decode_header(image: &[u8], query: FieldQuery) -> Result<Vec<HeaderField>> {
    let mut cursor = ByteCursor::at(image, HEADER_OFFSET);
    let mut fields = Vec::with_capacity(FieldName::ALL.len());

    for name in FieldName::ALL {
        let field = decode_field(&mut cursor, name)?;
        match query {
            FieldQuery::All => fields.push(field),
            FieldQuery::Single(wanted) if wanted == name => return Ok(vec![field]),
            FieldQuery::Single(_) => {}
        }
    }

    Ok(fields)
}

fn ascii_lossy(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| if b.is_ascii() { b as char } else { '?' })
        .collect()
}
